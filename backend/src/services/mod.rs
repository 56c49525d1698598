//! Module for supporting services used by the authentication core.
//!
//! This module encapsulates services that are not business logic on their
//! own but shape how that logic runs, such as the bounded worker pool that
//! keeps CPU-heavy password hashing off the request-handling threads.

pub mod hash_pool;

pub use hash_pool::HashPool;
