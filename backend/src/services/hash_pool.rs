//! Bounded worker pool for password hashing.
//!
//! Argon2 is CPU and memory bound, so each job runs on Tokio's blocking pool
//! and at most `workers` jobs run at once. A job that overruns the timeout is
//! reported as [`HashError::Timeout`]; the job itself is not cancelled and
//! keeps its permit until it finishes.

use crate::auth::errors::HashError;
use crate::auth::password::CredentialHasher;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

#[derive(Clone)]
pub struct HashPool {
    hasher: Arc<CredentialHasher>,
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl HashPool {
    pub fn new(hasher: CredentialHasher, workers: usize, timeout: Duration) -> Self {
        Self {
            hasher: Arc::new(hasher),
            permits: Arc::new(Semaphore::new(workers.max(1))),
            timeout,
        }
    }

    pub async fn hash(&self, password: String) -> Result<String, HashError> {
        self.run(move |hasher| hasher.hash(&password)).await?
    }

    pub async fn verify(&self, password: String, hash: String) -> Result<bool, HashError> {
        self.run(move |hasher| hasher.verify(&password, &hash)).await
    }

    /// Spend the same work as [`verify`](Self::verify) when there is no hash
    /// to check against.
    pub async fn verify_dummy(&self, password: String) -> Result<bool, HashError> {
        self.run(move |hasher| hasher.verify_dummy(&password)).await
    }

    async fn run<T, F>(&self, job: F) -> Result<T, HashError>
    where
        T: Send + 'static,
        F: FnOnce(&CredentialHasher) -> T + Send + 'static,
    {
        let hasher = self.hasher.clone();
        let permits = self.permits.clone();

        let work = async move {
            let permit = permits
                .acquire_owned()
                .await
                .map_err(|e| HashError::Worker(e.to_string()))?;
            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                job(&hasher)
            })
            .await
            .map_err(|e| HashError::Worker(e.to_string()))
        };

        tokio::time::timeout(self.timeout, work)
            .await
            .map_err(|_| HashError::Timeout)?
    }
}
