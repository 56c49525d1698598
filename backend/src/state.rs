//! Application state shared by the HTTP handlers.

use crate::auth::jwt::IdentityTokenIssuer;
use crate::auth::password::{CredentialHasher, HashParams};
use crate::auth::service::{AuthService, AuthSettings};
use crate::config::AppConfig;
use crate::errors::StartupError;
use crate::services::HashPool;
use adapters::{NotificationSender, UserDirectory};
use axum::extract::FromRef;
use std::sync::Arc;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub issuer: Arc<IdentityTokenIssuer>,
    pub directory: Arc<dyn UserDirectory>,
}

impl AppState {
    /// Wire the authentication core from validated configuration.
    pub fn new(
        config: &AppConfig,
        directory: Arc<dyn UserDirectory>,
        notifier: Arc<dyn NotificationSender>,
    ) -> Result<Self, StartupError> {
        config.validate()?;

        let hasher = CredentialHasher::new(HashParams {
            memory_kib: config.hash_memory_kib,
            iterations: config.hash_iterations,
            parallelism: config.hash_parallelism,
        })?;
        let hashes = HashPool::new(hasher, config.hash_workers, config.hash_timeout());

        let issuer = Arc::new(IdentityTokenIssuer::new(
            config.jwt_secret.as_bytes(),
            config.identity_token_ttl(),
        )?);

        let settings = AuthSettings {
            activate_base_url: config.activate_base_url.clone(),
            activation_ttl: config.activation_token_ttl(),
            outbound_timeout: config.outbound_timeout(),
        };

        let auth = AuthService::new(directory.clone(), notifier, hashes, issuer.clone(), settings);

        Ok(Self {
            auth: Arc::new(auth),
            issuer,
            directory,
        })
    }
}
