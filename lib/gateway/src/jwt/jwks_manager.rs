use arc_swap::ArcSwapOption;
use portcullis_config::jwt_auth::JwksProviderSourceConfig;
use sonic_rs::from_str;
use std::sync::Arc;
use tokio::fs::read_to_string;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use jsonwebtoken::jwk::JwkSet;

use crate::background_tasks::{BackgroundTask, BackgroundTasksManager};

/// Owns every configured key-set source and hands out non-blocking snapshots
/// of their keys. Refreshing swaps a whole new `Arc<JwkSet>` in, so in-flight
/// decodes keep reading the previous set until they finish.
pub struct JwksManager {
    sources: Vec<Arc<JwksSource>>,
}

impl JwksManager {
    pub fn from_config(providers: &[JwksProviderSourceConfig]) -> Self {
        let sources = providers
            .iter()
            .map(|config| Arc::new(JwksSource::new(config.clone())))
            .collect();

        JwksManager { sources }
    }

    /// Snapshot of every loaded key set. Sources that have not loaded yet are skipped.
    pub fn all(&self) -> Vec<Arc<JwkSet>> {
        self.sources
            .iter()
            .filter_map(|source| source.get_jwk_set())
            .collect()
    }

    pub async fn prefetch_sources(&self) -> Result<(), JwksSourceError> {
        for source in &self.sources {
            if source.should_prefetch() {
                source.load_and_store_jwks().await?;
            }
        }

        Ok(())
    }

    /// Forces an immediate reload of every source, e.g. when a token arrives
    /// with a key id none of the cached sets know. Individual source failures
    /// are logged and tolerated; the stale set stays in place.
    pub async fn refresh_all(&self) {
        for source in &self.sources {
            if let Err(err) = source.load_and_store_jwks().await {
                error!("forced jwks refresh failed: {}, keeping cached set", err);
            }
        }
    }

    pub fn register_background_tasks(&self, background_tasks_mgr: &mut BackgroundTasksManager) {
        for source in &self.sources {
            if source.should_poll_in_background() {
                background_tasks_mgr.register_task(Arc::new(JwksSourceTask(source.clone())));
            }
        }
    }
}

#[derive(Debug)]
pub struct JwksSource {
    config: JwksProviderSourceConfig,
    jwk: ArcSwapOption<JwkSet>,
}

struct JwksSourceTask(Arc<JwksSource>);

#[async_trait::async_trait]
impl BackgroundTask for JwksSourceTask {
    fn id(&self) -> &str {
        "jwt_auth_jwks"
    }

    async fn run(&self, token: CancellationToken) {
        if let JwksProviderSourceConfig::Remote {
            polling_interval: Some(interval),
            ..
        } = &self.0.config
        {
            debug!(
                "Starting remote jwks polling for source: {:?}",
                self.0.config
            );
            let mut tokio_interval = tokio::time::interval(*interval);

            loop {
                tokio::select! {
                    _ = tokio_interval.tick() => {
                        if let Err(err) = self.0.load_and_store_jwks().await {
                            error!("Failed to load remote jwks: {}", err);
                        }
                    }
                    _ = token.cancelled() => { info!("Jwks source shutting down."); return; }
                }
            }
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum JwksSourceError {
    #[error("failed to load remote jwks: {0}")]
    RemoteJwksNetworkError(reqwest::Error),
    #[error("failed to load file jwks: {0}")]
    FileJwksReadError(std::io::Error),
    #[error("failed to parse jwks json: {0}")]
    JwksContentInvalidStructure(sonic_rs::Error),
}

impl JwksSource {
    pub fn new(config: JwksProviderSourceConfig) -> Self {
        Self {
            config,
            jwk: ArcSwapOption::empty(),
        }
    }

    async fn load_and_store_jwks(&self) -> Result<&Self, JwksSourceError> {
        let jwks_str = match &self.config {
            JwksProviderSourceConfig::Remote { url, .. } => {
                let client = reqwest::Client::new();
                debug!("loading jwks from a remote source: {}", url);

                client
                    .get(url)
                    .send()
                    .await
                    .map_err(JwksSourceError::RemoteJwksNetworkError)?
                    .text()
                    .await
                    .map_err(JwksSourceError::RemoteJwksNetworkError)?
            }
            JwksProviderSourceConfig::File { path } => {
                debug!("loading jwks from a file source: {}", path.display());

                read_to_string(path)
                    .await
                    .map_err(JwksSourceError::FileJwksReadError)?
            }
        };

        let new_jwk = Arc::new(
            from_str::<JwkSet>(&jwks_str).map_err(JwksSourceError::JwksContentInvalidStructure)?,
        );

        self.jwk.store(Some(new_jwk));

        Ok(self)
    }

    pub fn should_poll_in_background(&self) -> bool {
        match &self.config {
            JwksProviderSourceConfig::Remote { .. } => true,
            JwksProviderSourceConfig::File { .. } => false,
        }
    }

    pub fn should_prefetch(&self) -> bool {
        match &self.config {
            JwksProviderSourceConfig::Remote { prefetch, .. } => prefetch.unwrap_or(false),
            JwksProviderSourceConfig::File { .. } => true,
        }
    }

    pub fn get_jwk_set(&self) -> Option<Arc<JwkSet>> {
        self.jwk.load_full()
    }
}
