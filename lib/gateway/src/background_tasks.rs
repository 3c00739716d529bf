use async_trait::async_trait;
use std::{future::Future, sync::Arc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[async_trait]
pub trait BackgroundTask: Send + Sync {
    fn id(&self) -> &str;
    async fn run(&self, token: CancellationToken);
}

/// Owns every long-running task of the gateway (JWKS refresh loops etc.)
/// and stops them all on shutdown through a shared cancellation token.
pub struct BackgroundTasksManager {
    cancellation_token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl Default for BackgroundTasksManager {
    fn default() -> Self {
        Self::new()
    }
}

impl BackgroundTasksManager {
    pub fn new() -> Self {
        Self {
            cancellation_token: CancellationToken::new(),
            handles: Vec::new(),
        }
    }

    pub fn register_task<T>(&mut self, task: Arc<T>)
    where
        T: BackgroundTask + 'static,
    {
        info!("registering background task: {}", task.id());
        let child_token = self.cancellation_token.clone();

        self.handles.push(tokio::spawn(async move {
            task.run(child_token).await;
        }));
    }

    pub fn register_handle<F>(&mut self, f: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handles.push(tokio::spawn(f));
    }

    pub async fn shutdown(self) {
        info!("shutdown triggered, stopping all background tasks...");

        self.cancellation_token.cancel();
        for handle in self.handles {
            let _ = handle.await;
        }

        info!("all background tasks have been shut down gracefully.");
    }
}
