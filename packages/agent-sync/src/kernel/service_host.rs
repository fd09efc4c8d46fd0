//! Hosting for long-running services.
//!
//! A [`Service`] runs until its [`CancellationToken`] fires. [`ServiceHandle`]
//! owns one spawned service; [`ServiceHost`] runs several side by side until
//! shutdown.
//!
//! # Example
//!
//! ```ignore
//! let feed = FeedSync::new(deps.clone(), config.clone());
//! let poller = OperationPoller::new(deps, config);
//!
//! ServiceHost::new()
//!     .with_service(feed.into_service(on_new_event))
//!     .with_service(poller.clone().into_service(on_complete))
//!     .run_until_shutdown()
//!     .await?;
//! ```

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[async_trait]
pub trait Service: Send + 'static {
    fn name(&self) -> &'static str;

    /// Run until `shutdown` is cancelled.
    async fn run(self: Box<Self>, shutdown: CancellationToken) -> Result<()>;
}

/// Sleep for `interval`; `false` if shutdown fired first.
pub async fn pause(shutdown: &CancellationToken, interval: Duration) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(interval) => true,
    }
}

// =============================================================================
// ServiceHandle
// =============================================================================

/// A spawned service and the token that stops it.
pub struct ServiceHandle {
    name: &'static str,
    shutdown: CancellationToken,
    task: JoinHandle<Result<()>>,
}

impl ServiceHandle {
    /// Spawn `service` on the current runtime.
    pub fn spawn(service: Box<dyn Service>) -> Self {
        Self::spawn_with_token(service, CancellationToken::new())
    }

    /// Spawn `service`, stopping it when `shutdown` is cancelled.
    pub fn spawn_with_token(service: Box<dyn Service>, shutdown: CancellationToken) -> Self {
        let name = service.name();
        let token = shutdown.clone();
        let task = tokio::spawn(async move {
            let result = service.run(token).await;
            if let Err(e) = &result {
                error!(service = name, error = %e, "service exited with error");
            }
            result
        });

        Self {
            name,
            shutdown,
            task,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel the service and wait for it to return.
    pub async fn stop(self) -> Result<()> {
        self.shutdown.cancel();
        self.join().await
    }

    /// Wait for the service to return without cancelling it.
    pub async fn join(self) -> Result<()> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(anyhow::anyhow!("service {} panicked: {}", self.name, e)),
        }
    }
}

// =============================================================================
// ServiceHost
// =============================================================================

#[derive(Default)]
pub struct ServiceHost {
    services: Vec<Box<dyn Service>>,
}

impl ServiceHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service<S: Service>(mut self, service: S) -> Self {
        self.services.push(Box::new(service));
        self
    }

    /// Run all services until Ctrl-C.
    pub async fn run_until_shutdown(self) -> Result<()> {
        let shutdown = CancellationToken::new();
        let signal_token = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
            }
            signal_token.cancel();
        });
        self.run_until(shutdown).await
    }

    /// Run all services until `shutdown` is cancelled, then wait for each to return.
    pub async fn run_until(self, shutdown: CancellationToken) -> Result<()> {
        let handles: Vec<ServiceHandle> = self
            .services
            .into_iter()
            .map(|service| ServiceHandle::spawn_with_token(service, shutdown.child_token()))
            .collect();

        info!(count = handles.len(), "services started");
        shutdown.cancelled().await;

        let results = futures::future::join_all(handles.into_iter().map(|h| async move {
            let name = h.name();
            (name, h.stop().await)
        }))
        .await;

        let mut first_error = None;
        for (name, result) in results {
            match result {
                Ok(()) => info!(service = name, "service stopped"),
                Err(e) => {
                    error!(service = name, error = %e, "service stopped with error");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
