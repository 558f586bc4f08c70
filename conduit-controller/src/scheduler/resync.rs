//! Resync loop
//!
//! Lists the namespace's invocations each tick and reconciles them one at a
//! time. Errors are logged per invocation and never stop the loop.

use anyhow::{Context, Result};
use conduit_client::ResourceStore;
use conduit_core::api::{API_VERSION, PIPELINE_INVOCATION_KIND};
use std::sync::Arc;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::reconciler::{Reconciler, Route};

/// Counts for one resync cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResyncSummary {
    /// Passes that took a non-idle route
    pub reconciled: usize,
    pub failed: usize,
}

/// Periodic driver of the reconciler
pub struct ResyncLoop {
    config: Config,
    store: Arc<dyn ResourceStore>,
    reconciler: Reconciler,
}

impl ResyncLoop {
    pub fn new(config: Config, store: Arc<dyn ResourceStore>) -> Self {
        let reconciler = Reconciler::new(Arc::clone(&store));
        Self {
            config,
            store,
            reconciler,
        }
    }

    /// Starts the resync loop
    pub async fn run(&self) -> Result<()> {
        info!(
            "Starting resync loop for namespace {} (interval: {:?})",
            self.config.namespace, self.config.resync_interval
        );

        let mut interval = time::interval(self.config.resync_interval);

        loop {
            interval.tick().await;

            match self.resync_once().await {
                Ok(summary) => {
                    if summary.reconciled > 0 || summary.failed > 0 {
                        info!(
                            "Resync cycle: {} reconciled, {} failed",
                            summary.reconciled, summary.failed
                        );
                    }
                }
                Err(e) => {
                    error!("Error during resync cycle: {:#}", e);
                }
            }
        }
    }

    /// Performs a single resync cycle
    pub async fn resync_once(&self) -> Result<ResyncSummary> {
        let documents = self
            .store
            .list(API_VERSION, PIPELINE_INVOCATION_KIND, &self.config.namespace)
            .await
            .context("Failed to list invocations")?;

        debug!("Found {} invocation(s)", documents.len());

        let mut summary = ResyncSummary::default();

        for document in documents {
            let name = document.name().to_string();

            match self.reconciler.reconcile_document(document).await {
                Ok(outcome) if outcome.route == Route::Idle => {
                    debug!("Invocation {} idle", name);
                }
                Ok(outcome) => {
                    debug!(
                        "Invocation {} took route {} (phase: {:?}, requeue: {})",
                        name, outcome.route, outcome.phase, outcome.requeue
                    );
                    summary.reconciled += 1;
                }
                Err(e) if e.is_retryable() => {
                    warn!("Reconcile of invocation {} failed, will retry: {}", name, e);
                    summary.failed += 1;
                }
                Err(e) => {
                    error!("Reconcile of invocation {} failed: {}", name, e);
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }
}
