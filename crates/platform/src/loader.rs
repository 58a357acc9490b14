//! Background model loading with a single-use result channel.

use std::thread;

use anyhow::{Result, anyhow};
use asset::{DefaultFetcher, ResourceFetcher};
use crossbeam::channel::{self, Receiver, TryRecvError};

use crate::{
    assembly::{PreparedModel, prepare_model},
    config::AppConfig,
};

/// Receiving end of one phase-1 run.
pub struct PendingModel {
    rx: Option<Receiver<Result<PreparedModel>>>,
}

impl PendingModel {
    /// Non-blocking. Yields the outcome once, then `None` forever.
    pub fn poll(&mut self) -> Option<Result<PreparedModel>> {
        let rx = self.rx.as_ref()?;
        let outcome = match rx.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(anyhow!("model loader disconnected")),
        };
        self.rx = None;
        Some(outcome)
    }

    fn ready(outcome: Result<PreparedModel>) -> Self {
        let (tx, rx) = channel::bounded(1);
        let _ = tx.send(outcome);
        Self { rx: Some(rx) }
    }

    pub fn is_resolved(&self) -> bool {
        self.rx.is_none()
    }
}

/// Run phase 1 on a loader thread using the given fetcher.
pub fn spawn_with_fetcher<F>(config: AppConfig, fetcher: F) -> PendingModel
where
    F: ResourceFetcher + 'static,
{
    let (tx, rx) = channel::bounded(1);
    let spawned = thread::Builder::new()
        .name("model-loader".into())
        .spawn(move || {
            log::debug!("Loading model from {}", config.model);
            let outcome = prepare_model(&config, &fetcher);
            // The receiver may already be gone on shutdown.
            let _ = tx.send(outcome);
        });
    if let Err(err) = spawned {
        log::error!("Failed to spawn model loader: {err}");
    }
    PendingModel { rx: Some(rx) }
}

/// Run phase 1 on a loader thread, fetching over HTTP(S) or from disk.
pub fn spawn_model_load(config: AppConfig) -> PendingModel {
    match DefaultFetcher::new() {
        Ok(fetcher) => spawn_with_fetcher(config, fetcher),
        Err(err) => PendingModel::ready(Err(
            anyhow::Error::new(err).context("Failed to create HTTP client")
        )),
    }
}
