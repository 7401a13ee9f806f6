use crate::backend::BackendClient;
use crate::ledger::LedgerInterface;
use crate::types::Notification;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Counts in-flight backend requests. `loading()` is true while any
/// [`LoadingGuard`] is alive.
#[derive(Clone, Default, Debug)]
pub struct LoadingTracker {
    in_flight: Arc<AtomicUsize>,
}

pub struct LoadingGuard {
    in_flight: Arc<AtomicUsize>,
}

impl LoadingTracker {
    pub fn start(&self) -> LoadingGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        LoadingGuard { in_flight: self.in_flight.clone() }
    }

    pub fn loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Refreshes the network analysis summary on a fixed interval.
pub struct AnalysisPoller {
    backend: BackendClient,
    ledger: LedgerInterface,
    loading: LoadingTracker,
    period: Duration,
    token: CancellationToken,
}

impl AnalysisPoller {
    pub fn new(
        backend: BackendClient,
        ledger: LedgerInterface,
        loading: LoadingTracker,
        period: Duration,
        token: CancellationToken,
    ) -> Self {
        Self {backend, ledger, loading, period, token}
    }

    /// Runs until cancelled. Every tick spawns its own refresh, a slow one
    /// doesn't hold back the next and whichever finishes last wins.
    pub async fn run(self) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = self.token.cancelled() => {
                    log::debug!("Analysis poller stopped");
                    return
                }
                _ = ticker.tick() => {
                    let backend = self.backend.clone();
                    let ledger = self.ledger.clone();
                    let loading = self.loading.clone();
                    tokio::spawn(async move {
                        refresh(&backend, &ledger, &loading).await
                    });
                }
            }
        }
    }
}

/// One refresh of the analysis slot. Failures end up as a notification.
pub async fn refresh(backend: &BackendClient, ledger: &LedgerInterface, loading: &LoadingTracker) -> bool {
    let _guard = loading.start();
    let result = match backend.network_analysis().await {
        Ok(data) => ledger.set_analysis(data).await,
        Err(error) => {
            log::error!("Error fetching network analysis: {}", error);
            let notification = Notification::error("Error fetching network analysis");
            if let Err(error) = ledger.notify(notification).await {
                log::error!("Failed to queue notification: {}", error);
            }
            return false;
        }
    };
    match result {
        Ok(()) => true,
        Err(error) => {
            log::error!("Failed to store network analysis: {}", error);
            false
        }
    }
}
