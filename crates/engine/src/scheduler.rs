//! Polling scheduler.
//!
//! One tokio task per source monitor fires immediately and then every
//! `poll_interval_secs`. Each tick runs the pipeline
//! fetch → deliver (via the guard) → merge into the store.
//!
//! Cancellation is only observed between ticks, so an in-flight fetch always
//! runs to completion; `stop` bounds how long it waits for that.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use beacon_common::config::{AppConfig, ConfigUpdate};
use beacon_common::error::FetchError;
use beacon_common::types::{Notification, Source};
use beacon_monitors::{CommunityMonitor, FeedBatch, GithubMonitor, SourceMonitor};
use beacon_notifier::DeliveryGuard;

use crate::store::NotificationStore;

/// Builds the monitor set for a configuration.
///
/// Order matters: it fixes the loop slots and the processing order of
/// manual checks.
pub type MonitorFactory = Box<dyn Fn(&AppConfig) -> Vec<Arc<dyn SourceMonitor>> + Send + Sync>;

/// Production monitor set: community site first, then the issue tracker.
pub fn default_monitors(config: &AppConfig) -> Vec<Arc<dyn SourceMonitor>> {
    vec![
        Arc::new(CommunityMonitor::from_config(config)),
        Arc::new(GithubMonitor::from_config(config)),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Stopped,
    Running,
    Stopping,
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulerState::Stopped => write!(f, "stopped"),
            SchedulerState::Running => write!(f, "running"),
            SchedulerState::Stopping => write!(f, "stopping"),
        }
    }
}

struct Lifecycle {
    state: SchedulerState,
    cancel: Option<CancellationToken>,
}

/// State shared with the spawned loops.
struct Shared {
    config: RwLock<AppConfig>,
    monitors: RwLock<Arc<Vec<Arc<dyn SourceMonitor>>>>,
    store: Arc<NotificationStore>,
    guard: Arc<DeliveryGuard>,
}

impl Shared {
    fn monitor(&self, slot: usize) -> Option<Arc<dyn SourceMonitor>> {
        self.monitors.read().get(slot).cloned()
    }

    fn monitors(&self) -> Arc<Vec<Arc<dyn SourceMonitor>>> {
        self.monitors.read().clone()
    }

    /// Run one tick for a monitor.
    async fn check(&self, monitor: &dyn SourceMonitor) {
        let source = monitor.source();

        for FeedBatch { feed, result } in monitor.poll().await {
            match result {
                Ok(items) if items.is_empty() => {
                    tracing::debug!(source = %source, feed, "No new notifications");
                }
                Ok(items) => self.process(source, feed, &items).await,
                Err(FetchError::MissingToken(_)) => {
                    tracing::warn!(source = %source, feed, "Skipping check, token is not configured");
                }
                Err(e) => {
                    tracing::error!(source = %source, feed, error = %e, "Check failed");
                }
            }
        }
    }

    async fn process(&self, source: Source, feed: &str, items: &[Notification]) {
        let report = self.guard.deliver_batch(items).await;
        let outcome = self.store.add(items);

        tracing::info!(
            source = %source,
            feed,
            fetched = items.len(),
            sent = report.sent,
            skipped = report.skipped,
            failed = report.failed,
            added = outcome.added,
            moved = outcome.moved,
            "Processed notifications"
        );
    }
}

async fn run_loop(shared: Arc<Shared>, slot: usize, period: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(monitor) = shared.monitor(slot) else {
            tracing::debug!(slot, "No monitor in slot, skipping tick");
            continue;
        };
        shared.check(monitor.as_ref()).await;
    }

    tracing::debug!(slot, "Polling loop exited");
}

/// Owns the polling loops and their lifecycle.
pub struct Scheduler {
    shared: Arc<Shared>,
    factory: MonitorFactory,
    lifecycle: Mutex<Lifecycle>,
    /// Polling loops and manual checks; `stop` waits on all of them.
    tracker: TaskTracker,
}

impl Scheduler {
    pub fn new(
        config: AppConfig,
        store: Arc<NotificationStore>,
        guard: Arc<DeliveryGuard>,
        factory: MonitorFactory,
    ) -> Self {
        let monitors = Arc::new(factory(&config));

        Self {
            shared: Arc::new(Shared {
                config: RwLock::new(config),
                monitors: RwLock::new(monitors),
                store,
                guard,
            }),
            factory,
            lifecycle: Mutex::new(Lifecycle {
                state: SchedulerState::Stopped,
                cancel: None,
            }),
            tracker: TaskTracker::new(),
        }
    }

    /// Spawn one polling loop per monitor. No-op unless stopped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.state != SchedulerState::Stopped {
            tracing::debug!(state = %lifecycle.state, "Scheduler already started");
            return;
        }

        let period = Duration::from_secs(self.shared.config.read().poll_interval_secs);
        let cancel = CancellationToken::new();
        let slots = self.shared.monitors().len();

        self.tracker.reopen();
        for slot in 0..slots {
            self.tracker
                .spawn(run_loop(self.shared.clone(), slot, period, cancel.clone()));
        }
        lifecycle.cancel = Some(cancel);
        lifecycle.state = SchedulerState::Running;

        tracing::info!(
            monitors = slots,
            poll_interval_secs = period.as_secs(),
            "Scheduler started"
        );
    }

    /// Cancel the loops and wait for in-flight checks, manual ones included,
    /// up to the configured shutdown timeout. Tasks still busy after the
    /// timeout are detached.
    pub async fn stop(&self) {
        let cancel = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state != SchedulerState::Running {
                tracing::debug!(state = %lifecycle.state, "Scheduler not running, nothing to stop");
                return;
            }
            lifecycle.state = SchedulerState::Stopping;
            lifecycle.cancel.take()
        };

        tracing::info!(tasks = self.tracker.len(), "Stopping scheduler...");
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        self.tracker.close();

        let timeout = Duration::from_secs(self.shared.config.read().shutdown_timeout_secs);
        if tokio::time::timeout(timeout, self.tracker.wait()).await.is_err() {
            tracing::warn!(
                timeout_secs = timeout.as_secs(),
                pending = self.tracker.len(),
                "Timed out waiting for scheduler tasks, continuing shutdown"
            );
        }

        self.lifecycle.lock().state = SchedulerState::Stopped;
        tracing::info!("Scheduler stopped");
    }

    /// Run every monitor once, in order, outside the timer.
    ///
    /// Returns `None` (and does nothing) unless the scheduler is running. The
    /// check is tracked like a polling loop, so a concurrent `stop` waits for
    /// it.
    pub fn trigger_check(&self) -> Option<JoinHandle<()>> {
        let lifecycle = self.lifecycle.lock();
        if lifecycle.state != SchedulerState::Running {
            tracing::warn!(state = %lifecycle.state, "Manual check requested while scheduler is not running");
            return None;
        }

        let shared = self.shared.clone();
        tracing::info!("Manual check triggered");

        Some(self.tracker.spawn(async move {
            let monitors = shared.monitors();
            for monitor in monitors.iter() {
                shared.check(monitor.as_ref()).await;
            }
        }))
    }

    /// Replace the configuration and rebuild the monitor set.
    ///
    /// Running loops pick up the new monitors on their next tick. The poll
    /// interval only takes effect for loops started after this call.
    pub fn update_config(&self, config: AppConfig) -> anyhow::Result<()> {
        config.validate()?;

        let mut current = self.shared.config.write();
        self.install(&config);
        *current = config;
        Ok(())
    }

    /// Merge a partial update into the current configuration and install it.
    ///
    /// The read-merge-write runs under the config write lock, so concurrent
    /// updates to different fields all survive. Returns the installed config.
    pub fn apply_update(&self, update: &ConfigUpdate) -> anyhow::Result<AppConfig> {
        let mut current = self.shared.config.write();
        let next = current.with_update(update)?;

        self.install(&next);
        *current = next.clone();
        Ok(next)
    }

    /// Rebuild monitors for `config`. Callers hold the config write lock.
    fn install(&self, config: &AppConfig) {
        let monitors = Arc::new((self.factory)(config));
        *self.shared.monitors.write() = monitors;

        tracing::info!(
            poll_interval_secs = config.poll_interval_secs,
            "Configuration updated, monitors rebuilt"
        );
    }

    pub fn state(&self) -> SchedulerState {
        self.lifecycle.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == SchedulerState::Running
    }

    pub fn config(&self) -> AppConfig {
        self.shared.config.read().clone()
    }

    pub fn recent_notifications(&self) -> Vec<Notification> {
        self.shared.store.list()
    }
}
