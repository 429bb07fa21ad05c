// ── Status poller ──
//
// A background task that fetches a fresh snapshot on a fixed interval
// and publishes it through a watch channel (latest wins). Polls never
// overlap: a tick that fires while a poll is outstanding is dropped.
// Errors never escape; they only show up as staleness and counters.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::StatusSnapshot;

/// Consecutive failures after which the snapshot is flagged stale.
pub const STALE_AFTER_FAILURES: u32 = 3;

/// Shortest interval a poller will tick at.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Anything that can produce a status snapshot.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self) -> Result<StatusSnapshot, CoreError>;
}

/// What subscribers see.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollState {
    /// Last good snapshot; `None` until the first successful poll.
    pub snapshot: Option<Arc<StatusSnapshot>>,
    pub stale: bool,
    pub consecutive_failures: u32,
    pub total_failures: u64,
    pub last_error: Option<String>,
}

struct Shared {
    source: Arc<dyn StatusSource>,
    in_flight: AtomicBool,
    state: watch::Sender<PollState>,
}

/// Clears the in-flight flag even if the poll future is dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Shared {
    /// Run one poll unless another is outstanding. Returns `false` if skipped.
    async fn poll_once(&self) -> bool {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("poll already in flight; skipping");
            return false;
        }
        let _guard = InFlight(&self.in_flight);

        let result = self.source.fetch_status().await;
        self.state.send_modify(|state| match result {
            Ok(snapshot) => {
                state.snapshot = Some(Arc::new(snapshot));
                state.stale = false;
                state.consecutive_failures = 0;
                state.last_error = None;
            }
            Err(e) => {
                state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                state.total_failures = state.total_failures.saturating_add(1);
                if state.consecutive_failures >= STALE_AFTER_FAILURES {
                    state.stale = true;
                }
                warn!(
                    error = %e,
                    consecutive = state.consecutive_failures,
                    stale = state.stale,
                    "status poll failed"
                );
                state.last_error = Some(e.to_string());
            }
        });
        true
    }
}

/// A poller that has not been started yet.
pub struct Poller {
    shared: Arc<Shared>,
    interval: Duration,
}

impl Poller {
    /// Intervals below [`MIN_POLL_INTERVAL`] are raised to it.
    pub fn new(source: Arc<dyn StatusSource>, interval: Duration) -> Self {
        if interval < MIN_POLL_INTERVAL {
            warn!(?interval, min = ?MIN_POLL_INTERVAL, "poll interval too short; clamping");
        }
        let interval = interval.max(MIN_POLL_INTERVAL);
        let (state, _) = watch::channel(PollState::default());
        Self {
            shared: Arc::new(Shared {
                source,
                in_flight: AtomicBool::new(false),
                state,
            }),
            interval,
        }
    }

    /// Spawn the polling task. The first poll runs immediately.
    pub fn start(self) -> PollerHandle {
        let cancel = CancellationToken::new();
        let rx = self.shared.state.subscribe();
        let task = tokio::spawn(poll_task(
            Arc::clone(&self.shared),
            self.interval,
            cancel.clone(),
        ));
        PollerHandle {
            shared: self.shared,
            cancel,
            task: Some(task),
            rx,
        }
    }
}

/// Owner of a running poller. Dropping it cancels the task.
pub struct PollerHandle {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    rx: watch::Receiver<PollState>,
}

impl PollerHandle {
    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.rx.clone()
    }

    /// Current published state.
    pub fn latest(&self) -> PollState {
        self.rx.borrow().clone()
    }

    /// Poll now, outside the schedule. Returns `false` if a poll was
    /// already in flight.
    pub async fn refresh(&self) -> bool {
        self.shared.poll_once().await
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop scheduling ticks and wait for the task to exit. An in-flight
    /// poll is abandoned.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn poll_task(shared: Arc<Shared>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = shared.poll_once() => {}
                }
            }
        }
    }
    debug!("status poller stopped");
}
