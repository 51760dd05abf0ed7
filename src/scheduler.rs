//! Periodic probe scheduling with a non-overlap guarantee
//!
//! A start command runs one probe right away, then one per interval, plus a
//! one-second elapsed tick for display. At most one probe session exists at
//! any time: a trigger that fires while a session is active does nothing.
//! Stop cancels both timers, signals the active session (if any) and clears
//! it without waiting for the transfer to unwind.

use crate::{
    error::{AppError, ProbeError, Result},
    logging::Logger,
    models::{Measurement, ProbeTarget},
    output::{ChartSink, ProbeSink},
    probe::{cancel_pair, CancelHandle, CancelToken, Probe, TransferProgress},
    store::ResultStore,
    types::ProbeStatus,
};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

const ELAPSED_TICK: Duration = Duration::from_secs(1);

/// One in-flight probe
#[derive(Debug)]
pub struct ProbeSession {
    pub id: String,
    pub started_at_ms: i64,
    bytes_received: Arc<AtomicU64>,
    cancel: CancelHandle,
}

impl ProbeSession {
    fn new(cancel: CancelHandle) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            started_at_ms: Utc::now().timestamp_millis(),
            bytes_received: Arc::new(AtomicU64::new(0)),
            cancel,
        }
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            started_at_ms: self.started_at_ms,
            bytes_received: self.bytes_received(),
            cancelled: self.is_cancelled(),
        }
    }
}

/// Point-in-time view of the active session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub id: String,
    pub started_at_ms: i64,
    pub bytes_received: u64,
    pub cancelled: bool,
}

#[derive(Debug, Default)]
struct SlotInner {
    accepting: bool,
    session: Option<ProbeSession>,
}

/// Holder of the single active session.
///
/// Claiming and releasing happen under one lock, so two triggers can never
/// both begin a probe.
#[derive(Debug, Default)]
struct SessionSlot {
    inner: Mutex<SlotInner>,
}

impl SessionSlot {
    fn lock(&self) -> MutexGuard<'_, SlotInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn open(&self) {
        self.lock().accepting = true;
    }

    /// Install `session` unless the slot is closed or already taken
    fn try_begin(&self, session: ProbeSession) -> bool {
        let mut inner = self.lock();
        if !inner.accepting || inner.session.is_some() {
            return false;
        }
        inner.session = Some(session);
        true
    }

    /// Release the slot if `id` still owns it
    fn finish(&self, id: &str) {
        let mut inner = self.lock();
        if inner.session.as_ref().is_some_and(|s| s.id == id) {
            inner.session = None;
        }
    }

    /// Stop accepting new sessions and hand back the active one
    fn close(&self) -> Option<ProbeSession> {
        let mut inner = self.lock();
        inner.accepting = false;
        inner.session.take()
    }

    fn is_active(&self) -> bool {
        self.lock().session.is_some()
    }

    fn snapshot(&self) -> Option<SessionSnapshot> {
        self.lock().session.as_ref().map(ProbeSession::snapshot)
    }
}

/// Idle/Running state owned by the scheduler
#[derive(Debug, Default)]
pub struct SchedulerState {
    running: bool,
    started_at: Option<Instant>,
    trigger: Option<JoinHandle<()>>,
    ticker: Option<JoinHandle<()>>,
}

impl SchedulerState {
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Time since the last start command, while running
    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at.filter(|_| self.running).map(|t| t.elapsed())
    }

    fn cancel_timers(&mut self) {
        if let Some(trigger) = self.trigger.take() {
            trigger.abort();
        }
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

struct Shared {
    probe: Arc<dyn Probe>,
    store: AsyncMutex<ResultStore>,
    sink: Arc<dyn ProbeSink>,
    chart: Arc<dyn ChartSink>,
    target: ProbeTarget,
    slot: SessionSlot,
    attempts: watch::Sender<u64>,
    logger: Logger,
}

impl Shared {
    /// Claim the slot and spawn a probe; `false` if a session is active
    fn launch(self: &Arc<Self>) -> bool {
        let (handle, token) = cancel_pair();
        let session = ProbeSession::new(handle);
        let id = session.id.clone();
        let bytes = Arc::clone(&session.bytes_received);

        if !self.slot.try_begin(session) {
            return false;
        }

        let shared = Arc::clone(self);
        tokio::spawn(async move {
            let _ = shared.execute(&id, token, bytes).await;
        });
        true
    }

    /// Run one probe for the session `id` already holding the slot
    async fn execute(
        &self,
        id: &str,
        token: CancelToken,
        bytes: Arc<AtomicU64>,
    ) -> Result<Measurement> {
        self.sink.status(ProbeStatus::Downloading);
        self.sink.progress(0.0);

        let sink = Arc::clone(&self.sink);
        let counter = Arc::clone(&bytes);
        let on_progress = move |progress: TransferProgress| {
            counter.store(progress.received_bytes, Ordering::Relaxed);
            sink.progress(progress.fraction());
        };
        let outcome = self.probe.run(&self.target, &token, &on_progress).await;

        let result = match outcome {
            Ok(measurement) => self.record(id, measurement).await,
            Err(error) => {
                self.report_failure(id, &error).await;
                Err(AppError::Probe(error))
            }
        };

        self.slot.finish(id);
        self.logger
            .trace("Probe session released")
            .correlation_id(id)
            .field("bytes_received", bytes.load(Ordering::Relaxed))
            .log()
            .await;
        self.attempts.send_modify(|count| *count += 1);
        result
    }

    async fn record(&self, id: &str, measurement: Measurement) -> Result<Measurement> {
        let stored = match self.store.lock().await.append(measurement).await {
            Ok(stored) => stored,
            Err(error) => {
                self.logger
                    .error("Failed to record measurement")
                    .correlation_id(id)
                    .error_info(&error)
                    .field("error", error.to_string())
                    .log()
                    .await;
                self.sink.speed(None);
                self.sink.status(ProbeStatus::Error);
                return Err(error);
            }
        };

        self.logger
            .info("Probe completed")
            .correlation_id(id)
            .measurement(&stored)
            .log()
            .await;

        self.sink.speed(Some(stored.speed_mbps));
        self.sink.status(ProbeStatus::Completed);
        self.publish().await?;
        Ok(stored)
    }

    async fn report_failure(&self, id: &str, error: &ProbeError) {
        if error.is_cancelled() {
            self.logger
                .info("Probe cancelled")
                .correlation_id(id)
                .log()
                .await;
        } else {
            self.logger
                .warn("Probe failed")
                .correlation_id(id)
                .probe_error(error)
                .log()
                .await;
            self.sink.speed(None);
        }
        self.sink.status(ProbeStatus::from(error));
    }

    /// Push aggregates and the chart series for the current log
    async fn publish(&self) -> Result<()> {
        let store = self.store.lock().await;
        let log = store.all().await?;
        drop(store);

        let aggregates = crate::models::Aggregates::from_log(&log);
        let points: Vec<_> = log.iter().map(Measurement::chart_point).collect();
        self.sink.aggregates(&aggregates);
        self.chart.render(&points);
        Ok(())
    }
}

/// Start/stop controller for periodic probes
pub struct ProbeScheduler {
    shared: Arc<Shared>,
    interval: Duration,
    state: SchedulerState,
}

impl ProbeScheduler {
    pub fn new(
        probe: Arc<dyn Probe>,
        store: ResultStore,
        sink: Arc<dyn ProbeSink>,
        chart: Arc<dyn ChartSink>,
        target: ProbeTarget,
        interval: Duration,
        logger: Logger,
    ) -> Self {
        let (attempts, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                probe,
                store: AsyncMutex::new(store),
                sink,
                chart,
                target,
                slot: SessionSlot::default(),
                attempts,
                logger: logger.named("SCHEDULER"),
            }),
            interval: interval.max(Duration::from_millis(1)),
            state: SchedulerState::default(),
        }
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    /// Whether a probe session currently holds the slot
    pub fn is_probe_active(&self) -> bool {
        self.shared.slot.is_active()
    }

    /// The session holding the slot, if any
    pub fn active_session(&self) -> Option<SessionSnapshot> {
        self.shared.slot.snapshot()
    }

    /// Watch the number of finished attempts, whatever their outcome
    pub fn subscribe_attempts(&self) -> watch::Receiver<u64> {
        self.shared.attempts.subscribe()
    }

    /// Show what is already stored: aggregates, chart and `Idle`
    pub async fn bootstrap(&self) -> Result<()> {
        self.shared.publish().await?;
        self.shared.sink.status(ProbeStatus::Idle);
        Ok(())
    }

    /// Enter Running: probe now, then every interval. No-op when running.
    pub fn start(&mut self) {
        if self.state.running {
            return;
        }

        let sink = &self.shared.sink;
        sink.status(ProbeStatus::Initiating);
        sink.elapsed(Duration::ZERO);
        sink.speed(None);

        self.shared.slot.open();
        let started_at = Instant::now();
        self.state.running = true;
        self.state.started_at = Some(started_at);

        let shared = Arc::clone(&self.shared);
        let interval = self.interval;
        self.state.trigger = Some(tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                timer.tick().await;
                if !shared.launch() {
                    shared
                        .logger
                        .debug("Trigger skipped, probe still active")
                        .log()
                        .await;
                }
            }
        }));

        let sink = Arc::clone(&self.shared.sink);
        self.state.ticker = Some(tokio::spawn(async move {
            let first = tokio::time::Instant::now() + ELAPSED_TICK;
            let mut timer = tokio::time::interval_at(first, ELAPSED_TICK);
            loop {
                timer.tick().await;
                sink.elapsed(Duration::from_secs(started_at.elapsed().as_secs()));
            }
        }));
    }

    /// Fire the trigger by hand; `false` when stopped or a probe is active
    pub fn trigger(&self) -> bool {
        self.state.running && self.shared.launch()
    }

    /// Enter Idle. Safe to call in any state and any number of times.
    pub fn stop(&mut self) {
        self.state.cancel_timers();
        self.state.running = false;

        if let Some(session) = self.shared.slot.close() {
            session.cancel.cancel();
        }

        self.shared.sink.status(ProbeStatus::Stopped);
    }

    /// Run a single probe to completion outside the periodic schedule
    pub async fn run_once(&self) -> Result<Measurement> {
        if self.state.running {
            return Err(AppError::internal("Scheduler is already running"));
        }

        let (handle, token) = cancel_pair();
        let session = ProbeSession::new(handle);
        let id = session.id.clone();
        let bytes = Arc::clone(&session.bytes_received);

        self.shared.slot.open();
        let claimed = self.shared.slot.try_begin(session);
        if !claimed {
            self.shared.slot.close();
            return Err(AppError::internal("A probe is already active"));
        }

        let result = self.shared.execute(&id, token, bytes).await;
        self.shared.slot.close();
        result
    }
}

impl Drop for ProbeScheduler {
    fn drop(&mut self) {
        self.state.cancel_timers();
        if let Some(session) = self.shared.slot.close() {
            session.cancel.cancel();
        }
    }
}
