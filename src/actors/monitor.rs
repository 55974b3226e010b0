//! HostMonitorActor - Probes the target at a fixed period
//!
//! The actor owns the alert state of its target and runs one probe cycle per
//! timer tick. Cycles run inside the actor's own loop, so two cycles never
//! overlap and the state needs no locking.
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick → Probe target → Classify → Alert state machine → Notify (on transition)
//!     ↑
//!     └─── Commands (ProbeNow, GetState, Shutdown)
//! ```
//!
//! ## Timing
//!
//! The first tick fires one period after start. If a cycle takes longer than
//! the period, the next tick fires as soon as it is done and the schedule
//! continues from there (no burst of queued ticks).

use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::alerts::Notify;
use crate::config::MonitorConfig;
use crate::error::{NotifyError, ProbeError};
use crate::monitors::probe::Probe;
use crate::monitors::state::{AlertTransition, MonitorState, ProbeOutcome};
use crate::util::PROBE_TIMEOUT_SLACK_MS;

use super::messages::{CycleReport, MonitorCommand, MonitorSnapshot};

/// Actor that monitors a single target
pub struct HostMonitorActor<P, N> {
    /// Monitor configuration
    config: MonitorConfig,

    /// Probe source for the round trips
    probe: P,

    /// Receives the alert transitions
    notifier: N,

    /// Alert state, owned exclusively by this actor
    state: MonitorState,

    /// Command receiver for control messages
    command_rx: mpsc::Receiver<MonitorCommand>,

    /// Number of completed cycles
    cycles: u64,

    last_outcome: Option<ProbeOutcome>,
}

impl<P, N> HostMonitorActor<P, N>
where
    P: Probe,
    N: Notify,
{
    pub fn new(
        config: MonitorConfig,
        probe: P,
        notifier: N,
        command_rx: mpsc::Receiver<MonitorCommand>,
    ) -> Self {
        Self {
            config,
            probe,
            notifier,
            state: MonitorState::new(),
            command_rx,
            cycles: 0,
            last_outcome: None,
        }
    }

    /// Run the actor's main loop
    ///
    /// Runs until a Shutdown command is received or every handle is dropped.
    #[instrument(skip(self), fields(target = %self.config.target))]
    pub async fn run(mut self) {
        debug!(
            "starting host monitor for {} with period {}ms",
            self.config.address,
            self.config.period.as_millis()
        );

        let period = self.config.period;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // commands first, a queued Shutdown wins over a missed tick
            tokio::select! {
                biased;

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(MonitorCommand::ProbeNow { respond_to }) => {
                            debug!("received ProbeNow command");
                            let report = self.run_cycle().await;
                            let _ = respond_to.send(report);
                        }

                        Some(MonitorCommand::GetState { respond_to }) => {
                            let _ = respond_to.send(self.snapshot());
                        }

                        Some(MonitorCommand::Shutdown) => {
                            debug!("received shutdown command");
                            break;
                        }

                        None => {
                            warn!("command channel closed, shutting down");
                            break;
                        }
                    }
                }

                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
            }
        }

        debug!("host monitor stopped after {} cycles", self.cycles);
    }

    /// Probe once, feed the outcome into the state machine and notify on a
    /// transition.
    ///
    /// Probe and notification failures are logged here and never escape.
    async fn run_cycle(&mut self) -> CycleReport {
        let started_at = Utc::now();
        let timeout = self.config.timeout;
        let deadline = timeout + Duration::from_millis(PROBE_TIMEOUT_SLACK_MS);

        let result = tokio::time::timeout(deadline, self.probe.probe(self.config.address, timeout))
            .await
            .unwrap_or(Err(ProbeError::Timeout(timeout)));

        match &result {
            Ok(latency) => trace!(
                "{}: rtt {:.3}ms (max: {}ms)",
                self.config.address,
                latency.as_secs_f64() * 1000.0,
                self.config.max_rtt.as_millis()
            ),
            Err(e) => warn!("{}: probe failed: {e}", self.config.address),
        }

        let outcome = ProbeOutcome::classify(&result, self.config.max_rtt);
        let transition = self
            .state
            .observe(&outcome, self.config.max_retries, Utc::now());

        self.cycles += 1;
        self.last_outcome = Some(outcome);

        trace!(
            "{}: {outcome:?} -> {:?} ({}/{})",
            self.config.address,
            self.state.phase(),
            self.state.consecutive_faults,
            self.config.max_retries
        );

        if let Some(transition) = &transition {
            self.dispatch(transition).await;
        }

        CycleReport {
            outcome,
            transition,
            started_at,
        }
    }

    async fn dispatch(&self, transition: &AlertTransition) {
        match transition {
            AlertTransition::Raised { reason, .. } => {
                info!("{}: alert raised: {}", self.config.target, reason.description())
            }
            AlertTransition::Cleared { .. } => info!("{}: alert cleared", self.config.target),
        }

        let notify_timeout = self.config.notify_timeout;
        match tokio::time::timeout(notify_timeout, self.notifier.notify(transition)).await {
            Ok(Ok(())) => debug!("notification dispatched"),
            Ok(Err(e)) => error!("notification failed: {e}"),
            Err(_) => error!("{}", NotifyError::Timeout(notify_timeout)),
        }
    }

    fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            target: self.config.target.clone(),
            phase: self.state.phase(),
            alarm_active: self.state.alarm_active,
            consecutive_faults: self.state.consecutive_faults,
            cycles: self.cycles,
            last_outcome: self.last_outcome,
        }
    }
}

/// Handle for controlling a HostMonitorActor
#[derive(Clone)]
pub struct HostMonitorHandle {
    sender: mpsc::Sender<MonitorCommand>,
    target: String,
}

impl HostMonitorHandle {
    /// Spawn a new host monitor actor
    ///
    /// Returns the handle and the actor's task, which finishes once the actor
    /// has shut down.
    pub fn spawn<P, N>(config: MonitorConfig, probe: P, notifier: N) -> (Self, JoinHandle<()>)
    where
        P: Probe + 'static,
        N: Notify + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let target = config.target.clone();

        let actor = HostMonitorActor::new(config, probe, notifier, cmd_rx);
        let task = tokio::spawn(actor.run());

        (
            Self {
                sender: cmd_tx,
                target,
            },
            task,
        )
    }

    /// Run a probe cycle right away
    pub async fn probe_now(&self) -> Result<CycleReport> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(MonitorCommand::ProbeNow { respond_to: tx })
            .await?;

        Ok(rx.await?)
    }

    /// Get the current alert state
    pub async fn state(&self) -> Result<MonitorSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(MonitorCommand::GetState { respond_to: tx })
            .await?;

        Ok(rx.await?)
    }

    /// Shut down the monitor after its in-flight cycle
    pub async fn shutdown(&self) {
        let _ = self.sender.send(MonitorCommand::Shutdown).await;
    }

    /// Get the monitored target
    pub fn target(&self) -> &str {
        &self.target
    }
}

// ============================================================================
// Tests
// ============================================================================
