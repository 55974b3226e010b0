//! Message types for actor communication
//!
//! Commands are sent to the monitor actor via mpsc, answers come back through
//! oneshot channels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::monitors::state::{AlertTransition, Phase, ProbeOutcome};

/// Commands that can be sent to a HostMonitorActor
#[derive(Debug)]
pub enum MonitorCommand {
    /// Run one probe cycle right away (bypassing the interval timer)
    ///
    /// The cycle never overlaps with a scheduled one.
    ProbeNow {
        respond_to: oneshot::Sender<CycleReport>,
    },

    /// Get the current alert state
    GetState {
        respond_to: oneshot::Sender<MonitorSnapshot>,
    },

    /// Gracefully shut down the monitor
    ///
    /// The actor finishes any in-flight cycle and then exits.
    Shutdown,
}

/// Result of one probe cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub outcome: ProbeOutcome,

    /// Transition emitted by this cycle, if any
    pub transition: Option<AlertTransition>,

    /// When the cycle started
    pub started_at: DateTime<Utc>,
}

/// Current alert state of the monitored target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    pub target: String,
    pub phase: Phase,
    pub alarm_active: bool,
    pub consecutive_faults: u32,

    /// Number of completed cycles
    pub cycles: u64,

    pub last_outcome: Option<ProbeOutcome>,
}
