//! Alert state machine
//!
//! Turns the per-cycle probe outcomes into a small number of alert
//! transitions. Faults are counted until the retry budget is exhausted, after
//! which exactly one alert is raised. A single healthy outcome clears it.
//!
//! ```text
//!            fault × (max_retries + 1)
//!   Normal ─────────────────────────────► Alarmed
//!     ▲                                     │
//!     └──────────────── healthy ────────────┘
//! ```
//!
//! Every other input loops on the current state.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProbeError;

/// Result of one probe cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProbeOutcome {
    Healthy { latency: Duration },
    /// Round trip time above the configured maximum
    Degraded { latency: Duration },
    Unreachable,
}

impl ProbeOutcome {
    /// Classify a probe result against the maximum round trip time.
    ///
    /// A latency equal to `max_rtt` is still healthy.
    pub fn classify(result: &Result<Duration, ProbeError>, max_rtt: Duration) -> ProbeOutcome {
        match result {
            Ok(latency) if *latency > max_rtt => ProbeOutcome::Degraded { latency: *latency },
            Ok(latency) => ProbeOutcome::Healthy { latency: *latency },
            Err(_) => ProbeOutcome::Unreachable,
        }
    }

    pub fn is_fault(&self) -> bool {
        !matches!(self, ProbeOutcome::Healthy { .. })
    }

    /// Alert reason this outcome would raise, `None` for healthy outcomes
    pub fn reason(&self) -> Option<AlertReason> {
        match self {
            ProbeOutcome::Healthy { .. } => None,
            ProbeOutcome::Degraded { .. } => Some(AlertReason::HighRtt),
            ProbeOutcome::Unreachable => Some(AlertReason::NoResponse),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertReason {
    NoResponse,
    HighRtt,
}

impl AlertReason {
    pub fn description(&self) -> &'static str {
        match self {
            AlertReason::NoResponse => "Host is unresponsive.",
            AlertReason::HighRtt => "High RTT detected, host may be unresponsive.",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AlertReason::NoResponse => "no_response",
            AlertReason::HighRtt => "high_rtt",
        }
    }
}

/// Alert edge emitted by [`MonitorState::observe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertTransition {
    Raised {
        reason: AlertReason,
        occurred_at: DateTime<Utc>,
    },
    Cleared {
        occurred_at: DateTime<Utc>,
    },
}

impl AlertTransition {
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AlertTransition::Raised { occurred_at, .. }
            | AlertTransition::Cleared { occurred_at } => *occurred_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Normal,
    Alarmed,
}

/// Per-target alert state
///
/// Owned by exactly one scheduler; the scheduler never runs two cycles at the
/// same time, so no locking is needed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorState {
    pub alarm_active: bool,
    pub consecutive_faults: u32,
}

impl MonitorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        if self.alarm_active {
            Phase::Alarmed
        } else {
            Phase::Normal
        }
    }

    /// Feed one probe outcome into the state machine.
    ///
    /// Up to `max_retries` consecutive faults are tolerated; the next one
    /// raises. Degraded and unreachable outcomes share the same counter, and
    /// the raised reason comes from the outcome that crossed the threshold.
    /// While alarmed, further faults are swallowed until a healthy outcome
    /// clears the alarm.
    pub fn observe(
        &mut self,
        outcome: &ProbeOutcome,
        max_retries: u32,
        now: DateTime<Utc>,
    ) -> Option<AlertTransition> {
        let Some(reason) = outcome.reason() else {
            let was_alarmed = self.alarm_active;
            self.alarm_active = false;
            self.consecutive_faults = 0;

            return was_alarmed.then_some(AlertTransition::Cleared { occurred_at: now });
        };

        if self.alarm_active {
            return None;
        }

        self.consecutive_faults = self.consecutive_faults.saturating_add(1);
        if self.consecutive_faults <= max_retries {
            return None;
        }

        self.alarm_active = true;
        self.consecutive_faults = 0;

        Some(AlertTransition::Raised {
            reason,
            occurred_at: now,
        })
    }
}
