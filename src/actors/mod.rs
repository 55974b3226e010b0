//! Actor-based monitoring
//!
//! The monitor runs as an independent async task that is controlled through a
//! cloneable handle over a Tokio mpsc channel.
//!
//! ## Actor Types
//!
//! - **HostMonitorActor**: Probes the target at a fixed period and drives the
//!   alert state machine
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: The actor has an mpsc command channel for control messages
//! 2. **Request/Response**: oneshot channels for synchronous queries

pub mod messages;
pub mod monitor;
