//! Manager states and step outcomes

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ErrorCategory;
use crate::host::WaitOutcome;

/// Where the manager loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ManagerState {
    /// Target state not yet checked
    Unprepped,
    /// Driving the target back to max value / min security
    Prepping,
    /// Prepped, batching starts on the next step
    PreppedIdle,
    /// Launching overlapping batches
    Batching,
}

impl ManagerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unprepped => "unprepped",
            Self::Prepping => "prepping",
            Self::PreppedIdle => "prepped-idle",
            Self::Batching => "batching",
        }
    }

    /// Numeric code for the state gauge
    pub fn code(&self) -> i64 {
        match self {
            Self::Unprepped => 0,
            Self::Prepping => 1,
            Self::PreppedIdle => 2,
            Self::Batching => 3,
        }
    }
}

impl fmt::Display for ManagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why batching was interrupted for a prep pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResyncTrigger {
    /// Launched-batch counter hit its limit
    BatchLimit,
    /// Too many launch failures in a row
    ConsecutiveFailures,
}

impl ResyncTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BatchLimit => "batch_limit",
            Self::ConsecutiveFailures => "consecutive_failures",
        }
    }
}

impl fmt::Display for ResyncTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a single manager step did
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Initial observation of the target
    Observed { prepped: bool },
    /// In-flight batch operations drained before prepping
    Drained { outcome: WaitOutcome },
    /// Prep operations were dispatched and waited on
    PrepRound { threads: u32, outcome: WaitOutcome },
    /// No prep operation could be started this round
    PrepStalled,
    /// Target found prepped
    PrepComplete,
    /// Batching (re)started
    BatchingStarted { failure_threshold: u32 },
    /// A batch was dispatched
    BatchLaunched {
        launched: u32,
        extract_percent: u32,
        resync: Option<ResyncTrigger>,
    },
    /// A batch could not be planned or placed
    BatchFailed {
        consecutive: u32,
        category: ErrorCategory,
        resync: Option<ResyncTrigger>,
    },
}

impl StepOutcome {
    pub fn resync(&self) -> Option<ResyncTrigger> {
        match self {
            Self::BatchLaunched { resync, .. } | Self::BatchFailed { resync, .. } => *resync,
            _ => None,
        }
    }
}
