//! Unified error handling for the hwgw crate
//!
//! Domain errors (currently [`PlanError`]) fold into a single [`Error`] enum.
//! Every error carries a [`ErrorCategory`] and knows whether the manager loop
//! may absorb it or must stop.
//!
//! # Propagation
//!
//! Only startup errors are fatal: a missing formula source, an unknown target
//! or an unknown host. Planning and dispatch failures during the prep and
//! batching loops are recoverable; the manager logs them and backs off.
//!
//! ```rust,ignore
//! use hwgw::error::{Error, ErrorClass};
//!
//! fn handle(err: Error) {
//!     if err.is_recoverable() {
//!         tracing::warn!(error = %err, "transient failure, backing off");
//!     } else {
//!         tracing::error!(category = ?err.category(), "fatal: {}", err);
//!     }
//! }
//! ```

use thiserror::Error;

pub use crate::planner::PlanError;

/// Common interface of every error type in the crate
pub trait ErrorClass: std::error::Error {
    /// Whether the manager loop can retry after this error
    fn is_recoverable(&self) -> bool;

    /// Error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Missing capability, unknown target or host
    Startup,
    /// No plan fits the available memory
    Planning,
    /// An operation could not be placed or started
    Dispatch,
    /// Metrics registry errors
    Metrics,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Planning => "planning",
            Self::Dispatch => "dispatch",
            Self::Metrics => "metrics",
        }
    }
}

/// Unified error type for the hwgw crate
#[derive(Error, Debug)]
pub enum Error {
    /// The formula/attribute source lacks a required capability
    #[error("attribute source unavailable: {capability}")]
    AttributeSourceUnavailable { capability: String },

    /// Named target is absent from the state snapshot
    #[error("target '{0}' not found in state snapshot")]
    TargetUnknown(String),

    /// Named host is absent from the state snapshot
    #[error("host '{0}' not found in state snapshot")]
    HostUnknown(String),

    /// The planner found no feasible batch
    #[error("planning infeasible: {0}")]
    PlanningInfeasible(#[from] PlanError),

    /// An operation could not be placed or started
    #[error("dispatch rejected for {operation}: {reason}")]
    DispatchRejected { operation: String, reason: String },

    /// Metrics registration errors
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl ErrorClass for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::PlanningInfeasible(e) => e.is_recoverable(),
            Self::DispatchRejected { .. } => true,
            Self::AttributeSourceUnavailable { .. }
            | Self::TargetUnknown(_)
            | Self::HostUnknown(_)
            | Self::Metrics(_) => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::AttributeSourceUnavailable { .. } | Self::TargetUnknown(_) | Self::HostUnknown(_) => {
                ErrorCategory::Startup
            }
            Self::PlanningInfeasible(_) => ErrorCategory::Planning,
            Self::DispatchRejected { .. } => ErrorCategory::Dispatch,
            Self::Metrics(_) => ErrorCategory::Metrics,
        }
    }
}

impl Error {
    /// Create an attribute source error naming the missing capability
    pub fn attribute_source(capability: impl Into<String>) -> Self {
        Self::AttributeSourceUnavailable {
            capability: capability.into(),
        }
    }

    /// Create a dispatch rejection
    pub fn dispatch_rejected(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DispatchRejected {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Errors that must stop the process before the manager loop starts
    pub fn is_fatal(&self) -> bool {
        self.category() == ErrorCategory::Startup
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RamMb;

    #[test]
    fn test_startup_errors_are_fatal() {
        for err in [
            Error::attribute_source("formulas"),
            Error::TargetUnknown("n00dles".into()),
            Error::HostUnknown("pserv-0".into()),
        ] {
            assert_eq!(err.category(), ErrorCategory::Startup);
            assert!(err.is_fatal());
            assert!(!err.is_recoverable());
        }
    }

    #[test]
    fn test_steady_state_errors_are_recoverable() {
        let plan_err: Error = PlanError::InsufficientMemory {
            target: "n00dles".into(),
            ceiling: RamMb(1000),
            smallest: Some(RamMb(7000)),
        }
        .into();
        assert_eq!(plan_err.category(), ErrorCategory::Planning);
        assert!(plan_err.is_recoverable());

        let dispatch_err = Error::dispatch_rejected("grow", "pserv-0 refused 3 threads");
        assert_eq!(dispatch_err.category(), ErrorCategory::Dispatch);
        assert!(dispatch_err.is_recoverable());
        assert!(dispatch_err.to_string().contains("refused 3"));
    }

    #[test]
    fn test_metrics_errors_convert() {
        let err: Error = prometheus::Error::Msg("duplicate collector".into()).into();
        assert_eq!(err.category(), ErrorCategory::Metrics);
        assert_eq!(err.category().as_str(), "metrics");
        assert!(!err.is_recoverable());
        assert!(!err.is_fatal());
    }
}
