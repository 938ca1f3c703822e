//! Capabilities the core consumes from the game runtime
//!
//! The core never talks to the game directly. Everything it reads or does
//! goes through [`HostApi`]: fresh snapshots of targets, hosts and the actor,
//! the formula source, a dispatch primitive and a completion check.

pub mod wait;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::formulas::FormulaSource;
use crate::models::{ActorAttributes, OperationKind, TargetNode, WorkerHost};

pub use wait::{check_completion, wait_for_completion, PollConfig, WaitOutcome};

/// Opaque handle of a started operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DispatchHandle(pub u64);

impl fmt::Display for DispatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid-{}", self.0)
    }
}

/// "Start `threads` threads of `kind` against `target` on `host` after `delay`"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub kind: OperationKind,
    pub threads: u32,
    pub target: String,
    pub host: String,
    pub delay: Duration,
}

/// Snapshot reads and actions offered by the host runtime
///
/// Snapshots are fresh as of the call; callers must not cache them beyond
/// one planning step.
#[async_trait]
pub trait HostApi: Send + Sync {
    async fn target(&self, name: &str) -> Option<TargetNode>;

    async fn host(&self, name: &str) -> Option<WorkerHost>;

    async fn actor(&self) -> ActorAttributes;

    /// `None` when the formula capability is not unlocked
    fn formulas(&self) -> Option<Arc<dyn FormulaSource>>;

    /// Start an operation; `None` means it did not start
    async fn dispatch(&self, request: &DispatchRequest) -> Option<DispatchHandle>;

    async fn is_running(&self, handle: DispatchHandle) -> bool;
}

#[async_trait]
impl<T: HostApi + ?Sized> HostApi for Arc<T> {
    async fn target(&self, name: &str) -> Option<TargetNode> {
        (**self).target(name).await
    }

    async fn host(&self, name: &str) -> Option<WorkerHost> {
        (**self).host(name).await
    }

    async fn actor(&self) -> ActorAttributes {
        (**self).actor().await
    }

    fn formulas(&self) -> Option<Arc<dyn FormulaSource>> {
        (**self).formulas()
    }

    async fn dispatch(&self, request: &DispatchRequest) -> Option<DispatchHandle> {
        (**self).dispatch(request).await
    }

    async fn is_running(&self, handle: DispatchHandle) -> bool {
        (**self).is_running(handle).await
    }
}
