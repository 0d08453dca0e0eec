//! Per-invocation execution context.
//!
//! Replaces any global timer/logging side channel: every operation in a
//! run receives the same context, which owns the invocation id, the
//! bundler registry, and the invocation timer with a lifecycle tied to
//! the call stack.

use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::registry::BundlerRegistry;

/// Context threaded through one orchestrator invocation (and each
/// watch-triggered re-run, which gets a fresh context and timer).
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Capability registry used to resolve named bundler references.
    pub registry: Arc<BundlerRegistry>,
    /// Time-sortable id for correlating log lines of one invocation.
    pub invocation_id: Uuid,
    started: Instant,
}

impl RunContext {
    pub fn new(registry: Arc<BundlerRegistry>) -> Self {
        Self {
            registry,
            invocation_id: Uuid::now_v7(),
            started: Instant::now(),
        }
    }

    /// Time elapsed since this invocation started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
