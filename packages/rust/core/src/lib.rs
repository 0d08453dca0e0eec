//! Core bundling engine.
//!
//! Turns a [`StakRequest`] into one or more runnable profiles, threads each
//! profile's record through its ordered bundler chain, fans out per-file
//! staks when asked, writes output artifacts, and keeps watchers alive for
//! change-driven re-runs.

pub mod context;
pub mod executor;
pub mod fanout;
pub mod normalize;
pub mod orchestrator;
pub mod profiles;
pub mod registry;
pub mod request;
pub mod watch;

pub use context::RunContext;
pub use orchestrator::{execute, execute_with_backend, ExecuteOutcome, RunSummary};
pub use registry::{BundlerRegistry, BUNDLER_NAMESPACE};
pub use request::StakRequest;
pub use watch::{NotifyBackend, WatchBackend, WatchEvent, WatchSubscription, WatcherHandle};
