//! Shared types, error model, and profile schema for stak.
//!
//! This crate is the foundation depended on by all other stak crates.
//! It provides:
//! - [`StakError`] — the unified error type
//! - The bundle record threaded through every stak ([`BundleRecord`])
//! - The bundler capability contract ([`Bundler`], [`BundlerSpec`])
//! - The raw profile schema and config-source loading ([`RawProfile`])

pub mod bundler;
pub mod config;
pub mod error;
pub mod record;

// Re-export public API at crate root for ergonomic imports.
pub use bundler::{Bundler, BundlerRef, BundlerSpec, FnBundler};
pub use config::{
    BundlerEntry, BundlerList, CONFIG_FILE_NAME, OneOrMany, RawProfile,
    canonicalize_profile_keys, deep_merge, load_profile_source,
};
pub use error::{Result, StakError};
pub use record::{BundleRecord, RenameHook};
