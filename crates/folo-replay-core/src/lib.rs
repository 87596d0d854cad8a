//! folo-replay core - replay and migrate tracked build content between Indy
//! instances.
//!
//! A folo tracked content report lists every artifact a build downloaded and
//! uploaded through Indy. This crate turns such a report into transfer jobs and
//! runs them:
//!
//! - **replay**: fetch every download from a target Indy through a fresh build
//!   group, then copy every upload from the original Indy into the new build's
//!   hosted repo, and seal the new tracking record
//! - **migrate**: purge stale copies on another Indy and relay the downloads there
//!
//! # Example
//!
//! ```rust,ignore
//! use folo_replay_core::{RunConfig, ReplayRunner};
//!
//! #[tokio::main]
//! async fn main() -> folo_replay_core::Result<()> {
//!     let config = RunConfig::builder("indy-a:8080", "indy-b:8080", "maven", "build-1234")
//!         .workers(4)
//!         .build()?;
//!     let runner = ReplayRunner::http(config)?;
//!     let report = runner.fetch_report("build-1000").await?;
//!     let summary = runner.run(&report).await?;
//!     println!("sealed: {}", summary.sealed);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod hashing;
pub mod indy;
pub mod migrate;
pub mod models;
pub mod network;
pub mod remap;
pub mod runner;
pub mod staging;

#[cfg(test)]
mod testing;

pub use config::{RunConfig, RunConfigBuilder};
pub use error::{ErrorKind, ReplayError, Result};
pub use executor::{BatchOutcome, ExecutionMode, JobAction, TransferExecutor};
pub use indy::{generate_build_name, BuildMeta, HttpIndyService, IndyService};
pub use migrate::{DeleteSummary, MigrationOrchestrator};
pub use models::{AccessChannel, StoreKey, TrackedContent, TrackedContentEntry};
pub use network::{HttpTransport, Transport};
pub use runner::{ReplayRunner, RunMode, RunSummary};
