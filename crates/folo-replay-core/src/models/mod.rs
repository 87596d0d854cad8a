//! Data models for folo-replay.
//!
//! The tracked-content types mirror the JSON returned by Indy's folo admin
//! endpoint; [`TransferJob`] is the derived unit of work handed to the executor.

mod job;
mod tracked;

pub use job::*;
pub use tracked::*;
