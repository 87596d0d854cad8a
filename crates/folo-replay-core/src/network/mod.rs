//! Network layer: the reqwest-backed HTTP client and the [`Transport`] seam
//! the executor moves bytes through.

mod client;
mod transport;

pub use client::{HttpClient, ProxySettings};
pub use transport::{DeleteOutcome, HttpTransport, Transport};
