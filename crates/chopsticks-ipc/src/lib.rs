//! Newline-delimited JSON metric-record transport over a Unix stream socket
//! (`spec.md` §4.1).

pub mod client;
pub mod error;
pub mod frame;
pub mod server;

pub use client::MetricsIpcClient;
pub use error::IpcError;
pub use frame::IpcFrame;
pub use server::MetricsIpcServer;
