// src/transport/mod.rs

//! Byte-stream transports the broker is served over.

#[cfg(feature = "ipc")]
pub mod ipc;

#[cfg(feature = "ipc")]
pub use ipc::{IdentityPolicy, IpcServer};
