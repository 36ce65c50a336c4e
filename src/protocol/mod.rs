// src/protocol/mod.rs

//! Line-oriented text command syntax spoken by the transport layer.
//!
//! Requests look like `/publish <topic> "<message>"`; every request gets exactly
//! one reply line. Nothing in the broker core depends on this module.

pub mod codec;
pub mod command;
pub mod quote;
pub mod reply;

pub use codec::{max_request_line, ClientCodec, ServerCodec};
pub use command::Request;
pub use reply::Reply;
