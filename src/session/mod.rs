// src/session/mod.rs

//! Per-connection request handling.

pub mod base;

pub use base::{execute, Session, SystemEvent};
