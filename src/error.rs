// src/error.rs

use std::fmt;
use std::io;
use thiserror::Error;

use crate::message::SubscriberId;

/// Coarse classification of a `BrokerError`.
///
/// This is the taxonomy callers branch on, and the token written after `ERR`
/// on the wire. "No data" from a fetch is not an error and has no code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
  AllocationFailure,
  NotFound,
  PermissionDenied,
  InvalidArgument,
  Internal,
}

impl ErrorCode {
  pub fn as_str(&self) -> &'static str {
    match self {
      ErrorCode::AllocationFailure => "ALLOCATION_FAILURE",
      ErrorCode::NotFound => "NOT_FOUND",
      ErrorCode::PermissionDenied => "PERMISSION_DENIED",
      ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
      ErrorCode::Internal => "INTERNAL",
    }
  }

  pub fn parse(token: &str) -> Option<Self> {
    match token {
      "ALLOCATION_FAILURE" => Some(ErrorCode::AllocationFailure),
      "NOT_FOUND" => Some(ErrorCode::NotFound),
      "PERMISSION_DENIED" => Some(ErrorCode::PermissionDenied),
      "INVALID_ARGUMENT" => Some(ErrorCode::InvalidArgument),
      "INTERNAL" => Some(ErrorCode::Internal),
      _ => None,
    }
  }
}

impl fmt::Display for ErrorCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Error, Debug)]
#[non_exhaustive] // Allows adding more variants later without breaking change
pub enum BrokerError {
  // --- Core Errors ---
  #[error("Allocation failed: {0}")]
  AllocationFailure(String), // ENOMEM

  #[error("Topic not found: {0}")]
  TopicNotFound(String),

  #[error("Subscriber {subscriber} is not subscribed to topic '{topic}'")]
  NotSubscribed { topic: String, subscriber: SubscriberId },

  #[error("Subscriber {subscriber} may not read from topic '{topic}'")]
  PermissionDenied { topic: String, subscriber: SubscriberId },

  #[error("Invalid argument provided: {0}")]
  InvalidArgument(String), // EINVAL

  #[error("Message of {size} bytes exceeds the maximum of {max} bytes")]
  MessageTooLarge { size: usize, max: usize },

  // --- Option Errors ---
  #[error("Invalid broker option ID: {0}")]
  InvalidOption(i32),
  #[error("Invalid value provided for option ID {0}")]
  InvalidOptionValue(i32),

  // --- State Errors ---
  #[error("Operation is invalid for the current broker state: {0}")]
  InvalidState(&'static str),

  // --- Boundary Errors ---
  #[error("I/O error: {0}")]
  Io(#[from] io::Error),

  #[error("Command protocol violation: {0}")]
  ProtocolViolation(String),

  #[error("Connection closed by peer or transport")]
  ConnectionClosed,

  #[error("Operation timed out")]
  Timeout,

  /// An error reply received from a remote broker.
  #[error("Broker replied {code}: {message}")]
  Remote { code: ErrorCode, message: String },

  // --- Internal Errors ---
  #[error("Internal broker error: {0}")]
  Internal(String),
}

impl BrokerError {
  /// Maps this error onto the taxonomy reported to callers.
  pub fn code(&self) -> ErrorCode {
    match self {
      BrokerError::AllocationFailure(_) => ErrorCode::AllocationFailure,
      BrokerError::TopicNotFound(_) | BrokerError::NotSubscribed { .. } => ErrorCode::NotFound,
      BrokerError::PermissionDenied { .. } => ErrorCode::PermissionDenied,
      BrokerError::InvalidArgument(_)
      | BrokerError::MessageTooLarge { .. }
      | BrokerError::InvalidOption(_)
      | BrokerError::InvalidOptionValue(_)
      | BrokerError::ProtocolViolation(_) => ErrorCode::InvalidArgument,
      BrokerError::Remote { code, .. } => *code,
      BrokerError::InvalidState(_)
      | BrokerError::Io(_)
      | BrokerError::ConnectionClosed
      | BrokerError::Timeout
      | BrokerError::Internal(_) => ErrorCode::Internal,
    }
  }

  pub(crate) fn allocation(what: &str, e: std::collections::TryReserveError) -> Self {
    tracing::error!(error = %e, "Failed to allocate memory for {}", what);
    BrokerError::AllocationFailure(format!("{}: {}", what, e))
  }

  /// Maps a transport-level I/O error, folding disconnects into `ConnectionClosed`.
  pub fn from_io(e: io::Error) -> Self {
    match e.kind() {
      io::ErrorKind::TimedOut => BrokerError::Timeout,
      io::ErrorKind::ConnectionReset | io::ErrorKind::BrokenPipe | io::ErrorKind::UnexpectedEof => {
        BrokerError::ConnectionClosed
      }
      _ => BrokerError::Io(e),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn codes_follow_taxonomy() {
    let not_sub = BrokerError::NotSubscribed {
      topic: "news".into(),
      subscriber: SubscriberId::new(7),
    };
    assert_eq!(not_sub.code(), ErrorCode::NotFound);
    assert_eq!(BrokerError::TopicNotFound("x".into()).code(), ErrorCode::NotFound);
    assert_eq!(
      BrokerError::MessageTooLarge { size: 300, max: 250 }.code(),
      ErrorCode::InvalidArgument
    );
    let remote = BrokerError::Remote {
      code: ErrorCode::PermissionDenied,
      message: "nope".into(),
    };
    assert_eq!(remote.code(), ErrorCode::PermissionDenied);
  }

  #[test]
  fn code_tokens_parse_back() {
    for code in [
      ErrorCode::AllocationFailure,
      ErrorCode::NotFound,
      ErrorCode::PermissionDenied,
      ErrorCode::InvalidArgument,
      ErrorCode::Internal,
    ] {
      assert_eq!(ErrorCode::parse(code.as_str()), Some(code));
    }
    assert_eq!(ErrorCode::parse("EAGAIN"), None);
  }

  #[test]
  fn io_disconnects_become_connection_closed() {
    let e = BrokerError::from_io(io::Error::from(io::ErrorKind::BrokenPipe));
    assert!(matches!(e, BrokerError::ConnectionClosed));
    let e = BrokerError::from_io(io::Error::from(io::ErrorKind::PermissionDenied));
    assert!(matches!(e, BrokerError::Io(_)));
  }
}
