// src/options.rs

use crate::error::BrokerError;

/// Broker option: maximum number of undelivered messages per mailbox (i32, 0 = unbounded).
pub const MAILBOX_DEPTH: i32 = 1;
/// Broker option: maximum payload size in bytes (i32, > 0).
pub const MAX_MSG_SIZE: i32 = 2;

/// Default payload limit, the size of the message buffer in the original device.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 250;

/// Configuration consumed by the broker core at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerOptions {
  /// Capacity of each subscriber mailbox. `0` means unbounded.
  pub max_mailbox_depth: usize,
  /// Largest payload `publish` accepts. Larger payloads are rejected, never truncated.
  pub max_message_size: usize,
}

impl Default for BrokerOptions {
  fn default() -> Self {
    Self {
      max_mailbox_depth: 0,
      max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
    }
  }
}

impl BrokerOptions {
  pub fn with_mailbox_depth(mut self, depth: usize) -> Self {
    self.max_mailbox_depth = depth;
    self
  }

  pub fn with_max_message_size(mut self, size: usize) -> Self {
    self.max_message_size = size;
    self
  }

  /// Returns the mailbox capacity, or `None` when mailboxes are unbounded.
  pub fn mailbox_capacity(&self) -> Option<usize> {
    (self.max_mailbox_depth > 0).then_some(self.max_mailbox_depth)
  }

  /// Sets an option from its raw value bytes (native-endian `i32`).
  pub fn set_option(&mut self, option: i32, value: &[u8]) -> Result<(), BrokerError> {
    tracing::debug!(option = option, value_len = value.len(), "Setting broker option");
    match option {
      MAILBOX_DEPTH => {
        self.max_mailbox_depth = parse_depth_option(value, option)?;
      }
      MAX_MSG_SIZE => {
        self.max_message_size = parse_size_option(value, option)?;
      }
      _ => return Err(BrokerError::InvalidOption(option)),
    }
    Ok(())
  }

  /// Reads an option back as native-endian `i32` bytes.
  pub fn get_option(&self, option: i32) -> Result<Vec<u8>, BrokerError> {
    let value = match option {
      MAILBOX_DEPTH => self.max_mailbox_depth,
      MAX_MSG_SIZE => self.max_message_size,
      _ => return Err(BrokerError::InvalidOption(option)),
    };
    let value = i32::try_from(value).map_err(|_| BrokerError::InvalidOptionValue(option))?;
    Ok(value.to_ne_bytes().to_vec())
  }
}

// --- Helper functions for parsing option values ---
/// Parses a byte slice representing an integer option.
pub(crate) fn parse_i32_option(value: &[u8], option_id: i32) -> Result<i32, BrokerError> {
  let arr: [u8; 4] = value
    .try_into()
    .map_err(|_| BrokerError::InvalidOptionValue(option_id))?;
  Ok(i32::from_ne_bytes(arr))
}

/// Mailbox depth: 0 disables the bound, negative is invalid.
fn parse_depth_option(value: &[u8], option_id: i32) -> Result<usize, BrokerError> {
  match parse_i32_option(value, option_id)? {
    val @ 0.. => Ok(val as usize),
    _ => Err(BrokerError::InvalidOptionValue(option_id)),
  }
}

/// Message size: must admit at least one byte.
fn parse_size_option(value: &[u8], option_id: i32) -> Result<usize, BrokerError> {
  match parse_i32_option(value, option_id)? {
    val @ 1.. => Ok(val as usize),
    _ => Err(BrokerError::InvalidOptionValue(option_id)),
  }
}
