use crate::error::BrokerError;

use std::fmt;
use std::str::FromStr;

/// Opaque identity of a publishing or consuming process.
///
/// On the IPC transport this is the peer's process id. The same identity may
/// subscribe to many topics but appears at most once per topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
  pub const fn new(raw: u64) -> Self {
    Self(raw)
  }

  /// Builds an identity from an OS process id. Negative pids are malformed.
  pub fn from_pid(pid: i32) -> Result<Self, BrokerError> {
    u64::try_from(pid)
      .map(Self)
      .map_err(|_| BrokerError::InvalidArgument(format!("malformed process identity: {}", pid)))
  }

  pub const fn get(&self) -> u64 {
    self.0
  }
}

impl fmt::Display for SubscriberId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<u32> for SubscriberId {
  fn from(pid: u32) -> Self {
    Self(pid as u64)
  }
}

impl FromStr for SubscriberId {
  type Err = BrokerError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    s.trim()
      .parse::<u64>()
      .map(Self)
      .map_err(|_| BrokerError::InvalidArgument(format!("malformed subscriber identity: '{}'", s)))
  }
}
