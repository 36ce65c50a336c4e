use crate::error::BrokerError;
use bytes::Bytes;
use std::fmt;

/// An immutable payload held by exactly one mailbox at a time.
///
/// Publishing copies the payload once per subscriber, so two mailboxes never
/// share a buffer. Dropping the `Message` releases it.
#[derive(Clone, PartialEq, Eq)]
pub struct Message {
  payload: Bytes,
}

impl Message {
  /// Copies `data` into a freshly allocated message.
  ///
  /// The buffer is reserved fallibly so exhaustion surfaces as
  /// `AllocationFailure` instead of aborting the process.
  pub fn copy_from(data: &[u8]) -> Result<Self, BrokerError> {
    let mut buf = Vec::new();
    buf
      .try_reserve_exact(data.len())
      .map_err(|e| BrokerError::allocation("message payload", e))?;
    buf.extend_from_slice(data);
    Ok(Self {
      payload: Bytes::from(buf),
    })
  }

  /// Wraps an already owned buffer without copying.
  pub fn from_vec(data: Vec<u8>) -> Self {
    Self {
      payload: Bytes::from(data),
    }
  }

  /// Creates a message from a static byte slice (zero-copy).
  pub fn from_static(data: &'static [u8]) -> Self {
    Self {
      payload: Bytes::from_static(data),
    }
  }

  /// Returns a reference to the message payload bytes.
  pub fn data(&self) -> &[u8] {
    &self.payload
  }

  /// Returns the size of the message payload in bytes.
  pub fn size(&self) -> usize {
    self.payload.len()
  }

  pub fn is_empty(&self) -> bool {
    self.payload.is_empty()
  }

  /// Consumes the message, yielding its payload.
  pub fn into_bytes(self) -> Bytes {
    self.payload
  }
}

impl fmt::Debug for Message {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Message")
      .field("size", &self.size())
      .field("data", &format!("{} bytes", self.size())) // Avoid printing large data
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn copy_does_not_share_the_source() {
    let source = vec![1u8, 2, 3];
    let msg = Message::copy_from(&source).unwrap();
    assert_eq!(msg.data(), &[1, 2, 3]);
    assert_eq!(msg.size(), 3);
    assert_ne!(msg.data().as_ptr(), source.as_ptr());
  }

  #[test]
  fn empty_payload_is_allowed() {
    let msg = Message::copy_from(b"").unwrap();
    assert!(msg.is_empty());
    assert_eq!(msg.into_bytes().len(), 0);
  }
}
