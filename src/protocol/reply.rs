// src/protocol/reply.rs

use crate::broker::{BrokerStats, Delivery, Subscribed};
use crate::error::{BrokerError, ErrorCode};
use crate::protocol::quote::{quote, unquote};
use bytes::Bytes;
use std::fmt;

/// One reply line sent back for each request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
  Subscribed(Subscribed),
  Unsubscribed { dropped: usize },
  Published(Delivery),
  Message(Bytes),
  /// The mailbox had no pending messages. Not an error.
  Empty,
  Stats(BrokerStats),
  Error { code: ErrorCode, message: String },
}

impl Reply {
  /// Builds the error reply for a failed operation.
  pub fn from_error(e: &BrokerError) -> Self {
    // Keep the reply on one line whatever the error text contains.
    let message = e.to_string().replace(['\r', '\n'], " ");
    Reply::Error { code: e.code(), message }
  }

  /// Turns an error reply into `BrokerError::Remote`.
  pub fn into_result(self) -> Result<Reply, BrokerError> {
    match self {
      Reply::Error { code, message } => Err(BrokerError::Remote { code, message }),
      other => Ok(other),
    }
  }

  /// Parses a reply line as written by `Display`.
  pub fn parse(line: &str) -> Result<Self, BrokerError> {
    let line = line.trim_end();
    let violation = || BrokerError::ProtocolViolation(format!("unrecognized reply '{}'", line));
    let (head, rest) = line.split_once(' ').unwrap_or((line, ""));

    match head {
      "OK" => {
        let (what, fields) = rest.split_once(' ').unwrap_or((rest, ""));
        match what {
          "SUBSCRIBED" if fields.is_empty() => Ok(Reply::Subscribed(Subscribed::New)),
          "ALREADY_SUBSCRIBED" if fields.is_empty() => Ok(Reply::Subscribed(Subscribed::Already)),
          "UNSUBSCRIBED" => {
            let [dropped] = parse_fields(fields, ["dropped"]).ok_or_else(violation)?;
            Ok(Reply::Unsubscribed { dropped })
          }
          "PUBLISHED" => {
            let [subscribers, delivered, evicted, failed] =
              parse_fields(fields, ["subscribers", "delivered", "evicted", "failed"]).ok_or_else(violation)?;
            Ok(Reply::Published(Delivery {
              subscribers,
              delivered,
              evicted,
              failed,
            }))
          }
          _ => Err(violation()),
        }
      }
      "MSG" => {
        let (payload, trailing) = unquote(rest).map_err(|_| violation())?;
        if !trailing.is_empty() {
          return Err(violation());
        }
        Ok(Reply::Message(Bytes::from(payload)))
      }
      "EMPTY" if rest.is_empty() => Ok(Reply::Empty),
      "STATS" => {
        let [topics, subscriptions, publishers, queued_messages] =
          parse_fields(rest, ["topics", "subscriptions", "publishers", "queued"]).ok_or_else(violation)?;
        Ok(Reply::Stats(BrokerStats {
          topics,
          subscriptions,
          publishers,
          queued_messages,
        }))
      }
      "ERR" => {
        let (code, message) = rest.split_once(' ').unwrap_or((rest, ""));
        let code = ErrorCode::parse(code).ok_or_else(violation)?;
        Ok(Reply::Error {
          code,
          message: message.to_string(),
        })
      }
      _ => Err(violation()),
    }
  }
}

impl fmt::Display for Reply {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Reply::Subscribed(Subscribed::New) => f.write_str("OK SUBSCRIBED"),
      Reply::Subscribed(Subscribed::Already) => f.write_str("OK ALREADY_SUBSCRIBED"),
      Reply::Unsubscribed { dropped } => write!(f, "OK UNSUBSCRIBED dropped={}", dropped),
      Reply::Published(d) => write!(
        f,
        "OK PUBLISHED subscribers={} delivered={} evicted={} failed={}",
        d.subscribers, d.delivered, d.evicted, d.failed
      ),
      Reply::Message(payload) => write!(f, "MSG {}", quote(payload)),
      Reply::Empty => f.write_str("EMPTY"),
      Reply::Stats(s) => write!(
        f,
        "STATS topics={} subscriptions={} publishers={} queued={}",
        s.topics, s.subscriptions, s.publishers, s.queued_messages
      ),
      Reply::Error { code, message } => write!(f, "ERR {} {}", code, message),
    }
  }
}

/// Parses `k1=v1 k2=v2 ...` with exactly the given keys in order.
fn parse_fields<const N: usize>(input: &str, keys: [&str; N]) -> Option<[usize; N]> {
  let mut values = [0usize; N];
  let mut parts = input.split_whitespace();
  for (slot, key) in values.iter_mut().zip(keys) {
    let (k, v) = parts.next()?.split_once('=')?;
    if k != key {
      return None;
    }
    *slot = v.parse().ok()?;
  }
  match parts.next() {
    Some(_) => None,
    None => Some(values),
  }
}
