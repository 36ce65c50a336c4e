// src/protocol/command.rs

use crate::error::BrokerError;
use crate::protocol::quote::{quote, unquote};
use bytes::Bytes;
use std::fmt;

pub const CMD_SUBSCRIBE: &str = "/subscribe";
pub const CMD_UNSUBSCRIBE: &str = "/unsubscribe";
pub const CMD_PUBLISH: &str = "/publish";
pub const CMD_FETCH: &str = "/fetch";
pub const CMD_STATS: &str = "/stats";

/// One request line, already split into its operation and arguments.
///
/// The caller's identity is not part of the request; the transport supplies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
  Subscribe { topic: String },
  Unsubscribe { topic: String },
  Publish { topic: String, payload: Bytes },
  Fetch { topic: String },
  Stats,
}

impl Request {
  /// Parses a request line such as `/publish news "headline"`.
  pub fn parse(line: &str) -> Result<Self, BrokerError> {
    let line = line.trim();
    let (command, args) = split_token(line);
    match command {
      CMD_SUBSCRIBE => Ok(Request::Subscribe {
        topic: single_topic(command, args)?,
      }),
      CMD_UNSUBSCRIBE => Ok(Request::Unsubscribe {
        topic: single_topic(command, args)?,
      }),
      CMD_FETCH => Ok(Request::Fetch {
        topic: single_topic(command, args)?,
      }),
      CMD_PUBLISH => {
        let (topic, rest) = split_token(args);
        if topic.is_empty() {
          return Err(missing(command, "topic"));
        }
        let payload = if rest.starts_with('"') {
          let (bytes, trailing) = unquote(rest)?;
          if !trailing.trim().is_empty() {
            return Err(BrokerError::InvalidArgument(format!(
              "unexpected text after quoted message: '{}'",
              trailing.trim()
            )));
          }
          Bytes::from(bytes)
        } else if rest.is_empty() {
          return Err(missing(command, "message"));
        } else {
          Bytes::copy_from_slice(rest.as_bytes())
        };
        Ok(Request::Publish {
          topic: topic.to_string(),
          payload,
        })
      }
      CMD_STATS => {
        if !args.is_empty() {
          return Err(BrokerError::InvalidArgument(format!("{} takes no arguments", command)));
        }
        Ok(Request::Stats)
      }
      "" => Err(BrokerError::InvalidArgument("empty command".into())),
      other => Err(BrokerError::InvalidArgument(format!("unknown command '{}'", other))),
    }
  }

  pub fn topic(&self) -> Option<&str> {
    match self {
      Request::Subscribe { topic }
      | Request::Unsubscribe { topic }
      | Request::Publish { topic, .. }
      | Request::Fetch { topic } => Some(topic),
      Request::Stats => None,
    }
  }

  /// Name of the operation, for logging.
  pub fn variant_name(&self) -> &'static str {
    match self {
      Request::Subscribe { .. } => "Subscribe",
      Request::Unsubscribe { .. } => "Unsubscribe",
      Request::Publish { .. } => "Publish",
      Request::Fetch { .. } => "Fetch",
      Request::Stats => "Stats",
    }
  }
}

impl fmt::Display for Request {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Request::Subscribe { topic } => write!(f, "{} {}", CMD_SUBSCRIBE, topic),
      Request::Unsubscribe { topic } => write!(f, "{} {}", CMD_UNSUBSCRIBE, topic),
      Request::Publish { topic, payload } => write!(f, "{} {} {}", CMD_PUBLISH, topic, quote(payload)),
      Request::Fetch { topic } => write!(f, "{} {}", CMD_FETCH, topic),
      Request::Stats => f.write_str(CMD_STATS),
    }
  }
}

/// Splits off the first whitespace-delimited token; the rest has leading
/// whitespace removed.
fn split_token(input: &str) -> (&str, &str) {
  match input.find(char::is_whitespace) {
    Some(pos) => (&input[..pos], input[pos..].trim_start()),
    None => (input, ""),
  }
}

fn single_topic(command: &str, args: &str) -> Result<String, BrokerError> {
  let (topic, rest) = split_token(args);
  if topic.is_empty() {
    return Err(missing(command, "topic"));
  }
  if !rest.is_empty() {
    return Err(BrokerError::InvalidArgument(format!(
      "{} takes exactly one topic, got extra '{}'",
      command, rest
    )));
  }
  Ok(topic.to_string())
}

fn missing(command: &str, what: &str) -> BrokerError {
  BrokerError::InvalidArgument(format!("{} is missing its {}", command, what))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_topic_commands() {
    assert_eq!(
      Request::parse("/subscribe news").unwrap(),
      Request::Subscribe { topic: "news".into() }
    );
    assert_eq!(
      Request::parse("  /unsubscribe   news  ").unwrap(),
      Request::Unsubscribe { topic: "news".into() }
    );
    assert_eq!(Request::parse("/fetch 7").unwrap(), Request::Fetch { topic: "7".into() });
    assert_eq!(Request::parse("/stats").unwrap(), Request::Stats);
  }

  #[test]
  fn publish_accepts_quoted_and_bare_messages() {
    assert_eq!(
      Request::parse(r#"/publish news "big \"news\" today""#).unwrap(),
      Request::Publish {
        topic: "news".into(),
        payload: Bytes::from_static(b"big \"news\" today"),
      }
    );
    assert_eq!(
      Request::parse("/publish news hello world").unwrap(),
      Request::Publish {
        topic: "news".into(),
        payload: Bytes::from_static(b"hello world"),
      }
    );
    assert_eq!(
      Request::parse(r#"/publish news """#).unwrap(),
      Request::Publish {
        topic: "news".into(),
        payload: Bytes::new(),
      }
    );
  }

  #[test]
  fn rejects_malformed_requests() {
    for line in [
      "",
      "subscribe news",
      "/subscribe",
      "/subscribe a b",
      "/publish",
      "/publish news",
      r#"/publish news "x" trailing"#,
      "/stats now",
      "/list",
    ] {
      let err = Request::parse(line).unwrap_err();
      assert!(matches!(err, BrokerError::InvalidArgument(_)), "line {:?} gave {:?}", line, err);
    }
  }

  #[test]
  fn display_produces_parseable_lines() {
    let requests = [
      Request::Subscribe { topic: "a".into() },
      Request::Publish {
        topic: "a".into(),
        payload: Bytes::from_static(b"line\nbreak"),
      },
      Request::Stats,
    ];
    for request in requests {
      let line = request.to_string();
      assert!(!line.contains('\n'));
      assert_eq!(Request::parse(&line).unwrap(), request);
    }
  }
}
