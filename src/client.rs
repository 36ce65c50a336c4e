// src/client.rs

#![cfg(feature = "ipc")]

use crate::broker::{BrokerStats, Delivery, Subscribed};
use crate::error::BrokerError;
use crate::protocol::{ClientCodec, Reply, Request};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::path::Path;
use tokio::net::UnixStream;
use tokio_util::codec::Framed;

/// Async client for a broker served by `IpcServer`.
///
/// Requests are strictly one at a time: each call writes one line and waits
/// for its reply. Error replies come back as `BrokerError::Remote`.
#[derive(Debug)]
pub struct Client {
  framed: Framed<UnixStream, ClientCodec>,
}

impl Client {
  pub async fn connect(path: impl AsRef<Path>) -> Result<Self, BrokerError> {
    let path = path.as_ref();
    let stream = UnixStream::connect(path).await.map_err(|e| {
      tracing::debug!(path = ?path, error = %e, "Failed to connect to IPC server");
      BrokerError::from_io(e)
    })?;
    tracing::debug!(path = ?path, "Connected to IPC server");
    Ok(Self {
      framed: Framed::new(stream, ClientCodec::new()),
    })
  }

  /// Sends one request and returns the raw reply, error replies included.
  pub async fn request(&mut self, request: Request) -> Result<Reply, BrokerError> {
    self.framed.send(request).await?;
    match self.framed.next().await {
      Some(reply) => reply,
      None => Err(BrokerError::ConnectionClosed),
    }
  }

  async fn call(&mut self, request: Request) -> Result<Reply, BrokerError> {
    self.request(request).await?.into_result()
  }

  pub async fn subscribe(&mut self, topic: &str) -> Result<Subscribed, BrokerError> {
    match self.call(Request::Subscribe { topic: topic.to_string() }).await? {
      Reply::Subscribed(outcome) => Ok(outcome),
      other => Err(unexpected("subscribe", other)),
    }
  }

  /// Returns how many unread messages the server dropped.
  pub async fn unsubscribe(&mut self, topic: &str) -> Result<usize, BrokerError> {
    match self.call(Request::Unsubscribe { topic: topic.to_string() }).await? {
      Reply::Unsubscribed { dropped } => Ok(dropped),
      other => Err(unexpected("unsubscribe", other)),
    }
  }

  pub async fn publish(&mut self, topic: &str, payload: impl Into<Bytes>) -> Result<Delivery, BrokerError> {
    let request = Request::Publish {
      topic: topic.to_string(),
      payload: payload.into(),
    };
    match self.call(request).await? {
      Reply::Published(delivery) => Ok(delivery),
      other => Err(unexpected("publish", other)),
    }
  }

  /// Fetches the oldest pending message; `Ok(None)` when the mailbox is empty.
  pub async fn fetch(&mut self, topic: &str) -> Result<Option<Bytes>, BrokerError> {
    match self.call(Request::Fetch { topic: topic.to_string() }).await? {
      Reply::Message(payload) => Ok(Some(payload)),
      Reply::Empty => Ok(None),
      other => Err(unexpected("fetch", other)),
    }
  }

  pub async fn stats(&mut self) -> Result<BrokerStats, BrokerError> {
    match self.call(Request::Stats).await? {
      Reply::Stats(stats) => Ok(stats),
      other => Err(unexpected("stats", other)),
    }
  }
}

fn unexpected(operation: &str, reply: Reply) -> BrokerError {
  BrokerError::ProtocolViolation(format!("unexpected reply to {}: {}", operation, reply))
}
