// src/protocol/codec.rs

use crate::error::BrokerError;
use crate::protocol::command::Request;
use crate::protocol::reply::Reply;
use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

/// Room for the command word, the topic and the quotes around the payload.
const LINE_OVERHEAD: usize = 256;

/// Longest request line a server accepts for a given payload limit.
///
/// Every payload byte may be written as a four character `\xHH` escape.
pub fn max_request_line(max_message_size: usize) -> usize {
  max_message_size.saturating_mul(4).saturating_add(LINE_OVERHEAD)
}

impl From<LinesCodecError> for BrokerError {
  fn from(e: LinesCodecError) -> Self {
    match e {
      LinesCodecError::MaxLineLengthExceeded => BrokerError::ProtocolViolation("line too long".into()),
      LinesCodecError::Io(io_err) => BrokerError::from_io(io_err),
    }
  }
}

/// Server end of a command stream: decodes `Request` lines, encodes `Reply` lines.
///
/// A malformed or oversized line does not end the stream. It is yielded as
/// `Ok(Some(Err(..)))` so the session can answer with an error reply and keep
/// reading; only I/O failures are returned as decoder errors.
#[derive(Debug)]
pub struct ServerCodec {
  lines: LinesCodec,
}

impl ServerCodec {
  pub fn new(max_line_length: usize) -> Self {
    Self {
      lines: LinesCodec::new_with_max_length(max_line_length),
    }
  }

  fn map_line(
    result: Result<Option<String>, LinesCodecError>,
  ) -> Result<Option<Result<Request, BrokerError>>, BrokerError> {
    match result {
      Ok(Some(line)) => {
        tracing::trace!(line_len = line.len(), "ServerCodec decoded request line");
        Ok(Some(Request::parse(&line)))
      }
      Ok(None) => Ok(None),
      Err(LinesCodecError::MaxLineLengthExceeded) => {
        // LinesCodec discards the rest of the line on the next decode call.
        tracing::debug!("ServerCodec rejecting over-long request line");
        Ok(Some(Err(BrokerError::InvalidArgument("request line too long".into()))))
      }
      Err(LinesCodecError::Io(e)) if e.kind() == std::io::ErrorKind::InvalidData => {
        // The line was consumed but is not UTF-8.
        Ok(Some(Err(BrokerError::InvalidArgument("request line is not valid UTF-8".into()))))
      }
      Err(e) => Err(e.into()),
    }
  }
}

impl Decoder for ServerCodec {
  type Item = Result<Request, BrokerError>;
  type Error = BrokerError;

  fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
    Self::map_line(self.lines.decode(src))
  }

  fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
    Self::map_line(self.lines.decode_eof(src))
  }
}

impl Encoder<Reply> for ServerCodec {
  type Error = BrokerError;

  fn encode(&mut self, item: Reply, dst: &mut BytesMut) -> Result<(), Self::Error> {
    self.lines.encode(item.to_string(), dst).map_err(BrokerError::from)
  }
}

/// Client end of a command stream: encodes `Request` lines, decodes `Reply` lines.
#[derive(Debug, Default)]
pub struct ClientCodec {
  lines: LinesCodec,
}

impl ClientCodec {
  pub fn new() -> Self {
    Self::default()
  }
}

impl Decoder for ClientCodec {
  type Item = Reply;
  type Error = BrokerError;

  fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
    match self.lines.decode(src)? {
      Some(line) => Reply::parse(&line).map(Some),
      None => Ok(None),
    }
  }

  fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
    match self.lines.decode_eof(src)? {
      Some(line) => Reply::parse(&line).map(Some),
      None => Ok(None),
    }
  }
}

impl Encoder<Request> for ClientCodec {
  type Error = BrokerError;

  fn encode(&mut self, item: Request, dst: &mut BytesMut) -> Result<(), Self::Error> {
    self.lines.encode(item.to_string(), dst).map_err(BrokerError::from)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use bytes::{BufMut, Bytes};

  #[test]
  fn server_decodes_requests_across_partial_reads() {
    let mut codec = ServerCodec::new(1024);
    let mut buf = BytesMut::new();
    buf.put_slice(b"/subscribe ne");
    assert!(codec.decode(&mut buf).unwrap().is_none());
    buf.put_slice(b"ws\r\n/fetch news\n");

    let first = codec.decode(&mut buf).unwrap().unwrap().unwrap();
    assert_eq!(first, Request::Subscribe { topic: "news".into() });
    let second = codec.decode(&mut buf).unwrap().unwrap().unwrap();
    assert_eq!(second, Request::Fetch { topic: "news".into() });
    assert!(codec.decode(&mut buf).unwrap().is_none());
  }

  #[test]
  fn server_survives_bad_lines() {
    let mut codec = ServerCodec::new(32);
    let mut buf = BytesMut::new();
    buf.put_slice(b"/bogus\n");
    buf.put_slice(&[b'x'; 64]);
    buf.put_slice(b"\n/stats\n");

    assert!(matches!(
      codec.decode(&mut buf).unwrap(),
      Some(Err(BrokerError::InvalidArgument(_)))
    ));
    assert!(matches!(
      codec.decode(&mut buf).unwrap(),
      Some(Err(BrokerError::InvalidArgument(_)))
    ));
    // The over-long line is skipped and the next request still decodes.
    let mut next = codec.decode(&mut buf).unwrap();
    while let Some(Err(_)) = next {
      next = codec.decode(&mut buf).unwrap();
    }
    assert!(matches!(next, Some(Ok(Request::Stats))));
  }

  #[test]
  fn client_and_server_agree_on_lines() {
    let mut client = ClientCodec::new();
    let mut server = ServerCodec::new(max_request_line(250));

    let mut wire = BytesMut::new();
    let request = Request::Publish {
      topic: "news".into(),
      payload: Bytes::from_static(b"multi\nline"),
    };
    client.encode(request.clone(), &mut wire).unwrap();
    assert_eq!(server.decode(&mut wire).unwrap().unwrap().unwrap(), request);

    server.encode(Reply::Empty, &mut wire).unwrap();
    server
      .encode(Reply::Message(Bytes::from_static(b"headline")), &mut wire)
      .unwrap();
    assert_eq!(client.decode(&mut wire).unwrap(), Some(Reply::Empty));
    assert_eq!(
      client.decode(&mut wire).unwrap(),
      Some(Reply::Message(Bytes::from_static(b"headline")))
    );
  }

  #[test]
  fn client_rejects_unknown_reply() {
    let mut client = ClientCodec::new();
    let mut wire = BytesMut::from(&b"WAT\n"[..]);
    assert!(matches!(client.decode(&mut wire), Err(BrokerError::ProtocolViolation(_))));
  }

  #[test]
  fn line_limit_scales_with_payload_limit() {
    assert_eq!(max_request_line(250), 250 * 4 + LINE_OVERHEAD);
    assert_eq!(max_request_line(usize::MAX), usize::MAX);
  }
}
