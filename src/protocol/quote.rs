// src/protocol/quote.rs

//! Double-quoted payload literals.
//!
//! Payloads are arbitrary bytes but travel inside single text lines, so they
//! are written as `"..."` with `\\`, `\"`, `\n`, `\r`, `\t` and `\xHH` escapes.
//! Printable text (including non-ASCII UTF-8) is written as-is.

use crate::error::BrokerError;
use std::fmt::Write;

/// Renders `payload` as a quoted literal.
pub fn quote(payload: &[u8]) -> String {
  let mut out = String::with_capacity(payload.len() + 2);
  out.push('"');
  match std::str::from_utf8(payload) {
    Ok(text) => {
      for c in text.chars() {
        match c {
          '"' => out.push_str("\\\""),
          '\\' => out.push_str("\\\\"),
          '\n' => out.push_str("\\n"),
          '\r' => out.push_str("\\r"),
          '\t' => out.push_str("\\t"),
          c if c.is_control() => {
            let mut buf = [0u8; 4];
            for b in c.encode_utf8(&mut buf).bytes() {
              push_hex(&mut out, b);
            }
          }
          c => out.push(c),
        }
      }
    }
    Err(_) => {
      for &b in payload {
        match b {
          b'"' => out.push_str("\\\""),
          b'\\' => out.push_str("\\\\"),
          b'\n' => out.push_str("\\n"),
          b'\r' => out.push_str("\\r"),
          b'\t' => out.push_str("\\t"),
          0x20..=0x7e => out.push(b as char),
          _ => push_hex(&mut out, b),
        }
      }
    }
  }
  out.push('"');
  out
}

fn push_hex(out: &mut String, b: u8) {
  // Writing to a String cannot fail.
  let _ = write!(out, "\\x{:02x}", b);
}

/// Parses a quoted literal at the start of `input`.
///
/// Returns the decoded bytes and whatever follows the closing quote.
pub fn unquote(input: &str) -> Result<(Vec<u8>, &str), BrokerError> {
  let body = input
    .strip_prefix('"')
    .ok_or_else(|| BrokerError::InvalidArgument("quoted message must start with '\"'".into()))?;

  let mut out = Vec::with_capacity(body.len());
  let mut chars = body.char_indices();
  while let Some((idx, c)) = chars.next() {
    match c {
      '"' => return Ok((out, &body[idx + 1..])),
      '\\' => {
        let (_, esc) = chars
          .next()
          .ok_or_else(|| BrokerError::InvalidArgument("unterminated escape in message".into()))?;
        match esc {
          '"' => out.push(b'"'),
          '\\' => out.push(b'\\'),
          'n' => out.push(b'\n'),
          'r' => out.push(b'\r'),
          't' => out.push(b'\t'),
          'x' => {
            let hi = chars.next().map(|(_, h)| h);
            let lo = chars.next().map(|(_, l)| l);
            let byte = match (hi.and_then(|h| h.to_digit(16)), lo.and_then(|l| l.to_digit(16))) {
              (Some(h), Some(l)) => (h * 16 + l) as u8,
              _ => return Err(BrokerError::InvalidArgument("malformed \\x escape in message".into())),
            };
            out.push(byte);
          }
          other => {
            return Err(BrokerError::InvalidArgument(format!(
              "unknown escape '\\{}' in message",
              other
            )))
          }
        }
      }
      c => {
        let mut buf = [0u8; 4];
        out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
      }
    }
  }
  Err(BrokerError::InvalidArgument("unterminated quoted message".into()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn plain_text_stays_readable() {
    assert_eq!(quote(b"sunny"), "\"sunny\"");
    assert_eq!(quote("olá".as_bytes()), "\"olá\"");
    assert_eq!(quote(b"say \"hi\"\n"), r#""say \"hi\"\n""#);
  }

  #[test]
  fn binary_uses_hex_escapes() {
    assert_eq!(quote(&[0x00, b'a', 0xff]), r#""\x00a\xff""#);
  }

  #[test]
  fn unquote_returns_remainder() {
    let (bytes, rest) = unquote(r#""a \"b\" c" tail"#).unwrap();
    assert_eq!(bytes, b"a \"b\" c");
    assert_eq!(rest, " tail");
  }

  #[test]
  fn unquote_reverses_quote_for_awkward_payloads() {
    let payloads: [&[u8]; 4] = [b"", b"tab\there", &[0, 1, 2, 0x80, 0xfe], "ünï\u{85}".as_bytes()];
    for payload in payloads {
      let quoted = quote(payload);
      let (decoded, rest) = unquote(&quoted).unwrap();
      assert_eq!(decoded, payload);
      assert!(rest.is_empty());
    }
  }

  #[test]
  fn unquote_rejects_malformed_input() {
    assert!(unquote("no quotes").is_err());
    assert!(unquote("\"open").is_err());
    assert!(unquote(r#""bad \q""#).is_err());
    assert!(unquote(r#""bad \x4""#).is_err());
    assert!(unquote("\"trailing \\").is_err());
  }
}
