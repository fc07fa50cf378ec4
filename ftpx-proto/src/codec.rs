//! Length-prefixed frame codec over any `Read`/`Write` stream.
//!
//! Each frame is: `[10 ASCII digits, zero-padded length][payload bytes]`.

use std::io::{self, Read, Write};

use crate::{Error, Result};

/// Width of the decimal length header.
pub const HEADER_LEN: usize = 10;

/// Largest payload a single frame may carry (10,000,000 bytes).
///
/// Senders truncate anything longer; receivers reject headers above it.
pub const MAX_SIZE: usize = 10_000_000;

/// Frames `payload` into a freshly allocated buffer.
///
/// Payloads longer than [`MAX_SIZE`] are cut to their first [`MAX_SIZE`]
/// bytes.
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let body = clamp(payload);
    let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
    frame.extend_from_slice(header(body.len()).as_bytes());
    frame.extend_from_slice(body);
    frame
}

/// Writes `payload` as one frame to `w` and flushes.
///
/// Returns the number of payload bytes actually framed, which is less than
/// `payload.len()` when the payload was truncated.
pub fn send<W: Write>(w: &mut W, payload: &[u8]) -> Result<usize> {
    let body = clamp(payload);
    w.write_all(header(body.len()).as_bytes())?;
    w.write_all(body)?;
    w.flush()?;
    Ok(body.len())
}

/// Reads exactly one frame from `r` and returns its payload.
///
/// Fails with [`Error::ConnectionClosed`] if the stream ends anywhere inside
/// the frame, including before the first header byte.
pub fn decode(r: &mut impl Read) -> Result<Vec<u8>> {
    let mut buf = [0u8; HEADER_LEN];
    let got = read_full(r, &mut buf)?;
    if got < HEADER_LEN {
        return Err(Error::ConnectionClosed {
            expected: HEADER_LEN,
            received: got,
        });
    }
    let len = parse_header(&buf)?;
    let len = usize::try_from(len)
        .ok()
        .filter(|&n| n <= MAX_SIZE)
        .ok_or(Error::Oversized(len))?;

    let mut payload = vec![0u8; len];
    let got = read_full(r, &mut payload)?;
    if got < len {
        return Err(Error::ConnectionClosed {
            expected: len,
            received: got,
        });
    }
    Ok(payload)
}

/// Applies the size bound, logging when content is dropped.
fn clamp(payload: &[u8]) -> &[u8] {
    if payload.len() > MAX_SIZE {
        tracing::warn!(
            len = payload.len(),
            limit = MAX_SIZE,
            "payload truncated to protocol limit"
        );
        &payload[..MAX_SIZE]
    } else {
        payload
    }
}

/// Renders the fixed-width length header.
fn header(len: usize) -> String {
    format!("{len:0width$}", width = HEADER_LEN)
}

/// Parses ten ASCII digits into a length.
fn parse_header(buf: &[u8; HEADER_LEN]) -> Result<u64> {
    if !buf.iter().all(u8::is_ascii_digit) {
        return Err(Error::Framing(String::from_utf8_lossy(buf).into_owned()));
    }
    Ok(buf
        .iter()
        .fold(0u64, |acc, d| acc * 10 + u64::from(d - b'0')))
}

/// Fills `buf` across partial reads, stopping early only at EOF.
///
/// Returns the number of bytes read.
fn read_full(r: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
