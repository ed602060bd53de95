//! Incremental decoding helpers for chunked HTTP bodies.
//!
//! Network chunks split lines and multi-byte characters at arbitrary points;
//! line framing goes through tokio-util's `LinesCodec`, and text decoding
//! holds an incomplete multi-byte tail until the next chunk arrives.

use std::io;
use std::pin::Pin;

use futures_util::{Stream, StreamExt};
use tokio_util::bytes::Buf;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;

use crate::error::{Result, TavernError};

/// Longest line accepted from a provider stream
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

pub type LineStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Frame a response body into `\n`-terminated lines (a trailing `\r` is
/// dropped, and an unterminated final line is still yielded).
pub fn response_lines(response: reqwest::Response) -> LineStream {
    let chunks = response.bytes_stream().map(|chunk| chunk.map_err(io::Error::other));
    frame_lines(chunks, MAX_LINE_BYTES)
}

fn frame_lines<S, B>(chunks: S, max_length: usize) -> LineStream
where
    S: Stream<Item = io::Result<B>> + Send + 'static,
    B: Buf + Send + 'static,
{
    let lines = FramedRead::new(
        StreamReader::new(chunks),
        LinesCodec::new_with_max_length(max_length),
    );
    Box::pin(lines.map(|line| line.map_err(line_error)))
}

fn line_error(err: LinesCodecError) -> TavernError {
    match err {
        LinesCodecError::MaxLineLengthExceeded => {
            TavernError::Framing("line exceeds maximum length".to_string())
        }
        LinesCodecError::Io(err) => {
            let message = err.to_string();
            // Body read failures come back wrapped; surface them as transport errors
            match err.into_inner().map(|inner| inner.downcast::<reqwest::Error>()) {
                Some(Ok(transport)) => TavernError::Transport(*transport),
                _ => TavernError::Framing(message),
            }
        }
    }
}

/// Turns byte chunks into text without splitting a UTF-8 sequence.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of the buffered input as forms complete characters.
    /// Invalid sequences are replaced with U+FFFD.
    pub fn push(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);

        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match err.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                        None => {
                            // Incomplete sequence at the end; wait for more bytes
                            self.pending.drain(..valid);
                            return out;
                        }
                    }
                }
            }
        }
    }

    pub fn finish(&mut self) -> String {
        let rest = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&rest).into_owned()
    }
}
