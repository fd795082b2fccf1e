//! Newline framing of chunked response bodies.
//!
//! The backend writes one JSON object per line, but the network delivers
//! arbitrary chunks. [`LineFramer`] reassembles complete lines from those
//! chunks and [`LineStream`] exposes the same logic as a lazy async stream.

use crate::error::{StreamError, StreamResult};
use bytes::BytesMut;
use futures::Stream;
use pin_project_lite::pin_project;
use std::fmt;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

/// Default upper bound for a single unterminated line.
pub const DEFAULT_MAX_LINE_BYTES: usize = 10 * 1024 * 1024;

/// Incremental splitter that turns opaque chunks into complete lines.
///
/// Bytes are buffered until a `\n` arrives, so a multi-byte UTF-8
/// character split across two chunks is decoded intact. The returned line
/// excludes the `\n`. Blank lines are returned as-is; filtering them is the
/// caller's job.
#[derive(Debug)]
pub struct LineFramer {
    buffer: BytesMut,
    // Prefix of `buffer` already known to contain no newline.
    scanned: usize,
    // Length of the trailing unterminated segment.
    partial_len: usize,
    max_line_bytes: usize,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineFramer {
    /// Create a framer with the default line limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_line_bytes(DEFAULT_MAX_LINE_BYTES)
    }

    /// Create a framer that rejects unterminated lines longer than `limit`.
    #[must_use]
    pub fn with_max_line_bytes(limit: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            scanned: 0,
            partial_len: 0,
            max_line_bytes: limit,
        }
    }

    /// Append a chunk to the internal buffer.
    pub fn push(&mut self, chunk: &[u8]) -> StreamResult<()> {
        match chunk.iter().rposition(|&b| b == b'\n') {
            Some(pos) => self.partial_len = chunk.len() - pos - 1,
            None => self.partial_len += chunk.len(),
        }

        if self.partial_len > self.max_line_bytes {
            return Err(StreamError::LineTooLong {
                limit: self.max_line_bytes,
            });
        }

        self.buffer.extend_from_slice(chunk);
        Ok(())
    }

    /// Pop the next complete line, if one is buffered.
    pub fn next_line(&mut self) -> Option<String> {
        match self.buffer[self.scanned..].iter().position(|&b| b == b'\n') {
            Some(offset) => {
                let line = self.buffer.split_to(self.scanned + offset + 1);
                self.scanned = 0;
                Some(decode_line(&line[..line.len() - 1]))
            }
            None => {
                self.scanned = self.buffer.len();
                None
            }
        }
    }

    /// Push a chunk and drain every line it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> StreamResult<Vec<String>> {
        self.push(chunk)?;
        Ok(std::iter::from_fn(|| self.next_line()).collect())
    }

    /// Flush the unterminated remainder at end of stream.
    ///
    /// Complete lines must be drained with [`next_line`](Self::next_line)
    /// first; anything left after that is the last line of the body.
    pub fn finish(&mut self) -> Option<String> {
        if let Some(line) = self.next_line() {
            return Some(line);
        }
        if self.buffer.is_empty() {
            return None;
        }
        let rest = self.buffer.split();
        self.scanned = 0;
        self.partial_len = 0;
        Some(decode_line(&rest))
    }

    /// Number of buffered bytes not yet returned as lines.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Drop all buffered data.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
        self.partial_len = 0;
    }
}

fn decode_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

pin_project! {
    /// Stream adapter that frames a chunk stream into lines.
    ///
    /// Lazy and single-pass: lines are produced in arrival order as chunks
    /// are polled, and the stream cannot be restarted.
    pub struct LineStream<S> {
        #[pin]
        inner: S,
        framer: LineFramer,
        finished: bool,
    }
}

impl<S> LineStream<S> {
    /// Create a new line stream over a chunk stream.
    pub fn new(inner: S) -> Self {
        Self::with_framer(inner, LineFramer::new())
    }

    /// Create a line stream with a preconfigured framer.
    pub fn with_framer(inner: S, framer: LineFramer) -> Self {
        Self {
            inner,
            framer,
            finished: false,
        }
    }

    /// Bytes currently buffered in the framer.
    pub fn buffered_len(&self) -> usize {
        self.framer.buffered_len()
    }
}

impl<S, B, E> Stream for LineStream<S>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: fmt::Display,
{
    type Item = StreamResult<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if let Some(line) = this.framer.next_line() {
                return Poll::Ready(Some(Ok(line)));
            }

            if *this.finished {
                return Poll::Ready(None);
            }

            match ready!(this.inner.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) => {
                    if let Err(error) = this.framer.push(chunk.as_ref()) {
                        *this.finished = true;
                        this.framer.clear();
                        return Poll::Ready(Some(Err(error)));
                    }
                }
                Some(Err(e)) => {
                    *this.finished = true;
                    this.framer.clear();
                    return Poll::Ready(Some(Err(StreamError::transport(e))));
                }
                None => {
                    *this.finished = true;
                    return Poll::Ready(this.framer.finish().map(Ok));
                }
            }
        }
    }
}
