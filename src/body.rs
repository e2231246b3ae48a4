//! Blocking reader over a hyper request body.

use std::io::{self, Read};

use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use tokio::runtime::Handle;

/// Adapts a streaming [`Incoming`] body to [`io::Read`].
///
/// Each refill blocks the calling thread on the next body frame, so this
/// must only be read from a blocking context (`spawn_blocking`), never from
/// inside an async task. Frames are pulled on demand: a request whose body is
/// never parsed never has it read off the connection.
pub(crate) struct BodyReader {
    body: Incoming,
    handle: Handle,
    chunk: Bytes,
    done: bool,
}

impl BodyReader {
    pub(crate) fn new(body: Incoming, handle: Handle) -> Self {
        Self { body, handle, chunk: Bytes::new(), done: false }
    }
}

impl Read for BodyReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.chunk.is_empty() {
            if self.done || buf.is_empty() {
                return Ok(0);
            }
            match self.handle.block_on(self.body.frame()) {
                // Trailers carry no body bytes.
                Some(Ok(frame)) => {
                    if let Ok(data) = frame.into_data() {
                        self.chunk = data;
                    }
                }
                Some(Err(e)) => return Err(io::Error::other(e)),
                None => self.done = true,
            }
        }

        let n = buf.len().min(self.chunk.len());
        buf[..n].copy_from_slice(&self.chunk.split_to(n));
        Ok(n)
    }
}
