use std::io::{self, Write};

use flate2::Compression;
use flate2::write::GzEncoder;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};

use super::Sink;
use crate::error::Error;

/// Compresses everything written through it with gzip.
///
/// Header and status calls pass straight to the wrapped sink. The encoder
/// buffers internally and emits the gzip header with its first output, so
/// nothing reaches the inner sink until the response body is written.
pub struct GzipSink {
    encoder: GzEncoder<Box<dyn Sink>>,
}

impl GzipSink {
    pub fn new(inner: Box<dyn Sink>) -> Self {
        Self { encoder: GzEncoder::new(inner, Compression::default()) }
    }

    /// Wraps `inner`, for use with [`Response::wrap_sink`](crate::Response::wrap_sink).
    pub fn wrap(inner: Box<dyn Sink>) -> Box<dyn Sink> {
        Box::new(Self::new(inner))
    }
}

impl Write for GzipSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.encoder.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.encoder.flush()
    }
}

impl Sink for GzipSink {
    fn headers(&self) -> &HeaderMap {
        self.encoder.get_ref().headers()
    }

    fn append_header(&mut self, name: HeaderName, value: HeaderValue) -> Result<(), Error> {
        self.encoder.get_mut().append_header(name, value)
    }

    fn insert_header(&mut self, name: HeaderName, value: HeaderValue) -> Result<(), Error> {
        self.encoder.get_mut().insert_header(name, value)
    }

    fn write_status(&mut self, status: StatusCode) -> Result<(), Error> {
        self.encoder.get_mut().write_status(status)
    }

    fn status_sent(&self) -> bool {
        self.encoder.get_ref().status_sent()
    }

    /// Writes the gzip trailer, then closes the wrapped sink. Closing the
    /// inner sink first would cut the stream short.
    fn close(self: Box<Self>) -> Result<(), Error> {
        let inner = self.encoder.finish()?;
        inner.close()
    }
}
