//! Output sinks.
//!
//! A [`Sink`] is where a response ends up: a header map, a status line and a
//! byte stream, plus a release step. The dispatcher only ever talks to a
//! `Box<dyn Sink>`, which lets middleware swap in decorators such as
//! [`GzipSink`] without the serializer noticing.
//!
//! Decorators take ownership of the sink they wrap. Releasing is
//! `close(self: Box<Self>)`: each layer finalizes itself and then closes the
//! layer underneath, so a stack of decorators unwinds outermost-first and the
//! real transport is always released last.

mod gzip;
mod outbound;

pub use gzip::GzipSink;
pub use outbound::{Delivery, Outbound, Parts};

use std::io;

use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};

use crate::error::Error;

/// The capability to emit one HTTP response.
///
/// Bytes go through [`io::Write`]. Writing bytes before
/// [`write_status`](Sink::write_status) implies `200 OK`.
pub trait Sink: io::Write + Send {
    fn headers(&self) -> &HeaderMap;

    /// Appends a header value. Fails with [`Error::HeadersSent`] once the
    /// status line has gone out.
    fn append_header(&mut self, name: HeaderName, value: HeaderValue) -> Result<(), Error>;

    /// Replaces every value of `name`. Same restriction as
    /// [`append_header`](Sink::append_header).
    fn insert_header(&mut self, name: HeaderName, value: HeaderValue) -> Result<(), Error>;

    fn write_status(&mut self, status: StatusCode) -> Result<(), Error>;

    fn status_sent(&self) -> bool;

    /// Finalizes this layer and releases everything underneath it.
    fn close(self: Box<Self>) -> Result<(), Error>;
}
