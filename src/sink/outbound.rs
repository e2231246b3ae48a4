//! The undecorated sink handed to every request by the server.

use std::io;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use http_body_util::Full;
use tokio::sync::oneshot;

use super::Sink;
use crate::error::Error;

/// Everything a released [`Outbound`] sink produced.
#[derive(Debug)]
pub struct Parts {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Parts {
    pub fn into_response(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(Bytes::from(self.body)));
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }
}

/// Receiving half of an [`Outbound`] sink. Resolves once the sink is closed,
/// or with an error if it was dropped without being closed.
pub type Delivery = oneshot::Receiver<Parts>;

/// In-memory sink that hands its output to the connection task on close.
///
/// The request runs on a blocking thread while the connection lives on the
/// async runtime; `close` is the hand-off point between the two.
pub struct Outbound {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
    tx: oneshot::Sender<Parts>,
}

impl Outbound {
    pub fn channel() -> (Self, Delivery) {
        let (tx, rx) = oneshot::channel();
        let sink = Self {
            status: None,
            headers: HeaderMap::new(),
            body: Vec::new(),
            tx,
        };
        (sink, rx)
    }

    fn check_open(&self) -> Result<(), Error> {
        if self.status.is_some() {
            return Err(Error::HeadersSent);
        }
        Ok(())
    }
}

impl io::Write for Outbound {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.status.get_or_insert(StatusCode::OK);
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Sink for Outbound {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn append_header(&mut self, name: HeaderName, value: HeaderValue) -> Result<(), Error> {
        self.check_open()?;
        self.headers.append(name, value);
        Ok(())
    }

    fn insert_header(&mut self, name: HeaderName, value: HeaderValue) -> Result<(), Error> {
        self.check_open()?;
        self.headers.insert(name, value);
        Ok(())
    }

    fn write_status(&mut self, status: StatusCode) -> Result<(), Error> {
        if self.status.is_some() {
            return Err(Error::StatusSent);
        }
        self.status = Some(status);
        Ok(())
    }

    fn status_sent(&self) -> bool {
        self.status.is_some()
    }

    fn close(self: Box<Self>) -> Result<(), Error> {
        let Outbound { status, headers, body, tx } = *self;
        let parts = Parts {
            status: status.unwrap_or(StatusCode::OK),
            headers,
            body,
        };
        // The connection side only hangs up when the client went away.
        tx.send(parts).map_err(|_| {
            Error::Io(io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected"))
        })
    }
}
