//! The response envelope and its JSON serializer.
//!
//! Handlers never write bytes. They record an outcome with one of the
//! mutators ([`set_ok`](Response::set_ok), [`set_result`](Response::set_result),
//! [`set_empty`](Response::set_empty), [`set_error`](Response::set_error)) and
//! the dispatcher turns that outcome into JSON once egress has run:
//!
//! | Outcome | Status | Body |
//! |---|---|---|
//! | body set | as set | the body as JSON |
//! | no body, or `null` | as set | `{}` |
//! | error, debug off | 500 | `{}` |
//! | error, debug on | 500 | `{"error":"<message>"}` |

use std::fmt;
use std::io::Write;

use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::{BoxError, Error};
use crate::sink::Sink;

const JSON: &str = "application/json";
const EMPTY_BODY: &[u8] = b"{}";

/// An outgoing response: status, optional error, body and the sink it will
/// be written to.
pub struct Response {
    status: StatusCode,
    err: Option<BoxError>,
    body: Option<Value>,
    sink: Option<Box<dyn Sink>>,
}

impl Response {
    /// A `200 OK` response with no body, writing to `sink`.
    pub fn new(sink: Box<dyn Sink>) -> Self {
        Self { status: StatusCode::OK, err: None, body: None, sink: Some(sink) }
    }

    /// The status that will be sent: `500` whenever an error is recorded.
    pub fn status(&self) -> StatusCode {
        if self.err.is_some() { StatusCode::INTERNAL_SERVER_ERROR } else { self.status }
    }

    pub fn error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.err.as_deref()
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Sets status and body. A body that cannot be represented as JSON is
    /// recorded as an error instead.
    ///
    /// A previously recorded error is kept: middleware that rejects a request
    /// on ingress cannot be overruled by the handler.
    pub fn set_result<T: Serialize>(&mut self, code: StatusCode, body: T) -> &mut Self {
        match serde_json::to_value(body) {
            Ok(value) => {
                self.status = code;
                self.body = Some(value);
                self
            }
            Err(e) => self.set_error(Error::Encode(e)),
        }
    }

    pub fn set_empty(&mut self, code: StatusCode) -> &mut Self {
        self.status = code;
        self.body = None;
        self
    }

    pub fn set_ok<T: Serialize>(&mut self, body: T) -> &mut Self {
        self.set_result(StatusCode::OK, body)
    }

    /// Records `err`, forces `500` and drops any body.
    pub fn set_error(&mut self, err: impl Into<BoxError>) -> &mut Self {
        self.status = StatusCode::INTERNAL_SERVER_ERROR;
        self.err = Some(err.into());
        self.body = None;
        self
    }

    /// Appends a header directly on the sink.
    ///
    /// Fails once the status line has been sent, or after release.
    pub fn add_header<K, V>(&mut self, name: K, value: V) -> Result<(), Error>
    where
        K: TryInto<HeaderName>,
        <K as TryInto<HeaderName>>::Error: Into<http::Error>,
        V: TryInto<HeaderValue>,
        <V as TryInto<HeaderValue>>::Error: Into<http::Error>,
    {
        let name = name.try_into().map_err(|e| Error::InvalidHeader(e.into().to_string()))?;
        let value = value.try_into().map_err(|e| Error::InvalidHeader(e.into().to_string()))?;
        self.sink.as_deref_mut().ok_or(Error::SinkReleased)?.append_header(name, value)
    }

    /// Headers staged on the sink so far. `None` after release.
    pub fn headers(&self) -> Option<&HeaderMap> {
        self.sink.as_deref().map(|s| s.headers())
    }

    /// Replaces the sink with `wrap(sink)`. The wrapper takes ownership of the
    /// current sink and becomes responsible for closing it.
    pub fn wrap_sink(&mut self, wrap: impl FnOnce(Box<dyn Sink>) -> Box<dyn Sink>) -> &mut Self {
        if let Some(sink) = self.sink.take() {
            self.sink = Some(wrap(sink));
        }
        self
    }

    pub fn is_released(&self) -> bool {
        self.sink.is_none()
    }

    /// Closes the sink stack. Calling it again is a no-op.
    pub fn release(&mut self) -> Result<(), Error> {
        match self.sink.take() {
            Some(sink) => sink.close(),
            None => Ok(()),
        }
    }

    /// Serializes the envelope into the sink. The error message is only
    /// included when `debug` is set.
    pub(crate) fn render(&mut self, debug: bool) -> Result<(), Error> {
        let sink = self.sink.as_deref_mut().ok_or(Error::SinkReleased)?;
        match &self.err {
            Some(err) => {
                let mut body = serde_json::Map::new();
                if debug {
                    body.insert("error".to_owned(), Value::String(err.to_string()));
                }
                write(sink, StatusCode::INTERNAL_SERVER_ERROR, Some(&Value::Object(body)))
            }
            None => write(sink, self.status, self.body.as_ref()),
        }
    }
}

fn write(sink: &mut dyn Sink, status: StatusCode, body: Option<&Value>) -> Result<(), Error> {
    sink.insert_header(CONTENT_TYPE, HeaderValue::from_static(JSON))?;
    sink.write_status(status)?;
    match body {
        None | Some(Value::Null) => sink.write_all(EMPTY_BODY)?,
        Some(body) => serde_json::to_writer(&mut *sink, body).map_err(Error::Encode)?,
    }
    sink.flush()?;
    Ok(())
}

/// A response dropped before it was rendered, for example while unwinding,
/// still goes out as a bare `500` rather than whatever the sink defaults to.
impl Drop for Response {
    fn drop(&mut self) {
        if let Some(sink) = self.sink.as_deref_mut().filter(|s| !s.status_sent()) {
            if let Err(e) = write(sink, StatusCode::INTERNAL_SERVER_ERROR, None) {
                warn!(error = %e, "failed to write fallback response");
            }
        }
        if let Err(e) = self.release() {
            warn!(error = %e, "failed to release response sink");
        }
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("err", &self.err)
            .field("body", &self.body)
            .field("released", &self.is_released())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use http::header::CONTENT_ENCODING;
    use serde_json::json;

    use super::*;
    use crate::sink::{Delivery, Outbound, Parts};

    fn mock_response() -> (Response, Delivery) {
        let (sink, delivery) = Outbound::channel();
        (Response::new(Box::new(sink)), delivery)
    }

    fn rendered(mut res: Response, mut delivery: Delivery, debug: bool) -> Parts {
        res.render(debug).unwrap();
        res.release().unwrap();
        delivery.try_recv().unwrap()
    }

    #[test]
    fn defaults_to_ok_without_body() {
        let (res, _d) = mock_response();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.body().is_none());
        assert!(res.error().is_none());
    }

    #[test]
    fn set_result() {
        let (mut res, _d) = mock_response();
        res.set_result(StatusCode::ACCEPTED, "abc");
        assert!(res.error().is_none());
        assert_eq!(res.status(), StatusCode::ACCEPTED);
        assert_eq!(res.body(), Some(&json!("abc")));
    }

    #[test]
    fn set_empty_clears_body() {
        let (mut res, _d) = mock_response();
        res.set_ok("abc").set_empty(StatusCode::NO_CONTENT);
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert!(res.body().is_none());
    }

    #[test]
    fn set_error_forces_500() {
        let (mut res, _d) = mock_response();
        res.set_ok("abc").set_error("fail");
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.error().map(|e| e.to_string()).as_deref(), Some("fail"));
        assert!(res.body().is_none());
    }

    #[test]
    fn error_survives_later_result() {
        let (mut res, d) = mock_response();
        res.set_error("rejected").set_ok(json!({"a": 1}));
        let parts = rendered(res, d, false);
        assert_eq!(parts.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(parts.body, b"{}");
    }

    #[test]
    fn status_reports_500_while_error_recorded() {
        let (mut res, _d) = mock_response();
        res.set_error("rejected").set_ok(1);
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.body(), Some(&json!(1)));
    }

    #[test]
    fn add_header_writes_through() {
        let (mut res, _d) = mock_response();
        res.add_header("content-type", "text/plain").unwrap();
        assert_eq!(res.headers().unwrap()["content-type"], "text/plain");
        assert!(matches!(
            res.add_header("bad header", "x"),
            Err(Error::InvalidHeader(_))
        ));
    }

    #[test]
    fn empty_body_renders_as_empty_object() {
        let (res, d) = mock_response();
        let parts = rendered(res, d, false);
        assert_eq!(parts.status, StatusCode::OK);
        assert_eq!(parts.headers[CONTENT_TYPE], JSON);
        assert_eq!(parts.body, b"{}");

        let (mut res, d) = mock_response();
        res.set_ok(());
        assert_eq!(rendered(res, d, false).body, b"{}");
    }

    #[test]
    fn body_renders_compact_json() {
        let (mut res, d) = mock_response();
        res.set_result(StatusCode::CREATED, json!({"id": 42}));
        let parts = rendered(res, d, false);
        assert_eq!(parts.status, StatusCode::CREATED);
        assert_eq!(parts.body, br#"{"id":42}"#);
    }

    #[test]
    fn error_message_only_in_debug() {
        let (mut res, d) = mock_response();
        res.set_error("boom");
        assert_eq!(rendered(res, d, false).body, b"{}");

        let (mut res, d) = mock_response();
        res.set_error("boom");
        let parts = rendered(res, d, true);
        assert_eq!(parts.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(parts.body, br#"{"error":"boom"}"#);
    }

    #[test]
    fn drop_before_render_sends_bare_500() {
        let (mut res, mut delivery) = mock_response();
        res.add_header(CONTENT_ENCODING, "identity").unwrap();
        res.set_ok(json!({"a": 1}));
        drop(res);
        let parts = delivery.try_recv().unwrap();
        assert_eq!(parts.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(parts.headers[CONTENT_ENCODING], "identity");
        assert_eq!(parts.headers[CONTENT_TYPE], JSON);
        assert_eq!(parts.body, b"{}");
    }

    #[test]
    fn drop_after_render_keeps_rendered_output() {
        let (mut res, mut delivery) = mock_response();
        res.set_result(StatusCode::CREATED, json!({"a": 1}));
        res.render(false).unwrap();
        drop(res);
        let parts = delivery.try_recv().unwrap();
        assert_eq!(parts.status, StatusCode::CREATED);
        assert_eq!(parts.body, br#"{"a":1}"#);
    }

    #[test]
    fn released_response_rejects_headers() {
        let (mut res, _d) = mock_response();
        res.release().unwrap();
        res.release().unwrap();
        assert!(res.is_released());
        assert!(res.headers().is_none());
        assert!(matches!(res.add_header("x-a", "b"), Err(Error::SinkReleased)));
    }
}
