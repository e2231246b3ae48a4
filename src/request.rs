//! Incoming request type.

use std::collections::HashMap;
use std::fmt;
use std::io::Read;

use http::header::CONTENT_LENGTH;
use http::{HeaderMap, Method, Uri};
use serde::de::DeserializeOwned;

use crate::context::{Context, MAX_BODY_SIZE};
use crate::error::Error;

/// An incoming request, exclusively owned by the unit handling it.
///
/// The body is a plain blocking reader; nothing is read until
/// [`parse_body`](Request::parse_body) (or [`take_body`](Request::take_body))
/// asks for it.
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Option<Box<dyn Read + Send>>,
    content_length: Option<u64>,
    pub(crate) params: HashMap<String, String>,
    context: Context,
}

impl Request {
    /// The content-length hint is taken from the `Content-Length` header.
    pub fn new(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: impl Read + Send + 'static,
    ) -> Self {
        let content_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        Self {
            method,
            uri,
            headers,
            body: Some(Box::new(body)),
            content_length,
            params: HashMap::new(),
            context: Context::default(),
        }
    }

    pub fn from_parts(parts: http::request::Parts, body: impl Read + Send + 'static) -> Self {
        Self::new(parts.method, parts.uri, parts.headers, body)
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }
    pub fn content_length(&self) -> Option<u64> { self.content_length }
    pub fn context(&self) -> &Context { &self.context }
    pub fn context_mut(&mut self) -> &mut Context { &mut self.context }

    /// First value of a header, if it is valid visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// Hands out the raw body stream. Returns `None` once it has been taken.
    pub fn take_body(&mut self) -> Option<Box<dyn Read + Send>> {
        self.body.take()
    }

    /// Reads and decodes the JSON body, honouring [`MAX_BODY_SIZE`].
    ///
    /// A declared `Content-Length` above a non-zero limit fails with
    /// [`Error::BodyTooLarge`] before a single byte is read. Otherwise at most
    /// `limit` bytes are read; a body that runs past an undeclared limit is
    /// cut off and fails to decode.
    pub fn parse_body<T: DeserializeOwned>(&mut self) -> Result<T, Error> {
        let limit = self.context.get_or(&MAX_BODY_SIZE, 0);
        if limit > 0 {
            if let Some(declared) = self.content_length.filter(|&n| n > limit) {
                return Err(Error::BodyTooLarge { declared, limit });
            }
        }

        let body = self.body.take().ok_or(Error::BodyConsumed)?;
        let cap = if limit == 0 { u64::MAX } else { limit };
        let mut buf = Vec::new();
        body.take(cap).read_to_end(&mut buf)?;
        serde_json::from_slice(&buf).map_err(Error::Decode)
    }
}

/// `"GET /foo?query=5"`, used to identify the request in logs.
impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.uri)
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("headers", &self.headers)
            .field("content_length", &self.content_length)
            .field("params", &self.params)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}
