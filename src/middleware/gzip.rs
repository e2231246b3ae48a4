use http::header::{ACCEPT_ENCODING, CONTENT_ENCODING};
use tracing::warn;

use crate::request::Request;
use crate::response::Response;
use crate::sink::GzipSink;

use super::Middleware;

const GZIP: &str = "gzip";

/// Compresses response bodies with gzip when the client accepts it.
///
/// Matching is a plain substring test on `Accept-Encoding`; quality values
/// are not interpreted.
pub struct Gzip;

impl Gzip {
    pub fn new() -> Self {
        Self
    }

    fn accepted(req: &Request) -> bool {
        req.headers()
            .get_all(ACCEPT_ENCODING)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.contains(GZIP))
    }
}

impl Default for Gzip {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Middleware<A> for Gzip {
    fn ingress(&self, _: &A, req: &mut Request, res: &mut Response) {
        if !Self::accepted(req) {
            return;
        }
        if let Err(e) = res.add_header(CONTENT_ENCODING, GZIP) {
            warn!(request = %req, error = %e, "cannot advertise gzip, leaving body uncompressed");
            return;
        }
        res.wrap_sink(GzipSink::wrap);
    }
}
