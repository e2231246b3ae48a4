use std::time::Instant;

use tracing::{info, warn};

use crate::context::START_TIME;
use crate::request::Request;
use crate::response::Response;

use super::Middleware;

/// Logs every response with its status and latency, and optionally every
/// incoming request.
///
/// Ingress stamps [`START_TIME`] into the context; register `Logging` first so
/// the measured time covers the rest of the chain.
pub struct Logging {
    log_ingress: bool,
}

impl Logging {
    pub fn new(log_ingress: bool) -> Self {
        Self { log_ingress }
    }
}

impl<A> Middleware<A> for Logging {
    fn ingress(&self, _: &A, req: &mut Request, _: &mut Response) {
        req.context_mut().set(&START_TIME, Instant::now());
        if self.log_ingress {
            info!(method = %req.method(), uri = %req.uri(), "←");
        }
    }

    fn egress(&self, _: &A, req: &mut Request, res: &mut Response) {
        let elapsed = req
            .context()
            .get(&START_TIME)
            .map(Instant::elapsed)
            .unwrap_or_default();
        let status = res.status().as_u16();
        match res.error() {
            Some(err) => warn!(
                method = %req.method(),
                status,
                uri = %req.uri(),
                ?elapsed,
                error = %err,
                "→ ERROR"
            ),
            None => info!(method = %req.method(), status, uri = %req.uri(), ?elapsed, "→"),
        }
    }
}
