//! Middleware layer.
//!
//! Middleware is the right place for cross-cutting concerns: request
//! logging, compression, request-scoped settings. Each middleware takes part
//! twice per request:
//!
//! ```text
//! ingress:  m1 → m2 → m3 → handler
//! egress:   m3 → m2 → m1 → serializer
//! ```
//!
//! The last middleware to see the request on the way in is the first to see
//! the response on the way out. Every registered entry always runs. There is
//! no early exit: a middleware that wants to reject a request sets an error
//! or status on the [`Response`] and returns, and the serializer takes it
//! from there.

mod gzip;
mod logging;
mod value;

pub use gzip::Gzip;
pub use logging::Logging;
pub use value::{Factory, StaticValue};

use std::panic::{self, AssertUnwindSafe};

use tracing::error;

use crate::error::{Error, panic_message};
use crate::request::Request;
use crate::response::Response;

/// One cross-cutting behaviour, run around every handler.
///
/// Both hooks default to no-ops; implement the one you need. `A` is the
/// application context shared by all requests.
pub trait Middleware<A>: Send + Sync + 'static {
    fn ingress(&self, app: &A, req: &mut Request, res: &mut Response) {
        let _ = (app, req, res);
    }

    fn egress(&self, app: &A, req: &mut Request, res: &mut Response) {
        let _ = (app, req, res);
    }
}

/// An ordered list of middleware.
///
/// Built once at startup and read-only while serving. The chain holds no
/// per-request state, so one instance serves every request concurrently.
pub struct Chain<A> {
    entries: Vec<Box<dyn Middleware<A>>>,
}

impl<A: 'static> Chain<A> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Appends `middleware`. Registration order is ingress order.
    pub fn with(mut self, middleware: impl Middleware<A>) -> Self {
        self.entries.push(Box::new(middleware));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Runs every ingress hook in registration order.
    ///
    /// A hook that panics is recorded on `res` as
    /// [`Error::MiddlewarePanicked`]; the remaining hooks still run.
    pub fn ingress(&self, app: &A, req: &mut Request, res: &mut Response) {
        for middleware in &self.entries {
            guarded("ingress", req, res, |req, res| middleware.ingress(app, req, res));
        }
    }

    /// Runs every egress hook in reverse registration order, with the same
    /// panic handling as [`ingress`](Chain::ingress).
    pub fn egress(&self, app: &A, req: &mut Request, res: &mut Response) {
        for middleware in self.entries.iter().rev() {
            guarded("egress", req, res, |req, res| middleware.egress(app, req, res));
        }
    }
}

fn guarded(
    stage: &'static str,
    req: &mut Request,
    res: &mut Response,
    hook: impl FnOnce(&mut Request, &mut Response),
) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| hook(&mut *req, &mut *res)));
    if let Err(payload) = outcome {
        let message = panic_message(payload.as_ref());
        error!(request = %req, stage, panic = %message, "middleware panicked");
        res.set_error(Error::MiddlewarePanicked { stage, message });
    }
}

impl<A: 'static> Default for Chain<A> {
    fn default() -> Self {
        Self::new()
    }
}
