//! Handler trait.
//!
//! A handler gets the application context, the request and the response
//! envelope. It reads what it needs, then records the outcome on the
//! envelope; it never writes bytes itself.
//!
//! ```text
//! fn get_user(app: &App, req: &mut Request, res: &mut Response) { … }   ← user writes this
//!        ↓ router.get("/users/{id}", get_user)
//! Box::new(get_user) as Box<dyn Handler<App>>                          ← stored in the route
//!        ↓
//! handler.call(&app, &mut req, &mut res)  at request time              ← one vtable dispatch
//! ```
//!
//! Any `Fn(&A, &mut Request, &mut Response)` is a handler. Named functions
//! work best: closures passed through a generic bound do not get their
//! argument lifetimes inferred, so a closure needs explicit parameter types.
//! Types with their own state can implement the trait directly.

use http::StatusCode;

use crate::request::Request;
use crate::response::Response;

/// Implemented for every valid route handler.
pub trait Handler<A>: Send + Sync + 'static {
    fn call(&self, app: &A, req: &mut Request, res: &mut Response);
}

impl<A, F> Handler<A> for F
where
    F: Fn(&A, &mut Request, &mut Response) + Send + Sync + 'static,
{
    fn call(&self, app: &A, req: &mut Request, res: &mut Response) {
        self(app, req, res)
    }
}

/// A type-erased handler, as stored in the router.
pub(crate) type BoxedHandler<A> = Box<dyn Handler<A>>;

/// Fallback for requests no route matched. Goes through the same chain and
/// serializer as every other handler.
pub(crate) struct NotFound;

impl<A> Handler<A> for NotFound {
    fn call(&self, _: &A, _: &mut Request, res: &mut Response) {
        res.set_empty(StatusCode::NOT_FOUND);
    }
}
