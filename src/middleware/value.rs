use crate::context::{DEBUG, Key, MAX_BODY_SIZE};
use crate::request::Request;
use crate::response::Response;

use super::Middleware;

/// Puts a fixed value into the request context on every ingress.
pub struct StaticValue<T> {
    key: Key<T>,
    value: T,
}

impl<T: Clone + Send + Sync + 'static> StaticValue<T> {
    pub fn new(key: Key<T>, value: T) -> Self {
        Self { key, value }
    }
}

impl StaticValue<bool> {
    /// Turns error messages in `500` responses on or off.
    pub fn debug_flag(debug: bool) -> Self {
        Self::new(DEBUG, debug)
    }
}

impl StaticValue<u64> {
    /// Caps how many body bytes [`Request::parse_body`] reads. `0` is unlimited.
    pub fn max_body_size(limit: u64) -> Self {
        Self::new(MAX_BODY_SIZE, limit)
    }
}

impl<A, T: Clone + Send + Sync + 'static> Middleware<A> for StaticValue<T> {
    fn ingress(&self, _: &A, req: &mut Request, _: &mut Response) {
        req.context_mut().set(&self.key, self.value.clone());
    }
}

/// Puts a freshly computed value into the request context on every ingress.
pub struct Factory<T, F> {
    key: Key<T>,
    make: F,
}

impl<T, F> Factory<T, F>
where
    T: Send + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    pub fn new(key: Key<T>, make: F) -> Self {
        Self { key, make }
    }
}

impl<A, T, F> Middleware<A> for Factory<T, F>
where
    T: Send + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    fn ingress(&self, _: &A, req: &mut Request, _: &mut Response) {
        req.context_mut().set(&self.key, (self.make)());
    }
}
