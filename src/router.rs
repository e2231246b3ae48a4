//! Radix-tree request router.
//!
//! One tree per HTTP method. O(path-length) lookup. A route is a name, a
//! method, a path and a handler; the name only shows up in logs.

use std::collections::HashMap;
use std::fmt;

use http::Method;
use matchit::Router as MatchitRouter;

use crate::handler::{BoxedHandler, Handler};

/// A registered `(name, method, path, handler)` entry.
pub struct Route<A> {
    name: String,
    method: Method,
    path: String,
    pub(crate) handler: BoxedHandler<A>,
}

impl<A> Route<A> {
    pub fn name(&self) -> &str { &self.name }
    pub fn method(&self) -> &Method { &self.method }
    pub fn path(&self) -> &str { &self.path }
}

/// `GetUser=GET:/users/{id}`
impl<A> fmt::Display for Route<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}:{}", self.name, self.method, self.path)
    }
}

/// The result of a successful lookup.
pub(crate) struct Matched<'r, A> {
    pub(crate) route: &'r Route<A>,
    pub(crate) params: HashMap<String, String>,
}

/// The application router.
///
/// Build it once at startup and hand it to a
/// [`Dispatcher`](crate::Dispatcher). Each registration returns `self` so
/// calls chain naturally.
pub struct Router<A> {
    routes: HashMap<Method, MatchitRouter<Route<A>>>,
    len: usize,
}

impl<A: 'static> Router<A> {
    pub fn new() -> Self {
        Self { routes: HashMap::new(), len: 0 }
    }

    /// Registers a named route.
    ///
    /// Path parameters use `{name}` syntax; `req.param("name")` retrieves them.
    ///
    /// # Panics
    ///
    /// Panics if `path` is malformed or conflicts with a route already
    /// registered for `method`. Routes are set up once at startup, so this
    /// is a programming error.
    pub fn route(
        mut self,
        name: &str,
        method: Method,
        path: &str,
        handler: impl Handler<A>,
    ) -> Self {
        let route = Route {
            name: name.to_owned(),
            method: method.clone(),
            path: path.to_owned(),
            handler: Box::new(handler),
        };
        self.routes
            .entry(method)
            .or_default()
            .insert(path, route)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self.len += 1;
        self
    }

    /// Registers a route named after its path.
    pub fn on(self, method: Method, path: &str, handler: impl Handler<A>) -> Self {
        self.route(path, method, path, handler)
    }

    pub fn get(self, path: &str, handler: impl Handler<A>) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler<A>) -> Self {
        self.on(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler<A>) -> Self {
        self.on(Method::PUT, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler<A>) -> Self {
        self.on(Method::DELETE, path, handler)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn lookup(&self, method: &Method, path: &str) -> Option<Matched<'_, A>> {
        let matched = self.routes.get(method)?.at(path).ok()?;
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some(Matched { route: matched.value, params })
    }
}

impl<A: 'static> Default for Router<A> {
    fn default() -> Self { Self::new() }
}
