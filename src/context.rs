//! Per-request context store.
//!
//! Middleware runs before and after the handler, and neither side wants its
//! call signature widened for every value that needs to travel between them.
//! The [`Context`] owned by each [`Request`](crate::Request) is the side
//! channel: ingress writes, handler and egress read.
//!
//! Keys are typed. A [`Key<T>`] names a slot and fixes the type stored in it,
//! so reads come back as `&T` with no casting at the call site:
//!
//! ```rust
//! use jsonpipe::context::{Context, Key};
//!
//! const TENANT: Key<String> = Key::new("tenant");
//!
//! let mut ctx = Context::default();
//! ctx.set(&TENANT, "acme".to_owned());
//! assert_eq!(ctx.get(&TENANT).map(String::as_str), Some("acme"));
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::time::Instant;

/// Request body limit in bytes. `0` means unlimited.
pub const MAX_BODY_SIZE: Key<u64> = Key::new("max_body_size");

/// When the request entered the pipeline. Set by [`Logging`](crate::middleware::Logging).
pub const START_TIME: Key<Instant> = Key::new("start_time");

/// When `true`, error responses carry the error message.
pub const DEBUG: Key<bool> = Key::new("debug");

/// A named, typed slot in a [`Context`].
pub struct Key<T> {
    name: &'static str,
    _type: PhantomData<fn() -> T>,
}

impl<T> Key<T> {
    pub const fn new(name: &'static str) -> Self {
        Self { name, _type: PhantomData }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Key<T> {}

impl<T> fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.name)
    }
}

/// Key/value store scoped to a single request.
///
/// The map is only allocated on the first [`set`](Context::set); requests
/// that never touch the store pay nothing. A slot read through a key of a
/// different type than it was written with reads as absent.
#[derive(Default)]
pub struct Context {
    values: Option<HashMap<&'static str, Box<dyn Any + Send>>>,
}

impl Context {
    pub fn set<T: Send + 'static>(&mut self, key: &Key<T>, value: T) {
        self.values
            .get_or_insert_with(HashMap::new)
            .insert(key.name, Box::new(value));
    }

    pub fn get<T: 'static>(&self, key: &Key<T>) -> Option<&T> {
        self.values.as_ref()?.get(key.name)?.downcast_ref()
    }

    pub fn get_mut<T: 'static>(&mut self, key: &Key<T>) -> Option<&mut T> {
        self.values.as_mut()?.get_mut(key.name)?.downcast_mut()
    }

    /// Returns the stored value, or `fallback` when the key is absent.
    pub fn get_or<T: Clone + 'static>(&self, key: &Key<T>, fallback: T) -> T {
        self.get(key).cloned().unwrap_or(fallback)
    }

    pub fn contains<T: 'static>(&self, key: &Key<T>) -> bool {
        self.get(key).is_some()
    }

    pub fn remove<T: 'static>(&mut self, key: &Key<T>) -> Option<T> {
        let values = self.values.as_mut()?;
        if !values.get(key.name)?.is::<T>() {
            return None;
        }
        values.remove(key.name)?.downcast::<T>().ok().map(|b| *b)
    }

    pub fn is_allocated(&self) -> bool {
        self.values.is_some()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&str> = self
            .values
            .iter()
            .flat_map(|m| m.keys().copied())
            .collect();
        f.debug_struct("Context").field("keys", &keys).finish()
    }
}
