//! Per-request lifecycle.
//!
//! ```text
//! init → ingress → handle → egress → serialize → release
//! ```
//!
//! No step is skipped. A handler that fails records an error; one that
//! panics is caught and recorded the same way, and egress, serialization and
//! release still run. Middleware hooks are guarded the same way by the
//! chain. If anything past that unwinds, dropping the response writes a bare
//! `500` before releasing the sink.

use std::panic::{self, AssertUnwindSafe};

use tracing::{debug_span, error};

use crate::context::DEBUG;
use crate::error::{Error, panic_message};
use crate::handler::{Handler, NotFound};
use crate::middleware::Chain;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;
use crate::sink::Sink;

/// Runs requests through the middleware chain and the matched handler.
///
/// Owns everything shared between requests: the application context, the
/// chain and the routes. All of it is read-only once serving starts.
pub struct Dispatcher<A> {
    app: A,
    chain: Chain<A>,
    router: Router<A>,
}

impl<A: Send + Sync + 'static> Dispatcher<A> {
    pub fn new(app: A, chain: Chain<A>, router: Router<A>) -> Self {
        Self { app, chain, router }
    }

    pub fn app(&self) -> &A {
        &self.app
    }

    /// Handles one request end to end, writing the result into `sink`.
    ///
    /// Unmatched requests get an empty `404` through the full pipeline.
    pub fn dispatch(&self, mut req: Request, sink: Box<dyn Sink>) {
        let matched = self.router.lookup(req.method(), req.uri().path());
        let (name, handler): (&str, &dyn Handler<A>) = match matched {
            Some(m) => {
                req.params = m.params;
                (m.route.name(), m.route.handler.as_ref())
            }
            None => ("NotFound", &NotFound),
        };

        let span = debug_span!("request", route = name, method = %req.method(), uri = %req.uri());
        let _enter = span.enter();
        self.run(handler, req, Response::new(sink));
    }

    /// Runs ingress, `handler`, egress, serialization and release.
    pub fn run(&self, handler: &dyn Handler<A>, mut req: Request, mut res: Response) {
        self.chain.ingress(&self.app, &mut req, &mut res);

        let handled = panic::catch_unwind(AssertUnwindSafe(|| {
            handler.call(&self.app, &mut req, &mut res)
        }));
        if let Err(payload) = handled {
            let msg = panic_message(payload.as_ref());
            error!(request = %req, panic = %msg, "handler panicked");
            res.set_error(Error::Panicked(msg));
        }

        self.chain.egress(&self.app, &mut req, &mut res);

        let debug = req.context().get_or(&DEBUG, false);
        if let Err(e) = res.render(debug) {
            error!(request = %req, error = %e, "error rendering response");
        }
        if let Err(e) = res.release() {
            error!(request = %req, error = %e, "error releasing response");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::sync::{Arc, Barrier, Mutex};
    use std::thread;

    use flate2::read::GzDecoder;
    use http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_TYPE};
    use http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::context::Key;
    use crate::middleware::tests::Recorder;
    use crate::middleware::{Gzip, Logging, Middleware, StaticValue};
    use crate::sink::{Outbound, Parts};

    struct App {
        journal: Arc<Mutex<Vec<String>>>,
    }

    const SEEN: Key<String> = Key::new("seen");

    fn boom(_: &App, _: &mut Request, res: &mut Response) {
        res.set_error("boom");
    }

    fn hello(app: &App, req: &mut Request, res: &mut Response) {
        app.journal.lock().unwrap().push("handler".to_owned());
        let seen = req.context().get(&SEEN).cloned();
        res.set_ok(json!({ "id": req.param("id"), "seen": seen }));
    }

    fn panics(_: &App, _: &mut Request, _: &mut Response) {
        panic!("handler exploded");
    }

    #[derive(Deserialize)]
    struct Echo {
        foo: String,
    }

    fn echo(_: &App, req: &mut Request, res: &mut Response) {
        match req.parse_body::<Echo>() {
            Ok(body) => res.set_result(StatusCode::CREATED, json!({ "foo": body.foo })),
            Err(e) => res.set_error(e),
        };
    }

    fn request(method: Method, uri: &'static str, body: &'static str) -> Request {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::CONTENT_LENGTH, HeaderValue::from(body.len()));
        Request::new(method, Uri::from_static(uri), headers, body.as_bytes())
    }

    fn dispatcher(chain: Chain<App>) -> (Dispatcher<App>, Arc<Mutex<Vec<String>>>) {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let router = Router::<App>::new()
            .get("/foo", boom)
            .route("Hello", Method::GET, "/hello/{id}", hello)
            .get("/panic", panics)
            .post("/echo", echo);
        let app = App { journal: Arc::clone(&journal) };
        (Dispatcher::new(app, chain, router), journal)
    }

    fn send(d: &Dispatcher<App>, req: Request) -> Parts {
        let (sink, mut delivery) = Outbound::channel();
        d.dispatch(req, Box::new(sink));
        delivery.try_recv().unwrap()
    }

    #[test]
    fn error_hidden_without_debug() {
        let (d, _) = dispatcher(Chain::new());
        let parts = send(&d, request(Method::GET, "/foo?query=5", ""));
        assert_eq!(parts.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(parts.headers[CONTENT_TYPE], "application/json");
        assert_eq!(parts.body, b"{}");
    }

    #[test]
    fn error_shown_with_debug() {
        let (d, _) = dispatcher(Chain::new().with(StaticValue::debug_flag(true)));
        let parts = send(&d, request(Method::GET, "/foo?query=5", ""));
        assert_eq!(parts.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(parts.body, br#"{"error":"boom"}"#);
    }

    #[test]
    fn unmatched_route_is_404_through_chain() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let chain = Chain::new().with(Recorder { id: 0, journal: Arc::clone(&journal) });
        let (d, _) = dispatcher(chain);
        let parts = send(&d, request(Method::GET, "/nope", ""));
        assert_eq!(parts.status, StatusCode::NOT_FOUND);
        assert_eq!(parts.headers[CONTENT_TYPE], "application/json");
        assert_eq!(parts.body, b"{}");
        assert_eq!(*journal.lock().unwrap(), ["in:0", "out:0"]);
    }

    struct Stamp;

    impl Middleware<App> for Stamp {
        fn ingress(&self, _: &App, req: &mut Request, _: &mut Response) {
            let seq = req.param("id").unwrap_or("none").to_owned();
            req.context_mut().set(&SEEN, format!("ingress-{seq}"));
        }

        fn egress(&self, app: &App, req: &mut Request, _: &mut Response) {
            let seen = req.context().get(&SEEN).cloned().unwrap_or_default();
            app.journal.lock().unwrap().push(seen);
        }
    }

    #[test]
    fn context_flows_from_ingress_to_handler_and_egress() {
        let (d, journal) = dispatcher(Chain::new().with(Stamp));
        let parts = send(&d, request(Method::GET, "/hello/7", ""));
        assert_eq!(parts.status, StatusCode::OK);
        assert_eq!(parts.body, br#"{"id":"7","seen":"ingress-7"}"#);

        let parts = send(&d, request(Method::GET, "/hello/8", ""));
        assert_eq!(parts.body, br#"{"id":"8","seen":"ingress-8"}"#);
        assert_eq!(
            *journal.lock().unwrap(),
            ["handler", "ingress-7", "handler", "ingress-8"],
        );
    }

    /// Holds each request at ingress until the others have reached it too.
    struct Rendezvous(Arc<Barrier>);

    impl Middleware<App> for Rendezvous {
        fn ingress(&self, _: &App, _: &mut Request, _: &mut Response) {
            self.0.wait();
        }
    }

    #[test]
    fn concurrent_requests_keep_separate_contexts() {
        let barrier = Arc::new(Barrier::new(2));
        let chain = Chain::new().with(Stamp).with(Rendezvous(barrier));
        let (d, _) = dispatcher(chain);

        let bodies: Vec<Vec<u8>> = thread::scope(|s| {
            let d = &d;
            let handles: Vec<_> = ["/hello/1", "/hello/2"]
                .into_iter()
                .map(|uri| s.spawn(move || send(d, request(Method::GET, uri, "")).body))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(bodies[0], br#"{"id":"1","seen":"ingress-1"}"#);
        assert_eq!(bodies[1], br#"{"id":"2","seen":"ingress-2"}"#);
    }

    struct Explode;

    impl Middleware<App> for Explode {
        fn ingress(&self, _: &App, _: &mut Request, _: &mut Response) {
            panic!("middleware exploded");
        }
    }

    #[test]
    fn middleware_panic_renders_500() {
        let (d, _) = dispatcher(Chain::new().with(Explode));
        let parts = send(&d, request(Method::GET, "/hello/1", ""));
        assert_eq!(parts.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(parts.headers[CONTENT_TYPE], "application/json");
        assert_eq!(parts.body, b"{}");

        let chain = Chain::new().with(StaticValue::debug_flag(true)).with(Explode);
        let (d, journal) = dispatcher(chain);
        let parts = send(&d, request(Method::GET, "/hello/1", ""));
        assert_eq!(parts.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            parts.body,
            br#"{"error":"middleware panicked during ingress: middleware exploded"}"#,
        );
        assert_eq!(*journal.lock().unwrap(), ["handler"]);
    }

    #[test]
    fn panic_still_runs_egress_and_release() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let chain = Chain::new()
            .with(StaticValue::debug_flag(true))
            .with(Recorder { id: 0, journal: Arc::clone(&journal) });
        let (d, _) = dispatcher(chain);
        let parts = send(&d, request(Method::GET, "/panic", ""));
        assert_eq!(parts.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(parts.body, br#"{"error":"handler panicked: handler exploded"}"#);
        assert_eq!(*journal.lock().unwrap(), ["in:0", "out:0"]);
    }

    #[test]
    fn body_guard_rejects_before_decoding() {
        let (d, _) = dispatcher(
            Chain::new()
                .with(StaticValue::max_body_size(3))
                .with(StaticValue::debug_flag(true)),
        );
        let parts = send(&d, request(Method::POST, "/echo", r#"{"foo":"bar"}"#));
        assert_eq!(parts.status, StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = serde_json::from_slice(&parts.body).unwrap();
        assert!(body["error"].as_str().unwrap().starts_with("request body too large"));
    }

    #[test]
    fn decodes_body_within_limit() {
        let (d, _) = dispatcher(Chain::new().with(StaticValue::max_body_size(5000)));
        let parts = send(&d, request(Method::POST, "/echo", r#"{"foo":"bar"}"#));
        assert_eq!(parts.status, StatusCode::CREATED);
        assert_eq!(parts.body, br#"{"foo":"bar"}"#);

        let parts = send(&d, request(Method::POST, "/echo", "{not json"));
        assert_eq!(parts.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(parts.body, b"{}");
    }

    #[test]
    fn gzip_round_trips_through_pipeline() {
        let chain = Chain::new().with(Logging::new(true)).with(Gzip::new());
        let (d, _) = dispatcher(chain);

        let mut req = request(Method::GET, "/hello/1", "");
        req.headers_mut().insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
        let parts = send(&d, req);
        assert_eq!(parts.headers[CONTENT_ENCODING], "gzip");
        assert_eq!(parts.headers[CONTENT_TYPE], "application/json");

        let mut plain = String::new();
        GzDecoder::new(&parts.body[..]).read_to_string(&mut plain).unwrap();
        assert_eq!(plain, r#"{"id":"1","seen":null}"#);

        let parts = send(&d, request(Method::GET, "/hello/1", ""));
        assert!(parts.headers.get(CONTENT_ENCODING).is_none());
        assert_eq!(parts.body, br#"{"id":"1","seen":null}"#);
    }

    #[test]
    fn run_without_router() {
        let (d, _) = dispatcher(Chain::new().with(StaticValue::max_body_size(1)));
        let (sink, mut delivery) = Outbound::channel();
        let req = request(Method::PUT, "/anything", "");
        d.run(&NotFound, req, Response::new(Box::new(sink)));
        assert_eq!(delivery.try_recv().unwrap().status, StatusCode::NOT_FOUND);
        assert!(d.app().journal.lock().unwrap().is_empty());
    }
}
