//! # jsonpipe
//!
//! A minimal JSON-API request pipeline. One handler per route, an ordered
//! chain of middleware around it, and a response envelope that guarantees
//! uniform JSON whatever the handler produced.
//!
//! ## The contract
//!
//! - **Middleware** runs ingress in registration order and egress in reverse.
//!   Every entry always runs; rejecting a request means setting an error on
//!   the response, not skipping the rest of the chain.
//! - **Context**: each request carries a typed key/value store for handing
//!   values from ingress to the handler and egress.
//! - **Envelope**: handlers record an outcome on the [`Response`]; the
//!   dispatcher serializes it. Errors become `500` with `{}`, or with
//!   `{"error":"…"}` when the debug flag is set. No body becomes `{}`.
//! - **Sinks**: the output side is a [`Sink`](sink::Sink) that middleware may
//!   wrap, for example with gzip. Wrappers are released outermost-first.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use jsonpipe::{Config, Dispatcher, Request, Response, Router, Server, StatusCode};
//!
//! struct App;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), jsonpipe::Error> {
//!     let config = Config::default();
//!     let router = Router::<App>::new()
//!         .get("/users/{id}", get_user)
//!         .post("/users", create_user);
//!
//!     Server::bind(config.addr.clone())
//!         .serve(Dispatcher::new(App, config.chain(), router))
//!         .await
//! }
//!
//! fn get_user(_app: &App, req: &mut Request, res: &mut Response) {
//!     let id = req.param("id").unwrap_or("unknown").to_owned();
//!     res.set_ok(serde_json::json!({ "id": id }));
//! }
//!
//! #[derive(serde::Deserialize, serde::Serialize)]
//! struct NewUser { name: String }
//!
//! fn create_user(_app: &App, req: &mut Request, res: &mut Response) {
//!     match req.parse_body::<NewUser>() {
//!         Ok(user) => res.set_result(StatusCode::CREATED, user),
//!         Err(e) => res.set_error(e),
//!     };
//! }
//! ```

mod body;
mod config;
mod dispatch;
mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod context;
pub mod middleware;
pub mod sink;

pub use config::Config;
pub use dispatch::Dispatcher;
pub use error::{BoxError, Error};
pub use handler::Handler;
pub use http::{HeaderMap, Method, StatusCode, Uri};
pub use request::Request;
pub use response::Response;
pub use router::{Route, Router};
pub use server::Server;
