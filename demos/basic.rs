//! Minimal jsonpipe example: JSON endpoints behind the standard middleware
//! chain.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/users/42
//!   curl -i --compressed http://localhost:3000/users/42
//!   curl -i -X POST http://localhost:3000/users -d '{"name":"alice"}'
//!   curl -i -X POST http://localhost:3000/users -d '{"name":'
//!   curl -i http://localhost:3000/nowhere

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use jsonpipe::context::Key;
use jsonpipe::middleware::Factory;
use jsonpipe::{Config, Dispatcher, Request, Response, Router, Server, StatusCode};
use serde::{Deserialize, Serialize};

const RECEIVED_AT: Key<u64> = Key::new("received_at");

struct App {
    next_id: AtomicU64,
}

#[derive(Deserialize)]
struct NewUser {
    name: String,
}

#[derive(Serialize)]
struct User {
    id: u64,
    name: String,
    received_at: u64,
}

#[tokio::main]
async fn main() -> Result<(), jsonpipe::Error> {
    tracing_subscriber::fmt::init();

    let config = Config::from_toml(
        r#"
        addr = "0.0.0.0:3000"
        debug = true
        max_body_size = 4096
        log_ingress = true
        "#,
    )?;

    let chain = config.chain().with(Factory::new(RECEIVED_AT, unix_seconds));
    let router = Router::<App>::new()
        .route("GetUser", jsonpipe::Method::GET, "/users/{id}", get_user)
        .route("CreateUser", jsonpipe::Method::POST, "/users", create_user)
        .delete("/users/{id}", delete_user);
    let app = App { next_id: AtomicU64::new(100) };

    Server::bind(config.addr.clone())
        .serve(Dispatcher::new(app, chain, router))
        .await
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

// GET /users/{id}
fn get_user(_app: &App, req: &mut Request, res: &mut Response) {
    let Some(id) = req.param("id").and_then(|id| id.parse::<u64>().ok()) else {
        res.set_empty(StatusCode::BAD_REQUEST);
        return;
    };
    let received_at = req.context().get_or(&RECEIVED_AT, 0);
    res.set_ok(User { id, name: "alice".to_owned(), received_at });
}

// POST /users: malformed or oversized bodies come back as 500 with the
// message, since debug is on.
fn create_user(app: &App, req: &mut Request, res: &mut Response) {
    let input: NewUser = match req.parse_body() {
        Ok(input) => input,
        Err(e) => {
            res.set_error(e);
            return;
        }
    };
    let user = User {
        id: app.next_id.fetch_add(1, Ordering::Relaxed),
        name: input.name,
        received_at: req.context().get_or(&RECEIVED_AT, 0),
    };
    if let Err(e) = res.add_header("location", format!("/users/{}", user.id)) {
        res.set_error(e);
        return;
    }
    res.set_result(StatusCode::CREATED, user);
}

// DELETE /users/{id} → 204. hyper strips the `{}` body, as 204 forbids one.
fn delete_user(_app: &App, _req: &mut Request, res: &mut Response) {
    res.set_empty(StatusCode::NO_CONTENT);
}
