//! Getting-started example: routes, params, wildcards, and middleware.
//!
//! Run with:
//!
//! ```bash
//! cargo run --example getting_started
//! ```
//!
//! Then try:
//!
//! ```bash
//! curl http://127.0.0.1:8001/
//! curl http://127.0.0.1:8001/user/42
//! curl http://127.0.0.1:8001/user/admin_abc/profile
//! curl http://127.0.0.1:8001/files/a/b/c
//! curl -X POST -d '{"name":"alice"}' http://127.0.0.1:8001/users
//! ```

use serde::Deserialize;
use trellis::prelude::*;

#[derive(Debug, Deserialize)]
struct NewUser {
    name: String,
}

fn main() -> std::io::Result<()> {
    let mut server = HttpServer::new()
        // Outermost: contain panics from everything below.
        .middleware(Recovery::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error!!!",
        ))
        // Log each request after its handler settles.
        .middleware(AccessLog::new(|line: &str| println!("{line}")));

    server
        .get("/", |ctx: &mut Context<'_>| {
            ctx.respond(StatusCode::OK, "hi");
        })
        .expect("route");

    server
        .get("/user/:id", |ctx: &mut Context<'_>| {
            let id = ctx.path_value("id").unwrap_or("?").to_string();
            ctx.respond(StatusCode::OK, format!("user {id}"));
        })
        .expect("route");

    // Regex capture: /user/admin_abc/profile binds role = "admin".
    server
        .get("/user/:role((.*)_.*)/profile", |ctx: &mut Context<'_>| {
            let role = ctx.path_value("role").unwrap_or("?").to_string();
            ctx.respond(StatusCode::OK, format!("profile of a {role}"));
        })
        .expect("route");

    // Trailing wildcard: absorbs the whole remaining path.
    server
        .get("/files/*", |ctx: &mut Context<'_>| {
            let path = ctx.request().path().to_string();
            ctx.respond(StatusCode::OK, format!("would serve {path}"));
        })
        .expect("route");

    server
        .post("/users", |ctx: &mut Context<'_>| {
            match ctx.bind_json::<NewUser>() {
                Ok(user) => ctx.respond(StatusCode::CREATED, format!("created {}", user.name)),
                Err(err) => ctx.respond(StatusCode::BAD_REQUEST, format!("bad request: {err}")),
            }
        })
        .expect("route");

    println!("listening on http://127.0.0.1:8001");
    server.serve("127.0.0.1:8001")
}
