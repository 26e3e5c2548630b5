//! End-to-end tests over a real TCP connection.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;

use serial_test::serial;
use trellis_core::{Context, Recovery, StatusCode};
use trellis_http::HttpServer;

fn spawn(server: HttpServer) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        let _ = server.serve_on(listener);
    });
    addr
}

fn roundtrip(addr: SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.write_all(raw.as_bytes()).unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();
    response
}

#[test]
#[serial]
fn serves_a_param_route() {
    let mut server = HttpServer::new();
    server
        .get("/hello/:name", |ctx: &mut Context<'_>| {
            let name = ctx.path_value("name").unwrap_or("stranger").to_string();
            ctx.respond(StatusCode::OK, format!("hello {name}"));
        })
        .unwrap();
    let addr = spawn(server);

    let response = roundtrip(addr, "GET /hello/world HTTP/1.1\r\nhost: localhost\r\n\r\n");
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("content-length: 11\r\n"));
    assert!(response.ends_with("hello world"));
}

#[test]
#[serial]
fn unknown_path_is_404() {
    let mut server = HttpServer::new();
    server
        .get("/known", |ctx: &mut Context<'_>| {
            ctx.set_status(StatusCode::OK);
        })
        .unwrap();
    let addr = spawn(server);

    let response = roundtrip(addr, "GET /unknown HTTP/1.1\r\nhost: localhost\r\n\r\n");
    assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
    assert!(response.ends_with("404 page not found"));
}

#[test]
#[serial]
fn recovered_panic_reaches_the_client() {
    let mut server = HttpServer::new().middleware(Recovery::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal Server Error!!!",
    ));
    server
        .get("/", |ctx: &mut Context<'_>| {
            ctx.respond(StatusCode::OK, "Hi!");
            panic!("oh shoot");
        })
        .unwrap();
    let addr = spawn(server);

    let response = roundtrip(addr, "GET / HTTP/1.1\r\nhost: localhost\r\n\r\n");
    assert!(response.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    assert!(response.ends_with("Internal Server Error!!!"));
}

#[test]
#[serial]
fn post_body_reaches_the_handler() {
    let mut server = HttpServer::new();
    server
        .post("/echo", |ctx: &mut Context<'_>| {
            let body = ctx.request().body().as_bytes().to_vec();
            ctx.respond(StatusCode::OK, body);
        })
        .unwrap();
    let addr = spawn(server);

    let response = roundtrip(
        addr,
        "POST /echo HTTP/1.1\r\nhost: localhost\r\ncontent-length: 5\r\n\r\nhowdy",
    );
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.ends_with("howdy"));
}

#[test]
#[serial]
fn malformed_request_is_400() {
    let server = HttpServer::new();
    let addr = spawn(server);

    let response = roundtrip(addr, "NOT-A-METHOD / HTTP/1.1\r\nhost: localhost\r\n\r\n");
    assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
}
