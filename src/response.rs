//! Fixed response builders.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{ALLOW, CONTENT_TYPE, SERVER};
use hyper::{Response, StatusCode};

/// Body returned for every handled request, valid payload or not.
const ACK_BODY: &[u8] = br#"{"status":"ok"}"#;

pub fn acknowledgment(server_name: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "application/json; charset=utf-8")
        .header(SERVER, server_name)
        .body(Full::new(Bytes::from_static(ACK_BODY)))
        .expect("Failed to build acknowledgment response")
}

pub fn method_not_allowed(server_name: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header(CONTENT_TYPE, "text/plain")
        .header(ALLOW, "GET, POST, PUT")
        .header(SERVER, server_name)
        .body(Full::new(Bytes::from("Method Not Allowed")))
        .expect("Failed to build 405 response")
}
