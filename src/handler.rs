//! The diagnostic request handler.
//!
//! One stateless unit invoked concurrently by the server: read the declared
//! body, decode it best effort, write a report through the sink, and return
//! the fixed acknowledgment. Nothing a device sends can fail the exchange.

use std::convert::Infallible;
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes};
use hyper::header::CONTENT_LENGTH;
use hyper::{HeaderMap, Method, Request, Response};

use crate::logger::ReportSink;
use crate::response;
use crate::vitals;

pub struct VitalsHandler {
    sink: Arc<dyn ReportSink>,
    server_name: String,
    max_body_size: u64,
}

impl VitalsHandler {
    pub fn new(sink: Arc<dyn ReportSink>, server_name: String, max_body_size: u64) -> Self {
        Self {
            sink,
            server_name,
            max_body_size,
        }
    }

    /// Serve one request.
    ///
    /// GET never reads a body; POST and PUT read up to the declared
    /// `Content-Length`. Every decode problem degrades to a fallback report
    /// line, so the acknowledgment is identical for valid, malformed, and
    /// missing payloads. Other methods get a conventional 405.
    pub async fn handle<B>(
        &self,
        req: Request<B>,
        peer: SocketAddr,
    ) -> Result<Response<Full<Bytes>>, Infallible>
    where
        B: Body,
        B::Error: Display,
    {
        let method = req.method().clone();
        let path = req.uri().path().to_owned();
        self.sink.access(peer, method.as_str(), &path);

        let body = match method {
            Method::GET => Bytes::new(),
            Method::POST | Method::PUT => self.read_declared_body(req).await,
            other => {
                self.sink.warn(&format!("Method not allowed: {other}"));
                return Ok(response::method_not_allowed(&self.server_name));
            }
        };

        let payload = vitals::decode(&body);
        self.sink.report(peer, &vitals::report_lines(&payload, peer.ip()));

        Ok(response::acknowledgment(&self.server_name))
    }

    /// Read up to the declared `Content-Length` bytes.
    ///
    /// A missing or non-numeric header means no body at all. An oversized
    /// declaration or a transport error while collecting also degrades to an
    /// empty body; both are logged but never surfaced to the device.
    async fn read_declared_body<B>(&self, req: Request<B>) -> Bytes
    where
        B: Body,
        B::Error: Display,
    {
        let Some(declared) = declared_length(req.headers()) else {
            return Bytes::new();
        };
        if declared == 0 {
            return Bytes::new();
        }
        if declared > self.max_body_size {
            self.sink.warn(&format!(
                "Declared body of {declared} bytes exceeds limit of {} bytes, ignoring payload",
                self.max_body_size
            ));
            return Bytes::new();
        }

        match req.into_body().collect().await {
            Ok(collected) => {
                let mut body = collected.to_bytes();
                let declared = usize::try_from(declared).unwrap_or(usize::MAX);
                // The declared length wins over whatever the transport
                // delivered.
                if body.len() > declared {
                    body.truncate(declared);
                }
                body
            }
            Err(err) => {
                self.sink.warn(&format!("Failed to read request body: {err}"));
                Bytes::new()
            }
        }
    }
}

/// Parse `Content-Length`, treating absence and garbage the same way.
fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers.get(CONTENT_LENGTH)?.to_str().ok()?.parse().ok()
}
