//! TCP accept loop and per-connection serving.
//!
//! Everything here is dispatch around the stateless handler: one spawned
//! task per connection, an accept-time connection cap, per-connection
//! timeouts, and a Ctrl-C stop.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::{TcpListener, TcpStream};

use crate::config::PerformanceConfig;
use crate::handler::VitalsHandler;
use crate::logger::ReportSink;

/// Create a `TcpListener` with `SO_REUSEPORT` and `SO_REUSEADDR` enabled,
/// so a restarted process can rebind the port immediately.
pub fn create_reusable_listener(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_port(true)?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(128)?;

    let std_listener: std::net::TcpListener = socket.into();
    TcpListener::from_std(std_listener)
}

/// Accept connections until Ctrl-C.
///
/// Each connection runs on its own task, so a slow or stalled client only
/// ever blocks itself.
pub async fn run(
    listener: TcpListener,
    handler: Arc<VitalsHandler>,
    sink: Arc<dyn ReportSink>,
    performance: PerformanceConfig,
) -> std::io::Result<()> {
    let active = Arc::new(AtomicUsize::new(0));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        accept_connection(stream, peer, &handler, &sink, &active, &performance);
                    }
                    Err(err) => {
                        sink.warn(&format!("Failed to accept connection: {err}"));
                    }
                }
            }

            _ = &mut shutdown => {
                sink.info("Shutting down server...");
                return Ok(());
            }
        }
    }
}

fn accept_connection(
    stream: TcpStream,
    peer: SocketAddr,
    handler: &Arc<VitalsHandler>,
    sink: &Arc<dyn ReportSink>,
    active: &Arc<AtomicUsize>,
    performance: &PerformanceConfig,
) {
    // Increment first, then check, so two racing accepts cannot both pass.
    let prev = active.fetch_add(1, Ordering::SeqCst);
    if let Some(max) = performance.max_connections {
        if prev >= usize::try_from(max).unwrap_or(usize::MAX) {
            active.fetch_sub(1, Ordering::SeqCst);
            sink.warn(&format!(
                "Max connections reached: {prev}/{max}. Connection rejected."
            ));
            drop(stream);
            return;
        }
    }

    let keep_alive = performance.keep_alive_timeout > 0;
    let timeout = Duration::from_secs(performance.read_timeout.max(performance.write_timeout));
    serve_connection(
        stream,
        peer,
        Arc::clone(handler),
        Arc::clone(sink),
        Arc::clone(active),
        keep_alive,
        timeout,
    );
}

fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    handler: Arc<VitalsHandler>,
    sink: Arc<dyn ReportSink>,
    active: Arc<AtomicUsize>,
    keep_alive: bool,
    timeout: Duration,
) {
    tokio::spawn(async move {
        let io = TokioIo::new(stream);

        let mut builder = http1::Builder::new();
        builder.keep_alive(keep_alive);

        let service_handler = Arc::clone(&handler);
        let conn = builder.serve_connection(
            io,
            service_fn(move |req| {
                let handler = Arc::clone(&service_handler);
                async move { handler.handle(req, peer).await }
            }),
        );

        match tokio::time::timeout(timeout, conn).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                sink.warn(&format!("Failed to serve connection from {peer}: {err}"));
            }
            Err(_) => {
                sink.warn(&format!(
                    "Connection from {peer} timed out after {} seconds",
                    timeout.as_secs()
                ));
            }
        }

        active.fetch_sub(1, Ordering::SeqCst);
    });
}
