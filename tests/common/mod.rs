//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, Request, Response, StatusCode},
    Router,
};
use capture_proxy::{HttpServer, LogSink, ProxyConfig, Shutdown};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A request as the upstream saw it.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Canned upstream answer.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub headers: Vec<(&'static str, &'static str)>,
    pub body: &'static str,
}

impl Reply {
    pub fn json(body: &'static str) -> Self {
        Self {
            status: 200,
            headers: vec![("content-type", "application/json")],
            body,
        }
    }
}

/// Recording mock upstream built on axum.
pub struct MockUpstream {
    pub addr: SocketAddr,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl MockUpstream {
    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

/// Start a mock upstream that records every request and answers with `reply`.
pub async fn start_upstream(reply: Reply) -> MockUpstream {
    start_slow_upstream(reply, Duration::ZERO).await
}

/// Like [`start_upstream`], but waits `delay` before answering.
pub async fn start_slow_upstream(reply: Reply, delay: Duration) -> MockUpstream {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorded = seen.clone();

    let app = Router::new().fallback(move |request: Request<Body>| {
        let recorded = recorded.clone();
        let reply = reply.clone();
        async move {
            let (parts, body) = request.into_parts();
            let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
            recorded.lock().unwrap().push(SeenRequest {
                method: parts.method.to_string(),
                uri: parts.uri.to_string(),
                headers: parts.headers,
                body,
            });
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let mut response = Response::builder().status(StatusCode::from_u16(reply.status).unwrap());
            for (name, value) in reply.headers {
                response = response.header(name, value);
            }
            response.body(Body::from(reply.body)).unwrap()
        }
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockUpstream { addr, seen }
}

/// Start a raw TCP upstream that writes `response` verbatim after reading
/// the request head.
pub async fn start_raw_upstream(response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut head = Vec::new();
                        let mut buf = [0u8; 1024];
                        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                            match socket.read(&mut buf).await {
                                Ok(0) | Err(_) => return,
                                Ok(n) => head.extend_from_slice(&buf[..n]),
                            }
                        }
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// An address nothing is listening on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// A running proxy under test.
pub struct RunningProxy {
    pub addr: SocketAddr,
    shutdown: Shutdown,
    server: JoinHandle<()>,
}

impl RunningProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn stop(&self) {
        self.shutdown.trigger();
    }

    /// Trigger shutdown and wait until the server has fully drained.
    pub async fn stop_and_wait(self) {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(10), self.server)
            .await
            .expect("Server did not shut down")
            .expect("Server task panicked");
    }
}

/// Config pointing at `endpoint`, otherwise defaults.
pub fn config_for(endpoint: &str) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.upstream.endpoint = endpoint.to_string();
    config.listener.bind_address = "127.0.0.1:0".into();
    config
}

/// Start the proxy on an ephemeral port.
pub async fn start_proxy(config: ProxyConfig, sink: Arc<dyn LogSink>) -> RunningProxy {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, sink).unwrap();
    let server_shutdown = shutdown.subscribe();
    let server = tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    RunningProxy {
        addr,
        shutdown,
        server,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
