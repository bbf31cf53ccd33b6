//! Shared utilities for integration testing.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use filtering_proxy::config::ProxyConfig;
use filtering_proxy::http::Response;
use filtering_proxy::lifecycle::Shutdown;
use filtering_proxy::net::{Listener, ListenerError, MessageReader, ReadOutcome};
use filtering_proxy::ProxyServer;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Host name the proxy resolves to the mock origin.
pub const ORIGIN_HOST: &str = "origin.test";

/// A running proxy bound to an ephemeral local port.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), ListenerError>>,
}

/// Config whose origin lookups never leave the machine.
pub fn offline_config(origin_port: u16) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.origin.system_dns = false;
    config.origin.port = origin_port;
    config
        .origin
        .static_hosts
        .insert(ORIGIN_HOST.to_string(), IpAddr::from([127, 0, 0, 1]));
    config
}

/// Start the proxy with `config` on 127.0.0.1 with an ephemeral port.
pub async fn start_proxy(config: ProxyConfig) -> TestProxy {
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let listener = Listener::from_tcp(tcp, config.listener.max_connections).unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    let handle = tokio::spawn(ProxyServer::new(config).run(listener, receiver));

    TestProxy {
        addr,
        shutdown,
        handle,
    }
}

/// Start a mock origin that answers every connection with `response` and
/// then closes. Each request head it receives is sent on the returned channel.
pub async fn start_mock_origin(response: &'static str) -> (u16, mpsc::UnboundedReceiver<String>) {
    start_origin(response, false).await
}

/// Like [`start_mock_origin`], but the origin never closes its side.
pub async fn start_lingering_origin(response: &'static str) -> (u16, mpsc::UnboundedReceiver<String>) {
    start_origin(response, true).await
}

async fn start_origin(response: &'static str, linger: bool) -> (u16, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let (mut socket, _) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(_) => break,
            };
            let tx = tx.clone();
            tokio::spawn(async move {
                let head = read_head(&mut socket).await;
                let _ = tx.send(head);
                let _ = socket.write_all(response.as_bytes()).await;
                if linger {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                } else {
                    let _ = socket.shutdown().await;
                }
            });
        }
    });

    (port, rx)
}

async fn read_head(socket: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut chunk = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => head.extend_from_slice(&chunk[..n]),
        }
    }
    String::from_utf8_lossy(&head).into_owned()
}

/// A raw client connection to the proxy.
pub struct Client {
    reader: MessageReader<TcpStream>,
}

impl Client {
    pub async fn connect(proxy: SocketAddr) -> Self {
        let stream = TcpStream::connect(proxy).await.unwrap();
        Self {
            reader: MessageReader::new(stream, 4096),
        }
    }

    pub async fn send(&mut self, raw: &[u8]) {
        self.reader.get_mut().write_all(raw).await.unwrap();
    }

    /// Read one framed response, failing the test after five seconds.
    pub async fn receive(&mut self) -> Response {
        let mut response = Response::new();
        let outcome = tokio::time::timeout(Duration::from_secs(5), self.reader.read_message(&mut response))
            .await
            .expect("proxy did not answer in time")
            .unwrap();
        assert_eq!(outcome, ReadOutcome::Framed);
        assert!(response.is_complete(), "{:?}", response.error());
        response
    }
}

/// Send one request on a fresh connection and read its response.
pub async fn exchange(proxy: SocketAddr, raw: &[u8]) -> Response {
    let mut client = Client::connect(proxy).await;
    client.send(raw).await;
    client.receive().await
}
