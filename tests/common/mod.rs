//! Shared utilities for engine and server integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use clockgen_panel::config::PanelConfig;
use clockgen_panel::device::{Device, SignalController, SignalState, SimulatedChip};
use clockgen_panel::http::{EngineLimits, HttpEngine};
use clockgen_panel::lifecycle::Shutdown;
use clockgen_panel::net::{ConnectionId, Interest, Listener, Transport, TransportError, WriteFlags};
use clockgen_panel::PanelServer;

/// One recorded `Transport::write`.
#[derive(Debug, Clone)]
pub struct Write {
    pub conn: ConnectionId,
    pub data: Vec<u8>,
    pub flags: WriteFlags,
}

/// In-memory transport with a send buffer the test refills by hand.
///
/// Each successful write consumes capacity; nothing is ever acknowledged
/// unless the test calls `set_capacity` again.
#[derive(Debug, Default)]
pub struct MockTransport {
    capacity: usize,
    /// Writes that fail with `OutOfMemory` before succeeding again.
    pub out_of_memory_writes: usize,
    /// Fail every write with `Reset`.
    pub fail_writes: bool,
    pub writes: Vec<Write>,
    pub interests: HashMap<ConnectionId, Interest>,
    pub registrations: Vec<(ConnectionId, Interest)>,
    pub closed: Vec<ConnectionId>,
    pub acknowledged: usize,
    pub flushes: usize,
}

impl MockTransport {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
    }

    /// Everything written to `conn`, concatenated.
    pub fn output(&self, conn: ConnectionId) -> Vec<u8> {
        self.writes
            .iter()
            .filter(|w| w.conn == conn)
            .flat_map(|w| w.data.iter().copied())
            .collect()
    }

    pub fn interest(&self, conn: ConnectionId) -> Interest {
        self.interests.get(&conn).copied().unwrap_or_default()
    }

    pub fn is_closed(&self, conn: ConnectionId) -> bool {
        self.closed.contains(&conn)
    }
}

impl Transport for MockTransport {
    fn register(&mut self, conn: ConnectionId, interest: Interest) {
        self.interests.insert(conn, interest);
        self.registrations.push((conn, interest));
    }

    fn write(&mut self, conn: ConnectionId, data: &[u8], flags: WriteFlags) -> Result<(), TransportError> {
        if self.fail_writes {
            return Err(TransportError::Reset);
        }
        if self.out_of_memory_writes > 0 {
            self.out_of_memory_writes -= 1;
            return Err(TransportError::OutOfMemory);
        }
        if data.len() > self.capacity {
            return Err(TransportError::OutOfMemory);
        }
        self.capacity -= data.len();
        self.writes.push(Write {
            conn,
            data: data.to_vec(),
            flags,
        });
        Ok(())
    }

    fn send_capacity(&self, _conn: ConnectionId) -> usize {
        self.capacity
    }

    fn flush(&mut self, _conn: ConnectionId) -> Result<(), TransportError> {
        self.flushes += 1;
        Ok(())
    }

    fn acknowledge(&mut self, _conn: ConnectionId, len: usize) {
        self.acknowledged += len;
    }

    fn close(&mut self, conn: ConnectionId) -> Result<(), TransportError> {
        self.closed.push(conn);
        Ok(())
    }
}

pub fn device() -> Device {
    Device::new(SignalController::new(
        Box::new(SimulatedChip::default()),
        SignalState::default(),
    ))
}

pub fn engine(limits: EngineLimits) -> HttpEngine {
    HttpEngine::new(device(), limits)
}

/// Split a raw response into header text and body bytes.
pub fn split_response(raw: &[u8]) -> (String, Vec<u8>) {
    let pos = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("response has no header terminator");
    (
        String::from_utf8_lossy(&raw[..pos + 4]).into_owned(),
        raw[pos + 4..].to_vec(),
    )
}

/// Value of the `Content-Length` header.
pub fn content_length(header: &str) -> usize {
    header
        .lines()
        .find_map(|line| line.strip_prefix("Content-Length: "))
        .expect("no Content-Length header")
        .trim()
        .parse()
        .expect("Content-Length is not a number")
}

/// A server running on an ephemeral loopback port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<()>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
    }
}

/// Start the panel with `config`, bound to 127.0.0.1 on a free port.
pub async fn start_panel(config: PanelConfig) -> TestServer {
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = tcp.local_addr().unwrap();
    let listener = Listener::from_tcp(tcp).unwrap();

    let shutdown = Shutdown::new();
    let server = PanelServer::new(config, device(), shutdown.clone());
    let handle = tokio::spawn(server.run(listener));

    TestServer { addr, shutdown, handle }
}

/// Send `request` in one write and read until the server closes.
pub async fn raw_exchange(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request).await.unwrap();
    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut response))
        .await
        .expect("server did not close the connection")
        .unwrap();
    response
}

/// Build a form POST with the body in the same segment as the header.
pub fn form_post(path: &str, body: &str) -> Vec<u8> {
    format!(
        "POST {} HTTP/1.1\r\nHost: panel\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n{}",
        path,
        body.len(),
        body
    )
    .into_bytes()
}
