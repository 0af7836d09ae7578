//! Host event loop.
//!
//! # Responsibilities
//! - Own the engine and the socket transport on a single task
//! - Feed accepted sockets, socket events, poll ticks and Morse deadlines into the engine
//! - Stop accepting and close every connection on shutdown
//!
//! # Data Flow
//! ```text
//! Listener::run ──Accepted──┐
//! socket tasks ──events─────┼──▶ select! ──▶ TokioTransport::filter ──▶ HttpEngine
//! poll interval ────────────┤                                           │
//! Morse deadline ───────────┤                                  Device::tick
//! Shutdown ─────────────────┘
//! ```
//!
//! # Design Decisions
//! - One task owns all mutable state, so handlers and the Morse tick never race
//! - Poll ticks only reach connections registered for POLL

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::config::PanelConfig;
use crate::device::Device;
use crate::http::engine::HttpEngine;
use crate::lifecycle::Shutdown;
use crate::net::listener::Listener;
use crate::net::socket::{HostEvent, TokioTransport};
use crate::net::transport::{Interest, TransportEvent};

/// The panel's HTTP server.
pub struct PanelServer {
    config: PanelConfig,
    engine: HttpEngine,
    shutdown: Shutdown,
}

impl PanelServer {
    /// Create a server around `device` with the given configuration.
    pub fn new(config: PanelConfig, device: Device, shutdown: Shutdown) -> Self {
        let engine = HttpEngine::new(device, config.engine_limits());
        Self {
            config,
            engine,
            shutdown,
        }
    }

    /// Serve `listener` until shutdown is triggered.
    pub async fn run(self, listener: Listener) {
        let Self {
            config,
            mut engine,
            shutdown,
        } = self;

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut transport = TokioTransport::new(events_tx.clone(), config.socket_limits());
        let accept_task = tokio::spawn(listener.run(events_tx, shutdown.subscribe()));

        let mut poll = tokio::time::interval(Duration::from_millis(config.engine.poll_interval_ms.max(1)));
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown_rx = shutdown.subscribe();

        tracing::info!(
            poll_interval_ms = config.engine.poll_interval_ms,
            max_connections = config.listener.max_connections,
            "Event loop started"
        );

        loop {
            let morse_deadline = engine.device().next_deadline();
            tokio::select! {
                event = events_rx.recv() => match event {
                    Some(event) => dispatch_event(&mut engine, &mut transport, event),
                    None => break,
                },
                _ = poll.tick() => {
                    for conn in transport.interested(Interest::POLL) {
                        engine.on_poll(&mut transport, conn);
                    }
                }
                _ = sleep_until(morse_deadline) => {
                    engine.tick_device(std::time::Instant::now());
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!(active = engine.active_connections(), "Shutdown requested, closing connections");
                    break;
                }
            }
        }

        engine.close_all(&mut transport);
        transport.shutdown();
        if let Err(e) = accept_task.await {
            tracing::warn!(error = %e, "Accept loop ended abnormally");
        }
        tracing::info!("Event loop stopped");
    }
}

/// Route one host event to the engine.
fn dispatch_event(engine: &mut HttpEngine, transport: &mut TokioTransport, event: HostEvent) {
    match event {
        HostEvent::Accepted(stream, peer) => {
            let conn = transport.attach(stream, peer);
            if let Err(e) = engine.on_accept(transport, conn) {
                tracing::warn!(connection_id = %conn, peer_addr = %peer, error = %e, "Connection refused");
                transport.discard(conn);
            }
        }
        HostEvent::Transport(raw) => match transport.filter(raw) {
            Some(TransportEvent::Received(conn, received)) => engine.on_receive(transport, conn, received),
            Some(TransportEvent::Sent(conn, len)) => engine.on_sent(transport, conn, len),
            Some(TransportEvent::Failed(conn, error)) => engine.on_error(conn, &error),
            None => {}
        },
    }
}

/// Sleep until `deadline`, or forever when there is none.
async fn sleep_until(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}
