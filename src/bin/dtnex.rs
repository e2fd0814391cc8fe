//! `dtnex` -- the gossip agent's process entry point.
//!
//! Wires `Config` parsing, `env_logger` initialization, and SIGINT/SIGTERM/
//! SIGTSTP handling onto the [`Supervisor`]. The concrete
//! `RouterAdapter`/`TransportAdapter` backends (an ION-DTN binding and a
//! Bundle Protocol v7 endpoint) are external collaborators out of scope for
//! this core; this binary documents the extension point via
//! [`UnconfiguredRouterFactory`]/[`UnconfiguredTransportFactory`], which
//! exit with a clear error rather than silently no-op.

use std::process::ExitCode;

use clap::Parser;
use dtnex::config::{Args, Config};
use dtnex::error::DtnexError;
use dtnex::router::{Plan, RouterAdapter, RouterError};
use dtnex::supervisor::{RouterFactory, Supervisor, TransportFactory};
use dtnex::transport::{Received, TransportAdapter, TransportError};
use dtnex::{Endpoint, NodeId};
use log::error;
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser, Debug)]
#[command(name = "dtnex", about = "Authenticated epidemic gossip agent for DTN topology")]
struct Cli {
    #[command(flatten)]
    config: Args,
}

/// A placeholder [`RouterFactory`] standing in for a real ION-DTN binding.
/// Exists so the binary builds and the supervisor/signal-handling wiring
/// is exercised end-to-end; a deployment supplies its own factory bound to
/// the local router instead.
struct UnconfiguredRouterFactory;

impl RouterFactory for UnconfiguredRouterFactory {
    type Router = UnconfiguredRouter;

    fn connect(&self) -> Result<Self::Router, RouterError> {
        Err(RouterError::Gone(
            "no RouterAdapter backend configured; this build ships only the protocol core \
             -- wire in an ION-DTN binding before running in production"
                .into(),
        ))
    }

    fn router_process_exists(&self) -> bool {
        false
    }
}

struct UnconfiguredRouter;

impl RouterAdapter for UnconfiguredRouter {
    fn local_node_id(&self) -> Result<NodeId, RouterError> {
        Err(RouterError::Gone("unconfigured router".into()))
    }
    fn neighbors(&self) -> Result<Vec<Plan>, RouterError> {
        Err(RouterError::Gone("unconfigured router".into()))
    }
    fn insert_contact(
        &self,
        _region: u32,
        _from_time: u64,
        _to_time: u64,
        _src: NodeId,
        _dst: NodeId,
        _xmit_rate: u64,
        _confidence: f32,
    ) -> Result<dtnex::router::InsertOutcome, RouterError> {
        Err(RouterError::Gone("unconfigured router".into()))
    }
    fn insert_range(
        &self,
        _from_time: u64,
        _to_time: u64,
        _src: NodeId,
        _dst: NodeId,
        _one_way_light_time_s: u32,
    ) -> Result<dtnex::router::InsertOutcome, RouterError> {
        Err(RouterError::Gone("unconfigured router".into()))
    }
    fn is_available(&self) -> bool {
        false
    }
}

struct UnconfiguredTransportFactory;

impl TransportFactory for UnconfiguredTransportFactory {
    type Transport = UnconfiguredTransport;

    fn bind(&self) -> Result<Self::Transport, TransportError> {
        Err(TransportError(
            "no TransportAdapter backend configured; wire in a Bundle Protocol v7 endpoint".into(),
        ))
    }
}

struct UnconfiguredTransport;

impl TransportAdapter for UnconfiguredTransport {
    fn send(&self, _destination: Endpoint, _bytes: &[u8], _ttl_seconds: u64) -> Result<(), TransportError> {
        Err(TransportError("unconfigured transport".into()))
    }
    fn recv_blocking(&self) -> Result<Received, TransportError> {
        Err(TransportError("unconfigured transport".into()))
    }
    fn close(&self) {}
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();
    let config = cli.config.apply(Config::default());
    if let Err(e) = config.validate() {
        error!("{e}");
        return ExitCode::FAILURE;
    }

    let supervisor = Supervisor::new(config, UnconfiguredRouterFactory, UnconfiguredTransportFactory);
    let shutdown = supervisor.shutdown_handle();

    // SIGINT, SIGTERM, and SIGTSTP all initiate graceful shutdown (spec
    // §6). SIGTSTP is co-opted rather than left to suspend the process,
    // since the router cannot safely tolerate a suspended client holding
    // resources.
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let mut sigint = match signal(SignalKind::interrupt()) {
            Ok(s) => s,
            Err(e) => return error!("failed to install SIGINT handler: {e}"),
        };
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => return error!("failed to install SIGTERM handler: {e}"),
        };
        let mut sigtstp = match signal(SignalKind::from_raw(libc::SIGTSTP)) {
            Ok(s) => s,
            Err(e) => return error!("failed to install SIGTSTP handler: {e}"),
        };
        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
            _ = sigtstp.recv() => {}
        }
        let _ = signal_shutdown.send(true);
    });

    match supervisor.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(DtnexError::ConfigInvalid(msg)) => {
            error!("invalid configuration: {msg}");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("supervisor exited with error: {e}");
            ExitCode::FAILURE
        }
    }
}
