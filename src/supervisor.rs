//! Connect/retry/shutdown state machine around the protocol engine.
//!
//! A prior design recovers from a vanished router by re-executing itself
//! with its original arguments. This reimplementation instead rebuilds the
//! [`Engine`] value in place: every router-derived handle lives inside that
//! value, so dropping it and constructing a fresh one via the factories
//! below is behaviorally equivalent, without the re-exec.

use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::sync::watch;

use crate::config::Config;
use crate::engine::Engine;
use crate::error::DtnexError;
use crate::router::{RouterAdapter, RouterError};
use crate::transport::{TransportAdapter, TransportError};

/// Retry cadence while the router's own process is known to exist but is
/// not yet answering.
pub const RETRY_INTERVAL_PROCESS_PRESENT: Duration = Duration::from_secs(10);

/// Retry cadence once the router's process itself appears to be gone.
pub const RETRY_INTERVAL_PROCESS_ABSENT: Duration = Duration::from_secs(300);

/// The supervisor's lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// no connection to the router
    Disconnected,
    /// a connection attempt is in flight
    Connecting,
    /// engine is constructed and its tasks are running
    Connected,
    /// draining down for exit; no further reconnects will be attempted
    ShuttingDown,
}

/// Constructs a fresh [`RouterAdapter`] on each (re)connect attempt, and
/// reports whether the router's own process appears to still exist. This
/// liveness signal is entirely adapter-specific.
pub trait RouterFactory: Send + Sync {
    /// concrete adapter type this factory produces
    type Router: RouterAdapter;

    /// Attempt to connect to the router.
    fn connect(&self) -> Result<Self::Router, RouterError>;

    /// Cheap, adapter-specific check of whether the router's process
    /// itself is present (used only to pick the retry cadence).
    fn router_process_exists(&self) -> bool {
        true
    }
}

/// Constructs a fresh [`TransportAdapter`] on each (re)connect attempt.
pub trait TransportFactory: Send + Sync {
    /// concrete adapter type this factory produces
    type Transport: TransportAdapter;

    /// Bind a fresh transport endpoint.
    fn bind(&self) -> Result<Self::Transport, TransportError>;
}

/// Owns the engine's lifecycle: connect, run, detect loss, reconnect,
/// shut down.
pub struct Supervisor<RF, TF>
where
    RF: RouterFactory,
    TF: TransportFactory,
{
    config: Config,
    router_factory: RF,
    transport_factory: TF,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<RF, TF> Supervisor<RF, TF>
where
    RF: RouterFactory,
    TF: TransportFactory,
    RF::Router: 'static,
    TF::Transport: 'static,
{
    /// Construct a supervisor. Call [`Supervisor::run`] to start it.
    pub fn new(config: Config, router_factory: RF, transport_factory: TF) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Supervisor {
            config,
            router_factory,
            transport_factory,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// A handle that can be used to request shutdown from outside the
    /// supervisor loop (e.g. a signal handler for SIGINT, SIGTERM, or
    /// SIGTSTP, all of which initiate graceful shutdown).
    pub fn shutdown_handle(&self) -> watch::Sender<bool> {
        self.shutdown_tx.clone()
    }

    /// Run the connect/retry/shutdown loop until a shutdown is requested.
    /// Returns `Err` only for `ConfigInvalid`, which is fatal at startup.
    pub async fn run(mut self) -> Result<(), DtnexError> {
        self.config.validate()?;

        let mut state = SupervisorState::Disconnected;
        loop {
            match state {
                SupervisorState::Disconnected => {
                    if *self.shutdown_rx.borrow() {
                        state = SupervisorState::ShuttingDown;
                        continue;
                    }
                    state = SupervisorState::Connecting;
                }
                SupervisorState::Connecting => {
                    match self.try_connect() {
                        Ok(engine) => {
                            info!("connected to router as node {}", engine.local_id());
                            state = SupervisorState::Connected;
                            match self.run_connected(engine).await {
                                Ok(()) => {
                                    // shutdown was requested while connected
                                    state = SupervisorState::ShuttingDown;
                                }
                                Err(DtnexError::RouterGone(msg)) => {
                                    warn!("router vanished, restarting engine: {msg}");
                                    state = SupervisorState::Disconnected;
                                }
                                Err(other) => return Err(other),
                            }
                        }
                        Err(e) => {
                            warn!("failed to connect to router: {e}");
                            let delay = if self.router_factory.router_process_exists() {
                                RETRY_INTERVAL_PROCESS_PRESENT
                            } else {
                                RETRY_INTERVAL_PROCESS_ABSENT
                            };
                            tokio::select! {
                                _ = tokio::time::sleep(delay) => {}
                                _ = self.shutdown_rx.changed() => {}
                            }
                            state = if *self.shutdown_rx.borrow() {
                                SupervisorState::ShuttingDown
                            } else {
                                SupervisorState::Disconnected
                            };
                        }
                    }
                }
                SupervisorState::Connected => {
                    // unreachable: Connecting drives Connected synchronously via run_connected
                    unreachable!("Connected is only entered from within Connecting")
                }
                SupervisorState::ShuttingDown => {
                    info!("supervisor shutting down");
                    return Ok(());
                }
            }
        }
    }

    fn try_connect(&self) -> Result<Arc<Engine<RF::Router, TF::Transport>>, DtnexError> {
        let router = self
            .router_factory
            .connect()
            .map_err(|e| DtnexError::RouterGone(e.to_string()))?;
        let transport = self
            .transport_factory
            .bind()
            .map_err(|e| DtnexError::RouterGone(e.to_string()))?;
        let engine = Engine::new(self.config.clone(), router, transport)?;
        Ok(Arc::new(engine))
    }

    /// Spawn the timer and inbound tasks and wait for either to report
    /// `RouterGone`, or for shutdown to be requested.
    async fn run_connected(&mut self, engine: Arc<Engine<RF::Router, TF::Transport>>) -> Result<(), DtnexError> {
        let timer_engine = Arc::clone(&engine);
        let timer_shutdown = self.shutdown_rx.clone();
        let timer_handle = tokio::spawn(async move { timer_engine.run_timer_loop(timer_shutdown).await });

        let inbound_engine = Arc::clone(&engine);
        let inbound_shutdown = self.shutdown_rx.clone();
        let inbound_handle = tokio::spawn(async move { inbound_engine.run_inbound_loop(inbound_shutdown).await });

        let result = tokio::select! {
            _ = self.shutdown_rx.changed() => {
                engine.shutdown();
                Ok(())
            }
            res = timer_handle => {
                engine.shutdown();
                res.unwrap_or_else(|e| Err(DtnexError::RouterGone(format!("timer task panicked: {e}"))))
            }
            res = inbound_handle => {
                engine.shutdown();
                res.unwrap_or_else(|e| Err(DtnexError::RouterGone(format!("inbound task panicked: {e}"))))
            }
        };

        if *self.shutdown_rx.borrow() {
            error_if_err(&result);
            return Ok(());
        }
        result
    }
}

fn error_if_err(result: &Result<(), DtnexError>) {
    if let Err(e) = result {
        error!("engine task ended with error during shutdown: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::mock::MockRouter;
    use crate::router::Plan;
    use crate::transport::fake::InMemoryNetwork;
    use crate::Endpoint;
    use std::sync::Mutex;

    struct StaticRouterFactory {
        local_id: u64,
        neighbors: Vec<Plan>,
        gone: Mutex<bool>,
    }

    impl RouterFactory for StaticRouterFactory {
        type Router = MockRouter;

        fn connect(&self) -> Result<MockRouter, RouterError> {
            if *self.gone.lock().unwrap() {
                return Err(RouterError::Gone("simulated outage".into()));
            }
            Ok(MockRouter::new(self.local_id, self.neighbors.clone()))
        }

        fn router_process_exists(&self) -> bool {
            !*self.gone.lock().unwrap()
        }
    }

    struct NetworkTransportFactory {
        node: u64,
        net: InMemoryNetwork,
    }

    impl TransportFactory for NetworkTransportFactory {
        type Transport = crate::transport::fake::FakeTransport;

        fn bind(&self) -> Result<Self::Transport, TransportError> {
            Ok(self.net.register(Endpoint::dtnex(self.node)))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_before_any_connect_returns_promptly() {
        let net = InMemoryNetwork::new();
        let router_factory = StaticRouterFactory {
            local_id: 1,
            neighbors: vec![],
            gone: Mutex::new(false),
        };
        let transport_factory = NetworkTransportFactory { node: 1, net };
        let supervisor = Supervisor::new(Config::default(), router_factory, transport_factory);
        let shutdown = supervisor.shutdown_handle();
        shutdown.send(true).unwrap();

        let result = supervisor.run().await;
        assert!(result.is_ok());
    }

    #[test]
    fn fatal_config_invalid_is_checked_before_any_connect_attempt() {
        let mut config = Config::default();
        config.shared_key.clear();
        assert!(config.validate().is_err());
    }
}
