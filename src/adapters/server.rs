//! Process lifecycle: `Starting → Serving → Draining → Stopped`.
//!
//! On the first termination signal the listener stops accepting, in-flight handlers get
//! a bounded grace period, then the backend client is closed. Draining does not wait for
//! the admission controller to empty; anything still running when the grace period ends
//! is abandoned and cancelled with the runtime.
use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::Router;
use eyre::{Result, WrapErr};
use tokio::{net::TcpListener, sync::watch, task::JoinError};

use crate::{
    adapters::HttpHandler,
    ports::backend_client::BackendClient,
    utils::GracefulShutdown,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Starting,
    Serving,
    Draining,
    Stopped,
}

/// Bound listener plus everything needed to serve and tear down.
pub struct GatewayServer {
    listener: TcpListener,
    router: Router,
    backend: Arc<dyn BackendClient>,
    shutdown: Arc<GracefulShutdown>,
    grace: Duration,
    state: watch::Sender<LifecycleState>,
}

impl GatewayServer {
    /// Bind `addr`. The server is in `Starting` until [`GatewayServer::run`] is called.
    pub async fn bind(
        addr: SocketAddr,
        handler: &HttpHandler,
        backend: Arc<dyn BackendClient>,
        shutdown: Arc<GracefulShutdown>,
        grace: Duration,
    ) -> Result<Self> {
        let (state, _) = watch::channel(LifecycleState::Starting);
        let listener = TcpListener::bind(addr)
            .await
            .wrap_err_with(|| format!("Failed to bind to {addr}"))?;

        Ok(Self {
            listener,
            router: handler.router(),
            backend,
            shutdown,
            grace,
            state,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .wrap_err("Failed to read local address")
    }

    /// Observe lifecycle transitions.
    pub fn state(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Serve until shutdown is triggered, drain, then close the backend client.
    pub async fn run(self) -> Result<()> {
        let Self {
            listener,
            router,
            backend,
            shutdown,
            grace,
            state,
        } = self;

        let local_addr = listener
            .local_addr()
            .wrap_err("Failed to read local address")?;
        let mut stop_accepting = shutdown.shutdown_token();
        let mut drain_started = shutdown.shutdown_token();

        let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(
            async move {
                stop_accepting.wait_for_shutdown().await;
            },
        );
        let mut serve_task = tokio::spawn(server.into_future());

        state.send_replace(LifecycleState::Serving);
        tracing::info!("fetchgate listening on {}", local_addr);

        let outcome = tokio::select! {
            joined = &mut serve_task => {
                tracing::warn!("Server stopped without a shutdown signal");
                server_result(joined)
            }
            reason = drain_started.wait_for_shutdown() => {
                state.send_replace(LifecycleState::Draining);
                tracing::info!(
                    "Shutdown requested ({:?}); draining in-flight requests for up to {:?}",
                    reason,
                    grace
                );
                match tokio::time::timeout(grace, &mut serve_task).await {
                    Ok(joined) => server_result(joined),
                    Err(_) => {
                        tracing::warn!(
                            "Grace period of {:?} elapsed; abandoning outstanding requests",
                            grace
                        );
                        serve_task.abort();
                        Ok(())
                    }
                }
            }
        };

        backend.close().await;
        state.send_replace(LifecycleState::Stopped);
        tracing::info!("fetchgate stopped");
        outcome
    }
}

fn server_result(joined: Result<std::io::Result<()>, JoinError>) -> Result<()> {
    joined
        .wrap_err("Server task failed")?
        .wrap_err("Server error")
}
