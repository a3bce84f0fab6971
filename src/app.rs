//! Application context
//!
//! Owns the transport, store and answer-client handles for the lifetime of
//! the process, wires them into the dispatcher, and tears them down in
//! order on shutdown.

use crate::answer::{AnswerError, AnswerService, HttpAnswerService, LoggingAnswerService};
use crate::api::{create_router, AppState};
use crate::channel::{ChatTransport, RecentMessageIds, TransportError, WhatsAppCloudTransport};
use crate::config::GatewayConfig;
use crate::db::{DbError, SessionStore};
use crate::runtime::{Dispatcher, ProductionDispatcher, SenderQueues};
use axum::Router;
use std::sync::Arc;
use thiserror::Error;

const RECENT_MESSAGE_IDS: usize = 4096;

#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Store(#[from] DbError),
    #[error(transparent)]
    Answer(#[from] AnswerError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub struct AppContext {
    config: GatewayConfig,
    store: SessionStore,
    queues: SenderQueues,
    recent: Arc<RecentMessageIds>,
}

impl AppContext {
    /// Open the store and build every collaborator
    pub async fn start(config: GatewayConfig) -> Result<Self, StartupError> {
        let store = SessionStore::connect(
            &config.database.connection_url(),
            config.database.max_connections,
        )
        .await?
        .with_duration(config.session.duration);
        store.ensure_schema().await?;

        let answers: Arc<dyn AnswerService> = Arc::new(LoggingAnswerService::new(Arc::new(
            HttpAnswerService::new(&config.answer_endpoint, config.answer_timeout)?,
        )));
        let transport: Arc<dyn ChatTransport> =
            Arc::new(WhatsAppCloudTransport::new(&config.whatsapp)?);

        tracing::info!(
            transport = transport.name(),
            answer_endpoint = %answers.endpoint(),
            "Collaborators initialized"
        );

        let dispatcher: ProductionDispatcher =
            Dispatcher::new(config.session.clone(), store.clone(), answers, transport)
                .with_failure_policy(config.failure_policy.clone());
        let queues = SenderQueues::new(Arc::new(dispatcher));

        tracing::info!(
            app = %config.app_name,
            client_id = %config.client_id,
            "{} with client {} is ready!",
            config.app_name,
            config.client_id
        );

        Ok(Self {
            config,
            store,
            queues,
            recent: Arc::new(RecentMessageIds::new(RECENT_MESSAGE_IDS)),
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn router(&self) -> Router {
        create_router(AppState {
            queues: self.queues.clone(),
            recent: self.recent.clone(),
            verify_token: self.config.whatsapp.verify_token.clone(),
            app_secret: self.config.whatsapp.app_secret.clone(),
            app_name: self.config.app_name.clone(),
            client_id: self.config.client_id.clone(),
        })
    }

    /// Drain queued messages, then release the pool
    pub async fn shutdown(self) {
        self.queues.shutdown().await;
        self.store.close().await;
        tracing::info!(app = %self.config.app_name, "Shutdown complete");
    }
}

/// Resolves on SIGINT or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT - shutting down"),
        () = terminate => tracing::info!("Received SIGTERM - shutting down"),
    }
}
