//! HTTP server for Slack interactions
//!
//! Slack posts report selections and slash commands here. Every reply is
//! immediate; report files follow later through the interaction's
//! `response_url`.

use anyhow::Result;
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::ingress::RequestHandler;
use crate::reports::ReportOption;
use crate::server::slack;

pub struct Server {
    state: Arc<AppState>,
}

pub struct AppState {
    pub config: Config,
    pub handler: RequestHandler,
}

impl Server {
    pub fn new(config: &Config, handler: RequestHandler) -> Self {
        Self {
            state: Arc::new(AppState {
                config: config.clone(),
                handler,
            }),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_check))
            .route("/reports", get(list_reports))
            .route("/slack/actions", post(slack::actions_handler))
            .route("/slack/commands", post(slack::command_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    pub async fn run(&self) -> Result<()> {
        let server = &self.state.config.server;
        let addr: SocketAddr = format!("{}:{}", server.bind, server.port).parse()?;

        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        info!("Starting HTTP server on http://{}", listener.local_addr()?);
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

async fn list_reports(State(state): State<Arc<AppState>>) -> Json<Vec<ReportOption>> {
    Json(state.handler.registry().list_available())
}
