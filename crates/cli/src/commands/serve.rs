//! Serve command handler.

use clap::Args;
use firegpt_core::{config::AppConfig, AppResult};
use std::sync::Arc;

use crate::server;
use crate::state::AppState;

/// Run the HTTP server
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// Address to bind (overrides server.host)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (overrides server.port)
    #[arg(short, long)]
    pub port: Option<u16>,
}

impl ServeCommand {
    pub async fn execute(&self, config: AppConfig) -> AppResult<()> {
        tracing::info!("Executing serve command");

        let host = self.host.clone().unwrap_or_else(|| config.server.host.clone());
        let port = self.port.unwrap_or(config.server.port);

        let state = Arc::new(AppState::initialize(&config).await?);
        server::run(state, &host, port).await
    }
}
