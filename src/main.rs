//! `credgate` binary: loads configuration from the environment and serves the gateway.

// std
use std::{net::SocketAddr, sync::Arc};
// crates.io
use color_eyre::Result;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
// self
use credgate::{
	config::GatewayConfig,
	server::{self, AppState},
	store::{MemoryUserStore, ValkeyCounterStore},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	dotenv::dotenv().ok();
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,hyper=warn".into()),
		)
		.init();

	let config = GatewayConfig::from_env()?;
	let counters = ValkeyCounterStore::open(&config.counter_store_url)?
		.with_hit_timeout(config.counter_store_timeout);
	let state =
		AppState::from_config(&config, Arc::new(counters), Arc::new(MemoryUserStore::default()))?;
	let app = server::router(state).layer(TraceLayer::new_for_http());
	let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;

	tracing::info!(addr = %config.listen_addr, "credgate listening");

	axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
		.with_graceful_shutdown(async {
			tokio::signal::ctrl_c().await.ok();
		})
		.await?;

	Ok(())
}
