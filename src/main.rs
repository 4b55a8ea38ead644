use std::sync::Arc;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use secrecy::ExposeSecret;
use tokio::signal;
use tracing::{info, warn};

use supplychain_gateway::api::{RateLimitConfig, create_router, create_router_with_rate_limit};
use supplychain_gateway::app::{AppState, ServiceSettings};
use supplychain_gateway::config::AppConfig;
use supplychain_gateway::domain::{EmailNotifier, ProductRegistry, TransactionSigner};
use supplychain_gateway::infra::observability::{init_metrics_handle, init_tracing};
use supplychain_gateway::infra::{
    DisabledNotifier, EmailJsConfig, EmailJsNotifier, InMemoryRegistry, LocalSigner,
    PostgresRegistry, RpcClient, RpcClientConfig, SupplyChainClient, signing_key_from_base58,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let mut config = AppConfig::from_env().context("invalid configuration")?;
    init_tracing(config.log_json);
    let metrics_handle = init_metrics_handle();

    let rpc = RpcClient::new(
        &config.rpc_url,
        RpcClientConfig {
            commitment: config.commitment.clone(),
            ..RpcClientConfig::default()
        },
    )?;

    let signer: Option<Arc<dyn TransactionSigner>> = match &config.wallet_private_key {
        Some(secret) => {
            let key = signing_key_from_base58(secret)
                .context("WALLET_PRIVATE_KEY is not a valid base58 keypair")?;
            let signer: Arc<dyn TransactionSigner> = Arc::new(LocalSigner::from_signing_key(&key));
            info!(wallet = %signer.public_key(), "Wallet connected");
            Some(signer)
        }
        None => {
            warn!("WALLET_PRIVATE_KEY not set, running read-only");
            None
        }
    };

    let program = Arc::new(SupplyChainClient::new(
        rpc,
        config.program_id,
        signer,
        config.admin_address,
    ));

    let registry: Arc<dyn ProductRegistry> = match &config.database_url {
        Some(url) => {
            let registry = PostgresRegistry::with_defaults(url.expose_secret()).await?;
            registry.run_migrations().await?;
            Arc::new(registry)
        }
        None => {
            info!("DATABASE_URL not set, using in-memory registry");
            Arc::new(InMemoryRegistry::new())
        }
    };

    let notifier: Arc<dyn EmailNotifier> = if config.email_configured() {
        Arc::new(EmailJsNotifier::new(EmailJsConfig {
            public_key: config.emailjs_public_key.take(),
            service_id: config.emailjs_service_id.take(),
            template_id: config.emailjs_template_id.take(),
            ..EmailJsConfig::default()
        })?)
    } else {
        info!("EmailJS not configured, registration emails are skipped");
        Arc::new(DisabledNotifier)
    };

    if config.api_auth_key.is_none() {
        warn!("API_AUTH_KEY not set, generated key printed to stderr");
    }
    let api_auth_key = config.take_api_auth_key(&mut std::io::stderr());

    let settings = ServiceSettings {
        public_base_url: config.public_base_url.clone(),
        rpc_url: config.rpc_url.clone(),
    };
    let app_state = Arc::new(
        AppState::new(program, registry, notifier, settings, api_auth_key)
            .with_metrics(metrics_handle),
    );

    let router = if config.enable_rate_limiting {
        let rate_limit = RateLimitConfig::from_env();
        info!(
            rps = rate_limit.general_rps,
            burst = rate_limit.general_burst,
            "Rate limiting enabled"
        );
        create_router_with_rate_limit(app_state, rate_limit)
    } else {
        create_router(app_state)
    };

    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, program_id = %config.program_id, "Server starting");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => warn!(error = %e, "Failed to listen for SIGTERM"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
