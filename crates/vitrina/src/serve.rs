// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `vitrina serve` wiring.
//!
//! Startup order: tracing, vault key, database (with migrations), broker
//! queues, event bus, services, background consumers, then the HTTP gateway
//! in the foreground. Ctrl-C / SIGTERM cancels a shared token; background
//! tasks drain and the gateway stops accepting connections.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vitrina_auth::{AuthService, TokenAuthority};
use vitrina_broker::{Broker, PAY_REQUESTS, PAY_RESPONSES};
use vitrina_bus::EventBus;
use vitrina_config::{ConfigIssue, VitrinaConfig};
use vitrina_conversations::ConversationService;
use vitrina_core::VitrinaError;
use vitrina_gateway::AppState;
use vitrina_integrations::{ConfigCache, IntegrationService, ProberRegistry};
use vitrina_payments::{PaymentOrchestrator, ResponseConsumer, RetryScheduler};
use vitrina_storage::Database;
use vitrina_vault::CredentialVault;
use vitrina_wallet::WalletService;
use vitrina_whatsapp::{WhatsAppClient, WhatsAppProber};

/// Development fallbacks used when `RELAX_ENV=1` left required keys unset.
mod dev {
    pub const JWT_SECRET: &str = "dev-secret-do-not-deploy";
    pub const ENCRYPTION_KEY: &str =
        "0000000000000000000000000000000000000000000000000000000000000000";
    pub const DATABASE_PATH: &str = "vitrina.db";
    pub const WHATSAPP_URL: &str = "https://graph.facebook.com/v19.0";
    pub const HTTP_PORT: u16 = 8080;
}

fn relaxed_or<T>(value: Option<T>, fallback: T, env_key: &str) -> T {
    match value {
        Some(v) => v,
        None => {
            warn!(env_key, "using development fallback");
            fallback
        }
    }
}

/// Run the backend until a shutdown signal arrives.
pub async fn run_serve(
    config: VitrinaConfig,
    relaxed: Vec<ConfigIssue>,
) -> Result<(), VitrinaError> {
    init_tracing(&config.service.log_level);
    for issue in &relaxed {
        warn!(%issue, "missing required configuration (relaxed)");
    }
    info!(version = env!("CARGO_PKG_VERSION"), "starting vitrina serve");

    let vault = CredentialVault::from_hex(&relaxed_or(
        config.vault.encryption_key,
        dev::ENCRYPTION_KEY.to_string(),
        "ENCRYPTION_KEY",
    ))?;

    let db_path = relaxed_or(
        config.database.path,
        dev::DATABASE_PATH.to_string(),
        "DATABASE_PATH",
    );
    let db = Database::open(&db_path).await?;
    info!(path = %db_path, "database open, migrations applied");

    // The broker persists queues in its own file when configured, sharing
    // the main database otherwise.
    let broker_db = match &config.broker.database_path {
        Some(path) if *path != db_path => Database::open(path).await?,
        _ => db.clone(),
    };
    let broker = Broker::new(broker_db);
    broker.declare_queue(PAY_REQUESTS)?;
    broker.declare_queue(PAY_RESPONSES)?;

    let bus = EventBus::new(config.bus.capacity);

    let authority = TokenAuthority::new(&relaxed_or(
        config.auth.jwt_secret,
        dev::JWT_SECRET.to_string(),
        "JWT_SECRET",
    ))?
    .with_session_ttl_hours(config.auth.session_ttl_hours);
    let auth = AuthService::new(db.clone(), authority);

    let whatsapp = WhatsAppClient::new(
        &relaxed_or(
            config.whatsapp.url,
            dev::WHATSAPP_URL.to_string(),
            "WHATSAPP_URL",
        ),
        &relaxed_or(config.whatsapp.token, String::new(), "WHATSAPP_TOKEN"),
        &relaxed_or(
            config.whatsapp.phone_number_id,
            String::new(),
            "WHATSAPP_PHONE_NUMBER_ID",
        ),
    )?;

    let probers = ProberRegistry::new().register("whatsapp", Arc::new(WhatsAppProber));
    let integrations = IntegrationService::new(
        db.clone(),
        vault,
        ConfigCache::new(vitrina_integrations::cache::DEFAULT_TTL),
        probers,
    );

    let payments = PaymentOrchestrator::new(db.clone(), broker.clone(), bus.clone());
    let wallet = WalletService::new(db.clone());
    let conversations = ConversationService::new(db.clone(), bus.clone(), Arc::new(whatsapp));

    let cancel = CancellationToken::new();
    install_signal_handler(cancel.clone());

    let consumer_handle = broker.spawn_consumer(
        PAY_RESPONSES,
        Arc::new(ResponseConsumer::new(payments.clone())),
        cancel.clone(),
    )?;
    let sweep_handle = broker.spawn_reclaim_sweep(cancel.clone());
    let scheduler_handle = RetryScheduler::new(payments.clone()).spawn(cancel.clone());

    let state = AppState {
        auth,
        payments,
        wallet,
        integrations,
        conversations,
        bus,
        whatsapp_app_secret: config.whatsapp.app_secret,
        cookie_max_age_days: config.auth.cookie_max_age_days,
    };

    let port = relaxed_or(config.http.port, dev::HTTP_PORT, "HTTP_PORT");
    vitrina_gateway::serve(state, &config.http.host, port, cancel.clone()).await?;

    // The gateway returned: either a signal fired or serving failed. Either
    // way, stop the background tasks before closing the database.
    cancel.cancel();
    let _ = consumer_handle.await;
    let _ = sweep_handle.await;
    let _ = scheduler_handle.await;
    db.close().await?;

    info!("vitrina serve shutdown complete");
    Ok(())
}

fn install_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm = match tokio::signal::unix::signal(
                tokio::signal::unix::SignalKind::terminate(),
            ) {
                Ok(s) => s,
                Err(e) => {
                    warn!(error = %e, "SIGTERM handler unavailable");
                    let _ = ctrl_c.await;
                    cancel.cancel();
                    return;
                }
            };
            tokio::select! {
                _ = ctrl_c => info!("received ctrl-c"),
                _ = sigterm.recv() => info!("received SIGTERM"),
            }
        }
        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received ctrl-c");
        }
        cancel.cancel();
    });
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("vitrina={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
