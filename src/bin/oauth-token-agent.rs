use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use oauth_token_agent::cache::credential_registry::CredentialRegistry;
use oauth_token_agent::cache::token_cache::TokenCache;
use oauth_token_agent::observability::metrics::Metrics;
use oauth_token_agent::resilience::retry::RetrySettings;
use oauth_token_agent::server;
use oauth_token_agent::sources::oauth2::OAuth2CodeExchange;
use oauth_token_agent::utils::config_loader;
use oauth_token_agent::utils::logging;
use oauth_token_agent::utils::logging::LogLevel;
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "token-agent.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL" , value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // -------------------------------
    // 1. Load YAML config, init logging
    // -------------------------------

    let service_config = config_loader::run(&args.config)?;
    logging::run(&service_config, args.log_level.to_owned());

    // -------------------------------
    // 2. Build the cache: metrics, registry, exchange collaborator
    // -------------------------------

    let metrics = Metrics::new()?;
    let retry = RetrySettings::from(service_config.settings.retry.as_ref());
    let exchange = OAuth2CodeExchange::new(&service_config.settings.exchange, retry)?;
    let registry = Arc::new(CredentialRegistry::new());
    let cache = Arc::new(TokenCache::new(registry, exchange, metrics));

    // -------------------------------
    // 3. Register configured identities, in file order
    // -------------------------------

    for identity in &service_config.identities {
        cache
            .register(&identity.key, &identity.secret, identity.name.as_deref())
            .await;
    }
    match cache.get_first_registered_key().await {
        Some(key) => info!("default identity '{}'", key),
        None => warn!("no identities configured, register them over HTTP"),
    }

    // -------------------------------
    // 4. Serve until Ctrl-C
    // -------------------------------

    info!("Service starting...");
    server::server::start(&service_config.settings, cache, async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for shutdown signal: {}", err);
        }
        info!("shutdown signal received");
    })
    .await
}
