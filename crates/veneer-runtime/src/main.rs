use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use veneer_runtime::analytics::TracingAnalyticsSink;
use veneer_runtime::catalog::{CachingCatalogStore, Catalog, InMemoryCatalogStore};
use veneer_runtime::config::Config;
use veneer_runtime::dedup::ReplayCache;
use veneer_runtime::dispatcher::RequestDispatcher;
use veneer_runtime::notify::{InMemorySubscriptionStore, NotificationDispatcher, RetryPolicy, Subscription};
use veneer_runtime::server::MockServer;
use veneer_runtime::validate::SchemaValidator;

#[derive(Parser, Debug)]
#[command(name = "veneer-runtime", about = "Serve live traffic against a mock endpoint catalog")]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,
    /// Runtime configuration file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Catalog seed file (YAML or JSON list of catalogs)
    #[arg(long)]
    catalog: PathBuf,
    /// Webhook subscription seed file (YAML or JSON list)
    #[arg(long)]
    subscriptions: Option<PathBuf>,
}

#[derive(serde::Deserialize)]
struct CatalogSeed {
    #[serde(default)]
    catalogs: Vec<Catalog>,
    #[serde(default)]
    subscriptions: Vec<Subscription>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(port) = args.port {
        config.listen.port = port;
    }

    let seed = load_seed(&args.catalog)
        .with_context(|| format!("failed to load catalog from {}", args.catalog.display()))?;
    tracing::info!(catalogs = seed.catalogs.len(), "catalog seed loaded");

    let mut subscriptions = seed.subscriptions;
    if let Some(path) = &args.subscriptions {
        let extra: Vec<Subscription> = parse_seed_file(path)
            .with_context(|| format!("failed to load subscriptions from {}", path.display()))?;
        subscriptions.extend(extra);
    }

    let backing_store = Arc::new(InMemoryCatalogStore::new(seed.catalogs));
    let catalog_store = Arc::new(CachingCatalogStore::new(
        backing_store,
        config.catalog_cache_ttl(),
    ));
    let notifier = Arc::new(NotificationDispatcher::new(
        Arc::new(InMemorySubscriptionStore::new(subscriptions)),
        RetryPolicy {
            max_attempts: config.webhook_retry_attempts,
            base_delay: config.webhook_retry_delay(),
        },
    ));

    let dispatcher = Arc::new(RequestDispatcher::new(
        catalog_store,
        Arc::new(SchemaValidator),
        Arc::new(ReplayCache::new(config.dedup_ttl())),
        notifier,
        Arc::new(TracingAnalyticsSink),
    ));

    MockServer::new(config, dispatcher).run().await
}

fn load_seed(path: &PathBuf) -> anyhow::Result<CatalogSeed> {
    let contents = std::fs::read_to_string(path)?;
    // A bare list of catalogs is accepted alongside the full seed shape.
    if let Ok(catalogs) = serde_yaml::from_str::<Vec<Catalog>>(&contents) {
        return Ok(CatalogSeed {
            catalogs,
            subscriptions: vec![],
        });
    }
    Ok(serde_yaml::from_str(&contents)?)
}

fn parse_seed_file<T: serde::de::DeserializeOwned>(path: &PathBuf) -> anyhow::Result<T> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&contents)?)
}
