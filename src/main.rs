use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use cloudinv::config::Config;
use cloudinv::gcp::client::GcpClient;
use cloudinv::gcp::http::format_api_error;
use cloudinv::inventory::{
    CacheEntry, CacheStore, DataSource, FailurePolicy, FilterSpec, InventoryDispatcher,
    InventoryError, RegionAggregator, RegionSpec, ResourceQuery, TableData,
};
use cloudinv::render::{Renderer, TableRenderer};
use cloudinv::resource::{ClientSet, GcpResourceClient, SchemaRegistry, StaticCatalog};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Cloud resource inventory with a local cache
#[derive(Parser, Debug)]
#[command(name = "cloudinv", version = cloudinv::VERSION, about, long_about = None)]
struct Args {
    /// Project to query
    #[arg(short, long, global = true)]
    project: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List buckets, instances and databases
    Ls(LsArgs),
    /// Inspect the local cache
    #[command(subcommand)]
    Cache(CacheCommand),
    /// Show the services that can be listed
    Services,
}

#[derive(ClapArgs, Debug)]
struct LsArgs {
    /// Cloud provider
    #[arg(long, default_value = "gcp")]
    provider: String,

    /// Services to list (default: all of the provider's services)
    #[arg(short, long)]
    service: Vec<String>,

    /// Region ID, or "all" for every region
    #[arg(short, long, default_value = "all")]
    region: String,

    /// Refresh the cache instead of reading cached data
    #[arg(long = "flushCache")]
    flush_cache: bool,

    /// Only show running resources
    #[arg(long)]
    running: bool,

    /// Resource ID, or "all"
    #[arg(long, default_value = "all")]
    id: String,

    /// What to do when a region fails during a refresh
    #[arg(long, value_enum)]
    policy: Option<FailurePolicy>,

    /// Per-region deadline in seconds (0 disables it)
    #[arg(long)]
    timeout: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
    /// Summarize cached entries
    Ls {
        /// Cloud provider
        #[arg(long, default_value = "gcp")]
        provider: String,

        /// Restrict to one service
        #[arg(short, long)]
        service: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Warning: cannot open log file {:?}: {}", log_path, e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("cloudinv started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("cloudinv").join("cloudinv.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".cloudinv").join("cloudinv.log");
    }
    PathBuf::from("cloudinv.log")
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    if let Err(err) = run(args).await {
        eprintln!("Error: {}", describe_error(&err));
        tracing::error!("{:#}", err);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config = Config::load();
    let schemas = SchemaRegistry::builtin();
    let store = CacheStore::open(config.cache_root())
        .await
        .context("Failed to open the cache")?;

    match args.command {
        Command::Ls(ls) => list_resources(&config, args.project, schemas, store, ls).await,
        Command::Cache(CacheCommand::Ls { provider, service }) => {
            let dispatcher = cache_only_dispatcher(schemas, store);
            let entries = dispatcher
                .list_cached(&provider, service.as_deref())
                .await?;
            let mut renderer = TableRenderer::stdout();
            renderer.render(&cache_summary(&entries)?, "Cached entries")?;
            Ok(())
        }
        Command::Services => {
            let mut renderer = TableRenderer::stdout();
            renderer.render(&services_table(&schemas)?, "Services")?;
            Ok(())
        }
    }
}

async fn list_resources(
    config: &Config,
    project: Option<String>,
    schemas: Arc<SchemaRegistry>,
    store: CacheStore,
    ls: LsArgs,
) -> Result<()> {
    let region: RegionSpec = ls.region.parse()?;
    let filter: FilterSpec = ls.id.parse()?;

    let clients = if ls.flush_cache {
        live_clients(config, project, &schemas, &ls.provider).await?
    } else {
        ClientSet::new()
    };

    let timeout = match ls.timeout {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => config.region_timeout(),
    };
    let catalog = Arc::new(StaticCatalog::new(schemas.clone()));
    let aggregator = RegionAggregator::new(schemas.clone(), catalog, clients)
        .with_policy(ls.policy.unwrap_or_else(|| config.failure_policy()))
        .with_call_timeout(timeout);
    let dispatcher = InventoryDispatcher::new(aggregator, store);

    let plan: Vec<(String, RegionSpec)> = if ls.service.is_empty() {
        dispatcher.services_for_region(&ls.provider, &region).await?
    } else {
        ls.service
            .iter()
            .map(|s| (s.clone(), region.clone()))
            .collect()
    };

    let mut renderer = TableRenderer::stdout();
    for (i, (service, service_region)) in plan.into_iter().enumerate() {
        if i > 0 {
            println!();
        }
        let query = ResourceQuery::new(&ls.provider, &service)
            .with_region(service_region)
            .with_filter(filter.clone())
            .with_running_only(ls.running)
            .with_refresh(ls.flush_cache);

        let outcome = dispatcher.dispatch(&query, &mut renderer).await?;
        if outcome.source == DataSource::Cached && outcome.data.is_empty() {
            tracing::info!("No cached data for {}, run with --flushCache", outcome.key);
        }
        for failure in &outcome.failures {
            eprintln!(
                "Warning: {} skipped in region {}: {}",
                service,
                failure.region,
                format_api_error(&failure.error)
            );
        }
        if outcome.source == DataSource::Cached && !outcome.missing_regions.is_empty() {
            eprintln!(
                "Warning: cached {} is missing regions {}",
                service,
                outcome.missing_regions.join(", ")
            );
        }
    }

    Ok(())
}

/// Build one live client per service of the provider
async fn live_clients(
    config: &Config,
    project: Option<String>,
    schemas: &SchemaRegistry,
    provider: &str,
) -> Result<ClientSet> {
    if provider != "gcp" {
        anyhow::bail!("live listing is not available for provider {}", provider);
    }

    let project = project
        .or_else(|| config.effective_project())
        .context("No GCP project configured. Set GOOGLE_CLOUD_PROJECT or use --project flag")?;
    tracing::info!("Using project: {}", project);

    let client = GcpClient::new(&project).await?;
    let mut clients = ClientSet::new();
    for def in schemas.services(provider) {
        clients.register(
            &def.provider,
            &def.service,
            Arc::new(GcpResourceClient::new(client.clone(), def.clone())),
        );
    }
    Ok(clients)
}

fn cache_only_dispatcher(schemas: Arc<SchemaRegistry>, store: CacheStore) -> InventoryDispatcher {
    let catalog = Arc::new(StaticCatalog::new(schemas.clone()));
    let aggregator = RegionAggregator::new(schemas, catalog, ClientSet::new());
    InventoryDispatcher::new(aggregator, store)
}

fn cache_summary(entries: &[CacheEntry]) -> Result<TableData> {
    let header = ["SN", "Key", "Rows", "Written", "Age", "Missing Regions"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let now = chrono::Utc::now();
    let body = entries
        .iter()
        .enumerate()
        .map(|(i, e)| {
            vec![
                (i + 1).to_string(),
                e.key.clone(),
                e.data.len().to_string(),
                e.written_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
                format_age(now - e.written_at),
                if e.is_complete() {
                    "-".to_string()
                } else {
                    e.failed_regions.join(", ")
                },
            ]
        })
        .collect();
    Ok(TableData::new(header, body)?)
}

fn services_table(schemas: &SchemaRegistry) -> Result<TableData> {
    let header = ["SN", "Provider", "Service", "Resources", "Regions"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let body = schemas
        .all()
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let regions = schemas.region_set(&d.region_set).map_or(0, |r| r.len());
            vec![
                (i + 1).to_string(),
                d.provider.clone(),
                d.service.clone(),
                d.display_name.clone(),
                regions.to_string(),
            ]
        })
        .collect();
    Ok(TableData::new(header, body)?)
}

fn format_age(age: chrono::TimeDelta) -> String {
    if age.num_days() > 0 {
        format!("{}d", age.num_days())
    } else if age.num_hours() > 0 {
        format!("{}h", age.num_hours())
    } else {
        format!("{}m", age.num_minutes().max(0))
    }
}

/// User-facing diagnostic; provider failures get a friendly message
fn describe_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<InventoryError>() {
        Some(InventoryError::ProviderApi {
            provider,
            service,
            region,
            source,
        }) => format!(
            "{}/{} in region {}: {}",
            provider,
            service,
            region,
            format_api_error(source)
        ),
        Some(e @ InventoryError::CacheCorrupt { .. }) => {
            format!("{} (run again with --flushCache to rebuild it)", e)
        }
        _ => format!("{:#}", err),
    }
}
