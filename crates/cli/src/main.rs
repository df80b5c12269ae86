mod output;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use inventory_documents::{DateRange, Decimal, ListingFilter, NaiveDate, SectionTarget, Uuid};
use inventory_indexer::{IndexerConfig, IndexingService, InMemorySources, Sources};
use output::CommandResponse;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "inventory-index")]
#[command(about = "Admin tool for the inventory listing index", version)]
struct Cli {
    /// Index store directory (overrides the config file)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild the whole index from a seed file
    Rebuild {
        /// JSON file with properties, units, availability, pricing and sections
        #[arg(long)]
        seed: PathBuf,
    },
    /// Fetch one property or unit document
    Get { id: Uuid },
    /// List a section's items in section order
    List {
        #[arg(long)]
        section: Uuid,

        #[command(flatten)]
        query: QueryArgs,
    },
    /// Search every property or unit document
    Search {
        #[arg(long, value_enum, default_value_t = Target::Properties)]
        target: Target,

        #[command(flatten)]
        query: QueryArgs,
    },
    /// Show store, queue, cache and rebuild health
    Stats,
}

#[derive(Clone, Copy, ValueEnum)]
enum Target {
    Properties,
    Units,
}

impl From<Target> for SectionTarget {
    fn from(target: Target) -> Self {
        match target {
            Target::Properties => SectionTarget::Properties,
            Target::Units => SectionTarget::Units,
        }
    }
}

#[derive(Args)]
struct QueryArgs {
    #[arg(long, default_value_t = 1)]
    page: usize,

    /// 0 uses the configured default
    #[arg(long, default_value_t = 0)]
    page_size: usize,

    #[arg(long)]
    city: Option<String>,

    #[arg(long)]
    property_type: Option<String>,

    #[arg(long)]
    featured: bool,

    #[arg(long)]
    min_capacity: Option<u32>,

    #[arg(long)]
    max_price: Option<Decimal>,

    /// Stay start (YYYY-MM-DD); requires --check-out
    #[arg(long, requires = "check_out")]
    check_in: Option<NaiveDate>,

    #[arg(long, requires = "check_in")]
    check_out: Option<NaiveDate>,
}

impl QueryArgs {
    fn filter(&self) -> Result<ListingFilter> {
        let stay = match (self.check_in, self.check_out) {
            (Some(start), Some(end)) => Some(DateRange::new(start, end)?),
            _ => None,
        };
        Ok(ListingFilter {
            city: self.city.clone(),
            property_type: self.property_type.clone(),
            featured_only: self.featured,
            min_capacity: self.min_capacity,
            max_price: self.max_price,
            stay,
            ..ListingFilter::default()
        })
    }
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Rebuild { .. } => "rebuild",
            Command::Get { .. } => "get",
            Command::List { .. } => "list",
            Command::Search { .. } => "search",
            Command::Stats => "stats",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the JSON response
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    let name = cli.command.name();
    let started = Instant::now();

    let response = match run(&cli).await {
        Ok(response) => response,
        Err(err) => {
            log::error!("{name} failed: {err:#}");
            CommandResponse::error(name, started, format!("{err:#}"))
        }
    };

    let json = if cli.pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    println!("{json}");

    if response.is_error() {
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: &Cli) -> Result<CommandResponse> {
    let config = load_config(cli)?;
    let name = cli.command.name();
    let started = Instant::now();

    let sources = match &cli.command {
        Command::Rebuild { seed } => load_seed(seed)?,
        _ => Arc::new(InMemorySources::default()),
    };
    let service = IndexingService::open(config, Sources::from_shared(sources))?;

    let response = match &cli.command {
        Command::Rebuild { .. } => {
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            let watcher = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::warn!("Interrupted; cancelling rebuild");
                    on_signal.cancel();
                }
            });
            let result = service.rebuild_index(&cancel).await;
            watcher.abort();
            match result {
                Ok(stats) => CommandResponse::ok(name, started, stats),
                Err(err) => CommandResponse::error(name, started, err.to_string()),
            }
        }
        Command::Get { id } => match service.get_by_id(*id) {
            Some(doc) => CommandResponse::ok(name, started, doc),
            None => CommandResponse::error(name, started, format!("document {id} not found")),
        },
        Command::List { section, query } => {
            let filter = query.filter()?;
            let page = service.list_by_section(*section, &filter, query.page, query.page_size);
            CommandResponse::ok(name, started, page)
        }
        Command::Search { target, query } => {
            let filter = query.filter()?;
            let page = service.search((*target).into(), &filter, query.page, query.page_size);
            CommandResponse::ok(name, started, page)
        }
        Command::Stats => CommandResponse::ok(name, started, service.health()),
    };

    service.shutdown().await;
    Ok(response)
}

fn load_config(cli: &Cli) -> Result<IndexerConfig> {
    let mut config = IndexerConfig::load(cli.config.as_deref())
        .with_context(|| match &cli.config {
            Some(path) => format!("failed to load config {}", path.display()),
            None => "failed to load config".to_string(),
        })?;
    if let Some(store) = &cli.store {
        config.store_path = store.clone();
    }
    Ok(config)
}

fn load_seed(path: &Path) -> Result<Arc<InMemorySources>> {
    if !path.is_file() {
        return Err(anyhow!("seed file {} does not exist", path.display()));
    }
    let sources = InMemorySources::from_seed_file(path)?;
    Ok(Arc::new(sources))
}
