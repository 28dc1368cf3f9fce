//! CityView command-line tool
//!
//! Talks to an NGSI-LD context broker directly, or runs the live map
//! pipeline headless against a map document:
//!
//!   cityview --broker http://localhost:1026 query --type Streetlight
//!   cityview watch --config city-map.json
//!
//! `watch` polls every enabled layer on its own interval and logs what the
//! map would draw until interrupted.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use cityview_map::{HeadlessSurface, LegendEntry, MapSession};
use cityview_model::{Entity, Source, ViewerConfig};
use cityview_ngsi::{
    ClientConfig, GetOptions, NgsiClient, QueryOptions, TenantStatus, UpsertOutcome,
    discover_entities, health_check,
};
use tracing::{Level, debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "cityview")]
#[command(about = "NGSI-LD broker client and headless live map")]
struct Args {
    /// Broker base URL
    #[arg(short, long, global = true, default_value = "http://localhost:1026")]
    broker: String,

    /// Tenant sent as the Fiware-Service header
    #[arg(short, long, global = true)]
    tenant: Option<String>,

    /// Service path sent as the Fiware-ServicePath header
    #[arg(long, global = true)]
    service_path: Option<String>,

    /// JSON-LD context URL
    #[arg(long, global = true)]
    context: Option<String>,

    /// Token sent as the X-Auth-Token header
    #[arg(long, global = true)]
    token: Option<String>,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll every enabled layer of a map document and log map updates
    Watch {
        /// Map document (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Exit once every layer has rendered or failed
        #[arg(long)]
        once: bool,
    },
    /// Fetch one entity
    Get {
        id: String,

        /// Comma-separated attribute names
        #[arg(long, value_delimiter = ',')]
        attrs: Vec<String>,

        /// Request keyValues (simplified) representation
        #[arg(long)]
        key_values: bool,
    },
    /// Query entities
    Query {
        #[arg(long = "type")]
        entity_type: Option<String>,

        /// Comma-separated entity ids
        #[arg(long, value_delimiter = ',')]
        ids: Vec<String>,

        /// NGSI-LD query expression, e.g. `status=="online"`
        #[arg(short, long)]
        q: Option<String>,

        #[arg(long, value_delimiter = ',')]
        attrs: Vec<String>,

        #[arg(long)]
        limit: Option<u32>,
    },
    /// Create an entity, or patch it when it already exists
    Upsert {
        /// Entity document (JSON)
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Delete one entity
    Delete { id: String },
    /// Print the broker's version document
    Health,
    /// List entities across the given tenant and service path
    Discover,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(log_level.into()));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    match &args.command {
        Command::Watch { config, once } => watch(config, *once).await,
        Command::Get {
            id,
            attrs,
            key_values,
        } => {
            let options = GetOptions {
                attrs: attrs.clone(),
                options: key_values.then(|| "keyValues".to_string()),
                ..GetOptions::default()
            };
            let entity = client(&args)?
                .get_entity(id, &options)
                .await
                .with_context(|| format!("failed to fetch {id}"))?;
            print_json(&entity.to_value())
        }
        Command::Query {
            entity_type,
            ids,
            q,
            attrs,
            limit,
        } => {
            if entity_type.is_none() && ids.is_empty() && q.is_none() {
                bail!("query needs --type, --ids or -q");
            }
            let query = QueryOptions {
                entity_type: entity_type.clone(),
                ids: ids.clone(),
                q: q.clone(),
                attrs: attrs.clone(),
                limit: *limit,
                ..QueryOptions::default()
            };
            let entities = client(&args)?
                .query_entities(&query)
                .await
                .context("query failed")?;
            info!(count = entities.len(), "entities returned");
            print_json(&serde_json::Value::Array(
                entities.iter().map(Entity::to_value).collect(),
            ))
        }
        Command::Upsert { file } => {
            let raw = std::fs::read_to_string(file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let value: serde_json::Value = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not valid JSON", file.display()))?;
            let entity = Entity::from_value(value).context("not an NGSI-LD entity")?;
            let outcome = client(&args)?
                .upsert_entity(&entity)
                .await
                .with_context(|| format!("failed to upsert {}", entity.id))?;
            match outcome {
                UpsertOutcome::Created => info!(entity_id = %entity.id, "entity created"),
                UpsertOutcome::Updated => info!(entity_id = %entity.id, "entity updated"),
            }
            Ok(())
        }
        Command::Delete { id } => {
            client(&args)?
                .delete_entity(id)
                .await
                .with_context(|| format!("failed to delete {id}"))?;
            info!(entity_id = %id, "entity deleted");
            Ok(())
        }
        Command::Health => {
            let version = health_check(&args.broker)
                .await
                .with_context(|| format!("broker {} is not healthy", args.broker))?;
            print_json(&version)
        }
        Command::Discover => discover(&args).await,
    }
}

fn client(args: &Args) -> Result<NgsiClient> {
    let mut config = ClientConfig::new(args.broker.clone());
    if let Some(tenant) = &args.tenant {
        config = config.with_service(tenant.clone());
    }
    if let Some(path) = &args.service_path {
        config = config.with_service_path(path.clone());
    }
    if let Some(context) = &args.context {
        config = config.with_context_url(context.clone());
    }
    if let Some(token) = &args.token {
        config = config.with_auth_token(token.clone());
    }
    NgsiClient::new(config).context("invalid broker settings")
}

async fn discover(args: &Args) -> Result<()> {
    let mut source = Source::new(args.broker.clone());
    source.tenants = args.tenant.iter().cloned().collect();
    if let Some(path) = &args.service_path {
        source.service_paths = vec![path.clone()];
    }
    source.auth_token = args.token.clone();

    let discovery = discover_entities(&source).await;
    for tenant in &discovery.tenants {
        match tenant.status {
            TenantStatus::Error => warn!(
                tenant = %tenant.label(),
                error = tenant.error.as_deref().unwrap_or_default(),
                "tenant scan failed"
            ),
            _ => info!(tenant = %tenant.label(), entities = tenant.entity_count, "tenant scanned"),
        }
    }
    for entity in &discovery.entities {
        println!("{}\t{}\t{}", entity.entity_type, entity.id, entity.service_path);
    }
    if discovery.entities.is_empty() && discovery.error_tenants().next().is_some() {
        bail!("no tenant could be scanned");
    }
    Ok(())
}

async fn watch(path: &Path, once: bool) -> Result<()> {
    let config = ViewerConfig::from_path(path)
        .with_context(|| format!("failed to load map document {}", path.display()))?;
    info!(
        layers = config.layers.len(),
        enabled = config.enabled_layers().count(),
        "map document loaded"
    );

    let mut session = MapSession::with_broker(HeadlessSurface::new());
    session
        .apply_layers(&config.layers)
        .context("failed to set up map layers")?;
    render_pass(&mut session)?;

    loop {
        if once && session.legend().iter().all(settled) {
            break;
        }
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            changed = session.next_change() => {
                if !changed {
                    if once {
                        break;
                    }
                    // Nothing is polled; keep the map up until interrupted.
                    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
                    break;
                }
                render_pass(&mut session)?;
            }
        }
    }

    print_legend(&session.legend());
    session.shutdown().context("failed to tear down map layers")?;
    Ok(())
}

fn settled(entry: &LegendEntry) -> bool {
    entry.count.is_some() || entry.error.is_some()
}

fn render_pass(session: &mut MapSession<HeadlessSurface>) -> Result<()> {
    let redrawn = session.pump().context("failed to render layer data")?;
    for op in session.manager_mut().surface_mut().take_ops() {
        debug!(?op, "surface");
    }
    if redrawn > 0 {
        session.fit_to_data();
        for entry in session.legend() {
            match &entry.error {
                Some(error) => warn!(layer = %entry.name, %error, "layer failed"),
                None => info!(layer = %entry.name, entities = entry.count.unwrap_or(0), "layer rendered"),
            }
        }
    }
    Ok(())
}

fn print_legend(legend: &[LegendEntry]) {
    println!("\n========================================");
    println!("  CityView layers");
    println!("========================================");
    for entry in legend {
        let count = entry
            .count
            .map_or_else(|| "-".to_string(), |c| c.to_string());
        match &entry.error {
            Some(error) => println!("  {:<24} {:>6}  {} ({error})", entry.name, count, entry.color),
            None => println!("  {:<24} {:>6}  {}", entry.name, count, entry.color),
        }
    }
    println!("========================================\n");
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to encode JSON")?;
    println!("{text}");
    Ok(())
}
