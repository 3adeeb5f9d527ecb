use cxy_export::client::{ReqwestTransport, TransportError};
use cxy_export::collections::{CollectionSpec, InclusionFlags};
use cxy_export::config::{Config, ConfigError, ExportConfig};
use cxy_export::jobs::{ExportError, ExportOptions, ExportOrchestrator};
use cxy_export::listings::{BoundingBox, CHAIN_COLUMNS, ChainQuery, LocationQuery};
use cxy_export::registry::ExportFormat;
use cxy_export::reports::{
    ChangesOverTimeReport, NearestNeighborReport, Report, VoidAnalysisReport,
};
use cxy_export::storage::{ArtifactFetcher, ArtifactStore, StorageError, save_records};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::{
    ChainsArgs, Cli, CollectionCommand, Commands, CreateCollectionArgs, ExportArgs, HistoryArgs,
    LocationsArgs, ReportArgs, ReportCommand, SaveArgs,
};

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{failed} of {total} exports failed")]
    PartialFailure { failed: usize, total: usize },
}

impl RunError {
    pub fn code(&self) -> &'static str {
        match self {
            RunError::Config(_) => "CONFIG_ERROR",
            RunError::Export(e) => e.code(),
            RunError::Transport(_) => "TRANSPORT_ERROR",
            RunError::Storage(_) => "STORAGE_ERROR",
            RunError::InvalidArgument(_) => "INVALID_ARGUMENT",
            RunError::PartialFailure { .. } => "PARTIAL_FAILURE",
        }
    }
}

/// Everything a command needs, built once from configuration
struct Context {
    config: Config,
    orchestrator: ExportOrchestrator,
    cancel: CancellationToken,
}

impl Context {
    fn new(config: Config, cancel: CancellationToken) -> Result<Self, RunError> {
        let transport = ReqwestTransport::new(config.http_config(), config.api_key())?;
        let orchestrator = ExportOrchestrator::new(Arc::new(transport), config.api.base_url.as_str())
            .with_export_policy(config.export_poll_policy())
            .with_report_policy(config.report_poll_policy());

        Ok(Self {
            config,
            orchestrator,
            cancel,
        })
    }

    fn store(&self) -> Result<ArtifactStore, RunError> {
        Ok(ArtifactStore::local(&self.config.storage.output_dir)?)
    }

    fn fetcher(&self) -> Result<ArtifactFetcher, RunError> {
        Ok(ArtifactFetcher::new(self.config.fetch_config(), self.store()?)?)
    }

    /// Print the link, saving it first when asked
    async fn deliver(&self, label: &str, link: &str, save: &SaveArgs) -> Result<(), RunError> {
        if save.save {
            let saved = self.fetcher()?.save(link, save.output.as_deref()).await?;
            println!("{}\t{}\t{}", label, link, saved.key);
        } else {
            println!("{}\t{}", label, link);
        }
        Ok(())
    }
}

pub async fn run(cli: Cli) -> Result<(), RunError> {
    let config = Config::load_with(cli.config)?;

    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        watcher.cancel();
    });

    let ctx = Context::new(config, cancel)?;
    let result = match cli.command {
        Commands::Check => check(&ctx).await,
        Commands::Export(args) => export(&ctx, args).await,
        Commands::Report(args) => report(&ctx, args).await,
        Commands::Collection(CollectionCommand::Create(args)) => create_collection(&ctx, args).await,
        Commands::History(args) => history(&ctx, args).await,
        Commands::Chains(args) => chains(&ctx, args).await,
        Commands::Locations(args) => locations(&ctx, args).await,
    };

    let stats = ctx.orchestrator.metrics().snapshot();
    info!(
        exports_started = stats.exports_started,
        cache_reused = stats.cache_reused,
        jobs_awaited = stats.jobs_awaited,
        jobs_created = stats.jobs_created,
        reports_submitted = stats.reports_submitted,
        status_polls = stats.status_polls,
        jobs_failed = stats.jobs_failed,
        pages_fetched = stats.pages_fetched,
        "Run finished"
    );

    result
}

async fn check(ctx: &Context) -> Result<(), RunError> {
    ctx.orchestrator.api().verify_credentials().await?;
    println!("API key accepted by {}", ctx.orchestrator.api().base_url());
    Ok(())
}

/// CLI flags over config defaults. `splitLayers` is only sent when asked
/// for, so kinds without that parameter never receive it.
fn export_options(args: &ExportArgs, defaults: &ExportConfig) -> Result<ExportOptions, RunError> {
    let format = match &args.format {
        Some(raw) => raw.parse::<ExportFormat>().map_err(ExportError::from)?,
        None => defaults.format,
    };
    Ok(ExportOptions {
        format: Some(format),
        split_layers: (args.split_layers || defaults.split_layers).then_some(true),
        data_date: args.data_date,
        ..Default::default()
    })
}

async fn export(ctx: &Context, args: ExportArgs) -> Result<(), RunError> {
    let defaults = &ctx.config.export;
    let options = export_options(&args, defaults)?;
    let cache_hours = args.cache_hours.unwrap_or(defaults.cache_time_hours);

    if args.ids.len() == 1 {
        let id = &args.ids[0];
        let link = ctx
            .orchestrator
            .export_resource(id, &args.kind, cache_hours, &options, &ctx.cancel)
            .await?;
        return ctx.deliver(id, &link, &args.save).await;
    }

    if args.save.output.is_some() {
        return Err(RunError::InvalidArgument(
            "--output names a single artifact; drop it when exporting several ids".to_string(),
        ));
    }

    let total = args.ids.len();
    let results = ctx
        .orchestrator
        .export_many(
            args.ids,
            &args.kind,
            cache_hours,
            &options,
            args.concurrency.unwrap_or(defaults.concurrency),
            &ctx.cancel,
        )
        .await?;

    let mut failed = 0;
    for (id, result) in results {
        match result {
            Ok(link) => ctx.deliver(&id, &link, &args.save).await?,
            Err(e) => {
                failed += 1;
                eprintln!("{}\terror[{}]: {}", id, e.code(), e);
            }
        }
    }

    if failed > 0 {
        return Err(RunError::PartialFailure { failed, total });
    }
    Ok(())
}

async fn report(ctx: &Context, args: ReportArgs) -> Result<(), RunError> {
    let report: Box<dyn Report> = match args.report {
        ReportCommand::ChangesOverTime {
            collection,
            start,
            end,
            count_by_state,
            count_by_store_type,
            no_change_log,
        } => Box::new(
            ChangesOverTimeReport::builder()
                .collection_id(collection)
                .start_date(start)
                .end_date(end)
                .include_count_by_state(count_by_state)
                .include_count_by_store_type(count_by_store_type)
                .include_change_log(!no_change_log)
                .build(),
        ),
        ReportCommand::Nearest {
            collection,
            sources,
            n,
            no_aggregate,
        } => Box::new(
            NearestNeighborReport::builder()
                .target_collection_id(collection)
                .source_chain_ids(sources)
                .n(n)
                .aggregate(!no_aggregate)
                .build(),
        ),
        ReportCommand::VoidAnalysis {
            collection,
            radius,
            admin_level,
            lat,
            lng,
            categorization,
            label,
        } => Box::new(
            VoidAnalysisReport::builder()
                .target_collection_id(collection)
                .search_radius_miles(radius)
                .admin_level(admin_level)
                .latitude(lat)
                .longitude(lng)
                .categorization(categorization)
                .label(label)
                .build(),
        ),
    };

    let link = ctx.orchestrator.submit_report(report.as_ref(), &ctx.cancel).await?;
    ctx.deliver(&report.kind().to_string(), &link, &args.save).await
}

async fn create_collection(ctx: &Context, args: CreateCollectionArgs) -> Result<(), RunError> {
    let chains_query = args
        .query
        .as_deref()
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()
        .map_err(|e| RunError::InvalidArgument(format!("--query is not valid JSON: {}", e)))?;

    let spec = CollectionSpec::builder()
        .label(args.label)
        .maybe_comments(args.comments)
        .chain_ids(args.chains)
        .maybe_chains_query(chains_query)
        .admin_levels(args.admin_levels)
        .include(InclusionFlags {
            closed: args.include_closed,
            coming_soon: args.include_coming_soon,
            poi: args.include_poi,
            ..Default::default()
        })
        .build();

    let collection_id = ctx.orchestrator.create_collection(&spec).await?;
    println!("collection\t{}", collection_id);

    if args.download {
        let options = ExportOptions {
            data_date: args.data_date,
            ..Default::default()
        };
        // A brand-new collection has no downloads to reuse
        let link = ctx
            .orchestrator
            .export_resource(&collection_id, "chain", 0.0, &options, &ctx.cancel)
            .await?;
        ctx.deliver(&collection_id, &link, &args.save).await?;
    }

    Ok(())
}

async fn history(ctx: &Context, args: HistoryArgs) -> Result<(), RunError> {
    let exports = ctx
        .orchestrator
        .export_chain_history(&args.chain, args.limit, &ctx.cancel)
        .await?;

    let save = SaveArgs {
        save: args.save,
        output: None,
    };
    for export in exports {
        let run_date = export
            .run_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        ctx.deliver(&format!("{}\t{}", export.scrape_id, run_date), &export.link, &save)
            .await?;
    }

    Ok(())
}

fn location_query(args: &LocationsArgs) -> LocationQuery {
    LocationQuery::builder()
        .updated_after(args.since)
        .chain_ids(args.chains.clone())
        .bounds(BoundingBox {
            north: args.north,
            east: args.east,
            south: args.south,
            west: args.west,
        })
        .page_size(args.limit)
        .build()
}

async fn chains(ctx: &Context, args: ChainsArgs) -> Result<(), RunError> {
    let query = ChainQuery::builder()
        .scraped_after(args.since)
        .chain_ids(args.chains)
        .build();
    let chains = ctx.orchestrator.list_chains(&query, &ctx.cancel).await?;

    match args.output {
        Some(output) => {
            let saved = save_records(&ctx.store()?, &output, &chains, Some(&CHAIN_COLUMNS[..])).await?;
            println!("chains\t{}\t{}", chains.len(), saved.key);
        }
        None => {
            for chain in &chains {
                println!(
                    "{}\t{}\t{}",
                    text(&chain["Id"]),
                    text(&chain["Name"]),
                    text(&chain["LastScrapeDate"])
                );
            }
        }
    }
    Ok(())
}

async fn locations(ctx: &Context, args: LocationsArgs) -> Result<(), RunError> {
    let query = location_query(&args);
    let locations = ctx.orchestrator.list_locations(&query, &ctx.cancel).await?;

    match args.output {
        Some(output) => {
            let saved = save_records(&ctx.store()?, &output, &locations, None).await?;
            println!("locations\t{}\t{}", locations.len(), saved.key);
        }
        None => {
            for location in &locations {
                println!("{}", location);
            }
        }
    }
    Ok(())
}

/// Strings unquoted, null as `-`
fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate())
            .expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received, cancelling");
}
