use crate::config::RouteloopConfig;
use crate::dispatcher::{DispatchOutcome, Dispatcher, IncomingRequest};
use crate::handlers::{ChainLoader, HandlerCatalog, HandlerLoader};
use crate::registry::RouteRegistry;
use crate::suggest::{self, SuggestPipeline};
use crate::table::RouteMethod;
use crate::validator;
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

/// Command-line interface for routeloop
///
/// Inspects the route table, exercises the dispatcher, and drives the
/// access-log suggester.
#[derive(Parser, Debug)]
#[command(name = "routeloop")]
#[command(about = "Declarative route dispatcher with an access-log driven route suggester", long_about = None)]
pub struct Cli {
    /// Config file (defaults to ./routeloop.yaml when present)
    #[arg(short, long, global = true, env = "ROUTELOOP_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List every loaded route in resolution order
    Routes,
    /// Show which route a request would resolve to, and its params
    Resolve {
        /// HTTP verb, or WS for WebSocket routes
        method: String,
        path: String,
    },
    /// Dispatch a request through the full pipeline and print the response
    Dispatch {
        method: String,
        /// Request target, e.g. `/users/7?verbose=1`
        target: String,
        /// Extra headers as `name: value`
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
    },
    /// Mine access logs and materialize new handler stubs
    Suggest {
        /// Report what would be materialized without writing anything
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Restore every generated handler that has a `.bak` backup
    Rollback {
        /// Also restore the generated route table from its backup
        #[arg(long, default_value_t = false)]
        table: bool,
    },
    /// Remove generated stubs that have no backup, and stale staging files
    Clean,
    /// Check that every sourcemap route's handler loads
    Validate,
}

/// Loader chain used by the CLI: compiled-in catalog, then generated stubs.
fn cli_loader(config: &RouteloopConfig) -> Arc<dyn HandlerLoader> {
    Arc::new(
        ChainLoader::new()
            .with(Arc::new(HandlerCatalog::new()))
            .with(Arc::new(config.scaffold_loader())),
    )
}

fn load_registry(config: &RouteloopConfig) -> anyhow::Result<RouteRegistry> {
    RouteRegistry::load(config.route_sources()).context("Failed to load route tables")
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse `std::env::args` and run.
pub fn run_cli() -> anyhow::Result<()> {
    run(Cli::parse())
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let config = RouteloopConfig::load(cli.config.as_deref())?;
    match cli.command {
        Commands::Routes => {
            load_registry(&config)?.snapshot().dump_routes();
            Ok(())
        }
        Commands::Resolve { method, path } => {
            let method: RouteMethod = method.parse()?;
            let index = load_registry(&config)?.snapshot();
            match index.resolve(method, &path)? {
                Some(m) => print_json(&serde_json::json!({
                    "route_id": m.route.id,
                    "handler": m.route.handler,
                    "strategy": format!("{:?}", m.strategy),
                    "params": m.path_params_map(),
                })),
                None => anyhow::bail!("no route for {method} {path}"),
            }
        }
        Commands::Dispatch {
            method,
            target,
            headers,
        } => {
            let registry = Arc::new(load_registry(&config)?);
            let dispatcher = Dispatcher::new(registry, cli_loader(&config), config.base_url()?);
            let method = http::Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                .with_context(|| format!("Invalid HTTP method '{method}'"))?;
            let mut request = IncomingRequest::new(method, target);
            for header in &headers {
                let (name, value) = header
                    .split_once(':')
                    .with_context(|| format!("Header '{header}' is not 'name: value'"))?;
                request = request.with_header(name.trim(), value.trim());
            }
            match dispatcher.dispatch(request) {
                DispatchOutcome::Response(resp) => print_json(&resp),
                DispatchOutcome::Upgrade(session) => print_json(&serde_json::json!({
                    "upgrade": true,
                    "route_id": session.route_id(),
                    "handshake": session.handshake_response(),
                })),
            }
        }
        Commands::Suggest { dry_run } => {
            let registry = load_registry(&config)?;
            let mut pipeline = SuggestPipeline::from_config(&config);
            let report = pipeline.run(&registry.snapshot(), dry_run);
            print_json(&report)?;
            if let Some(batch) = &report.materialized {
                if !batch.is_complete() {
                    anyhow::bail!(
                        "{} candidate(s) failed to materialize; re-run to retry them",
                        batch.failures.len()
                    );
                }
                // Confirms the new table parses before anything reloads it.
                registry.reload()?;
            }
            Ok(())
        }
        Commands::Rollback { table } => {
            let report = suggest::rollback(&config.handlers.generated_dir)?;
            let table_restored = match (&config.routes.generated, table) {
                (Some(path), true) => suggest::restore_backup(path)?,
                _ => false,
            };
            print_json(&serde_json::json!({
                "restored": report.restored,
                "failures": report.failures,
                "table_restored": table_restored,
            }))?;
            if report.failures.is_empty() {
                Ok(())
            } else {
                anyhow::bail!("{} file(s) could not be restored", report.failures.len())
            }
        }
        Commands::Clean => print_json(&suggest::clean(&config.handlers.generated_dir)?),
        Commands::Validate => {
            let index = load_registry(&config)?.snapshot();
            let report = validator::validate_routes(&index, cli_loader(&config).as_ref());
            validator::print_report(&report);
            if report.is_ok() {
                Ok(())
            } else {
                anyhow::bail!("route validation failed")
            }
        }
    }
}
