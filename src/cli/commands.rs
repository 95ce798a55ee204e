use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use serde_json::json;
use tracing::{info, warn};

use crate::app::JsonRoutes;
use crate::logging::{init_logging, LogConfig};
use crate::middleware::{Next, TracingMiddleware};
use crate::registry::RouteEntry;
use crate::response::ResponseOptions;
use crate::runtime_config::RuntimeConfig;
use crate::server::{AppService, HttpServer};

#[derive(Parser)]
#[command(name = "jsonroutes")]
#[command(about = "JSON routing layer on may coroutines", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the built-in health, route listing and echo endpoints
    Serve {
        /// YAML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Listen address, overrides the configuration
        #[arg(long, env = "JSONROUTES_ADDR")]
        addr: Option<String>,

        /// Route namespace, overrides the configuration
        #[arg(long)]
        namespace: Option<String>,
    },
    /// Print the routes `serve` would register
    Routes {
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long)]
        namespace: Option<String>,

        /// Print as JSON instead of one route per line
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

/// Load the configuration file if given, otherwise the environment.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<RuntimeConfig> {
    match path {
        Some(path) => RuntimeConfig::from_yaml_file(path),
        None => Ok(RuntimeConfig::from_env()),
    }
}

/// Register the built-in service routes.
///
/// - `GET <ns>/health` reports liveness
/// - `GET <ns>/routes` lists every registered route
/// - `POST <ns>/echo` returns the parsed body and query parameters
///
/// Errors are rendered as `{"error": ..}` with the error's status code.
pub fn build_app(config: RuntimeConfig) -> anyhow::Result<JsonRoutes> {
    let mut app = JsonRoutes::new(config)?;
    app.middleware().use_middleware(Arc::new(TracingMiddleware));

    app.add("GET", "/health", |_req, res| {
        res.send_result(ResponseOptions::new().data(json!({ "status": "ok" })))?;
        Ok(())
    })?;

    app.add("POST", "/echo", |req, res| {
        let query: serde_json::Map<String, serde_json::Value> = req
            .query_params
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect();
        let body = req.body.clone().unwrap_or(serde_json::Value::Null);
        res.send_result(ResponseOptions::new().data(json!({
            "request_id": req.request_id.to_string(),
            "body": body,
            "query": query,
        })))?;
        Ok(())
    })?;

    let listing: Arc<OnceCell<Vec<RouteEntry>>> = Arc::new(OnceCell::new());
    let routes_for_handler = Arc::clone(&listing);
    app.add("GET", "/routes", move |_req, res| {
        let routes = routes_for_handler.get().map(Vec::as_slice).unwrap_or_default();
        res.send_result(ResponseOptions::new().try_data(&routes)?)?;
        Ok(())
    })?;
    // Every route is registered at this point.
    if listing.set(app.routes().to_vec()).is_err() {
        warn!("Route listing initialized twice");
    }

    app.error_middleware().use_fn(|err, req, res| {
        if res.is_finished() {
            warn!(request_id = %req.request_id, error = %err, "Error after response was sent");
            return Ok(Next::Handled);
        }
        res.send_result(
            ResponseOptions::new()
                .code(err.status())
                .data(json!({ "error": err.to_string(), "request_id": req.request_id.to_string() })),
        )?;
        Ok(Next::Handled)
    })?;

    Ok(app)
}

fn apply_overrides(config: &mut RuntimeConfig, addr: Option<&str>, namespace: Option<&str>) {
    if let Some(addr) = addr {
        config.addr = addr.to_string();
    }
    if let Some(namespace) = namespace {
        config.namespace = namespace.to_string();
    }
}

pub fn run_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve {
            config,
            addr,
            namespace,
        } => {
            init_logging(&LogConfig::from_env())?;
            let mut config = load_config(config.as_deref())?;
            apply_overrides(&mut config, addr.as_deref(), namespace.as_deref());

            let addr = config.addr.clone();
            let body_limit = config.body_limit;
            let app = build_app(config)?;
            let dispatcher = Arc::new(app.finalize());
            for route in dispatcher.routes() {
                info!(method = %route.method, path = %route.path, "Serving route");
            }

            let handle = HttpServer(AppService::new(dispatcher, body_limit)).start(addr.as_str())?;
            handle
                .join()
                .map_err(|e| anyhow::anyhow!("server coroutine panicked: {e:?}"))?;
            Ok(())
        }
        Commands::Routes {
            config,
            namespace,
            json,
        } => {
            let mut config = load_config(config.as_deref())?;
            apply_overrides(&mut config, None, namespace.as_deref());
            let app = build_app(config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(app.routes())?);
            } else {
                for route in app.routes() {
                    println!("{:<7} {}", route.method.as_str(), route.path);
                }
            }
            Ok(())
        }
    }
}
