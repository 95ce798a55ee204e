//! # CLI Module
//!
//! Command-line entry points for the `jsonroutes` binary.
//!
//! ## Commands
//!
//! ### `serve`
//!
//! Start an HTTP server with the built-in endpoints (`/health`, `/routes`,
//! `/echo`) under the configured namespace:
//!
//! ```bash
//! jsonroutes serve --config jsonroutes.yaml --addr 127.0.0.1:8080 --namespace api
//! ```
//!
//! ### `routes`
//!
//! Print the route table without starting a server:
//!
//! ```bash
//! jsonroutes routes --namespace api --json
//! ```
//!
//! Configuration comes from `--config` (YAML) or `JSONROUTES_*` environment
//! variables; see [`RuntimeConfig`](crate::runtime_config::RuntimeConfig).

mod commands;

pub use commands::{build_app, load_config, run_cli, Cli, Commands};

#[cfg(test)]
mod tests;
