//! Unit tests for CLI commands

use crate::cli::{build_app, load_config, Cli, Commands};
use crate::runtime_config::RuntimeConfig;
use clap::Parser;
use http::Method;

#[test]
fn test_serve_command_with_flags() {
    let cli = Cli::try_parse_from([
        "jsonroutes",
        "serve",
        "--addr",
        "127.0.0.1:9000",
        "--namespace",
        "api",
    ])
    .unwrap();

    match cli.command {
        Commands::Serve {
            config,
            addr,
            namespace,
        } => {
            assert!(config.is_none());
            assert_eq!(addr.as_deref(), Some("127.0.0.1:9000"));
            assert_eq!(namespace.as_deref(), Some("api"));
        }
        _ => panic!("Expected Serve command"),
    }
}

#[test]
fn test_routes_command_json_flag() {
    let cli = Cli::try_parse_from(["jsonroutes", "routes", "--json"]).unwrap();
    assert!(matches!(cli.command, Commands::Routes { json: true, .. }));
}

#[test]
fn test_unknown_command_rejected() {
    assert!(Cli::try_parse_from(["jsonroutes", "generate"]).is_err());
}

#[test]
fn test_build_app_registers_builtin_routes() {
    let config = RuntimeConfig {
        namespace: "/api".to_string(),
        ..RuntimeConfig::default()
    };
    let app = build_app(config).unwrap();
    let routes: Vec<(Method, &str)> = app
        .routes()
        .iter()
        .map(|r| (r.method.clone(), r.path.as_str()))
        .collect();
    assert_eq!(
        routes,
        vec![
            (Method::GET, "/api/health"),
            (Method::POST, "/api/echo"),
            (Method::GET, "/api/routes"),
        ]
    );
    assert_eq!(app.error_middleware().pending(), 1);
}

#[test]
fn test_load_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    std::io::Write::write_all(&mut file, b"namespace: /v1\nbody_limit: 2048\n").unwrap();
    let config = load_config(Some(file.path())).unwrap();
    assert_eq!(config.namespace, "/v1");
    assert_eq!(config.body_limit, 2048);
}
