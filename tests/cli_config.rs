use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use htserve::{Cli, ConfigError, ServerConfig};

fn config_from(args: &[&str]) -> Result<ServerConfig, ConfigError> {
    let mut argv = vec!["htserve"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap().into_config()
}

#[test]
fn test_directory_and_port_flags() {
    let cfg = config_from(&["-d", "site", "-p", "9090"]).unwrap();
    assert_eq!(cfg.document_root, PathBuf::from("site"));
    assert_eq!(cfg.listen_addr, "0.0.0.0:9090");
}

#[test]
fn test_long_flags() {
    let cfg = config_from(&[
        "--directory",
        "/srv/www",
        "--bind",
        "127.0.0.1:3000",
        "--timeout",
        "30",
        "--max-connections",
        "4",
    ])
    .unwrap();
    assert_eq!(cfg.document_root, PathBuf::from("/srv/www"));
    assert_eq!(cfg.listen_addr, "127.0.0.1:3000");
    assert_eq!(cfg.timeout(), Duration::from_secs(30));
    assert_eq!(cfg.max_connections, 4);
}

#[test]
fn test_flags_override_config_file() {
    let path = std::env::temp_dir().join(format!("htserve-cfg-{}.json", std::process::id()));
    std::fs::write(
        &path,
        r#"{ "listen_addr": "127.0.0.1:7000", "document_root": "from-file", "timeout_secs": 9 }"#,
    )
    .unwrap();

    let cfg = config_from(&["--config", path.to_str().unwrap(), "-d", "from-flag"]).unwrap();
    assert_eq!(cfg.listen_addr, "127.0.0.1:7000");
    assert_eq!(cfg.document_root, PathBuf::from("from-flag"));
    assert_eq!(cfg.timeout_secs, 9);
    assert_eq!(cfg.max_connections, ServerConfig::default().max_connections);

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_zero_max_connections_rejected() {
    let err = config_from(&["--max-connections", "0"]).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { field: "max_connections", .. }));
}

#[test]
fn test_missing_config_file() {
    let err = config_from(&["--config", "/no/such/htserve.json"]).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}
