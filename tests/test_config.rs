use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

use ember::auth::AuthenticationMethod;
use ember::config::Config;

fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| vars.get(key).cloned()
}

fn config_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_config_defaults() {
    let cfg = Config::default();

    assert_eq!(cfg.server.listen_addr, "127.0.0.1:8080");
    assert!(cfg.server.persistent_connections);
    assert_eq!(cfg.server.keep_alive_timeout(), Duration::from_secs(15));
    assert_eq!(cfg.server.keep_alive_max, 100);
    assert_eq!(cfg.server.max_body_size, 16 * 1024 * 1024);
    assert_eq!(cfg.server.session_timeout(), Duration::from_secs(60));
    assert!(!cfg.server.resolve_dns_names);
    assert_eq!(cfg.server.authentication, AuthenticationMethod::None);
    assert!(!cfg.tls.enabled);
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_config_custom_address_from_env() {
    let file = config_file("");
    let path = file.path().to_str().unwrap();

    let cfg = Config::load_with(env_of(&[("EMBER_CONFIG", path), ("LISTEN", "0.0.0.0:3000")]))
        .unwrap();

    assert_eq!(cfg.server.listen_addr, "0.0.0.0:3000");
}

#[test]
fn test_config_from_file() {
    let file = config_file(
        "server:\n  listen_addr: \"0.0.0.0:9000\"\n  persistent_connections: false\n  keep_alive_timeout_secs: 5\n  session_timeout_minutes: 20\n  max_body_size: 4096\n  authentication: digest\n",
    );
    let path = file.path().to_str().unwrap();

    let cfg = Config::load_with(env_of(&[("EMBER_CONFIG", path)])).unwrap();

    assert_eq!(cfg.server.listen_addr, "0.0.0.0:9000");
    assert!(!cfg.server.persistent_connections);
    assert_eq!(cfg.server.keep_alive_timeout(), Duration::from_secs(5));
    assert_eq!(cfg.server.session_timeout(), Duration::from_secs(20 * 60));
    assert_eq!(cfg.server.authentication, AuthenticationMethod::Digest);
    assert_eq!(cfg.server.max_body_size, 4096);
    // Unset fields keep their defaults
    assert_eq!(cfg.server.keep_alive_max, 100);
}

#[test]
fn test_config_env_overrides_file() {
    let file = config_file("server:\n  listen_addr: \"0.0.0.0:9000\"\n");
    let path = file.path().to_str().unwrap();

    let cfg = Config::load_with(env_of(&[("EMBER_CONFIG", path), ("LISTEN", "127.0.0.1:8000")]))
        .unwrap();

    assert_eq!(cfg.server.listen_addr, "127.0.0.1:8000");
}

#[test]
fn test_config_missing_file_is_an_error() {
    let result = Config::load_with(env_of(&[("EMBER_CONFIG", "/nonexistent/ember.yaml")]));
    assert!(result.is_err());
}

#[test]
fn test_config_invalid_yaml_is_an_error() {
    assert!(Config::from_yaml_str("server: [not, a, map]").is_err());
    assert!(Config::from_yaml_str("server:\n  authentication: kerberos\n").is_err());
}

#[test]
fn test_config_empty_yaml_is_default() {
    let cfg = Config::from_yaml_str("  \n").unwrap();
    assert_eq!(cfg.server.listen_addr, "127.0.0.1:8080");
}

#[test]
fn test_config_rejects_zero_limits() {
    let cfg = Config::from_yaml_str("server:\n  keep_alive_timeout_secs: 0\n").unwrap();
    assert!(cfg.validate().is_err());

    let cfg = Config::from_yaml_str("server:\n  keep_alive_max: 0\n").unwrap();
    assert!(cfg.validate().is_err());
}

#[test]
fn test_config_tls_requires_paths() {
    let cfg = Config::from_yaml_str("tls:\n  enabled: true\n").unwrap();
    assert!(cfg.validate().is_err());

    let cfg = Config::from_yaml_str(
        "tls:\n  enabled: true\n  cert_path: cert.pem\n  key_path: key.pem\n  client_cert_required: true\n",
    )
    .unwrap();
    assert!(cfg.validate().is_err());

    let cfg = Config::from_yaml_str(
        "tls:\n  enabled: true\n  cert_path: cert.pem\n  key_path: key.pem\n",
    )
    .unwrap();
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_config_clone() {
    let cfg1 = Config::default();
    let cfg2 = cfg1.clone();
    assert_eq!(cfg1.server.listen_addr, cfg2.server.listen_addr);
}
