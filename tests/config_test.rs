//! Integration tests for configuration loading

use sensor_gateway::infra::sections::Section;
use sensor_gateway::infra::{BrokerMode, Config};
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_load_config_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();

    let config_content = r#"
[site]
buildings = ["vanak", "tower"]

[gateway]
ip = "192.168.1.20"
port = 4001
building = "tower"
section = "rfid"
read_timeout_ms = 1500
keep_alive = true

[polling]
pacing_ms = 250
idle_cycle_delay_ms = 1000

[broker]
mode = "mqtt"
host = "broker.local"
port = 1883
exchange = "audit"
queue = "events"
publish_retries = 5

[directory]
file = "/etc/sensor-gateway/directory.toml"
"#;

    temp_file.write_all(config_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.buildings(), &["vanak", "tower"]);
    assert_eq!(config.gateway_ip(), Some("192.168.1.20"));
    assert_eq!(config.gateway_port(), Some(4001));
    assert_eq!(config.building(), Some("tower"));
    assert_eq!(config.section(), Section::Rfid);
    assert_eq!(config.read_timeout_ms(), 1500);
    assert_eq!(config.connect_timeout_ms(), 3000);
    assert!(config.keep_alive());
    assert_eq!(config.pacing_ms(), 250);
    assert_eq!(config.idle_cycle_delay_ms(), 1000);
    assert_eq!(config.broker_mode(), BrokerMode::Mqtt);
    assert_eq!(config.broker_host(), "broker.local");
    assert_eq!(config.broker_exchange(), "audit");
    assert_eq!(config.broker_queue(), "events");
    assert_eq!(config.publish_retries(), 5);
    assert_eq!(config.directory_file(), "/etc/sensor-gateway/directory.toml");
}

#[test]
fn test_partial_file_keeps_defaults() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[gateway]\nip = \"10.0.0.5\"\n").unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();
    assert_eq!(config.gateway_ip(), Some("10.0.0.5"));
    assert_eq!(config.gateway_port(), None);
    assert_eq!(config.read_command(), "03000A0005");
    assert_eq!(config.broker_mode(), BrokerMode::Amqp);
}

#[test]
fn test_invalid_values_rejected() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[gateway]\nmax_response_bytes = 0\n").unwrap();
    temp_file.flush().unwrap();

    assert!(Config::from_file(temp_file.path()).is_err());
}

#[test]
fn test_load_from_path_fallback() {
    let config = Config::load_from_path("/nonexistent/config.toml");
    assert_eq!(config.config_file(), "default");
    assert_eq!(config.broker_host(), "localhost");
    assert_eq!(config.broker_port(), 5672);
    assert_eq!(config.broker_mode(), BrokerMode::Amqp);
}
