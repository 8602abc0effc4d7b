//! Layered configuration: defaults, optional file, environment, CLI flags.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;

/// Command-line interface. Flags override every other configuration source.
#[derive(Debug, Parser)]
#[command(
    name = "vitals-sink",
    about = "Diagnostic HTTP endpoint that logs vitals payloads uploaded by devices."
)]
pub struct Options {
    /// Address to bind.
    #[arg(long)]
    pub host: Option<String>,

    /// TCP port to listen on.
    #[arg(long)]
    pub port: Option<u16>,

    /// Path to a configuration file (TOML).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub http: HttpConfig,
    pub performance: PerformanceConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    pub log_file: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    pub max_body_size: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive_timeout: u64,
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub max_connections: Option<u64>,
}

impl Config {
    pub fn load(options: &Options) -> Result<Self, config::ConfigError> {
        let file = options.config.as_ref().map_or_else(
            || config::File::with_name("vitals-sink").required(false),
            |path| config::File::from(path.clone()).required(true),
        );

        let settings = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("http.server_name", "vitals-sink/0.1")?
            .set_default("http.max_body_size", 1_048_576)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .add_source(file)
            .add_source(config::Environment::with_prefix("VITALS").separator("__"))
            .build()?;

        let mut cfg: Self = settings.try_deserialize()?;
        if let Some(host) = &options.host {
            cfg.server.host.clone_from(host);
        }
        if let Some(port) = options.port {
            cfg.server.port = port;
        }
        Ok(cfg)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|err| format!("Invalid bind address: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_file_or_flags() {
        let options = Options::parse_from(["vitals-sink"]);
        let cfg = Config::load(&options).unwrap();
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.server.workers, None);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.logging.access_log);
        assert_eq!(cfg.http.max_body_size, 1_048_576);
        assert_eq!(cfg.performance.max_connections, None);
    }

    #[test]
    fn cli_flags_override_defaults() {
        let options =
            Options::parse_from(["vitals-sink", "--host", "127.0.0.1", "--port", "9000"]);
        let cfg = Config::load(&options).unwrap();
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.socket_addr().unwrap().port(), 9000);
    }

    #[test]
    fn socket_addr_rejects_garbage_host() {
        let options = Options::parse_from(["vitals-sink", "--host", "not an address"]);
        let cfg = Config::load(&options).unwrap();
        assert!(cfg.socket_addr().is_err());
    }
}
