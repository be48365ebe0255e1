use std::{path::PathBuf, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::chunk_server::ChunkServerSettings;

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub id: String,
    pub controller_addrs: String,
    pub listen_addrs: String,
    pub chunk_dir: String,
    pub major_heartbeat_secs: u64,
    pub minor_heartbeat_secs: u64,
    pub registration_timeout_secs: u64,
    pub log_level: String,
    pub log_base: String,
    pub apm_endpoint: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            controller_addrs: "127.0.0.1:6000".to_string(),
            listen_addrs: "0.0.0.0:0".to_string(),
            chunk_dir: "./temp/chunkserver/chunks".to_string(),
            major_heartbeat_secs: 300,
            minor_heartbeat_secs: 30,
            registration_timeout_secs: 10,
            log_level: "info".to_string(),
            log_base: "./temp/logs".to_string(),
            apm_endpoint: None,
        }
    }
}

impl From<&Config> for ChunkServerSettings {
    fn from(config: &Config) -> Self {
        Self {
            id: config.id.clone(),
            chunk_dir: PathBuf::from(&config.chunk_dir),
            major_heartbeat: Duration::from_secs(config.major_heartbeat_secs),
            minor_heartbeat: Duration::from_secs(config.minor_heartbeat_secs),
            registration_timeout: Duration::from_secs(config.registration_timeout_secs),
        }
    }
}

pub fn load() -> Result<Config, figment::Error> {
    let env = std::env::var("ENV").unwrap_or_else(|_| "default".to_owned());
    let config_file_path = std::env::var("CONFIG_PATH")
        .unwrap_or_else(|_| format!("./chunkserver/config/{}.yaml", env));
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Yaml::file(config_file_path))
        .merge(Env::prefixed("CHUNKSERVER_"))
        .extract()
}

pub static CONFIG: Lazy<Config> = Lazy::new(|| match load() {
    Ok(config) => config,
    Err(e) => {
        eprintln!("Invalid chunk server configuration: {e}");
        std::process::exit(1);
    }
});
