use std::{path::PathBuf, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use once_cell::sync::Lazy;
use proto::constants::MAX_NODES;
use serde::{Deserialize, Serialize};

use crate::controller::ControllerSettings;

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub id: String,
    pub listen_addrs: String,
    pub liveness_interval_secs: u64,
    pub max_nodes: u32,
    pub rereplicate_on_purge: bool,
    pub state_log_file: Option<String>,
    pub log_level: String,
    pub log_base: String,
    pub apm_endpoint: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            id: "controller".to_string(),
            listen_addrs: "0.0.0.0:6000".to_string(),
            liveness_interval_secs: 10,
            max_nodes: MAX_NODES,
            rereplicate_on_purge: true,
            state_log_file: None,
            log_level: "info".to_string(),
            log_base: "./temp/logs".to_string(),
            apm_endpoint: None,
        }
    }
}

impl From<&Config> for ControllerSettings {
    fn from(config: &Config) -> Self {
        Self {
            liveness_interval: Duration::from_secs(config.liveness_interval_secs),
            max_nodes: config.max_nodes,
            rereplicate_on_purge: config.rereplicate_on_purge,
            state_log_file: config.state_log_file.as_ref().map(PathBuf::from),
        }
    }
}

pub fn load() -> Result<Config, figment::Error> {
    let env = std::env::var("ENV").unwrap_or_else(|_| "default".to_owned());
    let config_file_path = std::env::var("CONFIG_PATH")
        .unwrap_or_else(|_| format!("./controller/config/{}.yaml", env));
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Yaml::file(config_file_path))
        .merge(Env::prefixed("CONTROLLER_"))
        .extract()
}

pub static CONFIG: Lazy<Config> = Lazy::new(|| match load() {
    Ok(config) => config,
    Err(e) => {
        eprintln!("Invalid controller configuration: {e}");
        std::process::exit(1);
    }
});
