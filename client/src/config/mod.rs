use std::{path::PathBuf, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::client::ClientSettings;

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub id: String,
    pub controller_addrs: String,
    pub listen_addrs: String,
    pub output_dir: String,
    pub reply_timeout_secs: u64,
    pub log_level: String,
    pub log_base: String,
    pub apm_endpoint: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            id: "client_0".to_string(),
            controller_addrs: "127.0.0.1:6000".to_string(),
            listen_addrs: "0.0.0.0:0".to_string(),
            output_dir: "./temp/client/output".to_string(),
            reply_timeout_secs: 30,
            log_level: "info".to_string(),
            log_base: "./temp/logs".to_string(),
            apm_endpoint: None,
        }
    }
}

impl From<&Config> for ClientSettings {
    fn from(config: &Config) -> Self {
        Self {
            output_dir: PathBuf::from(&config.output_dir),
            reply_timeout: Duration::from_secs(config.reply_timeout_secs),
        }
    }
}

pub fn load() -> Result<Config, figment::Error> {
    let env = std::env::var("ENV").unwrap_or_else(|_| "default".to_owned());
    // giving default path to root of binary
    let config_file_path =
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| format!("./client/config/{}.yaml", env));
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Yaml::file(config_file_path))
        .merge(Env::prefixed("CLIENT_"))
        .extract()
}

pub static CONFIG: Lazy<Config> = Lazy::new(|| match load() {
    Ok(config) => config,
    Err(e) => {
        eprintln!("Invalid client configuration: {e}");
        std::process::exit(1);
    }
});
