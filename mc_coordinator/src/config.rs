//! Coordinator application configuration, loaded from TOML at startup.

use std::path::PathBuf;

use serde::Deserialize;

use mc_common::config::{load_toml, ConfigError, SharedConfig};
use mc_common::consts::{
    DEFAULT_MAX_LOOP_TIME_S, DEFAULT_MAX_PREPLAN_TIME_S, DEFAULT_PREPLAN_THREADS,
};

#[derive(Debug, Clone, Deserialize)]
pub struct SerialConfig {
    pub port: String,
    #[serde(default = "default_baud")]
    pub baud: u32,
}

fn default_baud() -> u32 {
    230_400
}

#[derive(Debug, Clone, Deserialize)]
pub struct I2cConfig {
    pub bus_path: PathBuf,
    pub address: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreplannerConfig {
    #[serde(default = "default_threads")]
    pub threads: usize,
    #[serde(default = "default_max_preplan_time")]
    pub max_preplan_time_s: f64,
    #[serde(default = "default_max_loop_time")]
    pub max_loop_time_s: f64,
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    #[serde(default = "default_plans_dir")]
    pub plans_dir: PathBuf,
    #[serde(default = "default_meta_dir")]
    pub meta_dir: PathBuf,
}

fn default_threads() -> usize {
    DEFAULT_PREPLAN_THREADS
}
fn default_max_preplan_time() -> f64 {
    DEFAULT_MAX_PREPLAN_TIME_S
}
fn default_max_loop_time() -> f64 {
    DEFAULT_MAX_LOOP_TIME_S
}
fn default_upload_dir() -> PathBuf {
    PathBuf::from("upload")
}
fn default_plans_dir() -> PathBuf {
    PathBuf::from("plans")
}
fn default_meta_dir() -> PathBuf {
    PathBuf::from("meta")
}

impl Default for PreplannerConfig {
    fn default() -> Self {
        PreplannerConfig {
            threads: default_threads(),
            max_preplan_time_s: default_max_preplan_time(),
            max_loop_time_s: default_max_loop_time(),
            upload_dir: default_upload_dir(),
            plans_dir: default_plans_dir(),
            meta_dir: default_meta_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(flatten)]
    pub shared: SharedConfig,
    pub serial: SerialConfig,
    pub i2c: I2cConfig,
    #[serde(default)]
    pub preplanner: PreplannerConfig,
}

impl AppConfig {
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        load_toml(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_minimal_config_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [serial]
            port = "/dev/ttyACM0"

            [i2c]
            bus_path = "/dev/i2c-1"
            address = 82
            "#
        )
        .unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.serial.baud, 230_400);
        assert_eq!(config.preplanner.threads, DEFAULT_PREPLAN_THREADS);
        assert_eq!(config.i2c.address, 82);
    }
}
