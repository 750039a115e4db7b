use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chord::node::NodeSettings;
use crate::chord::types::MAX_RING_BITS;
use crate::chord::{
    CHECK_PREDECESSOR_INTERVAL_MS, FIX_FINGERS_INTERVAL_MS, MAX_INTERVAL_MS, MAX_STEPS, MAX_SUCCESSOR_LIST_SIZE,
    STABILIZE_INTERVAL_MS, SUCCESSOR_LIST_SIZE,
};
use crate::error::ConfigError;

const MAX_LABEL_LEN: usize = 40;

/// Startup parameters of one node.
///
/// Exactly one of `ring_bits` (create a ring) and `bootstrap` (join one) must
/// be set.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeConfig {
    pub host: String,
    /// 0 picks a free port.
    pub port: u16,
    pub ring_bits: Option<u32>,
    pub bootstrap: Option<String>,
    pub successor_list_size: usize,
    pub stabilize_interval_ms: u64,
    pub fix_fingers_interval_ms: u64,
    pub check_predecessor_interval_ms: u64,
    pub label: String,
    pub data_dir: PathBuf,
    pub max_steps: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            ring_bits: None,
            bootstrap: None,
            successor_list_size: SUCCESSOR_LIST_SIZE,
            stabilize_interval_ms: STABILIZE_INTERVAL_MS,
            fix_fingers_interval_ms: FIX_FINGERS_INTERVAL_MS,
            check_predecessor_interval_ms: CHECK_PREDECESSOR_INTERVAL_MS,
            label: String::new(),
            data_dir: PathBuf::from("data"),
            max_steps: MAX_STEPS,
        }
    }
}

impl NodeConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: NodeConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".into()));
        }
        match (self.ring_bits, &self.bootstrap) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::Invalid(
                    "ring_bits and bootstrap are mutually exclusive".into(),
                ))
            }
            (None, None) => {
                return Err(ConfigError::Invalid(
                    "either ring_bits (create) or bootstrap (join) is required".into(),
                ))
            }
            (Some(bits), None) if bits == 0 || bits > MAX_RING_BITS => {
                return Err(ConfigError::Invalid(format!(
                    "ring_bits must be in [1, {}], got {}",
                    MAX_RING_BITS, bits
                )))
            }
            (None, Some(bootstrap)) if bootstrap.is_empty() => {
                return Err(ConfigError::Invalid("bootstrap address must not be empty".into()))
            }
            _ => {}
        }
        if !(1..=MAX_SUCCESSOR_LIST_SIZE).contains(&self.successor_list_size) {
            return Err(ConfigError::Invalid(format!(
                "successor_list_size must be in [1, {}], got {}",
                MAX_SUCCESSOR_LIST_SIZE, self.successor_list_size
            )));
        }
        for (name, value) in [
            ("stabilize_interval_ms", self.stabilize_interval_ms),
            ("fix_fingers_interval_ms", self.fix_fingers_interval_ms),
            ("check_predecessor_interval_ms", self.check_predecessor_interval_ms),
        ] {
            if !(1..=MAX_INTERVAL_MS).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be in [1, {}], got {}",
                    name, MAX_INTERVAL_MS, value
                )));
            }
        }
        if self.label.len() > MAX_LABEL_LEN || !self.label.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::Invalid(format!(
                "label must be at most {} ASCII letters or digits, got {:?}",
                MAX_LABEL_LEN, self.label
            )));
        }
        if self.max_steps == 0 {
            return Err(ConfigError::Invalid("max_steps must be at least 1".into()));
        }
        Ok(())
    }

    /// Address the server binds to.
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn settings(&self) -> NodeSettings {
        NodeSettings {
            label: self.label.clone(),
            successor_list_size: self.successor_list_size,
            stabilize_interval: Duration::from_millis(self.stabilize_interval_ms),
            fix_fingers_interval: Duration::from_millis(self.fix_fingers_interval_ms),
            check_predecessor_interval: Duration::from_millis(self.check_predecessor_interval_ms),
            max_steps: self.max_steps,
        }
    }
}
