//! TOML configuration for a verification gateway.
//!
//! ```toml
//! [tree]
//! depth = 6
//! owner = "0x00000000000000000000000011223344556677889900aabbccddeeff00112233"
//!
//! [prover]
//! circuit_k = 11
//!
//! [spend]
//! root_window = 64
//! ```

use std::path::Path;

use anyhow::{ensure, Context, Result};
use primitives::{Caller, DEFAULT_DEPTH, MAX_DEPTH};
use protocol::DEFAULT_CIRCUIT_K;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tree: TreeConfig,
    #[serde(default)]
    pub prover: ProverConfig,
    #[serde(default)]
    pub spend: SpendConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeConfig {
    #[serde(default = "default_depth")]
    pub depth: usize,
    /// Only this caller may remove leaves. Anyone may when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<Caller>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProverConfig {
    #[serde(default = "default_circuit_k")]
    pub circuit_k: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendConfig {
    /// Accept proofs against roots at most this many mutations older than the
    /// current root. Every historical root is accepted when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_window: Option<u64>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self { depth: DEFAULT_DEPTH, owner: None }
    }
}

impl Default for ProverConfig {
    fn default() -> Self {
        Self { circuit_k: DEFAULT_CIRCUIT_K }
    }
}

fn default_depth() -> usize {
    DEFAULT_DEPTH
}

fn default_circuit_k() -> u32 {
    DEFAULT_CIRCUIT_K
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            (1..=MAX_DEPTH).contains(&self.tree.depth),
            "tree.depth must be in 1..={MAX_DEPTH}, got {}",
            self.tree.depth
        );
        ensure!(
            (4..=24).contains(&self.prover.circuit_k),
            "prover.circuit_k must be in 4..=24, got {}",
            self.prover.circuit_k
        );
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn load_from_file_or_default(path: &Path) -> Self {
        match Self::load_from_file(path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "using default configuration");
                Self::default()
            }
        }
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.tree.depth, 6);
        assert_eq!(config.tree.owner, None);
        assert_eq!(config.prover.circuit_k, 11);
        assert_eq!(config.spend.root_window, None);
        config.validate().unwrap();
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [spend]
            root_window = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.spend.root_window, Some(8));
        assert_eq!(config.tree.depth, DEFAULT_DEPTH);
        assert_eq!(config.prover.circuit_k, DEFAULT_CIRCUIT_K);
    }

    #[test]
    fn owner_parses_from_short_hex() {
        let config: Config = toml::from_str(
            r#"
            [tree]
            depth = 10
            owner = "0x1122"
            "#,
        )
        .unwrap();
        assert_eq!(config.tree.depth, 10);
        assert_eq!(config.tree.owner, Some(Caller::from_slice(&[0x11, 0x22]).unwrap()));
    }

    #[test]
    fn out_of_range_values_fail_validation() {
        let mut config = Config::default();
        config.tree.depth = 0;
        assert!(config.validate().is_err());
        config.tree.depth = MAX_DEPTH + 1;
        assert!(config.validate().is_err());
        config.tree.depth = 6;
        config.prover.circuit_k = 2;
        assert!(config.validate().is_err());
    }
}
