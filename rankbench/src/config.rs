//! Configuration loading from rankbench.toml
//!
//! RankBench settings can live in a `rankbench.toml` file in the project root.
//! The file is discovered by walking up from the current directory; every
//! section is optional and falls back to its defaults.

use anyhow::Context;
use rankbench_core::RefineConfig;
use rankbench_store::{Cache, Codec, DirBackend, JsonCodec, StoreError, TomlCodec};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File name looked up by [`RankConfig::discover`]
pub const CONFIG_FILE: &str = "rankbench.toml";

/// RankBench configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RankConfig {
    /// Refinement parameters
    #[serde(default)]
    pub refiner: RefineConfig,
    /// Repeat-count calibration
    #[serde(default)]
    pub tuning: TuningConfig,
    /// Persisted estimates
    #[serde(default)]
    pub store: StoreConfig,
    /// Static tags merged into every result record
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Repeat-count calibration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningConfig {
    /// Wall-time budget per trial sample (e.g., "100ms", "1s")
    #[serde(default = "default_budget")]
    pub budget: String,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            budget: default_budget(),
        }
    }
}

fn default_budget() -> String {
    "100ms".to_string()
}

/// Serialization format of stored estimates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StoreCodec {
    /// Pretty JSON (default)
    #[default]
    Json,
    /// TOML tables
    Toml,
}

impl Codec for StoreCodec {
    fn extension(&self) -> &'static str {
        match self {
            StoreCodec::Json => JsonCodec.extension(),
            StoreCodec::Toml => TomlCodec.extension(),
        }
    }

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, StoreError> {
        match self {
            StoreCodec::Json => JsonCodec.encode(value),
            StoreCodec::Toml => TomlCodec.encode(value),
        }
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, StoreError> {
        match self {
            StoreCodec::Json => JsonCodec.decode(bytes),
            StoreCodec::Toml => TomlCodec.decode(bytes),
        }
    }
}

/// Persisted estimates configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory for session data
    #[serde(default = "default_store_dir")]
    pub directory: String,
    /// Codec: "json" or "toml"
    #[serde(default)]
    pub codec: StoreCodec,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            directory: default_store_dir(),
            codec: StoreCodec::default(),
        }
    }
}

fn default_store_dir() -> String {
    "target/rankbench".to_string()
}

impl StoreConfig {
    /// Open a directory-backed cache with the configured codec
    pub fn open(&self) -> Cache<DirBackend, StoreCodec> {
        Cache::new(DirBackend::new(PathBuf::from(&self.directory)), self.codec)
    }
}

impl RankConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Try to discover and load configuration by walking up from current directory
    pub fn discover() -> Option<Self> {
        let mut dir = std::env::current_dir().ok()?;
        loop {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.exists() {
                return Self::load(&config_path).ok();
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }

    /// Check every section
    pub fn validate(&self) -> anyhow::Result<()> {
        self.refiner.validate()?;
        Self::parse_duration(&self.tuning.budget).context("invalid [tuning] budget")?;
        if self.store.directory.trim().is_empty() {
            anyhow::bail!("[store] directory must not be empty");
        }
        Ok(())
    }

    /// Tuning budget in nanoseconds
    pub fn budget_nanos(&self) -> anyhow::Result<u64> {
        Self::parse_duration(&self.tuning.budget)
    }

    /// Open the configured estimate store
    pub fn open_store(&self) -> Cache<DirBackend, StoreCodec> {
        self.store.open()
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# RankBench Configuration

[refiner]
# Rounds before any stopping check
n_min = 10
# Hard cap on rounds (observations per candidate)
n_max = 100
# Relative half-width every candidate must reach
rtol = 0.05
# One-sided tail probability of the confidence intervals
tail_probability = 0.01
# Base seed of the common random stream
seed = 6840387351076585199
# Stand-in for a mean of exactly zero (uncomment to enable)
# zero_mean_floor = 1e-9

[tuning]
# Wall-time budget of one trial sample
budget = "100ms"

[store]
# Root directory for persisted estimates
directory = "target/rankbench"
# Codec: json or toml
codec = "json"

[metadata]
# Tags merged into every result record
# host = "ci-runner-3"
"#
        .to_string()
    }

    /// Parse duration string (e.g., "3s", "500ms", "2m") to nanoseconds
    pub fn parse_duration(s: &str) -> anyhow::Result<u64> {
        let s = s.trim();
        if s.is_empty() {
            anyhow::bail!("empty duration string");
        }

        let (num_part, unit_part) = s
            .char_indices()
            .find(|(_, c)| c.is_alphabetic())
            .map(|(i, _)| s.split_at(i))
            .unwrap_or((s, "s"));

        let value: f64 = num_part
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid duration number: {}", num_part))?;
        if !value.is_finite() || value < 0.0 {
            anyhow::bail!("duration must be finite and non-negative: {}", s);
        }

        let multiplier: u64 = match unit_part.to_lowercase().as_str() {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" | "min" => 60_000_000_000,
            _ => anyhow::bail!("unknown duration unit: {}", unit_part),
        };

        Ok((value * multiplier as f64) as u64)
    }
}
