use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use asklegal_core::{CoreError, Result};
use asklegal_index::FilterSpec;

use crate::calculation::{RateTable, DEFAULT_RATE_TABLE};

pub const CONFIG_ENV: &str = "ASKLEGAL_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "asklegal.toml";

/// Process-wide configuration, loaded once and shared read-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub retrieval: RetrievalConfig,
    pub privacy: PrivacyConfig,
    pub routing: RoutingConfig,
    pub rate_tables: RatesConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub vector_weight: f32,
    pub keyword_weight: f32,
    pub candidate_multiplier: usize,
    pub signal_timeout_ms: u64,
    pub context_budget_chars: usize,
    pub filter: FilterSpec,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            vector_weight: 0.6,
            keyword_weight: 0.4,
            candidate_multiplier: 3,
            signal_timeout_ms: 300,
            context_budget_chars: 4_000,
            filter: FilterSpec::default(),
        }
    }
}

impl RetrievalConfig {
    pub fn signal_timeout(&self) -> Duration {
        Duration::from_millis(self.signal_timeout_ms)
    }

    pub fn candidate_count(&self, top_k: usize) -> usize {
        top_k.saturating_mul(self.candidate_multiplier.max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemotePolicy {
    /// SENSITIVE queries never leave the process; they are answered locally.
    #[default]
    ForceLocal,
    /// SENSITIVE queries may go remote, carrying only the redacted text.
    Redact,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivacyConfig {
    pub sensitivity_keywords: Vec<String>,
    pub remote_policy: RemotePolicy,
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        let keywords = [
            "criminal",
            "arrest",
            "fir",
            "bail",
            "police",
            "litigation",
            "lawsuit",
            "court case",
            "health",
            "medical",
            "divorce",
            "harassment",
            "fraud",
            "insolvency",
        ];
        Self {
            sensitivity_keywords: keywords.iter().map(|k| k.to_string()).collect(),
            remote_policy: RemotePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub complexity_threshold: f32,
    pub local_context_chars: usize,
    pub local_max_passages: usize,
    pub local_max_tokens: u32,
    pub remote_max_tokens: u32,
    pub local_timeout_ms: u64,
    pub remote_timeout_ms: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            complexity_threshold: 0.6,
            local_context_chars: 800,
            local_max_passages: 1,
            local_max_tokens: 512,
            remote_max_tokens: 2_048,
            local_timeout_ms: 10_000,
            remote_timeout_ms: 30_000,
        }
    }
}

impl RoutingConfig {
    pub fn local_timeout(&self) -> Duration {
        Duration::from_millis(self.local_timeout_ms)
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatesConfig {
    pub default_version: String,
    pub tables: Vec<RateTable>,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            default_version: DEFAULT_RATE_TABLE.to_string(),
            tables: vec![RateTable::fy2024_25()],
        }
    }
}

impl CoreConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: CoreConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads the TOML file at `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_env() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(Path::new(&path))
    }

    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        if r.top_k == 0 {
            return Err(CoreError::Config("retrieval.top_k must be positive".into()));
        }
        if r.candidate_multiplier == 0 {
            return Err(CoreError::Config(
                "retrieval.candidate_multiplier must be positive".into(),
            ));
        }
        let weights_ok = r.vector_weight.is_finite()
            && r.keyword_weight.is_finite()
            && r.vector_weight >= 0.0
            && r.keyword_weight >= 0.0
            && r.vector_weight + r.keyword_weight > 0.0;
        if !weights_ok {
            return Err(CoreError::Config(
                "retrieval weights must be non-negative and not both zero".into(),
            ));
        }
        if r.context_budget_chars == 0 {
            return Err(CoreError::Config(
                "retrieval.context_budget_chars must be positive".into(),
            ));
        }

        let routing = &self.routing;
        if !(0.0..=1.0).contains(&routing.complexity_threshold) {
            return Err(CoreError::Config(
                "routing.complexity_threshold must be within [0, 1]".into(),
            ));
        }
        if routing.local_context_chars == 0 || routing.local_max_passages == 0 {
            return Err(CoreError::Config("routing local budget must be positive".into()));
        }
        if routing.local_context_chars > r.context_budget_chars {
            return Err(CoreError::Config(
                "routing.local_context_chars exceeds retrieval.context_budget_chars".into(),
            ));
        }
        if routing.local_max_tokens == 0 || routing.remote_max_tokens == 0 {
            return Err(CoreError::Config("routing max_tokens must be positive".into()));
        }

        let mut versions = BTreeSet::new();
        for table in &self.rate_tables.tables {
            table.validate()?;
            if !versions.insert(table.version.as_str()) {
                return Err(CoreError::Config(format!(
                    "duplicate rate table version {}",
                    table.version
                )));
            }
        }
        if !versions.contains(self.rate_tables.default_version.as_str()) {
            return Err(CoreError::UnknownRateTable(
                self.rate_tables.default_version.clone(),
            ));
        }
        Ok(())
    }
}
