//! SolverLoop configuration types and loading

use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::eval::ScriptLanguage;
use crate::r#loop::AttemptBudget;

/// Main SolverLoop configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Candidate evaluation settings
    pub evaluation: EvaluationConfig,

    /// Debug/plan ceilings
    pub iteration: IterationConfig,

    /// Repair feedback limits
    pub feedback: FeedbackConfig,

    /// Prompt template overrides
    pub prompts: PromptsConfig,
}

impl Config {
    /// Reject settings that would make the solve loop meaningless
    pub fn validate(&self) -> Result<()> {
        if provider_defaults(&self.llm.provider).is_none() {
            return Err(eyre!(
                "llm.provider '{}' is not supported (expected openai or anthropic)",
                self.llm.provider
            ));
        }
        if self.iteration.k_debug == 0 {
            return Err(eyre!("iteration.k-debug must be at least 1"));
        }
        if self.iteration.t_plan == 0 {
            return Err(eyre!("iteration.t-plan must be at least 1"));
        }
        if self.evaluation.case_timeout_ms == 0 {
            return Err(eyre!("evaluation.case-timeout-ms must be greater than 0"));
        }
        if self.feedback.max_failed_cases == 0 {
            return Err(eyre!("feedback.max-failed-cases must be at least 1"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::search_paths() {
            if candidate.exists() {
                match Self::load_from_file(&candidate) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", candidate.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialised
    ///
    /// Never fails; an unreadable config simply yields `None`.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let paths: Vec<PathBuf> = match config_path {
            Some(path) => vec![path.clone()],
            None => Self::search_paths(),
        };

        #[derive(Deserialize)]
        struct LogLevelOnly {
            #[serde(rename = "log-level")]
            log_level: Option<String>,
        }

        paths
            .iter()
            .filter(|p| p.exists())
            .filter_map(|p| fs::read_to_string(p).ok())
            .filter_map(|content| serde_yaml::from_str::<LogLevelOnly>(&content).ok())
            .find_map(|c| c.log_level)
    }

    /// Project-local config, then the user config directory
    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".solverloop.yml")];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("solverloop").join("solverloop.yml"));
        }
        paths
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Defaults that depend on the provider
struct ProviderDefaults {
    model: &'static str,
    api_key_env: &'static str,
    base_url: &'static str,
}

fn provider_defaults(provider: &str) -> Option<ProviderDefaults> {
    match provider {
        "openai" => Some(ProviderDefaults {
            model: "gpt-4o-mini",
            api_key_env: "OPENAI_API_KEY",
            base_url: "https://api.openai.com",
        }),
        "anthropic" => Some(ProviderDefaults {
            model: "claude-sonnet-4-20250514",
            api_key_env: "ANTHROPIC_API_KEY",
            base_url: "https://api.anthropic.com",
        }),
        _ => None,
    }
}

/// LLM provider configuration
///
/// `model`, `api-key-env` and `base-url` fall back to the provider's own
/// defaults when unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name ("openai" or "anthropic")
    pub provider: String,

    /// Model identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env", skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// API base URL
    #[serde(rename = "base-url", skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl LlmConfig {
    fn resolve<'a>(&'a self, set: &'a Option<String>, pick: fn(&ProviderDefaults) -> &'static str) -> &'a str {
        match set {
            Some(value) => value.as_str(),
            None => provider_defaults(&self.provider).map(|d| pick(&d)).unwrap_or_default(),
        }
    }

    pub fn model(&self) -> &str {
        self.resolve(&self.model, |d| d.model)
    }

    pub fn api_key_env(&self) -> &str {
        self.resolve(&self.api_key_env, |d| d.api_key_env)
    }

    pub fn base_url(&self) -> &str {
        self.resolve(&self.base_url, |d| d.base_url)
    }

    /// Copy with every provider default written out
    pub fn with_provider_defaults(&self) -> Self {
        Self {
            model: Some(self.model().to_string()),
            api_key_env: Some(self.api_key_env().to_string()),
            base_url: Some(self.base_url().to_string()),
            ..self.clone()
        }
    }

    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        let var = self.api_key_env();
        std::env::var(var).map_err(|_| eyre!("LLM API key not found. Set the {} environment variable.", var))
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: None,
            api_key_env: None,
            base_url: None,
            max_tokens: 4096,
            timeout_ms: 300_000,
        }
    }
}

/// Candidate evaluation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Language candidates are written in
    pub language: ScriptLanguage,

    /// Interpreter program override (defaults per language)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<String>,

    /// Per-case time limit in milliseconds
    #[serde(rename = "case-timeout-ms")]
    pub case_timeout_ms: u64,

    /// Time limit for loading a candidate in milliseconds
    #[serde(rename = "load-timeout-ms")]
    pub load_timeout_ms: u64,
}

impl EvaluationConfig {
    pub fn case_timeout(&self) -> Duration {
        Duration::from_millis(self.case_timeout_ms)
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            language: ScriptLanguage::Python,
            interpreter: None,
            case_timeout_ms: 3_000,
            load_timeout_ms: 10_000,
        }
    }
}

/// Debug/plan ceilings for the solve loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IterationConfig {
    /// Debug attempts allowed (per plan or shared, see `budget`)
    #[serde(rename = "k-debug")]
    pub k_debug: u32,

    /// Plans to try at most
    #[serde(rename = "t-plan")]
    pub t_plan: u32,

    pub budget: AttemptBudget,
}

impl Default for IterationConfig {
    fn default() -> Self {
        Self {
            k_debug: 3,
            t_plan: 3,
            budget: AttemptBudget::PerPlan,
        }
    }
}

/// Repair feedback limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    /// Failed cases shown to the repairer at most
    #[serde(rename = "max-failed-cases")]
    pub max_failed_cases: usize,

    /// Characters per field before truncation
    #[serde(rename = "display-limit")]
    pub display_limit: usize,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            max_failed_cases: 10,
            display_limit: 80,
        }
    }
}

/// Prompt template overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    /// Directory searched for `<name>.pmt` before the built-in templates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}
