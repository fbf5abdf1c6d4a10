//! Bootstrap configuration for iCoach services
//!
//! Configuration is resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Steps 1 and 2 are handled by the binary's argument parser; this module owns
//! the TOML schema, its defaults, and validation. A missing TOML file is not an
//! error: the service starts on compiled defaults and logs a warning.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Tolerance used when checking that score weights sum to 1.0
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub worker_pool: WorkerPoolConfig,

    #[serde(default)]
    pub segmenter: SegmenterConfig,

    #[serde(default)]
    pub scoring: ScoringWeights,

    #[serde(default)]
    pub dialogue: DialogueConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Question dataset (JSON). Built-in dataset is used when unset.
    #[serde(default)]
    pub questions_path: Option<PathBuf>,
}

/// HTTP/WebSocket listener
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

/// SQLite session store
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Shared blocking-work pool
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct WorkerPoolConfig {
    #[serde(default = "default_pool_size")]
    pub size: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            size: default_pool_size(),
        }
    }
}

/// Utterance segmentation thresholds
///
/// Sample counts assume the 16 kHz mono stream the web client records.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct SegmenterConfig {
    /// Chunks louder than this count as speech (dBFS)
    #[serde(default = "default_speech_threshold_db")]
    pub speech_threshold_db: f32,

    /// Consecutive quiet chunks that end an utterance
    #[serde(default = "default_silence_run_limit")]
    pub silence_run_limit: u32,

    /// Shortest buffer worth transcribing on a silence boundary
    #[serde(default = "default_min_utterance_samples")]
    pub min_utterance_samples: usize,

    /// Soft cap: flush regardless of silence once reached
    #[serde(default = "default_forced_flush_samples")]
    pub forced_flush_samples: usize,

    /// Hard cap: buffer is discarded if an append would exceed it
    #[serde(default = "default_max_buffer_samples")]
    pub max_buffer_samples: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            speech_threshold_db: default_speech_threshold_db(),
            silence_run_limit: default_silence_run_limit(),
            min_utterance_samples: default_min_utterance_samples(),
            forced_flush_samples: default_forced_flush_samples(),
            max_buffer_samples: default_max_buffer_samples(),
        }
    }
}

/// Live composite score weighting
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct ScoringWeights {
    #[serde(default = "default_non_verbal_weight")]
    pub non_verbal: f64,
    #[serde(default = "default_vocal_weight")]
    pub vocal: f64,
    #[serde(default = "default_keyword_weight")]
    pub keyword: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            non_verbal: default_non_verbal_weight(),
            vocal: default_vocal_weight(),
            keyword: default_keyword_weight(),
        }
    }
}

impl ScoringWeights {
    /// Weights must be non-negative and sum to 1.0
    pub fn validate(&self) -> Result<()> {
        let weights = [self.non_verbal, self.vocal, self.keyword];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::Config(format!(
                "Score weights must be non-negative: {:?}",
                self
            )));
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(Error::Config(format!(
                "Score weights must sum to 1.0 (got {})",
                sum
            )));
        }
        Ok(())
    }
}

/// Dialogue policy
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DialogueConfig {
    /// Maximum résumé-derived questions per session
    #[serde(default = "default_resume_quota")]
    pub resume_quota: usize,

    /// Joined transcript must be longer than this before keyword scoring runs
    #[serde(default = "default_keyword_min_transcript_chars")]
    pub keyword_min_transcript_chars: usize,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            resume_quota: default_resume_quota(),
            keyword_min_transcript_chars: default_keyword_min_transcript_chars(),
        }
    }
}

/// External model/provider endpoints
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub transcription: TranscriptionConfig,

    #[serde(default)]
    pub tts: TtsConfig,

    #[serde(default)]
    pub video: VideoConfig,
}

/// OpenAI-compatible chat completions endpoint
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            api_key: None,
        }
    }
}

/// OpenAI-compatible speech-to-text endpoint
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TranscriptionConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_transcription_model")]
    pub model: String,
    /// Falls back to the LLM key when unset
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_transcription_model(),
            api_key: None,
        }
    }
}

/// Piper text-to-speech
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct TtsConfig {
    #[serde(default)]
    pub piper_binary: Option<PathBuf>,
    #[serde(default)]
    pub voice_model: Option<PathBuf>,
}

/// Remote facial-emotion service
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct VideoConfig {
    #[serde(default)]
    pub emotion_endpoint: Option<String>,
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("icoach").join("icoach.db"))
        .unwrap_or_else(|| PathBuf::from("./icoach_data/icoach.db"))
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_pool_size() -> usize {
    3
}

fn default_speech_threshold_db() -> f32 {
    -40.0
}

fn default_silence_run_limit() -> u32 {
    3
}

fn default_min_utterance_samples() -> usize {
    8_000 // 0.5s at 16 kHz
}

fn default_forced_flush_samples() -> usize {
    240_000 // 15s at 16 kHz
}

fn default_max_buffer_samples() -> usize {
    480_000 // 30s at 16 kHz
}

fn default_non_verbal_weight() -> f64 {
    0.4
}

fn default_vocal_weight() -> f64 {
    0.2
}

fn default_keyword_weight() -> f64 {
    0.4
}

fn default_resume_quota() -> usize {
    2
}

fn default_keyword_min_transcript_chars() -> usize {
    50
}

fn default_llm_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_llm_model() -> String {
    "llama3-8b-8192".to_string()
}

fn default_transcription_model() -> String {
    "whisper-large-v3".to_string()
}

impl TomlConfig {
    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        self.scoring.validate()?;

        if self.worker_pool.size == 0 {
            return Err(Error::Config("worker_pool.size must be at least 1".to_string()));
        }

        let seg = &self.segmenter;
        if seg.forced_flush_samples >= seg.max_buffer_samples {
            return Err(Error::Config(format!(
                "segmenter.forced_flush_samples ({}) must be below max_buffer_samples ({})",
                seg.forced_flush_samples, seg.max_buffer_samples
            )));
        }
        if seg.silence_run_limit == 0 {
            return Err(Error::Config("segmenter.silence_run_limit must be at least 1".to_string()));
        }

        Ok(())
    }
}

/// Default TOML location: `<config_dir>/icoach/<module>.toml`
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("icoach").join(format!("{}.toml", module_name)))
}

/// Parse and validate a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    config.validate()?;
    Ok(config)
}

/// Load the TOML config if present, otherwise compiled defaults
///
/// An explicitly requested path must exist; the implicit default path may be
/// missing.
pub fn load_or_default(explicit: Option<&Path>, module_name: &str) -> Result<TomlConfig> {
    if let Some(path) = explicit {
        info!("Loading config from {}", path.display());
        return load_toml_config(path);
    }

    match default_config_path(module_name) {
        Some(path) if path.exists() => {
            info!("Loading config from {}", path.display());
            load_toml_config(&path)
        }
        Some(path) => {
            warn!("No config file at {}, using compiled defaults", path.display());
            Ok(TomlConfig::default())
        }
        None => {
            warn!("Could not determine config directory, using compiled defaults");
            Ok(TomlConfig::default())
        }
    }
}
