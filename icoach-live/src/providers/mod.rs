//! External collaborators consumed by the live session
//!
//! Every model-bound or network-bound capability sits behind a small
//! synchronous trait. Calls are made from worker-pool threads, never from a
//! session's async loop. Each trait has an always-available fallback, and the
//! concrete implementation is chosen once at startup by [`select`].

pub mod dataset;
pub mod keyword;
pub mod llm;
pub mod semantic;
pub mod transcription;
pub mod tts;
pub mod video;
pub mod vocal;

use icoach_common::config::TomlConfig;
use icoach_common::models::{KeywordResult, Question, VideoResult, VocalResult};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Classifier answer when the text names no known branch
pub const UNKNOWN_BRANCH: &str = "UNKNOWN";

/// Provider call failure
///
/// Never escapes a session: call sites convert it into a neutral reading or a
/// fallback path.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Startup availability probe shared by all providers
pub trait Probe {
    /// Short identifier used in logs and /health
    fn name(&self) -> &'static str;

    /// Whether the backend can serve calls. Checked once, at startup.
    fn available(&self) -> bool {
        true
    }
}

/// Ordered question sets per branch
pub trait QuestionProvider: Probe + Send + Sync {
    /// Branch identifiers the dataset knows about
    fn branches(&self) -> Vec<String>;

    fn questions(&self, branch: &str) -> Result<Vec<Question>, ProviderError>;
}

/// Classifier verdict: a branch id or [`UNKNOWN_BRANCH`]
#[derive(Debug, Clone, PartialEq)]
pub struct BranchGuess {
    pub branch: String,
    pub confidence: f64,
}

impl BranchGuess {
    pub fn unknown() -> Self {
        Self {
            branch: UNKNOWN_BRANCH.to_string(),
            confidence: 0.0,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.branch.eq_ignore_ascii_case(UNKNOWN_BRANCH)
    }
}

pub trait BranchClassifier: Probe + Send + Sync {
    fn classify(&self, text: &str, known_branches: &[String]) -> Result<BranchGuess, ProviderError>;
}

/// Question synthesized from a résumé excerpt
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedQuestion {
    pub text: String,
    pub ideal_answer: String,
}

pub trait QuestionGenerator: Probe + Send + Sync {
    fn generate(&self, resume_excerpt: &str) -> Result<GeneratedQuestion, ProviderError>;
}

/// Speech to text. An empty string is a valid result for silence or noise.
pub trait Transcriber: Probe + Send + Sync {
    fn transcribe(&self, samples: &[f32], sample_rate: u32) -> Result<String, ProviderError>;
}

/// Reads one compressed image. Confidence is reported on the 0-100 scale.
pub trait VideoEmotionAnalyzer: Probe + Send + Sync {
    fn analyze(&self, frame: &[u8]) -> Result<VideoResult, ProviderError>;
}

/// Reads decoded mono samples
pub trait VocalFeatureAnalyzer: Probe + Send + Sync {
    fn analyze(&self, samples: &[f32], sample_rate: u32) -> Result<VocalResult, ProviderError>;
}

pub trait KeywordScorer: Probe + Send + Sync {
    fn score(&self, text: &str, domain: &str) -> Result<KeywordResult, ProviderError>;
}

/// Similarity between an answer and its ideal answer, 0-100
pub trait SemanticScorer: Probe + Send + Sync {
    fn similarity(&self, answer: &str, ideal_answer: &str) -> Result<f64, ProviderError>;
}

/// Text to audio bytes. Empty output means nothing to play.
pub trait SpeechSynthesizer: Probe + Send + Sync {
    fn synthesize(&self, text: &str) -> Result<Vec<u8>, ProviderError>;
}

/// Pick `primary` if its probe succeeds, otherwise `fallback`
pub fn select<T: ?Sized + Probe>(capability: &str, primary: Arc<T>, fallback: Arc<T>) -> Arc<T> {
    if primary.available() {
        info!(capability, provider = primary.name(), "Provider selected");
        primary
    } else {
        info!(
            capability,
            provider = fallback.name(),
            unavailable = primary.name(),
            "Primary provider unavailable, using fallback"
        );
        fallback
    }
}

/// Drive an async HTTP call from a worker-pool thread
///
/// Pool threads belong to the Tokio blocking pool, so the runtime handle is
/// reachable and blocking on it is permitted there.
pub(crate) fn block_on<F: Future>(future: F) -> Result<F::Output, ProviderError> {
    let handle = tokio::runtime::Handle::try_current()
        .map_err(|e| ProviderError::Unavailable(format!("no async runtime: {}", e)))?;
    Ok(handle.block_on(future))
}

/// The full set of collaborators a session talks to
#[derive(Clone)]
pub struct Providers {
    pub questions: Arc<dyn QuestionProvider>,
    pub classifier: Arc<dyn BranchClassifier>,
    pub generator: Arc<dyn QuestionGenerator>,
    pub transcriber: Arc<dyn Transcriber>,
    pub video: Arc<dyn VideoEmotionAnalyzer>,
    pub vocal: Arc<dyn VocalFeatureAnalyzer>,
    pub keywords: Arc<dyn KeywordScorer>,
    pub semantic: Arc<dyn SemanticScorer>,
    pub speech: Arc<dyn SpeechSynthesizer>,
}

impl Providers {
    /// Build and select providers from bootstrap configuration
    pub fn from_config(config: &TomlConfig) -> Result<Self, ProviderError> {
        let questions: Arc<dyn QuestionProvider> = match &config.questions_path {
            Some(path) => Arc::new(dataset::JsonQuestionProvider::from_path(path)?),
            None => Arc::new(dataset::JsonQuestionProvider::builtin()?),
        };
        info!(
            branches = ?questions.branches(),
            source = questions.name(),
            "Question dataset loaded"
        );

        let chat = Arc::new(llm::LlmClient::new(&config.providers.llm)?);
        let classifier = select::<dyn BranchClassifier>(
            "branch_classifier",
            chat.clone(),
            Arc::new(crate::dialogue::branch::SynonymBranchClassifier),
        );
        let generator = select::<dyn QuestionGenerator>(
            "question_generator",
            chat,
            Arc::new(llm::ResumeTemplateGenerator),
        );

        let transcription = &config.providers.transcription;
        let transcription_key = transcription
            .api_key
            .clone()
            .or_else(|| config.providers.llm.api_key.clone());
        let transcriber = select::<dyn Transcriber>(
            "transcriber",
            Arc::new(transcription::HttpTranscriber::new(
                &transcription.base_url,
                &transcription.model,
                transcription_key,
            )?),
            Arc::new(transcription::SilentTranscriber),
        );

        let video: Arc<dyn VideoEmotionAnalyzer> = match &config.providers.video.emotion_endpoint {
            Some(endpoint) => select::<dyn VideoEmotionAnalyzer>(
                "video_analyzer",
                Arc::new(video::RemoteEmotionAnalyzer::new(endpoint)?),
                Arc::new(video::HeuristicFrameAnalyzer),
            ),
            None => Arc::new(video::HeuristicFrameAnalyzer),
        };

        let tts = &config.providers.tts;
        let speech: Arc<dyn SpeechSynthesizer> = match (&tts.piper_binary, &tts.voice_model) {
            (Some(binary), Some(model)) => select::<dyn SpeechSynthesizer>(
                "speech_synthesizer",
                Arc::new(tts::PiperSynthesizer::new(binary, model)),
                Arc::new(tts::SilentSynthesizer),
            ),
            _ => Arc::new(tts::SilentSynthesizer),
        };

        Ok(Self {
            questions,
            classifier,
            generator,
            transcriber,
            video,
            vocal: Arc::new(vocal::EnergyVocalAnalyzer),
            keywords: Arc::new(keyword::DomainKeywordScorer::new()),
            semantic: Arc::new(semantic::BagOfWordsSimilarity),
            speech,
        })
    }

    /// Local-only providers around a given question source
    ///
    /// Used when no remote backend is configured and by tests.
    pub fn offline(questions: Arc<dyn QuestionProvider>) -> Self {
        Self {
            questions,
            classifier: Arc::new(crate::dialogue::branch::SynonymBranchClassifier),
            generator: Arc::new(llm::ResumeTemplateGenerator),
            transcriber: Arc::new(transcription::SilentTranscriber),
            video: Arc::new(video::HeuristicFrameAnalyzer),
            vocal: Arc::new(vocal::EnergyVocalAnalyzer),
            keywords: Arc::new(keyword::DomainKeywordScorer::new()),
            semantic: Arc::new(semantic::BagOfWordsSimilarity),
            speech: Arc::new(tts::SilentSynthesizer),
        }
    }

    /// Provider names in use, for diagnostics
    pub fn describe(&self) -> Vec<(&'static str, &'static str)> {
        vec![
            ("questions", self.questions.name()),
            ("branch_classifier", self.classifier.name()),
            ("question_generator", self.generator.name()),
            ("transcriber", self.transcriber.name()),
            ("video_analyzer", self.video.name()),
            ("vocal_analyzer", self.vocal.name()),
            ("keyword_scorer", self.keywords.name()),
            ("semantic_scorer", self.semantic.name()),
            ("speech_synthesizer", self.speech.name()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        name: &'static str,
        up: bool,
    }

    impl Probe for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }

        fn available(&self) -> bool {
            self.up
        }
    }

    #[test]
    fn test_select_prefers_available_primary() {
        let chosen = select(
            "test",
            Arc::new(Fixed { name: "primary", up: true }),
            Arc::new(Fixed { name: "fallback", up: true }),
        );
        assert_eq!(chosen.name(), "primary");
    }

    #[test]
    fn test_select_falls_back_when_primary_down() {
        let chosen = select(
            "test",
            Arc::new(Fixed { name: "primary", up: false }),
            Arc::new(Fixed { name: "fallback", up: true }),
        );
        assert_eq!(chosen.name(), "fallback");
    }

    #[test]
    fn test_default_config_selects_local_fallbacks() {
        let providers = Providers::from_config(&TomlConfig::default()).unwrap();
        assert_eq!(providers.classifier.name(), "synonym_table");
        assert_eq!(providers.generator.name(), "resume_template");
        assert_eq!(providers.transcriber.name(), "silent");
        assert_eq!(providers.speech.name(), "silent");
        assert!(providers.questions.branches().contains(&"CSE".to_string()));
    }

    #[test]
    fn test_block_on_outside_runtime_is_unavailable() {
        let result = block_on(async { 1 });
        assert!(matches!(result, Err(ProviderError::Unavailable(_))));
    }
}
