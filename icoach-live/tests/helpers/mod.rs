//! Shared fixtures for icoach-live integration tests
//!
//! Stub providers return fixed readings so event sequences and scores are
//! predictable.

#![allow(dead_code)]

use icoach_common::config::TomlConfig;
use icoach_common::models::{KeywordResult, Question, QuestionSource, VideoResult, VocalResult};
use icoach_live::audio::rms_db;
use icoach_live::dialogue::SynonymBranchClassifier;
use icoach_live::providers::llm::ResumeTemplateGenerator;
use icoach_live::providers::semantic::BagOfWordsSimilarity;
use icoach_live::providers::{
    KeywordScorer, Probe, ProviderError, Providers, QuestionProvider, SpeechSynthesizer, Transcriber,
    VideoEmotionAnalyzer, VocalFeatureAnalyzer,
};
use icoach_live::session::SessionServices;
use icoach_live::store::{SessionStore, SqliteSessionStore};
use sqlx::sqlite::SqlitePoolOptions;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const SPOKEN_TEXT: &str = "I study Computer Science";

/// Two CSE questions, one EC question
pub struct StubQuestions;

impl Probe for StubQuestions {
    fn name(&self) -> &'static str {
        "stub_questions"
    }
}

impl QuestionProvider for StubQuestions {
    fn branches(&self) -> Vec<String> {
        vec!["CSE".to_string(), "EC".to_string()]
    }

    fn questions(&self, branch: &str) -> Result<Vec<Question>, ProviderError> {
        let question = |id: &str, text: &str, ideal: &str| Question {
            id: id.to_string(),
            text: text.to_string(),
            ideal_answer: ideal.to_string(),
            source: QuestionSource::Dataset,
        };
        Ok(match branch {
            "CSE" => vec![
                question("cse-1", "What is a process?", "a program in execution with its own memory"),
                question("cse-2", "What is a deadlock?", "processes waiting on each other forever"),
            ],
            "EC" => vec![question("ec-1", "What is a diode?", "a one way semiconductor device")],
            _ => Vec::new(),
        })
    }
}

/// Alternates 80 and 90 confidence
#[derive(Default)]
pub struct StubVideo {
    calls: AtomicUsize,
}

impl Probe for StubVideo {
    fn name(&self) -> &'static str {
        "stub_video"
    }
}

impl VideoEmotionAnalyzer for StubVideo {
    fn analyze(&self, _frame: &[u8]) -> Result<VideoResult, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let mut emotions = BTreeMap::new();
        emotions.insert("happy".to_string(), 0.7);
        emotions.insert("neutral".to_string(), 0.3);
        Ok(VideoResult {
            emotions,
            dominant_expression: "happy".to_string(),
            eye_contact: 0.9,
            posture_score: 0.8,
            confidence: if call % 2 == 0 { 80.0 } else { 90.0 },
        })
    }
}

/// Confidence 70; loudness measured from the samples
pub struct StubVocal;

impl Probe for StubVocal {
    fn name(&self) -> &'static str {
        "stub_vocal"
    }
}

impl VocalFeatureAnalyzer for StubVocal {
    fn analyze(&self, samples: &[f32], _sample_rate: u32) -> Result<VocalResult, ProviderError> {
        Ok(VocalResult {
            pitch_hz: 180.0,
            loudness_db: rms_db(samples),
            stability: 0.9,
            speech_rate: 140.0,
            confidence: 70.0,
        })
    }
}

pub struct StubTranscriber;

impl Probe for StubTranscriber {
    fn name(&self) -> &'static str {
        "stub_transcriber"
    }
}

impl Transcriber for StubTranscriber {
    fn transcribe(&self, _samples: &[f32], _sample_rate: u32) -> Result<String, ProviderError> {
        Ok(SPOKEN_TEXT.to_string())
    }
}

/// Always scores 60
pub struct StubKeywords;

impl Probe for StubKeywords {
    fn name(&self) -> &'static str {
        "stub_keywords"
    }
}

impl KeywordScorer for StubKeywords {
    fn score(&self, _text: &str, _domain: &str) -> Result<KeywordResult, ProviderError> {
        Ok(KeywordResult {
            matched: vec!["process".to_string(), "thread".to_string()],
            missing: vec!["mutex".to_string()],
            score: 60.0,
        })
    }
}

pub struct StubSpeech;

impl Probe for StubSpeech {
    fn name(&self) -> &'static str {
        "stub_speech"
    }
}

impl SpeechSynthesizer for StubSpeech {
    fn synthesize(&self, text: &str) -> Result<Vec<u8>, ProviderError> {
        Ok(text.as_bytes().to_vec())
    }
}

pub fn stub_providers() -> Providers {
    Providers {
        questions: Arc::new(StubQuestions),
        classifier: Arc::new(SynonymBranchClassifier),
        generator: Arc::new(ResumeTemplateGenerator),
        transcriber: Arc::new(StubTranscriber),
        video: Arc::new(StubVideo::default()),
        vocal: Arc::new(StubVocal),
        keywords: Arc::new(StubKeywords),
        semantic: Arc::new(BagOfWordsSimilarity),
        speech: Arc::new(StubSpeech),
    }
}

pub async fn memory_store() -> Arc<SqliteSessionStore> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    Arc::new(SqliteSessionStore::from_pool(pool).await.expect("Failed to create tables"))
}

pub fn services_with(providers: Providers, store: Arc<dyn SessionStore>) -> SessionServices {
    SessionServices::new(&TomlConfig::default(), providers, store)
}
