//! Facial emotion and presence readings from single video frames
//!
//! Both analyzers report `confidence` on the 0-100 scale, computed from the
//! same emotion balance, eye contact and posture blend.

use super::{block_on, Probe, ProviderError, VideoEmotionAnalyzer};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use icoach_common::models::VideoResult;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;

const POSITIVE_EMOTIONS: [&str; 2] = ["happy", "surprised"];
const NEGATIVE_EMOTIONS: [&str; 4] = ["sad", "angry", "fearful", "disgusted"];

/// Mean luma below this means the face is not lit well enough to read
const DARK_FRAME_LUMA: f64 = 0.08;
/// Luma spread below this means a blank or covered frame
const FLAT_FRAME_SPREAD: f64 = 0.02;

/// Blend emotion balance (0.4), eye contact (0.3) and posture (0.3) into 0-100
pub fn frame_confidence(emotions: &BTreeMap<String, f64>, eye_contact: f64, posture_score: f64) -> f64 {
    let sum_of = |names: &[&str]| -> f64 { names.iter().filter_map(|n| emotions.get(*n)).sum() };
    let balance = ((sum_of(&POSITIVE_EMOTIONS[..]) - sum_of(&NEGATIVE_EMOTIONS[..]) + 1.0) / 2.0).clamp(0.0, 1.0);
    (balance * 0.4 + eye_contact.clamp(0.0, 1.0) * 0.3 + posture_score.clamp(0.0, 1.0) * 0.3) * 100.0
}

fn dominant(emotions: &BTreeMap<String, f64>) -> String {
    emotions
        .iter()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(name, _)| name.clone())
        .unwrap_or_else(|| "neutral".to_string())
}

/// Posts the frame to an emotion-recognition service
///
/// Request: `{"image": <base64>}`. Response: `{"emotions": {...},
/// "eye_contact"?: f64, "posture_score"?: f64}` with emotion probabilities
/// in 0-1.
pub struct RemoteEmotionAnalyzer {
    http: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct RemoteReading {
    emotions: BTreeMap<String, f64>,
    #[serde(default)]
    eye_contact: Option<f64>,
    #[serde(default)]
    posture_score: Option<f64>,
}

impl RemoteEmotionAnalyzer {
    pub fn new(endpoint: &str) -> Result<Self, ProviderError> {
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            endpoint: endpoint.to_string(),
        })
    }
}

impl Probe for RemoteEmotionAnalyzer {
    fn name(&self) -> &'static str {
        "remote_emotion"
    }

    fn available(&self) -> bool {
        reqwest::Url::parse(&self.endpoint).is_ok()
    }
}

impl VideoEmotionAnalyzer for RemoteEmotionAnalyzer {
    fn analyze(&self, frame: &[u8]) -> Result<VideoResult, ProviderError> {
        let body = json!({ "image": BASE64.encode(frame) });
        let reading: RemoteReading = block_on(async {
            self.http
                .post(&self.endpoint)
                .json(&body)
                .send()
                .await?
                .error_for_status()?
                .json::<RemoteReading>()
                .await
        })??;

        if reading.emotions.is_empty() {
            return Err(ProviderError::InvalidResponse("no face detected".to_string()));
        }

        let emotions: BTreeMap<String, f64> = reading
            .emotions
            .into_iter()
            .map(|(name, p)| (name.to_lowercase(), p.clamp(0.0, 1.0)))
            .collect();
        let neutral = emotions.get("neutral").copied().unwrap_or(0.0);
        let eye_contact = reading
            .eye_contact
            .unwrap_or(if neutral > 0.1 { 0.8 } else { 0.4 });
        let posture_score = reading.posture_score.unwrap_or(0.7);

        Ok(VideoResult {
            confidence: frame_confidence(&emotions, eye_contact, posture_score),
            dominant_expression: dominant(&emotions),
            emotions,
            eye_contact,
            posture_score,
        })
    }
}

/// Local fallback: checks the frame is a readable, lit image
///
/// Without an emotion model the distribution is a neutral-leaning prior.
/// Presence heuristics depend only on frame brightness and contrast.
pub struct HeuristicFrameAnalyzer;

impl HeuristicFrameAnalyzer {
    fn prior() -> BTreeMap<String, f64> {
        ["happy", "sad", "angry", "surprised", "fearful", "disgusted"]
            .into_iter()
            .map(|name| (name.to_string(), 0.1))
            .chain(std::iter::once(("neutral".to_string(), 0.4)))
            .collect()
    }
}

impl Probe for HeuristicFrameAnalyzer {
    fn name(&self) -> &'static str {
        "frame_heuristics"
    }
}

impl VideoEmotionAnalyzer for HeuristicFrameAnalyzer {
    fn analyze(&self, frame: &[u8]) -> Result<VideoResult, ProviderError> {
        let image = image::load_from_memory(frame)
            .map_err(|e| ProviderError::Decode(format!("frame: {}", e)))?
            .to_luma8();

        let pixel_count = (image.width() as usize) * (image.height() as usize);
        if pixel_count == 0 {
            return Err(ProviderError::Decode("empty frame".to_string()));
        }

        let levels: Vec<f64> = image.pixels().map(|p| p.0[0] as f64 / 255.0).collect();
        let mean = levels.iter().sum::<f64>() / pixel_count as f64;
        let spread = (levels.iter().map(|l| (l - mean).powi(2)).sum::<f64>() / pixel_count as f64).sqrt();

        let readable = mean >= DARK_FRAME_LUMA && spread >= FLAT_FRAME_SPREAD;
        let (eye_contact, posture_score) = if readable { (0.8, 0.7) } else { (0.4, 0.5) };

        let emotions = Self::prior();
        Ok(VideoResult {
            confidence: frame_confidence(&emotions, eye_contact, posture_score),
            dominant_expression: dominant(&emotions),
            emotions,
            eye_contact,
            posture_score,
        })
    }
}
