//! Speech-to-text for flushed utterance segments

use super::{block_on, Probe, ProviderError, Transcriber};
use crate::audio::decode::encode_wav;
use serde::Deserialize;

/// OpenAI-compatible `/audio/transcriptions` client
///
/// The utterance is re-encoded as a 16-bit WAV in memory and uploaded as a
/// multipart form.
pub struct HttpTranscriber {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

impl HttpTranscriber {
    pub fn new(base_url: &str, model: &str, api_key: Option<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            endpoint: format!("{}/audio/transcriptions", base_url.trim_end_matches('/')),
            model: model.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }
}

impl Probe for HttpTranscriber {
    fn name(&self) -> &'static str {
        "http_transcriber"
    }

    fn available(&self) -> bool {
        self.api_key.is_some()
    }
}

impl Transcriber for HttpTranscriber {
    fn transcribe(&self, samples: &[f32], sample_rate: u32) -> Result<String, ProviderError> {
        if samples.is_empty() {
            return Ok(String::new());
        }
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::Unavailable("transcription API key not configured".to_string()))?;

        let wav = encode_wav(samples, sample_rate)
            .map_err(|e| ProviderError::Decode(format!("WAV encode failed: {}", e)))?;

        let file = reqwest::multipart::Part::bytes(wav)
            .file_name("utterance.wav")
            .mime_str("audio/wav")?;
        let form = reqwest::multipart::Form::new()
            .text("model", self.model.clone())
            .text("response_format", "json")
            .part("file", file);

        let response: TranscriptionResponse = block_on(async {
            self.http
                .post(&self.endpoint)
                .bearer_auth(api_key)
                .multipart(form)
                .send()
                .await?
                .error_for_status()?
                .json::<TranscriptionResponse>()
                .await
        })??;

        Ok(response.text.trim().to_string())
    }
}

/// Transcriber used when no speech backend is configured. Always hears silence.
pub struct SilentTranscriber;

impl Probe for SilentTranscriber {
    fn name(&self) -> &'static str {
        "silent"
    }
}

impl Transcriber for SilentTranscriber {
    fn transcribe(&self, _samples: &[f32], _sample_rate: u32) -> Result<String, ProviderError> {
        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_transcriber_returns_empty() {
        assert_eq!(SilentTranscriber.transcribe(&[0.1; 1600], 16_000).unwrap(), "");
    }

    #[test]
    fn test_http_transcriber_needs_key() {
        let transcriber = HttpTranscriber::new("http://localhost/v1", "whisper", None).unwrap();
        assert!(!transcriber.available());
        assert!(matches!(
            transcriber.transcribe(&[0.1; 16], 16_000),
            Err(ProviderError::Unavailable(_))
        ));
    }

    #[test]
    fn test_http_transcriber_skips_empty_segment() {
        let transcriber = HttpTranscriber::new("http://localhost/v1", "whisper", None).unwrap();
        assert_eq!(transcriber.transcribe(&[], 16_000).unwrap(), "");
    }
}
