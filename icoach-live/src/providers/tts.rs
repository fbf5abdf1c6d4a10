//! Text-to-speech for interviewer turns

use super::{Probe, ProviderError, SpeechSynthesizer};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Runs the `piper` binary, which reads text on stdin and writes a WAV file
pub struct PiperSynthesizer {
    binary: PathBuf,
    voice_model: PathBuf,
}

impl PiperSynthesizer {
    pub fn new(binary: &Path, voice_model: &Path) -> Self {
        Self {
            binary: binary.to_path_buf(),
            voice_model: voice_model.to_path_buf(),
        }
    }
}

impl Probe for PiperSynthesizer {
    fn name(&self) -> &'static str {
        "piper"
    }

    fn available(&self) -> bool {
        self.binary.is_file() && self.voice_model.is_file()
    }
}

impl SpeechSynthesizer for PiperSynthesizer {
    fn synthesize(&self, text: &str) -> Result<Vec<u8>, ProviderError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let output_file = tempfile::Builder::new()
            .prefix("icoach-tts-")
            .suffix(".wav")
            .tempfile()?;

        let mut child = Command::new(&self.binary)
            .arg("--model")
            .arg(&self.voice_model)
            .arg("--output_file")
            .arg(output_file.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes())?;
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(ProviderError::InvalidResponse(format!(
                "piper exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let audio = std::fs::read(output_file.path())?;
        debug!(bytes = audio.len(), "Synthesized speech");
        Ok(audio)
    }
}

/// Synthesizer used when no voice is configured. Produces no audio.
pub struct SilentSynthesizer;

impl Probe for SilentSynthesizer {
    fn name(&self) -> &'static str {
        "silent"
    }
}

impl SpeechSynthesizer for SilentSynthesizer {
    fn synthesize(&self, _text: &str) -> Result<Vec<u8>, ProviderError> {
        Ok(Vec::new())
    }
}
