//! WAV payload decoding and encoding
//!
//! `audio_chunk` payloads are self-contained base64 WAV segments. They are
//! decoded to mono f32 in [-1.0, 1.0]; multi-channel input is averaged.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::io::Cursor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioDecodeError {
    #[error("Invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Invalid WAV: {0}")]
    Wav(#[from] hound::Error),

    #[error("Unsupported WAV layout: {0}")]
    Unsupported(String),
}

/// Mono samples with their rate
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

pub fn decode_base64_wav(payload: &str) -> Result<DecodedAudio, AudioDecodeError> {
    let bytes = BASE64.decode(payload.trim())?;
    decode_wav(&bytes)
}

pub fn decode_wav(bytes: &[u8]) -> Result<DecodedAudio, AudioDecodeError> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 {
        return Err(AudioDecodeError::Unsupported("zero channels".to_string()));
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                return Err(AudioDecodeError::Unsupported(format!(
                    "{} bits per sample",
                    spec.bits_per_sample
                )));
            }
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
    })
}

/// Encode mono f32 samples as 16-bit PCM WAV
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut buffer = Vec::new();
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut buffer), spec)?;
        for &sample in samples {
            let clamped = sample.clamp(-1.0, 1.0);
            writer.write_sample((clamped * i16::MAX as f32) as i16)?;
        }
        writer.finalize()?;
    }
    Ok(buffer)
}

/// Base64 WAV, as the client sends it. Used by tests and tools.
pub fn encode_base64_wav(samples: &[f32], sample_rate: u32) -> Result<String, hound::Error> {
    Ok(BASE64.encode(encode_wav(samples, sample_rate)?))
}
