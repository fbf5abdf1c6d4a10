//! Utterance segmentation by silence runs
//!
//! Each inbound audio chunk is appended together with its loudness reading.
//! A run of quiet chunks after enough speech marks an utterance boundary;
//! continuous speech is cut at the forced-flush length so transcription
//! latency stays bounded.
//!
//! Buffer states:
//! ```text
//! Empty ──append──> Accumulating ──should_flush──> flush() ──> Empty
//!                        │
//!                        └── append past hard cap ──> Empty (discarded)
//! ```
//!
//! One segmenter belongs to one session and is only touched by that session's
//! loop, so it carries no locking.

use icoach_common::config::SegmenterConfig;
use tracing::warn;

pub struct AudioSegmenter {
    config: SegmenterConfig,
    buffer: Vec<f32>,
    silence_run_count: u32,
}

impl AudioSegmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self {
            config,
            buffer: Vec::new(),
            silence_run_count: 0,
        }
    }

    /// Append one chunk and update the silence run
    ///
    /// An append that would take the buffer past `max_buffer_samples` clears
    /// the buffer and the silence run instead. The caller is not told; the
    /// session simply continues with an empty buffer.
    pub fn append(&mut self, samples: &[f32], loudness_db: f32) {
        if self.buffer.len() + samples.len() > self.config.max_buffer_samples {
            warn!(
                buffered = self.buffer.len(),
                incoming = samples.len(),
                cap = self.config.max_buffer_samples,
                "Audio buffer overflow, discarding buffered speech"
            );
            self.reset();
            return;
        }

        self.buffer.extend_from_slice(samples);

        if loudness_db > self.config.speech_threshold_db {
            self.silence_run_count = 0;
        } else {
            self.silence_run_count += 1;
        }
    }

    pub fn should_flush(&self) -> bool {
        let silence_boundary = self.silence_run_count >= self.config.silence_run_limit
            && self.buffer.len() >= self.config.min_utterance_samples;
        silence_boundary || self.buffer.len() >= self.config.forced_flush_samples
    }

    /// Take the buffered utterance, leaving the segmenter empty
    pub fn flush(&mut self) -> Vec<f32> {
        self.silence_run_count = 0;
        std::mem::take(&mut self.buffer)
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.silence_run_count = 0;
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn silence_run_count(&self) -> u32 {
        self.silence_run_count
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }
}
