//! One candidate's live interview session
//!
//! The receive loop handles one inbound message at a time. Every model-bound
//! call made while handling a message runs on the shared [`WorkerPool`] and is
//! awaited before the next message is read, so a session's outbound events
//! follow its inbound order. Other sessions keep running meanwhile.
//!
//! Provider failures never end a session; each call site degrades to a
//! neutral reading or a fallback turn. Only the transport ending (client
//! disconnect, outbound channel gone, or cancellation) stops the loop.
//!
//! [`WorkerPool`]: super::WorkerPool

use super::{PoolError, SessionServices};
use crate::audio::{decode_base64_wav, AudioSegmenter, DecodedAudio};
use crate::dialogue::DialogueController;
use crate::providers::ProviderError;
use crate::scoring::ChannelBuffers;
use axum::extract::ws::Message;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use futures::{Stream, StreamExt};
use icoach_common::events::{ClientMessage, InterviewEvent, Sender, ServerEvent};
use icoach_common::models::{
    round1, round2, Analysis, KeywordResult, NeutralDefault, SessionRecord, VideoResult, VocalResult,
};
use std::fmt::Display;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Keyword domain when no branch has been selected yet
const DEFAULT_KEYWORD_DOMAIN: &str = "cse";

/// The client side of the outbound channel is gone
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Outbound channel closed")]
pub struct TransportClosed;

/// Whether the loop keeps reading after a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Finished,
}

pub struct SessionConnection {
    session_id: Uuid,
    candidate_id: Option<String>,
    dialogue: Arc<Mutex<DialogueController>>,
    segmenter: AudioSegmenter,
    last_sample_rate: u32,
    transcript_buffer: Vec<String>,
    channels: ChannelBuffers,
    services: SessionServices,
    outbound: mpsc::Sender<ServerEvent>,
}

fn lock(dialogue: &Mutex<DialogueController>) -> MutexGuard<'_, DialogueController> {
    dialogue.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Flatten a pool job's result into a tagged reading
fn settle<T, E>(result: Result<Result<T, E>, PoolError>, context: &str) -> Analysis<T>
where
    T: NeutralDefault,
    E: Display,
{
    let flattened = match result {
        Ok(inner) => inner.map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    Analysis::from_result(flattened, context)
}

impl SessionConnection {
    /// Register a new session and send the opening turn
    ///
    /// Returns the connection and the token that cancels its loop.
    pub async fn accept(
        services: SessionServices,
        candidate_id: Option<String>,
        resume_text: Option<String>,
        outbound: mpsc::Sender<ServerEvent>,
    ) -> Result<(Self, CancellationToken), TransportClosed> {
        let (session_id, cancel) = services
            .registry
            .register(candidate_id.clone(), outbound.clone())
            .await;

        let has_resume = resume_text.as_deref().is_some_and(|text| !text.trim().is_empty());
        let mut dialogue = DialogueController::new(
            &services.providers,
            resume_text,
            services.dialogue.resume_quota,
        );
        // The opening turn makes no provider calls
        let greeting = dialogue.respond("start");

        let connection = Self {
            session_id,
            candidate_id,
            dialogue: Arc::new(Mutex::new(dialogue)),
            segmenter: AudioSegmenter::new(services.segmenter),
            last_sample_rate: 16_000,
            transcript_buffer: Vec::new(),
            channels: ChannelBuffers::default(),
            services,
            outbound,
        };
        info!(
            session_id = %session_id,
            candidate_id = connection.candidate_id.as_deref().unwrap_or("-"),
            has_resume,
            "Session accepted"
        );

        if let Err(closed) = connection.emit(ServerEvent::text(greeting)).await {
            connection.services.registry.deregister(session_id).await;
            return Err(closed);
        }
        Ok((connection, cancel))
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Read and dispatch inbound frames until the transport ends
    ///
    /// Deregisters the session on exit, however the loop ends.
    pub async fn run<S, E>(mut self, mut inbound: S, cancel: CancellationToken)
    where
        S: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
    {
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => {
                    info!(session_id = %self.session_id, "Session cancelled");
                    break;
                }
                next = inbound.next() => next,
            };

            let raw = match next {
                Some(Ok(Message::Text(raw))) => raw,
                Some(Ok(Message::Close(_))) | None => {
                    info!(session_id = %self.session_id, "Client disconnected");
                    break;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    warn!(session_id = %self.session_id, "Receive error: {}", e);
                    break;
                }
            };

            let message = match ClientMessage::parse(&raw) {
                Ok(message) => message,
                Err(e) => {
                    warn!(session_id = %self.session_id, "Dropping malformed message: {}", e);
                    continue;
                }
            };

            match self.dispatch(message).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Finished) => break,
                Err(TransportClosed) => {
                    info!(session_id = %self.session_id, "Outbound closed, ending session");
                    break;
                }
            }
        }

        self.services.registry.deregister(self.session_id).await;
    }

    /// Handle one classified inbound message
    pub async fn dispatch(&mut self, message: ClientMessage) -> Result<Flow, TransportClosed> {
        match message {
            ClientMessage::VideoFrame { frame } => self.handle_video_frame(frame).await?,
            ClientMessage::AudioChunk { audio } => self.handle_audio_chunk(audio).await?,
            ClientMessage::Text { text } => self.handle_answer(text).await?,
            ClientMessage::InterviewEvent(InterviewEvent::Started) => {
                self.emit(ServerEvent::status("Interview Started")).await?;
            }
            ClientMessage::InterviewEvent(InterviewEvent::Ended) => {
                self.finish().await?;
                return Ok(Flow::Finished);
            }
            ClientMessage::InterviewEvent(InterviewEvent::Other(event)) => {
                debug!(session_id = %self.session_id, event = %event, "Ignoring interview event");
            }
            ClientMessage::Ignored { kind } => {
                debug!(session_id = %self.session_id, kind = %kind, "Ignoring message without payload");
            }
        }
        Ok(Flow::Continue)
    }

    async fn handle_video_frame(&mut self, frame: String) -> Result<(), TransportClosed> {
        let analyzer = Arc::clone(&self.services.providers.video);
        let result = self
            .services
            .pool
            .run("video_analysis", move || -> Result<VideoResult, ProviderError> {
                let bytes = BASE64
                    .decode(frame.trim())
                    .map_err(|e| ProviderError::Decode(format!("frame: {}", e)))?;
                analyzer.analyze(&bytes)
            })
            .await;
        let analysis: Analysis<VideoResult> = settle(result, "video analysis");

        let reading = analysis.value();
        self.emit(ServerEvent::NonVerbalAnalysis {
            confidence_score: round1(reading.confidence),
            emotions: reading.emotions.clone(),
            facial_expression: reading.dominant_expression.clone(),
            eye_contact: round2(reading.eye_contact),
            posture_score: round2(reading.posture_score),
            success: analysis.is_measured(),
        })
        .await?;

        if let Some(reading) = analysis.measured() {
            self.channels.record_non_verbal(reading.confidence);
        }
        Ok(())
    }

    async fn handle_audio_chunk(&mut self, audio: String) -> Result<(), TransportClosed> {
        let analyzer = Arc::clone(&self.services.providers.vocal);
        let result = self
            .services
            .pool
            .run("vocal_analysis", move || {
                let decoded = match decode_base64_wav(&audio) {
                    Ok(decoded) => decoded,
                    Err(e) => {
                        let failed: Result<VocalResult, _> = Err(e);
                        return (None, Analysis::from_result(failed, "audio decode"));
                    }
                };
                let analysis =
                    Analysis::from_result(analyzer.analyze(&decoded.samples, decoded.sample_rate), "vocal analysis");
                (Some(decoded), analysis)
            })
            .await;

        let (decoded, analysis): (Option<DecodedAudio>, Analysis<VocalResult>) = match result {
            Ok(pair) => pair,
            Err(e) => {
                error!(session_id = %self.session_id, "Audio job failed: {}", e);
                (None, Analysis::Neutral(VocalResult::neutral()))
            }
        };

        let reading = analysis.value();
        self.emit(ServerEvent::AudioAnalysis {
            pitch_hz: round1(reading.pitch_hz),
            confidence_score: round1(reading.confidence),
            loudness_db: round1(reading.loudness_db),
            speech_rate: round1(reading.speech_rate),
            success: analysis.is_measured(),
        })
        .await?;

        if let Some(reading) = analysis.measured() {
            self.channels.record_vocal(reading.confidence);
        }

        let Some(decoded) = decoded else {
            return Ok(());
        };
        if decoded.samples.is_empty() {
            debug!(session_id = %self.session_id, "Empty audio chunk, nothing to buffer");
            return Ok(());
        }

        // An utterance is transcribed at a single rate
        if decoded.sample_rate != self.last_sample_rate && !self.segmenter.is_empty() {
            debug!(
                session_id = %self.session_id,
                from = self.last_sample_rate,
                to = decoded.sample_rate,
                "Sample rate changed, closing current utterance"
            );
            self.transcribe_segment().await?;
        }
        self.last_sample_rate = decoded.sample_rate;
        self.segmenter.append(&decoded.samples, analysis.value().loudness_db as f32);

        if self.segmenter.should_flush() {
            self.transcribe_segment().await?;
        }
        Ok(())
    }

    async fn transcribe_segment(&mut self) -> Result<(), TransportClosed> {
        let samples = self.segmenter.flush();
        let sample_rate = self.last_sample_rate;
        debug!(session_id = %self.session_id, samples = samples.len(), "Flushing utterance");

        let transcriber = Arc::clone(&self.services.providers.transcriber);
        let text = match self
            .services
            .pool
            .run("transcription", move || transcriber.transcribe(&samples, sample_rate))
            .await
        {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!(session_id = %self.session_id, "Transcription failed: {}", e);
                String::new()
            }
            Err(e) => {
                error!(session_id = %self.session_id, "Transcription job failed: {}", e);
                String::new()
            }
        };

        let text = text.trim().to_string();
        if text.chars().count() <= 1 {
            debug!(session_id = %self.session_id, "Utterance produced no usable text");
            return Ok(());
        }

        self.emit(ServerEvent::Transcript {
            text: text.clone(),
            sender: Sender::User,
        })
        .await?;
        self.handle_answer(text).await
    }

    /// One candidate utterance: dialogue turn, spoken reply, keyword update
    async fn handle_answer(&mut self, text: String) -> Result<(), TransportClosed> {
        self.transcript_buffer.push(text.clone());

        let dialogue = Arc::clone(&self.dialogue);
        let reply = match self
            .services
            .pool
            .run("dialogue_turn", move || {
                let mut controller = lock(&dialogue);
                controller.respond(&text)
            })
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                error!(session_id = %self.session_id, "Dialogue turn failed: {}", e);
                format!("Error thinking: {}", e)
            }
        };
        self.emit(ServerEvent::text(reply.clone())).await?;
        self.speak(reply).await?;

        let transcript = self.transcript_buffer.join(" ");
        if transcript.chars().count() > self.services.dialogue.keyword_min_transcript_chars {
            self.score_keywords(transcript).await?;
        }
        Ok(())
    }

    async fn speak(&mut self, reply: String) -> Result<(), TransportClosed> {
        let speech = Arc::clone(&self.services.providers.speech);
        let audio = match self
            .services
            .pool
            .run("speech_synthesis", move || speech.synthesize(&reply))
            .await
        {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => {
                warn!(session_id = %self.session_id, "Speech synthesis failed: {}", e);
                Vec::new()
            }
            Err(e) => {
                error!(session_id = %self.session_id, "Speech job failed: {}", e);
                Vec::new()
            }
        };

        if audio.is_empty() {
            return Ok(());
        }
        self.emit(ServerEvent::Audio {
            audio: BASE64.encode(&audio),
        })
        .await
    }

    async fn score_keywords(&mut self, transcript: String) -> Result<(), TransportClosed> {
        let domain = lock(&self.dialogue)
            .selected_branch()
            .map(str::to_lowercase)
            .unwrap_or_else(|| DEFAULT_KEYWORD_DOMAIN.to_string());

        let scorer = Arc::clone(&self.services.providers.keywords);
        let result = self
            .services
            .pool
            .run("keyword_scoring", move || scorer.score(&transcript, &domain))
            .await;
        let analysis: Analysis<KeywordResult> = settle(result, "keyword scoring");

        let reading = analysis.value();
        self.emit(ServerEvent::KeywordAnalysis {
            keyword_score: round1(reading.score),
            top_keywords: reading.matched.clone(),
            success: analysis.is_measured(),
        })
        .await?;

        if let Analysis::Measured(reading) = analysis {
            self.channels.record_keywords(reading);
        }
        Ok(())
    }

    /// End-of-interview: emit the final score, then persist best effort
    ///
    /// Persistence is attempted even if the score could not be delivered.
    async fn finish(&mut self) -> Result<(), TransportClosed> {
        let scores = self.services.aggregator.aggregate(&self.channels);
        info!(
            session_id = %self.session_id,
            final_score = scores.final_score,
            non_verbal_readings = self.channels.non_verbal.len(),
            vocal_readings = self.channels.vocal.len(),
            keyword_readings = self.channels.keyword.len(),
            "Interview ended"
        );
        let delivered = self.emit(ServerEvent::FinalScore { scores }).await;

        let (branch, answers) = {
            let dialogue = lock(&self.dialogue);
            (dialogue.selected_branch().map(str::to_string), dialogue.answers().to_vec())
        };
        let record = SessionRecord {
            session_id: Uuid::new_v4(),
            connection_id: self.session_id,
            candidate_id: self.candidate_id.clone(),
            branch,
            transcript: self.transcript_buffer.join(" "),
            answers,
            scores,
            saved_at: Utc::now(),
        };
        if let Err(e) = self.services.store.persist(&record).await {
            warn!(session_id = %self.session_id, "Session not persisted: {}", e);
        }

        delivered
    }

    async fn emit(&self, event: ServerEvent) -> Result<(), TransportClosed> {
        debug!(session_id = %self.session_id, event = event.kind(), "Emitting event");
        self.outbound.send(event).await.map_err(|_| TransportClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::dataset::JsonQuestionProvider;
    use crate::audio::decode::encode_base64_wav;
    use crate::providers::{Probe, Providers, Transcriber};
    use crate::store::DetachedSessionStore;
    use icoach_common::config::TomlConfig;

    fn services() -> SessionServices {
        let providers = Providers::offline(Arc::new(JsonQuestionProvider::builtin().unwrap()));
        SessionServices::new(&TomlConfig::default(), providers, Arc::new(DetachedSessionStore::new("test")))
    }

    /// Remembers (sample count, rate) of every utterance it is handed
    #[derive(Default)]
    struct RecordingTranscriber {
        calls: Mutex<Vec<(usize, u32)>>,
    }

    impl Probe for RecordingTranscriber {
        fn name(&self) -> &'static str {
            "recording"
        }
    }

    impl Transcriber for RecordingTranscriber {
        fn transcribe(&self, samples: &[f32], sample_rate: u32) -> Result<String, ProviderError> {
            self.calls.lock().unwrap().push((samples.len(), sample_rate));
            Ok(String::new())
        }
    }

    fn services_recording(transcriber: Arc<RecordingTranscriber>) -> SessionServices {
        let mut providers = Providers::offline(Arc::new(JsonQuestionProvider::builtin().unwrap()));
        providers.transcriber = transcriber;
        SessionServices::new(&TomlConfig::default(), providers, Arc::new(DetachedSessionStore::new("test")))
    }

    fn tone(len: usize) -> Vec<f32> {
        (0..len).map(|i| 0.5 * (i as f32 * 0.1).sin()).collect()
    }

    async fn send_audio(connection: &mut SessionConnection, samples: &[f32], rate: u32) {
        let audio = encode_base64_wav(samples, rate).unwrap();
        connection
            .dispatch(ClientMessage::AudioChunk { audio })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_accept_registers_and_greets() {
        let services = services();
        let (tx, mut rx) = mpsc::channel(16);
        let (connection, _cancel) = SessionConnection::accept(services.clone(), None, None, tx)
            .await
            .unwrap();

        assert!(services.registry.contains(connection.session_id()).await);
        match rx.recv().await {
            Some(ServerEvent::Text { ai_text }) => assert!(ai_text.contains("Which engineering branch")),
            other => panic!("expected greeting, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_accept_fails_when_client_gone() {
        let services = services();
        let (tx, rx) = mpsc::channel(16);
        drop(rx);
        let result = SessionConnection::accept(services.clone(), None, None, tx).await;
        assert!(matches!(result, Err(TransportClosed)));
        assert_eq!(services.registry.active_count().await, 0);
    }

    #[tokio::test]
    async fn test_undecodable_frame_reports_neutral() {
        let (tx, mut rx) = mpsc::channel(16);
        let (mut connection, _cancel) = SessionConnection::accept(services(), None, None, tx).await.unwrap();
        rx.recv().await;

        let flow = connection
            .dispatch(ClientMessage::VideoFrame {
                frame: "!!not base64!!".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(flow, Flow::Continue);

        match rx.recv().await {
            Some(ServerEvent::NonVerbalAnalysis { success, confidence_score, .. }) => {
                assert!(!success);
                assert_eq!(confidence_score, 0.0);
            }
            other => panic!("expected non_verbal_analysis, got {:?}", other),
        }
        assert!(connection.channels.non_verbal.is_empty());
    }

    #[tokio::test]
    async fn test_interview_ended_finishes_without_store() {
        let (tx, mut rx) = mpsc::channel(16);
        let (mut connection, _cancel) = SessionConnection::accept(services(), None, None, tx).await.unwrap();
        rx.recv().await;

        let flow = connection
            .dispatch(ClientMessage::InterviewEvent(InterviewEvent::Ended))
            .await
            .unwrap();
        assert_eq!(flow, Flow::Finished);
        assert!(matches!(rx.recv().await, Some(ServerEvent::FinalScore { .. })));
    }

    #[tokio::test]
    async fn test_empty_audio_chunk_is_not_buffered() {
        let (tx, mut rx) = mpsc::channel(16);
        let (mut connection, _cancel) = SessionConnection::accept(services(), None, None, tx).await.unwrap();
        rx.recv().await;

        for _ in 0..5 {
            send_audio(&mut connection, &[], 16_000).await;
            match rx.recv().await {
                Some(ServerEvent::AudioAnalysis { success, .. }) => assert!(!success),
                other => panic!("expected audio_analysis, got {:?}", other),
            }
        }
        assert!(connection.segmenter.is_empty());
        assert_eq!(connection.segmenter.silence_run_count(), 0);
    }

    #[tokio::test]
    async fn test_sample_rate_change_closes_utterance() {
        let transcriber = Arc::new(RecordingTranscriber::default());
        let (tx, mut rx) = mpsc::channel(16);
        let (mut connection, _cancel) = SessionConnection::accept(services_recording(transcriber.clone()), None, None, tx)
            .await
            .unwrap();
        rx.recv().await;

        send_audio(&mut connection, &tone(1_600), 16_000).await;
        rx.recv().await;
        assert!(transcriber.calls.lock().unwrap().is_empty());

        send_audio(&mut connection, &tone(800), 8_000).await;
        rx.recv().await;

        // first utterance went out whole, at its own rate
        assert_eq!(*transcriber.calls.lock().unwrap(), vec![(1_600, 16_000)]);
        assert_eq!(connection.segmenter.len(), 800);
        assert_eq!(connection.last_sample_rate, 8_000);
    }
}
