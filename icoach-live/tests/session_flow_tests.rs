//! End-to-end session behaviour against stub providers

mod helpers;

use axum::extract::ws::Message;
use futures::stream::{self, StreamExt};
use helpers::{memory_store, services_with, stub_providers, SPOKEN_TEXT};
use icoach_common::events::{ClientMessage, InterviewEvent, Sender, ServerEvent};
use icoach_live::audio::decode::encode_base64_wav;
use icoach_live::dialogue::CLOSING_MESSAGE;
use icoach_live::providers::{BranchClassifier, BranchGuess, Probe, ProviderError};
use icoach_live::session::{Flow, SessionConnection};
use icoach_live::store::{DetachedSessionStore, SessionStore};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

async fn next_event(rx: &mut mpsc::Receiver<ServerEvent>) -> ServerEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("outbound channel closed")
}

fn loud_chunk() -> String {
    let samples: Vec<f32> = (0..9_000)
        .map(|i| {
            let t = i as f32 / 16_000.0;
            0.5 * (2.0 * std::f32::consts::PI * 220.0 * t).sin()
        })
        .collect();
    encode_base64_wav(&samples, 16_000).unwrap()
}

fn quiet_chunk() -> String {
    encode_base64_wav(&vec![0.0; 160], 16_000).unwrap()
}

fn text(text: &str) -> ClientMessage {
    ClientMessage::Text { text: text.to_string() }
}

/// Panics on its first call, then recognizes CSE
#[derive(Default)]
struct CrashOnceClassifier {
    crashed: AtomicBool,
}

impl Probe for CrashOnceClassifier {
    fn name(&self) -> &'static str {
        "crash_once_classifier"
    }
}

impl BranchClassifier for CrashOnceClassifier {
    fn classify(&self, _text: &str, _known: &[String]) -> Result<BranchGuess, ProviderError> {
        if !self.crashed.swap(true, Ordering::SeqCst) {
            panic!("classifier model crashed");
        }
        Ok(BranchGuess {
            branch: "CSE".to_string(),
            confidence: 0.9,
        })
    }
}

#[tokio::test]
async fn test_full_interview_flow() {
    let store = memory_store().await;
    let services = services_with(stub_providers(), store.clone());
    let (tx, mut rx) = mpsc::channel(64);

    let (mut session, _cancel) = SessionConnection::accept(services.clone(), Some("cand-1".to_string()), None, tx)
        .await
        .unwrap();
    assert!(matches!(next_event(&mut rx).await, ServerEvent::Text { .. }));

    session
        .dispatch(ClientMessage::InterviewEvent(InterviewEvent::Started))
        .await
        .unwrap();
    assert_eq!(next_event(&mut rx).await, ServerEvent::status("Interview Started"));

    for expected in [80.0, 90.0] {
        session
            .dispatch(ClientMessage::VideoFrame {
                frame: "aGVsbG8=".to_string(),
            })
            .await
            .unwrap();
        match next_event(&mut rx).await {
            ServerEvent::NonVerbalAnalysis {
                confidence_score,
                facial_expression,
                success,
                ..
            } => {
                assert!(success);
                assert_eq!(confidence_score, expected);
                assert_eq!(facial_expression, "happy");
            }
            other => panic!("expected non_verbal_analysis, got {:?}", other),
        }
    }

    // Branch selection by typed text
    session.dispatch(text(SPOKEN_TEXT)).await.unwrap();
    assert_eq!(
        next_event(&mut rx).await,
        ServerEvent::text("Great, let's begin your CSE interview.\n\nQuestion 1: What is a process?")
    );
    assert!(matches!(next_event(&mut rx).await, ServerEvent::Audio { .. }));

    // Speech, then three quiet chunks close the utterance
    session
        .dispatch(ClientMessage::AudioChunk { audio: loud_chunk() })
        .await
        .unwrap();
    match next_event(&mut rx).await {
        ServerEvent::AudioAnalysis {
            confidence_score,
            success,
            ..
        } => {
            assert!(success);
            assert_eq!(confidence_score, 70.0);
        }
        other => panic!("expected audio_analysis, got {:?}", other),
    }
    for _ in 0..3 {
        session
            .dispatch(ClientMessage::AudioChunk { audio: quiet_chunk() })
            .await
            .unwrap();
        assert!(matches!(next_event(&mut rx).await, ServerEvent::AudioAnalysis { .. }));
    }
    assert_eq!(
        next_event(&mut rx).await,
        ServerEvent::Transcript {
            text: SPOKEN_TEXT.to_string(),
            sender: Sender::User,
        }
    );
    assert_eq!(next_event(&mut rx).await, ServerEvent::text("Question 2: What is a deadlock?"));
    assert!(matches!(next_event(&mut rx).await, ServerEvent::Audio { .. }));

    // Transcript is now long enough for keyword scoring
    session
        .dispatch(text("Deadlock is when processes wait on each other"))
        .await
        .unwrap();
    assert_eq!(next_event(&mut rx).await, ServerEvent::text(CLOSING_MESSAGE));
    assert!(matches!(next_event(&mut rx).await, ServerEvent::Audio { .. }));
    match next_event(&mut rx).await {
        ServerEvent::KeywordAnalysis {
            keyword_score,
            top_keywords,
            success,
        } => {
            assert!(success);
            assert_eq!(keyword_score, 60.0);
            assert_eq!(top_keywords, vec!["process".to_string(), "thread".to_string()]);
        }
        other => panic!("expected keyword_analysis, got {:?}", other),
    }

    let flow = session
        .dispatch(ClientMessage::InterviewEvent(InterviewEvent::Ended))
        .await
        .unwrap();
    assert_eq!(flow, Flow::Finished);
    match next_event(&mut rx).await {
        ServerEvent::FinalScore { scores } => {
            assert_eq!(scores.non_verbal_score, 85.0);
            assert_eq!(scores.vocal_score, 70.0);
            assert_eq!(scores.keyword_score, 60.0);
            assert_eq!(scores.final_score, 72.0);
        }
        other => panic!("expected final_score, got {:?}", other),
    }

    let listed = store.list_sessions(10).await.unwrap();
    assert_eq!(listed.len(), 1);
    let record = store.load_session(listed[0].session_id).await.unwrap().unwrap();
    assert_eq!(record.connection_id, session.session_id());
    assert_eq!(record.candidate_id.as_deref(), Some("cand-1"));
    assert_eq!(record.branch.as_deref(), Some("CSE"));
    assert_eq!(record.answers.len(), 2);
    assert_eq!(record.answers[0].answer, SPOKEN_TEXT);
    assert_eq!(record.answers[1].question_id, "cse-2");
    assert!(record.transcript.starts_with(SPOKEN_TEXT));
}

#[tokio::test]
async fn test_final_score_sent_when_store_detached() {
    let services = services_with(stub_providers(), Arc::new(DetachedSessionStore::new("offline")));
    let (tx, mut rx) = mpsc::channel(16);
    let (mut session, _cancel) = SessionConnection::accept(services, None, None, tx).await.unwrap();
    next_event(&mut rx).await;

    session
        .dispatch(ClientMessage::InterviewEvent(InterviewEvent::Ended))
        .await
        .unwrap();
    match next_event(&mut rx).await {
        ServerEvent::FinalScore { scores } => assert_eq!(scores.final_score, 0.0),
        other => panic!("expected final_score, got {:?}", other),
    }
}

#[tokio::test]
async fn test_loop_survives_malformed_messages() {
    let services = services_with(stub_providers(), Arc::new(DetachedSessionStore::new("offline")));
    let registry = services.registry.clone();
    let (tx, mut rx) = mpsc::channel(16);
    let (session, cancel) = SessionConnection::accept(services, None, None, tx).await.unwrap();
    next_event(&mut rx).await;

    let inbound = stream::iter(vec![
        Ok::<_, std::io::Error>(Message::Text("{not json".to_string())),
        Ok(Message::Text(json!({"type": "mystery"}).to_string())),
        Ok(Message::Text(json!({"text": "pizza"}).to_string())),
        Ok(Message::Close(None)),
    ]);
    session.run(inbound, cancel).await;

    match next_event(&mut rx).await {
        ServerEvent::Text { ai_text } => assert!(ai_text.starts_with("I didn't catch your branch")),
        other => panic!("expected reprompt, got {:?}", other),
    }
    assert_eq!(registry.active_count().await, 0);
}

#[tokio::test]
async fn test_session_ends_when_client_stops_reading() {
    let services = services_with(stub_providers(), Arc::new(DetachedSessionStore::new("offline")));
    let registry = services.registry.clone();
    let (tx, mut rx) = mpsc::channel(16);
    let (session, cancel) = SessionConnection::accept(services, None, None, tx).await.unwrap();
    next_event(&mut rx).await;
    drop(rx);

    let inbound = stream::iter(vec![Ok::<_, std::io::Error>(Message::Text(
        json!({"type": "text", "text": "CSE"}).to_string(),
    ))])
    .chain(stream::pending());
    tokio::time::timeout(Duration::from_secs(5), session.run(inbound, cancel))
        .await
        .expect("session should end once outbound is closed");
    assert_eq!(registry.active_count().await, 0);
}

#[tokio::test]
async fn test_shutdown_cancels_idle_session() {
    let services = services_with(stub_providers(), Arc::new(DetachedSessionStore::new("offline")));
    let registry = services.registry.clone();
    let (tx, mut rx) = mpsc::channel(16);
    let (session, cancel) = SessionConnection::accept(services, None, None, tx).await.unwrap();
    next_event(&mut rx).await;

    let inbound = stream::pending::<Result<Message, std::io::Error>>();
    let running = tokio::spawn(session.run(inbound, cancel));

    assert_eq!(registry.shutdown_all("Server shutting down").await, 1);
    tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("session should stop on cancel")
        .unwrap();
    assert_eq!(next_event(&mut rx).await, ServerEvent::status("Server shutting down"));
    assert_eq!(registry.active_count().await, 0);
}

#[tokio::test]
async fn test_sessions_are_independent() {
    let services = services_with(stub_providers(), Arc::new(DetachedSessionStore::new("offline")));
    let (tx_a, mut rx_a) = mpsc::channel(16);
    let (tx_b, mut rx_b) = mpsc::channel(16);
    let (mut a, _) = SessionConnection::accept(services.clone(), None, None, tx_a).await.unwrap();
    let (mut b, _) = SessionConnection::accept(services.clone(), None, None, tx_b).await.unwrap();
    next_event(&mut rx_a).await;
    next_event(&mut rx_b).await;
    assert_eq!(services.registry.active_count().await, 2);

    let (ra, rb) = tokio::join!(a.dispatch(text("CSE")), b.dispatch(text("electronics")));
    ra.unwrap();
    rb.unwrap();

    assert_eq!(
        next_event(&mut rx_a).await,
        ServerEvent::text("Great, let's begin your CSE interview.\n\nQuestion 1: What is a process?")
    );
    assert_eq!(
        next_event(&mut rx_b).await,
        ServerEvent::text("Great, let's begin your EC interview.\n\nQuestion 1: What is a diode?")
    );
}

#[tokio::test]
async fn test_crashed_dialogue_turn_reports_error_and_session_recovers() {
    let mut providers = stub_providers();
    providers.classifier = Arc::new(CrashOnceClassifier::default());
    let services = services_with(providers, Arc::new(DetachedSessionStore::new("offline")));
    let (tx, mut rx) = mpsc::channel(16);
    let (mut session, _cancel) = SessionConnection::accept(services.clone(), None, None, tx).await.unwrap();
    next_event(&mut rx).await;

    let flow = session.dispatch(text("CSE")).await.unwrap();
    assert_eq!(flow, Flow::Continue);
    match next_event(&mut rx).await {
        ServerEvent::Text { ai_text } => assert!(ai_text.starts_with("Error thinking"), "got {}", ai_text),
        other => panic!("expected error turn, got {:?}", other),
    }
    assert!(matches!(next_event(&mut rx).await, ServerEvent::Audio { .. }));

    // The dialogue lock was poisoned by the crash and is still usable
    session.dispatch(text("CSE")).await.unwrap();
    assert_eq!(
        next_event(&mut rx).await,
        ServerEvent::text("Great, let's begin your CSE interview.\n\nQuestion 1: What is a process?")
    );
    assert!(matches!(next_event(&mut rx).await, ServerEvent::Audio { .. }));
    assert_eq!(services.registry.active_count().await, 1);
    assert_eq!(services.pool.in_flight(), 0);
}
