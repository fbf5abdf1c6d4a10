//! Live interview sessions
//!
//! [`SessionServices`] holds the process-scoped collaborators every session
//! shares. Each accepted WebSocket gets its own [`SessionConnection`].

pub mod connection;
pub mod registry;
pub mod worker_pool;

pub use connection::{Flow, SessionConnection, TransportClosed};
pub use registry::{ConnectionInfo, ConnectionRegistry};
pub use worker_pool::{PoolError, WorkerPool};

use crate::providers::Providers;
use crate::scoring::ScoreAggregator;
use crate::store::SessionStore;
use icoach_common::config::{DialogueConfig, SegmenterConfig, TomlConfig};
use std::sync::Arc;

#[derive(Clone)]
pub struct SessionServices {
    pub pool: WorkerPool,
    pub providers: Providers,
    pub aggregator: ScoreAggregator,
    pub store: Arc<dyn SessionStore>,
    pub registry: ConnectionRegistry,
    pub segmenter: SegmenterConfig,
    pub dialogue: DialogueConfig,
}

impl SessionServices {
    pub fn new(config: &TomlConfig, providers: Providers, store: Arc<dyn SessionStore>) -> Self {
        Self {
            pool: WorkerPool::new(config.worker_pool.size),
            providers,
            aggregator: ScoreAggregator::new(config.scoring),
            store,
            registry: ConnectionRegistry::new(),
            segmenter: config.segmenter,
            dialogue: config.dialogue.clone(),
        }
    }
}
