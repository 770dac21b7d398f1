//! Shared gateway state and the in-memory session registry

use quro_common::{
    config::{AppConfig, PipelineConfig},
    errors::{AppError, Result},
    metrics,
};
use quro_context::{Orchestrator, PipelinePorts};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::info;
use uuid::Uuid;

/// A session's pipeline; queries within one session are serialized
pub type SharedSession = Arc<Mutex<Orchestrator>>;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(config: AppConfig, ports: PipelinePorts) -> Self {
        let sessions = SessionRegistry::new(
            ports,
            config.pipeline.clone(),
            config.server.max_sessions,
            config.session_idle_timeout(),
        );
        Self {
            config: Arc::new(config),
            sessions: Arc::new(sessions),
        }
    }
}

struct SessionEntry {
    session: SharedSession,
    last_used: Instant,
}

impl SessionEntry {
    /// Idle past the timeout and not held by a request
    fn is_expired(&self, now: Instant, idle_timeout: Duration) -> bool {
        now.duration_since(self.last_used) >= idle_timeout && Arc::strong_count(&self.session) == 1
    }
}

/// Live sessions keyed by id
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, SessionEntry>>,
    ports: PipelinePorts,
    pipeline: PipelineConfig,
    max_sessions: usize,
    idle_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(
        ports: PipelinePorts,
        pipeline: PipelineConfig,
        max_sessions: usize,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ports,
            pipeline,
            max_sessions,
            idle_timeout,
        }
    }

    /// Open a new session in corpus mode, dropping idle sessions first
    pub async fn create(&self) -> Result<Uuid> {
        let mut sessions = self.sessions.write().await;

        let now = Instant::now();
        let before = sessions.len();
        sessions.retain(|_, entry| !entry.is_expired(now, self.idle_timeout));
        if sessions.len() < before {
            info!(expired = before - sessions.len(), "Idle sessions dropped");
        }

        if sessions.len() >= self.max_sessions {
            metrics::set_active_sessions(sessions.len());
            return Err(AppError::ServiceUnavailable {
                message: format!("Session limit of {} reached", self.max_sessions),
            });
        }

        let id = Uuid::new_v4();
        let orchestrator = Orchestrator::new(self.ports.clone(), self.pipeline.clone());
        sessions.insert(
            id,
            SessionEntry {
                session: Arc::new(Mutex::new(orchestrator)),
                last_used: now,
            },
        );
        metrics::set_active_sessions(sessions.len());

        info!(session_id = %id, active = sessions.len(), "Session created");
        Ok(id)
    }

    /// Look up a session and mark it used
    pub async fn get(&self, id: Uuid) -> Result<SharedSession> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(&id)
            .ok_or_else(|| AppError::SessionNotFound { id: id.to_string() })?;
        entry.last_used = Instant::now();
        Ok(entry.session.clone())
    }

    pub async fn remove(&self, id: Uuid) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions
            .remove(&id)
            .ok_or_else(|| AppError::SessionNotFound { id: id.to_string() })?;
        metrics::set_active_sessions(sessions.len());

        info!(session_id = %id, active = sessions.len(), "Session closed");
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quro_common::{
        config::{VectorStoreConfig, WebSearchConfig},
        embeddings::MockEmbedder,
        llm::MockGenerator,
    };
    use quro_ingestion::FileExtractor;
    use quro_search::{QdrantIndex, SerpApiSearcher};

    const HOUR: Duration = Duration::from_secs(3600);

    fn registry(max_sessions: usize) -> SessionRegistry {
        let ports = PipelinePorts {
            generator: Arc::new(MockGenerator),
            embedder: Arc::new(MockEmbedder::new(8)),
            index: Arc::new(QdrantIndex::new(&VectorStoreConfig::default()).unwrap()),
            searcher: Arc::new(SerpApiSearcher::new(WebSearchConfig::default()).unwrap()),
            extractor: Arc::new(FileExtractor::new()),
        };
        SessionRegistry::new(ports, PipelineConfig::default(), max_sessions, HOUR)
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_sessions_release_slots() {
        let registry = registry(3);
        for _ in 0..3 {
            registry.create().await.unwrap();
        }
        assert!(matches!(
            registry.create().await,
            Err(AppError::ServiceUnavailable { .. })
        ));

        tokio::time::advance(Duration::from_secs(7 * 24 * 3600)).await;

        let id = registry.create().await.unwrap();
        assert_eq!(registry.len().await, 1);
        assert!(registry.get(id).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_recent_use_keeps_session() {
        let registry = registry(2);
        let active = registry.create().await.unwrap();
        let idle = registry.create().await.unwrap();

        tokio::time::advance(HOUR / 2).await;
        registry.get(active).await.unwrap();
        tokio::time::advance(HOUR / 2).await;

        registry.create().await.unwrap();
        assert!(registry.get(active).await.is_ok());
        assert!(matches!(
            registry.get(idle).await,
            Err(AppError::SessionNotFound { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_in_use_not_expired() {
        let registry = registry(1);
        let id = registry.create().await.unwrap();
        let held = registry.get(id).await.unwrap();

        tokio::time::advance(HOUR * 2).await;

        assert!(registry.create().await.is_err());
        drop(held);
        assert!(registry.create().await.is_ok());
    }
}
