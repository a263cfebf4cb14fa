use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::RwLock;

use crate::config::ServerConfig;
use crate::engine::Engine;
use crate::gateway::ChannelGateway;
use crate::generator::QuestionGenerator;

/// All room mutations are serialized through this single write lock; the
/// absence of preemption inside a handler is the concurrency guarantee the
/// state machine relies on.
pub type SharedEngine = Arc<RwLock<Engine>>;

#[derive(Clone)]
pub struct AppState {
    pub engine: SharedEngine,
    pub gateway: Arc<ChannelGateway>,
    pub ws_connection_count: Arc<AtomicUsize>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig, generator: Arc<dyn QuestionGenerator>) -> Self {
        let gateway = Arc::new(ChannelGateway::new());
        let engine = Engine::new(
            Arc::clone(&gateway) as Arc<dyn crate::gateway::Gateway>,
            generator,
            &config,
        );
        Self {
            engine: Arc::new(RwLock::new(engine)),
            gateway,
            ws_connection_count: Arc::new(AtomicUsize::new(0)),
            config: Arc::new(config),
        }
    }
}

/// RAII guard for the global WebSocket connection count.
pub struct ConnectionGuard {
    count: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    pub fn new(count: Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::Relaxed);
        Self { count }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_guard_tracks_count() {
        let count = Arc::new(AtomicUsize::new(0));
        {
            let _a = ConnectionGuard::new(Arc::clone(&count));
            let _b = ConnectionGuard::new(Arc::clone(&count));
            assert_eq!(count.load(Ordering::Relaxed), 2);
        }
        assert_eq!(count.load(Ordering::Relaxed), 0);
    }
}
