use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::{
    config::Config,
    services::{spawn_cleanup_task, Clock, Hub, MatchNotifier, Registry, SharedRegistry, SystemClock},
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: SharedRegistry,
    pub hub: Hub,
    pub config: Arc<Config>,
    notifier: MatchNotifier,
}

/// Handles for the tasks started by [`AppState::spawn_background_tasks`]
pub struct BackgroundTasks {
    fanout: JoinHandle<()>,
    cleanup: JoinHandle<()>,
}

impl BackgroundTasks {
    pub fn shutdown(self) {
        self.fanout.abort();
        self.cleanup.abort();
        tracing::info!("Background tasks stopped");
    }
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Self {
        let registry = Registry::with_clock(&config, clock);
        let notifier = registry.notifier();
        let registry = registry.shared();

        Self {
            hub: Hub::new(registry.clone()),
            registry,
            config: Arc::new(config),
            notifier,
        }
    }

    /// Starts match fan-out to sockets and the periodic room cleanup
    pub fn spawn_background_tasks(&self) -> BackgroundTasks {
        let fanout = tokio::spawn(self.hub.clone().run(self.notifier.subscribe()));
        let cleanup = spawn_cleanup_task(
            self.registry.clone(),
            self.config.cleanup_interval(),
            self.config.room_retention_hours,
        );
        BackgroundTasks { fanout, cleanup }
    }
}
