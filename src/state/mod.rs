//! Shared application state and the in-memory room domain model.

pub mod lifecycle;
pub mod room;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{
    config::AppConfig,
    dao::{room::RoomRepository, room_store::RoomStore},
    error::ServiceError,
    services::question_bank::QuestionSource,
};

/// Cheaply cloneable handle to the application state.
pub type SharedState = Arc<AppState>;

/// Central application state: storage handle, policy configuration, and the
/// question content provider.
pub struct AppState {
    room_store: RwLock<Option<Arc<dyn RoomStore>>>,
    degraded: watch::Sender<bool>,
    config: AppConfig,
    questions: Arc<dyn QuestionSource>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig, questions: Arc<dyn QuestionSource>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            room_store: RwLock::new(None),
            degraded: degraded_tx,
            config,
            questions,
        })
    }

    /// Obtain a handle to the current room store, if one is installed.
    pub async fn room_store(&self) -> Option<Arc<dyn RoomStore>> {
        let guard = self.room_store.read().await;
        guard.as_ref().cloned()
    }

    /// Install a new room store implementation and leave degraded mode.
    pub async fn set_room_store(&self, store: Arc<dyn RoomStore>) {
        {
            let mut guard = self.room_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current room store and enter degraded mode.
    pub async fn clear_room_store(&self) {
        {
            let mut guard = self.room_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    ///
    /// The flag is the watch channel's value, not the store slot: the
    /// supervisor can raise it while a sick store is still installed.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded flag changes.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update the degraded flag, notifying watchers only on a real change.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            let changed = *current != value;
            *current = value;
            changed
        });
    }

    /// Transactional repository over the installed store, or a degraded-mode
    /// error when the flag is raised or no backend is available.
    pub async fn repository(&self) -> Result<RoomRepository, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.room_store()
            .await
            .map(RoomRepository::new)
            .ok_or(ServiceError::Degraded)
    }

    /// Room lifecycle policy values.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Question content provider used at room creation.
    pub fn question_source(&self) -> &Arc<dyn QuestionSource> {
        &self.questions
    }
}
