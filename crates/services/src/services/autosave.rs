//! Debounced autosave of quiz progress with a local fallback copy.
//!
//! Every change schedules a save after a quiet period; a newer change cancels
//! the pending one so only the latest snapshot reaches the server. Saves write
//! the local copy first, so a failed or slow remote call never loses answers
//! and never blocks the quiz.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::{sync::Mutex, task::JoinHandle, time::timeout};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    intake::{CompleteIntakeRequest, CompleteIntakeResponse, SaveIntakeRequest},
    intake_api::IntakeApiError,
    local_fallback::FallbackStoreError,
};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);
pub const DEFAULT_SAVE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_COMPLETE_TIMEOUT: Duration = Duration::from_secs(15);

#[async_trait]
pub trait RemoteIntakeStore: Send + Sync + 'static {
    async fn save(&self, snapshot: &SaveIntakeRequest) -> Result<(), IntakeApiError>;

    async fn complete(
        &self,
        request: &CompleteIntakeRequest,
    ) -> Result<CompleteIntakeResponse, IntakeApiError>;
}

#[async_trait]
pub trait LocalFallbackStore: Send + Sync + 'static {
    async fn store(&self, snapshot: &SaveIntakeRequest) -> Result<(), FallbackStoreError>;

    async fn load(&self, session_id: Uuid) -> Result<Option<SaveIntakeRequest>, FallbackStoreError>;

    async fn clear(&self, session_id: Uuid) -> Result<(), FallbackStoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SaveOutcome {
    Saved,
    /// The remote save failed; answers only live in the local copy.
    LocalOnly { warning: String },
}

#[derive(Debug, Error)]
pub enum AutosaveError {
    #[error(transparent)]
    Completion(#[from] IntakeApiError),
    #[error("completion timed out after {0:?}")]
    Timeout(Duration),
}

impl AutosaveError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Completion(e) => e.user_message(),
            Self::Timeout(_) => {
                "Finishing the intake took too long. Your answers are kept locally, please try again."
                    .to_string()
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AutosaveSettings {
    pub debounce: Duration,
    pub save_timeout: Duration,
    pub complete_timeout: Duration,
}

impl Default for AutosaveSettings {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            save_timeout: DEFAULT_SAVE_TIMEOUT,
            complete_timeout: DEFAULT_COMPLETE_TIMEOUT,
        }
    }
}

pub struct AutosaveCoordinator<R, L> {
    remote: Arc<R>,
    local: Arc<L>,
    settings: AutosaveSettings,
    pending: Mutex<Option<JoinHandle<SaveOutcome>>>,
}

async fn save_snapshot<R: RemoteIntakeStore, L: LocalFallbackStore>(
    remote: &R,
    local: &L,
    save_timeout: Duration,
    snapshot: &SaveIntakeRequest,
) -> SaveOutcome {
    if let Err(e) = local.store(snapshot).await {
        warn!(session_id = %snapshot.session_id, error = %e, "Failed to write local intake copy");
    }

    let warning = match timeout(save_timeout, remote.save(snapshot)).await {
        Ok(Ok(())) => {
            debug!(session_id = %snapshot.session_id, step = %snapshot.current_step, "Intake autosaved");
            return SaveOutcome::Saved;
        }
        Ok(Err(e)) => {
            warn!(session_id = %snapshot.session_id, error = %e, "Intake autosave failed");
            e.user_message()
        }
        Err(_) => {
            warn!(session_id = %snapshot.session_id, timeout = ?save_timeout, "Intake autosave timed out");
            IntakeApiError::Timeout.user_message()
        }
    };
    SaveOutcome::LocalOnly { warning }
}

impl<R: RemoteIntakeStore, L: LocalFallbackStore> AutosaveCoordinator<R, L> {
    pub fn new(remote: Arc<R>, local: Arc<L>, settings: AutosaveSettings) -> Self {
        Self {
            remote,
            local,
            settings,
            pending: Mutex::new(None),
        }
    }

    async fn cancel_pending(&self) {
        if let Some(handle) = self.pending.lock().await.take() {
            if !handle.is_finished() {
                handle.abort();
                debug!("Superseded pending autosave");
            }
        }
    }

    /// Save `snapshot` once no newer snapshot arrives within the debounce
    /// window.
    pub async fn schedule(&self, snapshot: SaveIntakeRequest) {
        let mut pending = self.pending.lock().await;
        if let Some(handle) = pending.take() {
            handle.abort();
        }

        let remote = Arc::clone(&self.remote);
        let local = Arc::clone(&self.local);
        let settings = self.settings;
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(settings.debounce).await;
            save_snapshot(remote.as_ref(), local.as_ref(), settings.save_timeout, &snapshot).await
        }));
    }

    /// Wait for the pending debounced save, if any, and report its outcome.
    pub async fn flush(&self) -> Option<SaveOutcome> {
        let handle = self.pending.lock().await.take()?;
        handle.await.ok()
    }

    /// Save immediately, dropping any pending debounced save.
    pub async fn force_save(&self, snapshot: &SaveIntakeRequest) -> SaveOutcome {
        self.cancel_pending().await;
        save_snapshot(
            self.remote.as_ref(),
            self.local.as_ref(),
            self.settings.save_timeout,
            snapshot,
        )
        .await
    }

    /// Force-save the final snapshot, then complete the intake. A failed save
    /// does not stop completion; the local copy is cleared only once
    /// completion succeeds.
    pub async fn complete(
        &self,
        snapshot: &SaveIntakeRequest,
    ) -> Result<CompleteIntakeResponse, AutosaveError> {
        if let SaveOutcome::LocalOnly { warning } = self.force_save(snapshot).await {
            warn!(session_id = %snapshot.session_id, %warning, "Completing intake without a final save");
        }

        let request = CompleteIntakeRequest::from(snapshot);
        let response = timeout(self.settings.complete_timeout, self.remote.complete(&request))
            .await
            .map_err(|_| AutosaveError::Timeout(self.settings.complete_timeout))??;

        if let Err(e) = self.local.clear(snapshot.session_id).await {
            warn!(session_id = %snapshot.session_id, error = %e, "Failed to clear local intake copy");
        }
        info!(session_id = %snapshot.session_id, profile_id = %response.profile_id, "Intake completed");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Mutex as StdMutex};

    use serde_json::json;

    use super::*;
    use crate::services::normalized_profile::compute_normalized_profile;

    #[derive(Default)]
    struct RecordingRemote {
        saves: StdMutex<Vec<SaveIntakeRequest>>,
        completions: StdMutex<Vec<CompleteIntakeRequest>>,
        fail_saves: bool,
        save_delay: Duration,
    }

    #[async_trait]
    impl RemoteIntakeStore for RecordingRemote {
        async fn save(&self, snapshot: &SaveIntakeRequest) -> Result<(), IntakeApiError> {
            tokio::time::sleep(self.save_delay).await;
            if self.fail_saves {
                return Err(IntakeApiError::Network("connection reset".to_string()));
            }
            self.saves.lock().unwrap().push(snapshot.clone());
            Ok(())
        }

        async fn complete(
            &self,
            request: &CompleteIntakeRequest,
        ) -> Result<CompleteIntakeResponse, IntakeApiError> {
            self.completions.lock().unwrap().push(request.clone());
            Ok(CompleteIntakeResponse {
                profile_id: Uuid::new_v4(),
                normalized_profile: compute_normalized_profile(&request.responses, &request.disciplines),
            })
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        copies: StdMutex<HashMap<Uuid, SaveIntakeRequest>>,
    }

    #[async_trait]
    impl LocalFallbackStore for MemoryStore {
        async fn store(&self, snapshot: &SaveIntakeRequest) -> Result<(), FallbackStoreError> {
            self.copies
                .lock()
                .unwrap()
                .insert(snapshot.session_id, snapshot.clone());
            Ok(())
        }

        async fn load(&self, session_id: Uuid) -> Result<Option<SaveIntakeRequest>, FallbackStoreError> {
            Ok(self.copies.lock().unwrap().get(&session_id).cloned())
        }

        async fn clear(&self, session_id: Uuid) -> Result<(), FallbackStoreError> {
            self.copies.lock().unwrap().remove(&session_id);
            Ok(())
        }
    }

    fn snapshot(session_id: Uuid, step: &str, budget: &str) -> SaveIntakeRequest {
        SaveIntakeRequest {
            session_id,
            user_id: None,
            responses: json!({ "budget_range": budget }).as_object().cloned().unwrap(),
            current_step: step.to_string(),
            disciplines: vec![],
        }
    }

    fn coordinator(
        remote: RecordingRemote,
    ) -> (
        AutosaveCoordinator<RecordingRemote, MemoryStore>,
        Arc<RecordingRemote>,
        Arc<MemoryStore>,
    ) {
        let remote = Arc::new(remote);
        let local = Arc::new(MemoryStore::default());
        let coordinator =
            AutosaveCoordinator::new(remote.clone(), local.clone(), AutosaveSettings::default());
        (coordinator, remote, local)
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_changes_produce_one_save_with_final_state() {
        let (coordinator, remote, _) = coordinator(RecordingRemote::default());
        let session_id = Uuid::new_v4();

        coordinator.schedule(snapshot(session_id, "goals", "under_10k")).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        coordinator.schedule(snapshot(session_id, "goals", "10k_25k")).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        coordinator.schedule(snapshot(session_id, "home_type", "25k_50k")).await;

        assert_eq!(coordinator.flush().await, Some(SaveOutcome::Saved));

        let saves = remote.saves.lock().unwrap();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].current_step, "home_type");
        assert_eq!(saves[0].responses["budget_range"], "25k_50k");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_remote_save_keeps_local_copy() {
        let (coordinator, _, local) = coordinator(RecordingRemote {
            fail_saves: true,
            ..Default::default()
        });
        let snap = snapshot(Uuid::new_v4(), "goals", "under_10k");

        let outcome = coordinator.force_save(&snap).await;
        assert!(matches!(outcome, SaveOutcome::LocalOnly { warning } if warning.contains("reach")));
        assert_eq!(local.load(snap.session_id).await.unwrap(), Some(snap));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_remote_save_times_out() {
        let (coordinator, remote, _) = coordinator(RecordingRemote {
            save_delay: Duration::from_secs(30),
            ..Default::default()
        });

        let outcome = coordinator
            .force_save(&snapshot(Uuid::new_v4(), "goals", "under_10k"))
            .await;
        assert!(matches!(outcome, SaveOutcome::LocalOnly { .. }));
        assert!(remote.saves.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_proceeds_after_failed_save_and_clears_copy() {
        let (coordinator, remote, local) = coordinator(RecordingRemote {
            fail_saves: true,
            ..Default::default()
        });
        let snap = snapshot(Uuid::new_v4(), "disciplines", "over_100k");

        let response = coordinator.complete(&snap).await.unwrap();
        assert_eq!(response.normalized_profile.budget.min, 100_000.0);
        assert_eq!(remote.completions.lock().unwrap().len(), 1);
        assert!(local.load(snap.session_id).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_save_cancels_pending_debounce() {
        let (coordinator, remote, _) = coordinator(RecordingRemote::default());
        let session_id = Uuid::new_v4();

        coordinator.schedule(snapshot(session_id, "goals", "under_10k")).await;
        let outcome = coordinator
            .force_save(&snapshot(session_id, "home_type", "10k_25k"))
            .await;
        assert_eq!(outcome, SaveOutcome::Saved);
        assert_eq!(coordinator.flush().await, None);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(remote.saves.lock().unwrap().len(), 1);
    }
}
