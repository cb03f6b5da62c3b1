//! # Session Registry
//!
//! Holds every mounted measurement screen by session id. Each screen owns its
//! [`MeasurementStep`] and an [`AuthSubscription`] that is released when the
//! screen is unmounted.
//!
//! Async operations follow the same pattern:
//!
//! 1. lock, `begin_*` on the step, unlock
//! 2. await the [`SessionService`]
//! 3. lock, `complete_*` on the step if the screen still exists
//!
//! The lock is never held across an await, so a slow store call on one screen
//! never blocks another. A result that arrives after its screen was unmounted
//! is dropped.
//!
//! A screen is unmounted by `DELETE`, by a successful save (the caller moves
//! on to the history screen), or by the idle sweep that runs on every mount
//! once it has been untouched for [`SESSION_IDLE_TTL_MINUTES`].

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use super::session::{FetchOutcome, IdentityHandoff, MeasurementStep};
use super::session_service::SessionService;
use crate::error::SessionError;
use crate::identity::AuthSubscription;
use shared::{EntryMode, HistoryEntry, MeasurementField, SessionView};

/// Screens untouched for this long are unmounted by the next sweep
pub const SESSION_IDLE_TTL_MINUTES: i64 = 30;

struct MeasurementScreen {
    step: MeasurementStep,
    subscription: AuthSubscription,
    last_active: DateTime<Utc>,
}

impl MeasurementScreen {
    fn view(&self, session_id: &str) -> SessionView {
        self.step.view(session_id, self.subscription.current().status())
    }
}

pub struct SessionRegistry {
    service: SessionService,
    screens: Mutex<HashMap<String, MeasurementScreen>>,
}

impl SessionRegistry {
    pub fn new(service: SessionService) -> Self {
        Self {
            service,
            screens: Mutex::new(HashMap::new()),
        }
    }

    /// Mount a measurement screen for the identity in `handoff`
    pub async fn mount(&self, handoff: &IdentityHandoff) -> Result<SessionView, SessionError> {
        let step = MeasurementStep::from_handoff(handoff)?;
        let session_id = Uuid::new_v4().to_string();
        info!("Mounting measurement session {} for {}", session_id, step.identity().name);

        let now = Utc::now();
        let screen = MeasurementScreen {
            step,
            subscription: self.service.identity().subscribe(),
            last_active: now,
        };
        let view = screen.view(&session_id);

        let mut screens = self.screens.lock().await;
        Self::sweep_locked(&mut screens, now);
        screens.insert(session_id, screen);
        Ok(view)
    }

    /// Unmount every screen idle since before `now - SESSION_IDLE_TTL_MINUTES`
    pub async fn sweep_idle(&self, now: DateTime<Utc>) -> usize {
        Self::sweep_locked(&mut *self.screens.lock().await, now)
    }

    fn sweep_locked(screens: &mut HashMap<String, MeasurementScreen>, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::minutes(SESSION_IDLE_TTL_MINUTES);
        let before = screens.len();
        screens.retain(|session_id, screen| {
            if screen.last_active >= cutoff {
                return true;
            }
            info!("Unmounting idle measurement session {}", session_id);
            screen.step.unmount();
            false
        });
        before - screens.len()
    }

    pub async fn snapshot(&self, session_id: &str) -> Result<SessionView, SessionError> {
        self.with_screen(session_id, |screen| Ok(screen.view(session_id))).await
    }

    /// Drop the screen; results still in flight for it are discarded
    pub async fn unmount(&self, session_id: &str) -> Result<(), SessionError> {
        let mut screen = self
            .screens
            .lock()
            .await
            .remove(session_id)
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;
        screen.step.unmount();
        info!("Unmounted measurement session {}", session_id);
        Ok(())
    }

    pub async fn update_draft(
        &self,
        session_id: &str,
        edits: Vec<(MeasurementField, String)>,
    ) -> Result<SessionView, SessionError> {
        self.with_screen(session_id, |screen| {
            for (field, value) in edits {
                screen.step.set_field(field, value)?;
            }
            Ok(screen.view(session_id))
        })
        .await
    }

    pub async fn set_mode(&self, session_id: &str, mode: EntryMode) -> Result<SessionView, SessionError> {
        self.with_screen(session_id, |screen| {
            screen.step.set_mode(mode);
            Ok(screen.view(session_id))
        })
        .await
    }

    /// List the template keys and fetch the auto-selected one
    pub async fn load_templates(&self, session_id: &str) -> Result<SessionView, SessionError> {
        let ticket = self
            .with_screen(session_id, |screen| screen.step.begin_template_list())
            .await?;

        let result = self.service.list_template_keys().await;

        let (outcome, selected) = self
            .after_await(session_id, |screen| {
                let outcome = screen.step.complete_template_list(ticket, result)?;
                Ok((outcome, screen.step.selected_template().map(str::to_string)))
            })
            .await?;

        match (outcome, selected) {
            (FetchOutcome::Applied, Some(key)) => self.select_template(session_id, &key).await,
            _ => self.snapshot(session_id).await,
        }
    }

    /// Fetch `key` and overwrite the draft with it
    pub async fn select_template(&self, session_id: &str, key: &str) -> Result<SessionView, SessionError> {
        let ticket = self
            .with_screen(session_id, |screen| screen.step.begin_template_fetch(key))
            .await?;

        let result = self.service.fetch_template(key).await;

        self.after_await(session_id, |screen| {
            if screen.step.complete_template_fetch(ticket, result)? == FetchOutcome::Discarded {
                info!("Template {} superseded on session {}", key, session_id);
            }
            Ok(screen.view(session_id))
        })
        .await
    }

    /// Persist the session; succeeds at most once per screen
    pub async fn save(&self, session_id: &str) -> Result<HistoryEntry, SessionError> {
        let (identity, measurements) = self.with_screen(session_id, |screen| screen.step.begin_save()).await?;

        let result = self.service.persist(identity, measurements).await;

        let mut screens = self.screens.lock().await;
        let Some(screen) = screens.get_mut(session_id) else {
            if let Ok(entry) = &result {
                warn!("Session {} closed during save; record {} was kept", session_id, entry.id);
            }
            return result;
        };

        let entry = screen.step.complete_save(result)?;
        if let Some(mut screen) = screens.remove(session_id) {
            screen.step.unmount();
        }
        info!("Measurement session {} finished", session_id);
        Ok(entry)
    }

    pub async fn active_sessions(&self) -> usize {
        self.screens.lock().await.len()
    }

    async fn with_screen<T>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut MeasurementScreen) -> Result<T, SessionError>,
    ) -> Result<T, SessionError> {
        let mut screens = self.screens.lock().await;
        let screen = screens
            .get_mut(session_id)
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;
        screen.last_active = Utc::now();
        f(screen)
    }

    async fn after_await<T>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut MeasurementScreen) -> Result<T, SessionError>,
    ) -> Result<T, SessionError> {
        let mut screens = self.screens.lock().await;
        match screens.get_mut(session_id) {
            Some(screen) => {
                screen.last_active = Utc::now();
                f(screen)
            }
            None => {
                info!("Discarding result for closed session {}", session_id);
                Err(SessionError::SessionClosed(session_id.to_string()))
            }
        }
    }
}
