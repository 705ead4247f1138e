//! Application state shared across handlers.
//!
//! This is the composition root: the binary hands in the `PostgreSQL`,
//! SMTP and payment processor collaborators, tests hand in the in-memory ones.

use std::sync::Arc;

use sqlx::PgPool;

use crate::services::settings::{Collaborators, ServiceSettings, SettingsService};

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    settings: SettingsService,
    pool: Option<PgPool>,
}

impl AppState {
    /// Build the state from injected collaborators.
    #[must_use]
    pub fn new(collaborators: Collaborators, settings: ServiceSettings) -> Self {
        Self::from_service(SettingsService::new(collaborators, settings))
    }

    /// Build the state around an existing service, sharing its collaborators.
    #[must_use]
    pub fn from_service(settings: SettingsService) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                settings,
                pool: None,
            }),
        }
    }

    /// Attach the database pool probed by the readiness check.
    #[must_use]
    pub fn with_pool(self, pool: PgPool) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                settings: self.inner.settings.clone(),
                pool: Some(pool),
            }),
        }
    }

    /// Get a reference to the settings service.
    #[must_use]
    pub fn settings(&self) -> &SettingsService {
        &self.inner.settings
    }

    /// Whether backing services are reachable. Without a pool there is
    /// nothing to probe.
    pub async fn is_ready(&self) -> bool {
        match &self.inner.pool {
            Some(pool) => sqlx::query("SELECT 1").fetch_one(pool).await.is_ok(),
            None => true,
        }
    }
}
