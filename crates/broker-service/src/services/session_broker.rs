//! Session broker.
//!
//! Wraps the video provider: creates sessions for participants who have to
//! wait, mints tokens on an existing session for participants who were
//! matched, and remembers which archive and broadcast is running on each
//! session so callers only ever pass a session id.

use crate::errors::BrokerError;
use crate::observability::metrics::record_token_issued;
use crate::services::match_registry::SessionRecord;
use crate::services::video_client::{BroadcastStarted, VideoClient};
use common::types::{ArchiveId, BroadcastId, ParticipantId, SessionId};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, instrument};

/// Everything a client needs to join a session.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCredentials {
    pub api_key: String,
    pub session_id: SessionId,
    pub token: String,
}

impl fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("api_key", &self.api_key)
            .field("session_id", &self.session_id)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone)]
enum Slot<T> {
    /// Provider call in flight.
    Starting,
    Active(T),
}

/// At most one running handle of a kind per session.
#[derive(Debug)]
struct HandleTable<T> {
    kind: &'static str,
    slots: Mutex<HashMap<SessionId, Slot<T>>>,
}

impl<T: Clone> HandleTable<T> {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Claim the session before calling the provider.
    async fn reserve(&self, session_id: &SessionId) -> Result<(), BrokerError> {
        let mut slots = self.slots.lock().await;
        if slots.contains_key(session_id) {
            return Err(BrokerError::Conflict(format!(
                "Session already has an active {}",
                self.kind
            )));
        }
        slots.insert(session_id.clone(), Slot::Starting);
        Ok(())
    }

    async fn activate(&self, session_id: &SessionId, handle: T) {
        self.slots
            .lock()
            .await
            .insert(session_id.clone(), Slot::Active(handle));
    }

    async fn release(&self, session_id: &SessionId) {
        self.slots.lock().await.remove(session_id);
    }

    /// Remove and return the running handle.
    async fn take(&self, session_id: &SessionId) -> Result<T, BrokerError> {
        let mut slots = self.slots.lock().await;
        match slots.get(session_id) {
            None => Err(BrokerError::NotFound(format!(
                "No active {} for session",
                self.kind
            ))),
            Some(Slot::Starting) => Err(BrokerError::Conflict(format!(
                "The {} for this session is still starting",
                self.kind
            ))),
            Some(Slot::Active(handle)) => {
                let handle = handle.clone();
                slots.remove(session_id);
                Ok(handle)
            }
        }
    }

    async fn active_count(&self) -> usize {
        self.slots
            .lock()
            .await
            .values()
            .filter(|slot| matches!(slot, Slot::Active(_)))
            .count()
    }
}

pub struct SessionBroker {
    video: Arc<dyn VideoClient>,
    archives: HandleTable<ArchiveId>,
    broadcasts: HandleTable<BroadcastStarted>,
}

impl SessionBroker {
    pub fn new(video: Arc<dyn VideoClient>) -> Self {
        Self {
            video,
            archives: HandleTable::new("archive"),
            broadcasts: HandleTable::new("broadcast"),
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.video.provider_name()
    }

    /// Create a fresh routed session for `participant` and a token on it.
    ///
    /// The returned record is for the registry to store; nothing is stored
    /// here. On error the participant must not be queued.
    #[instrument(skip_all, fields(participant_id = %participant))]
    pub async fn create_session(
        &self,
        participant: ParticipantId,
    ) -> Result<(SessionCredentials, SessionRecord), BrokerError> {
        let session_id = self.video.create_session().await?;
        let token = self.video.generate_token(&session_id)?;
        record_token_issued("new_session");

        info!(
            target: "broker.services.session_broker",
            session_id = %session_id,
            "Created session for waiting participant"
        );

        let credentials = SessionCredentials {
            api_key: self.video.api_key().to_string(),
            session_id: session_id.clone(),
            token,
        };
        Ok((credentials, SessionRecord::new(session_id)))
    }

    /// Mint a token on the session `matched` was waiting in.
    ///
    /// # Errors
    ///
    /// `BrokerError::SessionNotFound` if the registry handed over no record.
    #[instrument(skip_all, fields(participant_id = %matched))]
    pub fn resolve_for_match(
        &self,
        matched: ParticipantId,
        session: Option<SessionRecord>,
    ) -> Result<SessionCredentials, BrokerError> {
        let Some(record) = session else {
            error!(
                target: "broker.services.session_broker",
                participant_id = %matched,
                "Matched participant had no session record"
            );
            return Err(BrokerError::SessionNotFound(matched.to_string()));
        };

        let token = self.video.generate_token(&record.session_id)?;
        record_token_issued("matched_session");

        Ok(SessionCredentials {
            api_key: self.video.api_key().to_string(),
            session_id: record.session_id,
            token,
        })
    }

    /// Start recording a session. The archive is named after the session.
    #[instrument(skip_all, fields(session_id = %session_id))]
    pub async fn start_archive(&self, session_id: &SessionId) -> Result<ArchiveId, BrokerError> {
        self.archives.reserve(session_id).await?;

        match self
            .video
            .start_archive(session_id, session_id.as_str())
            .await
        {
            Ok(archive_id) => {
                self.archives.activate(session_id, archive_id.clone()).await;
                info!(target: "broker.services.session_broker", archive_id = %archive_id, "Archive started");
                Ok(archive_id)
            }
            Err(e) => {
                self.archives.release(session_id).await;
                Err(e)
            }
        }
    }

    /// Stop the running archive of a session.
    #[instrument(skip_all, fields(session_id = %session_id))]
    pub async fn stop_archive(&self, session_id: &SessionId) -> Result<ArchiveId, BrokerError> {
        let archive_id = self.archives.take(session_id).await?;

        if let Err(e) = self.video.stop_archive(&archive_id).await {
            // Still running as far as we know
            self.archives.activate(session_id, archive_id).await;
            return Err(e);
        }

        info!(target: "broker.services.session_broker", archive_id = %archive_id, "Archive stopped");
        Ok(archive_id)
    }

    /// Start an HLS broadcast of a session.
    #[instrument(skip_all, fields(session_id = %session_id))]
    pub async fn start_broadcast(
        &self,
        session_id: &SessionId,
    ) -> Result<BroadcastStarted, BrokerError> {
        self.broadcasts.reserve(session_id).await?;

        match self.video.start_broadcast(session_id).await {
            Ok(broadcast) => {
                self.broadcasts
                    .activate(session_id, broadcast.clone())
                    .await;
                info!(target: "broker.services.session_broker", broadcast_id = %broadcast.id, "Broadcast started");
                Ok(broadcast)
            }
            Err(e) => {
                self.broadcasts.release(session_id).await;
                Err(e)
            }
        }
    }

    /// Stop the running broadcast of a session.
    #[instrument(skip_all, fields(session_id = %session_id))]
    pub async fn stop_broadcast(&self, session_id: &SessionId) -> Result<BroadcastId, BrokerError> {
        let broadcast = self.broadcasts.take(session_id).await?;

        if let Err(e) = self.video.stop_broadcast(&broadcast.id).await {
            self.broadcasts.activate(session_id, broadcast).await;
            return Err(e);
        }

        info!(target: "broker.services.session_broker", broadcast_id = %broadcast.id, "Broadcast stopped");
        Ok(broadcast.id)
    }

    /// Number of running archives and broadcasts.
    pub async fn active_counts(&self) -> (usize, usize) {
        (
            self.archives.active_count().await,
            self.broadcasts.active_count().await,
        )
    }
}
