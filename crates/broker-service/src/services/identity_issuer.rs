//! Participant identity issuance.
//!
//! Roles alternate by issue order: the 1st, 3rd, 5th... participant is an
//! investor, the 2nd, 4th, 6th... an idea. The roster is kept for diagnostics
//! and never pruned.

use common::types::{ParticipantId, Role};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

/// An issued identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: ParticipantId,
    pub role: Role,
}

#[derive(Debug, Default)]
struct IssuedIdentities {
    /// Issue order.
    roster: Vec<Participant>,
    roles: HashMap<ParticipantId, Role>,
}

#[derive(Debug, Default)]
pub struct IdentityIssuer {
    issued: Mutex<IssuedIdentities>,
}

impl IdentityIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a new participant. Index and append happen under one lock so
    /// concurrent callers still alternate.
    pub async fn issue(&self) -> Participant {
        let mut issued = self.issued.lock().await;
        let participant = Participant {
            id: ParticipantId::new(),
            role: Role::for_issue_index(issued.roster.len()),
        };
        issued.roster.push(participant);
        issued.roles.insert(participant.id, participant.role);

        debug!(
            target: "broker.services.identity_issuer",
            participant_id = %participant.id,
            role = %participant.role,
            "Issued identity"
        );
        participant
    }

    /// Role a participant was issued with, if it was issued here.
    pub async fn role_of(&self, id: ParticipantId) -> Option<Role> {
        self.issued.lock().await.roles.get(&id).copied()
    }

    /// Every participant issued so far, in issue order.
    pub async fn roster(&self) -> Vec<Participant> {
        self.issued.lock().await.roster.clone()
    }
}
