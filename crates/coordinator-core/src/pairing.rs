//! Partner and role resolution
//!
//! The party service hands both clients the same party string, `"<id>:<id>"`.
//! Each client finds its partner as "the id that isn't mine" and takes the
//! primary role if its own id comes first. Both peers therefore agree on the
//! roles without exchanging a single message.
//!
//! ```rust
//! use tandem_coordinator_core::pairing::PairingIdentity;
//! use tandem_coordinator_core::types::{ParticipantId, Role};
//!
//! let alice = PairingIdentity::new(ParticipantId(123), "123:456").resolve().unwrap();
//! let bob = PairingIdentity::new(ParticipantId(456), "123:456").resolve().unwrap();
//!
//! assert_eq!(alice.partner_id, Some(ParticipantId(456)));
//! assert_eq!(alice.role, Role::Primary);
//! assert_eq!(bob.partner_id, Some(ParticipantId(123)));
//! assert_eq!(bob.role, Role::Secondary);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{SessionError, SessionResult};
use crate::types::{ParticipantId, Role};

const PARTY_SEPARATOR: char = ':';

/// Raw pairing input owned by the party service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingIdentity {
    pub self_id: ParticipantId,
    pub party_id: String,
    /// Sandbox sessions pair the player with themselves
    pub sandbox: bool,
}

impl PairingIdentity {
    pub fn new(self_id: ParticipantId, party_id: impl Into<String>) -> Self {
        Self {
            self_id,
            party_id: party_id.into(),
            sandbox: false,
        }
    }

    pub fn sandbox(self_id: ParticipantId) -> Self {
        Self {
            self_id,
            party_id: String::new(),
            sandbox: true,
        }
    }

    /// Derive partner and role
    pub fn resolve(&self) -> SessionResult<Pairing> {
        if self.sandbox {
            return Ok(Pairing {
                self_id: self.self_id,
                partner_id: Some(self.self_id),
                role: Role::Primary,
                sandbox: true,
                test_mode: false,
            });
        }

        let ids = self
            .party_id
            .split(PARTY_SEPARATOR)
            .map(|raw| {
                raw.trim()
                    .parse::<u64>()
                    .map(ParticipantId)
                    .map_err(|e| SessionError::pairing(&self.party_id, format!("'{}': {}", raw, e)))
            })
            .collect::<SessionResult<Vec<_>>>()?;

        let first = *ids
            .first()
            .ok_or_else(|| SessionError::pairing(&self.party_id, "party id is empty"))?;

        let partner_id = ids.iter().copied().find(|id| *id != self.self_id);

        // No partner in the party string: play alone as primary
        let test_mode = partner_id.is_none();
        let role = if test_mode || first == self.self_id {
            Role::Primary
        } else {
            Role::Secondary
        };

        Ok(Pairing {
            self_id: self.self_id,
            partner_id,
            role,
            sandbox: false,
            test_mode,
        })
    }
}

/// Resolved pairing; immutable for the lifetime of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pairing {
    pub self_id: ParticipantId,
    pub partner_id: Option<ParticipantId>,
    pub role: Role,
    pub sandbox: bool,
    /// The party string named nobody but us
    pub test_mode: bool,
}

impl Pairing {
    pub fn is_primary(&self) -> bool {
        self.role == Role::Primary
    }
}
