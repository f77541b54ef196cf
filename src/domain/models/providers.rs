//! Correlation identifiers and the provider context handed to techniques.

use tracing::{info, warn};
use uuid::Uuid;

/// Environment variable that overrides the correlation identifier of a run.
///
/// Read through the configuration layer as `detonation_id`.
pub const DETONATION_ID_ENV_VAR: &str = "DETONATOR_DETONATION_ID";

const USER_AGENT_PREFIX: &str = "detonator_";

/// Resolve the correlation identifier for one runner.
///
/// An override that is not a valid UUID is ignored with a warning.
pub fn resolve_correlation_id(override_id: Option<&str>) -> Uuid {
    let Some(raw) = override_id.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Uuid::new_v4();
    };

    match Uuid::parse_str(raw) {
        Ok(id) => {
            info!(correlation_id = %id, "{DETONATION_ID_ENV_VAR} is set, using it as the correlation ID");
            id
        }
        Err(err) => {
            warn!(
                value = raw,
                error = %err,
                "{DETONATION_ID_ENV_VAR} is not a valid UUID, falling back to a randomly-generated one"
            );
            Uuid::new_v4()
        }
    }
}

/// User-agent token tagging every outbound call of a run.
pub fn user_agent_for(correlation_id: Uuid) -> String {
    format!("{USER_AGENT_PREFIX}{correlation_id}")
}

/// Context handed to detonate and revert actions.
///
/// Scoped to the correlation identifier of the run so that cloud clients
/// built by a technique carry the same user-agent as the provisioning step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloudProviders {
    correlation_id: Uuid,
}

impl CloudProviders {
    pub fn new(correlation_id: Uuid) -> Self {
        Self { correlation_id }
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    pub fn user_agent(&self) -> String {
        user_agent_for(self.correlation_id)
    }
}
