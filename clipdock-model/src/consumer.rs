use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Downstream editor families a job can be routed to. Each family has its
/// own pending queue and active-target record in the broker.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConsumerKind {
    Premiere,
    AfterEffects,
}

impl ConsumerKind {
    /// All known consumer families, in routing-priority order.
    pub const ALL: [ConsumerKind; 2] = [ConsumerKind::Premiere, ConsumerKind::AfterEffects];
}

impl fmt::Display for ConsumerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsumerKind::Premiere => write!(f, "premiere"),
            ConsumerKind::AfterEffects => write!(f, "afterEffects"),
        }
    }
}

impl FromStr for ConsumerKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "premiere" => Ok(ConsumerKind::Premiere),
            "afterEffects" | "after-effects" => Ok(ConsumerKind::AfterEffects),
            other => Err(ModelError::UnknownConsumer(other.to_string())),
        }
    }
}
