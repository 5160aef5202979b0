use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque content fingerprint used for duplicate-skip decisions.
///
/// The broker and target store never look inside the hash; how it is
/// derived (today: name + size + mtime, digested) is entirely the
/// hasher's concern, so it can be strengthened to a full content digest
/// without touching the queue layer.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(pub String);

impl ContentHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ContentHash {
    fn from(raw: String) -> Self {
        ContentHash(raw)
    }
}
