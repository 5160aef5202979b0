use std::fmt;

use serde::{Deserialize, Serialize};

/// Coarse asset family assigned by the classification cascade. The broker
/// treats this as an opaque tag; consumers use it to pick a destination bin.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssetKind {
    Video,
    Audio,
    Image,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Video => write!(f, "video"),
            AssetKind::Audio => write!(f, "audio"),
            AssetKind::Image => write!(f, "image"),
        }
    }
}
