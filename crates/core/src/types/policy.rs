//! Policies for adjusting committed cart lines.

use serde::{Deserialize, Serialize};

/// What happens when a committed line is decremented below one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DecrementPolicy {
    /// The quantity saturates at one; removal is an explicit action.
    #[default]
    FloorAtOne,
    /// Reaching zero removes the line.
    RemoveAtZero,
}

impl DecrementPolicy {
    /// Quantity after applying `delta`, or `None` when the line should go.
    #[must_use]
    pub fn apply(self, current: u32, delta: i64) -> Option<u32> {
        let next = i64::from(current).saturating_add(delta);
        match self {
            Self::FloorAtOne => Some(u32::try_from(next.max(1)).unwrap_or(u32::MAX)),
            Self::RemoveAtZero if next <= 0 => None,
            Self::RemoveAtZero => Some(u32::try_from(next).unwrap_or(u32::MAX)),
        }
    }
}

impl std::fmt::Display for DecrementPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FloorAtOne => write!(f, "floor_at_one"),
            Self::RemoveAtZero => write!(f, "remove_at_zero"),
        }
    }
}

impl std::str::FromStr for DecrementPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "floor_at_one" => Ok(Self::FloorAtOne),
            "remove_at_zero" => Ok(Self::RemoveAtZero),
            _ => Err(format!("invalid decrement policy: {s}")),
        }
    }
}
