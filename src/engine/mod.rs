/// Optimistic vote/favourite engine
///
/// Holds the reflected cache (what the UI currently believes), the
/// five-phase mutation coordinator (cancel, snapshot, speculate, invoke,
/// settle) and the action coalescer that bounds network traffic for
/// bursts of repeated user actions.
pub mod cache;
pub mod coalesce;
pub mod coordinator;

use serde::{Deserialize, Serialize};

/// Reserved id for entries created speculatively, before the remote
/// service has assigned a real one. Replaced during the settle-phase
/// refetch.
pub const TEMP_ID: i64 = 9_999_999;

/// Direction of a user's rating on an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteValue {
    Up,
    Down,
}

impl VoteValue {
    /// Wire encoding used by the remote API: 1 = up, 0 = down
    pub fn as_wire(self) -> u8 {
        match self {
            VoteValue::Up => 1,
            VoteValue::Down => 0,
        }
    }

    pub fn from_wire(value: i64) -> Self {
        if value == 1 {
            VoteValue::Up
        } else {
            VoteValue::Down
        }
    }
}

/// One user's rating of one image. At most one vote exists per
/// (user_id, image_id) pair in the cache; a new vote replaces the
/// existing entry in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub id: i64,
    pub image_id: String,
    pub value: VoteValue,
    pub user_id: String,
}

impl Vote {
    /// True while the entry only exists speculatively
    pub fn is_pending(&self) -> bool {
        self.id == TEMP_ID
    }
}

/// A user's bookmark of one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favourite {
    pub id: i64,
    pub image_id: String,
}

impl Favourite {
    pub fn is_pending(&self) -> bool {
        self.id == TEMP_ID
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_value_round_trip() {
        assert_eq!(VoteValue::Up.as_wire(), 1);
        assert_eq!(VoteValue::Down.as_wire(), 0);
        assert_eq!(VoteValue::from_wire(1), VoteValue::Up);
        assert_eq!(VoteValue::from_wire(0), VoteValue::Down);
    }

    #[test]
    fn test_pending_sentinel() {
        let vote = Vote {
            id: TEMP_ID,
            image_id: "img1".to_string(),
            value: VoteValue::Up,
            user_id: "user1".to_string(),
        };
        assert!(vote.is_pending());

        let confirmed = Vote { id: 42, ..vote };
        assert!(!confirmed.is_pending());

        let favourite = Favourite {
            id: TEMP_ID,
            image_id: "img1".to_string(),
        };
        assert!(favourite.is_pending());
    }
}
