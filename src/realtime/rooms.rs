use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Fan-out group of connections
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Room {
    /// Every connection of one user
    User(String),
    /// Participants currently viewing a match chat
    Match(Uuid),
    /// Subscribers of the live feed
    Feed,
}

impl Room {
    pub fn user(user_id: impl Into<String>) -> Self {
        Room::User(user_id.into())
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Room::User(id) => write!(f, "user_{}", id),
            Room::Match(id) => write!(f, "match_{}", id),
            Room::Feed => f.write_str("feed"),
        }
    }
}

impl FromStr for Room {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "feed" {
            return Ok(Room::Feed);
        }
        if let Some(id) = s.strip_prefix("user_") {
            if !id.is_empty() {
                return Ok(Room::User(id.to_string()));
            }
        }
        if let Some(id) = s.strip_prefix("match_") {
            return Uuid::parse_str(id)
                .map(Room::Match)
                .map_err(|e| format!("invalid match room '{}': {}", s, e));
        }
        Err(format!("unknown room: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_names_round_trip() {
        let id = Uuid::new_v4();
        for room in [Room::user("abc"), Room::Match(id), Room::Feed] {
            assert_eq!(room.to_string().parse::<Room>().unwrap(), room);
        }
        assert_eq!(Room::Match(id).to_string(), format!("match_{}", id));
    }

    #[test]
    fn test_bad_room_names() {
        assert!("user_".parse::<Room>().is_err());
        assert!("match_nope".parse::<Room>().is_err());
        assert!("lobby".parse::<Room>().is_err());
    }
}
