use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::id::{ChannelId, UserId};

/// Who may open a realtime connection to a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    #[default]
    Public,
    Private,
}

impl AccessType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }

    #[must_use]
    pub const fn is_private(&self) -> bool {
        matches!(self, Self::Private)
    }
}

impl FromStr for AccessType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            _ => Err(format!("Unknown access type: {s}")),
        }
    }
}

impl std::fmt::Display for AccessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    pub admin_id: UserId,
    pub access_type: AccessType,
    pub created_at: DateTime<Utc>,
}

impl Channel {
    pub fn new(name: impl Into<String>, admin_id: UserId, access_type: AccessType) -> Self {
        Self {
            id: ChannelId::new(),
            name: name.into(),
            admin_id,
            access_type,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_type_round_trip() {
        assert_eq!("private".parse::<AccessType>().unwrap(), AccessType::Private);
        assert_eq!(AccessType::Public.to_string(), "public");
        assert!("secret".parse::<AccessType>().is_err());
    }
}
