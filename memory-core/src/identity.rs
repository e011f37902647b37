//! Identity types for engine entities.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;
use uuid::Uuid;

/// Trait for type-safe entity IDs.
///
/// Each entity kind gets its own newtype so ids cannot be mixed up at
/// compile time (a `MemoryId` cannot be passed where an `AgentId` is
/// expected).
pub trait EntityIdType:
    Copy
    + Clone
    + Eq
    + PartialEq
    + Hash
    + fmt::Debug
    + fmt::Display
    + FromStr
    + Serialize
    + serde::de::DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// The name of the entity kind (e.g. "memory", "agent").
    const ENTITY_NAME: &'static str;

    /// Build an id from a raw UUID.
    fn new(uuid: Uuid) -> Self;

    /// The underlying UUID.
    fn as_uuid(&self) -> Uuid;

    /// Nil (all-zero) id, used as a sentinel in tests.
    fn nil() -> Self {
        Self::new(Uuid::nil())
    }

    /// Timestamp-sortable UUIDv7 id. Default constructor for new records.
    fn now_v7() -> Self {
        Self::new(Uuid::now_v7())
    }

    /// Random UUIDv4 id.
    fn new_v4() -> Self {
        Self::new(Uuid::new_v4())
    }
}

/// Error returned when parsing an entity id from a string fails.
#[derive(Debug, Clone)]
pub struct EntityIdParseError {
    pub entity_name: &'static str,
    pub input: String,
    pub source: uuid::Error,
}

impl fmt::Display for EntityIdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to parse {} id from '{}': {}",
            self.entity_name, self.input, self.source
        )
    }
}

impl std::error::Error for EntityIdParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

macro_rules! define_entity_id {
    ($name:ident, $entity:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(Uuid);

        impl EntityIdType for $name {
            const ENTITY_NAME: &'static str = $entity;

            fn new(uuid: Uuid) -> Self {
                Self(uuid)
            }

            fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = EntityIdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::from_str(s)
                    .map(Self::new)
                    .map_err(|e| EntityIdParseError {
                        entity_name: Self::ENTITY_NAME,
                        input: s.to_string(),
                        source: e,
                    })
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::nil()
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                self.0.serialize(serializer)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                Uuid::deserialize(deserializer).map(Self::new)
            }
        }
    };
}

define_entity_id!(MemoryId, "memory", "Type-safe id for a stored memory.");
define_entity_id!(UserId, "user", "Type-safe id for a user/principal.");
define_entity_id!(AgentId, "agent", "Type-safe id for an MaaS agent identity.");
define_entity_id!(PoolId, "pool", "Type-safe id for a shared memory pool.");
define_entity_id!(HandoffId, "handoff", "Type-safe id for an agent handoff.");
define_entity_id!(SessionId, "session", "Type-safe id for an agent session.");
define_entity_id!(NodeId, "node", "Type-safe id for a knowledge graph node.");
define_entity_id!(EventId, "event", "Type-safe id for a temporal event.");
define_entity_id!(
    ProvenanceId,
    "provenance",
    "Type-safe id for a provenance record."
);

/// Timestamp type, always UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_do_not_collide_across_kinds() {
        let m = MemoryId::now_v7();
        let a = AgentId::now_v7();
        assert_ne!(m.as_uuid(), a.as_uuid());
    }

    #[test]
    fn display_and_debug() {
        let id = MemoryId::new(Uuid::nil());
        assert_eq!(
            format!("{:?}", id),
            "MemoryId(00000000-0000-0000-0000-000000000000)"
        );
        assert_eq!(format!("{}", id), "00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn from_str_round_trip() {
        let uuid_str = "550e8400-e29b-41d4-a716-446655440000";
        let id: MemoryId = uuid_str.parse().expect("valid uuid parses");
        assert_eq!(id.to_string(), uuid_str);
    }

    #[test]
    fn from_str_rejects_garbage() {
        let result: Result<MemoryId, _> = "not-a-uuid".parse();
        let err = result.unwrap_err();
        assert_eq!(err.entity_name, "memory");
    }

    #[test]
    fn serde_is_transparent() {
        let id = AgentId::now_v7();
        let json = serde_json::to_string(&id).unwrap();
        assert!(json.starts_with('"') && json.ends_with('"'));
        let back: AgentId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
