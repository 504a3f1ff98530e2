//! Sortable, type-safe entity identifiers.
//!
//! Every entity in the data model is addressed by a "sortable ID": a
//! lexicographically sortable, time-ordered 128-bit value. We use UUIDv7
//! (timestamp + random bits) rather than a bare `Uuid` so that a phantom
//! type parameter prevents a `Id<Job>` from being handed to code expecting
//! a `Id<Document>` — the mistake costs nothing at runtime and is caught at
//! compile time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::str::FromStr;
use uuid::Uuid;

/// A type-safe wrapper around a sortable, time-ordered identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Id<T> {
    value: Uuid,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
    /// Generate a new id, time-ordered relative to any other id minted
    /// around the same moment.
    pub fn new() -> Self {
        Self {
            value: Uuid::now_v7(),
            _marker: PhantomData,
        }
    }

    pub fn from_uuid(value: Uuid) -> Self {
        Self {
            value,
            _marker: PhantomData,
        }
    }

    pub fn as_uuid(&self) -> Uuid {
        self.value
    }
}

impl<T> Default for Id<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T> FromStr for Id<T> {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_uuid(Uuid::parse_str(s)?))
    }
}

impl<T> From<Uuid> for Id<T> {
    fn from(value: Uuid) -> Self {
        Self::from_uuid(value)
    }
}

impl<T> From<Id<T>> for Uuid {
    fn from(id: Id<T>) -> Self {
        id.value
    }
}

// Manual Serialize/Deserialize: id is just a UUID on the wire, the marker
// type carries no data and derive(Serialize) would require T: Serialize.
impl<T> Serialize for Id<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.value.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Id<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(Self::from_uuid(Uuid::deserialize(deserializer)?))
    }
}

/// Marker types for each id-bearing entity. These never construct a value;
/// they only exist to specialize `Id<T>`.
pub struct Tenant;
pub struct Campaign;
pub struct ProcessorCatalogEntry;
pub struct Document;
pub struct Job;
pub struct ExecutionRecord;
pub struct PipelineProgress;
pub struct Credential;
pub struct AuditLog;
pub struct UsageEvent;

pub type TenantId = Id<Tenant>;
pub type CampaignId = Id<Campaign>;
pub type ProcessorId = Id<ProcessorCatalogEntry>;
pub type DocumentId = Id<Document>;
pub type JobId = Id<Job>;
pub type ExecutionRecordId = Id<ExecutionRecord>;
pub type PipelineProgressId = Id<PipelineProgress>;
pub type CredentialId = Id<Credential>;
pub type AuditLogId = Id<AuditLog>;
pub type UsageEventId = Id<UsageEvent>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_time_ordered() {
        let a = JobId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = JobId::new();
        assert!(b > a);
    }

    #[test]
    fn ids_round_trip_through_json() {
        let id = DocumentId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: DocumentId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn ids_parse_from_str() {
        let id = TenantId::new();
        let parsed: TenantId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }
}
