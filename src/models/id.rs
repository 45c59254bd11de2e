//! Entity identifiers.
//!
//! The backend hands out numeric IDs most of the time but some routes echo them
//! back as strings, and entities created offline carry a `local-` token until the
//! server assigns a durable ID. Every comparison goes through the normalized form.

use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Prefix that marks a process-generated identifier.
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Server-assigned identifier.
#[derive(Debug, Clone)]
pub enum DurableId {
    Number(i64),
    Text(String),
}

/// Identifier of any cached entity.
#[derive(Debug, Clone)]
pub enum EntityId {
    Durable(DurableId),
    Local(String),
}

impl EntityId {
    pub fn number(n: i64) -> Self {
        EntityId::Durable(DurableId::Number(n))
    }

    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.starts_with(LOCAL_ID_PREFIX) {
            EntityId::Local(s)
        } else {
            EntityId::Durable(DurableId::Text(s))
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, EntityId::Local(_))
    }

    pub fn is_durable(&self) -> bool {
        !self.is_local()
    }

    /// Canonical string form; numeric text and numbers normalize to the same value.
    pub fn normalized(&self) -> Cow<'_, str> {
        match self {
            EntityId::Durable(DurableId::Number(n)) => Cow::Owned(n.to_string()),
            EntityId::Durable(DurableId::Text(s)) => match s.trim().parse::<i64>() {
                Ok(n) => Cow::Owned(n.to_string()),
                Err(_) => Cow::Borrowed(s.as_str()),
            },
            EntityId::Local(s) => Cow::Borrowed(s.as_str()),
        }
    }

    /// Explicit equality used wherever IDs of possibly mixed representation meet.
    pub fn same_as(&self, other: &EntityId) -> bool {
        self.is_local() == other.is_local() && self.normalized() == other.normalized()
    }
}

impl PartialEq for EntityId {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for EntityId {}

impl Hash for EntityId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.is_local().hash(state);
        self.normalized().hash(state);
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Durable(DurableId::Number(n)) => write!(f, "{}", n),
            EntityId::Durable(DurableId::Text(s)) | EntityId::Local(s) => f.write_str(s),
        }
    }
}

impl FromStr for EntityId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.parse::<i64>() {
            Ok(n) => EntityId::number(n),
            Err(_) => EntityId::text(s),
        })
    }
}

impl From<i64> for EntityId {
    fn from(n: i64) -> Self {
        EntityId::number(n)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        EntityId::text(s)
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            EntityId::Durable(DurableId::Number(n)) => serializer.serialize_i64(*n),
            EntityId::Durable(DurableId::Text(s)) | EntityId::Local(s) => {
                serializer.serialize_str(s)
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(i64),
    Text(String),
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawId::deserialize(deserializer)? {
            RawId::Number(n) => EntityId::number(n),
            RawId::Text(s) => EntityId::text(s),
        })
    }
}

/// Mints `local-<millis>` identifiers, strictly increasing within the process.
#[derive(Debug, Default)]
pub struct LocalIdGenerator {
    last: AtomicI64,
}

impl LocalIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&self) -> EntityId {
        let now = Utc::now().timestamp_millis();
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        let next = now.max(previous + 1);
        EntityId::Local(format!("{}{}", LOCAL_ID_PREFIX, next))
    }
}
