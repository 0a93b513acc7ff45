//! Event type resolution
//!
//! An event listener's authoritative list of event type names is derived once,
//! at registration time, from an optional explicit list and an optional
//! busdata mapping (event type name to busdata hex strings).

use crate::error::ConfigurationError;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Ordered mapping from event type name to busdata hex strings
///
/// Keys keep first-insertion order; inserting an existing key appends to its
/// list. Deserializes from a map and keeps document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventBusdata {
    entries: Vec<(String, Vec<String>)>,
}

impl EventBusdata {
    /// Create an empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one busdata string under an event type
    pub fn insert(&mut self, event_type: impl Into<String>, busdata: impl Into<String>) {
        self.entry(event_type.into()).push(busdata.into());
    }

    /// Add several busdata strings under an event type
    pub fn extend<I, S>(&mut self, event_type: impl Into<String>, busdata: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list = self.entry(event_type.into());
        list.extend(busdata.into_iter().map(Into::into));
    }

    fn entry(&mut self, event_type: String) -> &mut Vec<String> {
        let index = match self.entries.iter().position(|(k, _)| *k == event_type) {
            Some(index) => index,
            None => {
                self.entries.push((event_type, Vec::new()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[index].1
    }

    /// Event type names in first-insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Iterate entries in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of event types in the mapping
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no event type has busdata
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V, S> FromIterator<(K, V)> for EventBusdata
where
    K: Into<String>,
    V: IntoIterator<Item = S>,
    S: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.extend(k, v);
        }
        map
    }
}

impl Serialize for EventBusdata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for EventBusdata {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BusdataVisitor;

        impl<'de> Visitor<'de> for BusdataVisitor {
            type Value = EventBusdata;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a map of event type to busdata list")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = EventBusdata::new();
                while let Some((key, value)) = access.next_entry::<String, OneOrMany>()? {
                    map.extend(key, value.0);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(BusdataVisitor)
    }
}

/// Busdata value: a single hex string or a list of them
struct OneOrMany(Vec<String>);

impl<'de> Deserialize<'de> for OneOrMany {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            One(String),
            Many(Vec<String>),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::One(s) => OneOrMany(vec![s]),
            Raw::Many(v) => OneOrMany(v),
        })
    }
}

/// Resolve the event type list for an event listener
///
/// - neither source: [`ConfigurationError::NoEventSource`]
/// - explicit only: the explicit list (TX-only event types)
/// - busdata only: the busdata keys in first-insertion order
/// - both: every busdata key must be listed, result is the explicit list
///
/// The result never contains duplicates.
pub fn resolve_event_types(
    listener: &str,
    explicit: &[String],
    busdata: &EventBusdata,
) -> Result<Vec<String>, ConfigurationError> {
    if explicit.is_empty() && busdata.is_empty() {
        return Err(ConfigurationError::NoEventSource {
            listener: listener.to_string(),
        });
    }

    if explicit.is_empty() {
        return Ok(busdata.keys().map(str::to_string).collect());
    }

    if let Some(key) = busdata.keys().find(|k| !explicit.iter().any(|e| e == k)) {
        return Err(ConfigurationError::UnlistedEventType {
            key: key.to_string(),
        });
    }

    let mut resolved: Vec<String> = Vec::with_capacity(explicit.len());
    for name in explicit {
        if !resolved.contains(name) {
            resolved.push(name.clone());
        }
    }
    Ok(resolved)
}
