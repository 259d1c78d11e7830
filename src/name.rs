//! Actor names: cheap-to-clone interned identifiers used as registry keys.

use std::fmt;
use std::sync::Arc;

/// A unique symbol naming an actor (or foreign server) within a simulation.
///
/// Cloning an `ActorName` clones an `Arc`, not the underlying string, so
/// targets can be resolved by name at send time without owning references
/// into the registry (spec.md §9, "non-tree references").
#[derive(Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ActorName(Arc<str>);

impl ActorName {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ActorName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ActorName {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for ActorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ActorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorName({:?})", self.0)
    }
}

// Serialized as a plain string (not `{"0": "..."}`) so `ActorName` works as
// a JSON object key in `StatsSnapshot::to_json`.
impl serde::Serialize for ActorName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_is_cheap_and_equal() {
        let a = ActorName::from("producer");
        let b = a.clone();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "producer");
    }

    #[test]
    fn usable_as_map_key() {
        let mut map = std::collections::HashMap::new();
        map.insert(ActorName::from("consumer"), 1);
        assert_eq!(map.get(&ActorName::from("consumer")), Some(&1));
    }
}
