use serde::{Deserialize, Serialize};

/// Opaque identity token for attributes, items and ideas.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(pub String);

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Id {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Allocates fresh ids. One source is owned per session so every token it
/// hands out is unique for the lifetime of that session.
pub trait IdSource: Send {
    fn next_id(&mut self) -> Id;
}

/// Monotonic counter: `"1"`, `"2"`, ...
#[derive(Debug, Default, Clone)]
pub struct SequentialIds {
    next: u64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdSource for SequentialIds {
    fn next_id(&mut self) -> Id {
        self.next += 1;
        Id(self.next.to_string())
    }
}

/// Random v4 uuids.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIds;

impl IdSource for UuidIds {
    fn next_id(&mut self) -> Id {
        Id(uuid::Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_sequential_ids_are_monotonic() {
        let mut ids = SequentialIds::new();
        assert_eq!(ids.next_id(), Id::from("1"));
        assert_eq!(ids.next_id(), Id::from("2"));
        assert_eq!(ids.next_id().as_str(), "3");
    }

    #[test]
    fn test_uuid_ids_do_not_collide() {
        let mut ids = UuidIds;
        let seen: HashSet<Id> = (0..256).map(|_| ids.next_id()).collect();
        assert_eq!(seen.len(), 256);
    }
}
