use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a Scenario.
///
/// Catalog scenarios use fixed slugs (e.g. `supermarket_queue`); scenarios
/// planned from a free-text topic get a freshly minted `dynamic_<uuid>` id.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScenarioId(String);

impl ScenarioId {
    /// Creates a `ScenarioId` from an existing identity string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mints a fresh identity for a dynamically planned scenario.
    #[must_use]
    pub fn dynamic() -> Self {
        Self(format!("dynamic_{}", Uuid::new_v4()))
    }

    /// Returns true if this id was minted for a dynamic scenario.
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.0.starts_with("dynamic_")
    }

    /// Returns the underlying identity string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Unique identifier for a Step within a scenario.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StepId(u32);

impl StepId {
    /// Creates a new `StepId`
    #[must_use]
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the underlying u32 value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Debug for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScenarioId({})", self.0)
    }
}

impl fmt::Debug for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StepId({})", self.0)
    }
}

// ─── Display Implementations ───────────────────────────────────────────────────

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_ids_are_unique_and_flagged() {
        let a = ScenarioId::dynamic();
        let b = ScenarioId::dynamic();
        assert_ne!(a, b);
        assert!(a.is_dynamic());
        assert!(!ScenarioId::new("supermarket_queue").is_dynamic());
    }
}
