//! Directed allow-list of which item type may rest on which other type.
//!
//! There is no default permission and no transitive closure: `table -> chair`
//! lets a chair rest on a table and nothing else.

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use utoipa::ToSchema;

/// Permission for items of `top_type` to rest directly on `bottom_type`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "bottom_type": "table", "top_type": "chair" }))]
pub struct StackingRule {
    pub bottom_type: String,
    pub top_type: String,
}

impl StackingRule {
    pub fn new(bottom_type: impl Into<String>, top_type: impl Into<String>) -> Self {
        Self {
            bottom_type: bottom_type.into(),
            top_type: top_type.into(),
        }
    }
}

/// Ordered rule table without duplicates.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StackingRules {
    rules: Vec<StackingRule>,
}

impl StackingRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table, dropping repeated rules.
    pub fn from_rules(rules: impl IntoIterator<Item = StackingRule>) -> Self {
        let mut table = Self::new();
        for rule in rules {
            table.add(rule);
        }
        table
    }

    /// Inserts a rule. Returns `false` if it was already present.
    pub fn add(&mut self, rule: StackingRule) -> bool {
        if self.rules.contains(&rule) {
            return false;
        }
        self.rules.push(rule);
        true
    }

    /// Exact membership test for `bottom_type -> top_type`.
    ///
    /// ```
    /// use truck_loader::stacking::{StackingRule, StackingRules};
    ///
    /// let rules = StackingRules::from_rules([StackingRule::new("table", "chair")]);
    /// assert!(rules.may_stack("table", "chair"));
    /// assert!(!rules.may_stack("chair", "table"));
    /// ```
    pub fn may_stack(&self, bottom_type: &str, top_type: &str) -> bool {
        self.rules
            .iter()
            .any(|r| r.bottom_type == bottom_type && r.top_type == top_type)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rules_are_directed() {
        let mut rules = StackingRules::new();
        rules.add(StackingRule::new("table", "chair"));

        assert!(rules.may_stack("table", "chair"));
        assert!(!rules.may_stack("chair", "table"));
        assert!(!rules.may_stack("table", "table"));
    }

    #[test]
    fn no_transitive_permission() {
        let rules = StackingRules::from_rules([
            StackingRule::new("bed", "table"),
            StackingRule::new("table", "chair"),
        ]);
        assert!(!rules.may_stack("bed", "chair"));
    }

    #[test]
    fn duplicates_are_not_inserted() {
        let mut rules = StackingRules::new();
        assert!(rules.add(StackingRule::new("table", "chair")));
        assert!(!rules.add(StackingRule::new("table", "chair")));
        assert_eq!(rules.len(), 1);
    }
}
