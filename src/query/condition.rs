//! Condition trees: field/operator/value predicates combinable with
//! AND/OR and negation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::parse::Conjunction;

/// One field/operator/value predicate.
///
/// The operator is free-form at this level; each backend decides which
/// operators it can translate and rejects the rest at execution time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub value: Value,
    pub operator: String,
}

impl Condition {
    pub fn new(field: impl Into<String>, value: impl Into<Value>, operator: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            operator: operator.into(),
        }
    }
}

/// A child of a condition group: a leaf condition, a nested group, or a
/// negated child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConditionItem {
    Condition(Condition),
    Group(ConditionGroup),
    Negated(Box<ConditionItem>),
}

/// A tree of conditions combined with one conjunction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionGroup {
    pub conjunction: Conjunction,
    pub items: Vec<ConditionItem>,
    /// Free-form labels; hooks can target groups carrying a given tag.
    pub tags: BTreeSet<String>,
}

impl ConditionGroup {
    pub fn new(conjunction: Conjunction) -> Self {
        Self {
            conjunction,
            items: Vec::new(),
            tags: BTreeSet::new(),
        }
    }

    pub fn add_condition(
        &mut self,
        field: impl Into<String>,
        value: impl Into<Value>,
        operator: impl Into<String>,
    ) -> &mut Self {
        self.items
            .push(ConditionItem::Condition(Condition::new(field, value, operator)));
        self
    }

    pub fn add_group(&mut self, group: ConditionGroup) -> &mut Self {
        self.items.push(ConditionItem::Group(group));
        self
    }

    /// Add a child that must *not* match.
    pub fn add_negated(&mut self, item: ConditionItem) -> &mut Self {
        self.items.push(ConditionItem::Negated(Box::new(item)));
        self
    }

    pub fn add_tag(&mut self, tag: impl Into<String>) -> &mut Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for ConditionGroup {
    fn default() -> Self {
        Self::new(Conjunction::And)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_group_composition() {
        let mut inner = ConditionGroup::new(Conjunction::Or);
        inner.add_condition("status", 1, "=");
        inner.add_condition("sticky", true, "=");

        let mut root = ConditionGroup::new(Conjunction::And);
        root.add_condition("uid", json!([1, 2, 3]), "IN");
        root.add_group(inner);
        root.add_negated(ConditionItem::Condition(Condition::new("title", "spam", "=")));

        assert_eq!(root.items.len(), 3);
        assert!(matches!(root.items[1], ConditionItem::Group(ref g) if g.items.len() == 2));
        assert!(matches!(root.items[2], ConditionItem::Negated(_)));
    }

    #[test]
    fn test_group_tags() {
        let mut group = ConditionGroup::new(Conjunction::And);
        group.add_tag("facet:author").add_tag("facet:author");
        assert_eq!(group.tags.len(), 1);
    }
}
