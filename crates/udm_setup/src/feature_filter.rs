//! Attribute rules that carve the composite "current development" layer out
//! of a MasterMap-style feature set.
//!
//! Each rule pairs a group predicate (`theme` or `descriptivegroup`) with a
//! `make` predicate. A feature belongs to a rule when it satisfies both. The
//! make predicate states its combinator explicitly, so "man-made or unknown
//! roads" is `AnyOf(["Manmade", "Unknown"])` rather than an expression that
//! can silently become an AND of two disjoint masks.

use serde::Serialize;

use crate::geometry::{Feature, FeatureCollection};

pub const THEME_ATTRIBUTE: &str = "theme";
pub const GROUP_ATTRIBUTE: &str = "descriptivegroup";
pub const MAKE_ATTRIBUTE: &str = "make";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Combinator {
    /// At least one listed value is present.
    AnyOf,
    /// Every listed value is present.
    AllOf,
}

/// `attribute` holds the listed values, combined by `combinator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttributePredicate {
    pub attribute: &'static str,
    pub values: &'static [&'static str],
    pub combinator: Combinator,
}

impl AttributePredicate {
    pub const fn any_of(attribute: &'static str, values: &'static [&'static str]) -> Self {
        Self {
            attribute,
            values,
            combinator: Combinator::AnyOf,
        }
    }

    pub fn matches(&self, feature: &Feature) -> bool {
        let present = feature.attribute_values(self.attribute);
        let has = |value: &&str| present.contains(value);
        match self.combinator {
            Combinator::AnyOf => self.values.iter().any(has),
            Combinator::AllOf => self.values.iter().all(has),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FilterRule {
    pub name: &'static str,
    pub group: AttributePredicate,
    pub make: AttributePredicate,
}

impl FilterRule {
    pub fn matches(&self, feature: &Feature) -> bool {
        self.group.matches(feature) && self.make.matches(feature)
    }
}

pub const CURRENT_DEVELOPMENT_RULES: &[FilterRule] = &[
    FilterRule {
        name: "land",
        group: AttributePredicate::any_of(THEME_ATTRIBUTE, &["Land"]),
        make: AttributePredicate::any_of(MAKE_ATTRIBUTE, &["Multiple"]),
    },
    FilterRule {
        name: "buildings",
        group: AttributePredicate::any_of(THEME_ATTRIBUTE, &["Buildings"]),
        make: AttributePredicate::any_of(MAKE_ATTRIBUTE, &["Manmade"]),
    },
    FilterRule {
        name: "rail",
        group: AttributePredicate::any_of(THEME_ATTRIBUTE, &["Rail"]),
        make: AttributePredicate::any_of(MAKE_ATTRIBUTE, &["Manmade"]),
    },
    FilterRule {
        name: "roads",
        group: AttributePredicate::any_of(THEME_ATTRIBUTE, &["Roads Tracks And Paths"]),
        make: AttributePredicate::any_of(MAKE_ATTRIBUTE, &["Manmade", "Unknown"]),
    },
    FilterRule {
        name: "roadside",
        group: AttributePredicate::any_of(GROUP_ATTRIBUTE, &["Roadside"]),
        make: AttributePredicate::any_of(MAKE_ATTRIBUTE, &["Natural"]),
    },
];

/// Features split by the rule they matched, in rule order.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub subsets: Vec<(&'static str, Vec<Feature>)>,
    pub unmatched: usize,
}

impl Partition {
    pub fn count(&self, rule: &str) -> usize {
        self.subsets
            .iter()
            .find(|(name, _)| *name == rule)
            .map_or(0, |(_, features)| features.len())
    }

    /// Every matched feature as one collection, subsets in rule order.
    pub fn merged(self, crs: Option<serde_json::Value>) -> FeatureCollection {
        let mut merged =
            FeatureCollection::new(self.subsets.into_iter().flat_map(|(_, f)| f).collect());
        merged.crs = crs;
        merged
    }
}

/// Assign each feature to the first rule it satisfies. Features matching no
/// rule are dropped.
pub fn partition(collection: &FeatureCollection, rules: &[FilterRule]) -> Partition {
    let mut subsets: Vec<(&'static str, Vec<Feature>)> =
        rules.iter().map(|r| (r.name, Vec::new())).collect();
    let mut unmatched = 0;
    for feature in &collection.features {
        match rules.iter().position(|rule| rule.matches(feature)) {
            Some(index) => subsets[index].1.push(feature.clone()),
            None => unmatched += 1,
        }
    }
    Partition { subsets, unmatched }
}
