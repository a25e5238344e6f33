//! Named schema-matching strategies for nested result blocks.
//!
//! Backends are loose about the schema ids they echo back (`line-item`
//! versus `lineitem`, or a prefixed id). A [`SchemaMatcher`] runs its
//! strategies in order; the first strategy that matches any catalog entry
//! wins, and within a strategy candidates are scanned in catalog order.
//! The containment tier can therefore pick the first of several plausible
//! schemas.

use std::fmt;
use std::sync::Arc;

use crate::catalog::ResultSchema;

/// One way of matching a requested schema id against a catalog entry.
pub trait MatchStrategy: Send + Sync {
    /// Stable name, reported with every match.
    fn name(&self) -> &'static str;

    /// Returns true when `candidate` answers to `requested`.
    fn matches(&self, requested: &str, candidate: &ResultSchema) -> bool;
}

/// Identical ids.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExactId;

impl MatchStrategy for ExactId {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn matches(&self, requested: &str, candidate: &ResultSchema) -> bool {
        candidate.id == requested
    }
}

/// Ids equal once hyphens are dropped from both. Case still matters.
#[derive(Clone, Copy, Debug, Default)]
pub struct HyphenInsensitive;

impl MatchStrategy for HyphenInsensitive {
    fn name(&self) -> &'static str {
        "hyphen-insensitive"
    }

    fn matches(&self, requested: &str, candidate: &ResultSchema) -> bool {
        let unhyphenated = |id: &str| id.chars().filter(|c| *c != '-').collect::<String>();
        unhyphenated(requested) == unhyphenated(&candidate.id)
    }
}

/// One id contains the other. Empty ids never match.
#[derive(Clone, Copy, Debug, Default)]
pub struct Containment;

impl MatchStrategy for Containment {
    fn name(&self) -> &'static str {
        "containment"
    }

    fn matches(&self, requested: &str, candidate: &ResultSchema) -> bool {
        if requested.is_empty() || candidate.id.is_empty() {
            return false;
        }
        candidate.id.contains(requested) || requested.contains(candidate.id.as_str())
    }
}

/// Outcome of a successful resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchemaMatch {
    /// Position of the schema in the catalog slice.
    pub index: usize,
    /// Name of the strategy that matched.
    pub strategy: &'static str,
}

/// Ordered list of strategies.
#[derive(Clone)]
pub struct SchemaMatcher {
    strategies: Vec<Arc<dyn MatchStrategy>>,
}

impl SchemaMatcher {
    /// Exact, then hyphen-insensitive, then containment.
    pub fn standard() -> Self {
        Self {
            strategies: vec![
                Arc::new(ExactId),
                Arc::new(HyphenInsensitive),
                Arc::new(Containment),
            ],
        }
    }

    /// A matcher with no strategies; nothing resolves until some are added.
    pub fn empty() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Appends a strategy after the existing ones.
    pub fn with_strategy(mut self, strategy: impl MatchStrategy + 'static) -> Self {
        self.strategies.push(Arc::new(strategy));
        self
    }

    /// Names of the strategies in the order they run.
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Resolves `requested` against `schemas`.
    pub fn resolve(&self, requested: &str, schemas: &[ResultSchema]) -> Option<SchemaMatch> {
        self.strategies.iter().find_map(|strategy| {
            schemas
                .iter()
                .position(|candidate| strategy.matches(requested, candidate))
                .map(|index| SchemaMatch {
                    index,
                    strategy: strategy.name(),
                })
        })
    }
}

impl Default for SchemaMatcher {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for SchemaMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaMatcher")
            .field("strategies", &self.strategy_names())
            .finish()
    }
}
