//! Condition clauses attached to a criteria.
//!
//! A criteria holds one plain-AND group plus any number of clauses. Every
//! clause compiles to one condition and all of them are conjoined at the top
//! level.

use crate::translate::{translate_and, translate_or};
use tenantorm_core::{Cond, ConditionGroup, FieldInfo, Result};

/// A composed condition group.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// The group's predicates ORed together.
    Or(ConditionGroup),
    /// Each group ANDed internally, groups ORed with each other.
    AndOr(Vec<ConditionGroup>),
    /// Each group ORed internally, groups ANDed with each other.
    OrAnd(Vec<ConditionGroup>),
    /// A condition already in backend form.
    Raw(Cond),
}

impl Clause {
    /// Whether the clause carries no predicates.
    ///
    /// Empty clauses are dropped instead of compiling to an always-false `Or`.
    pub fn is_empty(&self) -> bool {
        match self {
            Clause::Or(group) => group.is_empty(),
            Clause::AndOr(groups) | Clause::OrAnd(groups) => groups.iter().all(|g| g.is_empty()),
            Clause::Raw(_) => false,
        }
    }

    /// Compile the clause against a model's fields.
    pub fn to_cond(&self, fields: &[FieldInfo]) -> Result<Cond> {
        match self {
            Clause::Or(group) => translate_or(fields, group),
            Clause::AndOr(groups) => {
                let children = groups
                    .iter()
                    .filter(|g| !g.is_empty())
                    .map(|g| translate_and(fields, g))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Cond::Or(children))
            }
            Clause::OrAnd(groups) => groups
                .iter()
                .filter(|g| !g.is_empty())
                .try_fold(Cond::all(), |acc, g| Ok(acc.and(translate_or(fields, g)?))),
            Clause::Raw(cond) => Ok(cond.clone()),
        }
    }
}

/// The full condition of a criteria: a plain-AND group plus clauses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Where {
    pub group: ConditionGroup,
    pub clauses: Vec<Clause>,
}

impl Where {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a clause; empty clauses are ignored.
    pub fn push(&mut self, clause: Clause) {
        if !clause.is_empty() {
            self.clauses.push(clause);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.group.is_empty() && self.clauses.is_empty()
    }

    /// Compile everything into one conjunction.
    pub fn build(&self, fields: &[FieldInfo]) -> Result<Cond> {
        let base = translate_and(fields, &self.group)?;
        self.clauses
            .iter()
            .try_fold(base, |acc, clause| Ok(acc.and(clause.to_cond(fields)?)))
    }
}
