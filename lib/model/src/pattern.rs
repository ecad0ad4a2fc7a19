use crate::Bindings;
use oxrdf::{BlankNode, Literal, NamedNode, Term, Variable};
use std::fmt::{Display, Formatter};

/// A single position of a [TriplePattern].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PatternTerm {
    Constant(Term),
    Variable(Variable),
}

impl PatternTerm {
    pub fn is_variable(&self) -> bool {
        matches!(self, PatternTerm::Variable(_))
    }

    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            PatternTerm::Variable(variable) => Some(variable),
            PatternTerm::Constant(_) => None,
        }
    }

    pub fn as_constant(&self) -> Option<&Term> {
        match self {
            PatternTerm::Constant(term) => Some(term),
            PatternTerm::Variable(_) => None,
        }
    }

    /// Replaces a bound variable with its value.
    #[must_use]
    pub fn bind(&self, bindings: &Bindings) -> Self {
        match self {
            PatternTerm::Variable(variable) => bindings
                .get(variable)
                .map_or_else(|| self.clone(), |value| PatternTerm::Constant(value.clone())),
            PatternTerm::Constant(_) => self.clone(),
        }
    }
}

impl Display for PatternTerm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternTerm::Constant(term) => term.fmt(f),
            PatternTerm::Variable(variable) => variable.fmt(f),
        }
    }
}

impl From<Variable> for PatternTerm {
    fn from(value: Variable) -> Self {
        PatternTerm::Variable(value)
    }
}

impl From<Term> for PatternTerm {
    fn from(value: Term) -> Self {
        PatternTerm::Constant(value)
    }
}

impl From<NamedNode> for PatternTerm {
    fn from(value: NamedNode) -> Self {
        PatternTerm::Constant(value.into())
    }
}

impl From<BlankNode> for PatternTerm {
    fn from(value: BlankNode) -> Self {
        PatternTerm::Constant(value.into())
    }
}

impl From<Literal> for PatternTerm {
    fn from(value: Literal) -> Self {
        PatternTerm::Constant(value.into())
    }
}

/// A triple whose positions may be variables.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TriplePattern {
    pub subject: PatternTerm,
    pub predicate: PatternTerm,
    pub object: PatternTerm,
}

impl TriplePattern {
    pub fn new(
        subject: impl Into<PatternTerm>,
        predicate: impl Into<PatternTerm>,
        object: impl Into<PatternTerm>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    /// Returns the subject, predicate and object positions.
    pub fn positions(&self) -> [&PatternTerm; 3] {
        [&self.subject, &self.predicate, &self.object]
    }

    /// Returns the distinct variables of this pattern in order of appearance.
    pub fn variables(&self) -> Vec<&Variable> {
        let mut result: Vec<&Variable> = Vec::with_capacity(3);
        for variable in self.positions().into_iter().filter_map(PatternTerm::as_variable) {
            if !result.contains(&variable) {
                result.push(variable);
            }
        }
        result
    }

    pub fn has_variables(&self) -> bool {
        self.positions().into_iter().any(PatternTerm::is_variable)
    }

    /// Substitutes all variables that are bound in `bindings`.
    #[must_use]
    pub fn bind(&self, bindings: &Bindings) -> Self {
        Self {
            subject: self.subject.bind(bindings),
            predicate: self.predicate.bind(bindings),
            object: self.object.bind(bindings),
        }
    }

    /// Checks whether this pattern is `general` with zero or more of its variables bound.
    ///
    /// Every pattern is a bound pattern of itself. If `general` has zero matches at some endpoint,
    /// so does every bound pattern of it.
    pub fn is_bound_pattern_of(&self, general: &TriplePattern) -> bool {
        self.positions()
            .into_iter()
            .zip(general.positions())
            .all(|(specific, general)| match general {
                PatternTerm::Variable(_) => true,
                PatternTerm::Constant(_) => specific == general,
            })
    }
}

impl Display for TriplePattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)
    }
}

/// Partitions `patterns` into maximal groups that are connected through shared variables.
///
/// Groups keep the relative order of their patterns. A group is positioned where its first pattern
/// appeared in the input.
pub fn find_connected_patterns(patterns: &[TriplePattern]) -> Vec<Vec<TriplePattern>> {
    let mut clusters: Vec<(Vec<usize>, Vec<&Variable>)> = patterns
        .iter()
        .enumerate()
        .map(|(index, pattern)| (vec![index], pattern.variables()))
        .collect();

    'merge: loop {
        for first in 0..clusters.len() {
            for second in (first + 1)..clusters.len() {
                let shares_variable = clusters[second]
                    .1
                    .iter()
                    .any(|variable| clusters[first].1.contains(variable));
                if shares_variable {
                    let (merged_members, merged_variables) = clusters.remove(second);
                    let (members, variables) = &mut clusters[first];
                    members.extend(merged_members);
                    for variable in merged_variables {
                        if !variables.contains(&variable) {
                            variables.push(variable);
                        }
                    }
                    continue 'merge;
                }
            }
        }
        break;
    }

    clusters
        .into_iter()
        .map(|(mut members, _)| {
            members.sort_unstable();
            members
                .into_iter()
                .map(|index| patterns[index].clone())
                .collect()
        })
        .collect()
}
