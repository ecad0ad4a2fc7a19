use crate::{BindingConflictError, PatternTerm, TriplePattern};
use itertools::Itertools;
use oxrdf::{Term, Triple, Variable};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// A partial assignment of query variables to constant RDF terms.
///
/// [Bindings] are immutable values. Extending them creates a new instance and leaves the original
/// untouched, which allows sharing one instance between many join pipelines. Cloning is cheap as
/// the underlying map is reference counted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Bindings {
    values: Arc<BTreeMap<Variable, Term>>,
}

impl Bindings {
    /// Creates an empty set of bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the term bound to `variable`, if any.
    pub fn get(&self, variable: &Variable) -> Option<&Term> {
        self.values.get(variable)
    }

    pub fn contains(&self, variable: &Variable) -> bool {
        self.values.contains_key(variable)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over all bound variables in their canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (&Variable, &Term)> {
        self.values.iter()
    }

    /// Returns new bindings that additionally bind `variable` to `value`.
    ///
    /// Binding a variable to the value it already holds is a no-op. Binding it to a different value
    /// fails with [BindingConflictError::Conflict].
    pub fn with(&self, variable: Variable, value: Term) -> Result<Self, BindingConflictError> {
        match self.values.get(&variable) {
            Some(bound) if *bound == value => Ok(self.clone()),
            Some(bound) => Err(BindingConflictError::Conflict {
                variable,
                bound: bound.clone(),
                value,
            }),
            None => {
                let mut values = BTreeMap::clone(&self.values);
                values.insert(variable, value);
                Ok(Self {
                    values: Arc::new(values),
                })
            }
        }
    }

    /// Extends these bindings by matching `pattern` against `triple`.
    ///
    /// Every variable of the pattern gets bound to the term at the same position of the triple.
    /// Constants must be equal to their counterpart. The original bindings are never modified.
    pub fn extend(
        &self,
        pattern: &TriplePattern,
        triple: &Triple,
    ) -> Result<Self, BindingConflictError> {
        let mut values: Option<BTreeMap<Variable, Term>> = None;
        let terms = [
            Term::from(triple.subject.clone()),
            Term::from(triple.predicate.clone()),
            triple.object.clone(),
        ];

        for (position, term) in pattern.positions().into_iter().zip(terms) {
            match position {
                PatternTerm::Constant(constant) => {
                    if *constant != term {
                        return Err(BindingConflictError::Mismatch {
                            expected: constant.clone(),
                            actual: term,
                        });
                    }
                }
                PatternTerm::Variable(variable) => {
                    let current: &BTreeMap<Variable, Term> = match &values {
                        Some(values) => values,
                        None => &self.values,
                    };
                    match current.get(variable) {
                        Some(bound) if *bound == term => {}
                        Some(bound) => {
                            return Err(BindingConflictError::Conflict {
                                variable: variable.clone(),
                                value: term,
                                bound: bound.clone(),
                            })
                        }
                        None => {
                            values
                                .get_or_insert_with(|| BTreeMap::clone(&self.values))
                                .insert(variable.clone(), term);
                        }
                    }
                }
            }
        }

        Ok(match values {
            Some(values) => Self {
                values: Arc::new(values),
            },
            None => self.clone(),
        })
    }

    /// Restricts the bindings to the given variables.
    #[must_use]
    pub fn project(&self, variables: &[Variable]) -> Self {
        variables
            .iter()
            .filter_map(|variable| {
                self.values
                    .get(variable)
                    .map(|value| (variable.clone(), value.clone()))
            })
            .collect()
    }
}

impl FromIterator<(Variable, Term)> for Bindings {
    fn from_iter<T: IntoIterator<Item = (Variable, Term)>>(iter: T) -> Self {
        Self {
            values: Arc::new(iter.into_iter().collect()),
        }
    }
}

impl<'bindings> IntoIterator for &'bindings Bindings {
    type Item = (&'bindings Variable, &'bindings Term);
    type IntoIter = std::collections::btree_map::Iter<'bindings, Variable, Term>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

impl Display for Bindings {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let pairs = self.values.iter().format_with(", ", |(variable, value), f| {
            f(&format_args!("{variable}: {value}"))
        });
        write!(f, "{{{pairs}}}")
    }
}
