//! Transforms for the query forms and solution modifiers.

use crate::sparql::expression::{numeric_value, EvaluationError, ExpressionEvaluator};
use ldf_common::iterator::{Transform, TransformFlow};
use ldf_common::ExecResult;
use ldf_model::query::{TemplatePattern, TemplateTerm};
use ldf_model::{deskolemize_term, BlankNode, Bindings, NamedNode, Subject, Term, Triple, Variable};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use tracing::trace;

/// Keeps the solutions for which the expression is true.
pub(crate) struct FilterTransform {
    evaluator: Arc<ExpressionEvaluator>,
}

impl FilterTransform {
    pub(crate) fn new(evaluator: Arc<ExpressionEvaluator>) -> Self {
        Self { evaluator }
    }
}

impl Transform for FilterTransform {
    type Input = Bindings;
    type Output = Bindings;

    fn transform(
        &mut self,
        bindings: Bindings,
        output: &mut VecDeque<Bindings>,
    ) -> ExecResult<TransformFlow> {
        match self.evaluator.evaluate_ebv(&bindings) {
            Ok(true) => output.push_back(bindings),
            Ok(false) => {}
            Err(error) => trace!(%bindings, %error, "Filter failed"),
        }
        Ok(TransformFlow::Continue)
    }
}

/// The value an `ORDER BY` condition sorts by.
#[derive(Clone, Debug)]
struct OrderKey {
    number: Option<f64>,
    text: String,
}

impl OrderKey {
    fn new(value: Result<Term, EvaluationError>) -> Self {
        match value {
            Ok(term) => Self {
                number: numeric_value(&term),
                text: match term {
                    Term::NamedNode(node) => node.into_string(),
                    Term::BlankNode(node) => node.into_string(),
                    Term::Literal(literal) => literal.value().to_owned(),
                    #[allow(
                        unreachable_patterns,
                        reason = "Quoted triples are only available with rdf-star"
                    )]
                    term => term.to_string(),
                },
            },
            Err(_) => Self {
                number: None,
                text: String::new(),
            },
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        match (self.number, other.number) {
            (Some(left), Some(right)) => left.total_cmp(&right),
            _ => self.text.cmp(&other.text),
        }
    }
}

/// Collects all solutions and emits them sorted once the source ended.
///
/// The sort is stable. Conditions are compared in order, a descending condition reverses its
/// comparison.
pub(crate) struct SortTransform {
    conditions: Vec<(ExpressionEvaluator, bool)>,
    solutions: Vec<(Vec<OrderKey>, Bindings)>,
}

impl SortTransform {
    /// Creates the transform from evaluators paired with their `descending` flag.
    pub(crate) fn new(conditions: Vec<(ExpressionEvaluator, bool)>) -> Self {
        Self {
            conditions,
            solutions: Vec::new(),
        }
    }
}

impl Transform for SortTransform {
    type Input = Bindings;
    type Output = Bindings;

    fn transform(
        &mut self,
        bindings: Bindings,
        _output: &mut VecDeque<Bindings>,
    ) -> ExecResult<TransformFlow> {
        let keys = self
            .conditions
            .iter()
            .map(|(evaluator, _)| OrderKey::new(evaluator.evaluate(&bindings)))
            .collect();
        self.solutions.push((keys, bindings));
        Ok(TransformFlow::Continue)
    }

    fn flush(&mut self, output: &mut VecDeque<Bindings>) -> ExecResult<()> {
        let descending: Vec<_> = self.conditions.iter().map(|(_, desc)| *desc).collect();
        let mut solutions = std::mem::take(&mut self.solutions);
        solutions.sort_by(|(left, _), (right, _)| {
            left.iter()
                .zip(right)
                .zip(&descending)
                .map(|((left, right), descending)| {
                    let ordering = left.compare(right);
                    if *descending {
                        ordering.reverse()
                    } else {
                        ordering
                    }
                })
                .find(|ordering| ordering.is_ne())
                .unwrap_or(Ordering::Equal)
        });
        output.extend(solutions.into_iter().map(|(_, bindings)| bindings));
        Ok(())
    }
}

/// Restricts solutions to the selected variables and turns skolem IRIs back into blank nodes.
pub(crate) struct SelectProjection {
    variables: Arc<[Variable]>,
}

impl SelectProjection {
    pub(crate) fn new(variables: Arc<[Variable]>) -> Self {
        Self { variables }
    }
}

impl Transform for SelectProjection {
    type Input = Bindings;
    type Output = Bindings;

    fn transform(
        &mut self,
        bindings: Bindings,
        output: &mut VecDeque<Bindings>,
    ) -> ExecResult<TransformFlow> {
        output.push_back(
            bindings
                .project(&self.variables)
                .iter()
                .map(|(variable, value)| (variable.clone(), deskolemize_term(value)))
                .collect(),
        );
        Ok(TransformFlow::Continue)
    }
}

/// Source of blank node labels for constructed triples. Labels are never reused by a process.
static BLANK_NODE_COUNTER: AtomicU64 = AtomicU64::new(0);

fn fresh_blank_node() -> BlankNode {
    BlankNode::new_unchecked(format!(
        "b{}",
        BLANK_NODE_COUNTER.fetch_add(1, AtomicOrdering::Relaxed)
    ))
}

/// Instantiates a `CONSTRUCT` template for every solution.
///
/// Template blank nodes are replaced by fresh blank nodes for every solution. Ground template
/// triples are emitted once, together with the first solution. Triples with unbound variables or
/// with terms that are invalid in their position are skipped.
pub(crate) struct ConstructTransform {
    template: Vec<TemplatePattern>,
    ground: Vec<Triple>,
}

impl ConstructTransform {
    pub(crate) fn new(template: Vec<TemplatePattern>) -> Self {
        let (ground, template): (Vec<_>, Vec<_>) =
            template.into_iter().partition(TemplatePattern::is_ground);
        let mut no_blank_nodes = HashMap::new();
        let ground = ground
            .iter()
            .filter_map(|pattern| instantiate(pattern, &Bindings::new(), &mut no_blank_nodes))
            .collect();
        Self { template, ground }
    }
}

impl Transform for ConstructTransform {
    type Input = Bindings;
    type Output = Triple;

    fn transform(
        &mut self,
        bindings: Bindings,
        output: &mut VecDeque<Triple>,
    ) -> ExecResult<TransformFlow> {
        output.extend(self.ground.drain(..));
        let mut blank_nodes = HashMap::new();
        output.extend(
            self.template
                .iter()
                .filter_map(|pattern| instantiate(pattern, &bindings, &mut blank_nodes)),
        );
        Ok(TransformFlow::Continue)
    }
}

fn instantiate(
    pattern: &TemplatePattern,
    bindings: &Bindings,
    blank_nodes: &mut HashMap<BlankNode, BlankNode>,
) -> Option<Triple> {
    let mut value = |term: &TemplateTerm| -> Option<Term> {
        match term {
            TemplateTerm::Constant(term) => Some(deskolemize_term(term)),
            TemplateTerm::Variable(variable) => bindings.get(variable).map(deskolemize_term),
            TemplateTerm::BlankNode(node) => Some(
                blank_nodes
                    .entry(node.clone())
                    .or_insert_with(fresh_blank_node)
                    .clone()
                    .into(),
            ),
        }
    };
    let subject = Subject::try_from(value(&pattern.subject)?).ok()?;
    let predicate = NamedNode::try_from(value(&pattern.predicate)?).ok()?;
    let object = value(&pattern.object)?;
    Some(Triple::new(subject, predicate, object))
}

/// Emits `true` as soon as a solution arrives, `false` if none does.
#[derive(Default)]
pub(crate) struct AskTransform {
    answered: bool,
}

impl Transform for AskTransform {
    type Input = Bindings;
    type Output = bool;

    fn transform(&mut self, _: Bindings, output: &mut VecDeque<bool>) -> ExecResult<TransformFlow> {
        self.answered = true;
        output.push_back(true);
        Ok(TransformFlow::Finish)
    }

    fn flush(&mut self, output: &mut VecDeque<bool>) -> ExecResult<()> {
        if !self.answered {
            output.push_back(false);
        }
        Ok(())
    }
}

/// Drops items that are equal to an item emitted before.
pub(crate) struct DistinctTransform<T> {
    seen: HashSet<T>,
    _item: PhantomData<fn(T) -> T>,
}

impl<T> Default for DistinctTransform<T> {
    fn default() -> Self {
        Self {
            seen: HashSet::new(),
            _item: PhantomData,
        }
    }
}

impl<T: Hash + Eq + Clone + Send> Transform for DistinctTransform<T> {
    type Input = T;
    type Output = T;

    fn transform(&mut self, item: T, output: &mut VecDeque<T>) -> ExecResult<TransformFlow> {
        if self.seen.insert(item.clone()) {
            output.push_back(item);
        }
        Ok(TransformFlow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use ldf_common::iterator::{from_items, TransformIterator};
    use ldf_model::query::Expression;
    use ldf_model::Literal;

    fn var(name: &str) -> Variable {
        Variable::new_unchecked(name)
    }

    fn ex(name: &str) -> NamedNode {
        NamedNode::new_unchecked(format!("http://example.org/{name}"))
    }

    fn solution(entries: &[(&str, Term)]) -> Bindings {
        entries
            .iter()
            .map(|(name, value)| (var(name), value.clone()))
            .collect()
    }

    #[tokio::test]
    async fn sorting_is_numeric_and_stable() {
        let solutions = vec![
            solution(&[("n", Literal::from(10).into()), ("id", ex("a").into())]),
            solution(&[("n", Literal::from(9).into()), ("id", ex("b").into())]),
            solution(&[("id", ex("c").into())]),
            solution(&[("n", Literal::from(10).into()), ("id", ex("d").into())]),
        ];
        let condition =
            ExpressionEvaluator::try_new(&Expression::Variable(var("n"))).unwrap();

        let sorted: Vec<_> = TransformIterator::new(
            from_items(solutions),
            SortTransform::new(vec![(condition, false)]),
        )
        .try_collect()
        .await
        .unwrap();

        let ids: Vec<_> = sorted.iter().map(|s| s.get(&var("id")).unwrap().to_string()).collect();
        assert_eq!(
            ids,
            vec![
                "<http://example.org/c>",
                "<http://example.org/b>",
                "<http://example.org/a>",
                "<http://example.org/d>",
            ]
        );
    }

    #[tokio::test]
    async fn construct_uses_fresh_blank_nodes_per_solution() {
        let template = vec![
            TemplatePattern {
                subject: TemplateTerm::BlankNode(BlankNode::new_unchecked("x")),
                predicate: TemplateTerm::Constant(ex("name").into()),
                object: TemplateTerm::Variable(var("name")),
            },
            TemplatePattern {
                subject: TemplateTerm::BlankNode(BlankNode::new_unchecked("x")),
                predicate: TemplateTerm::Constant(ex("missing").into()),
                object: TemplateTerm::Variable(var("missing")),
            },
            TemplatePattern {
                subject: TemplateTerm::Constant(ex("graph").into()),
                predicate: TemplateTerm::Constant(ex("generatedBy").into()),
                object: TemplateTerm::Constant(ex("client").into()),
            },
        ];
        let solutions = vec![
            solution(&[("name", Literal::new_simple_literal("Ghent").into())]),
            solution(&[("name", Literal::new_simple_literal("Bruges").into())]),
        ];

        let triples: Vec<_> =
            TransformIterator::new(from_items(solutions), ConstructTransform::new(template))
                .try_collect()
                .await
                .unwrap();

        assert_eq!(triples.len(), 3);
        assert_eq!(triples[0].subject, Subject::from(ex("graph")));
        assert!(triples[1].subject.is_blank_node());
        assert_ne!(triples[1].subject, triples[2].subject);
    }

    #[tokio::test]
    async fn ask_answers_once() {
        let answered: Vec<_> = TransformIterator::new(
            from_items(vec![Bindings::new(), Bindings::new()]),
            AskTransform::default(),
        )
        .try_collect()
        .await
        .unwrap();
        let unanswered: Vec<_> =
            TransformIterator::new(from_items(Vec::new()), AskTransform::default())
                .try_collect()
                .await
                .unwrap();

        assert_eq!(answered, vec![true]);
        assert_eq!(unanswered, vec![false]);
    }

    #[tokio::test]
    async fn projection_restores_blank_nodes() {
        let skolem = NamedNode::new_unchecked("http://example.org/.well-known/genid/n1");
        let solutions = vec![solution(&[("s", skolem.into()), ("o", ex("o").into())])];

        let projected: Vec<_> = TransformIterator::new(
            from_items(solutions),
            SelectProjection::new(vec![var("s")].into()),
        )
        .try_collect()
        .await
        .unwrap();

        assert_eq!(
            projected,
            vec![solution(&[("s", BlankNode::new_unchecked("n1").into())])]
        );
    }
}
