use crate::options::ExecutionOptions;
use crate::results::{QueryResults, QuerySolutionStream, QueryTripleStream};
use crate::sparql::error::{QueryError, QueryEvaluationError};
use crate::sparql::expression::ExpressionEvaluator;
use crate::sparql::groups::{instantiate_all, try_new_all, GroupPlan};
use crate::sparql::modifiers::{
    AskTransform, ConstructTransform, DistinctTransform, SelectProjection, SortTransform,
};
use futures::TryStreamExt;
use ldf_common::iterator::{limit, single, SendableAsyncIterator, TransformIterator};
use ldf_model::query::{Query, QueryForm, TemplatePattern, TemplateTerm};
use ldf_model::{Bindings, PatternTerm, TriplePattern, Variable};
use std::hash::Hash;
use std::sync::Arc;
use tracing::debug;

/// Evaluates `query` over the fragments client of `options`.
///
/// The query is compiled before anything is requested, so unsupported expressions fail here.
/// `SELECT`, `CONSTRUCT` and `DESCRIBE` return lazy streams. `ASK` is answered before returning.
pub async fn evaluate_query(
    query: &Query,
    options: &ExecutionOptions,
) -> Result<QueryResults, QueryEvaluationError> {
    let mut groups = try_new_all(&query.groups)?;
    let order = query
        .order
        .iter()
        .map(|condition| {
            Ok((
                ExpressionEvaluator::try_new(&condition.expression)?,
                condition.descending,
            ))
        })
        .collect::<Result<Vec<_>, QueryError>>()?;
    debug!(query_type = %query.query_type(), groups = groups.len(), "Evaluating query");

    match &query.form {
        QueryForm::Select { variables } => {
            let variables: Arc<[Variable]> = variables.clone().into();
            let solutions = Box::pin(TransformIterator::new(
                solutions(&groups, order, options),
                SelectProjection::new(Arc::clone(&variables)),
            ));
            Ok(QueryResults::Solutions(QuerySolutionStream::new(
                variables,
                distinct_and_slice(solutions, query),
            )))
        }
        QueryForm::Construct { template } => {
            let triples = Box::pin(TransformIterator::new(
                solutions(&groups, order, options),
                ConstructTransform::new(template.clone()),
            ));
            Ok(QueryResults::Graph(QueryTripleStream::new(
                distinct_and_slice(triples, query),
            )))
        }
        QueryForm::Describe { resources } => {
            let (patterns, template) = describe_resources(resources);
            groups.push(GroupPlan::Bgp(patterns));
            let triples = Box::pin(TransformIterator::new(
                solutions(&groups, order, options),
                ConstructTransform::new(template),
            ));
            Ok(QueryResults::Graph(QueryTripleStream::new(
                distinct_and_slice(triples, query),
            )))
        }
        QueryForm::Ask => {
            let mut answers = TransformIterator::new(
                solutions(&groups, order, options),
                AskTransform::default(),
            );
            let answer = answers.try_next().await?.unwrap_or(false);
            Ok(QueryResults::Boolean(answer))
        }
    }
}

/// Builds the pipeline of the `WHERE` clause, sorted if the query has an `ORDER BY`.
fn solutions(
    groups: &[GroupPlan],
    order: Vec<(ExpressionEvaluator, bool)>,
    options: &ExecutionOptions,
) -> SendableAsyncIterator<Bindings> {
    let solutions = instantiate_all(groups, single(Bindings::new()), options);
    if order.is_empty() {
        solutions
    } else {
        Box::pin(TransformIterator::new(solutions, SortTransform::new(order)))
    }
}

fn distinct_and_slice<T: Hash + Eq + Clone + Send + 'static>(
    source: SendableAsyncIterator<T>,
    query: &Query,
) -> SendableAsyncIterator<T> {
    let source = if query.distinct {
        Box::pin(TransformIterator::new(source, DistinctTransform::default()))
    } else {
        source
    };
    limit(source, query.offset, query.limit)
}

/// Creates a `resource ?p ?o` pattern and the matching template for every described resource.
fn describe_resources(resources: &[PatternTerm]) -> (Vec<TriplePattern>, Vec<TemplatePattern>) {
    resources
        .iter()
        .enumerate()
        .map(|(i, resource)| {
            let predicate = Variable::new_unchecked(format!("__predicate{i}"));
            let object = Variable::new_unchecked(format!("__object{i}"));
            let pattern = TriplePattern::new(resource.clone(), predicate.clone(), object.clone());
            let template = TemplatePattern {
                subject: TemplateTerm::from(resource.clone()),
                predicate: TemplateTerm::Variable(predicate),
                object: TemplateTerm::Variable(object),
            };
            (pattern, template)
        })
        .unzip()
}
