use crate::options::ExecutionOptions;
use crate::planner::GraphPatternIterator;
use crate::sparql::error::QueryError;
use crate::sparql::expression::ExpressionEvaluator;
use crate::sparql::modifiers::FilterTransform;
use futures::stream::select_all;
use ldf_common::iterator::{
    single, MultiTransform, MultiTransformIterator, SendableAsyncIterator, TransformIterator,
};
use ldf_model::query::Group;
use ldf_model::{Bindings, TriplePattern};
use std::sync::Arc;

/// A [Group] whose expressions have been compiled.
///
/// Plans are validated once and then instantiated into an iterator pipeline. Union branches are
/// instantiated again for every incoming solution.
#[derive(Debug)]
pub(crate) enum GroupPlan {
    Bgp(Vec<TriplePattern>),
    Group(Vec<GroupPlan>),
    Optional(Vec<GroupPlan>),
    Union(Arc<[GroupPlan]>),
    Filter(Arc<ExpressionEvaluator>),
}

impl GroupPlan {
    pub(crate) fn try_new(group: &Group) -> Result<Self, QueryError> {
        Ok(match group {
            Group::Bgp(patterns) => GroupPlan::Bgp(patterns.clone()),
            Group::Group(groups) => GroupPlan::Group(try_new_all(groups)?),
            Group::Optional(groups) => GroupPlan::Optional(try_new_all(groups)?),
            Group::Union(branches) => GroupPlan::Union(try_new_all(branches)?.into()),
            Group::Filter(expression) => {
                GroupPlan::Filter(Arc::new(ExpressionEvaluator::try_new(expression)?))
            }
        })
    }

    /// Appends the stages of this group to `source`.
    ///
    /// Only basic graph patterns respect the optional flag of `options`. Nested groups and union
    /// branches are evaluated as mandatory, an optional group sets the flag for its children.
    pub(crate) fn instantiate(
        &self,
        source: SendableAsyncIterator<Bindings>,
        options: &ExecutionOptions,
    ) -> SendableAsyncIterator<Bindings> {
        match self {
            GroupPlan::Bgp(patterns) => {
                Box::pin(GraphPatternIterator::new(source, patterns.clone(), options))
            }
            GroupPlan::Group(groups) => {
                instantiate_all(groups, source, &options.with_optional(false))
            }
            GroupPlan::Optional(groups) => {
                instantiate_all(groups, source, &options.with_optional(true))
            }
            GroupPlan::Union(branches) => {
                let union = UnionBranches {
                    branches: Arc::clone(branches),
                    options: options.with_optional(false),
                    optional: options.optional,
                };
                Box::pin(MultiTransformIterator::with_max_transformers(
                    source,
                    union,
                    options.max_buffer_size,
                ))
            }
            GroupPlan::Filter(evaluator) => Box::pin(TransformIterator::new(
                source,
                FilterTransform::new(Arc::clone(evaluator)),
            )),
        }
    }
}

pub(crate) fn try_new_all(groups: &[Group]) -> Result<Vec<GroupPlan>, QueryError> {
    groups.iter().map(GroupPlan::try_new).collect()
}

/// Chains the stages of all groups, the first group reads from `source`.
pub(crate) fn instantiate_all(
    groups: &[GroupPlan],
    source: SendableAsyncIterator<Bindings>,
    options: &ExecutionOptions,
) -> SendableAsyncIterator<Bindings> {
    groups
        .iter()
        .fold(source, |source, group| group.instantiate(source, options))
}

/// Runs every branch of a union for each incoming solution and interleaves their outputs.
struct UnionBranches {
    branches: Arc<[GroupPlan]>,
    options: ExecutionOptions,
    optional: bool,
}

impl MultiTransform for UnionBranches {
    type Input = Bindings;
    type Output = Bindings;

    fn create_transformer(&mut self, bindings: &Bindings) -> SendableAsyncIterator<Bindings> {
        Box::pin(select_all(self.branches.iter().map(|branch| {
            branch.instantiate(single(bindings.clone()), &self.options)
        })))
    }

    fn on_empty(&mut self, bindings: Bindings) -> Option<Bindings> {
        self.optional.then_some(bindings)
    }
}
