use crate::options::{ExecutionOptions, JoinOrder};
use crate::triple_pattern::TriplePatternIterator;
use futures::{ready, Stream, StreamExt};
use ldf_common::iterator::{single, MultiTransform, MultiTransformIterator, SendableAsyncIterator};
use ldf_common::ExecResult;
use ldf_fragments::BoxFragment;
use ldf_model::{find_connected_patterns, Bindings, TriplePattern, Variable};
use std::collections::HashSet;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::debug;

/// Evaluates a basic graph pattern for every incoming solution.
///
/// Empty patterns pass solutions through, a single pattern needs no planning and is evaluated by a
/// [TriplePatternIterator]. Everything else is planned by a [ReorderingGraphPatternIterator].
pub enum GraphPatternIterator {
    PassThrough(SendableAsyncIterator<Bindings>),
    TriplePattern(TriplePatternIterator),
    Reordering(ReorderingGraphPatternIterator),
}

impl GraphPatternIterator {
    pub fn new(
        source: SendableAsyncIterator<Bindings>,
        mut patterns: Vec<TriplePattern>,
        options: &ExecutionOptions,
    ) -> Self {
        match patterns.len() {
            0 => Self::PassThrough(source),
            1 => {
                let pattern = patterns.remove(0);
                Self::TriplePattern(TriplePatternIterator::new(source, pattern, options))
            }
            _ => Self::Reordering(ReorderingGraphPatternIterator::new(
                source, patterns, options,
            )),
        }
    }
}

impl Stream for GraphPatternIterator {
    type Item = ExecResult<Bindings>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.get_mut() {
            Self::PassThrough(source) => source.poll_next_unpin(cx),
            Self::TriplePattern(iterator) => iterator.poll_next_unpin(cx),
            Self::Reordering(iterator) => iterator.poll_next_unpin(cx),
        }
    }
}

/// Evaluates a basic graph pattern and chooses the join order separately for every solution.
///
/// The patterns are bound with the incoming solution and split into groups that are connected
/// through shared variables. The group with the lowest cost is evaluated first. Within a group, the
/// pattern with the fewest matches according to the fragment metadata starts the pipeline and the
/// rest of the group is planned again for each of its solutions. If a pattern has no matches at
/// all, the solution cannot be extended and planning stops right away.
pub struct ReorderingGraphPatternIterator {
    inner: MultiTransformIterator<Planner>,
}

impl ReorderingGraphPatternIterator {
    pub fn new(
        source: SendableAsyncIterator<Bindings>,
        patterns: Vec<TriplePattern>,
        options: &ExecutionOptions,
    ) -> Self {
        let planner = Planner {
            patterns,
            options: options.clone(),
        };
        Self {
            inner: MultiTransformIterator::with_max_transformers(
                source,
                planner,
                options.max_buffer_size,
            ),
        }
    }
}

impl Stream for ReorderingGraphPatternIterator {
    type Item = ExecResult<Bindings>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

struct Planner {
    patterns: Vec<TriplePattern>,
    options: ExecutionOptions,
}

impl MultiTransform for Planner {
    type Input = Bindings;
    type Output = Bindings;

    fn create_transformer(&mut self, bindings: &Bindings) -> SendableAsyncIterator<Bindings> {
        let bound: Vec<_> = self
            .patterns
            .iter()
            .map(|pattern| pattern.bind(bindings))
            .collect();
        let plan = match self.options.join_order {
            JoinOrder::Adaptive => Plan::adaptive(bound, bindings, &self.options),
            JoinOrder::Fixed => Plan::fixed(bound),
        };
        Box::pin(Pipeline {
            bindings: bindings.clone(),
            options: self.options.clone(),
            state: PipelineState::Planning(Box::new(plan)),
        })
    }

    fn on_empty(&mut self, bindings: Bindings) -> Option<Bindings> {
        self.options.optional.then_some(bindings)
    }
}

/// Ranks a connected group of patterns. Lower is better.
fn component_cost(component: &[TriplePattern], total_patterns: usize) -> usize {
    let variables: HashSet<&Variable> = component
        .iter()
        .flat_map(TriplePattern::variables)
        .collect();
    total_patterns * variables.len() + component.len()
}

/// The decisions that are made for a single solution before its pipeline can be built.
struct Plan {
    /// The connected group that is evaluated first.
    component: Vec<TriplePattern>,
    /// The other groups, the next one to evaluate is last.
    deferred: Vec<Vec<TriplePattern>>,
    /// The fragments whose metadata has not arrived yet, by pattern index.
    fragments: Vec<Option<BoxFragment>>,
    /// The index and the number of matches of the best pattern so far.
    best: Option<(usize, u64)>,
}

impl Plan {
    fn adaptive(bound: Vec<TriplePattern>, bindings: &Bindings, options: &ExecutionOptions) -> Self {
        let total_patterns = bound.len();
        let mut components = find_connected_patterns(&bound);
        components.sort_by_key(|component| {
            std::cmp::Reverse(component_cost(component, total_patterns))
        });
        let component = components.pop().unwrap_or_default();
        debug!(%bindings, patterns = component.len(), deferred = components.len(), "Chose component");

        let fragments = if component.len() > 1 {
            component
                .iter()
                .map(|pattern| Some(options.fragments_client.fragment_by_pattern(pattern)))
                .collect()
        } else {
            Vec::new()
        };
        Self {
            component,
            deferred: components,
            fragments,
            best: None,
        }
    }

    fn fixed(bound: Vec<TriplePattern>) -> Self {
        Self {
            component: bound,
            deferred: Vec::new(),
            fragments: Vec::new(),
            best: None,
        }
    }

    /// Collects the metadata of the patterns.
    ///
    /// Resolves to the index of the pattern to start with, or to `None` if a pattern has no
    /// matches.
    fn poll_best_pattern(&mut self, cx: &mut Context<'_>) -> Poll<Option<usize>> {
        for index in 0..self.fragments.len() {
            let Some(fragment) = self.fragments[index].as_mut() else {
                continue;
            };
            let Poll::Ready(metadata) = fragment.poll_metadata(cx) else {
                continue;
            };
            fragment.close();
            self.fragments[index] = None;

            let pattern = &self.component[index];
            match metadata {
                Ok(metadata) if metadata.had_error => {
                    debug!(%pattern, "Ignoring incomplete metadata");
                }
                Ok(metadata) => {
                    debug!(%pattern, total_triples = ?metadata.total_triples, "Metadata arrived");
                    if metadata.total_triples == Some(0) {
                        debug!(%pattern, "Pattern has no matches");
                        self.close();
                        return Poll::Ready(None);
                    }
                    let matches = metadata.total_triples.unwrap_or(u64::MAX);
                    if self.best.map_or(true, |(_, best)| matches < best) {
                        self.best = Some((index, matches));
                    }
                }
                Err(error) => debug!(%pattern, %error, "Ignoring failed metadata"),
            }
        }

        if self.fragments.iter().any(Option::is_some) {
            return Poll::Pending;
        }
        Poll::Ready(Some(self.best.map_or(0, |(index, _)| index)))
    }

    fn close(&mut self) {
        for mut fragment in self.fragments.drain(..).flatten() {
            fragment.close();
        }
    }

    /// Builds the pipeline that starts with the pattern at `index`.
    fn into_pipeline(
        mut self,
        index: usize,
        bindings: Bindings,
        options: &ExecutionOptions,
    ) -> SendableAsyncIterator<Bindings> {
        if self.component.is_empty() {
            return single(bindings);
        }
        let first = self.component.remove(index);
        debug!(pattern = %first, "Starting pipeline");

        let mut pipeline: SendableAsyncIterator<Bindings> =
            Box::pin(TriplePatternIterator::new(single(bindings), first, options));
        if !self.component.is_empty() {
            pipeline = Box::pin(GraphPatternIterator::new(pipeline, self.component, options));
        }
        while let Some(component) = self.deferred.pop() {
            pipeline = Box::pin(GraphPatternIterator::new(pipeline, component, options));
        }
        pipeline
    }
}

enum PipelineState {
    Planning(Box<Plan>),
    Running(SendableAsyncIterator<Bindings>),
    Finished,
}

/// The solutions of a basic graph pattern for a single incoming solution.
struct Pipeline {
    bindings: Bindings,
    options: ExecutionOptions,
    state: PipelineState,
}

impl Stream for Pipeline {
    type Item = ExecResult<Bindings>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            match &mut this.state {
                PipelineState::Planning(plan) => {
                    let best = ready!(plan.poll_best_pattern(cx));
                    let state = std::mem::replace(&mut this.state, PipelineState::Finished);
                    if let (PipelineState::Planning(plan), Some(index)) = (state, best) {
                        this.state = PipelineState::Running(plan.into_pipeline(
                            index,
                            this.bindings.clone(),
                            &this.options,
                        ));
                    }
                }
                PipelineState::Running(pipeline) => {
                    let item = ready!(pipeline.poll_next_unpin(cx));
                    if item.is_none() {
                        this.state = PipelineState::Finished;
                    }
                    return Poll::Ready(item);
                }
                PipelineState::Finished => return Poll::Ready(None),
            }
        }
    }
}
