use ldf_common::iterator::DEFAULT_MAX_BUFFER_SIZE;
use ldf_fragments::FragmentsClient;
use std::sync::Arc;

/// How the patterns of a basic graph pattern are joined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JoinOrder {
    /// Starts with the pattern that has the fewest matches for the current solution.
    #[default]
    Adaptive,
    /// Joins the patterns in the order in which they appear in the query.
    Fixed,
}

/// Options that are passed down to every stage of a pipeline.
#[derive(Clone, Debug)]
pub struct ExecutionOptions {
    pub fragments_client: Arc<dyn FragmentsClient>,
    /// Set inside `OPTIONAL`. A solution that cannot be extended is passed on unchanged.
    pub optional: bool,
    /// The number of solutions that are processed concurrently by a stage.
    pub max_buffer_size: usize,
    pub join_order: JoinOrder,
}

impl ExecutionOptions {
    pub fn new(fragments_client: Arc<dyn FragmentsClient>) -> Self {
        Self {
            fragments_client,
            optional: false,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            join_order: JoinOrder::default(),
        }
    }

    /// Returns a copy of these options with the given `optional` flag.
    #[must_use]
    pub fn with_optional(&self, optional: bool) -> Self {
        Self {
            optional,
            ..self.clone()
        }
    }
}
