//! Access to the triples that match a triple pattern at one or more fragment servers.
//!
//! A [Fragment] is a stream of the matching triples together with metadata that estimates how
//! many triples match. [FragmentsClient]s create fragments for patterns. The workspace ships
//! three implementations:
//!
//! - [TriplePatternFragmentsClient] queries a single Triple Pattern Fragments server,
//! - [FederatedFragmentsClient] combines several clients into a [CompoundFragment],
//! - [MemoryFragmentsClient] answers from an in-memory set of triples.

mod client;
mod error;
mod federated;
mod fragment;
mod memory;
mod parser;
mod tpf;

pub use client::{create_fragments_client, FragmentsClient};
pub use error::FragmentsError;
pub use federated::{CompoundFragment, EmptyPatternCache, FederatedFragmentsClient};
pub use fragment::{
    fragment_metadata, BoxFragment, EmptyFragment, Fragment, FragmentControls, FragmentMetadata,
};
pub use memory::{MemoryFragment, MemoryFragmentsClient};
pub use parser::{FragmentParser, ParsedFragment, RdfFragmentParser};
pub use tpf::{fragment_url, HttpFragment, TriplePatternFragmentsClient};
