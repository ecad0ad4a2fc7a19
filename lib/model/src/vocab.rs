//! Vocabularies used to describe fragments.

pub use oxrdf::vocab::{rdf, xsd};

pub mod hydra {
    //! [Hydra Core](http://www.w3.org/ns/hydra/core#) vocabulary.
    use oxrdf::NamedNodeRef;

    pub const NEXT: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/hydra/core#next");
    /// Older fragment servers use `nextPage` instead of `next`.
    pub const NEXT_PAGE: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/hydra/core#nextPage");
    pub const TOTAL_ITEMS: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/hydra/core#totalItems");
    pub const ITEMS_PER_PAGE: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/hydra/core#itemsPerPage");
    pub const NAMESPACE: &str = "http://www.w3.org/ns/hydra/core#";
}

pub mod void {
    //! [VoID](http://rdfs.org/ns/void#) vocabulary.
    use oxrdf::NamedNodeRef;

    pub const TRIPLES: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://rdfs.org/ns/void#triples");
    pub const NAMESPACE: &str = "http://rdfs.org/ns/void#";
}
