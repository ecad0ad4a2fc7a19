use oxrdf::{BlankNode, Term};

/// Path segment that marks skolem IRIs, see RDF 1.1 Concepts, section 3.5.
const SKOLEM_SEGMENT: &str = "/.well-known/genid/";

/// Turns a skolem IRI back into the blank node it stands for.
///
/// Other terms and skolem IRIs whose suffix is not a valid blank node identifier are returned as
/// they are.
pub fn deskolemize(term: Term) -> Term {
    if let Term::NamedNode(node) = &term {
        if let Some(blank_node) = node
            .as_str()
            .split_once(SKOLEM_SEGMENT)
            .and_then(|(_, id)| BlankNode::new(id).ok())
        {
            return blank_node.into();
        }
    }
    term
}

/// Borrowing variant of [deskolemize].
pub fn deskolemize_term(term: &Term) -> Term {
    deskolemize(term.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdf::NamedNode;

    #[test]
    fn skolem_iri_becomes_blank_node() {
        let term = NamedNode::new_unchecked("http://example.org/.well-known/genid/b42").into();

        assert_eq!(deskolemize(term), BlankNode::new_unchecked("b42").into());
    }

    #[test]
    fn regular_iri_is_kept() {
        let term: Term = NamedNode::new_unchecked("http://example.org/city").into();

        assert_eq!(deskolemize(term.clone()), term);
    }
}
