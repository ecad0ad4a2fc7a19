use crate::fragment::FragmentControls;
use ldf_common::{ExecResult, ExecutionError};
use ldf_model::vocab::{hydra, rdf, void};
use ldf_model::{GraphName, NamedNodeRef, Quad, Subject, Term, Triple};
use oxrdfio::{RdfFormat, RdfParser};
use std::fmt::Debug;

/// The content of a single fragment page.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedFragment {
    /// The data triples of the page.
    pub triples: Vec<Triple>,
    pub total_triples: Option<u64>,
    pub controls: FragmentControls,
}

/// Splits the body of a fragment page into data triples and metadata.
pub trait FragmentParser: Debug + Send + Sync {
    fn parse(&self, body: &[u8], base_url: &str, content_type: &str)
        -> ExecResult<ParsedFragment>;
}

/// A [FragmentParser] for all RDF serializations that [oxrdfio] supports.
///
/// Triples in named graphs, triples about the page itself and triples using the Hydra or VoID
/// vocabularies are metadata. Everything else is data. Bodies with an unknown media type are
/// parsed as Turtle.
#[derive(Clone, Copy, Debug, Default)]
pub struct RdfFragmentParser;

impl FragmentParser for RdfFragmentParser {
    fn parse(
        &self,
        body: &[u8],
        base_url: &str,
        content_type: &str,
    ) -> ExecResult<ParsedFragment> {
        let parse_error = |message: String| ExecutionError::Parse {
            url: base_url.to_owned(),
            message,
        };
        let format = RdfFormat::from_media_type(content_type).unwrap_or(RdfFormat::Turtle);
        let parser = RdfParser::from_format(format)
            .with_base_iri(base_url)
            .map_err(|error| parse_error(error.to_string()))?;

        let mut fragment = ParsedFragment::default();
        for quad in parser.for_reader(body) {
            let quad = quad.map_err(|error| parse_error(error.to_string()))?;
            read_metadata(&quad, &mut fragment);
            if !is_metadata(&quad, base_url) {
                fragment.triples.push(Triple::from(quad));
            }
        }
        Ok(fragment)
    }
}

fn read_metadata(quad: &Quad, fragment: &mut ParsedFragment) {
    let predicate = quad.predicate.as_ref();
    if predicate == hydra::TOTAL_ITEMS || predicate == void::TRIPLES {
        if fragment.total_triples.is_none() {
            fragment.total_triples = parse_count(&quad.object);
        }
    } else if predicate == hydra::NEXT || predicate == hydra::NEXT_PAGE {
        if let (None, Term::NamedNode(next)) = (&fragment.controls.next_page, &quad.object) {
            fragment.controls.next_page = Some(next.as_str().to_owned());
        }
    } else if predicate == hydra::ITEMS_PER_PAGE && fragment.controls.page_size.is_none() {
        fragment.controls.page_size = parse_count(&quad.object);
    }
}

fn parse_count(term: &Term) -> Option<u64> {
    match term {
        Term::Literal(literal) => literal.value().trim().parse().ok(),
        _ => None,
    }
}

fn is_metadata(quad: &Quad, base_url: &str) -> bool {
    if quad.graph_name != GraphName::DefaultGraph {
        return true;
    }
    if matches!(&quad.subject, Subject::NamedNode(subject) if subject.as_str() == base_url) {
        return true;
    }
    if is_metadata_term(quad.predicate.as_ref()) {
        return true;
    }
    quad.predicate.as_ref() == rdf::TYPE
        && matches!(&quad.object, Term::NamedNode(class) if is_metadata_term(class.as_ref()))
}

fn is_metadata_term(iri: NamedNodeRef<'_>) -> bool {
    iri.as_str().starts_with(hydra::NAMESPACE) || iri.as_str().starts_with(void::NAMESPACE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldf_model::NamedNode;

    const PAGE: &str = "http://example.org/dataset?predicate=http%3A%2F%2Fexample.org%2Fp";

    #[test]
    fn separates_data_from_metadata() {
        let body = format!(
            r#"
            @prefix hydra: <http://www.w3.org/ns/hydra/core#> .
            @prefix void: <http://rdfs.org/ns/void#> .
            <http://example.org/a> <http://example.org/p> <http://example.org/b> .
            <http://example.org/c> <http://example.org/p> "x" .
            <{PAGE}> hydra:totalItems "1000" ;
                void:triples 1000 ;
                hydra:itemsPerPage 100 ;
                hydra:next <{PAGE}&page=2> .
            <http://example.org/dataset#dataset> a void:Dataset, hydra:Collection .
            "#
        );

        let fragment = RdfFragmentParser
            .parse(body.as_bytes(), PAGE, "text/turtle")
            .unwrap();

        assert_eq!(fragment.triples.len(), 2);
        assert_eq!(fragment.total_triples, Some(1000));
        assert_eq!(fragment.controls.page_size, Some(100));
        assert_eq!(
            fragment.controls.next_page,
            Some(format!("{PAGE}&page=2"))
        );
    }

    #[test]
    fn named_graphs_are_metadata() {
        let body = format!(
            r#"
            <http://example.org/a> <http://example.org/p> <http://example.org/b> .
            <{PAGE}#metadata> {{
                <{PAGE}> <http://www.w3.org/ns/hydra/core#totalItems> "1" .
                <http://example.org/x> <http://example.org/y> <http://example.org/z> .
            }}
            "#
        );

        let fragment = RdfFragmentParser
            .parse(body.as_bytes(), PAGE, "application/trig")
            .unwrap();

        assert_eq!(
            fragment.triples,
            vec![Triple::new(
                NamedNode::new_unchecked("http://example.org/a"),
                NamedNode::new_unchecked("http://example.org/p"),
                NamedNode::new_unchecked("http://example.org/b"),
            )]
        );
        assert_eq!(fragment.total_triples, Some(1));
        assert_eq!(fragment.controls.next_page, None);
    }

    #[test]
    fn unknown_media_types_are_parsed_as_turtle() {
        let body = "<http://example.org/a> <http://example.org/p> <http://example.org/b> .";

        let fragment = RdfFragmentParser
            .parse(body.as_bytes(), PAGE, "application/octet-stream")
            .unwrap();

        assert_eq!(fragment.triples.len(), 1);
        assert_eq!(fragment.total_triples, None);
    }

    #[test]
    fn syntax_errors_are_parse_errors() {
        let result = RdfFragmentParser.parse(b"<http://example.org/a> .", PAGE, "text/turtle");

        assert!(matches!(result, Err(ExecutionError::Parse { .. })));
    }
}
