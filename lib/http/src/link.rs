use regex::Regex;
use std::sync::LazyLock;

/// Matches a single link value of a `Link` header: the target and its parameters.
static LINK_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^>]*)>((?:\s*;[^,<]*)*)").unwrap());

/// Matches the `rel` parameter of a link value.
static REL_PARAMETER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i);\s*rel\s*=\s*(?:"([^"]*)"|([^\s;,]+))"#).unwrap());

/// Returns the target of the first link with the relation type `rel` in a `Link` header.
pub(crate) fn find_link<'header>(header: &'header str, rel: &str) -> Option<&'header str> {
    LINK_VALUE.captures_iter(header).find_map(|link| {
        let target = link.get(1)?.as_str();
        let parameters = link.get(2).map_or("", |parameters| parameters.as_str());
        REL_PARAMETER
            .captures_iter(parameters)
            .filter_map(|parameter| parameter.get(1).or_else(|| parameter.get(2)))
            .any(|relations| {
                relations
                    .as_str()
                    .split_whitespace()
                    .any(|relation| relation.eq_ignore_ascii_case(rel))
            })
            .then_some(target)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_timegate() {
        let header = r#"<http://example.org/original>; rel="original", <http://example.org/timegate/dbpedia>; rel="timegate""#;

        assert_eq!(
            find_link(header, "timegate"),
            Some("http://example.org/timegate/dbpedia")
        );
    }

    #[test]
    fn handles_multiple_relations_and_unquoted_values() {
        assert_eq!(
            find_link("<http://example.org/tg>; rel=\"original timegate\"", "timegate"),
            Some("http://example.org/tg")
        );
        assert_eq!(
            find_link("<http://example.org/tg>;rel=timegate", "timegate"),
            Some("http://example.org/tg")
        );
    }

    #[test]
    fn missing_relation() {
        assert_eq!(
            find_link("<http://example.org/next>; rel=\"next\"", "timegate"),
            None
        );
    }
}
