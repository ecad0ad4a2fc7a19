use crate::query::{
    Group, OrderCondition, Query, QueryForm, QueryParseError, TemplatePattern, TemplateTerm,
};
use crate::{PatternTerm, TriplePattern};
use oxrdf::{Term, Variable};
use spargebra::algebra::{Expression, GraphPattern, OrderExpression};
use spargebra::term::{NamedNodePattern, TermPattern};

/// Solution modifiers that wrap the `WHERE` clause of a query.
#[derive(Default)]
struct Modifiers<'query> {
    offset: usize,
    limit: Option<usize>,
    distinct: bool,
    projection: Option<&'query [Variable]>,
    order: Vec<OrderCondition>,
    constants: Vec<(Variable, Term)>,
}

pub(super) fn convert_query(query: &spargebra::Query) -> Result<Query, QueryParseError> {
    match query {
        spargebra::Query::Select { pattern, .. } => {
            let (modifiers, inner) = peel_modifiers(pattern)?;
            if !modifiers.constants.is_empty() {
                return unsupported("expressions in the SELECT clause");
            }
            let variables = modifiers.projection.map(<[Variable]>::to_vec);
            let groups = convert_groups(inner)?;
            let variables = variables.unwrap_or_else(|| in_scope_variables(&groups));
            Ok(build(QueryForm::Select { variables }, groups, modifiers))
        }
        spargebra::Query::Construct {
            template, pattern, ..
        } => {
            let (modifiers, inner) = peel_modifiers(pattern)?;
            let template = template
                .iter()
                .map(convert_template_pattern)
                .collect::<Result<Vec<_>, _>>()?;
            let groups = convert_groups(inner)?;
            Ok(build(QueryForm::Construct { template }, groups, modifiers))
        }
        spargebra::Query::Describe { pattern, .. } => {
            let (modifiers, inner) = peel_modifiers(pattern)?;
            let groups = convert_groups(inner)?;
            let resources = match modifiers.projection {
                Some(variables) => variables
                    .iter()
                    .map(|variable| {
                        modifiers
                            .constants
                            .iter()
                            .find(|(bound, _)| bound == variable)
                            .map_or_else(
                                || PatternTerm::Variable(variable.clone()),
                                |(_, term)| PatternTerm::Constant(term.clone()),
                            )
                    })
                    .collect(),
                None => in_scope_variables(&groups)
                    .into_iter()
                    .map(PatternTerm::Variable)
                    .collect(),
            };
            Ok(build(QueryForm::Describe { resources }, groups, modifiers))
        }
        spargebra::Query::Ask { pattern, .. } => {
            let (modifiers, inner) = peel_modifiers(pattern)?;
            let groups = convert_groups(inner)?;
            Ok(build(QueryForm::Ask, groups, modifiers))
        }
    }
}

fn build(form: QueryForm, groups: Vec<Group>, modifiers: Modifiers<'_>) -> Query {
    Query {
        form,
        groups,
        order: modifiers.order,
        distinct: modifiers.distinct,
        offset: modifiers.offset,
        limit: modifiers.limit,
    }
}

/// Strips the solution modifiers in the order in which the parser nests them.
fn peel_modifiers(
    pattern: &GraphPattern,
) -> Result<(Modifiers<'_>, &GraphPattern), QueryParseError> {
    let mut modifiers = Modifiers::default();
    let mut pattern = pattern;

    if let GraphPattern::Slice {
        inner,
        start,
        length,
    } = pattern
    {
        modifiers.offset = *start;
        modifiers.limit = *length;
        pattern = inner.as_ref();
    }
    match pattern {
        GraphPattern::Distinct { inner } => {
            modifiers.distinct = true;
            pattern = inner.as_ref();
        }
        GraphPattern::Reduced { inner } => pattern = inner.as_ref(),
        _ => {}
    }
    if let GraphPattern::Project { inner, variables } = pattern {
        modifiers.projection = Some(variables.as_slice());
        pattern = inner.as_ref();
    }
    if let GraphPattern::OrderBy { inner, expression } = pattern {
        modifiers.order = expression
            .iter()
            .map(|condition| match condition {
                OrderExpression::Asc(expression) => OrderCondition {
                    expression: expression.clone(),
                    descending: false,
                },
                OrderExpression::Desc(expression) => OrderCondition {
                    expression: expression.clone(),
                    descending: true,
                },
            })
            .collect();
        pattern = inner.as_ref();
    }
    while let GraphPattern::Extend {
        inner,
        variable,
        expression,
    } = pattern
    {
        let constant = match expression {
            Expression::NamedNode(node) => Term::from(node.clone()),
            Expression::Literal(literal) => Term::from(literal.clone()),
            _ => return unsupported("BIND and expressions in the projection"),
        };
        modifiers.constants.push((variable.clone(), constant));
        pattern = inner.as_ref();
    }

    Ok((modifiers, pattern))
}

/// Converts the `WHERE` clause into a list of groups.
fn convert_groups(pattern: &GraphPattern) -> Result<Vec<Group>, QueryParseError> {
    let mut groups = Vec::new();
    append_groups(pattern, &mut groups)?;
    Ok(merge_adjacent_bgps(groups))
}

fn append_groups(pattern: &GraphPattern, groups: &mut Vec<Group>) -> Result<(), QueryParseError> {
    match pattern {
        GraphPattern::Bgp { patterns } => {
            let patterns = patterns
                .iter()
                .map(convert_triple_pattern)
                .collect::<Result<Vec<_>, _>>()?;
            groups.push(Group::Bgp(patterns));
        }
        GraphPattern::Join { left, right } => {
            append_groups(left, groups)?;
            append_groups(right, groups)?;
        }
        GraphPattern::LeftJoin {
            left,
            right,
            expression,
        } => {
            append_groups(left, groups)?;
            let mut optional = convert_groups(right)?;
            if let Some(expression) = expression {
                optional.push(Group::Filter(expression.clone()));
            }
            groups.push(Group::Optional(optional));
        }
        GraphPattern::Filter { expr, inner } => {
            append_groups(inner, groups)?;
            groups.push(Group::Filter(expr.clone()));
        }
        GraphPattern::Union { left, right } => {
            let mut branches = Vec::new();
            append_union_branches(left, &mut branches)?;
            append_union_branches(right, &mut branches)?;
            groups.push(Group::Union(branches));
        }
        GraphPattern::Path { .. } => return unsupported("property paths"),
        GraphPattern::Graph { .. } => return unsupported("GRAPH"),
        GraphPattern::Minus { .. } => return unsupported("MINUS"),
        GraphPattern::Values { .. } => return unsupported("VALUES"),
        GraphPattern::Extend { .. } => return unsupported("BIND"),
        GraphPattern::Group { .. } => return unsupported("aggregates"),
        GraphPattern::Project { .. }
        | GraphPattern::Distinct { .. }
        | GraphPattern::Reduced { .. }
        | GraphPattern::Slice { .. }
        | GraphPattern::OrderBy { .. } => return unsupported("subqueries"),
        #[allow(unreachable_patterns, reason = "SERVICE is only available with some features")]
        _ => return unsupported("SERVICE"),
    }
    Ok(())
}

fn append_union_branches(
    pattern: &GraphPattern,
    branches: &mut Vec<Group>,
) -> Result<(), QueryParseError> {
    if let GraphPattern::Union { left, right } = pattern {
        append_union_branches(left, branches)?;
        append_union_branches(right, branches)
    } else {
        branches.push(Group::Group(convert_groups(pattern)?));
        Ok(())
    }
}

/// Merges directly following basic graph patterns so that the planner sees all of their patterns.
fn merge_adjacent_bgps(groups: Vec<Group>) -> Vec<Group> {
    let mut result: Vec<Group> = Vec::with_capacity(groups.len());
    for group in groups {
        match (result.last_mut(), group) {
            (Some(Group::Bgp(previous)), Group::Bgp(patterns)) => previous.extend(patterns),
            (_, group) => result.push(group),
        }
    }
    result
}

fn convert_triple_pattern(
    pattern: &spargebra::term::TriplePattern,
) -> Result<TriplePattern, QueryParseError> {
    Ok(TriplePattern {
        subject: convert_term_pattern(&pattern.subject)?,
        predicate: convert_named_node_pattern(&pattern.predicate),
        object: convert_term_pattern(&pattern.object)?,
    })
}

fn convert_term_pattern(term: &TermPattern) -> Result<PatternTerm, QueryParseError> {
    Ok(match term {
        TermPattern::NamedNode(node) => PatternTerm::Constant(node.clone().into()),
        TermPattern::Literal(literal) => PatternTerm::Constant(literal.clone().into()),
        // Blank nodes in a query behave like variables that cannot be projected.
        TermPattern::BlankNode(node) => {
            PatternTerm::Variable(Variable::new_unchecked(format!("__{}", node.as_str())))
        }
        TermPattern::Variable(variable) => PatternTerm::Variable(variable.clone()),
        #[allow(unreachable_patterns, reason = "Quoted triples are only available with rdf-star")]
        _ => return unsupported("quoted triples"),
    })
}

fn convert_named_node_pattern(term: &NamedNodePattern) -> PatternTerm {
    match term {
        NamedNodePattern::NamedNode(node) => PatternTerm::Constant(node.clone().into()),
        NamedNodePattern::Variable(variable) => PatternTerm::Variable(variable.clone()),
    }
}

fn convert_template_pattern(
    pattern: &spargebra::term::TriplePattern,
) -> Result<TemplatePattern, QueryParseError> {
    let convert = |term: &TermPattern| -> Result<TemplateTerm, QueryParseError> {
        Ok(match term {
            TermPattern::BlankNode(node) => TemplateTerm::BlankNode(node.clone()),
            term => convert_term_pattern(term)?.into(),
        })
    };
    Ok(TemplatePattern {
        subject: convert(&pattern.subject)?,
        predicate: convert_named_node_pattern(&pattern.predicate).into(),
        object: convert(&pattern.object)?,
    })
}

/// Returns the variables of all triple patterns in order of appearance, ignoring blank nodes.
fn in_scope_variables(groups: &[Group]) -> Vec<Variable> {
    fn collect(groups: &[Group], variables: &mut Vec<Variable>) {
        for group in groups {
            match group {
                Group::Bgp(patterns) => {
                    for variable in patterns.iter().flat_map(TriplePattern::variables) {
                        if !variable.as_str().starts_with("__") && !variables.contains(variable) {
                            variables.push(variable.clone());
                        }
                    }
                }
                Group::Group(inner) | Group::Optional(inner) | Group::Union(inner) => {
                    collect(inner, variables);
                }
                Group::Filter(_) => {}
            }
        }
    }

    let mut variables = Vec::new();
    collect(groups, &mut variables);
    variables
}

fn unsupported<T>(feature: &str) -> Result<T, QueryParseError> {
    Err(QueryParseError::Unsupported(format!(
        "unsupported feature: {feature}"
    )))
}
