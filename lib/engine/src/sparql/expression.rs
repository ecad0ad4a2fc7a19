use crate::sparql::error::QueryError;
use ldf_model::query::{Expression, Function};
use ldf_model::vocab::xsd;
use ldf_model::{Bindings, Literal, Term, Variable};
use regex::{Regex, RegexBuilder};
use std::cmp::Ordering;

/// An error raised while evaluating an expression for a single solution.
///
/// Evaluation errors never end a pipeline. A filter drops the solution and an ordering treats the
/// value as the empty string.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum EvaluationError {
    #[error("Variable {0} is not bound")]
    UnboundVariable(Variable),
    #[error("Type error: {0}")]
    TypeError(String),
    #[error("Invalid regular expression: {0}")]
    InvalidRegex(String),
}

fn type_error<T>(message: impl Into<String>) -> Result<T, EvaluationError> {
    Err(EvaluationError::TypeError(message.into()))
}

/// Evaluates a SPARQL expression against bindings.
///
/// The expression is checked when the evaluator is created. Unsupported functions and `EXISTS` are
/// rejected at that point, as are constant regular expressions that do not compile.
#[derive(Debug)]
pub struct ExpressionEvaluator {
    root: Expr,
}

impl ExpressionEvaluator {
    pub fn try_new(expression: &Expression) -> Result<Self, QueryError> {
        Ok(Self {
            root: compile(expression)?,
        })
    }

    pub fn evaluate(&self, bindings: &Bindings) -> Result<Term, EvaluationError> {
        self.root.evaluate(bindings)
    }

    /// Evaluates the expression to its effective boolean value.
    pub fn evaluate_ebv(&self, bindings: &Bindings) -> Result<bool, EvaluationError> {
        self.root.evaluate_ebv(bindings)
    }
}

#[derive(Debug)]
enum Expr {
    Constant(Term),
    Variable(Variable),
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Equal(Box<Expr>, Box<Expr>),
    SameTerm(Box<Expr>, Box<Expr>),
    Compare(Box<Expr>, Box<Expr>, Comparison),
    Arithmetic(Box<Expr>, Box<Expr>, Operation),
    UnaryPlus(Box<Expr>),
    UnaryMinus(Box<Expr>),
    In(Box<Expr>, Vec<Expr>),
    Bound(Variable),
    If(Box<Expr>, Box<Expr>, Box<Expr>),
    Coalesce(Vec<Expr>),
    Call(Builtin, Vec<Expr>),
    Regex(Box<Expr>, RegexPattern),
}

#[derive(Debug)]
enum RegexPattern {
    /// Pattern and flags were constants.
    Compiled(Regex),
    Dynamic {
        pattern: Box<Expr>,
        flags: Option<Box<Expr>>,
    },
}

#[derive(Clone, Copy, Debug)]
enum Comparison {
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl Comparison {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Comparison::Less => ordering.is_lt(),
            Comparison::LessOrEqual => ordering.is_le(),
            Comparison::Greater => ordering.is_gt(),
            Comparison::GreaterOrEqual => ordering.is_ge(),
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

#[derive(Clone, Copy, Debug)]
enum Builtin {
    Str,
    Lang,
    LangMatches,
    Datatype,
    IsIri,
    IsBlank,
    IsLiteral,
    IsNumeric,
    Contains,
    StrStarts,
    StrEnds,
    StrLen,
    UCase,
    LCase,
}

impl Builtin {
    fn arity(self) -> usize {
        match self {
            Builtin::LangMatches | Builtin::Contains | Builtin::StrStarts | Builtin::StrEnds => 2,
            _ => 1,
        }
    }
}

fn compile(expression: &Expression) -> Result<Expr, QueryError> {
    let binary = |left: &Expression, right: &Expression| -> Result<_, QueryError> {
        Ok((Box::new(compile(left)?), Box::new(compile(right)?)))
    };

    Ok(match expression {
        Expression::NamedNode(node) => Expr::Constant(node.clone().into()),
        Expression::Literal(literal) => Expr::Constant(literal.clone().into()),
        Expression::Variable(variable) => Expr::Variable(variable.clone()),
        Expression::Or(left, right) => {
            let (left, right) = binary(left, right)?;
            Expr::Or(left, right)
        }
        Expression::And(left, right) => {
            let (left, right) = binary(left, right)?;
            Expr::And(left, right)
        }
        Expression::Not(inner) => Expr::Not(Box::new(compile(inner)?)),
        Expression::Equal(left, right) => {
            let (left, right) = binary(left, right)?;
            Expr::Equal(left, right)
        }
        Expression::SameTerm(left, right) => {
            let (left, right) = binary(left, right)?;
            Expr::SameTerm(left, right)
        }
        Expression::Less(left, right) => {
            let (left, right) = binary(left, right)?;
            Expr::Compare(left, right, Comparison::Less)
        }
        Expression::LessOrEqual(left, right) => {
            let (left, right) = binary(left, right)?;
            Expr::Compare(left, right, Comparison::LessOrEqual)
        }
        Expression::Greater(left, right) => {
            let (left, right) = binary(left, right)?;
            Expr::Compare(left, right, Comparison::Greater)
        }
        Expression::GreaterOrEqual(left, right) => {
            let (left, right) = binary(left, right)?;
            Expr::Compare(left, right, Comparison::GreaterOrEqual)
        }
        Expression::Add(left, right) => {
            let (left, right) = binary(left, right)?;
            Expr::Arithmetic(left, right, Operation::Add)
        }
        Expression::Subtract(left, right) => {
            let (left, right) = binary(left, right)?;
            Expr::Arithmetic(left, right, Operation::Subtract)
        }
        Expression::Multiply(left, right) => {
            let (left, right) = binary(left, right)?;
            Expr::Arithmetic(left, right, Operation::Multiply)
        }
        Expression::Divide(left, right) => {
            let (left, right) = binary(left, right)?;
            Expr::Arithmetic(left, right, Operation::Divide)
        }
        Expression::UnaryPlus(inner) => Expr::UnaryPlus(Box::new(compile(inner)?)),
        Expression::UnaryMinus(inner) => Expr::UnaryMinus(Box::new(compile(inner)?)),
        Expression::In(needle, haystack) => Expr::In(
            Box::new(compile(needle)?),
            haystack.iter().map(compile).collect::<Result<_, _>>()?,
        ),
        Expression::Bound(variable) => Expr::Bound(variable.clone()),
        Expression::If(test, if_true, if_false) => Expr::If(
            Box::new(compile(test)?),
            Box::new(compile(if_true)?),
            Box::new(compile(if_false)?),
        ),
        Expression::Coalesce(args) => {
            Expr::Coalesce(args.iter().map(compile).collect::<Result<_, _>>()?)
        }
        Expression::Exists(_) => {
            return Err(QueryError::Unsupported("EXISTS in expressions".to_owned()))
        }
        Expression::FunctionCall(function, args) => compile_function_call(function, args)?,
    })
}

fn compile_function_call(function: &Function, args: &[Expression]) -> Result<Expr, QueryError> {
    let builtin = match function {
        Function::Regex => return compile_regex(args),
        Function::Str => Builtin::Str,
        Function::Lang => Builtin::Lang,
        Function::LangMatches => Builtin::LangMatches,
        Function::Datatype => Builtin::Datatype,
        Function::IsIri => Builtin::IsIri,
        Function::IsBlank => Builtin::IsBlank,
        Function::IsLiteral => Builtin::IsLiteral,
        Function::IsNumeric => Builtin::IsNumeric,
        Function::Contains => Builtin::Contains,
        Function::StrStarts => Builtin::StrStarts,
        Function::StrEnds => Builtin::StrEnds,
        Function::StrLen => Builtin::StrLen,
        Function::UCase => Builtin::UCase,
        Function::LCase => Builtin::LCase,
        function => {
            return Err(QueryError::Unsupported(format!(
                "the function {function}"
            )))
        }
    };
    if args.len() != builtin.arity() {
        return Err(QueryError::Unsupported(format!(
            "{function} with {} arguments",
            args.len()
        )));
    }
    Ok(Expr::Call(
        builtin,
        args.iter().map(compile).collect::<Result<_, _>>()?,
    ))
}

fn compile_regex(args: &[Expression]) -> Result<Expr, QueryError> {
    let (text, pattern, flags) = match args {
        [text, pattern] => (text, pattern, None),
        [text, pattern, flags] => (text, pattern, Some(flags)),
        _ => {
            return Err(QueryError::Unsupported(format!(
                "REGEX with {} arguments",
                args.len()
            )))
        }
    };

    let text = Box::new(compile(text)?);
    let constant_flags = match flags {
        None => Some(""),
        Some(Expression::Literal(flags)) => Some(flags.value()),
        Some(_) => None,
    };
    if let (Expression::Literal(pattern), Some(flags)) = (pattern, constant_flags) {
        let regex = build_regex(pattern.value(), flags)
            .map_err(|error| QueryError::InvalidRegex(error.to_string()))?;
        return Ok(Expr::Regex(text, RegexPattern::Compiled(regex)));
    }

    Ok(Expr::Regex(
        text,
        RegexPattern::Dynamic {
            pattern: Box::new(compile(pattern)?),
            flags: flags.map(compile).transpose()?.map(Box::new),
        },
    ))
}

fn build_regex(pattern: &str, flags: &str) -> Result<Regex, EvaluationError> {
    let pattern = if flags.contains('q') {
        regex::escape(pattern)
    } else {
        pattern.to_owned()
    };
    let mut builder = RegexBuilder::new(&pattern);
    for flag in flags.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            's' => builder.dot_matches_new_line(true),
            'm' => builder.multi_line(true),
            'x' => builder.ignore_whitespace(true),
            'q' => continue,
            _ => {
                return Err(EvaluationError::InvalidRegex(format!(
                    "unknown flag '{flag}'"
                )))
            }
        };
    }
    builder
        .build()
        .map_err(|error| EvaluationError::InvalidRegex(error.to_string()))
}

impl Expr {
    fn evaluate(&self, bindings: &Bindings) -> Result<Term, EvaluationError> {
        match self {
            Expr::Constant(term) => Ok(term.clone()),
            Expr::Variable(variable) => bindings
                .get(variable)
                .cloned()
                .ok_or_else(|| EvaluationError::UnboundVariable(variable.clone())),
            Expr::Or(left, right) => {
                match (left.evaluate_ebv(bindings), right.evaluate_ebv(bindings)) {
                    (Ok(true), _) | (_, Ok(true)) => Ok(boolean(true)),
                    (Ok(false), Ok(false)) => Ok(boolean(false)),
                    (Err(error), _) | (_, Err(error)) => Err(error),
                }
            }
            Expr::And(left, right) => {
                match (left.evaluate_ebv(bindings), right.evaluate_ebv(bindings)) {
                    (Ok(false), _) | (_, Ok(false)) => Ok(boolean(false)),
                    (Ok(true), Ok(true)) => Ok(boolean(true)),
                    (Err(error), _) | (_, Err(error)) => Err(error),
                }
            }
            Expr::Not(inner) => Ok(boolean(!inner.evaluate_ebv(bindings)?)),
            Expr::Equal(left, right) => Ok(boolean(equals(
                &left.evaluate(bindings)?,
                &right.evaluate(bindings)?,
            ))),
            Expr::SameTerm(left, right) => {
                Ok(boolean(left.evaluate(bindings)? == right.evaluate(bindings)?))
            }
            Expr::Compare(left, right, comparison) => {
                let ordering = compare(&left.evaluate(bindings)?, &right.evaluate(bindings)?)?;
                Ok(boolean(ordering.is_some_and(|ordering| comparison.holds(ordering))))
            }
            Expr::Arithmetic(left, right, operation) => {
                let left = numeric_argument(&left.evaluate(bindings)?)?;
                let right = numeric_argument(&right.evaluate(bindings)?)?;
                Ok(left.apply(*operation, right)?.into_term())
            }
            Expr::UnaryPlus(inner) => {
                Ok(numeric_argument(&inner.evaluate(bindings)?)?.into_term())
            }
            Expr::UnaryMinus(inner) => {
                Ok(numeric_argument(&inner.evaluate(bindings)?)?.negate()?.into_term())
            }
            Expr::In(needle, haystack) => {
                let needle = needle.evaluate(bindings)?;
                let mut error = None;
                for candidate in haystack {
                    match candidate.evaluate(bindings) {
                        Ok(candidate) if equals(&needle, &candidate) => return Ok(boolean(true)),
                        Ok(_) => {}
                        Err(e) => error = Some(e),
                    }
                }
                error.map_or(Ok(boolean(false)), Err)
            }
            Expr::Bound(variable) => Ok(boolean(bindings.contains(variable))),
            Expr::If(test, if_true, if_false) => {
                if test.evaluate_ebv(bindings)? {
                    if_true.evaluate(bindings)
                } else {
                    if_false.evaluate(bindings)
                }
            }
            Expr::Coalesce(args) => args
                .iter()
                .find_map(|arg| arg.evaluate(bindings).ok())
                .ok_or_else(|| {
                    EvaluationError::TypeError("COALESCE without a valid argument".to_owned())
                }),
            Expr::Call(builtin, args) => {
                let args = args
                    .iter()
                    .map(|arg| arg.evaluate(bindings))
                    .collect::<Result<Vec<_>, _>>()?;
                call(*builtin, &args)
            }
            Expr::Regex(text, pattern) => {
                let text = string_literal(&text.evaluate(bindings)?)?.value().to_owned();
                let matches = match pattern {
                    RegexPattern::Compiled(regex) => regex.is_match(&text),
                    RegexPattern::Dynamic { pattern, flags } => {
                        let pattern = pattern.evaluate(bindings)?;
                        let flags = flags
                            .as_ref()
                            .map(|flags| flags.evaluate(bindings))
                            .transpose()?;
                        let flags = match &flags {
                            Some(flags) => string_literal(flags)?.value(),
                            None => "",
                        };
                        build_regex(string_literal(&pattern)?.value(), flags)?.is_match(&text)
                    }
                };
                Ok(boolean(matches))
            }
        }
    }

    fn evaluate_ebv(&self, bindings: &Bindings) -> Result<bool, EvaluationError> {
        effective_boolean_value(&self.evaluate(bindings)?)
    }
}

fn call(builtin: Builtin, args: &[Term]) -> Result<Term, EvaluationError> {
    match (builtin, args) {
        (Builtin::Str, [term]) => match term {
            Term::NamedNode(node) => Ok(Literal::new_simple_literal(node.as_str()).into()),
            Term::Literal(literal) => Ok(Literal::new_simple_literal(literal.value()).into()),
            _ => type_error(format!("STR is not defined for {term}")),
        },
        (Builtin::Lang, [term]) => match term {
            Term::Literal(literal) => {
                Ok(Literal::new_simple_literal(literal.language().unwrap_or_default()).into())
            }
            _ => type_error(format!("LANG is not defined for {term}")),
        },
        (Builtin::LangMatches, [tag, range]) => {
            let tag = string_literal(tag)?.value();
            let range = string_literal(range)?.value();
            Ok(boolean(language_matches(tag, range)))
        }
        (Builtin::Datatype, [term]) => match term {
            Term::Literal(literal) => Ok(literal.datatype().into_owned().into()),
            _ => type_error(format!("DATATYPE is not defined for {term}")),
        },
        (Builtin::IsIri, [term]) => Ok(boolean(term.is_named_node())),
        (Builtin::IsBlank, [term]) => Ok(boolean(term.is_blank_node())),
        (Builtin::IsLiteral, [term]) => Ok(boolean(term.is_literal())),
        (Builtin::IsNumeric, [term]) => Ok(boolean(Numeric::from_term(term).is_some())),
        (Builtin::Contains, [haystack, needle]) => Ok(boolean(
            string_literal(haystack)?
                .value()
                .contains(string_literal(needle)?.value()),
        )),
        (Builtin::StrStarts, [haystack, needle]) => Ok(boolean(
            string_literal(haystack)?
                .value()
                .starts_with(string_literal(needle)?.value()),
        )),
        (Builtin::StrEnds, [haystack, needle]) => Ok(boolean(
            string_literal(haystack)?
                .value()
                .ends_with(string_literal(needle)?.value()),
        )),
        (Builtin::StrLen, [term]) => {
            let length = string_literal(term)?.value().chars().count();
            Ok(Literal::from(i64::try_from(length).unwrap_or(i64::MAX)).into())
        }
        (Builtin::UCase, [term]) => {
            let literal = string_literal(term)?;
            Ok(with_value(literal, literal.value().to_uppercase()).into())
        }
        (Builtin::LCase, [term]) => {
            let literal = string_literal(term)?;
            Ok(with_value(literal, literal.value().to_lowercase()).into())
        }
        (builtin, args) => type_error(format!(
            "{builtin:?} called with {} arguments",
            args.len()
        )),
    }
}

fn boolean(value: bool) -> Term {
    Literal::from(value).into()
}

/// Returns the literal if it is a simple, `xsd:string` or language-tagged literal.
fn string_literal(term: &Term) -> Result<&Literal, EvaluationError> {
    match term {
        Term::Literal(literal)
            if literal.datatype() == xsd::STRING || literal.language().is_some() =>
        {
            Ok(literal)
        }
        _ => type_error(format!("{term} is not a string")),
    }
}

/// Builds a literal with the language or datatype of `original`.
fn with_value(original: &Literal, value: String) -> Literal {
    match original.language() {
        Some(language) => Literal::new_language_tagged_literal_unchecked(value, language),
        None => Literal::new_simple_literal(value),
    }
}

fn language_matches(tag: &str, range: &str) -> bool {
    if range == "*" {
        return !tag.is_empty();
    }
    let tag = tag.to_ascii_lowercase();
    let range = range.to_ascii_lowercase();
    tag == range
        || tag
            .strip_prefix(&range)
            .is_some_and(|rest| rest.starts_with('-'))
}

/// Value equality for numbers, term equality for everything else.
fn equals(left: &Term, right: &Term) -> bool {
    match (Numeric::from_term(left), Numeric::from_term(right)) {
        (Some(left), Some(right)) => left.compare(right) == Some(Ordering::Equal),
        _ => left == right,
    }
}

/// Compares two terms for `<` and friends.
///
/// Numbers are compared by value, other literals of the same datatype and language by their
/// lexical form. `None` is returned for incomparable numbers such as `NaN`.
fn compare(left: &Term, right: &Term) -> Result<Option<Ordering>, EvaluationError> {
    if let (Some(left), Some(right)) = (Numeric::from_term(left), Numeric::from_term(right)) {
        return Ok(left.compare(right));
    }
    match (left, right) {
        (Term::Literal(left), Term::Literal(right))
            if left.datatype() == right.datatype() && left.language() == right.language() =>
        {
            Ok(Some(left.value().cmp(right.value())))
        }
        _ => type_error(format!("Cannot compare {left} and {right}")),
    }
}

fn effective_boolean_value(term: &Term) -> Result<bool, EvaluationError> {
    let Term::Literal(literal) = term else {
        return type_error(format!("{term} has no boolean value"));
    };
    let datatype = literal.datatype();
    if datatype == xsd::BOOLEAN {
        return Ok(matches!(literal.value(), "true" | "1"));
    }
    if datatype == xsd::STRING {
        return Ok(!literal.value().is_empty());
    }
    if is_numeric_datatype(datatype.as_str()) {
        return Ok(Numeric::from_term(term).is_some_and(Numeric::is_truthy));
    }
    type_error(format!("{term} has no boolean value"))
}

/// Returns the value of a numeric literal.
pub(crate) fn numeric_value(term: &Term) -> Option<f64> {
    Numeric::from_term(term).map(Numeric::to_f64)
}

fn numeric_argument(term: &Term) -> Result<Numeric, EvaluationError> {
    Numeric::from_term(term).map_or_else(|| type_error(format!("{term} is not a number")), Ok)
}

const INTEGER_DATATYPES: [&str; 13] = [
    "http://www.w3.org/2001/XMLSchema#integer",
    "http://www.w3.org/2001/XMLSchema#int",
    "http://www.w3.org/2001/XMLSchema#long",
    "http://www.w3.org/2001/XMLSchema#short",
    "http://www.w3.org/2001/XMLSchema#byte",
    "http://www.w3.org/2001/XMLSchema#nonNegativeInteger",
    "http://www.w3.org/2001/XMLSchema#nonPositiveInteger",
    "http://www.w3.org/2001/XMLSchema#positiveInteger",
    "http://www.w3.org/2001/XMLSchema#negativeInteger",
    "http://www.w3.org/2001/XMLSchema#unsignedLong",
    "http://www.w3.org/2001/XMLSchema#unsignedInt",
    "http://www.w3.org/2001/XMLSchema#unsignedShort",
    "http://www.w3.org/2001/XMLSchema#unsignedByte",
];

fn is_numeric_datatype(datatype: &str) -> bool {
    INTEGER_DATATYPES.contains(&datatype)
        || datatype == xsd::DECIMAL.as_str()
        || datatype == xsd::DOUBLE.as_str()
        || datatype == xsd::FLOAT.as_str()
}

/// A number in one of the three numeric type families of SPARQL.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Numeric {
    Integer(i64),
    Decimal(f64),
    Double(f64),
}

impl Numeric {
    /// Reads a numeric literal. Ill-typed literals are not numbers.
    fn from_term(term: &Term) -> Option<Self> {
        let Term::Literal(literal) = term else {
            return None;
        };
        let datatype = literal.datatype().as_str();
        let value = literal.value().trim();
        if INTEGER_DATATYPES.contains(&datatype) {
            value.parse().ok().map(Numeric::Integer)
        } else if datatype == xsd::DECIMAL.as_str() {
            value.parse().ok().map(Numeric::Decimal)
        } else if datatype == xsd::DOUBLE.as_str() || datatype == xsd::FLOAT.as_str() {
            value.parse().ok().map(Numeric::Double)
        } else {
            None
        }
    }

    #[allow(
        clippy::cast_precision_loss,
        reason = "Mixed arithmetic promotes integers to floating point"
    )]
    fn to_f64(self) -> f64 {
        match self {
            Numeric::Integer(value) => value as f64,
            Numeric::Decimal(value) | Numeric::Double(value) => value,
        }
    }

    fn is_truthy(self) -> bool {
        match self {
            Numeric::Integer(value) => value != 0,
            Numeric::Decimal(value) | Numeric::Double(value) => !value.is_nan() && value != 0.0,
        }
    }

    fn compare(self, other: Self) -> Option<Ordering> {
        match (self, other) {
            (Numeric::Integer(left), Numeric::Integer(right)) => Some(left.cmp(&right)),
            (left, right) => left.to_f64().partial_cmp(&right.to_f64()),
        }
    }

    fn negate(self) -> Result<Self, EvaluationError> {
        match self {
            Numeric::Integer(value) => value
                .checked_neg()
                .map(Numeric::Integer)
                .map_or_else(|| type_error("Integer overflow"), Ok),
            Numeric::Decimal(value) => Ok(Numeric::Decimal(-value)),
            Numeric::Double(value) => Ok(Numeric::Double(-value)),
        }
    }

    /// Applies an arithmetic operation with the usual type promotion.
    ///
    /// Dividing two integers yields a decimal.
    fn apply(self, operation: Operation, other: Self) -> Result<Self, EvaluationError> {
        if let (Numeric::Integer(left), Numeric::Integer(right)) = (self, other) {
            let result = match operation {
                Operation::Add => left.checked_add(right),
                Operation::Subtract => left.checked_sub(right),
                Operation::Multiply => left.checked_mul(right),
                Operation::Divide => {
                    return Numeric::Decimal(self.to_f64()).apply(operation, other);
                }
            };
            return result.map_or_else(|| type_error("Integer overflow"), |v| Ok(Numeric::Integer(v)));
        }

        let (left, right) = (self.to_f64(), other.to_f64());
        let double = matches!(self, Numeric::Double(_)) || matches!(other, Numeric::Double(_));
        let value = match operation {
            Operation::Add => left + right,
            Operation::Subtract => left - right,
            Operation::Multiply => left * right,
            Operation::Divide if !double && right == 0.0 => {
                return type_error("Division by zero");
            }
            Operation::Divide => left / right,
        };
        Ok(if double {
            Numeric::Double(value)
        } else {
            Numeric::Decimal(value)
        })
    }

    fn into_term(self) -> Term {
        match self {
            Numeric::Integer(value) => Literal::from(value).into(),
            Numeric::Decimal(value) => {
                let lexical = if value.fract() == 0.0 && value.is_finite() {
                    format!("{value:.1}")
                } else {
                    value.to_string()
                };
                Literal::new_typed_literal(lexical, xsd::DECIMAL).into()
            }
            Numeric::Double(value) => Literal::from(value).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldf_model::query::{Group, Query};
    use ldf_model::NamedNode;
    use std::collections::BTreeMap;

    /// Parses the expression of `FILTER(...)`.
    fn expression(text: &str) -> Expression {
        let query = Query::parse(
            &format!("SELECT * WHERE {{ ?s ?p ?o FILTER({text}) }}"),
            &BTreeMap::new(),
        )
        .unwrap();
        match query.groups.last() {
            Some(Group::Filter(expression)) => expression.clone(),
            groups => panic!("unexpected groups {groups:?}"),
        }
    }

    fn evaluator(text: &str) -> ExpressionEvaluator {
        ExpressionEvaluator::try_new(&expression(text)).unwrap()
    }

    fn bindings(entries: &[(&str, Term)]) -> Bindings {
        entries
            .iter()
            .map(|(name, value)| (Variable::new_unchecked(*name), value.clone()))
            .collect()
    }

    fn number(value: i64) -> Term {
        Literal::from(value).into()
    }

    #[test]
    fn numbers_compare_by_value() {
        let solution = bindings(&[("o", number(42))]);

        assert!(evaluator("?o > 3").evaluate_ebv(&solution).unwrap());
        assert!(evaluator("?o = 42.0").evaluate_ebv(&solution).unwrap());
        assert!(!evaluator("?o <= 41.5").evaluate_ebv(&solution).unwrap());
    }

    #[test]
    fn integer_division_yields_a_decimal() {
        let result = evaluator("7 / 2").evaluate(&Bindings::new()).unwrap();

        assert_eq!(result, Literal::new_typed_literal("3.5", xsd::DECIMAL).into());
        assert_eq!(
            evaluator("4 / 2").evaluate(&Bindings::new()).unwrap(),
            Literal::new_typed_literal("2.0", xsd::DECIMAL).into()
        );
        assert!(evaluator("1 / 0").evaluate(&Bindings::new()).is_err());
    }

    #[test]
    fn unbound_variables_are_errors() {
        assert_eq!(
            evaluator("?missing = 1").evaluate(&Bindings::new()),
            Err(EvaluationError::UnboundVariable(Variable::new_unchecked(
                "missing"
            )))
        );
        assert!(!evaluator("BOUND(?missing)")
            .evaluate_ebv(&Bindings::new())
            .unwrap());
    }

    #[test]
    fn disjunction_tolerates_one_error() {
        let solution = bindings(&[("o", number(1))]);

        assert!(evaluator("?missing > 3 || ?o = 1")
            .evaluate_ebv(&solution)
            .unwrap());
        assert!(evaluator("?missing > 3 && ?o = 1")
            .evaluate_ebv(&solution)
            .is_err());
        assert!(!evaluator("?missing > 3 && ?o = 2")
            .evaluate_ebv(&solution)
            .unwrap());
    }

    #[test]
    fn string_functions() {
        let solution = bindings(&[
            ("name", Literal::new_language_tagged_literal_unchecked("Gent", "nl").into()),
            ("city", NamedNode::new_unchecked("http://example.org/Gent").into()),
        ]);

        assert!(evaluator(r#"CONTAINS(STR(?city), "example")"#)
            .evaluate_ebv(&solution)
            .unwrap());
        assert!(evaluator(r#"LANGMATCHES(LANG(?name), "NL")"#)
            .evaluate_ebv(&solution)
            .unwrap());
        assert!(evaluator(r#"STRSTARTS(UCASE(?name), "GE") && STRLEN(?name) = 4"#)
            .evaluate_ebv(&solution)
            .unwrap());
        assert!(evaluator("isIRI(?city) && !isLiteral(?city)")
            .evaluate_ebv(&solution)
            .unwrap());
    }

    #[test]
    fn regular_expressions() {
        let solution = bindings(&[("name", Literal::new_simple_literal("Antwerpen").into())]);

        assert!(evaluator(r#"REGEX(?name, "^ant", "i")"#)
            .evaluate_ebv(&solution)
            .unwrap());
        assert!(!evaluator(r#"REGEX(?name, "^ant")"#)
            .evaluate_ebv(&solution)
            .unwrap());
        assert!(matches!(
            ExpressionEvaluator::try_new(&expression(r#"REGEX(?name, "(")"#)),
            Err(QueryError::InvalidRegex(_))
        ));
    }

    #[test]
    fn membership() {
        let solution = bindings(&[("o", number(2))]);

        assert!(evaluator("?o IN (1, 2, 3)").evaluate_ebv(&solution).unwrap());
        assert!(evaluator("?o NOT IN (1, 3)").evaluate_ebv(&solution).unwrap());
    }

    #[test]
    fn unsupported_functions_are_rejected() {
        assert!(matches!(
            ExpressionEvaluator::try_new(&expression("YEAR(?o) = 2020")),
            Err(QueryError::Unsupported(_))
        ));
        assert!(matches!(
            ExpressionEvaluator::try_new(&expression("EXISTS { ?s ?p ?o }")),
            Err(QueryError::Unsupported(_))
        ));
    }

    #[test]
    fn effective_boolean_values() {
        assert!(evaluator(r#""text""#).evaluate_ebv(&Bindings::new()).unwrap());
        assert!(!evaluator(r#""""#).evaluate_ebv(&Bindings::new()).unwrap());
        assert!(!evaluator("0").evaluate_ebv(&Bindings::new()).unwrap());
        assert!(evaluator("<http://example.org/a>")
            .evaluate_ebv(&Bindings::new())
            .is_err());
    }
}
