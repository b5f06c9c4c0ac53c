use std::fmt::{Display, Formatter};
use std::sync::OnceLock;

use regex::Regex;
use sqlparser::ast::{Query, SetExpr, Statement};
use sqlparser::dialect::GenericDialect;
use sqlparser::keywords::Keyword;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer};

pub const DESTRUCTIVE_KEYWORDS: &[&str] = &["DROP", "DELETE", "TRUNCATE"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOnlyViolation {
    Empty,
    MultiStatement { statements: usize },
    Unparseable { message: String },
    NotReadOnly { leading_keyword: String },
}

impl SelectOnlyViolation {
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Empty => "empty_statement",
            Self::MultiStatement { .. } => "multi_statement",
            Self::Unparseable { .. } => "parse_error",
            Self::NotReadOnly { .. } => "unsupported_statement",
        }
    }
}

impl Display for SelectOnlyViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => f.write_str("SQL query is empty; provide a single SELECT statement"),
            Self::MultiStatement { statements } => write!(
                f,
                "multi-statement SQL is not allowed ({statements} statements); submit exactly one SELECT"
            ),
            Self::Unparseable { message } => write!(f, "SQL query does not parse: {message}"),
            Self::NotReadOnly { leading_keyword } => write!(
                f,
                "only SELECT statements are allowed (found `{leading_keyword}`)"
            ),
        }
    }
}

impl std::error::Error for SelectOnlyViolation {}

/// Single read-only statement check used to gate player queries.
#[must_use]
pub fn is_select_only(text: &str) -> bool {
    check_select_only(text).is_ok()
}

pub fn check_select_only(text: &str) -> Result<(), SelectOnlyViolation> {
    if text.trim().is_empty() {
        return Err(SelectOnlyViolation::Empty);
    }

    let statements = parse_statements(text)
        .map_err(|message| SelectOnlyViolation::Unparseable { message })?;
    let statement = match statements.as_slice() {
        [] => return Err(SelectOnlyViolation::Empty),
        [statement] => statement,
        many => {
            return Err(SelectOnlyViolation::MultiStatement {
                statements: many.len(),
            });
        }
    };

    let leading = leading_keyword(text);
    let leads_with_query_keyword = matches!(leading, Some((Keyword::SELECT | Keyword::WITH, _)));
    let read_only = match statement {
        Statement::Query(query) => query_is_read_only(query),
        _ => false,
    };

    if leads_with_query_keyword && read_only {
        Ok(())
    } else {
        Err(SelectOnlyViolation::NotReadOnly {
            leading_keyword: leading
                .map(|(_, word)| word.to_ascii_uppercase())
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }
}

/// Looser check for generated statements: any single statement kind is accepted.
#[must_use]
pub fn is_syntactically_valid(text: &str) -> bool {
    check_syntax(text).is_ok()
}

pub fn check_syntax(text: &str) -> Result<(), String> {
    match parse_statements(text)?.len() {
        1 => Ok(()),
        0 => Err("statement is empty".to_string()),
        count => Err(format!("expected exactly one statement, found {count}")),
    }
}

#[must_use]
pub fn is_non_destructive(text: &str) -> bool {
    first_destructive_keyword(text).is_none()
}

/// Case-insensitive whole-word scan against [`DESTRUCTIVE_KEYWORDS`].
#[must_use]
pub fn first_destructive_keyword(text: &str) -> Option<&'static str> {
    let found = destructive_keyword_regex().find(text)?;
    DESTRUCTIVE_KEYWORDS
        .iter()
        .copied()
        .find(|keyword| keyword.eq_ignore_ascii_case(found.as_str()))
}

fn destructive_keyword_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?i)\b(?:drop|delete|truncate)\b")
            .expect("destructive keyword regex should compile")
    })
}

fn parse_statements(text: &str) -> Result<Vec<Statement>, String> {
    Parser::parse_sql(&GenericDialect {}, text).map_err(|error| error.to_string())
}

fn leading_keyword(text: &str) -> Option<(Keyword, String)> {
    let tokens = Tokenizer::new(&GenericDialect {}, text).tokenize().ok()?;
    tokens.into_iter().find_map(|token| match token {
        Token::Word(word) => Some(Some((word.keyword, word.value))),
        Token::Whitespace(_) | Token::LParen => None,
        _ => Some(None),
    })?
}

fn query_is_read_only(query: &Query) -> bool {
    let ctes_read_only = query
        .with
        .as_ref()
        .is_none_or(|with| with.cte_tables.iter().all(|cte| query_is_read_only(&cte.query)));

    ctes_read_only && set_expr_is_read_only(&query.body)
}

fn set_expr_is_read_only(body: &SetExpr) -> bool {
    match body {
        SetExpr::Select(_) => true,
        SetExpr::Query(query) => query_is_read_only(query),
        SetExpr::SetOperation { left, right, .. } => {
            set_expr_is_read_only(left) && set_expr_is_read_only(right)
        }
        _ => false,
    }
}
