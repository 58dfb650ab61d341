//! Read-only policy and row limiting for `execute_query`.
//!
//! Two steps run before a user statement reaches the database:
//!
//! 1. [`validate_readonly`] rejects any text containing a data-modifying or
//!    DDL keyword anywhere, even inside a longer word or a string literal.
//!    `RECREATE TABLE` is caught this way, at the price of also rejecting
//!    names such as `CREATED_AT`.
//! 2. [`apply_row_limit`] rewrites a leading `SELECT` into Firebird's
//!    `SELECT FIRST n` form. Leading whitespace and comments are skipped with
//!    the [sqlparser](https://docs.rs/sqlparser/) tokenizer. Statements that
//!    cannot be rewritten are left alone and truncated after execution.

use crate::error::{DbError, DbResult};
use sqlparser::dialect::GenericDialect;
use sqlparser::tokenizer::{Location, Token, TokenWithSpan, Tokenizer};

/// Keywords that make a statement ineligible for `execute_query`.
pub const FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "CREATE", "ALTER", "DROP", "TRUNCATE",
];

pub const DEFAULT_ROW_LIMIT: i64 = 10;
pub const MAX_ROW_LIMIT: i64 = 10_000;

/// Clamp a requested row limit into `1..=MAX_ROW_LIMIT`.
pub fn clamp_limit(limit: i64) -> u32 {
    // MAX_ROW_LIMIT fits in u32
    limit.clamp(1, MAX_ROW_LIMIT) as u32
}

/// Reject statements whose upper-cased text contains a forbidden keyword.
pub fn validate_readonly(sql: &str) -> DbResult<()> {
    if sql.trim().is_empty() {
        return Err(DbError::invalid_input("Empty SQL statement"));
    }

    let upper = sql.to_uppercase();
    match FORBIDDEN_KEYWORDS.iter().find(|k| upper.contains(*k)) {
        Some(keyword) => Err(DbError::policy_violation(*keyword)),
        None => Ok(()),
    }
}

/// Outcome of [`apply_row_limit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimitedSql {
    /// The statement now carries `FIRST n` itself.
    Rewritten(String),
    /// Left as is; the caller truncates the rows.
    Unchanged(String),
}

impl LimitedSql {
    pub fn sql(&self) -> &str {
        match self {
            Self::Rewritten(sql) | Self::Unchanged(sql) => sql,
        }
    }

    pub fn is_rewritten(&self) -> bool {
        matches!(self, Self::Rewritten(_))
    }
}

/// Inject `FIRST limit` after a leading `SELECT`.
///
/// Statements that already start with `SELECT FIRST` or `SELECT SKIP`, that
/// start with anything other than `SELECT` (e.g. `WITH`), or that the
/// tokenizer cannot read are returned unchanged.
pub fn apply_row_limit(sql: &str, limit: u32) -> LimitedSql {
    let Some(offset) = leading_select_offset(sql) else {
        return LimitedSql::Unchanged(sql.to_string());
    };

    let keyword_end = offset + "SELECT".len();
    LimitedSql::Rewritten(format!(
        "{}SELECT FIRST {}{}",
        &sql[..offset],
        limit,
        &sql[keyword_end..]
    ))
}

/// Byte offset of the first token when it is a `SELECT` not followed by
/// `FIRST` or `SKIP`.
fn leading_select_offset(sql: &str) -> Option<usize> {
    let dialect = GenericDialect {};
    let tokens = Tokenizer::new(&dialect, sql).tokenize_with_location().ok()?;

    let mut significant = tokens
        .iter()
        .filter(|t| !matches!(t.token, Token::Whitespace(_)));

    let first = significant.next()?;
    if !is_bare_word(first, "SELECT") {
        return None;
    }
    if significant
        .next()
        .is_some_and(|next| is_bare_word(next, "FIRST") || is_bare_word(next, "SKIP"))
    {
        return None;
    }

    let offset = byte_offset(sql, first.span.start)?;
    sql.get(offset..offset + "SELECT".len())
        .filter(|word| word.eq_ignore_ascii_case("SELECT"))
        .map(|_| offset)
}

fn is_bare_word(token: &TokenWithSpan, word: &str) -> bool {
    match &token.token {
        Token::Word(w) => w.quote_style.is_none() && w.value.eq_ignore_ascii_case(word),
        _ => false,
    }
}

/// Convert a tokenizer location (1-based line and character column) into a
/// byte offset.
fn byte_offset(sql: &str, location: Location) -> Option<usize> {
    let line = usize::try_from(location.line).ok()?.checked_sub(1)?;
    let column = usize::try_from(location.column).ok()?.checked_sub(1)?;

    let line_start = if line == 0 {
        0
    } else {
        sql.match_indices('\n').nth(line - 1)?.0 + 1
    };
    let rest = &sql[line_start..];
    let column_offset = rest
        .char_indices()
        .nth(column)
        .map(|(i, _)| i)
        .unwrap_or(rest.len());
    Some(line_start + column_offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewritten(sql: &str, limit: u32) -> String {
        match apply_row_limit(sql, limit) {
            LimitedSql::Rewritten(sql) => sql,
            LimitedSql::Unchanged(sql) => panic!("expected a rewrite of {:?}", sql),
        }
    }

    #[test]
    fn test_select_is_allowed() {
        assert!(validate_readonly("SELECT * FROM CUSTOMER").is_ok());
        assert!(validate_readonly("select rdb$relation_name from rdb$relations").is_ok());
    }

    #[test]
    fn test_forbidden_keywords_are_rejected() {
        for sql in [
            "INSERT INTO T VALUES (1)",
            "update t set a = 1",
            "DELETE FROM T",
            "CREATE TABLE T (ID INTEGER)",
            "ALTER TABLE T ADD B INTEGER",
            "drop table t",
            "TRUNCATE TABLE T",
        ] {
            let err = validate_readonly(sql).unwrap_err();
            assert!(
                matches!(err, DbError::PolicyViolation { .. }),
                "{} was not rejected",
                sql
            );
        }
    }

    #[test]
    fn test_keyword_anywhere_is_rejected() {
        let err = validate_readonly("SELECT 1 FROM RDB$DATABASE; DROP TABLE T").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Only read queries (SELECT) are allowed: found DROP"
        );
        assert!(validate_readonly("SELECT 'please delete me' FROM RDB$DATABASE").is_err());
    }

    #[test]
    fn test_recreate_is_rejected() {
        let err = validate_readonly("RECREATE TABLE CUSTOMER (ID INTEGER)").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Only read queries (SELECT) are allowed: found CREATE"
        );
        assert!(validate_readonly("create or alter view v as select 1 from rdb$database").is_err());
    }

    #[test]
    fn test_keyword_inside_identifier_is_rejected() {
        for sql in [
            "SELECT CREATED_AT FROM ORDERS",
            "SELECT RDB$UPDATE_FLAG FROM RDB$RELATIONS",
            "SELECT DROPPED FROM T",
        ] {
            assert!(
                matches!(validate_readonly(sql), Err(DbError::PolicyViolation { .. })),
                "{} was not rejected",
                sql
            );
        }
    }

    #[test]
    fn test_empty_statement_is_invalid() {
        assert!(matches!(
            validate_readonly("   ").unwrap_err(),
            DbError::InvalidInput { .. }
        ));
    }

    #[test]
    fn test_select_gets_first_clause() {
        assert_eq!(
            rewritten("SELECT * FROM T", 5),
            "SELECT FIRST 5 * FROM T"
        );
    }

    #[test]
    fn test_rewrite_keeps_original_text_after_keyword() {
        assert_eq!(
            rewritten("select name from Customer where city = 'Zürich'", 3),
            "SELECT FIRST 3 name from Customer where city = 'Zürich'"
        );
    }

    #[test]
    fn test_rewrite_skips_leading_whitespace_and_comments() {
        assert_eq!(
            rewritten("  -- newest first\n  /* all */ SELECT ID FROM T", 10),
            "  -- newest first\n  /* all */ SELECT FIRST 10 ID FROM T"
        );
    }

    #[test]
    fn test_existing_first_or_skip_is_left_alone() {
        let sql = "SELECT FIRST 2 * FROM T";
        assert_eq!(apply_row_limit(sql, 5), LimitedSql::Unchanged(sql.to_string()));
        let sql = "select skip 10 * from t";
        assert!(!apply_row_limit(sql, 5).is_rewritten());
    }

    #[test]
    fn test_non_select_is_left_alone() {
        let sql = "WITH X AS (SELECT 1 AS A FROM RDB$DATABASE) SELECT * FROM X";
        let limited = apply_row_limit(sql, 5);
        assert!(!limited.is_rewritten());
        assert_eq!(limited.sql(), sql);
    }

    #[test]
    fn test_limit_is_clamped() {
        assert_eq!(clamp_limit(0), 1);
        assert_eq!(clamp_limit(-3), 1);
        assert_eq!(clamp_limit(25), 25);
        assert_eq!(clamp_limit(1_000_000), 10_000);
    }
}
