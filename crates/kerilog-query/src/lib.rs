//! Filter expression language over decoded key events
//!
//! A small, bounded query grammar: dotted field paths over the closed
//! [`kerilog_core::KeyEvent`] schema, comparisons and containment against
//! literals, and boolean composition with capped parenthesis nesting.
//! A filter is parsed once into an immutable [`FilterExpression`] and
//! evaluated lazily over the event sequence; the "filter by type" shortcut
//! compiles to the same one-clause tree, so both query surfaces share one
//! evaluator.

pub mod error;
pub mod expr;
pub mod parser;

pub use error::FilterError;
pub use expr::{CmpOp, Expr, Field, FilterExpression, Literal};
pub use parser::{parse, MAX_NESTING};

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn kind_shortcut_is_a_one_clause_expression() {
        let shortcut = FilterExpression::kind_shortcut("rot");
        let parsed = parse("kind == \"rot\"").unwrap();
        assert_eq!(shortcut.expr(), parsed.expr());
    }

    #[test]
    fn unknown_field_fails_at_parse_time() {
        let err = parse("frobnicate == 1").unwrap_err();
        assert_matches!(err, FilterError::InvalidFilterSyntax { position: 0, .. });
    }

    #[test]
    fn error_position_points_at_the_offending_token() {
        let err = parse("sn == \"two\"").unwrap_err();
        assert_eq!(err.position(), 6);
    }

    #[test]
    fn nesting_depth_is_bounded() {
        let mut filter = String::new();
        for _ in 0..(MAX_NESTING + 1) {
            filter.push('(');
        }
        filter.push_str("sn == 1");
        for _ in 0..(MAX_NESTING + 1) {
            filter.push(')');
        }
        let err = parse(&filter).unwrap_err();
        assert_matches!(err, FilterError::InvalidFilterSyntax { .. });

        // one level below the cap parses fine
        let mut filter = String::new();
        for _ in 0..MAX_NESTING {
            filter.push('(');
        }
        filter.push_str("sn == 1");
        for _ in 0..MAX_NESTING {
            filter.push(')');
        }
        assert!(parse(&filter).is_ok());
    }

    #[test]
    fn list_fields_reject_equality() {
        assert_matches!(parse("keys == \"D\""), Err(FilterError::InvalidFilterSyntax { .. }));
        assert!(parse("keys contains \"D\"").is_ok());
    }

    #[test]
    fn boolean_composition_parses() {
        let parsed = parse("kind == \"rot\" and (sn >= 2 or not identifier contains \"E\")");
        assert!(parsed.is_ok());
    }
}
