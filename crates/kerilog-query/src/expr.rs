//! Typed filter expression tree and its evaluator
//!
//! The schema is closed: field paths resolve to this fixed set at parse
//! time, so an unknown path is a syntax error rather than a silent
//! always-false clause at evaluation time. Evaluation is pure; it never
//! touches the underlying log.

use std::fmt;

use kerilog_core::{Diagnostic, EventKind, KeyEvent, Threshold};

/// A resolvable field path over the event schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Event kind (`kind`, `type`, `t`)
    Kind,
    /// Sequence number (`sn`, `sequence`, `s`)
    Sn,
    /// Identifier prefix (`identifier`, `aid`, `i`)
    Identifier,
    /// Own digest (`digest`, `said`, `d`)
    Digest,
    /// Prior digest (`prior`, `p`)
    Prior,
    /// Signing key list (`keys`, `k`)
    Keys,
    /// Signing threshold (`threshold`, `kt`)
    Threshold,
    /// Seal contents (`seals`, `a`)
    Seals,
    /// Sealed digests (`seals.digest`)
    SealDigest,
    /// Sealed identifiers (`seals.identifier`)
    SealIdentifier,
    /// Attached diagnostics (`diags`, `diagnostics`)
    Diags,
}

impl Field {
    /// Resolve a dotted path; `None` for paths outside the schema
    pub fn resolve(path: &str) -> Option<Self> {
        Some(match path {
            "kind" | "type" | "t" => Self::Kind,
            "sn" | "sequence" | "s" => Self::Sn,
            "identifier" | "aid" | "i" => Self::Identifier,
            "digest" | "said" | "d" => Self::Digest,
            "prior" | "p" => Self::Prior,
            "keys" | "k" => Self::Keys,
            "threshold" | "kt" => Self::Threshold,
            "seals" | "a" => Self::Seals,
            "seals.digest" | "seals.d" => Self::SealDigest,
            "seals.identifier" | "seals.i" => Self::SealIdentifier,
            "diags" | "diagnostics" => Self::Diags,
            _ => return None,
        })
    }

    /// True for the one numeric field
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Sn)
    }

    /// True for list-shaped fields, which support containment only
    pub fn is_list(&self) -> bool {
        matches!(
            self,
            Self::Keys | Self::Seals | Self::SealDigest | Self::SealIdentifier | Self::Diags
        )
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Kind => "kind",
            Self::Sn => "sn",
            Self::Identifier => "identifier",
            Self::Digest => "digest",
            Self::Prior => "prior",
            Self::Keys => "keys",
            Self::Threshold => "threshold",
            Self::Seals => "seals",
            Self::SealDigest => "seals.digest",
            Self::SealIdentifier => "seals.identifier",
            Self::Diags => "diags",
        };
        write!(f, "{name}")
    }
}

/// A comparison literal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    /// A quoted string
    Str(String),
    /// An unsigned integer
    Int(u64),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Int(n) => write!(f, "{n}"),
        }
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl CmpOp {
    fn holds(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::{Equal, Greater, Less};
        matches!(
            (self, ordering),
            (Self::Eq, Equal)
                | (Self::Ne, Less | Greater)
                | (Self::Lt, Less)
                | (Self::Le, Less | Equal)
                | (Self::Gt, Greater)
                | (Self::Ge, Greater | Equal)
        )
    }
}

/// One node of a parsed filter expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// `field op literal`
    Cmp {
        /// The compared field
        field: Field,
        /// The operator
        op: CmpOp,
        /// The literal to compare against
        literal: Literal,
    },
    /// `field contains literal`
    Contains {
        /// The searched field
        field: Field,
        /// The needle
        needle: String,
    },
    /// Both sides must hold
    And(Box<Expr>, Box<Expr>),
    /// Either side must hold
    Or(Box<Expr>, Box<Expr>),
    /// The inner expression must not hold
    Not(Box<Expr>),
}

/// A parsed, immutable filter: built once per query string, evaluated over
/// the whole event sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterExpression {
    expr: Expr,
    source: String,
}

impl FilterExpression {
    pub(crate) fn new(expr: Expr, source: String) -> Self {
        Self { expr, source }
    }

    /// The degenerate one-clause form behind the "filter by type" shortcut:
    /// `kind == <value>`
    pub fn kind_shortcut(value: &str) -> Self {
        Self {
            expr: Expr::Cmp {
                field: Field::Kind,
                op: CmpOp::Eq,
                literal: Literal::Str(value.to_string()),
            },
            source: format!("kind == {value:?}"),
        }
    }

    /// The query text this expression was parsed from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The root node
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Evaluate against one event and its diagnostics
    pub fn matches(&self, event: &KeyEvent, diagnostics: &[Diagnostic]) -> bool {
        eval(&self.expr, event, diagnostics)
    }
}

fn eval(expr: &Expr, event: &KeyEvent, diagnostics: &[Diagnostic]) -> bool {
    match expr {
        Expr::And(left, right) => {
            eval(left, event, diagnostics) && eval(right, event, diagnostics)
        }
        Expr::Or(left, right) => {
            eval(left, event, diagnostics) || eval(right, event, diagnostics)
        }
        Expr::Not(inner) => !eval(inner, event, diagnostics),
        Expr::Cmp { field, op, literal } => eval_cmp(*field, *op, literal, event),
        Expr::Contains { field, needle } => eval_contains(*field, needle, event, diagnostics),
    }
}

/// The query-facing name of an event kind; the wire code also matches
fn kind_matches(kind: EventKind, value: &str) -> bool {
    value == kind.code() || value.eq_ignore_ascii_case(&kind.label().replace(' ', "_"))
}

fn eval_cmp(field: Field, op: CmpOp, literal: &Literal, event: &KeyEvent) -> bool {
    match (field, literal) {
        (Field::Kind, Literal::Str(value)) => {
            let is_kind = kind_matches(event.kind, value);
            match op {
                CmpOp::Eq => is_kind,
                CmpOp::Ne => !is_kind,
                _ => false,
            }
        }
        (Field::Sn, Literal::Int(value)) => op.holds(event.sn.cmp(value)),
        (Field::Identifier, Literal::Str(value)) => {
            op.holds(event.identifier_str().cmp(value.as_str()))
        }
        (Field::Digest, Literal::Str(value)) => {
            op.holds(event.digest.as_str().cmp(value.as_str()))
        }
        (Field::Prior, Literal::Str(value)) => {
            let prior = event.prior.as_ref().map(|p| p.as_str()).unwrap_or("");
            op.holds(prior.cmp(value.as_str()))
        }
        (Field::Threshold, Literal::Int(value)) => {
            let is_count = matches!(&event.threshold, Some(Threshold::Count(n)) if n == value);
            match op {
                CmpOp::Eq => is_count,
                CmpOp::Ne => !is_count,
                _ => false,
            }
        }
        (Field::Threshold, Literal::Str(value)) => {
            let text = event
                .threshold
                .as_ref()
                .map(Threshold::to_string)
                .unwrap_or_default();
            match op {
                CmpOp::Eq => text == *value,
                CmpOp::Ne => text != *value,
                _ => false,
            }
        }
        // the parser rejects the remaining combinations
        _ => false,
    }
}

fn eval_contains(field: Field, needle: &str, event: &KeyEvent, diagnostics: &[Diagnostic]) -> bool {
    match field {
        Field::Identifier => event.identifier_str().contains(needle),
        Field::Digest => event.digest.as_str().contains(needle),
        Field::Prior => event
            .prior
            .as_ref()
            .is_some_and(|p| p.as_str().contains(needle)),
        Field::Keys => event.keys.iter().any(|k| k.as_str().contains(needle)),
        Field::Seals => event
            .seals
            .iter()
            .any(|seal| seal.0.to_string().contains(needle)),
        Field::SealDigest => event
            .seals
            .iter()
            .any(|seal| seal.digest().is_some_and(|d| d.contains(needle))),
        Field::SealIdentifier => event
            .seals
            .iter()
            .any(|seal| seal.identifier().is_some_and(|i| i.contains(needle))),
        Field::Diags => diagnostics
            .iter()
            .any(|d| d.code.to_string().contains(needle) || d.message.contains(needle)),
        // the parser rejects the remaining combinations
        Field::Kind | Field::Sn | Field::Threshold => false,
    }
}
