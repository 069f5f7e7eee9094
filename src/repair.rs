//! Repair of model output into executable, catalog-qualified SQL.
//!
//! Models wrap their answer in prose, labels, and code fences, and tend to
//! write bare table names even when told otherwise. Repair runs these steps in
//! order:
//!
//! 1. Strip a leading `SQL Query:` label
//! 2. Strip code-fence markers
//! 3. Cut everything before the first `SELECT` or `WITH` token; text without
//!    either token passes through unchanged
//! 4. Qualify table references with their catalog
//!
//! Qualification works on a token stream, so string literals, quoted
//! identifiers, and comments are never rewritten, and a second pass over an
//! already repaired query changes nothing.
//!
//! # Example
//!
//! ```
//! use ipl_sql::{config::DatabaseConfig, repair::SqlRepairer, schema::Schema};
//!
//! let repairer = SqlRepairer::new(Schema::cricket(&DatabaseConfig::default()));
//! let raw = "Sure! Here you go:\n```sql\nSELECT COUNT(*) FROM ipl WHERE ipl.winner = 'CSK'\n```";
//!
//! assert_eq!(
//!     repairer.repair(raw),
//!     "SELECT COUNT(*) FROM ipl_db.ipl WHERE ipl_db.ipl.winner = 'CSK'"
//! );
//! ```

pub mod lexer;

use std::sync::LazyLock;

use indexmap::IndexSet;
use lexer::{Token, TokenKind, tokenize};
use regex::Regex;
use tracing::{debug, warn};

use crate::schema::Schema;

/// `SQL Query:` label some models put ahead of the statement.
static LABEL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bSQL\s*Query\s*:").expect("valid regex"));

/// Opening (```` ```sql ````) and closing (```` ``` ````) fence markers.
static FENCE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)```(?:sql)?").expect("valid regex"));

/// Statement start, case-sensitive and whole-word.
static STATEMENT_START_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:SELECT|WITH)\b").expect("valid regex"));

/// Words that end a table reference instead of naming an alias.
const CLAUSE_KEYWORDS: &[&str] = &[
    "WHERE", "GROUP", "ORDER", "HAVING", "LIMIT", "OFFSET", "JOIN", "INNER", "LEFT", "RIGHT",
    "FULL", "CROSS", "OUTER", "NATURAL", "ON", "USING", "UNION", "INTERSECT", "EXCEPT", "WINDOW",
    "SELECT", "FROM", "WITH", "VALUES", "RETURNING", "QUALIFY", "AS"
];

/// Turns free-form model output into a best-effort SQL statement.
#[derive(Debug, Clone)]
pub struct SqlRepairer {
    schema: Schema
}

impl SqlRepairer {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema
        }
    }

    /// Run every repair step over `raw`.
    ///
    /// The result is not guaranteed to be valid SQL.
    pub fn repair(&self, raw: &str) -> String {
        let text = strip_label(raw.trim());
        let text = strip_fences(text);
        let text = match seek_statement_start(text.trim()) {
            Some(statement) => statement,
            None => {
                warn!("model output has no SELECT or WITH token, passing it through");
                text.trim()
            }
        };
        let repaired = self.qualify(text);
        debug!(sql = %repaired, "repaired model output");
        repaired.trim().to_string()
    }

    /// Rewrite bare references to known tables into `catalog.table` form and
    /// collapse doubled catalog prefixes.
    pub fn qualify(&self, sql: &str) -> String {
        let sig: Vec<Token> = tokenize(sql)
            .into_iter()
            .filter(Token::is_significant)
            .collect();
        let scan = Scan {
            sql,
            sig: &sig
        };
        let refs = scan.table_refs();
        let declared = scan.declarations(&refs);
        let mut edits = Vec::new();

        for table_ref in &refs {
            let &[only] = table_ref.parts.as_slice() else {
                continue;
            };
            let token = sig[only];
            if token.kind != TokenKind::Word {
                continue;
            }
            let word = token.text(sql);
            if declared.shadows(&word.to_ascii_lowercase(), only) {
                continue;
            }
            if let Some(table) = self.schema.table(word) {
                edits.push(Edit::replace(token, format!("{}.{}", table.catalog, word)));
            }
        }

        for i in 0..sig.len() {
            let token = sig[i];
            if token.kind != TokenKind::Word
                || scan.follows_dot(i)
                || !scan.is_symbol_at(i + 1, '.')
            {
                continue;
            }
            let word = token.text(sql);

            if self.schema.is_catalog(word)
                && scan.word_at(i + 2).is_some_and(|next| next.eq_ignore_ascii_case(word))
                && scan.is_symbol_at(i + 3, '.')
            {
                edits.push(Edit::delete(token.start, sig[i + 2].start));
                continue;
            }

            let lowered = word.to_ascii_lowercase();
            if scan.is_table_position(i)
                || declared.aliases.contains(&lowered)
                || declared.shadows(&lowered, i)
                || !scan.qualifies_column(i + 2)
            {
                continue;
            }
            if let Some(table) = self.schema.table(word) {
                edits.push(Edit::replace(token, format!("{}.{}", table.catalog, word)));
            }
        }

        apply_edits(sql, edits)
    }
}

/// Keep only the text after a `SQL Query:` label that precedes the
/// statement. A label after the first `SELECT` or `WITH` is part of the query.
pub fn strip_label(text: &str) -> &str {
    let Some(label) = LABEL_REGEX.find(text) else {
        return text;
    };
    match STATEMENT_START_REGEX.find(text) {
        Some(statement) if statement.start() < label.end() => text,
        _ => text[label.end()..].trim()
    }
}

/// Remove every code-fence marker.
pub fn strip_fences(text: &str) -> String {
    FENCE_REGEX.replace_all(text, "").into_owned()
}

/// Slice starting at the first `SELECT` or `WITH` token.
pub fn seek_statement_start(text: &str) -> Option<&str> {
    STATEMENT_START_REGEX.find(text).map(|m| &text[m.start()..])
}

struct Edit {
    start:       usize,
    end:         usize,
    replacement: String
}

impl Edit {
    fn replace(token: Token, replacement: String) -> Self {
        Self {
            start: token.start,
            end: token.end,
            replacement
        }
    }

    fn delete(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            replacement: String::new()
        }
    }
}

fn apply_edits(sql: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by_key(|e| e.start);
    let mut out = String::with_capacity(sql.len() + edits.len() * 16);
    let mut cursor = 0;
    for edit in edits {
        if edit.start < cursor {
            continue;
        }
        out.push_str(&sql[cursor..edit.start]);
        out.push_str(&edit.replacement);
        cursor = edit.end;
    }
    out.push_str(&sql[cursor..]);
    out
}

/// Table reference in a FROM list or JOIN, as significant-token indices.
struct TableRef {
    /// Dotted name parts
    parts: Vec<usize>,
    /// Alias name, with or without `AS`
    alias: Option<usize>
}

/// CTE name and the first significant token it is in scope for.
struct Cte {
    name:    String,
    visible: usize
}

#[derive(Default)]
struct Declarations {
    ctes:    Vec<Cte>,
    /// Lowercased table and column aliases
    aliases: IndexSet<String>
}

impl Declarations {
    /// Whether `name` at token `i` refers to a CTE rather than a table
    fn shadows(&self, name: &str, i: usize) -> bool {
        self.ctes.iter().any(|cte| cte.name == name && i >= cte.visible)
    }
}

struct Scan<'a> {
    sql: &'a str,
    sig: &'a [Token]
}

impl Scan<'_> {
    fn word_at(&self, i: usize) -> Option<&str> {
        self.sig
            .get(i)
            .filter(|t| t.kind == TokenKind::Word)
            .map(|t| t.text(self.sql))
    }

    fn is_symbol_at(&self, i: usize, symbol: char) -> bool {
        self.sig.get(i).is_some_and(|t| t.is_symbol(self.sql, symbol))
    }

    fn is_keyword_at(&self, i: usize, keyword: &str) -> bool {
        self.sig.get(i).is_some_and(|t| t.is_keyword(self.sql, keyword))
    }

    fn follows_dot(&self, i: usize) -> bool {
        i > 0 && self.is_symbol_at(i - 1, '.')
    }

    fn is_name_at(&self, i: usize) -> bool {
        self.sig
            .get(i)
            .is_some_and(|t| matches!(t.kind, TokenKind::Word | TokenKind::QuotedIdent))
    }

    /// Token after `table.` that makes it a column qualifier
    fn qualifies_column(&self, i: usize) -> bool {
        self.is_name_at(i) || self.is_symbol_at(i, '*')
    }

    /// Token directly after FROM or JOIN
    fn is_table_position(&self, i: usize) -> bool {
        i > 0 && (self.is_keyword_at(i - 1, "FROM") || self.is_keyword_at(i - 1, "JOIN"))
    }

    fn is_clause_keyword(&self, i: usize) -> bool {
        self.word_at(i)
            .is_some_and(|w| CLAUSE_KEYWORDS.iter().any(|k| w.eq_ignore_ascii_case(k)))
    }

    /// Index of the `)` matching the `(` at `open`
    fn closing_paren(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        for i in open..self.sig.len() {
            if self.is_symbol_at(i, '(') {
                depth += 1;
            } else if self.is_symbol_at(i, ')') {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
        }
        None
    }

    /// Parse one reference at `start`, returning it and the index after it.
    ///
    /// A parenthesized subquery yields a reference with no name parts, only
    /// its alias.
    fn table_ref(&self, start: usize) -> Option<(TableRef, usize)> {
        let mut parts = Vec::new();
        let mut i;
        if self.is_symbol_at(start, '(') {
            i = self.closing_paren(start)? + 1;
        } else if self.is_name_at(start) && !self.is_clause_keyword(start) {
            parts.push(start);
            i = start + 1;
            while self.is_symbol_at(i, '.') && self.is_name_at(i + 1) {
                parts.push(i + 1);
                i += 2;
            }
        } else {
            return None;
        }
        let mut alias = None;
        if self.is_keyword_at(i, "AS") && self.is_name_at(i + 1) {
            alias = Some(i + 1);
            i += 2;
        } else if self.is_name_at(i) && !self.is_clause_keyword(i) && !self.is_symbol_at(i, '(') {
            alias = Some(i);
            i += 1;
        }
        Some((
            TableRef {
                parts,
                alias
            },
            i
        ))
    }

    /// Every table reference following FROM (including comma lists) or JOIN
    fn table_refs(&self) -> Vec<TableRef> {
        let mut refs = Vec::new();
        for i in 0..self.sig.len() {
            let is_from = self.is_keyword_at(i, "FROM");
            if !is_from && !self.is_keyword_at(i, "JOIN") {
                continue;
            }
            let mut start = i + 1;
            while let Some((table_ref, next)) = self.table_ref(start) {
                refs.push(table_ref);
                if is_from && self.is_symbol_at(next, ',') {
                    start = next + 1;
                } else {
                    break;
                }
            }
        }
        refs
    }

    /// CTEs, table aliases, and column aliases.
    ///
    /// A CTE is in scope after the `)` closing its body, so a same-named
    /// reference inside the body is the real table. Under `WITH RECURSIVE` the
    /// name is in scope from the declaration on.
    fn declarations(&self, refs: &[TableRef]) -> Declarations {
        let mut declared = Declarations::default();
        let mut recursive = false;
        for i in 0..self.sig.len() {
            if self.is_keyword_at(i, "WITH") {
                recursive = self.is_keyword_at(i + 1, "RECURSIVE");
            }
            // name AS ( ... ) declares a CTE
            let after_with = i > 0
                && (self.is_keyword_at(i - 1, "WITH")
                    || self.is_keyword_at(i - 1, "RECURSIVE")
                    || self.is_symbol_at(i - 1, ','));
            if after_with
                && self.is_name_at(i)
                && self.is_keyword_at(i + 1, "AS")
                && self.is_symbol_at(i + 2, '(')
            {
                let visible = if recursive {
                    i
                } else {
                    self.closing_paren(i + 2).map_or(self.sig.len(), |close| close + 1)
                };
                declared.ctes.push(Cte {
                    name: self.name_text(i),
                    visible
                });
            }
            if self.is_keyword_at(i, "AS") && self.is_name_at(i + 1) {
                declared.aliases.insert(self.name_text(i + 1));
            }
        }
        for table_ref in refs {
            if let Some(alias) = table_ref.alias {
                declared.aliases.insert(self.name_text(alias));
            }
        }
        declared
    }

    /// Lowercased name with identifier quotes removed
    fn name_text(&self, i: usize) -> String {
        self.sig[i]
            .text(self.sql)
            .trim_matches(|c| matches!(c, '"' | '`' | '[' | ']'))
            .to_ascii_lowercase()
    }
}
