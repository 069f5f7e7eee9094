//! Span-preserving SQL tokenizer.
//!
//! Only needs to be good enough to tell identifiers apart from literals,
//! quoted names, and comments. Every byte of the input belongs to exactly one
//! token, so edits can be spliced back by byte offset without disturbing
//! anything else.

/// Lexical class of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Bare identifier or keyword
    Word,
    /// `"name"`, `` `name` `` or `[name]`
    QuotedIdent,
    /// `'text'`
    StringLit,
    Number,
    /// `-- line` or `/* block */`
    Comment,
    Whitespace,
    /// Any other single character
    Symbol
}

/// Token with its byte range in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind:  TokenKind,
    pub start: usize,
    pub end:   usize
}

impl Token {
    /// Source text of the token
    pub fn text<'a>(&self, sql: &'a str) -> &'a str {
        &sql[self.start..self.end]
    }

    /// Whitespace and comments carry no meaning for qualification
    pub fn is_significant(&self) -> bool {
        !matches!(self.kind, TokenKind::Whitespace | TokenKind::Comment)
    }

    /// Word token equal to `keyword`, ignoring ASCII case
    pub fn is_keyword(&self, sql: &str, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.text(sql).eq_ignore_ascii_case(keyword)
    }

    /// Symbol token for `symbol`
    pub fn is_symbol(&self, sql: &str, symbol: char) -> bool {
        self.kind == TokenKind::Symbol && self.text(sql).starts_with(symbol)
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

fn is_word_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

/// Position just past a quoted run starting at `pos`; a doubled quote is an
/// escaped quote. Unterminated runs extend to the end of input.
fn scan_quoted(bytes: &[u8], pos: usize, quote: u8) -> usize {
    let mut i = pos + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

fn scan_while(bytes: &[u8], mut pos: usize, pred: impl Fn(u8) -> bool) -> usize {
    while pos < bytes.len() && pred(bytes[pos]) {
        pos += 1;
    }
    pos
}

/// Split `sql` into tokens covering the whole input.
pub fn tokenize(sql: &str) -> Vec<Token> {
    let bytes = sql.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let start = pos;
        let b = bytes[pos];
        let next = bytes.get(pos + 1).copied();
        let kind = match b {
            b'\'' => {
                pos = scan_quoted(bytes, pos, b'\'');
                TokenKind::StringLit
            }
            b'"' | b'`' => {
                pos = scan_quoted(bytes, pos, b);
                TokenKind::QuotedIdent
            }
            b'[' => {
                pos = scan_quoted(bytes, pos, b']');
                TokenKind::QuotedIdent
            }
            b'-' if next == Some(b'-') => {
                pos = scan_while(bytes, pos, |c| c != b'\n');
                TokenKind::Comment
            }
            b'/' if next == Some(b'*') => {
                pos = match sql[pos + 2..].find("*/") {
                    Some(offset) => pos + 2 + offset + 2,
                    None => bytes.len()
                };
                TokenKind::Comment
            }
            _ if b.is_ascii_whitespace() => {
                pos = scan_while(bytes, pos, |c| c.is_ascii_whitespace());
                TokenKind::Whitespace
            }
            _ if is_word_start(b) => {
                pos = scan_while(bytes, pos, is_word_byte);
                TokenKind::Word
            }
            _ if b.is_ascii_digit() => {
                pos = scan_while(bytes, pos, |c| c.is_ascii_alphanumeric() || c == b'.' || c == b'_');
                TokenKind::Number
            }
            _ => {
                pos += 1;
                TokenKind::Symbol
            }
        };
        tokens.push(Token {
            kind,
            start,
            end: pos
        });
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(sql: &str) -> Vec<(TokenKind, &str)> {
        tokenize(sql)
            .into_iter()
            .filter(|t| t.kind != TokenKind::Whitespace)
            .map(|t| (t.kind, t.text(sql)))
            .collect()
    }

    #[test]
    fn test_tokens_cover_input() {
        let sql = "SELECT 'it''s', \"ipl\".x -- note\nFROM ipl /* c */ WHERE a >= 1.5";
        let rebuilt: String = tokenize(sql).iter().map(|t| t.text(sql)).collect();
        assert_eq!(rebuilt, sql);
    }

    #[test]
    fn test_string_literal_with_escaped_quote() {
        let toks = kinds("'it''s ipl.'");
        assert_eq!(toks, vec![(TokenKind::StringLit, "'it''s ipl.'")]);
    }

    #[test]
    fn test_qualified_name_splits_on_dot() {
        let toks = kinds("ipl_db.ipl.winner");
        assert_eq!(
            toks,
            vec![
                (TokenKind::Word, "ipl_db"),
                (TokenKind::Symbol, "."),
                (TokenKind::Word, "ipl"),
                (TokenKind::Symbol, "."),
                (TokenKind::Word, "winner")
            ]
        );
    }

    #[test]
    fn test_comments() {
        let toks = kinds("-- FROM ipl\n/* JOIN ipl */x");
        assert_eq!(toks[0].0, TokenKind::Comment);
        assert_eq!(toks[1], (TokenKind::Comment, "/* JOIN ipl */"));
        assert_eq!(toks[2], (TokenKind::Word, "x"));
    }

    #[test]
    fn test_unterminated_literal_runs_to_end() {
        let toks = kinds("SELECT 'open");
        assert_eq!(toks.last(), Some(&(TokenKind::StringLit, "'open")));
    }

    #[test]
    fn test_non_ascii_stays_in_word() {
        let sql = "SELECT città FROM ipl";
        let toks = kinds(sql);
        assert_eq!(toks[1], (TokenKind::Word, "città"));
    }

    #[test]
    fn test_bracket_identifier() {
        assert_eq!(kinds("[over]"), vec![(TokenKind::QuotedIdent, "[over]")]);
    }
}
