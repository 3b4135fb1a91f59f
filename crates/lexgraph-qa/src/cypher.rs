//! Lexical view of a Cypher string.
//!
//! This is not a parser. It yields the bare words of a query with string
//! literals, backtick identifiers, comments, `$parameters`, and property
//! keys (`a.limit`) skipped, which is enough for keyword counting and for
//! locating clause boundaries.

/// A bare word, upper-cased, with its byte span in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub word: String,
    pub start: usize,
    pub end: usize,
    /// First non-whitespace character after the word.
    pub next: Option<char>,
}

impl Token {
    pub fn is(&self, keyword: &str) -> bool {
        self.word == keyword
    }
}

/// Tokenize the keyword-bearing words of `query`.
pub fn tokenize(query: &str) -> Vec<Token> {
    let bytes = query.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b'\'' | b'"' | b'`' => i = skip_quoted(bytes, i, c),
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
            }
            b'$' => {
                i += 1;
                while i < bytes.len() && is_ident(bytes[i]) {
                    i += 1;
                }
            }
            _ if c.is_ascii_alphabetic() || c == b'_' => {
                let start = i;
                while i < bytes.len() && is_ident(bytes[i]) {
                    i += 1;
                }
                if preceded_by_dot(bytes, start) {
                    continue;
                }
                let next = query[i..].chars().find(|ch| !ch.is_whitespace());
                tokens.push(Token {
                    word: query[start..i].to_ascii_uppercase(),
                    start,
                    end: i,
                    next,
                });
            }
            _ => i += 1,
        }
    }

    tokens
}

/// Number of tokens equal to `keyword`.
pub fn count(tokens: &[Token], keyword: &str) -> usize {
    tokens.iter().filter(|t| t.is(keyword)).count()
}

pub fn contains(tokens: &[Token], keyword: &str) -> bool {
    tokens.iter().any(|t| t.is(keyword))
}

fn is_ident(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn preceded_by_dot(bytes: &[u8], start: usize) -> bool {
    bytes[..start]
        .iter()
        .rev()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|b| *b == b'.')
}

fn skip_quoted(bytes: &[u8], open: usize, quote: u8) -> usize {
    let mut i = open + 1;
    while i < bytes.len() {
        if bytes[i] == b'\\' && quote != b'`' {
            i += 2;
            continue;
        }
        if bytes[i] == quote {
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}
