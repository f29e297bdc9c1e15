use std::fmt;

use crate::error::{QueryError, Result};

/// Reserved words that cannot be used as column names.
pub fn is_keyword(word: &str) -> bool {
    matches!(
        word.to_ascii_uppercase().as_str(),
        "SELECT"
            | "DELETE"
            | "FROM"
            | "WHERE"
            | "GROUP"
            | "BY"
            | "HAVING"
            | "INSERT"
            | "INTO"
            | "VALUES"
            | "DROP"
            | "TABLE"
            | "CREATE"
            | "ALL"
            | "DISTINCT"
            | "MAX"
            | "MIN"
            | "AVG"
            | "COUNT"
            | "SUM"
            | "BETWEEN"
            | "LIKE"
            | "NULL"
            | "AND"
            | "OR"
            | "NOT"
            | "ANY"
            | "EXISTS"
            | "IN"
            | "IS"
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Number,
    Text,
    Special,
    Empty,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Identifier => "identifier",
            TokenKind::Number => "number",
            TokenKind::Text => "string literal",
            TokenKind::Special => "special character",
            TokenKind::Empty => "end of input",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

impl Token {
    /// Case-insensitive lexeme comparison, used for keyword matching.
    pub fn like(&self, lexeme: &str) -> bool {
        self.text.eq_ignore_ascii_case(lexeme)
    }
}

/// A peekable token stream over a query string.
///
/// Lookahead is exactly one token, materialized lazily. The stream keeps
/// byte positions of the lookahead and of the last consumed token so that
/// callers can capture raw source text verbatim (subqueries and projection
/// items are re-tokenized from their original text).
pub struct TokenStream<'a> {
    src: &'a str,
    pos: usize,
    lookahead: Option<Token>,
    lookahead_start: usize,
    last_end: usize,
}

impl<'a> TokenStream<'a> {
    pub fn new(src: &'a str) -> Self {
        TokenStream {
            src,
            pos: 0,
            lookahead: None,
            lookahead_start: 0,
            last_end: 0,
        }
    }

    pub fn peek(&mut self) -> Result<&Token> {
        self.load()?;
        Ok(self.lookahead.as_ref().unwrap())
    }

    pub fn get(&mut self) -> Result<Token> {
        self.load()?;
        let token = self.lookahead.take().unwrap();
        self.last_end = self.pos;
        Ok(token)
    }

    /// Consume a token, failing unless it has the requested kind.
    pub fn get_of_type(&mut self, kind: TokenKind) -> Result<String> {
        let token = self.get()?;
        if token.kind != kind {
            return Err(QueryError::parse(format!(
                "expected {}, got '{}'",
                kind, token.text
            )));
        }
        Ok(token.text)
    }

    /// Consume a token that must match the given lexeme (case-insensitive).
    pub fn ignore(&mut self, lexeme: &str) -> Result<()> {
        let token = self.get()?;
        if !token.like(lexeme) {
            return Err(QueryError::parse(format!(
                "expected '{}', got '{}'",
                lexeme, token.text
            )));
        }
        Ok(())
    }

    /// Consume the next token if it matches the lexeme.
    pub fn try_ignore(&mut self, lexeme: &str) -> Result<bool> {
        if self.peek()?.kind != TokenKind::Empty && self.peek()?.like(lexeme) {
            self.get()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn at_end(&mut self) -> Result<bool> {
        Ok(self.peek()?.kind == TokenKind::Empty)
    }

    pub fn assert_end(&mut self) -> Result<()> {
        let token = self.peek()?;
        if token.kind != TokenKind::Empty {
            return Err(QueryError::parse(format!(
                "unexpected trailing input '{}'",
                token.text
            )));
        }
        Ok(())
    }

    /// Capture the raw text between the current position and the matching
    /// closing parenthesis. The opening parenthesis must already have been
    /// consumed; the closing one is consumed but excluded from the result.
    pub fn capture_parenthesized(&mut self) -> Result<String> {
        self.load()?;
        let start = self.lookahead_start;
        let mut depth = 1usize;
        loop {
            let (kind, open, close) = {
                let token = self.peek()?;
                (token.kind, token.text == "(", token.text == ")")
            };
            if kind == TokenKind::Empty {
                return Err(QueryError::parse("unbalanced parentheses"));
            }
            if kind == TokenKind::Special && open {
                depth += 1;
            } else if kind == TokenKind::Special && close {
                depth -= 1;
                if depth == 0 {
                    let end = self.lookahead_start;
                    self.get()?;
                    return Ok(self.src[start..end].trim().to_string());
                }
            }
            self.get()?;
        }
    }

    /// Capture the raw text of one projection item: everything up to a
    /// top-level `,` or `FROM`, neither of which is consumed.
    pub fn capture_projection_item(&mut self) -> Result<String> {
        self.load()?;
        let start = self.lookahead_start;
        let mut depth = 0usize;
        let mut consumed = false;
        loop {
            let (kind, text) = {
                let token = self.peek()?;
                (token.kind, token.text.clone())
            };
            match kind {
                TokenKind::Empty => {
                    return Err(QueryError::parse("unexpected end of query in projection"))
                }
                TokenKind::Special if text == "(" => depth += 1,
                TokenKind::Special if text == ")" => {
                    if depth == 0 {
                        return Err(QueryError::parse("unbalanced parentheses in projection"));
                    }
                    depth -= 1;
                }
                TokenKind::Special if text == "," && depth == 0 => break,
                TokenKind::Identifier if depth == 0 && text.eq_ignore_ascii_case("FROM") => break,
                _ => {}
            }
            self.get()?;
            consumed = true;
        }
        if !consumed {
            return Err(QueryError::parse("empty projection item"));
        }
        Ok(self.src[start..self.last_end].trim().to_string())
    }

    /// Capture the raw text up to a top-level `;` or the end of input. The
    /// terminator is not consumed. Used for HAVING, whose condition is
    /// re-tokenized once per partition.
    pub fn capture_statement_tail(&mut self) -> Result<String> {
        self.load()?;
        let start = self.lookahead_start;
        let mut depth = 0usize;
        let mut consumed = false;
        loop {
            let (kind, text) = {
                let token = self.peek()?;
                (token.kind, token.text.clone())
            };
            match kind {
                TokenKind::Empty => break,
                TokenKind::Special if text == "(" => depth += 1,
                TokenKind::Special if text == ")" => {
                    if depth == 0 {
                        return Err(QueryError::parse("unbalanced parentheses"));
                    }
                    depth -= 1;
                }
                TokenKind::Special if text == ";" && depth == 0 => break,
                _ => {}
            }
            self.get()?;
            consumed = true;
        }
        if !consumed {
            return Ok(String::new());
        }
        Ok(self.src[start..self.last_end].trim().to_string())
    }

    fn load(&mut self) -> Result<()> {
        if self.lookahead.is_some() {
            return Ok(());
        }
        self.skip_whitespace();
        self.lookahead_start = self.pos;
        let token = if self.pos >= self.src.len() {
            Token {
                kind: TokenKind::Empty,
                text: String::new(),
            }
        } else {
            self.lex()?
        };
        self.lookahead = Some(token);
        Ok(())
    }

    fn skip_whitespace(&mut self) {
        let bytes = self.src.as_bytes();
        while self.pos < bytes.len() && matches!(bytes[self.pos], b' ' | b'\t' | b'\n' | b'\r') {
            self.pos += 1;
        }
    }

    fn lex(&mut self) -> Result<Token> {
        let rest = &self.src[self.pos..];
        let first = rest.chars().next().unwrap();

        if first.is_ascii_alphabetic() || first == '_' {
            let len = rest
                .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
                .unwrap_or(rest.len());
            self.pos += len;
            return Ok(Token {
                kind: TokenKind::Identifier,
                text: rest[..len].to_string(),
            });
        }

        if first.is_ascii_digit() || first == '.' {
            let len = rest
                .find(|c: char| !c.is_ascii_digit() && c != '.')
                .unwrap_or(rest.len());
            self.pos += len;
            return Ok(Token {
                kind: TokenKind::Number,
                text: rest[..len].to_string(),
            });
        }

        if first == '"' || first == '\'' {
            match rest[1..].find(first) {
                Some(idx) => {
                    self.pos += idx + 2;
                    return Ok(Token {
                        kind: TokenKind::Text,
                        text: rest[1..1 + idx].to_string(),
                    });
                }
                None => return Err(QueryError::parse("unterminated string literal")),
            }
        }

        for combined in ["<=", ">=", "<>"] {
            if rest.starts_with(combined) {
                self.pos += 2;
                return Ok(Token {
                    kind: TokenKind::Special,
                    text: combined.to_string(),
                });
            }
        }

        self.pos += first.len_utf8();
        Ok(Token {
            kind: TokenKind::Special,
            text: first.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<(TokenKind, String)> {
        let mut stream = TokenStream::new(src);
        let mut out = Vec::new();
        loop {
            let token = stream.get().unwrap();
            if token.kind == TokenKind::Empty {
                return out;
            }
            out.push((token.kind, token.text));
        }
    }

    #[test]
    fn lexes_statement() {
        let tokens = kinds("SELECT a, b2 FROM t WHERE a <= 1.5;");
        assert_eq!(
            tokens,
            vec![
                (TokenKind::Identifier, "SELECT".into()),
                (TokenKind::Identifier, "a".into()),
                (TokenKind::Special, ",".into()),
                (TokenKind::Identifier, "b2".into()),
                (TokenKind::Identifier, "FROM".into()),
                (TokenKind::Identifier, "t".into()),
                (TokenKind::Identifier, "WHERE".into()),
                (TokenKind::Identifier, "a".into()),
                (TokenKind::Special, "<=".into()),
                (TokenKind::Number, "1.5".into()),
                (TokenKind::Special, ";".into()),
            ]
        );
    }

    #[test]
    fn string_quotes_are_stripped() {
        let tokens = kinds("'it''s' \"a b\"");
        // Doubled quotes are not an escape: the first lexeme ends at the
        // second quote.
        assert_eq!(tokens[0], (TokenKind::Text, "it".into()));
        assert_eq!(tokens.last().unwrap(), &(TokenKind::Text, "a b".into()));
    }

    #[test]
    fn unterminated_string_fails() {
        let mut stream = TokenStream::new("'abc");
        assert!(stream.get().is_err());
    }

    #[test]
    fn captures_balanced_parens() {
        let mut stream = TokenStream::new("(SELECT x FROM (t)) rest");
        stream.ignore("(").unwrap();
        let inner = stream.capture_parenthesized().unwrap();
        assert_eq!(inner, "SELECT x FROM (t)");
        assert!(stream.try_ignore("rest").unwrap());
        assert!(stream.at_end().unwrap());
    }

    #[test]
    fn captures_projection_item() {
        let mut stream = TokenStream::new("COUNT(a), b FROM t");
        let first = stream.capture_projection_item().unwrap();
        assert_eq!(first, "COUNT(a)");
        assert!(stream.try_ignore(",").unwrap());
        let second = stream.capture_projection_item().unwrap();
        assert_eq!(second, "b");
        assert!(stream.try_ignore("FROM").unwrap());
    }
}
