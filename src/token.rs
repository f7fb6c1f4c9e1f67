// Token contract shared with the tokenizer, plus a logos lexer that produces it.
// Tokens borrow their text from the query string, so lexing never copies.

use logos::Logos;
use std::fmt;
use std::ops::Range;
use thiserror::Error;

/// Classified token handed to the parser.
///
/// Compound keywords (`GROUP BY`, `LEFT JOIN`, ...) arrive as a single `Keyword`
/// token; the parser never looks at adjacent-token sequences for them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
}

impl<'a> Token<'a> {
    pub fn new(kind: TokenKind, text: &'a str) -> Self {
        Token { kind, text }
    }

    pub fn keyword(text: &'a str) -> Self {
        Token::new(TokenKind::Keyword, text)
    }

    pub fn identifier(text: &'a str) -> Self {
        Token::new(TokenKind::Identifier, text)
    }

    pub fn operator(text: &'a str) -> Self {
        Token::new(TokenKind::Operator, text)
    }

    pub fn punctuation(text: &'a str) -> Self {
        Token::new(TokenKind::Punctuation, text)
    }

    pub fn number(text: &'a str) -> Self {
        Token::new(TokenKind::Number, text)
    }

    pub fn string(text: &'a str) -> Self {
        Token::new(TokenKind::String, text)
    }

    pub fn wildcard() -> Self {
        Token::new(TokenKind::Wildcard, "*")
    }

    pub fn boolean(text: &'a str) -> Self {
        Token::new(TokenKind::Boolean, text)
    }

    /// Whole-token, case-insensitive text comparison.
    /// Runs of whitespace inside a compound keyword compare equal to one space.
    pub fn matches_text(&self, expected: &str) -> bool {
        let mut actual = self.text.split_whitespace();
        let mut wanted = expected.split_whitespace();
        loop {
            match (actual.next(), wanted.next()) {
                (Some(a), Some(w)) if a.eq_ignore_ascii_case(w) => continue,
                (None, None) => return true,
                _ => return false,
            }
        }
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Keyword && self.matches_text(keyword)
    }

    pub fn is_punctuation(&self, symbol: &str) -> bool {
        self.kind == TokenKind::Punctuation && self.text == symbol
    }

    /// `JOIN`, `LEFT JOIN`, `FULL OUTER JOIN`, ... all count as the JOIN family.
    pub fn is_join_keyword(&self) -> bool {
        self.kind == TokenKind::Keyword && self.normalized().contains("JOIN")
    }

    /// Upper-cased text with whitespace collapsed, e.g. `"left  join"` -> `"LEFT JOIN"`.
    pub fn normalized(&self) -> String {
        self.text
            .split_whitespace()
            .map(|word| word.to_ascii_uppercase())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.text)
    }
}

/// Token classes of the parser contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Keyword,
    Identifier,
    Operator,
    Punctuation,
    Literal,
    Number,
    String,
    Wildcard,
    Boolean,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Keyword => "KEYWORD",
            TokenKind::Identifier => "IDENTIFIER",
            TokenKind::Operator => "OPERATOR",
            TokenKind::Punctuation => "PUNCTUATION",
            TokenKind::Literal => "LITERAL",
            TokenKind::Number => "NUMBER",
            TokenKind::String => "STRING",
            TokenKind::Wildcard => "WILDCARD",
            TokenKind::Boolean => "BOOLEAN",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Words the lexer classifies as keywords. Aggregate names are keywords too,
/// which is how the parser recognises `COUNT(` and friends.
pub const KEYWORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "AND", "OR", "NOT", "IN", "IS", "NULL", "LIKE", "BETWEEN", "AS",
    "ON", "ASC", "DESC", "JOIN", "INNER", "LEFT", "RIGHT", "FULL", "OUTER", "CROSS", "GROUP",
    "ORDER", "BY", "HAVING", "LIMIT", "OFFSET", "DISTINCT", "UNION", "ALL", "COUNT", "SUM", "AVG",
    "MIN", "MAX",
];

const JOIN_MODIFIERS: &[&str] = &["INNER", "LEFT", "RIGHT", "FULL", "CROSS"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("unrecognized input {text:?} at byte offset {offset}")]
    UnrecognizedInput { offset: usize, text: String },
}

/// Raw lexemes before keyword classification and compound merging.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")] // Skip whitespace
#[logos(skip r"--[^\n]*")] // Skip SQL comments
enum Lexeme {
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Word,

    #[regex(r#""[^"]*""#)]
    QuotedIdentifier,

    #[regex(r"'([^']|'')*'")]
    String,

    #[regex(r"[0-9]+(\.[0-9]+)?")]
    Number,

    #[token("=")]
    #[token("!=")]
    #[token("<>")]
    #[token("<")]
    #[token(">")]
    #[token("<=")]
    #[token(">=")]
    #[token("+")]
    #[token("-")]
    #[token("/")]
    #[token("%")]
    Operator,

    #[token("(")]
    #[token(")")]
    #[token(",")]
    #[token(";")]
    #[token(".")]
    Punctuation,

    #[token("*")]
    Star,
}

fn classify_word(word: &str) -> TokenKind {
    if word.eq_ignore_ascii_case("TRUE") || word.eq_ignore_ascii_case("FALSE") {
        TokenKind::Boolean
    } else if KEYWORDS.iter().any(|kw| kw.eq_ignore_ascii_case(word)) {
        TokenKind::Keyword
    } else {
        TokenKind::Identifier
    }
}

/// Tokenize a SELECT statement into the parser contract.
///
/// Keyword sequences that the parser treats as one clause marker are merged into a
/// single token whose text spans the original words, so the result stays zero-copy.
pub fn tokenize(input: &str) -> Result<Vec<Token<'_>>, LexError> {
    let mut raw: Vec<(TokenKind, Range<usize>)> = Vec::new();
    let mut lexer = Lexeme::lexer(input);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let kind = match result {
            Ok(Lexeme::Word) => classify_word(&input[span.clone()]),
            Ok(Lexeme::QuotedIdentifier) => TokenKind::Identifier,
            Ok(Lexeme::String) => TokenKind::String,
            Ok(Lexeme::Number) => {
                if let Some(start) = negative_sign_before(input, &raw, span.start) {
                    raw.pop();
                    raw.push((TokenKind::Number, start..span.end));
                    continue;
                }
                TokenKind::Number
            }
            Ok(Lexeme::Operator) => TokenKind::Operator,
            Ok(Lexeme::Punctuation) => TokenKind::Punctuation,
            Ok(Lexeme::Star) => TokenKind::Wildcard,
            Err(()) => {
                return Err(LexError::UnrecognizedInput {
                    offset: span.start,
                    text: input[span].to_string(),
                })
            }
        };
        raw.push((kind, span));
    }

    Ok(merge_compound_keywords(input, raw))
}

/// Start offset of a `-` written directly against a number, when that `-` cannot be
/// a binary minus: nothing that could be a left operand comes before it.
fn negative_sign_before(
    input: &str,
    raw: &[(TokenKind, Range<usize>)],
    number_start: usize,
) -> Option<usize> {
    let (sign_kind, sign) = raw.last()?;
    if *sign_kind != TokenKind::Operator
        || &input[sign.clone()] != "-"
        || sign.end != number_start
    {
        return None;
    }

    let unary = match raw.len().checked_sub(2).and_then(|i| raw.get(i)) {
        None => true,
        Some((TokenKind::Operator | TokenKind::Keyword, _)) => true,
        Some((TokenKind::Punctuation, span)) => matches!(&input[span.clone()], "(" | ","),
        Some(_) => false,
    };
    unary.then_some(sign.start)
}

fn merge_compound_keywords(input: &str, raw: Vec<(TokenKind, Range<usize>)>) -> Vec<Token<'_>> {
    let keyword_at = |i: usize| {
        raw.get(i)
            .filter(|(kind, _)| *kind == TokenKind::Keyword)
            .map(|(_, span)| &input[span.clone()])
    };
    // Only whitespace may separate the words of a compound keyword.
    let adjacent = |i: usize| {
        match (raw.get(i), raw.get(i + 1)) {
            (Some((_, a)), Some((_, b))) => input[a.end..b.start].trim().is_empty(),
            _ => false,
        }
    };
    let is = |i: usize, word: &str| keyword_at(i).is_some_and(|w| w.eq_ignore_ascii_case(word));

    let mut tokens = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let (kind, span) = &raw[i];
        let mut end = i;

        if (is(i, "GROUP") || is(i, "ORDER")) && adjacent(i) && is(i + 1, "BY") {
            end = i + 1;
        } else if keyword_at(i).is_some_and(|w| {
            JOIN_MODIFIERS.iter().any(|m| m.eq_ignore_ascii_case(w))
        }) {
            let mut j = i;
            if adjacent(j) && is(j + 1, "OUTER") {
                j += 1;
            }
            if adjacent(j) && is(j + 1, "JOIN") {
                end = j + 1;
            }
        }

        let text = &input[span.start..raw[end].1.end];
        tokens.push(Token::new(*kind, text));
        i = end + 1;
    }

    tokens
}
