//! Lexer/tokenizer for the tag expression DSL.

use winnow::combinator::alt;
use winnow::prelude::*;
use winnow::token::take_while;

use super::error::{ParseError, ParseErrorKind};

/// Token types for the DSL.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Tag(String),

    And,   // +
    Or,    // |
    Not,   // !
    Minus, // - (prefix NOT, or AND NOT between terms)

    LParen, // (
    RParen, // )

    Eof,
}

/// A token plus the character offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

// Manually define PResult for resilience against winnow version changes
type PResult<T> = Result<T, winnow::error::ErrMode<winnow::error::ContextError>>;

/// Characters that can never appear inside a tag literal.
pub fn is_reserved(c: char) -> bool {
    matches!(c, '+' | '|' | '!' | '-' | '(' | ')')
}

fn is_tag_char(c: char) -> bool {
    !is_reserved(c) && !c.is_whitespace() && !c.is_control()
}

fn skip_whitespace(input: &mut &str) -> PResult<()> {
    take_while(0.., char::is_whitespace).void().parse_next(input)
}

/// Lex a tag literal: everything up to the next operator, paren or space.
fn lex_tag(input: &mut &str) -> PResult<Token> {
    take_while(1.., is_tag_char)
        .map(|s: &str| Token::Tag(s.to_string()))
        .parse_next(input)
}

/// Lex a single token (whitespace already skipped).
fn lex_token(input: &mut &str) -> PResult<Token> {
    alt((
        "+".value(Token::And),
        "|".value(Token::Or),
        "!".value(Token::Not),
        "-".value(Token::Minus),
        "(".value(Token::LParen),
        ")".value(Token::RParen),
        lex_tag,
    ))
    .parse_next(input)
}

fn char_offset(input: &str, remaining: &str) -> usize {
    input[..input.len() - remaining.len()].chars().count()
}

/// Tokenize the entire input. The last token is always [`Token::Eof`].
pub fn tokenize(input: &str) -> Result<Vec<Spanned>, ParseError> {
    let mut remaining = input;
    let mut tokens = Vec::new();

    loop {
        let offset = char_offset(input, remaining);
        skip_whitespace(&mut remaining).map_err(|_| {
            ParseError::new(
                ParseErrorKind::InvalidCharacter,
                offset,
                "whitespace",
                input,
            )
        })?;

        let offset = char_offset(input, remaining);
        if remaining.is_empty() {
            tokens.push(Spanned {
                token: Token::Eof,
                offset,
            });
            break;
        }

        match lex_token(&mut remaining) {
            Ok(token) => tokens.push(Spanned { token, offset }),
            Err(_) => {
                return Err(ParseError::new(
                    ParseErrorKind::InvalidCharacter,
                    offset,
                    "a tag, an operator or a parenthesis",
                    input,
                ));
            }
        }
    }

    Ok(tokens)
}
