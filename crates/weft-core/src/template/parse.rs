use std::sync::LazyLock;

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace1},
    combinator::{map, value},
    error::VerboseError,
    sequence::{delimited, pair, tuple},
};
use regex::Regex;

use super::ast::{Expr, Segment};
use super::expr::{parse_expression, parse_loop_header};
use crate::comparison::translate;
use crate::error::{Error, Result};
use crate::value::Value;

static EACH_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(.+)\s+as\s+(.+?)\s*$").expect("each header pattern is valid")
});

static BINDING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_$][\w$]*$").expect("binding pattern is valid"));

#[derive(Clone, Debug, PartialEq)]
enum Token<'a> {
    Text(&'a str),
    Escaped(&'a str),
    Raw(&'a str),
    If(&'a str),
    ElseIf(&'a str),
    Else,
    EndIf,
    For(&'a str),
    EndFor,
    Each(&'a str),
    EndEach,
}

impl Token<'_> {
    fn marker(&self) -> &'static str {
        match self {
            Token::Text(_) => "text",
            Token::Escaped(_) => "{{ }}",
            Token::Raw(_) => "{#html}",
            Token::If(_) => "{#if}",
            Token::ElseIf(_) => "{#else if}",
            Token::Else => "{#else}",
            Token::EndIf => "{/if}",
            Token::For(_) => "{#for}",
            Token::EndFor => "{/for}",
            Token::Each(_) => "{#each}",
            Token::EndEach => "{/each}",
        }
    }
}

fn body(i: &str) -> IResult<&str, &str, VerboseError<&str>> {
    take_while(|c: char| c != '}')(i)
}

fn directive(i: &str) -> IResult<&str, Token<'_>, VerboseError<&str>> {
    alt((
        map(delimited(tag("{{"), body, tag("}}")), Token::Escaped),
        map(
            delimited(pair(tag("{#if"), multispace1), body, char('}')),
            Token::If,
        ),
        map(
            delimited(
                tuple((tag("{#else"), multispace1, tag("if"), multispace1)),
                body,
                char('}'),
            ),
            Token::ElseIf,
        ),
        value(Token::Else, tag("{#else}")),
        value(Token::EndIf, tag("{/if}")),
        map(
            delimited(pair(tag("{#for"), multispace1), body, char('}')),
            Token::For,
        ),
        value(Token::EndFor, tag("{/for}")),
        map(
            delimited(
                pair(tag("{#each"), multispace1),
                take_while1(|c: char| c != '}'),
                char('}'),
            ),
            Token::Each,
        ),
        value(Token::EndEach, tag("{/each}")),
        map(
            delimited(pair(tag("{#html"), multispace1), body, char('}')),
            Token::Raw,
        ),
    ))(i)
}

/// Splits template text into literal runs and directive markers. A `{`
/// that does not start a recognised directive stays literal.
fn tokenize(source: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut literal_start = 0;
    let mut pos = 0;
    while let Some(found) = source[pos..].find('{') {
        let at = pos + found;
        match directive(&source[at..]) {
            Ok((rest, token)) => {
                if literal_start < at {
                    tokens.push(Token::Text(&source[literal_start..at]));
                }
                tokens.push(token);
                pos = source.len() - rest.len();
                literal_start = pos;
            }
            Err(_) => pos = at + 1,
        }
    }
    if literal_start < source.len() {
        tokens.push(Token::Text(&source[literal_start..]));
    }
    tokens
}

pub(crate) fn parse_segments(source: &str) -> Result<Vec<Segment>> {
    let mut parser = Parser {
        tokens: tokenize(source).into_iter(),
    };
    match parser.block()? {
        (segments, None) => Ok(segments),
        (_, Some(stray)) => Err(Error::template(format!("unexpected {}", stray.marker()))),
    }
}

struct Parser<'a> {
    tokens: std::vec::IntoIter<Token<'a>>,
}

impl<'a> Parser<'a> {
    /// Collects segments until a closing or branch marker, which is handed
    /// back to the caller.
    fn block(&mut self) -> Result<(Vec<Segment>, Option<Token<'a>>)> {
        let mut segments = Vec::new();
        while let Some(token) = self.tokens.next() {
            match token {
                Token::Text(text) => segments.push(Segment::Text(text.to_string())),
                Token::Escaped(src) => segments.push(Segment::Escaped(interpolation(src)?)),
                Token::Raw(src) => segments.push(Segment::Raw(interpolation(src)?)),
                Token::If(test) => segments.push(self.conditional(test)?),
                Token::For(header) => {
                    let header = parse_loop_header(&translate(header))?;
                    let body = self.closed_by(Token::EndFor, "{#for}")?;
                    segments.push(Segment::For { header, body });
                }
                Token::Each(header) => {
                    let (collection, bindings) = each_header(header)?;
                    let body = self.closed_by(Token::EndEach, "{#each}")?;
                    segments.push(Segment::Each {
                        collection,
                        bindings,
                        body,
                    });
                }
                closing @ (Token::ElseIf(_)
                | Token::Else
                | Token::EndIf
                | Token::EndFor
                | Token::EndEach) => return Ok((segments, Some(closing))),
            }
        }
        Ok((segments, None))
    }

    fn closed_by(&mut self, end: Token<'a>, open: &str) -> Result<Vec<Segment>> {
        match self.block()? {
            (body, Some(found)) if found == end => Ok(body),
            (_, found) => Err(unbalanced(open, found)),
        }
    }

    fn conditional(&mut self, first: &str) -> Result<Segment> {
        let mut branches = Vec::new();
        let mut test = parse_expression(&translate(first))?;
        loop {
            match self.block()? {
                (body, Some(Token::ElseIf(next))) => {
                    branches.push((test, body));
                    test = parse_expression(&translate(next))?;
                }
                (body, Some(Token::Else)) => {
                    branches.push((test, body));
                    let otherwise = self.closed_by(Token::EndIf, "{#if}")?;
                    return Ok(Segment::If {
                        branches,
                        otherwise: Some(otherwise),
                    });
                }
                (body, Some(Token::EndIf)) => {
                    branches.push((test, body));
                    return Ok(Segment::If {
                        branches,
                        otherwise: None,
                    });
                }
                (_, found) => return Err(unbalanced("{#if}", found)),
            }
        }
    }
}

fn unbalanced(open: &str, found: Option<Token<'_>>) -> Error {
    match found {
        Some(token) => Error::template(format!("unexpected {} inside {open}", token.marker())),
        None => Error::template(format!("unclosed {open}")),
    }
}

fn interpolation(src: &str) -> Result<Expr> {
    if src.trim().is_empty() {
        Ok(Expr::Literal(Value::Undefined))
    } else {
        parse_expression(src)
    }
}

fn each_header(header: &str) -> Result<(Expr, Vec<String>)> {
    let caps = EACH_HEADER
        .captures(header)
        .ok_or_else(|| Error::template(format!("invalid {{#each}} header `{header}`")))?;
    let collection = parse_expression(&caps[1])?;
    let bindings: Vec<String> = caps[2]
        .trim_matches(|c| c == '(' || c == ')')
        .split(',')
        .map(|name| name.trim().to_string())
        .collect();
    if bindings.len() > 3 || bindings.iter().any(|name| !BINDING.is_match(name)) {
        return Err(Error::template(format!(
            "invalid {{#each}} bindings `{}`",
            &caps[2]
        )));
    }
    Ok((collection, bindings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_literals_and_directives() {
        let tokens = tokenize("<p>{{name}}</p>{#if a}x{/if}");
        assert_eq!(
            tokens,
            vec![
                Token::Text("<p>"),
                Token::Escaped("name"),
                Token::Text("</p>"),
                Token::If("a"),
                Token::Text("x"),
                Token::EndIf,
            ]
        );
    }

    #[test]
    fn stray_braces_stay_literal() {
        let tokens = tokenize("a { b } {#iffy} {{x}}");
        assert_eq!(
            tokens,
            vec![Token::Text("a { b } {#iffy} "), Token::Escaped("x")]
        );
    }

    #[test]
    fn else_if_is_not_mistaken_for_else() {
        let tokens = tokenize("{#else if b}{#else}");
        assert_eq!(tokens, vec![Token::ElseIf("b"), Token::Else]);
    }

    #[test]
    fn builds_nested_blocks() {
        let segments =
            parse_segments("{#each rows as row}{#if row eq 1}one{#else}other{/if}{/each}")
                .unwrap();
        let [Segment::Each { bindings, body, .. }] = segments.as_slice() else {
            panic!("expected a single each block");
        };
        assert_eq!(bindings, &["row"]);
        assert!(matches!(
            body.as_slice(),
            [Segment::If { branches, otherwise: Some(_) }] if branches.len() == 1
        ));
    }

    #[test]
    fn each_accepts_index_binding() {
        let segments = parse_segments("{#each items as (item, i)}{/each}").unwrap();
        let [Segment::Each { bindings, .. }] = segments.as_slice() else {
            panic!("expected each");
        };
        assert_eq!(bindings, &["item", "i"]);
    }

    #[test]
    fn unbalanced_blocks_are_errors() {
        assert_eq!(
            parse_segments("{#if a}x").unwrap_err(),
            Error::Template("unclosed {#if}".into())
        );
        assert_eq!(
            parse_segments("x{/each}").unwrap_err(),
            Error::Template("unexpected {/each}".into())
        );
        assert_eq!(
            parse_segments("{#for ;;}{/if}").unwrap_err(),
            Error::Template("unexpected {/if} inside {#for}".into())
        );
    }
}
