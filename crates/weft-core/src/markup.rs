//! Markup parsing for compiled templates.
//!
//! Produces a detached node list that the differ compares against the live
//! [`Document`](crate::Document). Comments and doctypes are dropped, entity
//! references are decoded, and attribute order is kept as written.

use html_escape::{decode_html_entities, encode_double_quoted_attribute, encode_text};
use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_till, take_until, take_while, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::{map, opt, recognize},
    error::VerboseError,
    multi::many0,
    sequence::{delimited, pair, preceded, terminated, tuple},
};

use crate::error::{Error, Result};

type PResult<'a, O> = IResult<&'a str, O, VerboseError<&'a str>>;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

pub fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attr {
    pub name: String,
    pub value: String,
}

impl Attr {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Element {
        tag: String,
        attrs: Vec<Attr>,
        children: Vec<Node>,
    },
    Text(String),
}

impl Node {
    pub fn is_text(&self) -> bool {
        matches!(self, Node::Text(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Node::Text(text) => Some(text),
            Node::Element { .. } => None,
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            Node::Element { tag, .. } => Some(tag),
            Node::Text(_) => None,
        }
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        write_node(self, false, &mut out);
        out
    }
}

pub(crate) fn write_node(node: &Node, raw_text: bool, out: &mut String) {
    match node {
        Node::Text(text) if raw_text => out.push_str(text),
        Node::Text(text) => out.push_str(&encode_text(text)),
        Node::Element {
            tag,
            attrs,
            children,
        } => {
            write_open_tag(tag, attrs, out);
            if is_void(tag) {
                return;
            }
            let raw = RAW_TEXT_ELEMENTS.contains(&tag.as_str());
            for child in children {
                write_node(child, raw, out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

pub(crate) fn write_open_tag(tag: &str, attrs: &[Attr], out: &mut String) {
    out.push('<');
    out.push_str(tag);
    for attr in attrs {
        out.push(' ');
        out.push_str(&attr.name);
        out.push_str("=\"");
        out.push_str(&encode_double_quoted_attribute(&attr.value));
        out.push('"');
    }
    out.push('>');
}

enum Token<'a> {
    Open {
        tag: String,
        attrs: Vec<Attr>,
        self_closing: bool,
    },
    Close(String),
    Skip,
    Text(&'a str),
}

fn tag_name(i: &str) -> PResult<'_, String> {
    map(
        recognize(pair(
            take_while1(|c: char| c.is_ascii_alphabetic()),
            take_while(|c: char| c.is_ascii_alphanumeric() || c == '-'),
        )),
        str::to_ascii_lowercase,
    )(i)
}

fn attr_value(i: &str) -> PResult<'_, &str> {
    alt((
        delimited(char('"'), take_till(|c: char| c == '"'), char('"')),
        delimited(char('\''), take_till(|c: char| c == '\''), char('\'')),
        take_while1(|c: char| !c.is_whitespace() && c != '>'),
    ))(i)
}

fn attribute(i: &str) -> PResult<'_, Attr> {
    let (i, name) = preceded(
        multispace1,
        take_while1(|c: char| {
            !c.is_whitespace() && !matches!(c, '/' | '>' | '=' | '"' | '\'')
        }),
    )(i)?;
    let (i, value) = opt(preceded(
        tuple((multispace0, char('='), multispace0)),
        attr_value,
    ))(i)?;
    Ok((
        i,
        Attr::new(
            name.to_ascii_lowercase(),
            decode_html_entities(value.unwrap_or_default()),
        ),
    ))
}

fn open_tag(i: &str) -> PResult<'_, Token<'_>> {
    let (i, tag) = preceded(char('<'), tag_name)(i)?;
    let (i, attrs) = many0(attribute)(i)?;
    let (i, self_closing) = delimited(multispace0, opt(char('/')), char('>'))(i)?;
    Ok((
        i,
        Token::Open {
            tag,
            attrs,
            self_closing: self_closing.is_some(),
        },
    ))
}

fn close_tag(i: &str) -> PResult<'_, Token<'_>> {
    map(
        delimited(tag("</"), tag_name, terminated(multispace0, char('>'))),
        Token::Close,
    )(i)
}

fn skipped(i: &str) -> PResult<'_, Token<'_>> {
    alt((
        map(delimited(tag("<!--"), take_until("-->"), tag("-->")), |_| {
            Token::Skip
        }),
        map(delimited(tag("<!"), take_until(">"), char('>')), |_| {
            Token::Skip
        }),
    ))(i)
}

fn token(i: &str) -> PResult<'_, Token<'_>> {
    alt((
        skipped,
        close_tag,
        open_tag,
        map(take_till1_lt, Token::Text),
    ))(i)
}

fn take_till1_lt(i: &str) -> PResult<'_, &str> {
    take_while1(|c: char| c != '<')(i)
}

/// A `<` that cannot start a tag (`a < b`) is literal text.
fn starts_tag(rest: &str) -> bool {
    let mut chars = rest.chars().skip(1);
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '/' || c == '!')
}

struct Open {
    tag: String,
    attrs: Vec<Attr>,
    children: Vec<Node>,
}

fn push_text(children: &mut Vec<Node>, text: &str) {
    if text.is_empty() {
        return;
    }
    match children.last_mut() {
        Some(Node::Text(prev)) => prev.push_str(text),
        _ => children.push(Node::Text(text.to_string())),
    }
}

/// Parses markup into a node list.
///
/// Void elements never take children and `<x/>` closes immediately. Stray or
/// mismatched closing tags and elements still open at the end of input are
/// [`Error::Markup`].
pub fn parse(markup: &str) -> Result<Vec<Node>> {
    let mut stack: Vec<Open> = Vec::new();
    let mut top: Vec<Node> = Vec::new();
    let mut rest = markup;

    while !rest.is_empty() {
        let children = match stack.last_mut() {
            Some(open) => &mut open.children,
            None => &mut top,
        };
        if rest.starts_with('<') && !starts_tag(rest) {
            push_text(children, "<");
            rest = &rest[1..];
            continue;
        }
        let (next, tok) = token(rest).map_err(|_| {
            let offset = markup.len() - rest.len();
            let snippet: String = rest.chars().take(24).collect();
            Error::Markup(format!("malformed tag at byte {offset}: `{snippet}`"))
        })?;
        rest = next;
        match tok {
            Token::Skip => {}
            Token::Text(text) => push_text(children, &decode_html_entities(text)),
            Token::Open {
                tag,
                attrs,
                self_closing,
            } => {
                if self_closing || is_void(&tag) {
                    children.push(Node::Element {
                        tag,
                        attrs,
                        children: Vec::new(),
                    });
                } else if RAW_TEXT_ELEMENTS.contains(&tag.as_str()) {
                    let end = format!("</{tag}");
                    let Some(at) = rest.find(&end) else {
                        return Err(Error::Markup(format!("unclosed <{tag}>")));
                    };
                    let mut body = Vec::new();
                    push_text(&mut body, &rest[..at]);
                    let (after, _) = close_tag(&rest[at..])
                        .map_err(|_| Error::Markup(format!("malformed </{tag}>")))?;
                    rest = after;
                    children.push(Node::Element {
                        tag,
                        attrs,
                        children: body,
                    });
                } else {
                    stack.push(Open {
                        tag,
                        attrs,
                        children: Vec::new(),
                    });
                }
            }
            Token::Close(name) => {
                let Some(open) = stack.pop() else {
                    return Err(Error::Markup(format!("unexpected </{name}>")));
                };
                if open.tag != name {
                    return Err(Error::Markup(format!(
                        "</{name}> does not close <{}>",
                        open.tag
                    )));
                }
                let node = Node::Element {
                    tag: open.tag,
                    attrs: open.attrs,
                    children: open.children,
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => top.push(node),
                }
            }
        }
    }

    match stack.pop() {
        Some(open) => Err(Error::Markup(format!("unclosed <{}>", open.tag))),
        None => Ok(top),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn el(tag: &str, attrs: &[(&str, &str)], children: Vec<Node>) -> Node {
        Node::Element {
            tag: tag.into(),
            attrs: attrs.iter().map(|(n, v)| Attr::new(*n, *v)).collect(),
            children,
        }
    }

    fn text(s: &str) -> Node {
        Node::Text(s.into())
    }

    #[test]
    fn parses_nested_elements_and_text() {
        let nodes = parse(r#"<div id="a"><p>1</p>tail</div>"#).unwrap();
        assert_eq!(
            nodes,
            vec![el(
                "div",
                &[("id", "a")],
                vec![el("p", &[], vec![text("1")]), text("tail")]
            )]
        );
    }

    #[test]
    fn attribute_forms_keep_source_order() {
        let nodes = parse("<INPUT type=checkbox checked data-x='1 2' value=\"&lt;\">").unwrap();
        assert_eq!(
            nodes,
            vec![el(
                "input",
                &[
                    ("type", "checkbox"),
                    ("checked", ""),
                    ("data-x", "1 2"),
                    ("value", "<")
                ],
                vec![]
            )]
        );
    }

    #[test]
    fn void_and_self_closing_elements() {
        let nodes = parse("<br><span/>x").unwrap();
        assert_eq!(nodes, vec![el("br", &[], vec![]), el("span", &[], vec![]), text("x")]);
    }

    #[test]
    fn comments_and_doctype_are_dropped() {
        let nodes = parse("<!doctype html><!-- note --><b>x</b>").unwrap();
        assert_eq!(nodes, vec![el("b", &[], vec![text("x")])]);
    }

    #[test]
    fn raw_text_elements_keep_markup() {
        let nodes = parse("<style>a > b { color: red }</style>").unwrap();
        assert_eq!(
            nodes,
            vec![el("style", &[], vec![text("a > b { color: red }")])]
        );
    }

    #[test]
    fn lone_angle_bracket_is_text() {
        let nodes = parse("1 < 2 &amp; 3").unwrap();
        assert_eq!(nodes, vec![text("1 < 2 & 3")]);
    }

    #[test]
    fn unbalanced_markup_is_an_error() {
        assert!(matches!(parse("<div><p></div>"), Err(Error::Markup(_))));
        assert!(matches!(parse("</p>"), Err(Error::Markup(_))));
        assert!(matches!(parse("<ul><li>x"), Err(Error::Markup(_))));
        assert!(matches!(parse("<a href=\"x"), Err(Error::Markup(_))));
    }

    #[test]
    fn serialises_with_encoding() {
        let node = el(
            "a",
            &[("title", "say \"hi\"")],
            vec![text("1 < 2"), el("br", &[], vec![])],
        );
        assert_eq!(node.to_html(), r#"<a title="say &quot;hi&quot;">1 &lt; 2<br></a>"#);
    }
}
