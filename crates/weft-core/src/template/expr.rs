//! Expression and loop-header grammar for directives.
//!
//! Precedence, loosest first: `?:`, `||`, `&&`, equality, relational,
//! additive, multiplicative, unary, postfix (`.name`, `[i]`, `(args)`).

use nom::{
    Finish, IResult,
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{char, digit0, digit1, multispace0, multispace1, one_of, satisfy},
    combinator::{all_consuming, map, map_res, not, opt, recognize, value},
    error::{VerboseError, VerboseErrorKind},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, terminated, tuple},
};

use super::ast::{AssignOp, BinaryOp, Expr, LogicalOp, LoopHeader, Stmt, UnaryOp};
use crate::error::{Error, Result};
use crate::value::Value;

type PResult<'a, O> = IResult<&'a str, O, VerboseError<&'a str>>;

pub fn parse_expression(src: &str) -> Result<Expr> {
    all_consuming(ws(expression))(src)
        .finish()
        .map(|(_, expr)| expr)
        .map_err(|e| syntax_error(src, e))
}

pub fn parse_loop_header(src: &str) -> Result<LoopHeader> {
    all_consuming(loop_header)(src)
        .finish()
        .map(|(_, header)| header)
        .map_err(|e| syntax_error(src, e))
}

fn syntax_error(src: &str, err: VerboseError<&str>) -> Error {
    let at = err
        .errors
        .first()
        .map(|(rest, _)| src.len().saturating_sub(rest.len()))
        .unwrap_or(0);
    let expected = err.errors.iter().find_map(|(_, kind)| match kind {
        VerboseErrorKind::Context(ctx) => Some(*ctx),
        _ => None,
    });
    let near: String = src.get(at..).unwrap_or_default().chars().take(12).collect();
    let mut message = if near.trim().is_empty() {
        format!("Unexpected end of input in `{src}`")
    } else {
        format!("Unexpected token `{near}` in `{src}`")
    };
    if let Some(expected) = expected {
        message.push_str(&format!(" ({expected})"));
    }
    Error::Template(message)
}

fn fail<'a, O>(input: &'a str, ctx: &'static str) -> PResult<'a, O> {
    Err(nom::Err::Failure(VerboseError {
        errors: vec![(input, VerboseErrorKind::Context(ctx))],
    }))
}

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> PResult<'a, O>
where
    F: FnMut(&'a str) -> PResult<'a, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn identifier(i: &str) -> PResult<'_, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic() || c == '_' || c == '$'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '$'),
    ))(i)
}

fn number(i: &str) -> PResult<'_, f64> {
    map_res(
        recognize(tuple((
            digit1,
            opt(pair(char('.'), digit0)),
            opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
        ))),
        |s: &str| s.parse::<f64>(),
    )(i)
}

fn string_literal(i: &str) -> PResult<'_, String> {
    let (mut rest, quote) = one_of("\"'")(i)?;
    let mut out = String::new();
    loop {
        let mut chars = rest.chars();
        match chars.next() {
            None => return fail(rest, "unterminated string"),
            Some(c) if c == quote => return Ok((chars.as_str(), out)),
            Some('\\') => {
                match chars.next() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some(c) => out.push(c),
                    None => return fail(rest, "unterminated string"),
                }
                rest = chars.as_str();
            }
            Some(c) => {
                out.push(c);
                rest = chars.as_str();
            }
        }
    }
}

fn word(name: &str) -> Expr {
    match name {
        "true" => Expr::Literal(Value::Bool(true)),
        "false" => Expr::Literal(Value::Bool(false)),
        "null" => Expr::Literal(Value::Null),
        "undefined" => Expr::Literal(Value::Undefined),
        other => Expr::Ident(other.to_string()),
    }
}

fn primary(i: &str) -> PResult<'_, Expr> {
    alt((
        map(number, |n| Expr::Literal(Value::Number(n))),
        map(string_literal, |s| Expr::Literal(Value::String(s))),
        delimited(char('('), expression, ws(char(')'))),
        map(
            delimited(
                char('['),
                separated_list0(ws(char(',')), expression),
                ws(char(']')),
            ),
            Expr::Array,
        ),
        map(identifier, word),
    ))(i)
}

enum Suffix {
    Member(String),
    Index(Expr),
    Call(Vec<Expr>),
}

fn postfix(i: &str) -> PResult<'_, Expr> {
    let (i, base) = ws(primary)(i)?;
    let (i, suffixes) = many0(alt((
        map(preceded(ws(char('.')), identifier), |name: &str| {
            Suffix::Member(name.to_string())
        }),
        map(
            delimited(ws(char('[')), expression, ws(char(']'))),
            Suffix::Index,
        ),
        map(
            delimited(
                ws(char('(')),
                separated_list0(ws(char(',')), expression),
                ws(char(')')),
            ),
            Suffix::Call,
        ),
    )))(i)?;
    let expr = suffixes
        .into_iter()
        .fold(base, |object, suffix| match suffix {
            Suffix::Member(name) => Expr::Member(Box::new(object), name),
            Suffix::Index(index) => Expr::Index(Box::new(object), Box::new(index)),
            Suffix::Call(args) => Expr::Call(Box::new(object), args),
        });
    Ok((i, expr))
}

fn unary(i: &str) -> PResult<'_, Expr> {
    let op = alt((
        value(UnaryOp::Not, char('!')),
        value(UnaryOp::Neg, terminated(char('-'), not(char('-')))),
        value(UnaryOp::Plus, terminated(char('+'), not(char('+')))),
    ));
    alt((
        map(pair(ws(op), unary), |(op, operand)| {
            Expr::Unary(op, Box::new(operand))
        }),
        postfix,
    ))(i)
}

fn binary_chain<'a>(
    i: &'a str,
    operand: fn(&'a str) -> PResult<'a, Expr>,
    op: impl FnMut(&'a str) -> PResult<'a, BinaryOp>,
) -> PResult<'a, Expr> {
    let (i, first) = operand(i)?;
    let (i, rest) = many0(pair(ws(op), operand))(i)?;
    let expr = rest.into_iter().fold(first, |lhs, (op, rhs)| {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    });
    Ok((i, expr))
}

fn multiplicative(i: &str) -> PResult<'_, Expr> {
    binary_chain(
        i,
        unary,
        alt((
            value(BinaryOp::Mul, char('*')),
            value(BinaryOp::Div, char('/')),
            value(BinaryOp::Rem, char('%')),
        )),
    )
}

fn additive(i: &str) -> PResult<'_, Expr> {
    binary_chain(
        i,
        multiplicative,
        alt((
            value(BinaryOp::Add, terminated(char('+'), not(char('+')))),
            value(BinaryOp::Sub, terminated(char('-'), not(char('-')))),
        )),
    )
}

fn relational(i: &str) -> PResult<'_, Expr> {
    binary_chain(
        i,
        additive,
        alt((
            value(BinaryOp::Le, tag("<=")),
            value(BinaryOp::Ge, tag(">=")),
            value(BinaryOp::Lt, char('<')),
            value(BinaryOp::Gt, char('>')),
        )),
    )
}

fn equality(i: &str) -> PResult<'_, Expr> {
    binary_chain(
        i,
        relational,
        alt((
            value(BinaryOp::StrictEq, tag("===")),
            value(BinaryOp::StrictNe, tag("!==")),
            value(BinaryOp::Eq, tag("==")),
            value(BinaryOp::Ne, tag("!=")),
        )),
    )
}

fn logical<'a>(
    i: &'a str,
    operand: fn(&'a str) -> PResult<'a, Expr>,
    op: LogicalOp,
    token: &'static str,
) -> PResult<'a, Expr> {
    let (i, first) = operand(i)?;
    let (i, rest) = many0(preceded(ws(tag(token)), operand))(i)?;
    let expr = rest.into_iter().fold(first, |lhs, rhs| {
        Expr::Logical(op, Box::new(lhs), Box::new(rhs))
    });
    Ok((i, expr))
}

fn logical_and(i: &str) -> PResult<'_, Expr> {
    logical(i, equality, LogicalOp::And, "&&")
}

fn logical_or(i: &str) -> PResult<'_, Expr> {
    logical(i, logical_and, LogicalOp::Or, "||")
}

pub(crate) fn expression(i: &str) -> PResult<'_, Expr> {
    let (i, test) = logical_or(i)?;
    let (i, branches) = opt(pair(
        preceded(ws(char('?')), expression),
        preceded(ws(char(':')), expression),
    ))(i)?;
    let expr = match branches {
        Some((then, otherwise)) => {
            Expr::Conditional(Box::new(test), Box::new(then), Box::new(otherwise))
        }
        None => test,
    };
    Ok((i, expr))
}

fn declaration(i: &str) -> PResult<'_, Stmt> {
    let (i, _) = ws(terminated(
        alt((tag("let"), tag("var"), tag("const"))),
        multispace1,
    ))(i)?;
    let (i, name) = identifier(i)?;
    let (i, _) = ws(char('='))(i)?;
    let (i, init) = expression(i)?;
    Ok((i, Stmt::Declare(name.to_string(), init)))
}

fn increment(i: &str) -> PResult<'_, f64> {
    alt((value(1.0, tag("++")), value(-1.0, tag("--"))))(i)
}

fn step(i: &str) -> PResult<'_, Stmt> {
    alt((
        map(pair(ws(identifier), ws(increment)), |(name, delta)| {
            Stmt::Step(name.to_string(), delta)
        }),
        map(pair(ws(increment), ws(identifier)), |(delta, name)| {
            Stmt::Step(name.to_string(), delta)
        }),
    ))(i)
}

fn assignment(i: &str) -> PResult<'_, Stmt> {
    let (i, name) = ws(identifier)(i)?;
    let (i, op) = ws(alt((
        value(AssignOp::Add, tag("+=")),
        value(AssignOp::Sub, tag("-=")),
        value(AssignOp::Mul, tag("*=")),
        value(AssignOp::Div, tag("/=")),
        value(AssignOp::Set, terminated(char('='), not(char('=')))),
    )))(i)?;
    let (i, rhs) = expression(i)?;
    Ok((i, Stmt::Assign(name.to_string(), op, rhs)))
}

fn statement(i: &str) -> PResult<'_, Stmt> {
    alt((declaration, step, assignment, map(expression, Stmt::Expr)))(i)
}

fn loop_header(i: &str) -> PResult<'_, LoopHeader> {
    let (i, init) = opt(statement)(i)?;
    let (i, _) = ws(char(';'))(i)?;
    let (i, test) = opt(expression)(i)?;
    let (i, _) = ws(char(';'))(i)?;
    let (i, step) = opt(statement)(i)?;
    let (i, _) = multispace0(i)?;
    Ok((i, LoopHeader { init, test, step }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Expr {
        parse_expression(src).unwrap()
    }

    #[test]
    fn precedence_binds_multiplication_tighter() {
        let Expr::Binary(BinaryOp::Add, _, rhs) = parse("1 + 2 * 3") else {
            panic!("expected addition at the root");
        };
        assert!(matches!(*rhs, Expr::Binary(BinaryOp::Mul, _, _)));
    }

    #[test]
    fn strict_operators_are_not_split() {
        assert!(matches!(
            parse("a === b"),
            Expr::Binary(BinaryOp::StrictEq, _, _)
        ));
        assert!(matches!(
            parse("a !== b"),
            Expr::Binary(BinaryOp::StrictNe, _, _)
        ));
        assert!(matches!(parse("a <= b"), Expr::Binary(BinaryOp::Le, _, _)));
    }

    #[test]
    fn member_index_and_call_chain() {
        let expr = parse("user.tags[0].name");
        assert_eq!(expr.label(), "user.tags[...].name");
        assert!(matches!(parse("fmt(count, 'x')"), Expr::Call(_, args) if args.len() == 2));
    }

    #[test]
    fn keywords_become_literals() {
        assert!(matches!(parse("true"), Expr::Literal(Value::Bool(true))));
        assert!(matches!(parse(" null "), Expr::Literal(Value::Null)));
        assert!(matches!(parse("nullable"), Expr::Ident(name) if name == "nullable"));
    }

    #[test]
    fn strings_support_escapes() {
        let Expr::Literal(Value::String(s)) = parse(r#""a\"b""#) else {
            panic!("expected string literal");
        };
        assert_eq!(s, "a\"b");
    }

    #[test]
    fn ternary_and_logical() {
        assert!(matches!(parse("a ? b : c"), Expr::Conditional(..)));
        assert!(matches!(
            parse("a && b || c"),
            Expr::Logical(LogicalOp::Or, _, _)
        ));
        assert!(matches!(parse("!done"), Expr::Unary(UnaryOp::Not, _)));
    }

    #[test]
    fn loop_headers() {
        let header = parse_loop_header("let i = 0; i < 3; i++").unwrap();
        assert!(matches!(header.init, Some(Stmt::Declare(ref n, _)) if n == "i"));
        assert!(header.test.is_some());
        assert!(matches!(header.step, Some(Stmt::Step(ref n, d)) if n == "i" && d == 1.0));

        let header = parse_loop_header("i = 10; i; i -= 2").unwrap();
        assert!(matches!(header.step, Some(Stmt::Assign(_, AssignOp::Sub, _))));

        let header = parse_loop_header(";;").unwrap();
        assert!(header.init.is_none() && header.test.is_none() && header.step.is_none());
    }

    #[test]
    fn syntax_errors_are_template_errors() {
        let err = parse_expression("a +").unwrap_err();
        assert!(matches!(err, Error::Template(_)));
        assert!(parse_expression("'open").is_err());
        assert!(parse_loop_header("let i = 0").is_err());
    }
}
