//! Tree-walking evaluator for parsed templates.
//!
//! Expressions see only the component's fields plus the names bound by
//! enclosing `{#for}` headers and `{#each}` blocks.

use std::cmp::Ordering;

use super::ast::{AssignOp, BinaryOp, Expr, LogicalOp, LoopHeader, Segment, Stmt, UnaryOp};
use crate::component::Fields;
use crate::error::{Error, Result};
use crate::options::Options;
use crate::value::Value;

pub(crate) struct Scope<'a> {
    fields: &'a Fields,
    options: &'a Options,
    frames: Vec<Vec<(String, Value)>>,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(fields: &'a Fields, options: &'a Options) -> Self {
        Self {
            fields,
            options,
            frames: vec![Vec::new()],
        }
    }

    fn lookup(&self, name: &str) -> Result<Value> {
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .find(|(bound, _)| bound == name)
            .map(|(_, v)| v.clone())
            .or_else(|| self.fields.get(name).cloned())
            .ok_or_else(|| Error::template(format!("{name} is not defined")))
    }

    fn declare(&mut self, name: &str, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.push((name.to_string(), value));
        }
    }

    /// Writes to the innermost binding. Fields are never mutated: assigning
    /// to one shadows it for the rest of the render.
    fn assign(&mut self, name: &str, value: Value) -> Result<()> {
        let slot = self
            .frames
            .iter_mut()
            .rev()
            .flat_map(|frame| frame.iter_mut().rev())
            .find(|(bound, _)| bound == name);
        match slot {
            Some((_, v)) => *v = value,
            None if self.fields.get(name).is_some() => {
                self.frames[0].push((name.to_string(), value));
            }
            None => return Err(Error::template(format!("{name} is not defined"))),
        }
        Ok(())
    }

    pub(crate) fn eval(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Ident(name) => self.lookup(name),
            Expr::Array(items) => {
                let values = items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::array(values))
            }
            Expr::Member(object, prop) => property(&self.eval(object)?, prop),
            Expr::Index(object, key) => {
                let object = self.eval(object)?;
                property(&object, &self.eval(key)?.to_string())
            }
            Expr::Call(callee, args) => {
                let Value::Function(f) = self.eval(callee)? else {
                    return Err(Error::template(format!(
                        "{} is not a function",
                        callee.label()
                    )));
                };
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>>>()?;
                Ok(f.call(&args))
            }
            Expr::Unary(op, operand) => {
                let v = self.eval(operand)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!v.truthy()),
                    UnaryOp::Neg => Value::Number(-v.to_number()),
                    UnaryOp::Plus => Value::Number(v.to_number()),
                })
            }
            Expr::Binary(op, lhs, rhs) => {
                let (a, b) = (self.eval(lhs)?, self.eval(rhs)?);
                Ok(binary(*op, &a, &b))
            }
            Expr::Logical(op, lhs, rhs) => {
                let a = self.eval(lhs)?;
                match (op, a.truthy()) {
                    (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(a),
                    _ => self.eval(rhs),
                }
            }
            Expr::Conditional(test, then, otherwise) => {
                if self.eval(test)?.truthy() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
        }
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Declare(name, init) => {
                let v = self.eval(init)?;
                self.declare(name, v);
            }
            Stmt::Assign(name, op, rhs) => {
                let rhs = self.eval(rhs)?;
                let v = match op {
                    AssignOp::Set => rhs,
                    AssignOp::Add => self.lookup(name)?.add(&rhs),
                    AssignOp::Sub => binary(BinaryOp::Sub, &self.lookup(name)?, &rhs),
                    AssignOp::Mul => binary(BinaryOp::Mul, &self.lookup(name)?, &rhs),
                    AssignOp::Div => binary(BinaryOp::Div, &self.lookup(name)?, &rhs),
                };
                self.assign(name, v)?;
            }
            Stmt::Step(name, delta) => {
                let v = self.lookup(name)?.to_number() + delta;
                self.assign(name, Value::Number(v))?;
            }
            Stmt::Expr(expr) => {
                self.eval(expr)?;
            }
        }
        Ok(())
    }

    pub(crate) fn render(&mut self, segments: &[Segment], out: &mut String) -> Result<()> {
        for segment in segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Escaped(expr) => {
                    out.push_str(&(self.options.escape)(&self.eval(expr)?, true));
                }
                Segment::Raw(expr) => {
                    out.push_str(&(self.options.escape)(&self.eval(expr)?, false));
                }
                Segment::If { branches, otherwise } => {
                    let mut taken = None;
                    for (test, body) in branches {
                        if self.eval(test)?.truthy() {
                            taken = Some(body);
                            break;
                        }
                    }
                    if let Some(body) = taken.or(otherwise.as_ref()) {
                        self.render(body, out)?;
                    }
                }
                Segment::For { header, body } => {
                    self.frames.push(Vec::new());
                    let result = self.run_loop(header, body, out);
                    self.frames.pop();
                    result?;
                }
                Segment::Each {
                    collection,
                    bindings,
                    body,
                } => {
                    let target = self.eval(collection)?;
                    let items = match &target {
                        Value::Array(items) => items.borrow().clone(),
                        v if v.is_nullish() => {
                            return Err(Error::template(format!(
                                "Cannot read properties of {v} (reading 'forEach')"
                            )));
                        }
                        _ => {
                            return Err(Error::template(format!(
                                "{}.forEach is not a function",
                                collection.label()
                            )));
                        }
                    };
                    for (index, item) in items.into_iter().enumerate() {
                        let values = [item, Value::from(index), target.clone()];
                        self.frames
                            .push(bindings.iter().cloned().zip(values).collect());
                        let result = self.render(body, out);
                        self.frames.pop();
                        result?;
                    }
                }
            }
        }
        Ok(())
    }

    fn run_loop(&mut self, header: &LoopHeader, body: &[Segment], out: &mut String) -> Result<()> {
        if let Some(init) = &header.init {
            self.exec(init)?;
        }
        let limit = self.options.max_loop_iterations;
        let mut iterations = 0usize;
        loop {
            if let Some(test) = &header.test
                && !self.eval(test)?.truthy()
            {
                return Ok(());
            }
            iterations += 1;
            if iterations > limit {
                return Err(Error::template(format!(
                    "{{#for}} loop exceeded {limit} iterations"
                )));
            }
            self.render(body, out)?;
            if let Some(step) = &header.step {
                self.exec(step)?;
            }
        }
    }
}

fn property(object: &Value, key: &str) -> Result<Value> {
    Ok(match object {
        Value::Undefined | Value::Null => {
            return Err(Error::template(format!(
                "Cannot read properties of {object} (reading '{key}')"
            )));
        }
        Value::Array(items) => {
            let items = items.borrow();
            match key {
                "length" => Value::from(items.len()),
                _ => key
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| items.get(i).cloned())
                    .unwrap_or_default(),
            }
        }
        Value::String(s) => match key {
            "length" => Value::from(s.encode_utf16().count()),
            _ => key
                .parse::<usize>()
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::String(c.to_string()))
                .unwrap_or_default(),
        },
        Value::Object(map) => map.borrow().get(key).cloned().unwrap_or_default(),
        _ => Value::Undefined,
    })
}

fn binary(op: BinaryOp, a: &Value, b: &Value) -> Value {
    let ordering = || a.compare(b);
    match op {
        BinaryOp::Add => a.add(b),
        BinaryOp::Sub => Value::Number(a.to_number() - b.to_number()),
        BinaryOp::Mul => Value::Number(a.to_number() * b.to_number()),
        BinaryOp::Div => Value::Number(a.to_number() / b.to_number()),
        BinaryOp::Rem => Value::Number(a.to_number() % b.to_number()),
        BinaryOp::Lt => Value::Bool(ordering() == Some(Ordering::Less)),
        BinaryOp::Le => Value::Bool(matches!(ordering(), Some(Ordering::Less | Ordering::Equal))),
        BinaryOp::Gt => Value::Bool(ordering() == Some(Ordering::Greater)),
        BinaryOp::Ge => Value::Bool(matches!(
            ordering(),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOp::Eq => Value::Bool(a.loose_eq(b)),
        BinaryOp::Ne => Value::Bool(!a.loose_eq(b)),
        BinaryOp::StrictEq => Value::Bool(a.strict_eq(b)),
        BinaryOp::StrictNe => Value::Bool(!a.strict_eq(b)),
    }
}
