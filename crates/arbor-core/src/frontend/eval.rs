// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Tree-walking evaluator for frontend expressions.

use super::ast::{ArrowFn, BinaryOp, Element, Expr, FnBody, LogicalOp, Stmt, UnaryOp};
use super::value::{number_to_string, Builtin, Closure, Val};
use super::EvalError;
use std::sync::Arc;

const MAX_CALL_DEPTH: usize = 64;
/// Expression nesting across all active calls.
const MAX_EVAL_DEPTH: usize = 256;

/// Immutable lexical environment; each binding extends its parent.
#[derive(Debug, Clone, Default)]
pub(crate) struct Env(Option<Arc<Binding>>);

#[derive(Debug)]
pub(crate) struct Binding {
    name: String,
    value: Val,
    parent: Env,
}

impl Env {
    pub fn bind(&self, name: impl Into<String>, value: Val) -> Self {
        Self(Some(Arc::new(Binding {
            name: name.into(),
            value,
            parent: self.clone(),
        })))
    }

    fn lookup(&self, name: &str) -> Option<Val> {
        let mut cursor = self.0.as_ref();
        while let Some(binding) = cursor {
            if binding.name == name {
                return Some(binding.value.clone());
            }
            cursor = binding.parent.0.as_ref();
        }
        None
    }
}

fn global(name: &str) -> Option<Val> {
    let math = |fields: &[(&str, Builtin)]| {
        Val::Object(
            fields
                .iter()
                .map(|(k, b)| ((*k).to_owned(), Val::Builtin(*b)))
                .collect(),
        )
    };
    Some(match name {
        "Math" => math(&[
            ("max", Builtin::MathMax),
            ("min", Builtin::MathMin),
            ("abs", Builtin::MathAbs),
            ("floor", Builtin::MathFloor),
            ("ceil", Builtin::MathCeil),
            ("round", Builtin::MathRound),
        ]),
        "Array" => math(&[("isArray", Builtin::IsArray)]),
        "String" => Val::Builtin(Builtin::ToString),
        "Number" => Val::Builtin(Builtin::ToNumber),
        "Boolean" => Val::Builtin(Builtin::ToBoolean),
        "NaN" => Val::Num(f64::NAN),
        "Infinity" => Val::Num(f64::INFINITY),
        _ => return None,
    })
}

enum Flow {
    Normal,
    Return(Val),
}

#[derive(Default)]
pub(crate) struct Interpreter {
    depth: usize,
    nesting: usize,
}

impl Interpreter {
    pub fn eval(&mut self, expr: &Expr, env: &Env) -> Result<Val, EvalError> {
        if self.nesting >= MAX_EVAL_DEPTH {
            return Err(EvalError::Type("maximum evaluation depth exceeded".into()));
        }
        self.nesting += 1;
        let result = self.eval_expr(expr, env);
        self.nesting -= 1;
        result
    }

    fn eval_expr(&mut self, expr: &Expr, env: &Env) -> Result<Val, EvalError> {
        match expr {
            Expr::Number(n) => Ok(Val::Num(*n)),
            Expr::Str(s) => Ok(Val::Str(s.clone())),
            Expr::Bool(b) => Ok(Val::Bool(*b)),
            Expr::Null => Ok(Val::Null),
            Expr::Undefined => Ok(Val::Undefined),
            Expr::Ident(name) => env
                .lookup(name)
                .or_else(|| global(name))
                .ok_or_else(|| EvalError::Reference(format!("{name} is not defined"))),
            Expr::Array(elements) => Ok(Val::Array(self.eval_elements(elements, env)?)),
            Expr::Object(fields) => {
                let mut out = Vec::with_capacity(fields.len());
                for (key, value) in fields {
                    out.push((key.clone(), self.eval(value, env)?));
                }
                Ok(Val::Object(out))
            }
            Expr::Arrow(func) => Ok(Val::Closure(Arc::new(Closure {
                func: Arc::clone(func),
                env: env.clone(),
            }))),
            Expr::Unary(op, operand) => {
                let v = self.eval(operand, env)?;
                Ok(match op {
                    UnaryOp::Not => Val::Bool(!v.truthy()),
                    UnaryOp::Neg => Val::Num(-v.to_number()),
                    UnaryOp::Plus => Val::Num(v.to_number()),
                    UnaryOp::Await => v,
                    UnaryOp::TypeOf => Val::Str(v.type_name().to_owned()),
                })
            }
            Expr::Binary(op, left, right) => {
                let l = self.eval(left, env)?;
                let r = self.eval(right, env)?;
                Ok(binary(*op, &l, &r))
            }
            Expr::Logical(op, left, right) => {
                let l = self.eval(left, env)?;
                let short = match op {
                    LogicalOp::And => !l.truthy(),
                    LogicalOp::Or => l.truthy(),
                    LogicalOp::Nullish => !l.is_nullish(),
                };
                if short {
                    Ok(l)
                } else {
                    self.eval(right, env)
                }
            }
            Expr::Conditional(cond, then, otherwise) => {
                if self.eval(cond, env)?.truthy() {
                    self.eval(then, env)
                } else {
                    self.eval(otherwise, env)
                }
            }
            Expr::Member(object, name) => {
                let target = self.eval(object, env)?;
                property(&target, name)
            }
            Expr::Index(object, index) => {
                let target = self.eval(object, env)?;
                let key = match self.eval(index, env)? {
                    Val::Num(n) => number_to_string(n),
                    other => other.to_display(),
                };
                property(&target, &key)
            }
            Expr::Call(callee, args) => {
                if let Expr::Member(object, name) = callee.as_ref() {
                    let receiver = self.eval(object, env)?;
                    if receiver.is_nullish() {
                        return property(&receiver, name);
                    }
                    let args = self.eval_elements(args, env)?;
                    if let Some(result) = self.call_method(&receiver, name, &args)? {
                        return Ok(result);
                    }
                    let func = property(&receiver, name)?;
                    return self.call(&func, args, name);
                }
                let func = self.eval(callee, env)?;
                let args = self.eval_elements(args, env)?;
                let label = match callee.as_ref() {
                    Expr::Ident(name) => name.as_str(),
                    _ => "expression",
                };
                self.call(&func, args, label)
            }
        }
    }

    fn eval_elements(&mut self, elements: &[Element], env: &Env) -> Result<Vec<Val>, EvalError> {
        let mut out = Vec::with_capacity(elements.len());
        for element in elements {
            match element {
                Element::Item(expr) => out.push(self.eval(expr, env)?),
                Element::Spread(expr) => match self.eval(expr, env)? {
                    Val::Array(items) => out.extend(items),
                    Val::Str(s) => out.extend(s.chars().map(|c| Val::Str(c.to_string()))),
                    other => {
                        return Err(EvalError::Type(format!(
                            "{} is not iterable",
                            other.type_name()
                        )))
                    }
                },
            }
        }
        Ok(out)
    }

    pub fn call(&mut self, func: &Val, args: Vec<Val>, label: &str) -> Result<Val, EvalError> {
        match func {
            Val::Closure(closure) => {
                if self.depth >= MAX_CALL_DEPTH {
                    return Err(EvalError::Type("maximum call depth exceeded".into()));
                }
                self.depth += 1;
                let result = self.invoke(&closure.func, &closure.env, args);
                self.depth -= 1;
                result
            }
            Val::Builtin(builtin) => Ok(call_builtin(*builtin, &args)),
            _ => Err(EvalError::Type(format!("{label} is not a function"))),
        }
    }

    fn invoke(&mut self, func: &ArrowFn, env: &Env, args: Vec<Val>) -> Result<Val, EvalError> {
        let mut scope = env.clone();
        let mut args = args.into_iter();
        for param in &func.params {
            scope = scope.bind(param.clone(), args.next().unwrap_or(Val::Undefined));
        }
        if let Some(rest) = &func.rest {
            scope = scope.bind(rest.clone(), Val::Array(args.collect()));
        }
        match &func.body {
            FnBody::Expr(expr) => self.eval(expr, &scope),
            FnBody::Block(stmts) => match self.exec_block(stmts, &scope)? {
                Flow::Return(v) => Ok(v),
                Flow::Normal => Ok(Val::Undefined),
            },
        }
    }

    fn exec_block(&mut self, stmts: &[Stmt], env: &Env) -> Result<Flow, EvalError> {
        let mut scope = env.clone();
        for stmt in stmts {
            match stmt {
                Stmt::Let(name, expr) => {
                    let value = self.eval(expr, &scope)?;
                    scope = scope.bind(name.clone(), value);
                }
                Stmt::Return(expr) => {
                    let value = match expr {
                        Some(expr) => self.eval(expr, &scope)?,
                        None => Val::Undefined,
                    };
                    return Ok(Flow::Return(value));
                }
                Stmt::Throw(expr) => {
                    return Err(EvalError::Thrown(self.eval(expr, &scope)?.into_json()));
                }
                Stmt::If(cond, then, otherwise) => {
                    let branch = if self.eval(cond, &scope)?.truthy() {
                        Some(then)
                    } else {
                        otherwise.as_ref()
                    };
                    if let Some(branch) = branch {
                        if let Flow::Return(v) = self.exec_block(branch, &scope)? {
                            return Ok(Flow::Return(v));
                        }
                    }
                }
                Stmt::Expr(expr) => {
                    self.eval(expr, &scope)?;
                }
            }
        }
        Ok(Flow::Normal)
    }

    /// Built-in string/array/number methods. `None` when `name` is not one.
    #[allow(clippy::cast_sign_loss)]
    fn call_method(
        &mut self,
        receiver: &Val,
        name: &str,
        args: &[Val],
    ) -> Result<Option<Val>, EvalError> {
        let arg = |i: usize| args.get(i).cloned().unwrap_or(Val::Undefined);
        let result = match (receiver, name) {
            (Val::Str(s), "toUpperCase") => Val::Str(s.to_uppercase()),
            (Val::Str(s), "toLowerCase") => Val::Str(s.to_lowercase()),
            (Val::Str(s), "trim") => Val::Str(s.trim().to_owned()),
            (Val::Str(s), "includes") => Val::Bool(s.contains(&arg(0).to_display())),
            (Val::Str(s), "startsWith") => Val::Bool(s.starts_with(&arg(0).to_display())),
            (Val::Str(s), "endsWith") => Val::Bool(s.ends_with(&arg(0).to_display())),
            (Val::Str(s), "slice") => {
                let chars: Vec<char> = s.chars().collect();
                let (start, end) = slice_bounds(chars.len(), &arg(0), &arg(1));
                Val::Str(chars[start..end].iter().collect())
            }
            (Val::Str(s), "split") => {
                let sep = arg(0);
                let parts: Vec<Val> = match &sep {
                    Val::Undefined => vec![Val::Str(s.clone())],
                    _ => {
                        let sep = sep.to_display();
                        if sep.is_empty() {
                            s.chars().map(|c| Val::Str(c.to_string())).collect()
                        } else {
                            s.split(sep.as_str()).map(|p| Val::Str(p.to_owned())).collect()
                        }
                    }
                };
                Val::Array(parts)
            }
            (Val::Str(s), "concat") => {
                let mut out = s.clone();
                for a in args {
                    out.push_str(&a.to_display());
                }
                Val::Str(out)
            }
            (Val::Array(items), "join") => {
                let sep = match arg(0) {
                    Val::Undefined => ",".to_owned(),
                    other => other.to_display(),
                };
                Val::Str(
                    items
                        .iter()
                        .map(|v| if v.is_nullish() { String::new() } else { v.to_display() })
                        .collect::<Vec<_>>()
                        .join(&sep),
                )
            }
            (Val::Array(items), "includes") => {
                let needle = arg(0);
                Val::Bool(items.iter().any(|v| same_value_zero(v, &needle)))
            }
            (Val::Array(items), "indexOf") => {
                let needle = arg(0);
                Val::Num(
                    items
                        .iter()
                        .position(|v| v.strict_eq(&needle))
                        .map_or(-1.0, |i| i as f64),
                )
            }
            (Val::Array(items), "slice") => {
                let (start, end) = slice_bounds(items.len(), &arg(0), &arg(1));
                Val::Array(items[start..end].to_vec())
            }
            (Val::Array(items), "concat") => {
                let mut out = items.clone();
                for a in args {
                    match a {
                        Val::Array(more) => out.extend(more.iter().cloned()),
                        other => out.push(other.clone()),
                    }
                }
                Val::Array(out)
            }
            (Val::Array(items), "map" | "filter" | "find" | "some" | "every") => {
                let callback = arg(0);
                return self.iterate(items, name, &callback).map(Some);
            }
            (Val::Num(n), "toFixed") => {
                let digits = arg(0).to_number();
                let digits = if digits.is_nan() { 0 } else { digits.clamp(0.0, 20.0) as usize };
                Val::Str(format!("{n:.digits$}"))
            }
            (_, "toString") if !matches!(receiver, Val::Object(_)) => {
                Val::Str(receiver.to_display())
            }
            _ => return Ok(None),
        };
        Ok(Some(result))
    }

    fn iterate(&mut self, items: &[Val], name: &str, callback: &Val) -> Result<Val, EvalError> {
        let mut mapped = Vec::new();
        for (i, item) in items.iter().enumerate() {
            let out = self.call(callback, vec![item.clone(), Val::Num(i as f64)], "callback")?;
            match name {
                "map" => mapped.push(out),
                "filter" if out.truthy() => mapped.push(item.clone()),
                "find" if out.truthy() => return Ok(item.clone()),
                "some" if out.truthy() => return Ok(Val::Bool(true)),
                "every" if !out.truthy() => return Ok(Val::Bool(false)),
                _ => {}
            }
        }
        Ok(match name {
            "find" => Val::Undefined,
            "some" => Val::Bool(false),
            "every" => Val::Bool(true),
            _ => Val::Array(mapped),
        })
    }
}

fn property(target: &Val, name: &str) -> Result<Val, EvalError> {
    if target.is_nullish() {
        return Err(EvalError::Type(format!(
            "cannot read properties of {} (reading '{name}')",
            target.to_display()
        )));
    }
    Ok(target.get_property(name))
}

fn binary(op: BinaryOp, l: &Val, r: &Val) -> Val {
    let stringy = |v: &Val| matches!(v, Val::Str(_) | Val::Array(_) | Val::Object(_));
    match op {
        BinaryOp::Add if stringy(l) || stringy(r) => {
            Val::Str(format!("{}{}", l.to_display(), r.to_display()))
        }
        BinaryOp::Add => Val::Num(l.to_number() + r.to_number()),
        BinaryOp::Sub => Val::Num(l.to_number() - r.to_number()),
        BinaryOp::Mul => Val::Num(l.to_number() * r.to_number()),
        BinaryOp::Div => Val::Num(l.to_number() / r.to_number()),
        BinaryOp::Rem => Val::Num(l.to_number() % r.to_number()),
        BinaryOp::LooseEq => Val::Bool(l.loose_eq(r)),
        BinaryOp::LooseNe => Val::Bool(!l.loose_eq(r)),
        BinaryOp::StrictEq => Val::Bool(l.strict_eq(r)),
        BinaryOp::StrictNe => Val::Bool(!l.strict_eq(r)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (l, r) {
                (Val::Str(a), Val::Str(b)) => Some(a.cmp(b)),
                _ => l.to_number().partial_cmp(&r.to_number()),
            };
            Val::Bool(ordering.is_some_and(|o| match op {
                BinaryOp::Lt => o.is_lt(),
                BinaryOp::Le => o.is_le(),
                BinaryOp::Gt => o.is_gt(),
                _ => o.is_ge(),
            }))
        }
    }
}

fn call_builtin(builtin: Builtin, args: &[Val]) -> Val {
    let first = args.first().cloned().unwrap_or(Val::Undefined);
    let nums = || args.iter().map(Val::to_number);
    match builtin {
        Builtin::MathMax => Val::Num(nums().fold(f64::NEG_INFINITY, |acc, n| {
            if acc.is_nan() || n.is_nan() {
                f64::NAN
            } else {
                acc.max(n)
            }
        })),
        Builtin::MathMin => Val::Num(nums().fold(f64::INFINITY, |acc, n| {
            if acc.is_nan() || n.is_nan() {
                f64::NAN
            } else {
                acc.min(n)
            }
        })),
        Builtin::MathAbs => Val::Num(first.to_number().abs()),
        Builtin::MathFloor => Val::Num(first.to_number().floor()),
        Builtin::MathCeil => Val::Num(first.to_number().ceil()),
        Builtin::MathRound => Val::Num((first.to_number() + 0.5).floor()),
        Builtin::ToString => {
            if args.is_empty() {
                Val::Str(String::new())
            } else {
                Val::Str(first.to_display())
            }
        }
        Builtin::ToNumber => {
            if args.is_empty() {
                Val::Num(0.0)
            } else {
                Val::Num(first.to_number())
            }
        }
        Builtin::ToBoolean => Val::Bool(first.truthy()),
        Builtin::IsArray => Val::Bool(matches!(first, Val::Array(_))),
    }
}

fn same_value_zero(a: &Val, b: &Val) -> bool {
    match (a, b) {
        (Val::Num(x), Val::Num(y)) if x.is_nan() && y.is_nan() => true,
        _ => a.strict_eq(b),
    }
}

#[allow(clippy::cast_sign_loss)]
fn slice_bounds(len: usize, start: &Val, end: &Val) -> (usize, usize) {
    let resolve = |v: &Val, default: usize| -> usize {
        if matches!(v, Val::Undefined) {
            return default;
        }
        let n = v.to_number();
        if n.is_nan() {
            0
        } else if n < 0.0 {
            (len as f64 + n.trunc()).max(0.0) as usize
        } else {
            (n.trunc() as usize).min(len)
        }
    };
    let start = resolve(start, 0);
    let end = resolve(end, len);
    (start, end.max(start))
}
