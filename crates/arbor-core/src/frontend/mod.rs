// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Frontend functions: author-supplied expressions compiled into callables.
//!
//! Sources are parsed once into a syntax tree and evaluated by a sandboxed
//! interpreter. Evaluation sees only its arguments and a fixed set of
//! builtins (`Math`, `String`, `Number`, `Boolean`, `Array.isArray`); there is
//! no access to the host, the tree, or other dependencies.

mod ast;
mod eval;
mod lexer;
mod parser;
mod value;

use ast::Expr;
use eval::{Env, Interpreter};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use value::Val;

/// Malformed frontend-function source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("compile error at byte {offset}: {message}")]
pub struct CompileError {
    /// Byte offset into the source where the problem was detected.
    pub offset: usize,
    /// Human-readable description.
    pub message: String,
}

impl CompileError {
    pub(crate) fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

/// Failure raised while a compiled function runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// An identifier was not bound in scope or among builtins.
    #[error("reference error: {0}")]
    Reference(String),
    /// An operation was applied to a value of the wrong kind.
    #[error("type error: {0}")]
    Type(String),
    /// The expression executed `throw`.
    #[error("uncaught: {0}")]
    Thrown(Value),
}

/// A compiled frontend function.
///
/// Cheap to clone; the syntax tree is shared.
#[derive(Debug, Clone)]
pub struct FrontendFn {
    program: Arc<Expr>,
    wrap_single: bool,
}

impl FrontendFn {
    /// Applies the compiled expression to `args` as `(expr)(...args)`.
    ///
    /// The result is wrapped in a one-element array when the dependency's
    /// arity calls for it and the raw result is not already an array.
    pub async fn call(&self, args: Vec<Value>) -> Result<Value, EvalError> {
        let args: Vec<Val> = args.iter().map(Val::from_json).collect();
        let mut interpreter = Interpreter::default();
        let env = Env::default();
        let callee = interpreter.eval(&self.program, &env)?;
        let result = interpreter.call(&callee, args, "frontend function")?;
        let result = result.into_json();
        if self.wrap_single && !result.is_array() {
            Ok(Value::Array(vec![result]))
        } else {
            Ok(result)
        }
    }

    /// Whether results are wrapped into a single-element array.
    pub fn wraps_single(&self) -> bool {
        self.wrap_single
    }
}

/// Compiles `source`, surfacing malformed input as an error.
///
/// Returns `Ok(None)` when `source` is absent or blank.
pub fn try_compile(
    source: Option<&str>,
    has_backend_fn: bool,
    input_count: usize,
    output_count: usize,
) -> Result<Option<FrontendFn>, CompileError> {
    let Some(source) = source.filter(|s| !s.trim().is_empty()) else {
        return Ok(None);
    };
    let tokens = lexer::lex(source)?;
    let program = parser::parse_program(tokens)?;
    let wrap_single = if has_backend_fn {
        input_count == 1
    } else {
        output_count == 1
    };
    Ok(Some(FrontendFn {
        program: Arc::new(program),
        wrap_single,
    }))
}

/// Compiles `source`; malformed input is logged and yields `None`.
pub fn compile(
    source: Option<&str>,
    has_backend_fn: bool,
    input_count: usize,
    output_count: usize,
) -> Option<FrontendFn> {
    match try_compile(source, has_backend_fn, input_count, output_count) {
        Ok(compiled) => compiled,
        Err(err) => {
            tracing::warn!(error = %err, "frontend function failed to compile");
            None
        }
    }
}
