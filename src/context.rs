use std::{collections::HashMap, fmt, sync::Arc};

use crate::{
    error::InterpreterError,
    expression::Expression,
    filters::FilterRegistry,
    value::{IntoValue, Value},
};

/// Something that produces a value when evaluated against a context: a
/// filter receiver or parameter.
pub trait Thunk {
    fn evaluate(&self, ctx: &Context) -> Result<Value, InterpreterError>;
}

impl<F> Thunk for F
where
    F: Fn(&Context) -> Result<Value, InterpreterError>,
{
    fn evaluate(&self, ctx: &Context) -> Result<Value, InterpreterError> {
        self(ctx)
    }
}

/// Variable bindings plus the filters available while evaluating.
///
/// Cloning is cheap; binding a new variable produces a new context and leaves
/// the original untouched.
#[derive(Clone, Default)]
pub struct Context {
    bindings: Arc<HashMap<String, Value>>,
    filters: Arc<FilterRegistry>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("bindings", &self.bindings)
            .finish_non_exhaustive()
    }
}

impl Context {
    pub fn new(filters: Arc<FilterRegistry>) -> Self {
        Self {
            bindings: Arc::default(),
            filters,
        }
    }

    pub fn insert<N: Into<String>, V: IntoValue>(&mut self, name: N, value: V) -> &mut Self {
        Arc::make_mut(&mut self.bindings).insert(name.into(), value.into_value());
        self
    }

    pub fn get<N: AsRef<str>>(&self, name: N) -> Option<&Value> {
        self.bindings.get(name.as_ref())
    }

    pub fn contains<N: AsRef<str>>(&self, name: N) -> bool {
        self.bindings.contains_key(name.as_ref())
    }

    /// A copy of this context with one more binding.
    pub fn bind<N: Into<String>>(&self, name: N, value: Value) -> Self {
        let mut ctx = self.clone();
        ctx.insert(name, value);
        ctx
    }

    pub fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    /// Applies the filter `name` to `receiver` with `params`; see
    /// [`FilterRegistry::apply`].
    pub fn apply_filter(
        &self,
        name: &str,
        receiver: &dyn Thunk,
        params: &[&dyn Thunk],
    ) -> Result<Value, InterpreterError> {
        self.filters.apply(self, name, receiver, params)
    }
}

/// An expression captured together with the context it was written in, so a
/// filter can evaluate it later, typically once per element.
#[derive(Debug, Clone)]
pub struct Closure {
    expr: Expression,
    ctx: Context,
}

impl Closure {
    pub fn new(expr: Expression, ctx: Context) -> Self {
        Self { expr, ctx }
    }

    pub fn expression(&self) -> &Expression {
        &self.expr
    }

    /// A closure over the same expression with `name` bound to `value`.
    pub fn bind<N: Into<String>>(&self, name: N, value: Value) -> Self {
        Self {
            expr: self.expr.clone(),
            ctx: self.ctx.bind(name, value),
        }
    }

    pub fn evaluate(&self) -> Result<Value, InterpreterError> {
        self.expr.evaluate(&self.ctx)
    }
}
