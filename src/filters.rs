use std::{collections::HashMap, fmt, sync::Arc};

use crate::{
    context::{Closure, Context, Thunk},
    error::{FilterFailure, InterpreterError, RegistrationError},
    expression,
    value::{IntoValue, Value},
};

/// How the dispatcher prepares the argument for one declared parameter.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// The argument is evaluated eagerly and passed as a value.
    Value,
    /// The argument must evaluate to expression text, which is parsed and
    /// passed as a [`Closure`] over the current context.
    LazyExpression,
}

/// The declared shape of a filter: its inputs (receiver first) and the
/// number of outputs it produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub inputs: Vec<ParamKind>,
    pub outputs: usize,
}

impl Signature {
    pub fn new(inputs: Vec<ParamKind>, outputs: usize) -> Self {
        Self { inputs, outputs }
    }

    fn validate(&self, name: &str) -> Result<(), RegistrationError> {
        if self.inputs.is_empty() {
            return Err(RegistrationError::NoInputs {
                name: name.to_string(),
            });
        }
        if self.outputs > 2 {
            return Err(RegistrationError::TooManyOutputs {
                name: name.to_string(),
                outputs: self.outputs,
            });
        }
        Ok(())
    }
}

/// One prepared argument.
#[derive(Debug, Clone)]
pub enum FilterArg {
    Value(Value),
    Closure(Closure),
}

impl Default for FilterArg {
    fn default() -> Self {
        FilterArg::Value(Value::Nil)
    }
}

impl FilterArg {
    fn type_name(&self) -> &'static str {
        match self {
            FilterArg::Value(value) => value.type_name(),
            FilterArg::Closure(_) => "expression",
        }
    }
}

/// Failure while calling a filter. The dispatcher attaches the filter name.
#[derive(Debug)]
pub enum CallError {
    ArgumentCount { expected: usize, given: usize },
    ArgumentType {
        position: usize,
        expected: &'static str,
        found: &'static str,
    },
    Failed(FilterFailure),
}

impl CallError {
    fn with_filter(self, filter: &str) -> InterpreterError {
        let filter = filter.to_string();
        match self {
            CallError::ArgumentCount { expected, given } => InterpreterError::ArgumentCount {
                filter,
                expected,
                given,
            },
            CallError::ArgumentType {
                position,
                expected,
                found,
            } => InterpreterError::ArgumentType {
                filter,
                position,
                expected,
                found,
            },
            CallError::Failed(source) => InterpreterError::FilterFailed { filter, source },
        }
    }
}

/// A callable registered under a filter name.
pub trait Filter: Send + Sync {
    fn signature(&self) -> &Signature;

    /// Calls the filter with its receiver and parameters, in order.
    fn call(&self, args: Vec<FilterArg>) -> Result<Value, CallError>;
}

/// A filter assembled from an explicit signature and a function over
/// prepared arguments.
pub struct DynFilter {
    signature: Signature,
    func: Box<dyn Fn(Vec<FilterArg>) -> Result<Value, CallError> + Send + Sync>,
}

impl DynFilter {
    pub fn new<F>(signature: Signature, func: F) -> Self
    where
        F: Fn(Vec<FilterArg>) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        Self {
            signature,
            func: Box::new(func),
        }
    }
}

impl fmt::Debug for DynFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynFilter")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

impl Filter for DynFilter {
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn call(&self, args: Vec<FilterArg>) -> Result<Value, CallError> {
        (self.func)(args)
    }
}

/// A filter parameter type. Conversions follow the usual template
/// coercions; `Err` carries the type name that was found instead.
pub trait FromFilterArg: Sized {
    const KIND: ParamKind = ParamKind::Value;
    const EXPECTED: &'static str;

    fn from_arg(arg: FilterArg) -> Result<Self, &'static str>;
}

fn value_arg(arg: FilterArg) -> Result<Value, &'static str> {
    match arg {
        FilterArg::Value(value) => Ok(value),
        FilterArg::Closure(_) => Err("expression"),
    }
}

impl FromFilterArg for Value {
    const EXPECTED: &'static str = "value";

    fn from_arg(arg: FilterArg) -> Result<Self, &'static str> {
        value_arg(arg)
    }
}

impl FromFilterArg for i64 {
    const EXPECTED: &'static str = "int";

    fn from_arg(arg: FilterArg) -> Result<Self, &'static str> {
        match value_arg(arg)? {
            Value::Nil => Ok(0),
            Value::Int(i) => Ok(i),
            Value::Float(x) => Ok(x as i64),
            Value::String(s) => s.trim().parse().map_err(|_| "string"),
            other => Err(other.type_name()),
        }
    }
}

impl FromFilterArg for f64 {
    const EXPECTED: &'static str = "float";

    fn from_arg(arg: FilterArg) -> Result<Self, &'static str> {
        match value_arg(arg)? {
            Value::Nil => Ok(0.0),
            Value::Int(i) => Ok(i as f64),
            Value::Float(x) => Ok(x),
            Value::String(s) => s.trim().parse().map_err(|_| "string"),
            other => Err(other.type_name()),
        }
    }
}

impl FromFilterArg for bool {
    const EXPECTED: &'static str = "bool";

    fn from_arg(arg: FilterArg) -> Result<Self, &'static str> {
        match value_arg(arg)? {
            Value::Nil => Ok(false),
            Value::Bool(b) => Ok(b),
            other => Err(other.type_name()),
        }
    }
}

impl FromFilterArg for String {
    const EXPECTED: &'static str = "string";

    fn from_arg(arg: FilterArg) -> Result<Self, &'static str> {
        match value_arg(arg)? {
            Value::Nil => Ok(String::new()),
            Value::String(s) => Ok(s),
            value @ (Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Bytes(_)) => {
                Ok(value.to_string())
            }
            other => Err(other.type_name()),
        }
    }
}

impl FromFilterArg for Vec<Value> {
    const EXPECTED: &'static str = "array";

    fn from_arg(arg: FilterArg) -> Result<Self, &'static str> {
        match value_arg(arg)? {
            Value::Nil => Ok(Vec::new()),
            Value::Array(items) => Ok(items),
            Value::Map(map) => Ok(map
                .entries()
                .into_iter()
                .map(|(k, v)| Value::Array(vec![k, v]))
                .collect()),
            other => Err(other.type_name()),
        }
    }
}

impl FromFilterArg for Closure {
    const KIND: ParamKind = ParamKind::LazyExpression;
    const EXPECTED: &'static str = "expression";

    fn from_arg(arg: FilterArg) -> Result<Self, &'static str> {
        match arg {
            FilterArg::Closure(closure) => Ok(closure),
            other => Err(other.type_name()),
        }
    }
}

/// Optional parameters; a missing or nil argument is `None`.
impl<T: FromFilterArg> FromFilterArg for Option<T> {
    const KIND: ParamKind = T::KIND;
    const EXPECTED: &'static str = T::EXPECTED;

    fn from_arg(arg: FilterArg) -> Result<Self, &'static str> {
        match arg {
            FilterArg::Value(Value::Nil) => Ok(None),
            other => T::from_arg(other).map(Some),
        }
    }
}

/// The result of a filter function: a plain value (one output) or a
/// `Result` (a value and a failure).
pub trait FilterOutput {
    const OUTPUTS: usize;

    fn into_result(self) -> Result<Value, FilterFailure>;
}

impl<T: IntoValue> FilterOutput for T {
    const OUTPUTS: usize = 1;

    fn into_result(self) -> Result<Value, FilterFailure> {
        Ok(self.into_value())
    }
}

impl<T: IntoValue, E: Into<FilterFailure>> FilterOutput for Result<T, E> {
    const OUTPUTS: usize = 2;

    fn into_result(self) -> Result<Value, FilterFailure> {
        self.map(IntoValue::into_value).map_err(Into::into)
    }
}

/// Conversion into a registrable filter. Implemented for any [`Filter`] and
/// for functions whose parameters implement [`FromFilterArg`] and whose
/// return type implements [`FilterOutput`].
pub trait IntoFilter<Args> {
    fn into_filter(self) -> Arc<dyn Filter>;
}

/// Marker for [`IntoFilter`] on types that already implement [`Filter`].
pub enum Prebuilt {}

impl<F: Filter + 'static> IntoFilter<Prebuilt> for F {
    fn into_filter(self) -> Arc<dyn Filter> {
        Arc::new(self)
    }
}

impl<F, R> IntoFilter<()> for F
where
    F: Fn() -> R + Send + Sync + 'static,
    R: FilterOutput,
{
    fn into_filter(self) -> Arc<dyn Filter> {
        let func = self;
        let signature = Signature::new(Vec::new(), R::OUTPUTS);
        Arc::new(DynFilter::new(signature, move |_| {
            func().into_result().map_err(CallError::Failed)
        }))
    }
}

macro_rules! impl_into_filter {
    ($arity:literal; $($arg:ident $val:ident $pos:literal),+) => {
        impl<F, R, $($arg,)+> IntoFilter<($($arg,)+)> for F
        where
            F: Fn($($arg),+) -> R + Send + Sync + 'static,
            R: FilterOutput,
            $($arg: FromFilterArg + 'static,)+
        {
            fn into_filter(self) -> Arc<dyn Filter> {
                let func = self;
                let signature = Signature::new(vec![$($arg::KIND),+], R::OUTPUTS);
                Arc::new(DynFilter::new(signature, move |args: Vec<FilterArg>| {
                    if args.len() > $arity {
                        return Err(CallError::ArgumentCount {
                            expected: $arity,
                            given: args.len(),
                        });
                    }
                    let mut args = args.into_iter();
                    $(
                        let $val = $arg::from_arg(args.next().unwrap_or_default()).map_err(|found| {
                            CallError::ArgumentType {
                                position: $pos,
                                expected: $arg::EXPECTED,
                                found,
                            }
                        })?;
                    )+
                    func($($val),+).into_result().map_err(CallError::Failed)
                }))
            }
        }
    };
}

impl_into_filter!(1; A0 a0 0);
impl_into_filter!(2; A0 a0 0, A1 a1 1);
impl_into_filter!(3; A0 a0 0, A1 a1 1, A2 a2 2);
impl_into_filter!(4; A0 a0 0, A1 a1 1, A2 a2 2, A3 a3 3);

/// Named filters. Populated during configuration and shared read-only by
/// every render afterwards.
#[derive(Clone, Default)]
pub struct FilterRegistry {
    filters: HashMap<String, Arc<dyn Filter>>,
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.filters.keys().collect();
        names.sort();
        f.debug_struct("FilterRegistry").field("filters", &names).finish()
    }
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `filter` under `name`, replacing any earlier filter of that
    /// name.
    ///
    /// # Errors
    /// - If the filter declares no inputs.
    /// - If the filter declares more than two outputs.
    ///
    /// In both cases the registry is left unchanged.
    pub fn add_filter<N, F, Args>(&mut self, name: N, filter: F) -> Result<&mut Self, RegistrationError>
    where
        N: Into<String>,
        F: IntoFilter<Args>,
    {
        let name = name.into();
        let filter = filter.into_filter();
        filter.signature().validate(&name)?;
        tracing::debug!(filter = %name, inputs = ?filter.signature().inputs, "registered filter");
        self.filters.insert(name, filter);
        Ok(self)
    }

    pub fn contains<N: AsRef<str>>(&self, name: N) -> bool {
        self.filters.contains_key(name.as_ref())
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Applies the filter `name`.
    ///
    /// The receiver is evaluated first, then each parameter left to right.
    /// A parameter whose declared kind is [`ParamKind::LazyExpression`] must
    /// evaluate to text; that text is parsed and passed as a [`Closure`]
    /// over `ctx` instead of a value. Byte results are returned as text.
    ///
    /// # Errors
    /// - [`InterpreterError::UndefinedFilter`] if no filter has that name.
    /// - [`InterpreterError::ExpressionText`] or [`InterpreterError::Parse`]
    ///   if a lazy parameter is not valid expression text; the filter is
    ///   not called. Such parse errors have no location of their own; an
    ///   enclosing [`Expression::Filter`](crate::expression::Expression)
    ///   places them at its object.
    /// - Any error from evaluating the receiver or parameters, from argument
    ///   coercion, or reported by the filter itself.
    pub fn apply(
        &self,
        ctx: &Context,
        name: &str,
        receiver: &dyn Thunk,
        params: &[&dyn Thunk],
    ) -> Result<Value, InterpreterError> {
        let filter = self
            .filters
            .get(name)
            .ok_or_else(|| InterpreterError::UndefinedFilter(name.to_string()))?;
        tracing::trace!(filter = name, params = params.len(), "applying filter");

        let inputs = &filter.signature().inputs;
        let mut args = Vec::with_capacity(params.len().saturating_add(1));
        args.push(FilterArg::Value(receiver.evaluate(ctx)?));
        for (position, param) in (1..).zip(params) {
            let arg = match inputs.get(position) {
                Some(ParamKind::LazyExpression) => {
                    let text = match param.evaluate(ctx)? {
                        Value::String(text) => text,
                        other => {
                            return Err(InterpreterError::ExpressionText {
                                filter: name.to_string(),
                                position,
                                found: other.type_name(),
                            });
                        }
                    };
                    let expr = expression::parse(&text)?;
                    FilterArg::Closure(Closure::new(expr, ctx.clone()))
                }
                _ => FilterArg::Value(param.evaluate(ctx)?),
            };
            args.push(arg);
        }

        let value = filter.call(args).map_err(|err| {
            let err = err.with_filter(name);
            tracing::debug!(filter = name, error = %err, "filter failed");
            err
        })?;
        Ok(value.normalize())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::ParseErrorKind;

    fn literal(value: Value) -> impl Fn(&Context) -> Result<Value, InterpreterError> {
        move |_: &Context| Ok(value.clone())
    }

    fn text(s: &str) -> Value {
        Value::String(s.to_string())
    }

    fn apply(
        registry: FilterRegistry,
        name: &str,
        receiver: Value,
        params: Vec<Value>,
    ) -> Result<Value, InterpreterError> {
        let ctx = Context::new(Arc::new(registry));
        let params: Vec<_> = params.into_iter().map(literal).collect();
        let params: Vec<&dyn Thunk> = params.iter().map(|p| p as &dyn Thunk).collect();
        ctx.apply_filter(name, &literal(receiver), &params)
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_typed_signatures() {
        let sig = |f: Arc<dyn Filter>| f.signature().clone();
        assert_eq!(
            sig((|s: String| s.len()).into_filter()),
            Signature::new(vec![ParamKind::Value], 1)
        );
        assert_eq!(
            sig((|_: Value, _: Closure| Ok::<_, InterpreterError>(Value::Nil)).into_filter()),
            Signature::new(vec![ParamKind::Value, ParamKind::LazyExpression], 2)
        );
        assert_eq!(
            sig((|_: Value, _: Option<Closure>, _: Option<i64>| ()).into_filter()),
            Signature::new(
                vec![ParamKind::Value, ParamKind::LazyExpression, ParamKind::Value],
                1
            )
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_zero_inputs_rejected() {
        let mut registry = FilterRegistry::new();
        let err = registry.add_filter("constant", || 1_i64).unwrap_err();
        assert_eq!(
            err,
            RegistrationError::NoInputs {
                name: "constant".to_string()
            }
        );
        assert!(!registry.contains("constant"));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_too_many_outputs_rejected() {
        let mut registry = FilterRegistry::new();
        let filter = DynFilter::new(Signature::new(vec![ParamKind::Value], 3), |_| Ok(Value::Nil));
        let err = registry.add_filter("triple", filter).unwrap_err();
        assert_eq!(
            err,
            RegistrationError::TooManyOutputs {
                name: "triple".to_string(),
                outputs: 3
            }
        );
        assert!(registry.is_empty());
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_undefined_filter() {
        let err = apply(FilterRegistry::new(), "missing", Value::Nil, vec![]).unwrap_err();
        assert!(matches!(err, InterpreterError::UndefinedFilter(ref name) if name == "missing"));
        assert_eq!(err.to_string(), "undefined filter: missing");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_eager_arguments_are_coerced() {
        let mut registry = FilterRegistry::new();
        registry
            .add_filter("plus", |a: i64, b: i64| a + b)
            .unwrap()
            .add_filter("append", |a: String, b: String| a + &b)
            .unwrap();

        assert_eq!(
            apply(registry.clone(), "plus", Value::Int(2), vec![text("3")]).unwrap(),
            Value::Int(5)
        );
        assert_eq!(
            apply(registry, "append", Value::Int(1), vec![Value::Float(2.5)]).unwrap(),
            text("12.5")
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_missing_arguments_default_to_nil() {
        let mut registry = FilterRegistry::new();
        registry
            .add_filter("pad", |s: String, n: i64, fill: Option<String>| {
                format!("{s}:{n}:{}", fill.unwrap_or_else(|| "-".to_string()))
            })
            .unwrap();
        assert_eq!(
            apply(registry, "pad", text("x"), vec![]).unwrap(),
            text("x:0:-")
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_too_many_arguments() {
        let mut registry = FilterRegistry::new();
        registry.add_filter("upcase", |s: String| s.to_uppercase()).unwrap();
        let err = apply(registry, "upcase", text("a"), vec![text("b")]).unwrap_err();
        assert!(matches!(
            err,
            InterpreterError::ArgumentCount { expected: 1, given: 2, .. }
        ));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_argument_type_mismatch() {
        let mut registry = FilterRegistry::new();
        registry.add_filter("double", |n: i64| n * 2).unwrap();
        let err = apply(registry, "double", Value::Array(vec![]), vec![]).unwrap_err();
        assert!(matches!(
            err,
            InterpreterError::ArgumentType { position: 0, expected: "int", found: "array", .. }
        ));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_filter_failure_propagates() {
        let mut registry = FilterRegistry::new();
        registry
            .add_filter("fail", |_: Value| Err::<Value, _>("boom"))
            .unwrap();
        let err = apply(registry, "fail", Value::Nil, vec![]).unwrap_err();
        assert_eq!(err.to_string(), "fail: boom");
        assert!(matches!(err, InterpreterError::FilterFailed { ref filter, .. } if filter == "fail"));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_bytes_result_becomes_text() {
        let mut registry = FilterRegistry::new();
        registry
            .add_filter("bytes", |s: String| s.into_bytes())
            .unwrap();
        assert_eq!(
            apply(registry, "bytes", text("hi"), vec![]).unwrap(),
            text("hi")
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_lazy_parameter_receives_closure() {
        let mut registry = FilterRegistry::new();
        registry
            .add_filter("pluck", |items: Vec<Value>, expr: Closure| {
                items
                    .into_iter()
                    .map(|item| expr.bind("it", item).evaluate())
                    .collect::<Result<Vec<_>, _>>()
            })
            .unwrap();

        let item = |n: i64| Value::map(vec![(text("n"), Value::Int(n))]);
        let result = apply(
            registry,
            "pluck",
            Value::Array(vec![item(1), item(2)]),
            vec![text("it.n")],
        )
        .unwrap();
        assert_eq!(result, Value::Array(vec![Value::Int(1), Value::Int(2)]));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_closure_sees_outer_context() {
        let mut registry = FilterRegistry::new();
        registry
            .add_filter("eval", |_: Value, expr: Closure| expr.evaluate())
            .unwrap();
        let mut ctx = Context::new(Arc::new(registry));
        ctx.insert("outer", "seen");
        let expr = literal(text("outer"));
        let value = ctx.apply_filter("eval", &literal(Value::Nil), &[&expr]).unwrap();
        assert_eq!(value, text("seen"));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_bad_lazy_parameter_skips_filter() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        let mut registry = FilterRegistry::new();
        registry
            .add_filter("lazy", |_: Value, _: Closure| {
                CALLS.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        let err = apply(registry.clone(), "lazy", Value::Nil, vec![Value::Int(3)]).unwrap_err();
        assert!(matches!(
            err,
            InterpreterError::ExpressionText { position: 1, found: "int", .. }
        ));

        let err = apply(registry, "lazy", Value::Nil, vec![text("a |")]).unwrap_err();
        assert!(matches!(
            err,
            InterpreterError::Parse(ref parse) if matches!(parse.kind, ParseErrorKind::UnexpectedEof { .. })
        ));

        assert_eq!(CALLS.load(Ordering::SeqCst), 0);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_receiver_evaluated_before_parameters() {
        let order = std::sync::Mutex::new(Vec::new());
        let record = |label: &'static str| {
            let order = &order;
            move |_: &Context| {
                order.lock().unwrap().push(label);
                Ok::<_, InterpreterError>(Value::Nil)
            }
        };

        let mut registry = FilterRegistry::new();
        registry.add_filter("three", |_: Value, _: Value, _: Value| ()).unwrap();
        let ctx = Context::new(Arc::new(registry));
        let (receiver, first, second) = (record("receiver"), record("first"), record("second"));
        ctx.apply_filter("three", &receiver, &[&first, &second]).unwrap();

        assert_eq!(*order.lock().unwrap(), ["receiver", "first", "second"]);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_undefined_filter_skips_evaluation() {
        let ctx = Context::default();
        let receiver = |_: &Context| -> Result<Value, InterpreterError> {
            panic!("receiver must not be evaluated")
        };
        let err = ctx.apply_filter("nope", &receiver, &[]).unwrap_err();
        assert!(matches!(err, InterpreterError::UndefinedFilter(_)));
    }
}
