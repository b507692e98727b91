//! Tree-walking evaluator for parsed tool code.

use futures::future::BoxFuture;

use super::ast::{Expr, Literal, Program};
use super::builtins;
use super::policy::CAPABILITY_NAMES;
use super::{ExecutionOutcome, PrintRecord};
use crate::capability::value::insert_entry;
use crate::capability::{CallArguments, CapabilityRegistry, Value};
use crate::error::ToolcodeError;

/// Evaluates one program against a registry, capturing `print` output.
pub(crate) struct Interpreter<'r> {
    registry: &'r CapabilityRegistry,
    max_output_bytes: usize,
    output_bytes: usize,
    records: Vec<PrintRecord>,
}

impl<'r> Interpreter<'r> {
    pub(crate) fn new(registry: &'r CapabilityRegistry, max_output_bytes: usize) -> Self {
        Self {
            registry,
            max_output_bytes,
            output_bytes: 0,
            records: Vec::new(),
        }
    }

    pub(crate) async fn run(mut self, program: &Program) -> Result<ExecutionOutcome, ToolcodeError> {
        for statement in &program.statements {
            self.eval(statement).await?;
        }
        Ok(ExecutionOutcome {
            records: self.records,
        })
    }

    fn eval<'s>(&'s mut self, expr: &'s Expr) -> BoxFuture<'s, Result<Value, ToolcodeError>> {
        Box::pin(async move {
            match expr {
                Expr::Literal(literal) => Ok(match literal {
                    Literal::None => Value::None,
                    Literal::Bool(b) => Value::Bool(*b),
                    Literal::Int(i) => Value::Int(*i),
                    Literal::Float(f) => Value::Float(*f),
                    Literal::Str(s) => Value::Str(s.clone()),
                }),
                Expr::Name(name) => Err(bare_name(name)),
                Expr::Attribute { attr, .. } => Err(ToolcodeError::Runtime(format!(
                    "capability.{attr} must be called, e.g. capability.{attr}(...)"
                ))),
                Expr::Neg(inner) => match self.eval(inner).await? {
                    Value::Int(i) => i.checked_neg().map(Value::Int).ok_or_else(|| {
                        ToolcodeError::Runtime("OverflowError: integer overflow".into())
                    }),
                    Value::Float(f) => Ok(Value::Float(-f)),
                    Value::Bool(b) => Ok(Value::Int(-(b as i64))),
                    other => Err(ToolcodeError::Runtime(format!(
                        "TypeError: bad operand type for unary -: '{}'",
                        other.type_name()
                    ))),
                },
                Expr::List(items) => Ok(Value::List(self.eval_all(items).await?)),
                Expr::Tuple(items) => Ok(Value::Tuple(self.eval_all(items).await?)),
                Expr::Dict(pairs) => {
                    let mut entries = Vec::with_capacity(pairs.len());
                    for (key, value) in pairs {
                        let key = self.eval(key).await?;
                        if matches!(key, Value::List(_) | Value::Dict(_)) {
                            return Err(ToolcodeError::Runtime(format!(
                                "TypeError: unhashable type: '{}'",
                                key.type_name()
                            )));
                        }
                        let value = self.eval(value).await?;
                        insert_entry(&mut entries, key, value);
                    }
                    Ok(Value::Dict(entries))
                }
                Expr::Call { func, args, kwargs } => {
                    let positional = self.eval_all(args).await?;
                    let mut named = Vec::with_capacity(kwargs.len());
                    for (name, value) in kwargs {
                        named.push((name.clone(), self.eval(value).await?));
                    }
                    self.call(func, positional, named).await
                }
            }
        })
    }

    async fn eval_all(&mut self, exprs: &[Expr]) -> Result<Vec<Value>, ToolcodeError> {
        let mut values = Vec::with_capacity(exprs.len());
        for expr in exprs {
            values.push(self.eval(expr).await?);
        }
        Ok(values)
    }

    async fn call(
        &mut self,
        func: &Expr,
        positional: Vec<Value>,
        named: Vec<(String, Value)>,
    ) -> Result<Value, ToolcodeError> {
        match func {
            Expr::Name(name) if name == "print" => {
                self.print(positional, named)?;
                Ok(Value::None)
            }
            Expr::Name(name) if builtins::is_builtin(name) => builtins::call(name, positional, named),
            Expr::Name(name) if CAPABILITY_NAMES.contains(&name.as_str()) => Err(
                ToolcodeError::Runtime(format!("TypeError: '{name}' object is not callable")),
            ),
            Expr::Name(name) => Err(not_defined(name)),
            Expr::Attribute { value, attr }
                if matches!(value.as_ref(), Expr::Name(base) if CAPABILITY_NAMES.contains(&base.as_str())) =>
            {
                self.invoke_capability(attr, CallArguments::new(positional, named))
                    .await
            }
            _ => Err(ToolcodeError::Runtime(
                "TypeError: expression is not callable".to_string(),
            )),
        }
    }

    async fn invoke_capability(
        &self,
        name: &str,
        args: CallArguments,
    ) -> Result<Value, ToolcodeError> {
        tracing::debug!(capability = name, "invoking capability");
        match self.registry.dispatch(name, args).await {
            Ok(value) => Ok(value),
            Err(err) if err.is_sandbox_failure() => Err(err),
            Err(err) => Err(ToolcodeError::Runtime(format!("{name}: {err}"))),
        }
    }

    fn print(
        &mut self,
        positional: Vec<Value>,
        named: Vec<(String, Value)>,
    ) -> Result<(), ToolcodeError> {
        let written: usize = positional
            .iter()
            .map(|v| v.to_string().len() + 1)
            .chain(named.iter().map(|(_, v)| v.to_string().len()))
            .sum();
        self.output_bytes += written.max(1);
        if self.output_bytes > self.max_output_bytes {
            return Err(ToolcodeError::OutputTooLarge {
                limit: self.max_output_bytes,
                actual: self.output_bytes,
            });
        }
        self.records.push(PrintRecord { positional, named });
        Ok(())
    }
}

fn bare_name(name: &str) -> ToolcodeError {
    if CAPABILITY_NAMES.contains(&name) {
        ToolcodeError::Runtime(format!(
            "'{name}' can only be used to call capabilities, e.g. {name}.<name>(...)"
        ))
    } else if name == "print" || builtins::is_builtin(name) {
        ToolcodeError::Runtime(format!("builtin function '{name}' must be called"))
    } else {
        not_defined(name)
    }
}

fn not_defined(name: &str) -> ToolcodeError {
    ToolcodeError::Runtime(format!("NameError: name '{name}' is not defined"))
}
