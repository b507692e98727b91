//! Pure builtin functions available to tool code.

use std::cmp::Ordering;

use crate::capability::value::insert_entry;
use crate::capability::Value;
use crate::error::ToolcodeError;

/// Upper bound on the number of items `range()` may produce.
pub const MAX_RANGE_ITEMS: usize = 10_000;

/// Builtin names callable from tool code. `print` is handled by the
/// interpreter because it writes to the capture buffer.
pub const BUILTIN_NAMES: &[&str] = &[
    "len", "str", "int", "float", "bool", "list", "dict", "tuple", "range", "enumerate", "zip",
    "sum", "min", "max", "abs", "round", "sorted", "reversed", "repr",
];

pub fn is_builtin(name: &str) -> bool {
    BUILTIN_NAMES.contains(&name)
}

fn type_error(message: impl Into<String>) -> ToolcodeError {
    ToolcodeError::Runtime(format!("TypeError: {}", message.into()))
}

fn value_error(message: impl Into<String>) -> ToolcodeError {
    ToolcodeError::Runtime(format!("ValueError: {}", message.into()))
}

/// Invoke builtin `name`.
pub fn call(
    name: &str,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
) -> Result<Value, ToolcodeError> {
    if name != "dict" && name != "sum" && name != "round" && name != "sorted" {
        if let Some((key, _)) = kwargs.first() {
            return Err(type_error(format!(
                "{name}() got an unexpected keyword argument '{key}'"
            )));
        }
    }
    match name {
        "len" => {
            let [value] = exactly::<1>(name, args)?;
            let len = match &value {
                Value::Str(s) => s.chars().count(),
                Value::List(items) | Value::Tuple(items) => items.len(),
                Value::Dict(entries) => entries.len(),
                other => {
                    return Err(type_error(format!(
                        "object of type '{}' has no len()",
                        other.type_name()
                    )))
                }
            };
            Ok(Value::Int(len as i64))
        }
        "str" => match at_most::<1>(name, args)? {
            None => Ok(Value::Str(String::new())),
            Some(value) => Ok(Value::Str(value.to_string())),
        },
        "repr" => {
            let [value] = exactly::<1>(name, args)?;
            Ok(Value::Str(value.repr()))
        }
        "int" => match at_most::<1>(name, args)? {
            None => Ok(Value::Int(0)),
            Some(value) => to_int(value),
        },
        "float" => match at_most::<1>(name, args)? {
            None => Ok(Value::Float(0.0)),
            Some(value) => to_float(value),
        },
        "bool" => Ok(Value::Bool(
            at_most::<1>(name, args)?.is_some_and(|v| v.is_truthy()),
        )),
        "list" => match at_most::<1>(name, args)? {
            None => Ok(Value::List(Vec::new())),
            Some(value) => Ok(Value::List(iterate(value)?)),
        },
        "tuple" => match at_most::<1>(name, args)? {
            None => Ok(Value::Tuple(Vec::new())),
            Some(value) => Ok(Value::Tuple(iterate(value)?)),
        },
        "dict" => build_dict(args, kwargs),
        "range" => range(args),
        "enumerate" => {
            let [value] = exactly::<1>(name, args)?;
            Ok(Value::List(
                iterate(value)?
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| Value::Tuple(vec![Value::Int(i as i64), v]))
                    .collect(),
            ))
        }
        "zip" => {
            let columns = args
                .into_iter()
                .map(iterate)
                .collect::<Result<Vec<_>, _>>()?;
            let len = columns.iter().map(Vec::len).min().unwrap_or(0);
            Ok(Value::List(
                (0..len)
                    .map(|i| Value::Tuple(columns.iter().map(|c| c[i].clone()).collect()))
                    .collect(),
            ))
        }
        "sum" => sum(args, kwargs),
        "min" => extreme(name, args, Ordering::Less),
        "max" => extreme(name, args, Ordering::Greater),
        "abs" => {
            let [value] = exactly::<1>(name, args)?;
            match value {
                Value::Int(i) => i
                    .checked_abs()
                    .map(Value::Int)
                    .ok_or_else(|| ToolcodeError::Runtime("OverflowError: integer overflow".into())),
                Value::Float(f) => Ok(Value::Float(f.abs())),
                Value::Bool(b) => Ok(Value::Int(b as i64)),
                other => Err(type_error(format!(
                    "bad operand type for abs(): '{}'",
                    other.type_name()
                ))),
            }
        }
        "round" => round(args, kwargs),
        "sorted" => {
            let [value] = exactly::<1>(name, args)?;
            let mut items = iterate(value)?;
            let mut failure = None;
            items.sort_by(|a, b| {
                compare(a, b).unwrap_or_else(|e| {
                    failure.get_or_insert(e);
                    Ordering::Equal
                })
            });
            if let Some(err) = failure {
                return Err(err);
            }
            let reverse = kwargs
                .iter()
                .find(|(k, _)| k == "reverse")
                .is_some_and(|(_, v)| v.is_truthy());
            if let Some((key, _)) = kwargs.iter().find(|(k, _)| k != "reverse") {
                return Err(type_error(format!(
                    "sorted() got an unexpected keyword argument '{key}'"
                )));
            }
            if reverse {
                items.reverse();
            }
            Ok(Value::List(items))
        }
        "reversed" => {
            let [value] = exactly::<1>(name, args)?;
            let mut items = iterate(value)?;
            items.reverse();
            Ok(Value::List(items))
        }
        other => Err(ToolcodeError::Runtime(format!(
            "NameError: name '{other}' is not defined"
        ))),
    }
}

fn exactly<const N: usize>(name: &str, args: Vec<Value>) -> Result<[Value; N], ToolcodeError> {
    let given = args.len();
    args.try_into().map_err(|_| {
        type_error(format!(
            "{name}() takes exactly {N} argument{} ({given} given)",
            if N == 1 { "" } else { "s" }
        ))
    })
}

fn at_most<const N: usize>(name: &str, args: Vec<Value>) -> Result<Option<Value>, ToolcodeError> {
    if args.len() > N {
        return Err(type_error(format!(
            "{name}() takes at most {N} argument ({} given)",
            args.len()
        )));
    }
    Ok(args.into_iter().next())
}

/// Materialize an iterable value into its items.
fn iterate(value: Value) -> Result<Vec<Value>, ToolcodeError> {
    match value {
        Value::List(items) | Value::Tuple(items) => Ok(items),
        Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        Value::Dict(entries) => Ok(entries.into_iter().map(|(k, _)| k).collect()),
        other => Err(type_error(format!(
            "'{}' object is not iterable",
            other.type_name()
        ))),
    }
}

fn to_int(value: Value) -> Result<Value, ToolcodeError> {
    match value {
        Value::Int(i) => Ok(Value::Int(i)),
        Value::Bool(b) => Ok(Value::Int(b as i64)),
        Value::Float(f) if f.is_finite() => {
            let truncated = f.trunc();
            if truncated.abs() < 9.2e18 {
                Ok(Value::Int(truncated as i64))
            } else {
                Err(ToolcodeError::Runtime(
                    "OverflowError: int too large to convert".into(),
                ))
            }
        }
        Value::Float(f) => Err(value_error(format!("cannot convert float {f} to integer"))),
        Value::Str(s) => s
            .trim()
            .replace('_', "")
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| {
                value_error(format!(
                    "invalid literal for int() with base 10: {}",
                    Value::Str(s.clone()).repr()
                ))
            }),
        other => Err(type_error(format!(
            "int() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn to_float(value: Value) -> Result<Value, ToolcodeError> {
    match value {
        Value::Int(i) => Ok(Value::Float(i as f64)),
        Value::Bool(b) => Ok(Value::Float(if b { 1.0 } else { 0.0 })),
        Value::Float(f) => Ok(Value::Float(f)),
        Value::Str(s) => {
            let trimmed = s.trim().to_ascii_lowercase();
            let parsed = match trimmed.as_str() {
                "inf" | "+inf" | "infinity" => Some(f64::INFINITY),
                "-inf" | "-infinity" => Some(f64::NEG_INFINITY),
                "nan" | "+nan" | "-nan" => Some(f64::NAN),
                other => other.parse::<f64>().ok(),
            };
            parsed.map(Value::Float).ok_or_else(|| {
                value_error(format!(
                    "could not convert string to float: {}",
                    Value::Str(s.clone()).repr()
                ))
            })
        }
        other => Err(type_error(format!(
            "float() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn build_dict(args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, ToolcodeError> {
    let mut entries = Vec::new();
    if let Some(source) = at_most::<1>("dict", args)? {
        match source {
            Value::Dict(existing) => {
                for (k, v) in existing {
                    insert_entry(&mut entries, k, v);
                }
            }
            other => {
                for item in iterate(other)? {
                    match item {
                        Value::List(pair) | Value::Tuple(pair) if pair.len() == 2 => {
                            let [k, v]: [Value; 2] = pair
                                .try_into()
                                .map_err(|_| value_error("dictionary update sequence element has wrong length"))?;
                            insert_entry(&mut entries, k, v);
                        }
                        _ => {
                            return Err(value_error(
                                "dictionary update sequence element has wrong length",
                            ))
                        }
                    }
                }
            }
        }
    }
    for (k, v) in kwargs {
        insert_entry(&mut entries, Value::Str(k), v);
    }
    Ok(Value::Dict(entries))
}

fn range(args: Vec<Value>) -> Result<Value, ToolcodeError> {
    let ints = args
        .iter()
        .map(|v| match v {
            Value::Int(i) => Ok(*i),
            Value::Bool(b) => Ok(*b as i64),
            other => Err(type_error(format!(
                "'{}' object cannot be interpreted as an integer",
                other.type_name()
            ))),
        })
        .collect::<Result<Vec<i64>, _>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => {
            return Err(type_error(format!(
                "range expected 1 to 3 arguments, got {}",
                ints.len()
            )))
        }
    };
    if step == 0 {
        return Err(value_error("range() arg 3 must not be zero"));
    }
    let span = if step > 0 {
        (stop as i128 - start as i128).max(0)
    } else {
        (start as i128 - stop as i128).max(0)
    };
    let step_abs = (step as i128).abs();
    let count = (span + step_abs - 1) / step_abs;
    if count > MAX_RANGE_ITEMS as i128 {
        return Err(value_error(format!(
            "range() of {count} items exceeds the limit of {MAX_RANGE_ITEMS}"
        )));
    }
    // every item lies between start and stop, so it fits in i64
    (0..count)
        .map(|i| {
            i64::try_from(start as i128 + i * step as i128)
                .map(Value::Int)
                .map_err(|_| ToolcodeError::Runtime("OverflowError: integer overflow".into()))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Value::List)
}

fn sum(args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, ToolcodeError> {
    let mut args = args.into_iter();
    let Some(iterable) = args.next() else {
        return Err(type_error("sum() takes at least 1 positional argument (0 given)"));
    };
    let mut start = args.next();
    if args.next().is_some() {
        return Err(type_error("sum() takes at most 2 arguments"));
    }
    for (key, value) in kwargs {
        if key == "start" {
            start = Some(value);
        } else {
            return Err(type_error(format!(
                "sum() got an unexpected keyword argument '{key}'"
            )));
        }
    }
    let mut total = start.unwrap_or(Value::Int(0));
    for item in iterate(iterable)? {
        total = match (&total, &item) {
            (Value::Int(a), Value::Int(b)) => a
                .checked_add(*b)
                .map(Value::Int)
                .ok_or_else(|| ToolcodeError::Runtime("OverflowError: integer overflow".into()))?,
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                Value::Float(total.as_f64().unwrap_or(0.0) + item.as_f64().unwrap_or(0.0))
            }
            _ => {
                return Err(type_error(format!(
                    "unsupported operand type(s) for +: '{}' and '{}'",
                    total.type_name(),
                    item.type_name()
                )))
            }
        };
    }
    Ok(total)
}

fn compare(a: &Value, b: &Value) -> Result<Ordering, ToolcodeError> {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
        (Value::Int(x), Value::Int(y)) => Ok(x.cmp(y)),
        _ => match (numeric(a), numeric(b)) {
            (Some(x), Some(y)) => Ok(x.partial_cmp(&y).unwrap_or(Ordering::Equal)),
            _ => Err(type_error(format!(
                "'<' not supported between instances of '{}' and '{}'",
                a.type_name(),
                b.type_name()
            ))),
        },
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        other => other.as_f64(),
    }
}

fn extreme(name: &str, args: Vec<Value>, want: Ordering) -> Result<Value, ToolcodeError> {
    let items = match args.len() {
        0 => {
            return Err(type_error(format!(
                "{name} expected at least 1 argument, got 0"
            )))
        }
        1 => iterate(args.into_iter().next().unwrap_or(Value::None))?,
        _ => args,
    };
    let mut items = items.into_iter();
    let Some(mut best) = items.next() else {
        return Err(value_error(format!("{name}() arg is an empty sequence")));
    };
    for item in items {
        if compare(&item, &best)? == want {
            best = item;
        }
    }
    Ok(best)
}

/// Round half to even, like Python's `round`.
fn round_half_even(x: f64) -> f64 {
    let rounded = x.round();
    if (x - x.trunc()).abs() == 0.5 {
        2.0 * (x / 2.0).round()
    } else {
        rounded
    }
}

fn round(args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, ToolcodeError> {
    let mut args = args.into_iter();
    let Some(number) = args.next() else {
        return Err(type_error("round() missing required argument 'number'"));
    };
    let mut ndigits = args.next();
    if args.next().is_some() {
        return Err(type_error("round() takes at most 2 arguments"));
    }
    for (key, value) in kwargs {
        if key == "ndigits" {
            ndigits = Some(value);
        } else {
            return Err(type_error(format!(
                "round() got an unexpected keyword argument '{key}'"
            )));
        }
    }
    let digits = match ndigits {
        None | Some(Value::None) => None,
        Some(Value::Int(d)) => Some(d),
        Some(other) => {
            return Err(type_error(format!(
                "'{}' object cannot be interpreted as an integer",
                other.type_name()
            )))
        }
    };
    match (number, digits) {
        (Value::Int(i), _) => Ok(Value::Int(i)),
        (Value::Bool(b), _) => Ok(Value::Int(b as i64)),
        (Value::Float(f), None) => to_int(Value::Float(round_half_even(f))),
        (Value::Float(f), Some(d)) => {
            let factor = 10f64.powi(d.clamp(-308, 308) as i32);
            Ok(Value::Float(round_half_even(f * factor) / factor))
        }
        (other, _) => Err(type_error(format!(
            "type {} doesn't define __round__ method",
            other.type_name()
        ))),
    }
}
