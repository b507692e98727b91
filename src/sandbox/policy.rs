//! Static safety policy applied to a parsed program before it runs.

use super::ast::{Expr, Program};
use crate::error::ToolcodeError;

/// Names that must never appear in tool code.
pub const DENYLISTED_NAMES: &[&str] = &[
    "open",
    "file",
    "input",
    "raw_input",
    "execfile",
    "reload",
    "compile",
    "eval",
    "exec",
    "__import__",
    "getattr",
    "setattr",
    "hasattr",
    "delattr",
    "globals",
    "locals",
    "vars",
    "dir",
    "help",
    "copyright",
    "credits",
    "license",
    "quit",
    "exit",
];

/// Introspection attributes rejected regardless of their prefix.
pub const RESERVED_ATTRIBUTES: &[&str] = &[
    "__class__",
    "__bases__",
    "__subclasses__",
    "__mro__",
    "mro",
    "f_globals",
    "f_locals",
    "f_back",
    "gi_frame",
    "gi_code",
    "cr_frame",
    "co_code",
    "tb_frame",
    "func_globals",
    "func_code",
];

/// Names under which the capability registry is reachable.
pub const CAPABILITY_NAMES: &[&str] = &["capability", "default_api"];

/// Reject programs that reference denylisted names or reach outside the
/// capability object.
pub fn check(program: &Program) -> Result<(), ToolcodeError> {
    let mut violation = None;
    for statement in &program.statements {
        statement.walk(&mut |expr: &Expr| {
            if violation.is_none() {
                violation = check_node(expr).err();
            }
        });
        if let Some(message) = violation.take() {
            return Err(ToolcodeError::UnsafeInput(message));
        }
    }
    Ok(())
}

fn check_node(expr: &Expr) -> Result<(), String> {
    match expr {
        Expr::Name(name) if DENYLISTED_NAMES.contains(&name.as_str()) => {
            Err(format!("Unsafe name detected: {name}"))
        }
        Expr::Attribute { value, attr } => {
            if RESERVED_ATTRIBUTES.contains(&attr.as_str()) {
                return Err(format!("Access to dangerous attribute not allowed: {attr}"));
            }
            if attr.starts_with('_') {
                return Err(format!("Access to private attribute not allowed: {attr}"));
            }
            match value.as_ref() {
                Expr::Name(base) if CAPABILITY_NAMES.contains(&base.as_str()) => Ok(()),
                _ => Err(format!(
                    "Attribute access is only allowed on the capability object: .{attr}"
                )),
            }
        }
        Expr::Call { kwargs, .. } => match kwargs.iter().find(|(k, _)| k.starts_with("__")) {
            Some((k, _)) => Err(format!("Unsafe keyword argument: {k}")),
            None => Ok(()),
        },
        _ => Ok(()),
    }
}
