//! env: environment variables
//!
//! Names must be non-empty and free of `=` and NUL; values must be free of
//! NUL. Anything else is rejected with a native error instead of reaching
//! the OS.

use std::collections::BTreeMap;
use tether_sdk::{arg, to_script, DynamicValue, NativeContext, NativeError, NativeResult};

fn checked_name(function: &str, name: String) -> Result<String, NativeError> {
    if name.is_empty() || name.contains('=') || name.contains('\0') {
        return Err(NativeError::new(
            function,
            format!("invalid environment variable name {:?}", name),
        ));
    }
    Ok(name)
}

fn checked_value(function: &str, value: String) -> Result<String, NativeError> {
    if value.contains('\0') {
        return Err(NativeError::new(function, "value contains a NUL byte"));
    }
    Ok(value)
}

/// Read a variable; nil when unset or not valid unicode
pub fn get(ctx: &dyn NativeContext, args: &[DynamicValue]) -> NativeResult {
    let name = checked_name("env.get", arg(ctx, args, 0)?)?;
    Ok(vec![to_script(std::env::var(&name).ok(), ctx)?])
}

/// Set a variable
pub fn set(ctx: &dyn NativeContext, args: &[DynamicValue]) -> NativeResult {
    let name = checked_name("env.set", arg(ctx, args, 0)?)?;
    let value = checked_value("env.set", arg(ctx, args, 1)?)?;
    tracing::debug!(target: "tether::posix", name = name.as_str(), "env.set");
    std::env::set_var(&name, &value);
    Ok(vec![])
}

/// Remove a variable; removing an unset variable is not an error
pub fn unset(ctx: &dyn NativeContext, args: &[DynamicValue]) -> NativeResult {
    let name = checked_name("env.unset", arg(ctx, args, 0)?)?;
    tracing::debug!(target: "tether::posix", name = name.as_str(), "env.unset");
    std::env::remove_var(&name);
    Ok(vec![])
}

/// Whether a variable is set
pub fn has(ctx: &dyn NativeContext, args: &[DynamicValue]) -> NativeResult {
    let name = checked_name("env.has", arg(ctx, args, 0)?)?;
    Ok(vec![DynamicValue::Bool(std::env::var_os(&name).is_some())])
}

/// Read a variable, setting it to the given default first when it is unset
/// or empty. Returns the value now in effect.
pub fn ensure(ctx: &dyn NativeContext, args: &[DynamicValue]) -> NativeResult {
    let name = checked_name("env.ensure", arg(ctx, args, 0)?)?;
    let default = checked_value("env.ensure", arg(ctx, args, 1)?)?;
    match std::env::var(&name) {
        Ok(current) if !current.is_empty() => Ok(vec![DynamicValue::from(current)]),
        _ => {
            std::env::set_var(&name, &default);
            Ok(vec![DynamicValue::from(default)])
        }
    }
}

/// Every variable with a unicode name and value, as a table
pub fn all(ctx: &dyn NativeContext, _args: &[DynamicValue]) -> NativeResult {
    let vars: BTreeMap<String, String> = std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect();
    Ok(vec![to_script(vars, ctx)?])
}

/// Current working directory
pub fn cwd(_ctx: &dyn NativeContext, _args: &[DynamicValue]) -> NativeResult {
    let dir = std::env::current_dir().map_err(|e| NativeError::new("env.cwd", e))?;
    Ok(vec![DynamicValue::from(dir.to_string_lossy().into_owned())])
}

/// Home directory; nil when neither HOME nor USERPROFILE is set
pub fn home(ctx: &dyn NativeContext, _args: &[DynamicValue]) -> NativeResult {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .ok();
    Ok(vec![to_script(home, ctx)?])
}
