//! process: subprocess lifecycle
//!
//! `start` spawns a shell command and returns a numeric handle; `wait`,
//! `is_running`, `kill` and `release` act on that handle. Handles live in a
//! process-wide registry shared by every engine.

use crate::handles::HandleRegistry;
use parking_lot::Mutex;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::LazyLock;
use tether_sdk::{arg, DynamicValue, NativeContext, NativeError, NativeResult};

/// Exit code reported for processes terminated by a signal
pub const SIGNALED_EXIT_CODE: i32 = -1;

struct Process {
    command: String,
    child: Mutex<Child>,
}

static PROCESSES: LazyLock<HandleRegistry<Process>> = LazyLock::new(HandleRegistry::new);

fn shell(command: &str) -> Command {
    let mut cmd = if cfg!(target_os = "windows") {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        cmd
    };
    cmd.stdin(Stdio::null());
    cmd
}

fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(SIGNALED_EXIT_CODE)
}

fn lookup(function: &str, handle: u64) -> Result<std::sync::Arc<Process>, NativeError> {
    PROCESSES
        .get(handle)
        .ok_or_else(|| NativeError::new(function, format!("invalid process handle {}", handle)))
}

/// Spawn a shell command; returns its handle
pub fn start(ctx: &dyn NativeContext, args: &[DynamicValue]) -> NativeResult {
    let command: String = arg(ctx, args, 0)?;
    let child = shell(&command)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| NativeError::new("process.start", e))?;
    let pid = child.id();
    let handle = PROCESSES.insert(Process {
        command: command.clone(),
        child: Mutex::new(child),
    });
    tracing::debug!(target: "tether::posix", handle, pid, command = command.as_str(), "process started");
    Ok(vec![DynamicValue::Number(handle as f64)])
}

/// Block until the process exits; returns its exit code
pub fn wait(ctx: &dyn NativeContext, args: &[DynamicValue]) -> NativeResult {
    let handle: u64 = arg(ctx, args, 0)?;
    let process = lookup("process.wait", handle)?;
    let status = process
        .child
        .lock()
        .wait()
        .map_err(|e| NativeError::new("process.wait", e))?;
    tracing::debug!(
        target: "tether::posix",
        handle,
        command = process.command.as_str(),
        code = exit_code(status),
        "process exited"
    );
    Ok(vec![DynamicValue::from(exit_code(status))])
}

/// Whether the process is still running
pub fn is_running(ctx: &dyn NativeContext, args: &[DynamicValue]) -> NativeResult {
    let handle: u64 = arg(ctx, args, 0)?;
    let process = lookup("process.is_running", handle)?;
    let exited = process
        .child
        .lock()
        .try_wait()
        .map_err(|e| NativeError::new("process.is_running", e))?;
    Ok(vec![DynamicValue::Bool(exited.is_none())])
}

/// Kill the process; killing one that already exited is not an error
pub fn kill(ctx: &dyn NativeContext, args: &[DynamicValue]) -> NativeResult {
    let handle: u64 = arg(ctx, args, 0)?;
    let process = lookup("process.kill", handle)?;
    let mut child = process.child.lock();
    if child
        .try_wait()
        .map_err(|e| NativeError::new("process.kill", e))?
        .is_none()
    {
        child.kill().map_err(|e| NativeError::new("process.kill", e))?;
        child.wait().map_err(|e| NativeError::new("process.kill", e))?;
    }
    Ok(vec![])
}

/// Forget a handle; a still running process keeps running detached.
///
/// Returns whether the handle was known.
pub fn release(ctx: &dyn NativeContext, args: &[DynamicValue]) -> NativeResult {
    let handle: u64 = arg(ctx, args, 0)?;
    Ok(vec![DynamicValue::Bool(PROCESSES.remove(handle).is_some())])
}

/// Run a shell command to completion; returns a table with `code`,
/// `stdout` and `stderr`
pub fn exec(ctx: &dyn NativeContext, args: &[DynamicValue]) -> NativeResult {
    let command: String = arg(ctx, args, 0)?;
    let output = shell(&command)
        .output()
        .map_err(|e| NativeError::new("process.exec", e))?;
    let table = ctx.create_table()?;
    ctx.table_set(table, "code".into(), DynamicValue::from(exit_code(output.status)))?;
    ctx.table_set(
        table,
        "stdout".into(),
        DynamicValue::from(String::from_utf8_lossy(&output.stdout).into_owned()),
    )?;
    ctx.table_set(
        table,
        "stderr".into(),
        DynamicValue::from(String::from_utf8_lossy(&output.stderr).into_owned()),
    )?;
    Ok(vec![table.into()])
}

/// Id of the current process
pub fn pid(_ctx: &dyn NativeContext, _args: &[DynamicValue]) -> NativeResult {
    Ok(vec![DynamicValue::Number(std::process::id() as f64)])
}

/// Handles currently registered
pub fn live_handles() -> usize {
    PROCESSES.len()
}
