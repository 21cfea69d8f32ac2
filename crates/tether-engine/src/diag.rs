//! Crash diagnostics
//!
//! Helpers a host calls from its fatal-signal path. Everything here is best
//! effort: nothing blocks on the engine lock and nothing fails.

use crate::engine::Engine;
use std::fmt::Write;

/// First line of a crash report
pub fn crash_header() -> String {
    format!(
        "=== tether {} crash report (pid {}, {}-{}) ===",
        crate::VERSION,
        std::process::id(),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

const REGISTERS_UNSUPPORTED: &str = "registers: capture not supported on this platform";

/// General-purpose register contents, one `name = 0x...` line each.
///
/// Registers are read where this function runs, so they describe the
/// reporting path rather than the faulting instruction. Platforms without
/// capture get a single placeholder line.
pub fn dump_registers() -> String {
    let registers = capture_registers();
    if registers.is_empty() {
        return REGISTERS_UNSUPPORTED.to_string();
    }
    let mut out = String::new();
    for (name, value) in registers {
        let _ = writeln!(out, "{:<3} = 0x{:016x}", name, value);
    }
    out
}

#[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
macro_rules! read_registers {
    ($($name:literal),* $(,)?) => {
        vec![$(($name, {
            let value: u64;
            // SAFETY: copies one register into a local and touches nothing else.
            unsafe {
                std::arch::asm!(
                    concat!("mov {}, ", $name),
                    out(reg) value,
                    options(nomem, nostack, preserves_flags)
                );
            }
            value
        })),*]
    };
}

#[cfg(target_arch = "x86_64")]
fn capture_registers() -> Vec<(&'static str, u64)> {
    read_registers!(
        "rax", "rbx", "rcx", "rdx", "rsi", "rdi", "rbp", "rsp", "r8", "r9", "r10", "r11", "r12",
        "r13", "r14", "r15",
    )
}

#[cfg(target_arch = "aarch64")]
fn capture_registers() -> Vec<(&'static str, u64)> {
    read_registers!(
        "x0", "x1", "x2", "x3", "x4", "x5", "x6", "x7", "x8", "x9", "x10", "x11", "x12", "x13",
        "x14", "x15", "x16", "x17", "x18", "x19", "x20", "x21", "x22", "x23", "x24", "x25", "x26",
        "x27", "x28", "x29", "x30", "sp",
    )
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
fn capture_registers() -> Vec<(&'static str, u64)> {
    Vec::new()
}

/// Handle tables and call stack of `engine`.
///
/// Uses `try_lock` so a crash on a thread that holds the engine lock does
/// not deadlock the report; a busy engine is reported as such.
pub fn dump_state(engine: &Engine) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", engine.id(), engine.name());
    let Some(core) = engine.inner().lock.try_lock() else {
        out.push_str("  state: locked by another thread\n");
        return out;
    };
    let Ok(state) = core.state.try_borrow() else {
        out.push_str("  state: borrowed by the crashing call\n");
        return out;
    };
    if state.shut_down {
        out.push_str("  state: shut down\n");
        return out;
    }
    let _ = writeln!(
        out,
        "  handles: {} objects, {} tables, {} vectors",
        state.objects.len(),
        state.tables.len(),
        state.vectors.len()
    );
    let _ = writeln!(
        out,
        "  pins: {} records, {} pins",
        state.pins.len(),
        state.pins.total_pins()
    );
    for (id, entry) in state.objects.iter() {
        let _ = writeln!(
            out,
            "    {} {} type={}",
            id,
            entry.identity,
            entry.object.type_tag()
        );
    }
    let _ = writeln!(out, "  call stack ({} frames):", state.frames.len());
    for (depth, frame) in state.frames.iter().enumerate().rev() {
        let _ = writeln!(
            out,
            "    #{} {} ({} rooted)",
            depth,
            frame.label(),
            frame.temps().len()
        );
    }
    out
}
