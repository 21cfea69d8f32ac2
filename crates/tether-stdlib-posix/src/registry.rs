//! Subsystem registration for the POSIX natives
//!
//! Groups the functions of each module into a [`Subsystem`] named after the
//! module ("env", "process") and publishes them into an engine.

use tether_engine::{BindResult, Engine};
use tether_sdk::Subsystem;

/// Crate version, used as the version of every subsystem registered here
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Register every POSIX subsystem into the engine
pub fn register_posix(engine: &Engine) -> BindResult<()> {
    engine.register_subsystem(env_subsystem())?;
    engine.register_subsystem(process_subsystem())?;
    tracing::info!(target: "tether::posix", engine = %engine.id(), "posix subsystems registered");
    Ok(())
}

/// The `env` subsystem
pub fn env_subsystem() -> Subsystem {
    let mut env = Subsystem::new("env", VERSION);
    env.register("get", crate::env::get)
        .register("set", crate::env::set)
        .register("unset", crate::env::unset)
        .register("has", crate::env::has)
        .register("ensure", crate::env::ensure)
        .register("all", crate::env::all)
        .register("cwd", crate::env::cwd)
        .register("home", crate::env::home);
    env
}

/// The `process` subsystem
pub fn process_subsystem() -> Subsystem {
    let mut process = Subsystem::new("process", VERSION);
    process
        .register("start", crate::process::start)
        .register("wait", crate::process::wait)
        .register("is_running", crate::process::is_running)
        .register("kill", crate::process::kill)
        .register("release", crate::process::release)
        .register("exec", crate::process::exec)
        .register("pid", crate::process::pid);
    process
}
