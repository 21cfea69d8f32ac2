//! Call nesting, shutdown ordering and configuration
//!
//! Exercises the engine through nested native/script calls, across
//! threads and through teardown, with a runtime wrapper that records when
//! it is closed.

mod common;

use common::{engine, engine_with, EventLog, Tracked};
use std::any::Any;
use std::thread;
use tether_engine::sdk::{DynamicValue, NativeError, ScriptError};
use tether_engine::{
    BindError, ContractPolicy, DuplicatePolicy, Engine, EngineOptions, FunctionRef, GlobalBinding,
    HostedRuntime, NativeContext, RootSet, ScriptHost, ScriptRuntime, VectorGrowth,
};

/// Hosted runtime that logs `close`
struct ClosingRuntime {
    inner: HostedRuntime,
    log: EventLog,
}

impl ScriptRuntime for ClosingRuntime {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn publish(&self, path: &str, binding: GlobalBinding) -> Result<(), ScriptError> {
        self.inner.publish(path, binding)
    }

    fn unpublish(&self, path: &str) {
        self.inner.unpublish(path)
    }

    fn resolve_function(&self, path: &str) -> Option<FunctionRef> {
        self.inner.resolve_function(path)
    }

    fn invoke(
        &self,
        func: &FunctionRef,
        args: Vec<DynamicValue>,
        host: &dyn ScriptHost,
    ) -> Result<Vec<DynamicValue>, ScriptError> {
        self.inner.invoke(func, args, host)
    }

    fn scan_roots(&self, roots: &mut RootSet) {
        self.inner.scan_roots(roots)
    }

    fn close(&self) {
        self.log.push("runtime closed");
        self.inner.close()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ===== Nested calls =====

#[test]
fn test_nested_script_error_unwinds_every_frame() {
    let e = engine();
    e.with_runtime(|rt: &HostedRuntime| {
        rt.define_function("middle", |scope, _args| {
            let scratch = scope.new_table()?;
            scope.context().pin_scoped(scratch.into())?;
            scope.call("inner.run", vec![scratch.into()])
        })
        .unwrap();
        rt.define_function("raise", |scope, _args| Err(scope.error("boom")))
            .unwrap();
    })
    .unwrap();
    e.register_function("inner", "run", |ctx, args| {
        let scratch = ctx.create_vector()?;
        ctx.pin_scoped(scratch.into())?;
        ctx.vector_push(scratch, args[0].clone())?;
        Ok(ctx.call_script("raise", &[])?)
    })
    .unwrap();

    let err = e.call("middle", &[]).unwrap_err();
    let script_error = match err {
        BindError::Script(script_error) => script_error,
        other => panic!("expected a script error, got {other}"),
    };
    assert!(script_error.message.contains("boom"));
    assert!(script_error.message.contains("inner.run"));
    assert_eq!(
        script_error.traceback.as_deref(),
        Some("\tin function 'middle'")
    );

    let stats = e.stats();
    assert_eq!(stats.call_depth, 0);
    assert_eq!(stats.rooted_temporaries, 0);
    assert_eq!(stats.total_pins, 0);
    assert_eq!(e.collect_garbage().unwrap(), 2);
}

#[test]
fn test_native_error_becomes_script_error() {
    let e = engine();
    e.register_function("io", "fail", |_ctx, _args| {
        Err(NativeError::new("", "disk on fire"))
    })
    .unwrap();
    e.with_runtime(|rt: &HostedRuntime| {
        rt.define_function("guarded", |scope, _args| match scope.call("io.fail", vec![]) {
            Ok(_) => Ok(vec![DynamicValue::Bool(true)]),
            Err(err) => Ok(vec![DynamicValue::from(err.message)]),
        })
        .unwrap();
    })
    .unwrap();

    let out = e.call("guarded", &[]).unwrap();
    assert_eq!(out, vec![DynamicValue::string("io.fail: disk on fire")]);
}

#[test]
fn test_results_survive_sweep_at_call_exit() {
    let e = engine_with(EngineOptions::default().with_sweep_every_calls(1));
    e.register_function("make", "list", |ctx, _args| {
        let v = ctx.create_vector()?;
        ctx.vector_push(v, DynamicValue::Number(1.0))?;
        Ok(vec![v.into()])
    })
    .unwrap();

    let out = e.call("make.list", &[]).unwrap();
    let v = out[0].as_vector().unwrap();
    assert_eq!(e.stats().sweeps, 1);
    assert_eq!(e.vector_len(v).unwrap(), 1);

    e.pin(v.into()).unwrap();
    e.call("make.list", &[]).unwrap();
    assert!(e.is_live(v));
}

// ===== Concurrency =====

#[test]
fn test_calls_from_threads_are_serialized() {
    let e = engine();
    let counter = e.create_table().unwrap();
    e.pin(counter.into()).unwrap();
    e.register_function("counter", "bump", move |ctx, _args| {
        let current = ctx.table_get(counter, &DynamicValue::string("n"))?;
        let n = current.as_number().unwrap_or(0.0);
        thread::yield_now();
        ctx.table_set(counter, DynamicValue::string("n"), DynamicValue::Number(n + 1.0))?;
        Ok(vec![])
    })
    .unwrap();

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let e = e.clone();
            thread::spawn(move || {
                for _ in 0..250 {
                    e.call("counter.bump", &[]).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(
        e.table_get(counter, &DynamicValue::string("n")).unwrap(),
        DynamicValue::Number(1000.0)
    );
    assert_eq!(e.stats().calls, 1000);
}

// ===== Shutdown =====

#[test]
fn test_shutdown_finalizes_before_runtime_is_freed() {
    common::init_tracing();
    let log = EventLog::default();
    let runtime = ClosingRuntime {
        inner: HostedRuntime::new("closing"),
        log: log.clone(),
    };
    let e = Engine::new(
        EngineOptions::default().with_contract_policy(ContractPolicy::LogAndReject),
        runtime,
    )
    .unwrap();

    let pinned = e.register_object(Tracked::new("pinned", &log)).unwrap();
    e.pin(pinned.into()).unwrap();
    let global = e.register_object(Tracked::new("global", &log)).unwrap();
    e.with_runtime(|rt: &ClosingRuntime| rt.inner.set_global("g", global.into()).unwrap())
        .unwrap();

    e.shutdown().unwrap();
    let events = log.events();
    assert_eq!(events.len(), 3);
    assert_eq!(events.last().map(String::as_str), Some("runtime closed"));
    assert_eq!(log.count("destroy pinned"), 1);
    assert_eq!(log.count("destroy global"), 1);

    for result in [e.resolve_object(pinned), e.resolve_object(global)] {
        assert!(matches!(result, Err(BindError::UseAfterRelease(_))));
    }
    assert!(matches!(e.create_table(), Err(BindError::UseAfterRelease(_))));
    assert!(matches!(e.collect_garbage(), Err(BindError::UseAfterRelease(_))));
    assert_eq!(log.events().len(), 3);
}

#[test]
fn test_drop_without_shutdown_still_finalizes() {
    let log = EventLog::default();
    {
        let e = engine();
        let h = e.register_object(Tracked::new("leaked", &log)).unwrap();
        e.pin(h.into()).unwrap();
    }
    assert_eq!(log.events(), vec!["destroy leaked".to_string()]);
}

#[test]
fn test_contract_violation_panics_under_panic_policy() {
    let e = Engine::hosted(EngineOptions::default().with_contract_policy(ContractPolicy::Panic))
        .unwrap();
    let t = e.create_table().unwrap();
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| e.unpin(t.into())));
    assert!(result.is_err());
}

// ===== Configuration =====

#[test]
fn test_options_file_drives_engine() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tether.toml");
    std::fs::write(
        &path,
        r#"
name = "from-file"
max_call_depth = 3
vector_growth = "fixed"
duplicate_subsystem = "replace"
contract_policy = "log-and-reject"
"#,
    )
    .unwrap();

    let options = EngineOptions::from_file(&path).unwrap();
    assert_eq!(options.vector_growth, VectorGrowth::Fixed);
    assert_eq!(options.duplicate_subsystem, DuplicatePolicy::Replace);

    let e = Engine::hosted(options).unwrap();
    assert_eq!(e.name(), "from-file");
    let v = e.create_vector().unwrap();
    assert!(matches!(
        e.vector_set(v, 0, DynamicValue::Nil),
        Err(BindError::IndexOutOfRange { .. })
    ));

    e.register_function("loop", "again", |ctx, _args| Ok(ctx.call_script("loop.again", &[])?))
        .unwrap();
    let err = e.call("loop.again", &[]).unwrap_err();
    assert!(err.to_string().contains("Reentrancy limit of 3"));
}
