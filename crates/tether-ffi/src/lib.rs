//! C ABI for the Tether binding engine
//!
//! Lets a C host create engines, register native callbacks under dotted
//! paths and call functions by path. Conventions:
//! - Opaque pointers for engines, value vectors and errors
//! - Errors via optional `TetherError**` out-parameters
//! - Status codes: 0 on success, -1 on failure
//! - Every pointer returned by a `*_new`/`*_call`/`*_get_string` function is
//!   owned by the caller and freed with the matching `*_free`/`*_destroy`
//!
//! Contract violations are always reported as errors across this boundary,
//! never as panics.

#![warn(missing_docs)]

use std::ffi::{c_void, CStr, CString};
use std::os::raw::{c_char, c_int};
use std::path::Path;
use std::ptr;
use tether_engine::sdk::NativeError;
use tether_engine::{
    BindError, ContractPolicy, DynamicValue, Engine, EngineOptions, OptionsError,
};
use thiserror::Error;

// ============================================================================
// Opaque Types
// ============================================================================

/// Opaque handle to an engine
#[repr(C)]
pub struct TetherEngine {
    _private: [u8; 0],
}

/// Opaque ordered list of values, used for arguments and results
#[repr(C)]
pub struct TetherVector {
    _private: [u8; 0],
}

/// Error information
#[repr(C)]
pub struct TetherError {
    message: *mut c_char,
}

/// Native callback registered from C.
///
/// Reads its arguments from `args`, pushes its results onto `results` and
/// returns 0. Any other status fails the call with a native error naming
/// the function and the status.
pub type TetherCallback = unsafe extern "C" fn(
    args: *const TetherVector,
    results: *mut TetherVector,
    user_data: *mut c_void,
) -> c_int;

/// Value kind: nil
pub const TETHER_NIL: c_int = 0;
/// Value kind: boolean
pub const TETHER_BOOL: c_int = 1;
/// Value kind: number
pub const TETHER_NUMBER: c_int = 2;
/// Value kind: string
pub const TETHER_STRING: c_int = 3;
/// Value kind: native object handle
pub const TETHER_OBJECT: c_int = 4;
/// Value kind: table handle
pub const TETHER_TABLE: c_int = 5;
/// Value kind: vector handle
pub const TETHER_VECTOR: c_int = 6;

struct EngineHandle {
    engine: Engine,
}

struct ValueList {
    values: Vec<DynamicValue>,
}

/// `user_data` pointer handed back to a callback.
///
/// The host guarantees the pointee may be used from whichever thread
/// calls into the engine.
struct UserData(*mut c_void);

unsafe impl Send for UserData {}
unsafe impl Sync for UserData {}

impl UserData {
    fn get(&self) -> *mut c_void {
        self.0
    }
}

#[derive(Debug, Error)]
enum FfiError {
    #[error("Invalid arguments: {0} is null")]
    NullPointer(&'static str),

    #[error("Invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),

    #[error(transparent)]
    Options(#[from] OptionsError),

    #[error(transparent)]
    Bind(#[from] BindError),
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert a Rust string to a C string (caller must free)
fn rust_to_c_string(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(c_str) => c_str.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

unsafe fn set_error(error_out: *mut *mut TetherError, error: FfiError) {
    if !error_out.is_null() {
        let message = rust_to_c_string(&error.to_string());
        *error_out = Box::into_raw(Box::new(TetherError { message }));
    }
}

unsafe fn c_str<'a>(s: *const c_char, what: &'static str) -> Result<&'a str, FfiError> {
    if s.is_null() {
        return Err(FfiError::NullPointer(what));
    }
    CStr::from_ptr(s).to_str().map_err(|_| FfiError::InvalidUtf8(what))
}

unsafe fn engine_ref<'a>(engine: *mut TetherEngine) -> Result<&'a Engine, FfiError> {
    if engine.is_null() {
        return Err(FfiError::NullPointer("engine"));
    }
    Ok(&(*(engine as *mut EngineHandle)).engine)
}

unsafe fn list_ref<'a>(vector: *const TetherVector) -> Option<&'a ValueList> {
    (vector as *const ValueList).as_ref()
}

unsafe fn list_mut<'a>(vector: *mut TetherVector) -> Option<&'a mut ValueList> {
    (vector as *mut ValueList).as_mut()
}

fn into_vector(values: Vec<DynamicValue>) -> *mut TetherVector {
    Box::into_raw(Box::new(ValueList { values })) as *mut TetherVector
}

fn new_engine(options: EngineOptions) -> Result<*mut TetherEngine, FfiError> {
    let engine = Engine::hosted(options.with_contract_policy(ContractPolicy::LogAndReject))?;
    tracing::debug!(target: "tether::ffi", engine = %engine.id(), "engine created");
    Ok(Box::into_raw(Box::new(EngineHandle { engine })) as *mut TetherEngine)
}

// ============================================================================
// Engine Lifecycle Functions
// ============================================================================

/// Create an engine with default options
///
/// # Arguments
/// * `error` - Optional pointer to receive error information
///
/// # Returns
/// * Non-null pointer to TetherEngine on success
/// * NULL on failure (check error parameter)
///
/// # Safety
/// The returned engine must be freed with `tether_engine_destroy()`
///
/// # Example (C)
/// ```c
/// TetherError* error = NULL;
/// TetherEngine* engine = tether_engine_new(&error);
/// if (engine == NULL) {
///     fprintf(stderr, "Failed to create engine: %s\n", tether_error_message(error));
///     tether_error_free(error);
///     return 1;
/// }
/// tether_engine_destroy(engine);
/// ```
#[no_mangle]
pub unsafe extern "C" fn tether_engine_new(error: *mut *mut TetherError) -> *mut TetherEngine {
    match new_engine(EngineOptions::default()) {
        Ok(engine) => engine,
        Err(e) => {
            set_error(error, e);
            ptr::null_mut()
        }
    }
}

/// Create an engine from a TOML options file
///
/// # Returns
/// * Non-null pointer to TetherEngine on success
/// * NULL if the file cannot be read or holds invalid options
///
/// # Safety
/// - `path` must be a valid null-terminated string
/// - The returned engine must be freed with `tether_engine_destroy()`
#[no_mangle]
pub unsafe extern "C" fn tether_engine_new_from_file(
    path: *const c_char,
    error: *mut *mut TetherError,
) -> *mut TetherEngine {
    let result = c_str(path, "path")
        .and_then(|path| Ok(EngineOptions::from_file(Path::new(path))?))
        .and_then(new_engine);
    match result {
        Ok(engine) => engine,
        Err(e) => {
            set_error(error, e);
            ptr::null_mut()
        }
    }
}

/// Shut the engine down: finalize every object, then close the runtime.
///
/// The engine pointer stays valid until `tether_engine_destroy()`; every
/// call made on it after shutdown fails.
///
/// # Returns
/// * 0 on success (including an engine already shut down)
/// * -1 on failure, e.g. when called from inside a callback
///
/// # Safety
/// Engine pointer must be valid
#[no_mangle]
pub unsafe extern "C" fn tether_engine_shutdown(
    engine: *mut TetherEngine,
    error: *mut *mut TetherError,
) -> c_int {
    match engine_ref(engine).and_then(|e| Ok(e.shutdown()?)) {
        Ok(()) => 0,
        Err(e) => {
            set_error(error, e);
            -1
        }
    }
}

/// Destroy an engine, shutting it down first if needed
///
/// # Safety
/// - Engine pointer must be valid (created by `tether_engine_new*()`) or NULL
/// - Engine must not be used after this call
#[no_mangle]
pub unsafe extern "C" fn tether_engine_destroy(engine: *mut TetherEngine) {
    if engine.is_null() {
        return;
    }
    let handle = Box::from_raw(engine as *mut EngineHandle);
    drop(handle);
}

// ============================================================================
// Functions
// ============================================================================

/// Register a C callback as the native function `namespace.name`
///
/// # Arguments
/// * `engine` - Pointer to TetherEngine
/// * `namespace` - Null-terminated namespace (e.g., "host")
/// * `name` - Null-terminated function name (e.g., "log")
/// * `callback` - Function invoked on every call
/// * `user_data` - Passed back to every invocation of `callback`
/// * `error` - Optional pointer to receive error information
///
/// # Returns
/// * 0 on success
/// * -1 on failure (check error parameter)
///
/// # Safety
/// - Engine pointer and strings must be valid
/// - `user_data` must stay valid, and usable from any thread that calls
///   into the engine, until the engine is destroyed
#[no_mangle]
pub unsafe extern "C" fn tether_engine_register_callback(
    engine: *mut TetherEngine,
    namespace: *const c_char,
    name: *const c_char,
    callback: Option<TetherCallback>,
    user_data: *mut c_void,
    error: *mut *mut TetherError,
) -> c_int {
    let result = (|| {
        let engine = engine_ref(engine)?;
        let namespace = c_str(namespace, "namespace")?;
        let name = c_str(name, "name")?;
        let callback = callback.ok_or(FfiError::NullPointer("callback"))?;
        let user_data = UserData(user_data);
        let path = format!("{}.{}", namespace, name);
        engine.register_function(namespace, name, move |_ctx, args| {
            let input = ValueList { values: args.to_vec() };
            let mut output = ValueList { values: Vec::new() };
            let status = callback(
                &input as *const ValueList as *const TetherVector,
                &mut output as *mut ValueList as *mut TetherVector,
                user_data.get(),
            );
            if status != 0 {
                return Err(NativeError::new(
                    path.as_str(),
                    format!("callback returned status {}", status),
                ));
            }
            Ok(output.values)
        })?;
        Ok::<(), FfiError>(())
    })();
    match result {
        Ok(()) => 0,
        Err(e) => {
            set_error(error, e);
            -1
        }
    }
}

/// Call a script or native function by dotted path
///
/// # Arguments
/// * `engine` - Pointer to TetherEngine
/// * `path` - Null-terminated dotted path (e.g., "host.log")
/// * `args` - Argument vector, or NULL for no arguments
/// * `error` - Optional pointer to receive error information
///
/// # Returns
/// * A new vector holding the results (free with `tether_vector_free()`)
/// * NULL on failure (check error parameter)
///
/// # Safety
/// Engine pointer, path and args (when non-null) must be valid
#[no_mangle]
pub unsafe extern "C" fn tether_engine_call(
    engine: *mut TetherEngine,
    path: *const c_char,
    args: *const TetherVector,
    error: *mut *mut TetherError,
) -> *mut TetherVector {
    let result = (|| {
        let engine = engine_ref(engine)?;
        let path = c_str(path, "path")?;
        let args = list_ref(args).map(|list| list.values.as_slice()).unwrap_or(&[]);
        Ok::<_, FfiError>(engine.call(path, args)?)
    })();
    match result {
        Ok(values) => into_vector(values),
        Err(e) => {
            set_error(error, e);
            ptr::null_mut()
        }
    }
}

/// Whether `path` names a callable function
///
/// # Returns
/// * 1 if the path resolves to a script or native function
/// * 0 otherwise, including for NULL arguments
///
/// # Safety
/// Engine pointer and path must be valid or NULL
#[no_mangle]
pub unsafe extern "C" fn tether_engine_has_function(
    engine: *mut TetherEngine,
    path: *const c_char,
) -> c_int {
    match (engine_ref(engine), c_str(path, "path")) {
        (Ok(engine), Ok(path)) => engine.has_function(path) as c_int,
        _ => 0,
    }
}

// ============================================================================
// Value Vectors
// ============================================================================

/// Create an empty vector
///
/// # Safety
/// The returned vector must be freed with `tether_vector_free()`
#[no_mangle]
pub unsafe extern "C" fn tether_vector_new() -> *mut TetherVector {
    into_vector(Vec::new())
}

/// Free a vector
///
/// # Safety
/// - Vector must come from `tether_vector_new()` or `tether_engine_call()`,
///   or be NULL
/// - Vectors handed to a callback are owned by the engine; never free them
#[no_mangle]
pub unsafe extern "C" fn tether_vector_free(vector: *mut TetherVector) {
    if vector.is_null() {
        return;
    }
    drop(Box::from_raw(vector as *mut ValueList));
}

/// Number of values in the vector; 0 for NULL
///
/// # Safety
/// Vector pointer must be valid or NULL
#[no_mangle]
pub unsafe extern "C" fn tether_vector_len(vector: *const TetherVector) -> usize {
    list_ref(vector).map_or(0, |list| list.values.len())
}

/// Append nil
///
/// # Returns
/// * 0 on success, -1 for a NULL vector
///
/// # Safety
/// Vector pointer must be valid or NULL
#[no_mangle]
pub unsafe extern "C" fn tether_vector_push_nil(vector: *mut TetherVector) -> c_int {
    push(vector, DynamicValue::Nil)
}

/// Append a boolean (0 = false, non-zero = true)
///
/// # Safety
/// Vector pointer must be valid or NULL
#[no_mangle]
pub unsafe extern "C" fn tether_vector_push_bool(vector: *mut TetherVector, value: c_int) -> c_int {
    push(vector, DynamicValue::Bool(value != 0))
}

/// Append a number
///
/// # Safety
/// Vector pointer must be valid or NULL
#[no_mangle]
pub unsafe extern "C" fn tether_vector_push_number(vector: *mut TetherVector, value: f64) -> c_int {
    push(vector, DynamicValue::Number(value))
}

/// Append a copy of a UTF-8 string
///
/// # Returns
/// * 0 on success, -1 for NULL pointers or invalid UTF-8
///
/// # Safety
/// Vector pointer must be valid or NULL; `value` must be a valid
/// null-terminated string or NULL
#[no_mangle]
pub unsafe extern "C" fn tether_vector_push_string(
    vector: *mut TetherVector,
    value: *const c_char,
) -> c_int {
    match c_str(value, "value") {
        Ok(s) => push(vector, DynamicValue::string(s)),
        Err(_) => -1,
    }
}

unsafe fn push(vector: *mut TetherVector, value: DynamicValue) -> c_int {
    match list_mut(vector) {
        Some(list) => {
            list.values.push(value);
            0
        }
        None => -1,
    }
}

unsafe fn get<'a>(vector: *const TetherVector, index: usize) -> Option<&'a DynamicValue> {
    list_ref(vector).and_then(|list| list.values.get(index))
}

/// Kind of the value at `index` (one of the `TETHER_*` kind constants)
///
/// # Returns
/// * The kind, or -1 for a NULL vector or an index out of range
///
/// # Safety
/// Vector pointer must be valid or NULL
#[no_mangle]
pub unsafe extern "C" fn tether_vector_get_kind(vector: *const TetherVector, index: usize) -> c_int {
    match get(vector, index) {
        Some(DynamicValue::Nil) => TETHER_NIL,
        Some(DynamicValue::Bool(_)) => TETHER_BOOL,
        Some(DynamicValue::Number(_)) => TETHER_NUMBER,
        Some(DynamicValue::String(_)) => TETHER_STRING,
        Some(DynamicValue::Object(_)) => TETHER_OBJECT,
        Some(DynamicValue::Table(_)) => TETHER_TABLE,
        Some(DynamicValue::Vector(_)) => TETHER_VECTOR,
        None => -1,
    }
}

/// Read a boolean into `out` (1 or 0)
///
/// # Returns
/// * 0 on success, -1 when the value is missing or not a boolean
///
/// # Safety
/// Vector pointer must be valid or NULL; `out` must be valid or NULL
#[no_mangle]
pub unsafe extern "C" fn tether_vector_get_bool(
    vector: *const TetherVector,
    index: usize,
    out: *mut c_int,
) -> c_int {
    match (get(vector, index).and_then(DynamicValue::as_bool), out.is_null()) {
        (Some(b), false) => {
            *out = b as c_int;
            0
        }
        _ => -1,
    }
}

/// Read a number into `out`
///
/// # Returns
/// * 0 on success, -1 when the value is missing or not a number
///
/// # Safety
/// Vector pointer must be valid or NULL; `out` must be valid or NULL
#[no_mangle]
pub unsafe extern "C" fn tether_vector_get_number(
    vector: *const TetherVector,
    index: usize,
    out: *mut f64,
) -> c_int {
    match (get(vector, index).and_then(DynamicValue::as_number), out.is_null()) {
        (Some(n), false) => {
            *out = n;
            0
        }
        _ => -1,
    }
}

/// Copy out the string at `index`
///
/// # Returns
/// * A new null-terminated string (free with `tether_string_free()`)
/// * NULL when the value is missing, not a string, or holds a NUL byte
///
/// # Safety
/// Vector pointer must be valid or NULL
#[no_mangle]
pub unsafe extern "C" fn tether_vector_get_string(
    vector: *const TetherVector,
    index: usize,
) -> *mut c_char {
    match get(vector, index).and_then(DynamicValue::as_str) {
        Some(s) => rust_to_c_string(s),
        None => ptr::null_mut(),
    }
}

/// Free a string returned by `tether_vector_get_string()`
///
/// # Safety
/// String must come from `tether_vector_get_string()`, or be NULL
#[no_mangle]
pub unsafe extern "C" fn tether_string_free(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

// ============================================================================
// Error Handling Functions
// ============================================================================

/// Get the error message
///
/// # Returns
/// * Null-terminated error message string
/// * NULL if error is NULL
///
/// # Safety
/// - Error pointer must be valid or NULL
/// - Returned string is valid until `tether_error_free()` is called
/// - Do not free the returned string directly
#[no_mangle]
pub unsafe extern "C" fn tether_error_message(error: *const TetherError) -> *const c_char {
    if error.is_null() {
        return ptr::null();
    }
    (*error).message
}

/// Free an error
///
/// # Safety
/// - Error pointer must be valid (created by the Tether API) or NULL
/// - Error must not be used after this call
#[no_mangle]
pub unsafe extern "C" fn tether_error_free(error: *mut TetherError) {
    if error.is_null() {
        return;
    }
    if !(*error).message.is_null() {
        drop(CString::from_raw((*error).message));
    }
    drop(Box::from_raw(error));
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Tether version string
///
/// # Safety
/// The returned string is static and must not be freed
#[no_mangle]
pub unsafe extern "C" fn tether_version() -> *const c_char {
    static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");
    VERSION.as_ptr() as *const c_char
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn message(error: *const TetherError) -> String {
        unsafe { CStr::from_ptr(tether_error_message(error)).to_str().unwrap().to_string() }
    }

    unsafe extern "C" fn add(
        args: *const TetherVector,
        results: *mut TetherVector,
        user_data: *mut c_void,
    ) -> c_int {
        let calls = &*(user_data as *const AtomicUsize);
        calls.fetch_add(1, Ordering::SeqCst);
        let (mut a, mut b) = (0.0, 0.0);
        if tether_vector_get_number(args, 0, &mut a) != 0 || tether_vector_get_number(args, 1, &mut b) != 0 {
            return 7;
        }
        tether_vector_push_number(results, a + b)
    }

    unsafe extern "C" fn greet(
        args: *const TetherVector,
        results: *mut TetherVector,
        _user_data: *mut c_void,
    ) -> c_int {
        let name = tether_vector_get_string(args, 0);
        if name.is_null() {
            return 1;
        }
        let text = format!("hello {}", CStr::from_ptr(name).to_str().unwrap());
        tether_string_free(name);
        let text = CString::new(text).unwrap();
        tether_vector_push_string(results, text.as_ptr())
    }

    #[test]
    fn test_engine_lifecycle() {
        unsafe {
            let mut error: *mut TetherError = ptr::null_mut();
            let engine = tether_engine_new(&mut error);
            assert!(!engine.is_null());
            assert!(error.is_null());

            assert_eq!(tether_engine_shutdown(engine, &mut error), 0);
            assert_eq!(tether_engine_shutdown(engine, &mut error), 0);
            tether_engine_destroy(engine);
            tether_engine_destroy(ptr::null_mut());
        }
    }

    #[test]
    fn test_callback_round_trip() {
        unsafe {
            let calls = AtomicUsize::new(0);
            let engine = tether_engine_new(ptr::null_mut());
            let mut error: *mut TetherError = ptr::null_mut();
            let status = tether_engine_register_callback(
                engine,
                c"math".as_ptr(),
                c"add".as_ptr(),
                Some(add),
                &calls as *const AtomicUsize as *mut c_void,
                &mut error,
            );
            assert_eq!(status, 0);
            assert_eq!(tether_engine_has_function(engine, c"math.add".as_ptr()), 1);
            assert_eq!(tether_engine_has_function(engine, c"math.sub".as_ptr()), 0);

            let args = tether_vector_new();
            tether_vector_push_number(args, 2.0);
            tether_vector_push_number(args, 40.0);
            let results = tether_engine_call(engine, c"math.add".as_ptr(), args, &mut error);
            assert!(!results.is_null());
            assert_eq!(tether_vector_len(results), 1);
            assert_eq!(tether_vector_get_kind(results, 0), TETHER_NUMBER);
            let mut sum = 0.0;
            assert_eq!(tether_vector_get_number(results, 0, &mut sum), 0);
            assert_eq!(sum, 42.0);
            assert_eq!(calls.load(Ordering::SeqCst), 1);

            tether_vector_free(results);
            tether_vector_free(args);
            tether_engine_destroy(engine);
        }
    }

    #[test]
    fn test_string_arguments_and_results() {
        unsafe {
            let engine = tether_engine_new(ptr::null_mut());
            tether_engine_register_callback(
                engine,
                c"host".as_ptr(),
                c"greet".as_ptr(),
                Some(greet),
                ptr::null_mut(),
                ptr::null_mut(),
            );

            let args = tether_vector_new();
            assert_eq!(tether_vector_push_string(args, c"world".as_ptr()), 0);
            let results = tether_engine_call(engine, c"host.greet".as_ptr(), args, ptr::null_mut());
            let text = tether_vector_get_string(results, 0);
            assert_eq!(CStr::from_ptr(text).to_str().unwrap(), "hello world");
            assert!(tether_vector_get_string(results, 1).is_null());

            tether_string_free(text);
            tether_vector_free(results);
            tether_vector_free(args);
            tether_engine_destroy(engine);
        }
    }

    #[test]
    fn test_callback_failure_status_becomes_error() {
        unsafe {
            let calls = AtomicUsize::new(0);
            let engine = tether_engine_new(ptr::null_mut());
            tether_engine_register_callback(
                engine,
                c"math".as_ptr(),
                c"add".as_ptr(),
                Some(add),
                &calls as *const AtomicUsize as *mut c_void,
                ptr::null_mut(),
            );

            let mut error: *mut TetherError = ptr::null_mut();
            let results = tether_engine_call(engine, c"math.add".as_ptr(), ptr::null(), &mut error);
            assert!(results.is_null());
            let text = message(error);
            assert!(text.contains("math.add"));
            assert!(text.contains("status 7"));
            tether_error_free(error);
            tether_engine_destroy(engine);
        }
    }

    #[test]
    fn test_error_handling() {
        unsafe {
            let mut error: *mut TetherError = ptr::null_mut();
            let results = tether_engine_call(ptr::null_mut(), c"x".as_ptr(), ptr::null(), &mut error);
            assert!(results.is_null());
            assert_eq!(message(error), "Invalid arguments: engine is null");
            tether_error_free(error);

            let engine = tether_engine_new(ptr::null_mut());
            let mut error: *mut TetherError = ptr::null_mut();
            tether_engine_call(engine, c"nowhere.fn".as_ptr(), ptr::null(), &mut error);
            assert!(message(error).contains("Unknown function"));
            tether_error_free(error);

            let mut error: *mut TetherError = ptr::null_mut();
            let status = tether_engine_register_callback(
                engine,
                c"math".as_ptr(),
                c"add".as_ptr(),
                None,
                ptr::null_mut(),
                &mut error,
            );
            assert_eq!(status, -1);
            assert_eq!(message(error), "Invalid arguments: callback is null");
            tether_error_free(error);

            tether_engine_shutdown(engine, ptr::null_mut());
            let mut error: *mut TetherError = ptr::null_mut();
            tether_engine_call(engine, c"math.add".as_ptr(), ptr::null(), &mut error);
            assert!(message(error).contains("Use after release"));
            tether_error_free(error);
            tether_engine_destroy(engine);

            assert!(tether_error_message(ptr::null()).is_null());
            tether_error_free(ptr::null_mut());
        }
    }

    #[test]
    fn test_vector_accessors_reject_wrong_kinds() {
        unsafe {
            let v = tether_vector_new();
            tether_vector_push_nil(v);
            tether_vector_push_bool(v, 1);
            assert_eq!(tether_vector_len(v), 2);
            assert_eq!(tether_vector_get_kind(v, 0), TETHER_NIL);
            assert_eq!(tether_vector_get_kind(v, 1), TETHER_BOOL);
            assert_eq!(tether_vector_get_kind(v, 2), -1);

            let mut flag = 0;
            assert_eq!(tether_vector_get_bool(v, 1, &mut flag), 0);
            assert_eq!(flag, 1);
            let mut n = 0.0;
            assert_eq!(tether_vector_get_number(v, 1, &mut n), -1);
            assert_eq!(tether_vector_push_string(v, ptr::null()), -1);
            assert_eq!(tether_vector_push_nil(ptr::null_mut()), -1);
            assert_eq!(tether_vector_len(ptr::null()), 0);
            tether_vector_free(v);
        }
    }

    #[test]
    fn test_engine_from_options_file() {
        unsafe {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("tether.toml");
            std::fs::write(&path, "name = \"from-c\"\n").unwrap();
            let c_path = CString::new(path.to_str().unwrap()).unwrap();

            let engine = tether_engine_new_from_file(c_path.as_ptr(), ptr::null_mut());
            assert!(!engine.is_null());
            tether_engine_destroy(engine);

            let mut error: *mut TetherError = ptr::null_mut();
            let missing = CString::new(dir.path().join("missing.toml").to_str().unwrap()).unwrap();
            assert!(tether_engine_new_from_file(missing.as_ptr(), &mut error).is_null());
            assert!(message(error).contains("Failed to read options file"));
            tether_error_free(error);
        }
    }

    #[test]
    fn test_version() {
        unsafe {
            let version = CStr::from_ptr(tether_version()).to_str().unwrap();
            assert_eq!(version, env!("CARGO_PKG_VERSION"));
        }
    }
}
