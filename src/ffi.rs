//! FFI bindings for CogniMetrics
//!
//! This module provides C-compatible functions for calling the engine from
//! mobile and web hosts. Payloads cross the boundary as JSON in null-terminated
//! C strings; returned strings are allocated here and must be freed with
//! `cogni_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::bank::QuestionBank;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::pipeline::{compute_session, AssessmentEngine, SessionInput};
use crate::selector::{select_adaptive_questions, DEFAULT_TARGET_COUNT};
use crate::store::{generate_patient_id, InMemoryStore, StoreSnapshot};
use crate::trend::{classify_trend, order_most_recent_first};
use crate::types::{CompositeAssessmentRecord, QuestionResponseLogEntry};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Hand a result back across the boundary, recording the error on failure
fn finish(result: Result<String, EngineError>) -> *mut c_char {
    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Request body for `cogni_select_questions`
#[derive(Debug, Deserialize)]
struct SelectionRequest {
    patient_id: String,
    #[serde(default)]
    response_log: Vec<QuestionResponseLogEntry>,
    #[serde(default = "default_target_count")]
    target_count: usize,
    /// Custom catalog; the standard bank is used when absent
    #[serde(default)]
    bank: Option<QuestionBank>,
}

fn default_target_count() -> usize {
    DEFAULT_TARGET_COUNT
}

#[derive(Debug, Serialize)]
struct SessionResponse<'a> {
    record: &'a CompositeAssessmentRecord,
    engine_version: &'static str,
}

fn compute_session_json(json: &str) -> Result<String, EngineError> {
    let input = SessionInput::from_json(json)?;
    let record = compute_session(&input);
    Ok(serde_json::to_string(&SessionResponse {
        record: &record,
        engine_version: crate::ENGINE_VERSION,
    })?)
}

fn select_questions_json(json: &str, seed: u64) -> Result<String, EngineError> {
    let request: SelectionRequest = serde_json::from_str(json)?;
    let bank = request.bank.unwrap_or_else(QuestionBank::standard);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let questions = select_adaptive_questions(
        &request.patient_id,
        &request.response_log,
        &bank,
        request.target_count,
        &mut rng,
    )?;
    Ok(serde_json::to_string(&questions)?)
}

fn classify_trend_json(json: &str) -> Result<String, EngineError> {
    let mut history: Vec<CompositeAssessmentRecord> = serde_json::from_str(json)?;
    order_most_recent_first(&mut history);
    Ok(serde_json::to_string(&classify_trend(&history))?)
}

// ============================================================================
// Stateless API
// ============================================================================

/// Score one session JSON and return the composite record as JSON.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `cogni_free_string`.
/// - Returns NULL on error; call `cogni_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn cogni_compute_session(json: *const c_char) -> *mut c_char {
    clear_last_error();

    let Some(json_str) = cstr_to_string(json) else {
        set_last_error("Invalid JSON string pointer");
        return ptr::null_mut();
    };

    finish(compute_session_json(&json_str))
}

/// Select the next questionnaire from a selection request JSON.
///
/// The same request and seed always yield the same questions.
///
/// # Safety
/// - `request_json` must be a valid null-terminated C string.
/// - Returns a newly allocated JSON array that must be freed with `cogni_free_string`.
/// - Returns NULL on error; call `cogni_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn cogni_select_questions(
    request_json: *const c_char,
    seed: u64,
) -> *mut c_char {
    clear_last_error();

    let Some(json_str) = cstr_to_string(request_json) else {
        set_last_error("Invalid JSON string pointer");
        return ptr::null_mut();
    };

    finish(select_questions_json(&json_str, seed))
}

/// Classify the trend of a JSON array of composite records.
///
/// # Safety
/// - `history_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `cogni_free_string`.
/// - Returns NULL on error; call `cogni_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn cogni_classify_trend(history_json: *const c_char) -> *mut c_char {
    clear_last_error();

    let Some(json_str) = cstr_to_string(history_json) else {
        set_last_error("Invalid JSON string pointer");
        return ptr::null_mut();
    };

    finish(classify_trend_json(&json_str))
}

/// Generate a `PID-XXX-XXX` subject id from a seed.
///
/// # Safety
/// - Returns a newly allocated string that must be freed with `cogni_free_string`.
#[no_mangle]
pub unsafe extern "C" fn cogni_generate_patient_id(seed: u64) -> *mut c_char {
    clear_last_error();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    string_to_cstr(&generate_patient_id(&mut rng))
}

// ============================================================================
// Stateful Engine API
// ============================================================================

/// Opaque handle to an engine backed by an in-memory store
pub struct CogniEngineHandle {
    engine: AssessmentEngine<InMemoryStore>,
}

/// Create a new engine.
///
/// `config_json` may be NULL for the default configuration.
///
/// # Safety
/// - `config_json` must be NULL or a valid null-terminated C string.
/// - Returns a pointer that must be freed with `cogni_engine_free`.
/// - Returns NULL on error; call `cogni_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn cogni_engine_new(config_json: *const c_char) -> *mut CogniEngineHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        EngineConfig::default()
    } else {
        let Some(json_str) = cstr_to_string(config_json) else {
            set_last_error("Invalid config string pointer");
            return ptr::null_mut();
        };
        match EngineConfig::from_json(&json_str) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    match AssessmentEngine::with_config(InMemoryStore::new(), QuestionBank::standard(), config) {
        Ok(engine) => Box::into_raw(Box::new(CogniEngineHandle { engine })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free an engine.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `cogni_engine_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn cogni_engine_free(engine: *mut CogniEngineHandle) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
    }
}

/// Draw the next questionnaire for a subject.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `cogni_engine_new`.
/// - `patient_id` must be a valid null-terminated C string.
/// - Returns a newly allocated JSON array that must be freed with `cogni_free_string`.
/// - Returns NULL on error; call `cogni_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn cogni_engine_prepare_questionnaire(
    engine: *mut CogniEngineHandle,
    patient_id: *const c_char,
    seed: u64,
) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }
    let handle = &*engine;

    let Some(patient) = cstr_to_string(patient_id) else {
        set_last_error("Invalid patient_id string pointer");
        return ptr::null_mut();
    };

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    finish(
        handle
            .engine
            .prepare_questionnaire(&patient, &mut rng)
            .and_then(|questions| Ok(serde_json::to_string(&questions)?)),
    )
}

/// Score and persist a session, returning the record and updated trend as JSON.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `cogni_engine_new`.
/// - `session_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `cogni_free_string`.
/// - Returns NULL on error; call `cogni_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn cogni_engine_complete_session(
    engine: *mut CogniEngineHandle,
    session_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }
    let handle = &mut *engine;

    let Some(json_str) = cstr_to_string(session_json) else {
        set_last_error("Invalid JSON string pointer");
        return ptr::null_mut();
    };

    finish(SessionInput::from_json(&json_str).and_then(|input| {
        let outcome = handle.engine.complete_session(&input)?;
        Ok(serde_json::to_string(&outcome)?)
    }))
}

/// Export the engine's store as JSON.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `cogni_engine_new`.
/// - Returns a newly allocated string that must be freed with `cogni_free_string`.
/// - Returns NULL on error; call `cogni_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn cogni_engine_export(engine: *mut CogniEngineHandle) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }
    let handle = &*engine;

    finish(handle.engine.store().to_json())
}

/// Merge a store export into the engine.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `cogni_engine_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
/// - On error, call `cogni_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn cogni_engine_import(
    engine: *mut CogniEngineHandle,
    json: *const c_char,
) -> i32 {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return -1;
    }
    let handle = &mut *engine;

    let Some(json_str) = cstr_to_string(json) else {
        set_last_error("Invalid JSON string pointer");
        return -1;
    };

    match serde_json::from_str::<StoreSnapshot>(&json_str) {
        Ok(snapshot) => {
            handle.engine.store_mut().import(snapshot);
            0
        }
        Err(e) => {
            set_last_error(&EngineError::from(e).to_string());
            -1
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by engine functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a `cogni_*` function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn cogni_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next `cogni_*` call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn cogni_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the engine library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn cogni_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
