//! In-process simulated mirror implementing [`NativeApi`].
//!
//! `MockSdk` is cheap to clone; clones share one state, so a test can hand
//! one clone to [`crate::DeformableMirror`] and inspect the other.
//!
//! The simulation follows the SDK's observable behaviour: parameter keys
//! have get/set permissions, failures push a record on a LIFO error stack,
//! and an empty stack reports code 0. Failures can be injected per call
//! with [`MockSdk::fail`].

use std::collections::{BTreeSet, HashMap, HashSet};
use std::ffi::CStr;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::ErrorRecord;
use crate::native::{truncate_message, CompletionStatus, NativeApi};
use crate::parameter::ParameterKey;

/// Error code pushed when an injected failure fires.
pub const MOCK_INJECTED_FAILURE: u32 = 100;
/// Error code pushed for unknown parameter keys.
pub const MOCK_UNKNOWN_PARAMETER: u32 = 101;
/// Error code pushed when a key does not allow the requested access.
pub const MOCK_ACCESS_DENIED: u32 = 102;
/// Error code pushed when a released handle is used.
pub const MOCK_INVALID_HANDLE: u32 = 103;

/// Native calls that can be recorded or made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockCall {
    /// [`NativeApi::open`]
    Open,
    /// [`NativeApi::release`]
    Release,
    /// [`NativeApi::send`]
    Send,
    /// [`NativeApi::send_pattern`]
    SendPattern,
    /// [`NativeApi::get`]
    Get,
    /// [`NativeApi::set`]
    Set,
    /// [`NativeApi::set_string`]
    SetString,
    /// [`NativeApi::reset`]
    Reset,
    /// [`NativeApi::stop`]
    Stop,
}

/// Handle issued by [`MockSdk::open`].
#[derive(Debug, PartialEq, Eq)]
pub struct MockHandle {
    id: u64,
}

/// What the SDK saw when asked to open a mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRequest {
    /// Serial name passed to the open call
    pub serial_name: String,
    /// Process working directory at the time of the call
    pub working_dir: Option<PathBuf>,
}

/// A pattern upload as received by the SDK.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternUpload {
    /// Flattened frames
    pub values: Vec<f64>,
    /// Number of frames
    pub n_patterns: u32,
    /// Repeat count
    pub n_repeat: u32,
}

#[derive(Debug)]
struct MockState {
    n_actuators: f64,
    next_handle: u64,
    live_handles: BTreeSet<u64>,
    numeric: HashMap<String, f64>,
    strings: HashMap<String, String>,
    errors: Vec<ErrorRecord>,
    failing: HashSet<MockCall>,
    error_query_broken: bool,
    calls: Vec<MockCall>,
    open_requests: Vec<OpenRequest>,
    sent: Vec<Vec<f64>>,
    patterns: Vec<PatternUpload>,
    printed_errors: usize,
}

impl MockState {
    fn new(n_actuators: f64) -> Self {
        let numeric = HashMap::from([
            (ParameterKey::AckTimeout.as_str().to_string(), 1000.0),
            (ParameterKey::ItfState.as_str().to_string(), 0.0),
            (ParameterKey::LogPrintLevel.as_str().to_string(), 2.0),
            (ParameterKey::UseException.as_str().to_string(), 0.0),
            (ParameterKey::VersionInfo.as_str().to_string(), 3_040_100.0),
        ]);
        Self {
            n_actuators,
            next_handle: 1,
            live_handles: BTreeSet::new(),
            numeric,
            strings: HashMap::new(),
            errors: Vec::new(),
            failing: HashSet::new(),
            error_query_broken: false,
            calls: Vec::new(),
            open_requests: Vec::new(),
            sent: Vec::new(),
            patterns: Vec::new(),
            printed_errors: 0,
        }
    }

    fn push_error(&mut self, code: u32, message: String) {
        self.errors.push(ErrorRecord::new(code, truncate_message(&message)));
    }

    /// Record the call and decide whether it should proceed.
    fn enter(&mut self, call: MockCall) -> bool {
        self.calls.push(call);
        if self.failing.contains(&call) {
            self.push_error(
                MOCK_INJECTED_FAILURE,
                format!("Simulated {:?} failure", call),
            );
            return false;
        }
        true
    }

    fn check_handle(&mut self, handle: &MockHandle) -> bool {
        if self.live_handles.contains(&handle.id) {
            return true;
        }
        self.push_error(
            MOCK_INVALID_HANDLE,
            format!("Invalid DM handle {}", handle.id),
        );
        false
    }

    fn check_access(&mut self, key: &str, write: bool) -> bool {
        let Ok(parsed) = key.parse::<ParameterKey>() else {
            self.push_error(MOCK_UNKNOWN_PARAMETER, format!("Unknown parameter: {}", key));
            return false;
        };
        let access = parsed.access();
        let allowed = if write {
            access.can_set()
        } else {
            access.can_get()
        };
        if !allowed {
            let verb = if write { "set" } else { "get" };
            self.push_error(
                MOCK_ACCESS_DENIED,
                format!("Parameter {} cannot be {}", key, verb),
            );
        }
        allowed
    }

    fn finish(ok: bool) -> CompletionStatus {
        if ok {
            CompletionStatus::Success
        } else {
            CompletionStatus::Failure
        }
    }
}

/// Simulated ASDK layer for tests and hardware-free development.
#[derive(Debug, Clone)]
pub struct MockSdk {
    state: Arc<Mutex<MockState>>,
}

impl MockSdk {
    /// Simulate a mirror reporting `n_actuators` actuators.
    pub fn new(n_actuators: u32) -> Self {
        Self::with_raw_actuator_count(f64::from(n_actuators))
    }

    /// Simulate a mirror whose `NbOfActuator` query returns an arbitrary value.
    pub fn with_raw_actuator_count(value: f64) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::new(value))),
        }
    }

    /// Make every subsequent `call` fail.
    pub fn fail(&self, call: MockCall) {
        self.state.lock().failing.insert(call);
    }

    /// Undo [`MockSdk::fail`].
    pub fn succeed(&self, call: MockCall) {
        self.state.lock().failing.remove(&call);
    }

    /// Make the error query itself fail.
    pub fn break_error_query(&self) {
        self.state.lock().error_query_broken = true;
    }

    /// Push a record on the error stack.
    pub fn push_error(&self, record: ErrorRecord) {
        self.state.lock().errors.push(record);
    }

    /// Records still on the error stack, oldest first.
    pub fn pending_errors(&self) -> Vec<ErrorRecord> {
        self.state.lock().errors.clone()
    }

    /// Number of handles opened and not yet released.
    pub fn live_handles(&self) -> usize {
        self.state.lock().live_handles.len()
    }

    /// Every native call made so far, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().calls.clone()
    }

    /// How many times `call` was made.
    pub fn call_count(&self, call: MockCall) -> usize {
        self.state.lock().calls.iter().filter(|&&c| c == call).count()
    }

    /// Every open request, in order.
    pub fn open_requests(&self) -> Vec<OpenRequest> {
        self.state.lock().open_requests.clone()
    }

    /// Every command buffer received by a successful send.
    pub fn sent_commands(&self) -> Vec<Vec<f64>> {
        self.state.lock().sent.clone()
    }

    /// Every pattern upload received by a successful send.
    pub fn pattern_uploads(&self) -> Vec<PatternUpload> {
        self.state.lock().patterns.clone()
    }

    /// Current value of a numeric parameter as the device holds it.
    pub fn parameter(&self, key: &str) -> Option<f64> {
        self.state.lock().numeric.get(key).copied()
    }

    /// Current value of a string parameter as the device holds it.
    pub fn string_parameter(&self, key: &str) -> Option<String> {
        self.state.lock().strings.get(key).cloned()
    }

    /// Overwrite a device-side numeric parameter (e.g. simulate `ItfState` busy).
    pub fn set_parameter(&self, key: &str, value: f64) {
        self.state.lock().numeric.insert(key.to_string(), value);
    }

    /// How many times the SDK was asked to print its last error.
    pub fn printed_errors(&self) -> usize {
        self.state.lock().printed_errors
    }
}

impl NativeApi for MockSdk {
    type Handle = MockHandle;

    fn open(&self, serial_name: &CStr) -> Option<Self::Handle> {
        let mut state = self.state.lock();
        let serial_name = serial_name.to_string_lossy().into_owned();
        state.open_requests.push(OpenRequest {
            serial_name: serial_name.clone(),
            working_dir: std::env::current_dir().ok(),
        });
        if !state.enter(MockCall::Open) {
            return None;
        }
        let id = state.next_handle;
        state.next_handle += 1;
        state.live_handles.insert(id);
        Some(MockHandle { id })
    }

    fn release(&self, handle: Self::Handle) -> CompletionStatus {
        let mut state = self.state.lock();
        let ok = state.enter(MockCall::Release) && state.check_handle(&handle);
        // The SDK frees the structure even when it reports a failure
        state.live_handles.remove(&handle.id);
        MockState::finish(ok)
    }

    fn send(&self, handle: &Self::Handle, values: &[f64]) -> CompletionStatus {
        let mut state = self.state.lock();
        let ok = state.enter(MockCall::Send) && state.check_handle(handle);
        if ok {
            state.sent.push(values.to_vec());
        }
        MockState::finish(ok)
    }

    fn send_pattern(
        &self,
        handle: &Self::Handle,
        values: &[f64],
        n_patterns: u32,
        n_repeat: u32,
    ) -> CompletionStatus {
        let mut state = self.state.lock();
        let ok = state.enter(MockCall::SendPattern) && state.check_handle(handle);
        if ok {
            state.patterns.push(PatternUpload {
                values: values.to_vec(),
                n_patterns,
                n_repeat,
            });
        }
        MockState::finish(ok)
    }

    fn get(&self, handle: &Self::Handle, key: &CStr) -> Option<f64> {
        let mut state = self.state.lock();
        let key = key.to_string_lossy();
        if !(state.enter(MockCall::Get)
            && state.check_handle(handle)
            && state.check_access(&key, false))
        {
            return None;
        }
        if key == ParameterKey::NbOfActuator.as_str() {
            return Some(state.n_actuators);
        }
        Some(state.numeric.get(&*key).copied().unwrap_or(0.0))
    }

    fn set(&self, handle: &Self::Handle, key: &CStr, value: f64) -> CompletionStatus {
        let mut state = self.state.lock();
        let key = key.to_string_lossy().into_owned();
        let ok = state.enter(MockCall::Set)
            && state.check_handle(handle)
            && state.check_access(&key, true);
        if ok {
            state.numeric.insert(key, value);
        }
        MockState::finish(ok)
    }

    fn set_string(&self, handle: &Self::Handle, key: &CStr, value: &CStr) -> CompletionStatus {
        let mut state = self.state.lock();
        let key = key.to_string_lossy().into_owned();
        let ok = state.enter(MockCall::SetString)
            && state.check_handle(handle)
            && state.check_access(&key, true);
        if ok {
            state
                .strings
                .insert(key, value.to_string_lossy().into_owned());
        }
        MockState::finish(ok)
    }

    fn reset(&self, handle: &Self::Handle) -> CompletionStatus {
        let mut state = self.state.lock();
        let ok = state.enter(MockCall::Reset) && state.check_handle(handle);
        MockState::finish(ok)
    }

    fn stop(&self, handle: &Self::Handle) -> CompletionStatus {
        let mut state = self.state.lock();
        let ok = state.enter(MockCall::Stop) && state.check_handle(handle);
        MockState::finish(ok)
    }

    fn last_error(&self) -> Option<ErrorRecord> {
        let mut state = self.state.lock();
        if state.error_query_broken {
            return None;
        }
        Some(
            state
                .errors
                .pop()
                .unwrap_or_else(|| ErrorRecord::new(0, "No error")),
        )
    }

    fn print_last_error(&self) {
        self.state.lock().printed_errors += 1;
    }
}
