//! Low-level call surface of the ASDK layer.
//!
//! [`NativeApi`] lists the calls the driver makes, one method per SDK entry
//! point. [`AsdkSdk`] forwards them to `asdk-sys`; [`crate::mock::MockSdk`]
//! simulates a mirror in-process.

use std::ffi::{c_char, CStr, CString};
use std::ptr::NonNull;

use asdk_sys::{asdkDM, ASDK_ERROR_MESSAGE_CAPACITY, COMPL_STAT, COMPL_STAT_SUCCESS};

use crate::error::{AlpaoError, ErrorRecord, Result};

/// Capacity of the error message buffer, terminating NUL included.
pub const ERROR_MESSAGE_CAPACITY: usize = ASDK_ERROR_MESSAGE_CAPACITY;

/// Completion status of a native call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    /// `COMPL_STAT_SUCCESS`
    Success,
    /// Any other status
    Failure,
}

impl CompletionStatus {
    /// Convert from the SDK's raw `COMPL_STAT` value.
    pub fn from_raw(raw: COMPL_STAT) -> Self {
        if raw == COMPL_STAT_SUCCESS {
            Self::Success
        } else {
            Self::Failure
        }
    }

    /// True for [`CompletionStatus::Success`].
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

/// The native entry points the driver relies on.
///
/// Implementations perform no validation of their own: length checks and
/// clamping happen in the driver before any call reaches this trait.
pub trait NativeApi {
    /// Opaque per-mirror handle. Released by moving it into [`NativeApi::release`].
    type Handle;

    /// Open a mirror by serial name. `None` means the SDK returned a null handle.
    fn open(&self, serial_name: &CStr) -> Option<Self::Handle>;

    /// Release a handle. The handle is consumed whatever the outcome.
    fn release(&self, handle: Self::Handle) -> CompletionStatus;

    /// Send one value per actuator.
    fn send(&self, handle: &Self::Handle, values: &[f64]) -> CompletionStatus;

    /// Send `n_patterns` consecutive frames, played back `n_repeat` times.
    fn send_pattern(
        &self,
        handle: &Self::Handle,
        values: &[f64],
        n_patterns: u32,
        n_repeat: u32,
    ) -> CompletionStatus;

    /// Read a numeric parameter. `None` means the SDK reported failure.
    fn get(&self, handle: &Self::Handle, key: &CStr) -> Option<f64>;

    /// Write a numeric parameter.
    fn set(&self, handle: &Self::Handle, key: &CStr, value: f64) -> CompletionStatus;

    /// Write a string parameter.
    fn set_string(&self, handle: &Self::Handle, key: &CStr, value: &CStr) -> CompletionStatus;

    /// Reset all actuators to zero.
    fn reset(&self, handle: &Self::Handle) -> CompletionStatus;

    /// Stop asynchronous command execution.
    fn stop(&self, handle: &Self::Handle) -> CompletionStatus;

    /// Pop the last error record. `None` means the error query itself failed.
    fn last_error(&self) -> Option<ErrorRecord>;

    /// Print the last error on the SDK's diagnostic stream.
    fn print_last_error(&self);
}

/// Convert a Rust string for the C boundary.
pub(crate) fn c_string(what: &'static str, value: &str) -> Result<CString> {
    CString::new(value).map_err(|_| AlpaoError::InvalidString {
        what,
        value: value.to_string(),
    })
}

/// Decode a NUL-terminated message buffer, tolerating a missing terminator.
pub(crate) fn message_from_buffer(buffer: &[c_char]) -> String {
    let bytes: Vec<u8> = buffer
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Truncate a message to what fits in the error buffer alongside its NUL.
pub(crate) fn truncate_message(message: &str) -> String {
    let limit = ERROR_MESSAGE_CAPACITY - 1;
    if message.len() <= limit {
        return message.to_string();
    }
    let mut end = limit;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message[..end].to_string()
}

/// Owned `asdkDM` pointer.
#[derive(Debug)]
pub struct AsdkHandle(NonNull<asdkDM>);

// SAFETY: the handle is exclusively owned by one DeformableMirror and only
// used through `&mut`-guarded driver methods, so moving it between threads
// never results in concurrent SDK calls on the same mirror.
#[allow(unsafe_code)]
unsafe impl Send for AsdkHandle {}

impl AsdkHandle {
    fn as_ptr(&self) -> *mut asdkDM {
        self.0.as_ptr()
    }
}

/// [`NativeApi`] backed by the vendor library through `asdk-sys`.
///
/// Without the `hardware` feature the underlying symbols are stubs that
/// panic when called.
#[derive(Debug, Clone, Copy, Default)]
pub struct AsdkSdk;

#[allow(unsafe_code)]
impl NativeApi for AsdkSdk {
    type Handle = AsdkHandle;

    fn open(&self, serial_name: &CStr) -> Option<Self::Handle> {
        // SAFETY: serial_name is a valid NUL-terminated string for the duration of the call
        let raw = unsafe { asdk_sys::asdkInit(serial_name.as_ptr()) };
        NonNull::new(raw).map(AsdkHandle)
    }

    fn release(&self, handle: Self::Handle) -> CompletionStatus {
        // SAFETY: handle came from asdkInit and is consumed here, so it is released once
        CompletionStatus::from_raw(unsafe { asdk_sys::asdkRelease(handle.as_ptr()) })
    }

    fn send(&self, handle: &Self::Handle, values: &[f64]) -> CompletionStatus {
        // SAFETY: the driver sizes `values` to the actuator count read from this handle
        CompletionStatus::from_raw(unsafe { asdk_sys::asdkSend(handle.as_ptr(), values.as_ptr()) })
    }

    fn send_pattern(
        &self,
        handle: &Self::Handle,
        values: &[f64],
        n_patterns: u32,
        n_repeat: u32,
    ) -> CompletionStatus {
        // SAFETY: `values` holds n_patterns full frames, checked by the driver
        CompletionStatus::from_raw(unsafe {
            asdk_sys::asdkSendPattern(handle.as_ptr(), values.as_ptr(), n_patterns, n_repeat)
        })
    }

    fn get(&self, handle: &Self::Handle, key: &CStr) -> Option<f64> {
        let mut value: f64 = 0.0;
        // SAFETY: key is NUL-terminated and value is a valid out pointer
        let status = unsafe { asdk_sys::asdkGet(handle.as_ptr(), key.as_ptr(), &mut value) };
        CompletionStatus::from_raw(status)
            .is_success()
            .then_some(value)
    }

    fn set(&self, handle: &Self::Handle, key: &CStr, value: f64) -> CompletionStatus {
        // SAFETY: key is NUL-terminated and handle is live
        CompletionStatus::from_raw(unsafe { asdk_sys::asdkSet(handle.as_ptr(), key.as_ptr(), value) })
    }

    fn set_string(&self, handle: &Self::Handle, key: &CStr, value: &CStr) -> CompletionStatus {
        // SAFETY: key and value are NUL-terminated and outlive the call
        CompletionStatus::from_raw(unsafe {
            asdk_sys::asdkSetString(handle.as_ptr(), key.as_ptr(), value.as_ptr())
        })
    }

    fn reset(&self, handle: &Self::Handle) -> CompletionStatus {
        // SAFETY: handle is live
        CompletionStatus::from_raw(unsafe { asdk_sys::asdkReset(handle.as_ptr()) })
    }

    fn stop(&self, handle: &Self::Handle) -> CompletionStatus {
        // SAFETY: handle is live
        CompletionStatus::from_raw(unsafe { asdk_sys::asdkStop(handle.as_ptr()) })
    }

    fn last_error(&self) -> Option<ErrorRecord> {
        let mut code: u32 = 0;
        let mut buffer: [c_char; ERROR_MESSAGE_CAPACITY] = [0; ERROR_MESSAGE_CAPACITY];
        // SAFETY: buffer is writable for its full length, which is passed as the size
        let status = unsafe {
            asdk_sys::asdkGetLastError(&mut code, buffer.as_mut_ptr(), buffer.len())
        };
        if !CompletionStatus::from_raw(status).is_success() {
            return None;
        }
        Some(ErrorRecord::new(code, message_from_buffer(&buffer)))
    }

    fn print_last_error(&self) {
        // SAFETY: no arguments; SDK prints to its own stream
        unsafe { asdk_sys::asdkPrintLastError() }
    }
}
