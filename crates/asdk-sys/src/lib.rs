//! Low-level FFI bindings for the ALPAO deformable mirror SDK (ASDK).
//!
//! This crate provides raw, unsafe bindings to the C interface exposed by
//! `asdkWrapper.h`. Every call except the error queries takes the opaque
//! `asdkDM` pointer returned by [`asdkInit`].
//!
//! # Safety
//!
//! All functions in this crate are `unsafe` as they are direct FFI bindings.
//! For a safe wrapper, use the `daq-driver-alpao` crate instead.
//!
//! # Features
//!
//! - `asdk-sdk`: Generate bindings from the vendor headers and link
//!   `libASDK`. Without this feature, pre-defined bindings with panicking
//!   stubs are used so dependents still build and test.
//!
//! # Example (unsafe)
//!
//! ```no_run
//! use asdk_sys::*;
//! use std::ffi::CString;
//!
//! unsafe {
//!     let serial = CString::new("BOL143").unwrap();
//!     let dm = asdkInit(serial.as_ptr());
//!     if !dm.is_null() {
//!         let key = CString::new("NbOfActuator").unwrap();
//!         let mut n: Scalar = 0.0;
//!         asdkGet(dm, key.as_ptr(), &mut n);
//!         println!("Mirror has {} actuators", n);
//!         asdkRelease(dm);
//!     }
//! }
//! ```

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(dead_code)]
#![allow(missing_docs)]
#![allow(unsafe_code)]
#![allow(clippy::all)]

// Include the generated bindings
include!(concat!(env!("OUT_DIR"), "/bindings.rs"));

/// Capacity of the message buffer handed to [`asdkGetLastError`].
pub const ASDK_ERROR_MESSAGE_CAPACITY: usize = 512;
