//! Build script for asdk-sys FFI bindings.
//!
//! Two modes:
//!
//! 1. With `asdk-sdk` feature: generates bindings from the vendor headers
//!    under `$ASDK_SDK_DIR/include` and links against `libASDK`.
//! 2. Without feature: writes pre-defined bindings so the workspace builds
//!    on machines without the SDK installed.

use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=wrapper.h");
    println!("cargo:rerun-if-env-changed=ASDK_SDK_DIR");
    println!("cargo:rerun-if-env-changed=ASDK_LIB_DIR");

    #[cfg(feature = "asdk-sdk")]
    generate_bindings();

    #[cfg(not(feature = "asdk-sdk"))]
    generate_dummy_bindings();
}

#[cfg(feature = "asdk-sdk")]
fn generate_bindings() {
    let sdk_dir = env::var("ASDK_SDK_DIR")
        .expect("ASDK_SDK_DIR environment variable must be set when `asdk-sdk` feature is enabled.");

    let include_dir = PathBuf::from(&sdk_dir).join("include");
    if !include_dir.exists() {
        panic!("ASDK include path does not exist: {:?}", include_dir);
    }

    // ASDK_LIB_DIR overrides the default lib path (x64 layout of the vendor installer)
    let lib_dir = env::var("ASDK_LIB_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(&sdk_dir).join("lib").join("x64"));
    if !lib_dir.exists() {
        eprintln!("Warning: ASDK lib path does not exist: {:?}", lib_dir);
    }

    println!("cargo:rerun-if-changed={}/asdkWrapper.h", include_dir.display());
    println!("cargo:rustc-link-search=native={}", lib_dir.display());
    println!("cargo:rustc-link-lib=ASDK");

    let bindings = bindgen::Builder::default()
        .header("wrapper.h")
        .clang_arg(format!("-I{}", include_dir.display()))
        .allowlist_function("asdk.*")
        .allowlist_type("asdkDM")
        .allowlist_type("COMPL_STAT")
        .allowlist_type("Scalar")
        .allowlist_type("UInt")
        .allowlist_type("Size_T")
        // Keep COMPL_STAT values as top-level constants (matches dummy bindings)
        .default_enum_style(bindgen::EnumVariation::Consts)
        .derive_debug(true)
        .derive_default(true)
        .generate_comments(true)
        .parse_callbacks(Box::new(bindgen::CargoCallbacks::new()))
        .generate()
        .expect("Unable to generate ASDK bindings");

    let out_path = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR not set"));
    bindings
        .write_to_file(out_path.join("bindings.rs"))
        .expect("Couldn't write bindings!");
}

/// Generate dummy bindings when the SDK is not available.
#[cfg(not(feature = "asdk-sdk"))]
fn generate_dummy_bindings() {
    let out_path = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR not set"));
    let dummy = r#"
// Dummy bindings - asdk-sdk feature not enabled
//
// Placeholder types and functions matching asdkWrapper.h. Enable the
// `asdk-sdk` feature to generate real bindings.

use std::os::raw::{c_char, c_int};

/// Opaque deformable mirror structure
#[repr(C)]
pub struct asdkDM {
    _private: [u8; 0],
}

/// Floating point type used for commands and parameter values
pub type Scalar = f64;

/// Unsigned integer type
pub type UInt = u32;

/// Size type
pub type Size_T = usize;

/// Completion status returned by every fallible call
pub type COMPL_STAT = c_int;
pub const COMPL_STAT_SUCCESS: COMPL_STAT = 0;
pub const COMPL_STAT_FAILURE: COMPL_STAT = -1;

// Panic stub implementations - these allow linking to succeed but will panic
// at runtime if called without the asdk-sdk feature enabled.

const ASDK_SDK_PANIC_MSG: &str = "ASDK function called but asdk-sdk feature is not enabled. \
    Enable the asdk-sdk feature (or hardware in daq-driver-alpao) to use the vendor library.";

#[no_mangle]
pub unsafe extern "C" fn asdkInit(_serialName: *const c_char) -> *mut asdkDM {
    panic!("{}", ASDK_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn asdkRelease(_pDm: *mut asdkDM) -> COMPL_STAT {
    panic!("{}", ASDK_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn asdkSend(_pDm: *mut asdkDM, _value: *const Scalar) -> COMPL_STAT {
    panic!("{}", ASDK_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn asdkSendPattern(
    _pDm: *mut asdkDM,
    _value: *const Scalar,
    _nPattern: UInt,
    _nRepeat: UInt,
) -> COMPL_STAT {
    panic!("{}", ASDK_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn asdkReset(_pDm: *mut asdkDM) -> COMPL_STAT {
    panic!("{}", ASDK_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn asdkStop(_pDm: *mut asdkDM) -> COMPL_STAT {
    panic!("{}", ASDK_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn asdkGet(
    _pDm: *mut asdkDM,
    _command: *const c_char,
    _value: *mut Scalar,
) -> COMPL_STAT {
    panic!("{}", ASDK_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn asdkSet(
    _pDm: *mut asdkDM,
    _command: *const c_char,
    _value: Scalar,
) -> COMPL_STAT {
    panic!("{}", ASDK_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn asdkSetString(
    _pDm: *mut asdkDM,
    _command: *const c_char,
    _cstr: *const c_char,
) -> COMPL_STAT {
    panic!("{}", ASDK_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn asdkGetLastError(
    _errorNo: *mut UInt,
    _errMsg: *mut c_char,
    _errSize: Size_T,
) -> COMPL_STAT {
    panic!("{}", ASDK_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn asdkPrintLastError() {
    panic!("{}", ASDK_SDK_PANIC_MSG);
}
"#;

    std::fs::write(out_path.join("bindings.rs"), dummy).expect("Couldn't write dummy bindings!");
}
