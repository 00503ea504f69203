//! Safe Rust driver for ALPAO deformable mirrors.
//!
//! This crate wraps the low-level FFI bindings from `asdk-sys` with error
//! handling, RAII handle management, and a command buffer that never lets an
//! out-of-range actuator value reach the hardware.
//!
//! # Architecture
//!
//! ## Device Access
//! - [`DeformableMirror`] - Owns the SDK handle; open, reset, stop, close
//! - [`AlpaoConfig`] - TOML configuration resolved before open
//!
//! ## Commands
//! - [`DeformableMirror::send`] - Clamp to [`CMD_MIN`]..=[`CMD_MAX`] and send
//! - [`DeformableMirror::send_and_overwrite`] - Same, writing the clamped values back
//! - [`DeformableMirror::send_pattern`] - Upload a sequence of frames
//!
//! ## Parameters
//! - [`DeformableMirror::get`] / [`DeformableMirror::set`] - Raw key access
//! - [`ParameterKey`] - Documented keys and their get/set permissions
//!
//! ## Native Layer
//! - [`NativeApi`] - The SDK call surface
//! - [`AsdkSdk`] - Vendor library backend (real with the `hardware` feature)
//! - [`MockSdk`] - In-process simulated mirror
//!
//! # Examples
//!
//! ## Flatten a Mirror
//!
//! ```no_run
//! use daq_driver_alpao::DeformableMirror;
//!
//! # fn example() -> daq_driver_alpao::Result<()> {
//! let mut dm = DeformableMirror::open("BOL143")?;
//! println!("{} actuators", dm.n_actuators());
//!
//! let mut command = vec![0.0; dm.n_actuators()];
//! command[0] = 1.5; // clamped to 1.0
//! let sent = dm.send(&command)?;
//! assert_eq!(sent[0], 1.0);
//!
//! dm.reset()?;
//! dm.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Without Hardware
//!
//! ```
//! use daq_driver_alpao::{DeformableMirror, MockSdk};
//!
//! let sdk = MockSdk::new(97);
//! let mut dm = DeformableMirror::open_with(sdk.clone(), "BOL143").unwrap();
//! dm.send(&vec![0.25; 97]).unwrap();
//! assert_eq!(sdk.sent_commands().len(), 1);
//! ```

pub mod command;
pub mod config;
pub mod device;
pub mod error;
pub mod mock;
pub mod native;
pub mod parameter;

pub use command::{clamp_command, CMD_MAX, CMD_MIN};
pub use config::AlpaoConfig;
pub use device::DeformableMirror;
pub use error::{
    pop_last_error, print_last_error, AlpaoError, ErrorDetail, ErrorRecord, ParameterOperation,
    Result,
};
pub use mock::{MockCall, MockSdk};
pub use native::{AsdkHandle, AsdkSdk, CompletionStatus, NativeApi};
pub use parameter::{
    ParameterAccess, ParameterKey, ParameterValue, SyncMode, TriggerEdge, TriggerPulse,
};
