//! Parameter accessor.
//!
//! Parameters are read and written by name through the SDK on every call;
//! nothing is cached and no range checks are made here, the SDK being the
//! authority on acceptable values. [`ParameterKey`] lists the documented
//! keys, but [`DeformableMirror::get`] and [`DeformableMirror::set`] accept
//! any key string.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::device::DeformableMirror;
use crate::error::{AlpaoError, ErrorDetail, ParameterOperation, Result};
use crate::native::{c_string, NativeApi};

/// Which directions a parameter supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterAccess {
    /// Read only
    Get,
    /// Write only
    Set,
    /// Read and write
    GetSet,
}

impl ParameterAccess {
    /// Parameter can be read.
    pub fn can_get(self) -> bool {
        matches!(self, Self::Get | Self::GetSet)
    }

    /// Parameter can be written.
    pub fn can_set(self) -> bool {
        matches!(self, Self::Set | Self::GetSet)
    }
}

/// Documented ASDK parameter keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKey {
    /// Ethernet/USB synchronous-mode acknowledge timeout in ms
    AckTimeout,
    /// Write 1 to reset all DACs
    DacReset,
    /// Interface busy flag (0 or 1)
    ItfState,
    /// Write 1 to dump the internal log
    LogDump,
    /// Diagnostic verbosity, 0 to 4
    LogPrintLevel,
    /// Number of actuators
    NbOfActuator,
    /// 0 synchronous, 1 asynchronous
    SyncMode,
    /// Trigger output pulse width (0 or 1)
    TriggerMode,
    /// Input trigger edge (0, 1 or 2)
    TriggerIn,
    /// SDK error signalling mode (0 or 1)
    UseException,
    /// SDK version encoding
    VersionInfo,
}

impl ParameterKey {
    /// All documented keys.
    pub const ALL: [Self; 11] = [
        Self::AckTimeout,
        Self::DacReset,
        Self::ItfState,
        Self::LogDump,
        Self::LogPrintLevel,
        Self::NbOfActuator,
        Self::SyncMode,
        Self::TriggerMode,
        Self::TriggerIn,
        Self::UseException,
        Self::VersionInfo,
    ];

    /// Key string understood by the SDK.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AckTimeout => "AckTimeout",
            Self::DacReset => "DacReset",
            Self::ItfState => "ItfState",
            Self::LogDump => "LogDump",
            Self::LogPrintLevel => "LogPrintLevel",
            Self::NbOfActuator => "NbOfActuator",
            Self::SyncMode => "SyncMode",
            Self::TriggerMode => "TriggerMode",
            Self::TriggerIn => "TriggerIn",
            Self::UseException => "UseException",
            Self::VersionInfo => "VersionInfo",
        }
    }

    /// Documented access for this key.
    pub fn access(self) -> ParameterAccess {
        match self {
            Self::AckTimeout | Self::LogPrintLevel | Self::UseException => ParameterAccess::GetSet,
            Self::ItfState | Self::NbOfActuator | Self::VersionInfo => ParameterAccess::Get,
            Self::DacReset
            | Self::LogDump
            | Self::SyncMode
            | Self::TriggerMode
            | Self::TriggerIn => ParameterAccess::Set,
        }
    }
}

impl fmt::Display for ParameterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for ParameterKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Error returned when parsing an unknown key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownParameterKey(
    /// The string that did not match a documented key
    pub String,
);

impl fmt::Display for UnknownParameterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown parameter key '{}'", self.0)
    }
}

impl std::error::Error for UnknownParameterKey {}

impl FromStr for ParameterKey {
    type Err = UnknownParameterKey;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| UnknownParameterKey(s.to_string()))
    }
}

/// Value written by [`DeformableMirror::set`].
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    /// Sent through the numeric set entry point
    Numeric(f64),
    /// Sent through the string set entry point
    Text(String),
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        Self::Numeric(value)
    }
}

impl From<u32> for ParameterValue {
    fn from(value: u32) -> Self {
        Self::Numeric(f64::from(value))
    }
}

impl From<i32> for ParameterValue {
    fn from(value: i32) -> Self {
        Self::Numeric(f64::from(value))
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        Self::Numeric(if value { 1.0 } else { 0.0 })
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Blocking behaviour of the send call (`SyncMode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Send blocks until the command is applied
    Synchronous,
    /// Send returns immediately
    Asynchronous,
}

impl SyncMode {
    fn raw(self) -> f64 {
        match self {
            Self::Synchronous => 0.0,
            Self::Asynchronous => 1.0,
        }
    }
}

/// Trigger output pulse width (`TriggerMode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerPulse {
    /// Raw value 0
    Short,
    /// Raw value 1
    Long,
}

/// Input trigger edge (`TriggerIn`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEdge {
    /// Raw value 0
    Disabled,
    /// Raw value 1
    Rising,
    /// Raw value 2
    Falling,
}

impl<A: NativeApi> DeformableMirror<A> {
    /// Read a numeric parameter.
    pub fn get(&self, key: impl AsRef<str>) -> Result<f64> {
        let key = key.as_ref();
        let c_key = c_string("parameter key", key)?;
        let handle = self.live_handle()?;

        match self.api.get(handle, &c_key) {
            Some(value) => {
                debug!(identifier = %self.identifier, key, value, "Read parameter");
                Ok(value)
            }
            None => Err(AlpaoError::Parameter {
                key: key.to_string(),
                operation: ParameterOperation::Get,
                detail: ErrorDetail::pop(&self.api),
            }),
        }
    }

    /// Write a parameter, numeric or string depending on `value`.
    pub fn set(&mut self, key: impl AsRef<str>, value: impl Into<ParameterValue>) -> Result<()> {
        let key = key.as_ref();
        let value = value.into();
        let c_key = c_string("parameter key", key)?;
        let handle = self.live_handle()?;

        let status = match &value {
            ParameterValue::Numeric(number) => self.api.set(handle, &c_key, *number),
            ParameterValue::Text(text) => {
                let c_text = c_string("parameter value", text)?;
                self.api.set_string(handle, &c_key, &c_text)
            }
        };

        if !status.is_success() {
            return Err(AlpaoError::Parameter {
                key: key.to_string(),
                operation: ParameterOperation::Set,
                detail: ErrorDetail::pop(&self.api),
            });
        }

        debug!(identifier = %self.identifier, key, ?value, "Wrote parameter");
        Ok(())
    }

    /// Read a parameter that holds a whole number and convert it to `T`.
    ///
    /// The value is rounded first. Anything that does not fit `T` is an
    /// [`AlpaoError::UnexpectedValue`].
    fn get_whole<T: TryFrom<i64>>(&self, key: ParameterKey) -> Result<T> {
        let value = self.get(key)?;
        let rounded = value.round();
        let in_range = rounded.is_finite() && rounded.abs() < 2f64.powi(63);
        in_range
            .then(|| T::try_from(rounded as i64).ok())
            .flatten()
            .ok_or_else(|| AlpaoError::UnexpectedValue {
                key: key.as_str().to_string(),
                value,
            })
    }

    /// SDK version encoding (`VersionInfo`).
    pub fn version_info(&self) -> Result<u32> {
        self.get_whole(ParameterKey::VersionInfo)
    }

    /// Whether the interface is busy (`ItfState`).
    pub fn is_busy(&self) -> Result<bool> {
        Ok(self.get(ParameterKey::ItfState)? != 0.0)
    }

    /// Synchronous-mode acknowledge timeout (`AckTimeout`).
    pub fn ack_timeout(&self) -> Result<Duration> {
        self.get_whole(ParameterKey::AckTimeout)
            .map(Duration::from_millis)
    }

    /// Set the synchronous-mode acknowledge timeout, rounded to milliseconds.
    pub fn set_ack_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.set(ParameterKey::AckTimeout, timeout.as_millis() as f64)
    }

    /// Diagnostic verbosity (`LogPrintLevel`).
    pub fn log_print_level(&self) -> Result<u8> {
        self.get_whole(ParameterKey::LogPrintLevel)
    }

    /// Set diagnostic verbosity, 0 (quiet) to 4.
    pub fn set_log_print_level(&mut self, level: u8) -> Result<()> {
        self.set(ParameterKey::LogPrintLevel, f64::from(level))
    }

    /// Whether the SDK signals errors through exceptions (`UseException`).
    pub fn use_exception(&self) -> Result<bool> {
        Ok(self.get(ParameterKey::UseException)? != 0.0)
    }

    /// Select the SDK error signalling mode.
    pub fn set_use_exception(&mut self, enabled: bool) -> Result<()> {
        self.set(ParameterKey::UseException, enabled)
    }

    /// Select blocking or non-blocking sends.
    pub fn set_sync_mode(&mut self, mode: SyncMode) -> Result<()> {
        self.set(ParameterKey::SyncMode, mode.raw())
    }

    /// Select the trigger output pulse width.
    pub fn set_trigger_mode(&mut self, pulse: TriggerPulse) -> Result<()> {
        let raw = match pulse {
            TriggerPulse::Short => 0.0,
            TriggerPulse::Long => 1.0,
        };
        self.set(ParameterKey::TriggerMode, raw)
    }

    /// Select the input trigger edge.
    pub fn set_trigger_in(&mut self, edge: TriggerEdge) -> Result<()> {
        let raw = match edge {
            TriggerEdge::Disabled => 0.0,
            TriggerEdge::Rising => 1.0,
            TriggerEdge::Falling => 2.0,
        };
        self.set(ParameterKey::TriggerIn, raw)
    }

    /// Reset all digital-to-analog converters.
    pub fn reset_dacs(&mut self) -> Result<()> {
        self.set(ParameterKey::DacReset, 1.0)
    }

    /// Dump the SDK's internal log on its diagnostic output.
    pub fn dump_log(&mut self) -> Result<()> {
        self.set(ParameterKey::LogDump, 1.0)
    }
}
