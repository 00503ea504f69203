//! Core device abstraction for ALPAO deformable mirrors.
//!
//! [`DeformableMirror`] owns the SDK handle with RAII semantics: the handle is
//! released on [`DeformableMirror::close`] or, failing that, on drop.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::AlpaoConfig;
use crate::error::{pop_last_error, print_last_error, AlpaoError, ErrorDetail, ErrorRecord, Result};
use crate::native::{c_string, AsdkSdk, NativeApi};
use crate::parameter::ParameterKey;

/// Restores the process working directory when dropped.
struct WorkingDirGuard {
    previous: PathBuf,
}

impl WorkingDirGuard {
    fn enter(dir: &Path) -> Result<Self> {
        let previous = std::env::current_dir().map_err(|source| AlpaoError::WorkingDirectory {
            path: dir.to_path_buf(),
            source,
        })?;
        std::env::set_current_dir(dir).map_err(|source| AlpaoError::WorkingDirectory {
            path: dir.to_path_buf(),
            source,
        })?;
        debug!(dir = %dir.display(), "Entered mirror configuration directory");
        Ok(Self { previous })
    }
}

impl Drop for WorkingDirGuard {
    fn drop(&mut self) {
        if let Err(e) = std::env::set_current_dir(&self.previous) {
            warn!(
                dir = %self.previous.display(),
                error = %e,
                "Failed to restore working directory"
            );
        }
    }
}

/// Split an identifier into the directory to open from and the serial name.
///
/// Identifiers without a path separator are plain serial names.
fn split_identifier(identifier: &str) -> Result<(Option<PathBuf>, String)> {
    if !identifier.chars().any(std::path::is_separator) {
        return Ok((None, identifier.to_string()));
    }

    let path = Path::new(identifier);
    let serial = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| AlpaoError::InvalidString {
            what: "mirror identifier",
            value: identifier.to_string(),
        })?;
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf);
    Ok((dir, serial.to_string()))
}

/// A connection to one ALPAO deformable mirror.
///
/// The command buffer is sized once at open from the `NbOfActuator`
/// parameter and always holds the last command sent, clamped to
/// [`crate::CMD_MIN`]..=[`crate::CMD_MAX`].
///
/// # Thread Safety
///
/// All operations take `&self` or `&mut self` and block until the SDK
/// returns. Share a mirror across threads by wrapping it in a mutex.
pub struct DeformableMirror<A: NativeApi = AsdkSdk> {
    pub(crate) api: A,
    pub(crate) handle: Option<A::Handle>,
    pub(crate) identifier: String,
    pub(crate) last_command: Vec<f64>,
}

impl DeformableMirror<AsdkSdk> {
    /// Open a mirror through the vendor SDK.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use daq_driver_alpao::DeformableMirror;
    ///
    /// let mut dm = DeformableMirror::open("BOL143")?;
    /// let flat = vec![0.0; dm.n_actuators()];
    /// dm.send(&flat)?;
    /// dm.close()?;
    /// # Ok::<(), daq_driver_alpao::AlpaoError>(())
    /// ```
    pub fn open(identifier: &str) -> Result<Self> {
        Self::open_with(AsdkSdk, identifier)
    }

    /// Open and configure a mirror through the vendor SDK.
    pub fn from_config(config: &AlpaoConfig) -> Result<Self> {
        Self::open_with_config(AsdkSdk, config)
    }
}

impl<A: NativeApi> DeformableMirror<A> {
    /// Open a mirror through the given native layer.
    ///
    /// `identifier` is a serial name such as `"BOL143"`, or a path such as
    /// `"/opt/alpao/config/BOL143"`. For a path, the working directory is
    /// switched to its directory for the duration of the SDK open call so
    /// the SDK finds the mirror's configuration files, then restored.
    ///
    /// # Errors
    ///
    /// - [`AlpaoError::Open`] if the SDK returns no handle or the actuator
    ///   count cannot be read (the handle is released first)
    /// - [`AlpaoError::InvalidActuatorCount`] if the reported count is not a whole
    ///   number between 1 and `u32::MAX`
    /// - [`AlpaoError::WorkingDirectory`] if the configuration directory is unusable
    pub fn open_with(api: A, identifier: &str) -> Result<Self> {
        let (dir, serial) = split_identifier(identifier)?;
        let c_serial = c_string("mirror identifier", &serial)?;

        let handle = {
            let _cwd = dir.as_deref().map(WorkingDirGuard::enter).transpose()?;
            api.open(&c_serial)
        };
        let Some(handle) = handle else {
            return Err(AlpaoError::Open {
                identifier: identifier.to_string(),
                detail: ErrorDetail::pop(&api),
            });
        };

        let c_key = c_string("parameter key", ParameterKey::NbOfActuator.as_str())?;
        let raw_count = match api.get(&handle, &c_key) {
            Some(value) => value,
            None => {
                let detail = ErrorDetail::pop(&api);
                release_after_failed_open(&api, handle, identifier);
                return Err(AlpaoError::Open {
                    identifier: identifier.to_string(),
                    detail,
                });
            }
        };
        // The SDK reports the count as a UInt
        if !raw_count.is_finite()
            || raw_count < 1.0
            || raw_count > f64::from(u32::MAX)
            || raw_count.fract() != 0.0
        {
            release_after_failed_open(&api, handle, identifier);
            return Err(AlpaoError::InvalidActuatorCount {
                identifier: identifier.to_string(),
                value: raw_count,
            });
        }
        let n_actuators = raw_count as usize;

        info!(identifier = %identifier, n_actuators, "Opened deformable mirror");

        Ok(Self {
            api,
            handle: Some(handle),
            identifier: identifier.to_string(),
            last_command: vec![0.0; n_actuators],
        })
    }

    /// Open the configured mirror and apply the configured settings.
    ///
    /// If a setting is rejected the mirror is closed before the error is returned.
    pub fn open_with_config(api: A, config: &AlpaoConfig) -> Result<Self> {
        let identifier = config.resolved_identifier()?;
        let mut dm = Self::open_with(api, &identifier)?;
        if let Err(e) = dm.apply_config(config) {
            if let Err(close_err) = dm.close() {
                warn!(identifier = %identifier, error = %close_err, "Close after failed configuration also failed");
            }
            return Err(e);
        }
        Ok(dm)
    }

    fn apply_config(&mut self, config: &AlpaoConfig) -> Result<()> {
        if let Some(enabled) = config.use_exception {
            self.set_use_exception(enabled)?;
        }
        if let Some(level) = config.log_print_level {
            self.set_log_print_level(level)?;
        }
        if let Some(mode) = config.sync_mode {
            self.set_sync_mode(mode)?;
        }
        if let Some(timeout) = config.ack_timeout() {
            self.set_ack_timeout(timeout)?;
        }
        Ok(())
    }

    /// Identifier the mirror was opened with.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Number of actuators, fixed at open.
    pub fn n_actuators(&self) -> usize {
        self.last_command.len()
    }

    /// Whether the native handle is still held.
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    pub(crate) fn live_handle(&self) -> Result<&A::Handle> {
        self.handle.as_ref().ok_or_else(|| AlpaoError::DeviceClosed {
            identifier: self.identifier.clone(),
        })
    }

    /// Zero the command buffer, then reset the mirror.
    ///
    /// The local buffer stays zeroed even if the SDK reports a failure.
    pub fn reset(&mut self) -> Result<()> {
        let handle = self.handle.as_ref().ok_or_else(|| AlpaoError::DeviceClosed {
            identifier: self.identifier.clone(),
        })?;
        self.last_command.fill(0.0);

        if !self.api.reset(handle).is_success() {
            return Err(AlpaoError::Reset {
                identifier: self.identifier.clone(),
                detail: ErrorDetail::pop(&self.api),
            });
        }
        debug!(identifier = %self.identifier, "Reset deformable mirror");
        Ok(())
    }

    /// Halt asynchronous command execution. The command buffer is untouched.
    pub fn stop(&mut self) -> Result<()> {
        let handle = self.live_handle()?;
        if !self.api.stop(handle).is_success() {
            return Err(AlpaoError::Stop {
                identifier: self.identifier.clone(),
                detail: ErrorDetail::pop(&self.api),
            });
        }
        debug!(identifier = %self.identifier, "Stopped deformable mirror");
        Ok(())
    }

    /// Release the native handle. Calling this on a closed mirror does nothing.
    ///
    /// The handle is given up even if the SDK reports a release failure, so
    /// a later `close` or drop never releases it twice.
    pub fn close(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        if !self.api.release(handle).is_success() {
            return Err(AlpaoError::Release {
                identifier: self.identifier.clone(),
                detail: ErrorDetail::pop(&self.api),
            });
        }
        info!(identifier = %self.identifier, "Closed deformable mirror");
        Ok(())
    }

    /// Pop the most recent record from the SDK error stack.
    pub fn pop_last_error(&self) -> Result<ErrorRecord> {
        pop_last_error(&self.api)
    }

    /// Ask the SDK to print its last error on its diagnostic stream.
    pub fn print_last_error(&self) {
        print_last_error(&self.api);
    }
}

fn release_after_failed_open<A: NativeApi>(api: &A, handle: A::Handle, identifier: &str) {
    if !api.release(handle).is_success() {
        warn!(identifier = %identifier, "Failed to release handle after incomplete open");
    }
}

impl<A: NativeApi> Drop for DeformableMirror<A> {
    fn drop(&mut self) {
        if self.handle.is_none() {
            return;
        }
        debug!(identifier = %self.identifier, "Closing deformable mirror on drop");
        if let Err(e) = self.close() {
            warn!(identifier = %self.identifier, error = %e, "Error closing deformable mirror");
        }
    }
}

impl<A: NativeApi> std::fmt::Debug for DeformableMirror<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeformableMirror")
            .field("identifier", &self.identifier)
            .field("n_actuators", &self.n_actuators())
            .field("open", &self.is_open())
            .finish()
    }
}
