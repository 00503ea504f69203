//! Command buffer and clamp.
//!
//! Every actuator value is clamped to `[CMD_MIN, CMD_MAX]` before it reaches
//! the SDK. A wrong-length command is rejected before any native call.

use tracing::debug;

use crate::device::DeformableMirror;
use crate::error::{AlpaoError, ErrorDetail, Result};
use crate::native::NativeApi;

/// Lowest actuator command accepted by the mirror.
pub const CMD_MIN: f64 = -1.0;
/// Highest actuator command accepted by the mirror.
pub const CMD_MAX: f64 = 1.0;

/// Clamp one actuator value to the safe range. NaN maps to the rest position.
#[inline]
pub fn clamp_command(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(CMD_MIN, CMD_MAX)
    }
}

/// Clamp `source` element-wise into `target`. Lengths must already match.
fn clamp_into(target: &mut [f64], source: &[f64]) {
    for (slot, &value) in target.iter_mut().zip(source) {
        *slot = clamp_command(value);
    }
}

impl<A: NativeApi> DeformableMirror<A> {
    /// Most recent command transmitted (post-clamp). No native call.
    pub fn last_command(&self) -> &[f64] {
        &self.last_command
    }

    /// Clamp and send one value per actuator.
    ///
    /// Returns the clamped values actually sent. On a native failure the
    /// attempted values are kept as [`DeformableMirror::last_command`].
    ///
    /// # Errors
    ///
    /// - [`AlpaoError::Dimension`] if `command.len()` differs from the actuator count
    /// - [`AlpaoError::Send`] if the SDK rejects the command
    pub fn send(&mut self, command: &[f64]) -> Result<&[f64]> {
        let expected = self.last_command.len();
        if command.len() != expected {
            return Err(AlpaoError::Dimension {
                expected,
                actual: command.len(),
            });
        }
        let handle = self.handle.as_ref().ok_or_else(|| AlpaoError::DeviceClosed {
            identifier: self.identifier.clone(),
        })?;

        clamp_into(&mut self.last_command, command);

        if !self.api.send(handle, &self.last_command).is_success() {
            return Err(AlpaoError::Send {
                identifier: self.identifier.clone(),
                detail: ErrorDetail::pop(&self.api),
            });
        }

        debug!(identifier = %self.identifier, n_actuators = expected, "Sent command");
        Ok(&self.last_command)
    }

    /// Like [`DeformableMirror::send`], and also writes the clamped values back into `command`.
    ///
    /// The caller's buffer reflects what was attempted even when the SDK
    /// rejects the send. Errors raised before clamping leave it untouched.
    pub fn send_and_overwrite(&mut self, command: &mut [f64]) -> Result<()> {
        let result = self.send(command).map(|_| ());
        if matches!(result, Ok(()) | Err(AlpaoError::Send { .. })) {
            command.copy_from_slice(&self.last_command);
        }
        result
    }

    /// Send a sequence of frames for the electronics to play back `n_repeat` times.
    ///
    /// `patterns` holds whole frames back to back, `n_actuators()` values each.
    /// Returns the clamped buffer; the last frame becomes the last command.
    pub fn send_pattern(&mut self, patterns: &[f64], n_repeat: u32) -> Result<Vec<f64>> {
        let n_actuators = self.last_command.len();
        let n_patterns = patterns.len() / n_actuators;
        if patterns.is_empty() || patterns.len() % n_actuators != 0 {
            return Err(AlpaoError::PatternDimension {
                n_actuators,
                actual: patterns.len(),
            });
        }
        let n_patterns = u32::try_from(n_patterns).map_err(|_| AlpaoError::PatternDimension {
            n_actuators,
            actual: patterns.len(),
        })?;
        let handle = self.handle.as_ref().ok_or_else(|| AlpaoError::DeviceClosed {
            identifier: self.identifier.clone(),
        })?;

        let mut clamped = vec![0.0; patterns.len()];
        clamp_into(&mut clamped, patterns);
        self.last_command
            .copy_from_slice(&clamped[clamped.len() - n_actuators..]);

        if !self
            .api
            .send_pattern(handle, &clamped, n_patterns, n_repeat)
            .is_success()
        {
            return Err(AlpaoError::Send {
                identifier: self.identifier.clone(),
                detail: ErrorDetail::pop(&self.api),
            });
        }

        debug!(
            identifier = %self.identifier,
            n_patterns,
            n_repeat,
            "Sent pattern"
        );
        Ok(clamped)
    }
}
