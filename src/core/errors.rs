/*!
 * Error Types
 * Module-tagged errors with thiserror, miette and serde support
 *
 * Every fallible operation reports the module it came from plus an error number.
 * The number is either an OS errno (1..=4095) or one of the custom numbers
 * starting at [`ERRNO_BASE`]. [`ErrorCode`] packs both into one integer the way
 * the device firmware expects: module id in the upper 16 bits, number in the
 * lower 16 bits.
 */

use super::types::Outcome;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// First custom error number; 1..ERRNO_BASE is reserved for the OS
pub const ERRNO_BASE: u16 = 4096;

/// Invalid or dead handle
pub const EMOD_INVALID: u16 = ERRNO_BASE;
/// Operation not implemented for this mode/protocol
pub const EMOD_NOIMPL: u16 = ERRNO_BASE + 1;
/// Object not initialized (e.g. connection not established yet)
pub const EMOD_NOINIT: u16 = ERRNO_BASE + 2;
/// Value out of range
pub const EMOD_RANGE: u16 = ERRNO_BASE + 3;
/// Resource busy / queue full
pub const EMOD_BUSY: u16 = ERRNO_BASE + 4;

/// Originating module of an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u16)]
pub enum ModuleId {
    Server = 6,
    Connection = 7,
    Log = 10,
    /// Synchronization, queues and tasks
    Osa = 11,
    /// Readiness probes and raw transfers
    Net = 12,
}

impl ModuleId {
    pub fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            6 => Some(Self::Server),
            7 => Some(Self::Connection),
            10 => Some(Self::Log),
            11 => Some(Self::Osa),
            12 => Some(Self::Net),
            _ => None,
        }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Server => "server",
            Self::Connection => "connection",
            Self::Log => "log",
            Self::Osa => "osa",
            Self::Net => "net",
        };
        f.write_str(name)
    }
}

/// Combined module/error code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorCode(pub u32);

impl ErrorCode {
    #[inline]
    pub const fn new(module: ModuleId, number: u16) -> Self {
        Self(((module as u32) << 16) | number as u32)
    }

    /// Raw module id (upper 16 bits)
    #[inline]
    pub const fn module_raw(self) -> u16 {
        (self.0 >> 16) as u16
    }

    pub fn module(self) -> Option<ModuleId> {
        ModuleId::from_raw(self.module_raw())
    }

    /// Error number (lower 16 bits)
    #[inline]
    pub const fn number(self) -> u16 {
        (self.0 & 0xffff) as u16
    }

    /// True when the number is one of the custom (non-OS) numbers
    #[inline]
    pub const fn is_custom(self) -> bool {
        self.number() >= ERRNO_BASE
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Unified error type with miette diagnostics
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum OsaError {
    #[error("[{module}] invalid handle: {what}")]
    #[diagnostic(
        code(osa::invalid_handle),
        help("The object was deleted or never existed. Do not use handles after delete().")
    )]
    InvalidHandle { module: ModuleId, what: String },

    #[error("[{module}] invalid argument: {reason}")]
    #[diagnostic(
        code(osa::invalid_argument),
        help("Check the argument against the object's configured limits.")
    )]
    InvalidArgument { module: ModuleId, reason: String },

    #[error("[{module}] not implemented: {what}")]
    #[diagnostic(
        code(osa::not_implemented),
        help("Only the network transport with TCP/IPv4 is implemented.")
    )]
    NotImplemented { module: ModuleId, what: String },

    #[error("[{module}] not initialized: {what}")]
    #[diagnostic(
        code(osa::not_initialized),
        help("Complete the setup step first (for connections: do_work until it reports ready).")
    )]
    NotInitialized { module: ModuleId, what: String },

    #[error("[{module}] out of range: {reason}")]
    #[diagnostic(code(osa::out_of_range))]
    OutOfRange { module: ModuleId, reason: String },

    #[error("[{module}] busy: {reason}")]
    #[diagnostic(code(osa::busy))]
    Busy { module: ModuleId, reason: String },

    #[error("[{module}] closed: {what}")]
    #[diagnostic(
        code(osa::closed),
        help("The peer shut the connection down or the object was deleted. Tear down and reconnect.")
    )]
    Closed { module: ModuleId, what: String },

    #[error("[{module}] os error {errno}: {message}")]
    #[diagnostic(code(osa::os_error))]
    Os {
        module: ModuleId,
        errno: i32,
        message: String,
    },

    #[error("[{module}] failed to spawn thread: {message}")]
    #[diagnostic(
        code(osa::spawn_failed),
        help("Check thread limits and the requested stack size.")
    )]
    Spawn { module: ModuleId, message: String },
}

impl OsaError {
    pub fn invalid_handle(module: ModuleId, what: impl Into<String>) -> Self {
        Self::InvalidHandle {
            module,
            what: what.into(),
        }
    }

    pub fn invalid_argument(module: ModuleId, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            module,
            reason: reason.into(),
        }
    }

    pub fn not_implemented(module: ModuleId, what: impl Into<String>) -> Self {
        Self::NotImplemented {
            module,
            what: what.into(),
        }
    }

    pub fn not_initialized(module: ModuleId, what: impl Into<String>) -> Self {
        Self::NotInitialized {
            module,
            what: what.into(),
        }
    }

    pub fn out_of_range(module: ModuleId, reason: impl Into<String>) -> Self {
        Self::OutOfRange {
            module,
            reason: reason.into(),
        }
    }

    pub fn busy(module: ModuleId, reason: impl Into<String>) -> Self {
        Self::Busy {
            module,
            reason: reason.into(),
        }
    }

    pub fn closed(module: ModuleId, what: impl Into<String>) -> Self {
        Self::Closed {
            module,
            what: what.into(),
        }
    }

    /// Wrap an I/O error, keeping its errno when there is one
    pub fn io(module: ModuleId, err: &std::io::Error) -> Self {
        Self::Os {
            module,
            errno: err.raw_os_error().unwrap_or(libc::EIO),
            message: err.to_string(),
        }
    }

    pub fn errno(module: ModuleId, errno: nix::errno::Errno) -> Self {
        Self::Os {
            module,
            errno: errno as i32,
            message: errno.desc().to_string(),
        }
    }

    pub fn module(&self) -> ModuleId {
        match self {
            Self::InvalidHandle { module, .. }
            | Self::InvalidArgument { module, .. }
            | Self::NotImplemented { module, .. }
            | Self::NotInitialized { module, .. }
            | Self::OutOfRange { module, .. }
            | Self::Busy { module, .. }
            | Self::Closed { module, .. }
            | Self::Os { module, .. }
            | Self::Spawn { module, .. } => *module,
        }
    }

    /// Re-attribute the error to the module that surfaces it
    pub fn in_module(mut self, to: ModuleId) -> Self {
        match &mut self {
            Self::InvalidHandle { module, .. }
            | Self::InvalidArgument { module, .. }
            | Self::NotImplemented { module, .. }
            | Self::NotInitialized { module, .. }
            | Self::OutOfRange { module, .. }
            | Self::Busy { module, .. }
            | Self::Closed { module, .. }
            | Self::Os { module, .. }
            | Self::Spawn { module, .. } => *module = to,
        }
        self
    }

    /// Error number without the module part
    pub fn number(&self) -> u16 {
        match self {
            Self::InvalidHandle { .. } | Self::InvalidArgument { .. } => EMOD_INVALID,
            Self::NotImplemented { .. } => EMOD_NOIMPL,
            Self::NotInitialized { .. } => EMOD_NOINIT,
            Self::OutOfRange { .. } => EMOD_RANGE,
            Self::Busy { .. } => EMOD_BUSY,
            Self::Closed { .. } => libc::EPIPE as u16,
            Self::Os { errno, .. } => (*errno).clamp(1, ERRNO_BASE as i32 - 1) as u16,
            Self::Spawn { .. } => libc::EAGAIN as u16,
        }
    }

    pub fn code(&self) -> ErrorCode {
        ErrorCode::new(self.module(), self.number())
    }

    /// Transient conditions the retry loops swallow
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Os { errno, .. } if *errno == libc::EINTR || *errno == libc::EAGAIN)
    }
}

/// Result type for adapter operations
pub type OsaResult<T> = std::result::Result<T, OsaError>;

/// Flatten a tri-state result into the raw integer convention:
/// negative combined code on error, 0 when pending, the value when ready.
pub fn outcome_code(result: &OsaResult<Outcome<usize>>) -> i64 {
    match result {
        Ok(Outcome::Ready(n)) => *n as i64,
        Ok(Outcome::Pending) => 0,
        Err(e) => -(e.code().0 as i64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_code_packs_module_and_number() {
        let code = ErrorCode::new(ModuleId::Connection, EMOD_INVALID);
        assert_eq!(code.0, (7 << 16) | 4096);
        assert_eq!(code.module(), Some(ModuleId::Connection));
        assert_eq!(code.number(), EMOD_INVALID);
        assert!(code.is_custom());
    }

    #[test]
    fn test_os_error_keeps_errno() {
        let err = OsaError::errno(ModuleId::Connection, nix::errno::Errno::ECONNREFUSED);
        assert_eq!(err.number(), libc::ECONNREFUSED as u16);
        assert!(!err.code().is_custom());
        assert_eq!(err.code().module(), Some(ModuleId::Connection));
    }

    #[test]
    fn test_error_serialization() {
        let error = OsaError::not_implemented(ModuleId::Server, "usb transport");
        let json = serde_json::to_string(&error).unwrap();
        let deserialized: OsaError = serde_json::from_str(&json).unwrap();
        assert_eq!(error, deserialized);
    }

    #[test]
    fn test_outcome_code_convention() {
        assert_eq!(outcome_code(&Ok(Outcome::Ready(12))), 12);
        assert_eq!(outcome_code(&Ok(Outcome::Pending)), 0);
        let err = OsaError::invalid_handle(ModuleId::Server, "listener");
        assert!(outcome_code(&Err(err)) < 0);
    }

    #[test]
    fn test_transient_classification() {
        let eintr = OsaError::errno(ModuleId::Net, nix::errno::Errno::EINTR);
        let reset = OsaError::errno(ModuleId::Net, nix::errno::Errno::ECONNRESET);
        assert!(eintr.is_transient());
        assert!(!reset.is_transient());
    }

    #[test]
    fn test_display_includes_module() {
        let error = OsaError::busy(ModuleId::Osa, "mutex already held");
        assert_eq!(error.to_string(), "[osa] busy: mutex already held");
    }
}
