// surfbind/src/error.rs
//
//! Various errors that methods can produce.

use std::fmt::{self, Display, Formatter};

/// Various errors that methods can produce.
///
/// Each variant names the operation that failed and carries the windowing-level error code that
/// would have been reported through the thread's last-error slot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Error {
    /// Querying, describing or assigning a pixel format failed.
    PixelFormatSelectionFailed(WindowingApiError),
    /// No pixel format satisfied the mandatory flags of the request.
    NoPixelFormatFound,
    /// The system couldn't create a rendering context.
    ContextCreationFailed(WindowingApiError),
    /// The system couldn't destroy the rendering context.
    ContextDestructionFailed(WindowingApiError),
    /// The system couldn't make the rendering context current or not current.
    MakeCurrentFailed(WindowingApiError),
    /// The object namespaces of two contexts couldn't be merged.
    ShareListsFailed(WindowingApiError),
    /// State couldn't be copied from one context to another.
    ContextCopyFailed(WindowingApiError),
    /// The entry point isn't available through the current context.
    ProcAddressLookupFailed(WindowingApiError),
    /// A window, bitmap or pbuffer couldn't be created.
    SurfaceCreationFailed(WindowingApiError),
    /// A window, bitmap, pbuffer or pbuffer DC couldn't be destroyed or released.
    SurfaceDestructionFailed(WindowingApiError),
    /// An operation on an existing drawable failed.
    SurfaceQueryFailed(WindowingApiError),
    /// Presenting the back buffer failed.
    SwapBuffersFailed(WindowingApiError),
    /// Setting or reading the swap interval failed.
    SwapIntervalFailed(WindowingApiError),
    /// A rendering call was issued without a usable current context.
    RenderingFailed(WindowingApiError),
}

/// The closed set of error codes that the windowing layer reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WindowingApiError {
    /// The operation referenced a stale, null or never-validly-bound handle.
    InvalidHandle,
    /// The operation required a pixel format that was missing or incompatible.
    InvalidPixelFormat,
    /// The context is owned by another thread.
    Busy,
    /// Rendering was attempted through a detached or unbound context, or the request is not
    /// permitted in the current state.
    InvalidOperation,
    /// Malformed input.
    InvalidData,
}

impl Error {
    /// Returns the windowing-level code that this error reports.
    pub fn code(&self) -> WindowingApiError {
        match *self {
            Error::NoPixelFormatFound => WindowingApiError::InvalidPixelFormat,
            Error::PixelFormatSelectionFailed(code)
            | Error::ContextCreationFailed(code)
            | Error::ContextDestructionFailed(code)
            | Error::MakeCurrentFailed(code)
            | Error::ShareListsFailed(code)
            | Error::ContextCopyFailed(code)
            | Error::ProcAddressLookupFailed(code)
            | Error::SurfaceCreationFailed(code)
            | Error::SurfaceDestructionFailed(code)
            | Error::SurfaceQueryFailed(code)
            | Error::SwapBuffersFailed(code)
            | Error::SwapIntervalFailed(code)
            | Error::RenderingFailed(code) => code,
        }
    }
}

impl WindowingApiError {
    /// The Win32 error number a WGL implementation stores for this code.
    pub fn win32_code(self) -> u32 {
        match self {
            WindowingApiError::InvalidHandle => 6,
            WindowingApiError::InvalidData => 13,
            WindowingApiError::Busy => 170,
            WindowingApiError::InvalidPixelFormat => 2000,
            WindowingApiError::InvalidOperation => 4317,
        }
    }
}

impl Display for WindowingApiError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let message = match *self {
            WindowingApiError::InvalidHandle => "invalid handle",
            WindowingApiError::InvalidPixelFormat => "invalid pixel format",
            WindowingApiError::Busy => "resource busy",
            WindowingApiError::InvalidOperation => "invalid operation",
            WindowingApiError::InvalidData => "invalid data",
        };
        f.write_str(message)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match *self {
            Error::NoPixelFormatFound => f.write_str("no matching pixel format"),
            Error::PixelFormatSelectionFailed(code) => write!(f, "pixel format query: {}", code),
            Error::ContextCreationFailed(code) => write!(f, "context creation: {}", code),
            Error::ContextDestructionFailed(code) => write!(f, "context destruction: {}", code),
            Error::MakeCurrentFailed(code) => write!(f, "make current: {}", code),
            Error::ShareListsFailed(code) => write!(f, "share lists: {}", code),
            Error::ContextCopyFailed(code) => write!(f, "context copy: {}", code),
            Error::ProcAddressLookupFailed(code) => write!(f, "proc address lookup: {}", code),
            Error::SurfaceCreationFailed(code) => write!(f, "surface creation: {}", code),
            Error::SurfaceDestructionFailed(code) => write!(f, "surface destruction: {}", code),
            Error::SurfaceQueryFailed(code) => write!(f, "surface query: {}", code),
            Error::SwapBuffersFailed(code) => write!(f, "swap buffers: {}", code),
            Error::SwapIntervalFailed(code) => write!(f, "swap interval: {}", code),
            Error::RenderingFailed(code) => write!(f, "rendering: {}", code),
        }
    }
}

impl std::error::Error for Error {}
