// surfbind/src/proc_address.rs
//
//! Entry point lookup through the current context.

use crate::device::Device;
use crate::error::{Error, WindowingApiError};

use log::trace;
use std::num::NonZeroUsize;
use std::thread;

// Entry points past GL 1.1 and the WGL extensions the device advertises. The GL 1.0 and 1.1
// core is exported directly and never resolves here.
static ENTRY_POINTS: &[&str] = &[
    "glActiveTexture",
    "glActiveTextureARB",
    "glBlendColor",
    "glClientActiveTextureARB",
    "glCompressedTexImage2D",
    "glDrawRangeElements",
    "glMultiTexCoord2fARB",
    "glTexImage3D",
    "wglChoosePixelFormatARB",
    "wglCreateContextAttribsARB",
    "wglCreatePbufferARB",
    "wglDestroyPbufferARB",
    "wglGetCurrentReadDCARB",
    "wglGetExtensionsStringARB",
    "wglGetExtensionsStringEXT",
    "wglGetPbufferDCARB",
    "wglGetPixelFormatAttribfvARB",
    "wglGetPixelFormatAttribivARB",
    "wglGetSwapIntervalEXT",
    "wglMakeContextCurrentARB",
    "wglQueryPbufferARB",
    "wglReleasePbufferDCARB",
    "wglSwapIntervalEXT",
];

/// The address of an extension entry point. Never null.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProcAddress(pub NonZeroUsize);

impl Device {
    /// Resolves an extension entry point through the calling thread's current context.
    ///
    /// Fails with `InvalidOperation` when no usable context is current, and with `InvalidData`
    /// for names the context does not export this way, GL 1.0 and 1.1 core functions included.
    pub fn get_proc_address(&self, symbol_name: &str) -> Result<ProcAddress, Error> {
        self.record(self.get_proc_address_inner(symbol_name))
    }

    fn get_proc_address_inner(&self, symbol_name: &str) -> Result<ProcAddress, Error> {
        let contexts = self.contexts();
        match contexts.current_state(thread::current().id()) {
            Some((_, state)) if !state.detached => {}
            _ => {
                return Err(Error::ProcAddressLookupFailed(
                    WindowingApiError::InvalidOperation,
                ))
            }
        }

        let address = ENTRY_POINTS
            .iter()
            .position(|entry_point| *entry_point == symbol_name)
            .and_then(|slot| NonZeroUsize::new(slot + 1))
            .ok_or(Error::ProcAddressLookupFailed(WindowingApiError::InvalidData))?;
        trace!("Resolved {} to {:#x}", symbol_name, address.get());
        Ok(ProcAddress(address))
    }
}
