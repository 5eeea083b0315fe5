// surfbind/src/swap.rs
//
//! Presentation: buffer swaps and the per-drawable swap interval.

use crate::device::Device;
use crate::error::{Error, WindowingApiError};
use crate::surface::{lock_buffers, Drawable, DrawableID};

use log::trace;
use std::sync::Arc;
use std::thread;

impl Device {
    /// Presents the back buffer of a drawable.
    ///
    /// This does not depend on any context being current. Single-buffered formats, and drawables
    /// with no format yet, have nothing to present and succeed trivially.
    pub fn swap_buffers(&self, drawable: DrawableID) -> Result<(), Error> {
        self.record(self.swap_buffers_inner(drawable))
    }

    /// Sets the swap interval of the calling thread's current draw drawable.
    ///
    /// Negative intervals request adaptive vsync and are only accepted when the device was
    /// opened with `swap_control_tear`.
    pub fn set_swap_interval(&self, interval: i32) -> Result<(), Error> {
        let result = self.current_draw_target().and_then(|drawable| {
            if interval < 0 && !self.attributes().swap_control_tear {
                return Err(Error::SwapIntervalFailed(WindowingApiError::InvalidData));
            }
            drawable.set_swap_interval(interval);
            trace!("Set swap interval of {:?} to {}", drawable.id, interval);
            Ok(())
        });
        self.record(result)
    }

    /// Returns the swap interval of the calling thread's current draw drawable.
    pub fn swap_interval(&self) -> Result<i32, Error> {
        let result = self
            .current_draw_target()
            .map(|drawable| drawable.swap_interval());
        self.record(result)
    }

    fn swap_buffers_inner(&self, id: DrawableID) -> Result<(), Error> {
        let drawable = self.drawable(id).map_err(Error::SwapBuffersFailed)?;
        let double_buffered = drawable
            .pixel_format()
            .and_then(|pixel_format| self.catalog().get(pixel_format))
            .map_or(false, |format| format.descriptor.is_double_buffered());
        if double_buffered {
            let mut buffers = lock_buffers(&drawable.buffers);
            let buffers = &mut *buffers;
            buffers.front.copy_from_slice(&buffers.back);
        }
        Ok(())
    }

    fn current_draw_target(&self) -> Result<Arc<Drawable>, Error> {
        let contexts = self.contexts();
        let (_, state) = contexts
            .current_state(thread::current().id())
            .ok_or(Error::SwapIntervalFailed(WindowingApiError::InvalidOperation))?;
        let binding = match state.binding {
            Some(binding) if !state.detached => binding,
            _ => return Err(Error::SwapIntervalFailed(WindowingApiError::InvalidHandle)),
        };
        self.drawable(binding.draw).map_err(Error::SwapIntervalFailed)
    }
}
