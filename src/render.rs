// surfbind/src/render.rs
//
//! A minimal GL stand-in that renders through the calling thread's current context.
//!
//! It exists so that binding can be observed: clears land in the current draw drawable, reads
//! come from the current read drawable, and texture names live in the context's share group.

use crate::context::{Binding, ContextID, ContextState, ContextTable};
use crate::device::Device;
use crate::error::{Error, WindowingApiError};
use crate::surface::{lock_buffers, Drawable, DrawableID};

use std::sync::Arc;
use std::thread;

const CLEAR_MASK: u32 = glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT | glow::STENCIL_BUFFER_BIT;

impl Device {
    /// Sets the clear color of the current context. Components are clamped to [0, 1].
    pub fn clear_color(&self, red: f32, green: f32, blue: f32, alpha: f32) -> Result<(), Error> {
        let result = self.with_current_context(|contexts, context| {
            let state = contexts
                .contexts
                .get_mut(&context)
                .ok_or(Error::RenderingFailed(WindowingApiError::InvalidOperation))?;
            state.clear_color = [red, green, blue, alpha].map(|c| c.max(0.0).min(1.0));
            Ok(())
        });
        self.record(result)
    }

    /// Clears the buffers named by `mask` in the current draw drawable.
    ///
    /// Only the color buffer has storage; depth and stencil bits are accepted and ignored.
    pub fn clear(&self, mask: u32) -> Result<(), Error> {
        let result = self.with_current_context(|contexts, context| {
            if mask & !CLEAR_MASK != 0 {
                return Err(Error::RenderingFailed(WindowingApiError::InvalidData));
            }
            if mask & glow::COLOR_BUFFER_BIT == 0 {
                return Ok(());
            }
            let state = current_state(contexts, context)?;
            let draw = self.bound_drawable(state, |binding| binding.draw)?;
            let double_buffered = self.is_double_buffered(state);
            let pixel = state.clear_color.map(|c| (c * 255.0).round() as u8);
            let mut buffers = lock_buffers(&draw.buffers);
            for chunk in buffers.buffer_mut(double_buffered).chunks_exact_mut(4) {
                chunk.copy_from_slice(&pixel);
            }
            Ok(())
        });
        self.record(result)
    }

    /// Reads a rectangle of the current read drawable as bottom-up RGBA8 rows.
    ///
    /// Double-buffered formats read the back buffer. Only `glow::RGBA` with
    /// `glow::UNSIGNED_BYTE` is supported, and the rectangle must lie inside the drawable. A read
    /// drawable destroyed since the context was bound fails with `InvalidOperation`.
    pub fn read_pixels(
        &self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        format: u32,
        gl_type: u32,
    ) -> Result<Vec<u8>, Error> {
        let result = self.with_current_context(|contexts, context| {
            if format != glow::RGBA || gl_type != glow::UNSIGNED_BYTE {
                return Err(Error::RenderingFailed(WindowingApiError::InvalidData));
            }
            let state = current_state(contexts, context)?;
            let read = self.bound_drawable(state, |binding| binding.read)?;
            let double_buffered = self.is_double_buffered(state);
            let buffers = lock_buffers(&read.buffers);
            let size = buffers.size;
            if x < 0
                || y < 0
                || width < 0
                || height < 0
                || x.checked_add(width).map_or(true, |right| right > size.width)
                || y.checked_add(height).map_or(true, |top| top > size.height)
            {
                return Err(Error::RenderingFailed(WindowingApiError::InvalidData));
            }

            let source = buffers.buffer(double_buffered);
            let stride = size.width as usize * 4;
            let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
            for row in y as usize..(y + height) as usize {
                let start = row * stride + x as usize * 4;
                pixels.extend_from_slice(&source[start..start + width as usize * 4]);
            }
            Ok(pixels)
        });
        self.record(result)
    }

    /// Waits for rendering to complete, which for this stand-in is immediate.
    pub fn finish(&self) -> Result<(), Error> {
        let result = self.with_current_context(|_, _| Ok(()));
        self.record(result)
    }

    /// Allocates a texture name in the current context's share group.
    pub fn gen_texture(&self) -> Result<u32, Error> {
        let result = self.with_current_context(|contexts, context| {
            let share_group = current_state(contexts, context)?.share_group;
            let group = contexts
                .share_groups
                .get_mut(&share_group)
                .ok_or(Error::RenderingFailed(WindowingApiError::InvalidOperation))?;
            group.next_texture += 1;
            group.textures.insert(group.next_texture);
            Ok(group.next_texture)
        });
        self.record(result)
    }

    /// Deletes a texture name. Unknown names are ignored, as in GL.
    pub fn delete_texture(&self, texture: u32) -> Result<(), Error> {
        let result = self.with_current_context(|contexts, context| {
            let share_group = current_state(contexts, context)?.share_group;
            if let Some(group) = contexts.share_groups.get_mut(&share_group) {
                group.textures.remove(&texture);
            }
            Ok(())
        });
        self.record(result)
    }

    /// Whether `texture` names a texture visible to the current context.
    pub fn is_texture(&self, texture: u32) -> Result<bool, Error> {
        let result = self.with_current_context(|contexts, context| {
            let share_group = current_state(contexts, context)?.share_group;
            Ok(contexts
                .share_groups
                .get(&share_group)
                .map_or(false, |group| group.textures.contains(&texture)))
        });
        self.record(result)
    }

    fn with_current_context<T, F>(&self, f: F) -> Result<T, Error>
    where
        F: FnOnce(&mut ContextTable, ContextID) -> Result<T, Error>,
    {
        let mut contexts = self.contexts();
        let context = match contexts.current_state(thread::current().id()) {
            Some((context, state)) if !state.detached => context,
            _ => return Err(Error::RenderingFailed(WindowingApiError::InvalidOperation)),
        };
        f(&mut contexts, context)
    }

    fn bound_drawable<F>(&self, state: &ContextState, target: F) -> Result<Arc<Drawable>, Error>
    where
        F: FnOnce(Binding) -> DrawableID,
    {
        let binding = state
            .binding
            .ok_or(Error::RenderingFailed(WindowingApiError::InvalidOperation))?;
        self.drawable(target(binding))
            .map_err(|_| Error::RenderingFailed(WindowingApiError::InvalidOperation))
    }

    fn is_double_buffered(&self, state: &ContextState) -> bool {
        self.catalog()
            .get(state.pixel_format)
            .map_or(false, |format| format.descriptor.is_double_buffered())
    }
}

fn current_state(contexts: &ContextTable, context: ContextID) -> Result<&ContextState, Error> {
    contexts
        .contexts
        .get(&context)
        .ok_or(Error::RenderingFailed(WindowingApiError::InvalidOperation))
}
