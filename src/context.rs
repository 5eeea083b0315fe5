// surfbind/src/context.rs
//
//! Rendering contexts: creation, sharing, current-context binding and destruction.

use crate::device::{allocate_handle, Device, SharePolicy};
use crate::error::{Error, WindowingApiError};
use crate::info::GLVersion;
use crate::pixel_format::{Acceleration, PixelFormatIndex};
use crate::surface::DrawableID;

use bitflags::bitflags;
use fnv::{FnvHashMap, FnvHashSet};
use log::{debug, trace, warn};
use std::fmt::{self, Display, Formatter};
use std::thread::{self, ThreadId};

/// An opaque handle to a rendering context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContextID(pub u64);

impl Display for ContextID {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{:?}", *self)
    }
}

bitflags! {
    /// Flags accepted by `Device::create_context_with_attributes()`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ContextAttributeFlags: u8 {
        const DEBUG                 = 0x01;
        const FORWARD_COMPATIBLE    = 0x02;
        const CORE_PROFILE          = 0x04;
        const COMPATIBILITY_PROFILE = 0x08;
    }
}

/// The version and flags a context is created with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContextAttributes {
    /// The requested GL version. The default, 1.0, means no particular version; anything else
    /// must be a released version no newer than the device's `max_gl_version`.
    pub version: GLVersion,
    /// Debug, forward-compatible and profile flags. At most one profile may be requested, and
    /// forward compatibility needs version 3.0 or later.
    pub flags: ContextAttributeFlags,
}

impl ContextAttributes {
    /// What `Device::create_context()` records: no version request and no flags.
    #[inline]
    pub fn legacy() -> ContextAttributes {
        ContextAttributes {
            version: GLVersion::default(),
            flags: ContextAttributeFlags::empty(),
        }
    }

    fn validate(&self, max_version: GLVersion) -> Result<(), WindowingApiError> {
        if !self.version.exists() || self.version > max_version {
            return Err(WindowingApiError::InvalidData);
        }
        if self.flags.contains(
            ContextAttributeFlags::CORE_PROFILE | ContextAttributeFlags::COMPATIBILITY_PROFILE,
        ) {
            return Err(WindowingApiError::InvalidData);
        }
        if self.flags.contains(ContextAttributeFlags::FORWARD_COMPATIBLE)
            && self.version < GLVersion::new(3, 0)
        {
            return Err(WindowingApiError::InvalidData);
        }
        Ok(())
    }
}

impl Default for ContextAttributes {
    #[inline]
    fn default() -> ContextAttributes {
        ContextAttributes::legacy()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ShareGroupID(u64);

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Binding {
    pub(crate) thread: ThreadId,
    pub(crate) draw: DrawableID,
    pub(crate) read: DrawableID,
}

pub(crate) struct ContextState {
    pub(crate) pixel_format: PixelFormatIndex,
    pub(crate) acceleration: Acceleration,
    pub(crate) attributes: ContextAttributes,
    pub(crate) binding: Option<Binding>,
    pub(crate) ever_current: bool,
    // Set when the draw drawable is destroyed while this context is current on it.
    pub(crate) detached: bool,
    pub(crate) share_group: ShareGroupID,
    pub(crate) clear_color: [f32; 4],
}

#[derive(Default)]
pub(crate) struct ShareGroup {
    pub(crate) members: FnvHashSet<ContextID>,
    pub(crate) textures: FnvHashSet<u32>,
    pub(crate) next_texture: u32,
}

/// Contexts, the per-thread current-context slots and the share groups, guarded together so
/// that binding, sharing and deletion are serialised.
#[derive(Default)]
pub(crate) struct ContextTable {
    pub(crate) contexts: FnvHashMap<ContextID, ContextState>,
    pub(crate) current: FnvHashMap<ThreadId, ContextID>,
    pub(crate) share_groups: FnvHashMap<ShareGroupID, ShareGroup>,
}

impl ContextTable {
    fn insert(&mut self, id: ContextID, state: ContextState) {
        self.share_groups
            .entry(state.share_group)
            .or_insert_with(ShareGroup::default)
            .members
            .insert(id);
        self.contexts.insert(id, state);
    }

    fn remove(&mut self, id: ContextID) {
        let state = match self.contexts.remove(&id) {
            Some(state) => state,
            None => return,
        };
        if let Some(binding) = state.binding {
            self.current.remove(&binding.thread);
        }
        let empty = match self.share_groups.get_mut(&state.share_group) {
            Some(group) => {
                group.members.remove(&id);
                group.members.is_empty()
            }
            None => false,
        };
        if empty {
            self.share_groups.remove(&state.share_group);
        }
    }

    /// Releases whatever is current on `thread`.
    pub(crate) fn release(&mut self, thread: ThreadId) {
        if let Some(id) = self.current.remove(&thread) {
            if let Some(state) = self.contexts.get_mut(&id) {
                state.binding = None;
            }
            trace!("Released {:?} from {:?}", id, thread);
        }
    }

    /// Returns the context current on `thread` with its state.
    pub(crate) fn current_state(&self, thread: ThreadId) -> Option<(ContextID, &ContextState)> {
        let id = *self.current.get(&thread)?;
        self.contexts.get(&id).map(|state| (id, state))
    }

    /// Marks every context drawing to `drawable` as detached.
    ///
    /// Contexts that only read from it stay usable; reads through them fail until they are bound
    /// again.
    pub(crate) fn detach_drawable(&mut self, drawable: DrawableID) {
        for (id, state) in self.contexts.iter_mut() {
            if let Some(binding) = state.binding {
                if binding.draw == drawable {
                    warn!(
                        "Drawable {:?} destroyed while {:?} is current on {:?}",
                        drawable, id, binding.thread
                    );
                    state.detached = true;
                }
            }
        }
    }
}

impl Device {
    /// Creates a context for the pixel format of `drawable`.
    ///
    /// The drawable must already have a pixel format.
    pub fn create_context(&self, drawable: DrawableID) -> Result<ContextID, Error> {
        self.record(self.create_context_inner(drawable, None, ContextAttributes::legacy()))
    }

    /// Creates a context with an explicit GL version and flags, optionally sharing objects with
    /// `share_with` from the start.
    pub fn create_context_with_attributes(
        &self,
        drawable: DrawableID,
        share_with: Option<ContextID>,
        attributes: &ContextAttributes,
    ) -> Result<ContextID, Error> {
        let result = attributes
            .validate(self.attributes().max_gl_version)
            .map_err(Error::ContextCreationFailed)
            .and_then(|()| self.create_context_inner(drawable, share_with, *attributes));
        self.record(result)
    }

    /// Destroys a context.
    ///
    /// A context current on the calling thread is released first. A context current on another
    /// thread cannot be destroyed.
    pub fn destroy_context(&self, context: ContextID) -> Result<(), Error> {
        self.record(self.destroy_context_inner(context))
    }

    /// Makes `context` current on the calling thread, drawing to `draw` and reading from `read`.
    ///
    /// With no context and no drawables, this releases whatever is current. A context already
    /// current on another thread is never taken over.
    pub fn make_context_current(
        &self,
        context: Option<ContextID>,
        draw: Option<DrawableID>,
        read: Option<DrawableID>,
    ) -> Result<(), Error> {
        self.record(self.make_context_current_inner(context, draw, read))
    }

    /// Makes `context` current with `drawable` as both draw and read target.
    #[inline]
    pub fn make_current(&self, drawable: DrawableID, context: ContextID) -> Result<(), Error> {
        self.make_context_current(Some(context), Some(drawable), Some(drawable))
    }

    /// Releases the calling thread's current context, if any.
    #[inline]
    pub fn make_no_context_current(&self) -> Result<(), Error> {
        self.make_context_current(None, None, None)
    }

    /// Merges the object namespace of `dest` into that of `source`.
    ///
    /// `dest` must not own objects or share with anything yet. Depending on the device's
    /// `SharePolicy`, contexts that have already been current may be refused; callers should
    /// treat that as an accepted outcome.
    pub fn share_lists(&self, source: ContextID, dest: ContextID) -> Result<(), Error> {
        self.record(self.share_lists_inner(source, dest))
    }

    /// Copies the state groups selected by `mask` from `source` to `dest`.
    ///
    /// `mask` takes GL attribute group bits; the clear color travels with
    /// `glow::COLOR_BUFFER_BIT`. `dest` must not be current anywhere, and `source` may only be
    /// current on the calling thread.
    pub fn copy_context(&self, source: ContextID, dest: ContextID, mask: u32) -> Result<(), Error> {
        self.record(self.copy_context_inner(source, dest, mask))
    }

    /// Returns the context current on the calling thread.
    pub fn current_context(&self) -> Option<ContextID> {
        self.contexts().current.get(&thread::current().id()).copied()
    }

    /// Returns the draw drawable of the calling thread's current context.
    pub fn current_draw_drawable(&self) -> Option<DrawableID> {
        let contexts = self.contexts();
        let (_, state) = contexts.current_state(thread::current().id())?;
        state.binding.map(|binding| binding.draw)
    }

    /// Returns the read drawable of the calling thread's current context.
    pub fn current_read_drawable(&self) -> Option<DrawableID> {
        let contexts = self.contexts();
        let (_, state) = contexts.current_state(thread::current().id())?;
        state.binding.map(|binding| binding.read)
    }

    /// Returns the pixel format a context was created with.
    pub fn context_pixel_format(&self, context: ContextID) -> Result<PixelFormatIndex, Error> {
        let result = match self.contexts().contexts.get(&context) {
            Some(state) => Ok(state.pixel_format),
            None => Err(Error::ContextCreationFailed(WindowingApiError::InvalidHandle)),
        };
        self.record(result)
    }

    /// Returns the attributes a context was created with.
    pub fn context_attributes(&self, context: ContextID) -> Result<ContextAttributes, Error> {
        let result = match self.contexts().contexts.get(&context) {
            Some(state) => Ok(state.attributes),
            None => Err(Error::ContextCreationFailed(WindowingApiError::InvalidHandle)),
        };
        self.record(result)
    }

    /// Whether a context lost its draw drawable while current on it.
    pub fn context_is_detached(&self, context: ContextID) -> Result<bool, Error> {
        let result = match self.contexts().contexts.get(&context) {
            Some(state) => Ok(state.detached),
            None => Err(Error::ContextCreationFailed(WindowingApiError::InvalidHandle)),
        };
        self.record(result)
    }

    fn create_context_inner(
        &self,
        drawable: DrawableID,
        share_with: Option<ContextID>,
        attributes: ContextAttributes,
    ) -> Result<ContextID, Error> {
        let mut contexts = self.contexts();
        let drawable = self.drawable(drawable).map_err(Error::ContextCreationFailed)?;
        let pixel_format = drawable.pixel_format().ok_or(Error::ContextCreationFailed(
            WindowingApiError::InvalidPixelFormat,
        ))?;
        let acceleration = match self.catalog().get(pixel_format) {
            Some(format) => format.descriptor.acceleration(),
            None => {
                return Err(Error::ContextCreationFailed(
                    WindowingApiError::InvalidPixelFormat,
                ))
            }
        };

        let share_group = match share_with {
            None => ShareGroupID(allocate_handle()),
            Some(share_with) => {
                let shared = contexts
                    .contexts
                    .get(&share_with)
                    .ok_or(Error::ContextCreationFailed(WindowingApiError::InvalidData))?;
                if shared.acceleration != acceleration {
                    return Err(Error::ContextCreationFailed(
                        WindowingApiError::InvalidPixelFormat,
                    ));
                }
                shared.share_group
            }
        };

        let id = ContextID(allocate_handle());
        contexts.insert(
            id,
            ContextState {
                pixel_format,
                acceleration,
                attributes,
                binding: None,
                ever_current: false,
                detached: false,
                share_group,
                clear_color: [0.0; 4],
            },
        );
        debug!(
            "Created {:?} for {:?} with pixel format {:?}",
            id, drawable.id, pixel_format
        );
        Ok(id)
    }

    fn destroy_context_inner(&self, context: ContextID) -> Result<(), Error> {
        let thread = thread::current().id();
        let mut contexts = self.contexts();
        let state = contexts
            .contexts
            .get(&context)
            .ok_or(Error::ContextDestructionFailed(WindowingApiError::InvalidHandle))?;
        if let Some(binding) = state.binding {
            if binding.thread != thread {
                return Err(Error::ContextDestructionFailed(WindowingApiError::Busy));
            }
        }
        contexts.remove(context);
        debug!("Destroyed {:?}", context);
        Ok(())
    }

    fn make_context_current_inner(
        &self,
        context: Option<ContextID>,
        draw: Option<DrawableID>,
        read: Option<DrawableID>,
    ) -> Result<(), Error> {
        let thread = thread::current().id();
        let mut contexts = self.contexts();

        let (context, draw) = match (context, draw) {
            (None, None) => {
                contexts.release(thread);
                return Ok(());
            }
            (Some(context), Some(draw)) => (context, draw),
            _ => return Err(Error::MakeCurrentFailed(WindowingApiError::InvalidHandle)),
        };
        let read = read.unwrap_or(draw);

        let state = contexts
            .contexts
            .get(&context)
            .ok_or(Error::MakeCurrentFailed(WindowingApiError::InvalidHandle))?;
        let draw_drawable = self.drawable(draw).map_err(Error::MakeCurrentFailed)?;
        let read_drawable = self.drawable(read).map_err(Error::MakeCurrentFailed)?;
        if state.detached {
            return Err(Error::MakeCurrentFailed(WindowingApiError::InvalidHandle));
        }
        if let Some(binding) = state.binding {
            if binding.thread != thread {
                return Err(Error::MakeCurrentFailed(WindowingApiError::Busy));
            }
        }
        for drawable in [&draw_drawable, &read_drawable] {
            if drawable.pixel_format() != Some(state.pixel_format) {
                return Err(Error::MakeCurrentFailed(WindowingApiError::InvalidPixelFormat));
            }
        }

        if contexts.current.get(&thread) != Some(&context) {
            contexts.release(thread);
        }
        contexts.current.insert(thread, context);
        if let Some(state) = contexts.contexts.get_mut(&context) {
            state.binding = Some(Binding { thread, draw, read });
            state.ever_current = true;
        }
        self.release_on_thread_exit();
        trace!(
            "Made {:?} current on {:?} (draw {:?}, read {:?})",
            context,
            thread,
            draw,
            read
        );
        Ok(())
    }

    fn copy_context_inner(
        &self,
        source: ContextID,
        dest: ContextID,
        mask: u32,
    ) -> Result<(), Error> {
        let thread = thread::current().id();
        let mut contexts = self.contexts();
        let (source_state, dest_state) =
            match (contexts.contexts.get(&source), contexts.contexts.get(&dest)) {
                (Some(source_state), Some(dest_state)) => (source_state, dest_state),
                _ => return Err(Error::ContextCopyFailed(WindowingApiError::InvalidHandle)),
            };
        if source == dest {
            return Ok(());
        }
        if let Some(binding) = source_state.binding {
            if binding.thread != thread {
                return Err(Error::ContextCopyFailed(WindowingApiError::Busy));
            }
        }
        if dest_state.binding.is_some() {
            return Err(Error::ContextCopyFailed(WindowingApiError::Busy));
        }
        if source_state.acceleration != dest_state.acceleration {
            return Err(Error::ContextCopyFailed(WindowingApiError::InvalidPixelFormat));
        }

        let clear_color = source_state.clear_color;
        if let Some(dest_state) = contexts.contexts.get_mut(&dest) {
            if mask & glow::COLOR_BUFFER_BIT != 0 {
                dest_state.clear_color = clear_color;
            }
        }
        debug!("Copied state {:#x} from {:?} to {:?}", mask, source, dest);
        Ok(())
    }

    fn share_lists_inner(&self, source: ContextID, dest: ContextID) -> Result<(), Error> {
        let mut contexts = self.contexts();
        let (source_state, dest_state) =
            match (contexts.contexts.get(&source), contexts.contexts.get(&dest)) {
                (Some(source_state), Some(dest_state)) => (source_state, dest_state),
                _ => return Err(Error::ShareListsFailed(WindowingApiError::InvalidHandle)),
            };
        if source == dest {
            return Err(Error::ShareListsFailed(WindowingApiError::InvalidOperation));
        }
        if source_state.acceleration != dest_state.acceleration {
            return Err(Error::ShareListsFailed(WindowingApiError::InvalidPixelFormat));
        }
        if self.attributes().share_policy == SharePolicy::RefuseAfterCurrent
            && (source_state.ever_current || dest_state.ever_current)
        {
            return Err(Error::ShareListsFailed(WindowingApiError::InvalidOperation));
        }

        let source_group = source_state.share_group;
        let dest_group = dest_state.share_group;
        if source_group == dest_group {
            return Ok(());
        }
        let dest_in_use = contexts
            .share_groups
            .get(&dest_group)
            .map_or(false, |group| group.members.len() > 1 || !group.textures.is_empty());
        if dest_in_use {
            return Err(Error::ShareListsFailed(WindowingApiError::InvalidOperation));
        }

        contexts.share_groups.remove(&dest_group);
        contexts
            .share_groups
            .entry(source_group)
            .or_insert_with(ShareGroup::default)
            .members
            .insert(dest);
        if let Some(dest_state) = contexts.contexts.get_mut(&dest) {
            dest_state.share_group = source_group;
        }
        debug!("{:?} now shares objects with {:?}", dest, source);
        Ok(())
    }
}
