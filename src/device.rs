// surfbind/src/device.rs
//
//! The device: one shared instance of the windowing bridge.

use crate::catalog::PixelFormatCatalog;
use crate::context::ContextTable;
use crate::error::{Error, WindowingApiError};
use crate::info::GLVersion;
use crate::pbuffer::Pbuffer;
use crate::pbuffer::PbufferID;
use crate::surface::{Drawable, DrawableID};

use euclid::default::Size2D;
use fnv::FnvHashMap;
use lazy_static::lazy_static;
use log::{debug, trace};
use std::cell::RefCell;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::thread::{self, ThreadId};

lazy_static! {
    // Handles are unique across devices, so a handle from one device is stale on every other.
    static ref NEXT_HANDLE: Mutex<u64> = Mutex::new(1);
}

thread_local! {
    static THREAD_STATE: ThreadState = ThreadState::new();
}

// Per-thread bookkeeping that has to die with the thread: the last-error slots, and the devices
// this thread has made a context current on, so those contexts are released when it exits.
struct ThreadState {
    thread: ThreadId,
    last_errors: RefCell<FnvHashMap<u64, WindowingApiError>>,
    bound_devices: RefCell<Vec<Weak<DeviceData>>>,
}

impl ThreadState {
    fn new() -> ThreadState {
        ThreadState {
            thread: thread::current().id(),
            last_errors: RefCell::new(FnvHashMap::default()),
            bound_devices: RefCell::new(vec![]),
        }
    }
}

impl Drop for ThreadState {
    fn drop(&mut self) {
        for device in self.bound_devices.get_mut().drain(..) {
            if let Some(device) = device.upgrade() {
                trace!("Thread {:?} exited", self.thread);
                Device(device).contexts().release(self.thread);
            }
        }
    }
}

pub(crate) fn allocate_handle() -> u64 {
    let mut next_handle = NEXT_HANDLE.lock().unwrap_or_else(|err| err.into_inner());
    let handle = *next_handle;
    *next_handle += 1;
    handle
}

/// How `Device::share_lists()` treats contexts that have already been current.
///
/// Drivers disagree here. Both behaviors are accepted outcomes, and callers are expected to
/// tolerate a refusal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SharePolicy {
    /// Sharing is allowed whether or not either context has been current.
    Permissive,
    /// Sharing is refused once either context has ever been made current.
    RefuseAfterCurrent,
}

impl Default for SharePolicy {
    #[cfg(not(feature = "sm-strict-share"))]
    #[inline]
    fn default() -> SharePolicy {
        SharePolicy::Permissive
    }

    #[cfg(feature = "sm-strict-share")]
    #[inline]
    fn default() -> SharePolicy {
        SharePolicy::RefuseAfterCurrent
    }
}

/// Configuration a device is opened with.
#[derive(Clone, Debug)]
pub struct DeviceAttributes {
    /// The pixel formats this device exposes.
    pub catalog: PixelFormatCatalog,
    /// The swap interval new drawables start with.
    pub default_swap_interval: i32,
    /// Whether negative (adaptive) swap intervals are accepted.
    pub swap_control_tear: bool,
    /// See `SharePolicy`.
    pub share_policy: SharePolicy,
    /// The largest window or bitmap that can be created.
    pub max_window_size: Size2D<i32>,
    /// The largest pbuffer that can be allocated.
    pub max_pbuffer_size: Size2D<i32>,
    /// The newest GL version `create_context_with_attributes()` accepts.
    pub max_gl_version: GLVersion,
}

impl Default for DeviceAttributes {
    fn default() -> DeviceAttributes {
        DeviceAttributes {
            catalog: PixelFormatCatalog::default(),
            default_swap_interval: 1,
            swap_control_tear: false,
            share_policy: SharePolicy::default(),
            max_window_size: Size2D::new(16384, 16384),
            max_pbuffer_size: Size2D::new(4096, 4096),
            max_gl_version: GLVersion::new(4, 6),
        }
    }
}

/// A handle to the windowing bridge.
///
/// Devices are cheap to clone and may be used from any number of threads at once; all clones
/// share the same drawables, contexts and pbuffers. Every operation completes or fails
/// immediately. Nothing waits for another thread to give up a context.
#[derive(Clone)]
pub struct Device(Arc<DeviceData>);

// Locks are always taken in the order `pbuffers`, `contexts`, `drawables`.
pub(crate) struct DeviceData {
    id: u64,
    attributes: DeviceAttributes,
    pbuffers: Mutex<FnvHashMap<PbufferID, Pbuffer>>,
    contexts: Mutex<ContextTable>,
    drawables: RwLock<FnvHashMap<DrawableID, Arc<Drawable>>>,
}

impl Default for Device {
    #[inline]
    fn default() -> Device {
        Device::new(DeviceAttributes::default())
    }
}

impl Device {
    /// Opens a device with the given configuration.
    pub fn new(attributes: DeviceAttributes) -> Device {
        debug!(
            "Opening device with {} pixel formats ({} onscreen)",
            attributes.catalog.len(),
            attributes.catalog.onscreen_count()
        );
        Device(Arc::new(DeviceData {
            id: allocate_handle(),
            attributes,
            pbuffers: Mutex::new(FnvHashMap::default()),
            contexts: Mutex::new(ContextTable::default()),
            drawables: RwLock::new(FnvHashMap::default()),
        }))
    }

    /// Returns the configuration this device was opened with.
    #[inline]
    pub fn attributes(&self) -> &DeviceAttributes {
        &self.0.attributes
    }

    /// Returns the pixel format catalog.
    #[inline]
    pub fn catalog(&self) -> &PixelFormatCatalog {
        &self.0.attributes.catalog
    }

    /// Returns the extensions this device advertises, in the order of the extension string.
    pub fn extensions(&self) -> Vec<&'static str> {
        let mut extensions = vec![
            "WGL_ARB_create_context",
            "WGL_ARB_create_context_profile",
            "WGL_ARB_extensions_string",
            "WGL_ARB_make_current_read",
            "WGL_ARB_pbuffer",
            "WGL_ARB_pixel_format",
            "WGL_EXT_extensions_string",
            "WGL_EXT_swap_control",
        ];
        if self.0.attributes.swap_control_tear {
            extensions.push("WGL_EXT_swap_control_tear");
        }
        extensions
    }

    /// Whether `name` appears in `extensions()`.
    pub fn supports_extension(&self, name: &str) -> bool {
        self.extensions().iter().any(|extension| *extension == name)
    }

    /// Returns the code of the last failure on the calling thread, if any.
    ///
    /// Successful calls leave the slot alone, matching the usual last-error convention.
    pub fn last_error(&self) -> Option<WindowingApiError> {
        let id = self.0.id;
        THREAD_STATE.with(|state| state.last_errors.borrow().get(&id).copied())
    }

    /// Clears the calling thread's last-error slot.
    pub fn clear_last_error(&self) {
        let id = self.0.id;
        THREAD_STATE.with(|state| {
            state.last_errors.borrow_mut().remove(&id);
        })
    }

    // Every public fallible operation funnels its result through here.
    pub(crate) fn record<T>(&self, result: Result<T, Error>) -> Result<T, Error> {
        if let Err(ref error) = result {
            debug!("{}", error);
            let id = self.0.id;
            // The slot is gone while the thread is exiting; there is nobody left to read it.
            let _ = THREAD_STATE.try_with(|state| {
                state.last_errors.borrow_mut().insert(id, error.code());
            });
        }
        result
    }

    // Arranges for the calling thread's current context on this device to be released when the
    // thread exits.
    pub(crate) fn release_on_thread_exit(&self) {
        let _ = THREAD_STATE.try_with(|state| {
            let mut bound_devices = state.bound_devices.borrow_mut();
            bound_devices.retain(|device| device.strong_count() > 0);
            if !bound_devices.iter().any(|device| device.as_ptr() == Arc::as_ptr(&self.0)) {
                bound_devices.push(Arc::downgrade(&self.0));
            }
        });
    }

    pub(crate) fn pbuffers(&self) -> MutexGuard<FnvHashMap<PbufferID, Pbuffer>> {
        self.0.pbuffers.lock().unwrap_or_else(|err| err.into_inner())
    }

    pub(crate) fn contexts(&self) -> MutexGuard<ContextTable> {
        self.0.contexts.lock().unwrap_or_else(|err| err.into_inner())
    }

    pub(crate) fn drawables(&self) -> RwLockReadGuard<FnvHashMap<DrawableID, Arc<Drawable>>> {
        self.0.drawables.read().unwrap_or_else(|err| err.into_inner())
    }

    pub(crate) fn drawables_mut(&self) -> RwLockWriteGuard<FnvHashMap<DrawableID, Arc<Drawable>>> {
        self.0.drawables.write().unwrap_or_else(|err| err.into_inner())
    }

    pub(crate) fn drawable(&self, id: DrawableID) -> Result<Arc<Drawable>, WindowingApiError> {
        self.drawables()
            .get(&id)
            .cloned()
            .ok_or(WindowingApiError::InvalidHandle)
    }
}
