// surfbind/src/surface.rs
//
//! The drawable registry: windows, bitmaps and pbuffer DCs, and their one-shot pixel formats.

use crate::device::{allocate_handle, Device};
use crate::error::{Error, WindowingApiError};
use crate::pixel_format::{PixelFormatFlags, PixelFormatIndex};

use euclid::default::Size2D;
use log::debug;
use std::fmt::{self, Display, Formatter};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

/// An opaque handle to a window, bitmap or pbuffer DC.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DrawableID(pub u64);

impl Display for DrawableID {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{:?}", *self)
    }
}

/// What kind of surface a drawable handle refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawableClass {
    /// An onscreen window.
    Window,
    /// A memory bitmap selected into a DC.
    Bitmap,
    /// The pseudo-DC of a pbuffer.
    Pbuffer,
}

impl DrawableClass {
    // The capability a format needs before it may be assigned to this class.
    fn required_flag(self) -> Option<PixelFormatFlags> {
        match self {
            DrawableClass::Window => Some(PixelFormatFlags::DRAW_TO_WINDOW),
            DrawableClass::Bitmap => Some(PixelFormatFlags::DRAW_TO_BITMAP),
            DrawableClass::Pbuffer => None,
        }
    }
}

/// Front and back color buffers, stored as RGBA8 rows from the bottom up.
pub(crate) struct ColorBuffers {
    pub(crate) size: Size2D<i32>,
    pub(crate) front: Vec<u8>,
    pub(crate) back: Vec<u8>,
}

impl ColorBuffers {
    pub(crate) fn new(size: Size2D<i32>) -> ColorBuffers {
        let len = size.width.max(0) as usize * size.height.max(0) as usize * 4;
        ColorBuffers {
            size,
            front: vec![0; len],
            back: vec![0; len],
        }
    }

    pub(crate) fn buffer_mut(&mut self, double_buffered: bool) -> &mut Vec<u8> {
        if double_buffered {
            &mut self.back
        } else {
            &mut self.front
        }
    }

    pub(crate) fn buffer(&self, double_buffered: bool) -> &[u8] {
        if double_buffered {
            &self.back
        } else {
            &self.front
        }
    }
}

pub(crate) type SharedColorBuffers = Arc<Mutex<ColorBuffers>>;

pub(crate) fn lock_buffers(buffers: &SharedColorBuffers) -> MutexGuard<ColorBuffers> {
    buffers.lock().unwrap_or_else(|err| err.into_inner())
}

pub(crate) struct Drawable {
    pub(crate) id: DrawableID,
    pub(crate) class: DrawableClass,
    pub(crate) size: Size2D<i32>,
    // Written at most once; `OnceLock` serialises racing assignments per drawable.
    pub(crate) pixel_format: OnceLock<PixelFormatIndex>,
    pub(crate) swap_interval: AtomicI32,
    pub(crate) parent: Mutex<Option<DrawableID>>,
    pub(crate) buffers: SharedColorBuffers,
}

impl Drawable {
    pub(crate) fn new(
        class: DrawableClass,
        size: Size2D<i32>,
        swap_interval: i32,
        buffers: SharedColorBuffers,
    ) -> Drawable {
        Drawable {
            id: DrawableID(allocate_handle()),
            class,
            size,
            pixel_format: OnceLock::new(),
            swap_interval: AtomicI32::new(swap_interval),
            parent: Mutex::new(None),
            buffers,
        }
    }

    #[inline]
    pub(crate) fn pixel_format(&self) -> Option<PixelFormatIndex> {
        self.pixel_format.get().copied()
    }

    #[inline]
    pub(crate) fn swap_interval(&self) -> i32 {
        self.swap_interval.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_swap_interval(&self, interval: i32) {
        self.swap_interval.store(interval, Ordering::Release)
    }

    fn parent(&self) -> MutexGuard<Option<DrawableID>> {
        self.parent.lock().unwrap_or_else(|err| err.into_inner())
    }
}

impl Device {
    /// Creates an onscreen window with no pixel format.
    ///
    /// Each side must be positive and no larger than the device's `max_window_size`.
    pub fn create_window(&self, size: Size2D<i32>) -> Result<DrawableID, Error> {
        self.record(self.create_drawable(DrawableClass::Window, size))
    }

    /// Creates a window parented to `parent`.
    pub fn create_child_window(
        &self,
        parent: DrawableID,
        size: Size2D<i32>,
    ) -> Result<DrawableID, Error> {
        self.record(self.create_child_window_inner(parent, size))
    }

    /// Creates a memory bitmap surface with no pixel format.
    pub fn create_bitmap(&self, size: Size2D<i32>) -> Result<DrawableID, Error> {
        self.record(self.create_drawable(DrawableClass::Bitmap, size))
    }

    /// Destroys a window. Any context drawing to it becomes detached.
    pub fn destroy_window(&self, window: DrawableID) -> Result<(), Error> {
        self.record(self.destroy_drawable(window, DrawableClass::Window))
    }

    /// Destroys a bitmap. Any context drawing to it becomes detached.
    pub fn destroy_bitmap(&self, bitmap: DrawableID) -> Result<(), Error> {
        self.record(self.destroy_drawable(bitmap, DrawableClass::Bitmap))
    }

    /// Moves a window under a new parent, or to the top level when `parent` is `None`.
    ///
    /// Re-parenting resets the window's swap interval to 0.
    pub fn set_window_parent(
        &self,
        window: DrawableID,
        parent: Option<DrawableID>,
    ) -> Result<(), Error> {
        self.record(self.set_window_parent_inner(window, parent))
    }

    /// Returns the parent of a window.
    pub fn window_parent(&self, window: DrawableID) -> Result<Option<DrawableID>, Error> {
        self.record(
            self.window(window)
                .map(|window| *window.parent())
                .map_err(Error::SurfaceQueryFailed),
        )
    }

    /// Returns the client size of a window.
    pub fn window_size(&self, window: DrawableID) -> Result<Size2D<i32>, Error> {
        self.record(
            self.window(window)
                .map(|window| window.size)
                .map_err(Error::SurfaceQueryFailed),
        )
    }

    /// Returns the size of any live drawable, in pixels.
    pub fn drawable_size(&self, drawable: DrawableID) -> Result<Size2D<i32>, Error> {
        self.record(
            self.drawable(drawable)
                .map(|drawable| drawable.size)
                .map_err(Error::SurfaceQueryFailed),
        )
    }

    /// Returns the class of a live drawable.
    pub fn drawable_class(&self, drawable: DrawableID) -> Result<DrawableClass, Error> {
        self.record(
            self.drawable(drawable)
                .map(|drawable| drawable.class)
                .map_err(Error::SurfaceQueryFailed),
        )
    }

    /// Binds a pixel format to a drawable.
    ///
    /// The first assignment is final. Assigning the same format again succeeds; assigning any
    /// other format fails and leaves the original in place.
    pub fn set_pixel_format(
        &self,
        drawable: DrawableID,
        pixel_format: PixelFormatIndex,
    ) -> Result<(), Error> {
        self.record(self.set_pixel_format_inner(drawable, pixel_format))
    }

    /// Returns the pixel format bound to a drawable.
    ///
    /// A pbuffer DC whose format is offscreen-only reports format 1, since the basic query path
    /// has no way to name such a format.
    pub fn pixel_format(&self, drawable: DrawableID) -> Result<PixelFormatIndex, Error> {
        self.record(self.pixel_format_inner(drawable))
    }

    /// Reads the front buffer the way GDI would, as bottom-up RGBA8 rows.
    pub fn read_front_buffer(&self, drawable: DrawableID) -> Result<Vec<u8>, Error> {
        let drawable = self.record(self.drawable(drawable).map_err(Error::SurfaceQueryFailed))?;
        let buffers = lock_buffers(&drawable.buffers);
        Ok(buffers.front.clone())
    }

    fn create_drawable(&self, class: DrawableClass, size: Size2D<i32>) -> Result<DrawableID, Error> {
        let max_size = self.attributes().max_window_size;
        if size.width <= 0
            || size.height <= 0
            || size.width > max_size.width
            || size.height > max_size.height
        {
            return Err(Error::SurfaceCreationFailed(WindowingApiError::InvalidData));
        }
        let buffers = Arc::new(Mutex::new(ColorBuffers::new(size)));
        let drawable = Drawable::new(
            class,
            size,
            self.attributes().default_swap_interval,
            buffers,
        );
        let id = drawable.id;
        debug!("Created {:?} drawable {:?} ({:?})", class, id, size);
        self.drawables_mut().insert(id, Arc::new(drawable));
        Ok(id)
    }

    fn create_child_window_inner(
        &self,
        parent: DrawableID,
        size: Size2D<i32>,
    ) -> Result<DrawableID, Error> {
        self.window(parent).map_err(Error::SurfaceCreationFailed)?;
        let id = self.create_drawable(DrawableClass::Window, size)?;
        if let Ok(window) = self.window(id) {
            *window.parent() = Some(parent);
        }
        Ok(id)
    }

    fn set_window_parent_inner(
        &self,
        window: DrawableID,
        parent: Option<DrawableID>,
    ) -> Result<(), Error> {
        let window = self.window(window).map_err(Error::SurfaceQueryFailed)?;
        if let Some(parent) = parent {
            if parent == window.id {
                return Err(Error::SurfaceQueryFailed(WindowingApiError::InvalidData));
            }
            self.window(parent).map_err(Error::SurfaceQueryFailed)?;
        }
        *window.parent() = parent;
        window.set_swap_interval(0);
        debug!("Re-parented {:?} under {:?}", window.id, parent);
        Ok(())
    }

    pub(crate) fn destroy_drawable(&self, id: DrawableID, class: DrawableClass) -> Result<(), Error> {
        let mut contexts = self.contexts();
        let mut drawables = self.drawables_mut();
        match drawables.get(&id) {
            Some(drawable) if drawable.class == class => {}
            _ => return Err(Error::SurfaceDestructionFailed(WindowingApiError::InvalidHandle)),
        }
        drawables.remove(&id);
        for drawable in drawables.values() {
            let mut parent = drawable.parent();
            if *parent == Some(id) {
                *parent = None;
            }
        }
        drop(drawables);
        contexts.detach_drawable(id);
        debug!("Destroyed {:?} drawable {:?}", class, id);
        Ok(())
    }

    fn set_pixel_format_inner(
        &self,
        id: DrawableID,
        pixel_format: PixelFormatIndex,
    ) -> Result<(), Error> {
        let drawable = self.drawable(id).map_err(Error::PixelFormatSelectionFailed)?;
        let format = match self.catalog().get(pixel_format) {
            Some(format) => format,
            None => {
                return Err(Error::PixelFormatSelectionFailed(
                    WindowingApiError::InvalidPixelFormat,
                ))
            }
        };
        if let Some(required) = drawable.class.required_flag() {
            if !format.descriptor.flags.contains(required) {
                return Err(Error::PixelFormatSelectionFailed(
                    WindowingApiError::InvalidPixelFormat,
                ));
            }
        }

        match drawable.pixel_format.set(pixel_format) {
            Ok(()) => {
                debug!("Assigned pixel format {:?} to {:?}", pixel_format, id);
                Ok(())
            }
            Err(_) if drawable.pixel_format() == Some(pixel_format) => Ok(()),
            Err(_) => Err(Error::PixelFormatSelectionFailed(
                WindowingApiError::InvalidPixelFormat,
            )),
        }
    }

    fn pixel_format_inner(&self, id: DrawableID) -> Result<PixelFormatIndex, Error> {
        let drawable = self.drawable(id).map_err(Error::PixelFormatSelectionFailed)?;
        let pixel_format = drawable.pixel_format().ok_or(Error::PixelFormatSelectionFailed(
            WindowingApiError::InvalidPixelFormat,
        ))?;
        if drawable.class == DrawableClass::Pbuffer
            && !self.catalog().is_onscreen_index(pixel_format)
        {
            return Ok(PixelFormatIndex(1));
        }
        Ok(pixel_format)
    }

    // Looks up a live window; other drawable classes count as invalid handles.
    pub(crate) fn window(&self, id: DrawableID) -> Result<Arc<Drawable>, WindowingApiError> {
        match self.drawable(id)? {
            drawable if drawable.class == DrawableClass::Window => Ok(drawable),
            _ => Err(WindowingApiError::InvalidHandle),
        }
    }
}
