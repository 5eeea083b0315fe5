// surfbind/src/pbuffer.rs
//
//! Pbuffers: offscreen drawables the driver allocates, reached through a pseudo-DC.

use crate::device::{allocate_handle, Device};
use crate::error::{Error, WindowingApiError};
use crate::pixel_format::PixelFormatIndex;
use crate::surface::{ColorBuffers, Drawable, DrawableClass, DrawableID, SharedColorBuffers};

use euclid::default::Size2D;
use log::debug;
use std::fmt::{self, Display, Formatter};
use std::sync::{Arc, Mutex};

/// An opaque handle to a pbuffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PbufferID(pub u64);

impl Display for PbufferID {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{:?}", *self)
    }
}

/// Options for `Device::create_pbuffer()`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PbufferAttributes {
    /// Clamp an oversized request to the largest available pbuffer instead of failing.
    pub largest: bool,
}

/// Values `Device::query_pbuffer()` can report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PbufferAttribute {
    /// The allocated width, after any clamping by `PbufferAttributes::largest`.
    Width,
    /// The allocated height, after any clamping by `PbufferAttributes::largest`.
    Height,
    /// 1 once the pbuffer's contents have been lost, 0 otherwise.
    Lost,
}

pub(crate) struct Pbuffer {
    pub(crate) pixel_format: PixelFormatIndex,
    pub(crate) size: Size2D<i32>,
    pub(crate) buffers: SharedColorBuffers,
    pub(crate) dc: Option<DrawableID>,
    pub(crate) lost: bool,
}

impl Device {
    /// Allocates a pbuffer with the given format.
    ///
    /// `dc` is only checked for liveness. The format must support pbuffers, which includes the
    /// offscreen-only formats the basic query path cannot see.
    pub fn create_pbuffer(
        &self,
        dc: DrawableID,
        pixel_format: PixelFormatIndex,
        size: Size2D<i32>,
        attributes: &PbufferAttributes,
    ) -> Result<PbufferID, Error> {
        self.record(self.create_pbuffer_inner(dc, pixel_format, size, attributes))
    }

    /// Returns the pseudo-DC of a pbuffer, creating one if none is live.
    pub fn pbuffer_dc(&self, pbuffer: PbufferID) -> Result<DrawableID, Error> {
        self.record(self.pbuffer_dc_inner(pbuffer))
    }

    /// Releases the pseudo-DC of a pbuffer. The handle becomes stale; contexts drawing to it
    /// become detached. The pbuffer and its contents survive.
    pub fn release_pbuffer_dc(&self, pbuffer: PbufferID, dc: DrawableID) -> Result<(), Error> {
        self.record(self.release_pbuffer_dc_inner(pbuffer, dc))
    }

    /// Destroys a pbuffer, releasing its pseudo-DC if one is live.
    pub fn destroy_pbuffer(&self, pbuffer: PbufferID) -> Result<(), Error> {
        self.record(self.destroy_pbuffer_inner(pbuffer))
    }

    /// Reports an attribute of a live pbuffer. A destroyed or unknown pbuffer fails with
    /// `InvalidHandle`.
    pub fn query_pbuffer(
        &self,
        pbuffer: PbufferID,
        attribute: PbufferAttribute,
    ) -> Result<i32, Error> {
        let result = match self.pbuffers().get(&pbuffer) {
            None => Err(Error::SurfaceQueryFailed(WindowingApiError::InvalidHandle)),
            Some(pbuffer) => Ok(match attribute {
                PbufferAttribute::Width => pbuffer.size.width,
                PbufferAttribute::Height => pbuffer.size.height,
                PbufferAttribute::Lost => pbuffer.lost as i32,
            }),
        };
        self.record(result)
    }

    /// Marks every pbuffer as lost, as a display mode change would.
    pub fn lose_pbuffers(&self) {
        for (id, pbuffer) in self.pbuffers().iter_mut() {
            debug!("Lost contents of {:?}", id);
            pbuffer.lost = true;
        }
    }

    fn create_pbuffer_inner(
        &self,
        dc: DrawableID,
        pixel_format: PixelFormatIndex,
        size: Size2D<i32>,
        attributes: &PbufferAttributes,
    ) -> Result<PbufferID, Error> {
        let mut pbuffers = self.pbuffers();
        self.drawable(dc).map_err(Error::SurfaceCreationFailed)?;
        match self.catalog().get(pixel_format) {
            Some(format) if format.draw_to_pbuffer => {}
            _ => {
                return Err(Error::SurfaceCreationFailed(
                    WindowingApiError::InvalidPixelFormat,
                ))
            }
        }
        if size.width <= 0 || size.height <= 0 {
            return Err(Error::SurfaceCreationFailed(WindowingApiError::InvalidData));
        }

        let max_size = self.attributes().max_pbuffer_size;
        let mut size = size;
        if size.width > max_size.width || size.height > max_size.height {
            if !attributes.largest {
                return Err(Error::SurfaceCreationFailed(WindowingApiError::InvalidData));
            }
            size = size.min(max_size);
        }

        let id = PbufferID(allocate_handle());
        pbuffers.insert(
            id,
            Pbuffer {
                pixel_format,
                size,
                buffers: Arc::new(Mutex::new(ColorBuffers::new(size))),
                dc: None,
                lost: false,
            },
        );
        debug!(
            "Created {:?} ({:?}) with pixel format {:?}",
            id, size, pixel_format
        );
        Ok(id)
    }

    fn pbuffer_dc_inner(&self, id: PbufferID) -> Result<DrawableID, Error> {
        let mut pbuffers = self.pbuffers();
        let pbuffer = pbuffers
            .get_mut(&id)
            .ok_or(Error::SurfaceCreationFailed(WindowingApiError::InvalidHandle))?;
        if let Some(dc) = pbuffer.dc {
            if self.drawable(dc).is_ok() {
                return Ok(dc);
            }
        }

        let drawable = Drawable::new(
            DrawableClass::Pbuffer,
            pbuffer.size,
            self.attributes().default_swap_interval,
            pbuffer.buffers.clone(),
        );
        // A fresh cell cannot already hold a format.
        let _ = drawable.pixel_format.set(pbuffer.pixel_format);
        let dc = drawable.id;
        self.drawables_mut().insert(dc, Arc::new(drawable));
        pbuffer.dc = Some(dc);
        debug!("Created pseudo-DC {:?} for {:?}", dc, id);
        Ok(dc)
    }

    fn release_pbuffer_dc_inner(&self, id: PbufferID, dc: DrawableID) -> Result<(), Error> {
        let mut pbuffers = self.pbuffers();
        let pbuffer = pbuffers
            .get_mut(&id)
            .ok_or(Error::SurfaceDestructionFailed(WindowingApiError::InvalidHandle))?;
        if pbuffer.dc != Some(dc) {
            return Err(Error::SurfaceDestructionFailed(WindowingApiError::InvalidHandle));
        }
        self.destroy_drawable(dc, DrawableClass::Pbuffer)?;
        pbuffer.dc = None;
        Ok(())
    }

    fn destroy_pbuffer_inner(&self, id: PbufferID) -> Result<(), Error> {
        let mut pbuffers = self.pbuffers();
        let pbuffer = pbuffers
            .remove(&id)
            .ok_or(Error::SurfaceDestructionFailed(WindowingApiError::InvalidHandle))?;
        if let Some(dc) = pbuffer.dc {
            // The DC may already be gone; only a live one needs detaching.
            if self.drawable(dc).is_ok() {
                self.destroy_drawable(dc, DrawableClass::Pbuffer)?;
            }
        }
        debug!("Destroyed {:?}", id);
        Ok(())
    }
}
