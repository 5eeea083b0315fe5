// surfbind/src/lib.rs
//
//! A WGL-style bridge between a windowing system and a GL implementation.
//!
//! This crate models the part of a WGL layer that is pure bookkeeping: which pixel formats exist,
//! which format each window, bitmap or pbuffer has been given, which rendering context is current
//! on which thread and against which drawables, which contexts share objects, and how swaps and
//! swap intervals behave. It does so as a deterministic, thread-safe state machine with the error
//! contract of a reference WGL platform, so that code layered on top of it can be exercised
//! without a display server.
//!
//! Everything hangs off a `Device`, which may be cloned and used from any number of threads.

pub mod catalog;
pub use crate::catalog::PixelFormatCatalog;

mod context;
pub use crate::context::{ContextAttributeFlags, ContextAttributes, ContextID};

mod device;
pub use crate::device::{Device, DeviceAttributes, SharePolicy};

pub mod error;
pub use crate::error::{Error, WindowingApiError};

mod info;
pub use crate::info::GLVersion;

mod pbuffer;
pub use crate::pbuffer::{PbufferAttribute, PbufferAttributes, PbufferID};

pub mod pixel_format;
pub use crate::pixel_format::{Acceleration, ColorChannels, PixelFormat, PixelFormatAttribute};
pub use crate::pixel_format::{PixelFormatDescriptor, PixelFormatFlags, PixelFormatIndex};
pub use crate::pixel_format::PixelType;

mod proc_address;
pub use crate::proc_address::ProcAddress;

mod render;
mod surface;
pub use crate::surface::{DrawableClass, DrawableID};

mod swap;
