// surfbind/src/pixel_format.rs
//
//! Pixel format descriptors and the attribute vocabulary of the extended query path.

use bitflags::bitflags;

const WGL_NUMBER_PIXEL_FORMATS_ARB: u32 = 0x2000;
const WGL_DRAW_TO_WINDOW_ARB: u32 = 0x2001;
const WGL_DRAW_TO_BITMAP_ARB: u32 = 0x2002;
const WGL_ACCELERATION_ARB: u32 = 0x2003;
const WGL_SUPPORT_GDI_ARB: u32 = 0x200f;
const WGL_SUPPORT_OPENGL_ARB: u32 = 0x2010;
const WGL_DOUBLE_BUFFER_ARB: u32 = 0x2011;
const WGL_STEREO_ARB: u32 = 0x2012;
const WGL_PIXEL_TYPE_ARB: u32 = 0x2013;
const WGL_COLOR_BITS_ARB: u32 = 0x2014;
const WGL_RED_BITS_ARB: u32 = 0x2015;
const WGL_RED_SHIFT_ARB: u32 = 0x2016;
const WGL_GREEN_BITS_ARB: u32 = 0x2017;
const WGL_GREEN_SHIFT_ARB: u32 = 0x2018;
const WGL_BLUE_BITS_ARB: u32 = 0x2019;
const WGL_BLUE_SHIFT_ARB: u32 = 0x201a;
const WGL_ALPHA_BITS_ARB: u32 = 0x201b;
const WGL_ALPHA_SHIFT_ARB: u32 = 0x201c;
const WGL_ACCUM_BITS_ARB: u32 = 0x201d;
const WGL_DEPTH_BITS_ARB: u32 = 0x2022;
const WGL_STENCIL_BITS_ARB: u32 = 0x2023;
const WGL_AUX_BUFFERS_ARB: u32 = 0x2024;
const WGL_DRAW_TO_PBUFFER_ARB: u32 = 0x202d;

/// `WGL_NO_ACCELERATION_ARB`.
pub const WGL_NO_ACCELERATION_ARB: i32 = 0x2025;
/// `WGL_GENERIC_ACCELERATION_ARB`.
pub const WGL_GENERIC_ACCELERATION_ARB: i32 = 0x2026;
/// `WGL_FULL_ACCELERATION_ARB`.
pub const WGL_FULL_ACCELERATION_ARB: i32 = 0x2027;
/// `WGL_TYPE_RGBA_ARB`.
pub const WGL_TYPE_RGBA_ARB: i32 = 0x202b;
/// `WGL_TYPE_COLORINDEX_ARB`.
pub const WGL_TYPE_COLORINDEX_ARB: i32 = 0x202c;

/// A 1-based index into the pixel format catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PixelFormatIndex(pub u32);

bitflags! {
    /// Capability flags of a pixel format, with the values GDI uses.
    ///
    /// The `*_DONTCARE` flags only have meaning in a request passed to
    /// `Device::choose_pixel_format()`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct PixelFormatFlags: u32 {
        const DOUBLEBUFFER          = 0x0000_0001;
        const STEREO                = 0x0000_0002;
        const DRAW_TO_WINDOW        = 0x0000_0004;
        const DRAW_TO_BITMAP        = 0x0000_0008;
        const SUPPORT_GDI           = 0x0000_0010;
        const SUPPORT_OPENGL        = 0x0000_0020;
        const GENERIC_FORMAT        = 0x0000_0040;
        const GENERIC_ACCELERATED   = 0x0000_1000;
        const DEPTH_DONTCARE        = 0x2000_0000;
        const DOUBLEBUFFER_DONTCARE = 0x4000_0000;
        const STEREO_DONTCARE       = 0x8000_0000;
    }
}

/// How the color buffer stores pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum PixelType {
    #[default]
    Rgba,
    ColorIndex,
}

/// Which renderer implements a pixel format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Acceleration {
    /// The software implementation that ships with the windowing system.
    None,
    /// A software implementation with partial driver acceleration.
    Generic,
    /// An installable client driver.
    Full,
}

impl Acceleration {
    fn wgl_value(self) -> i32 {
        match self {
            Acceleration::None => WGL_NO_ACCELERATION_ARB,
            Acceleration::Generic => WGL_GENERIC_ACCELERATION_ARB,
            Acceleration::Full => WGL_FULL_ACCELERATION_ARB,
        }
    }
}

/// Bit counts and shifts of the color channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct ColorChannels {
    pub red_bits: u8,
    pub red_shift: u8,
    pub green_bits: u8,
    pub green_shift: u8,
    pub blue_bits: u8,
    pub blue_shift: u8,
    pub alpha_bits: u8,
    pub alpha_shift: u8,
}

impl ColorChannels {
    /// Packs channels of the given widths blue first, then green, red and alpha.
    ///
    /// Returns `None` if the channels do not fit in 255 bits.
    pub fn packed(
        red_bits: u8,
        green_bits: u8,
        blue_bits: u8,
        alpha_bits: u8,
    ) -> Option<ColorChannels> {
        let blue_shift = 0;
        let green_shift = blue_shift + blue_bits;
        let red_shift = green_shift.checked_add(green_bits)?;
        let end = red_shift.checked_add(red_bits)?.checked_add(alpha_bits)?;
        let alpha_shift = if alpha_bits > 0 { end - alpha_bits } else { 0 };
        Some(ColorChannels {
            red_bits,
            red_shift,
            green_bits,
            green_shift,
            blue_bits,
            blue_shift,
            alpha_bits,
            alpha_shift,
        })
    }

    #[inline]
    pub fn rgba8() -> ColorChannels {
        ColorChannels {
            red_bits: 8,
            red_shift: 16,
            green_bits: 8,
            green_shift: 8,
            blue_bits: 8,
            blue_shift: 0,
            alpha_bits: 8,
            alpha_shift: 24,
        }
    }

    #[inline]
    pub fn rgb8() -> ColorChannels {
        ColorChannels {
            alpha_bits: 0,
            alpha_shift: 0,
            ..ColorChannels::rgba8()
        }
    }

    /// The color depth, alpha included, or `None` if it does not fit in a `u8`.
    pub fn color_bits(&self) -> Option<u8> {
        self.red_bits
            .checked_add(self.green_bits)?
            .checked_add(self.blue_bits)?
            .checked_add(self.alpha_bits)
    }

    /// Whether the channels are laid out the way `packed()` lays them out.
    pub fn is_packed(&self) -> bool {
        ColorChannels::packed(self.red_bits, self.green_bits, self.blue_bits, self.alpha_bits)
            == Some(*self)
    }
}

/// Describes the rendering capabilities of a drawable.
///
/// When used as a request, zero bit counts mean "no preference" and the `*_DONTCARE` flags relax
/// the corresponding exact-match requirement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PixelFormatDescriptor {
    pub flags: PixelFormatFlags,
    pub pixel_type: PixelType,
    pub color_bits: u8,
    pub channels: ColorChannels,
    pub accum_bits: u8,
    pub depth_bits: u8,
    pub stencil_bits: u8,
    pub aux_buffers: u8,
}

impl Default for PixelFormatDescriptor {
    fn default() -> PixelFormatDescriptor {
        PixelFormatDescriptor {
            flags: PixelFormatFlags::empty(),
            pixel_type: PixelType::Rgba,
            color_bits: 0,
            channels: ColorChannels::default(),
            accum_bits: 0,
            depth_bits: 0,
            stencil_bits: 0,
            aux_buffers: 0,
        }
    }
}

impl PixelFormatDescriptor {
    /// Builds a catalog descriptor whose color depth is derived from `channels`.
    pub fn new(
        flags: PixelFormatFlags,
        channels: ColorChannels,
        depth_bits: u8,
        stencil_bits: u8,
    ) -> PixelFormatDescriptor {
        PixelFormatDescriptor {
            flags,
            // Overflowing channels leave the depth at 0, which no catalog accepts.
            color_bits: channels.color_bits().unwrap_or(0),
            channels,
            depth_bits,
            stencil_bits,
            ..PixelFormatDescriptor::default()
        }
    }

    /// The renderer class implied by the generic flags.
    pub fn acceleration(&self) -> Acceleration {
        let generic = self.flags.contains(PixelFormatFlags::GENERIC_FORMAT);
        let generic_accelerated = self.flags.contains(PixelFormatFlags::GENERIC_ACCELERATED);
        match (generic, generic_accelerated) {
            (true, true) => Acceleration::Generic,
            (true, false) => Acceleration::None,
            (false, _) => Acceleration::Full,
        }
    }

    #[inline]
    pub fn is_double_buffered(&self) -> bool {
        self.flags.contains(PixelFormatFlags::DOUBLEBUFFER)
    }
}

/// An entry of the pixel format catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PixelFormat {
    pub descriptor: PixelFormatDescriptor,
    /// Whether pbuffers may be created with this format. The legacy descriptor has no field for
    /// this, so it is only visible through the extended query path.
    pub draw_to_pbuffer: bool,
}

impl PixelFormat {
    /// Onscreen formats can be bound to windows or bitmaps and are listed by the basic query
    /// path.
    #[inline]
    pub fn is_onscreen(&self) -> bool {
        self.descriptor
            .flags
            .intersects(PixelFormatFlags::DRAW_TO_WINDOW | PixelFormatFlags::DRAW_TO_BITMAP)
    }

    /// Whether the color depth is the sum of the channel sizes and the channels are packed.
    pub fn is_consistent(&self) -> bool {
        let descriptor = &self.descriptor;
        descriptor.channels.color_bits() == Some(descriptor.color_bits)
            && descriptor.channels.is_packed()
    }

    /// Everything except the depth and stencil sizes.
    pub(crate) fn capability_key(&self) -> CapabilityKey {
        let descriptor = &self.descriptor;
        CapabilityKey {
            flags: descriptor.flags.bits(),
            pixel_type: descriptor.pixel_type,
            color_bits: descriptor.color_bits,
            channels: descriptor.channels,
            accum_bits: descriptor.accum_bits,
            aux_buffers: descriptor.aux_buffers,
            draw_to_pbuffer: self.draw_to_pbuffer,
        }
    }

    /// Returns the raw value of one attribute.
    pub fn attribute(&self, attribute: PixelFormatAttribute) -> i32 {
        let descriptor = &self.descriptor;
        let flag = |flag: PixelFormatFlags| descriptor.flags.contains(flag) as i32;
        match attribute {
            // Answered by the catalog, which knows its own size.
            PixelFormatAttribute::NumberPixelFormats => 0,
            PixelFormatAttribute::DrawToWindow => flag(PixelFormatFlags::DRAW_TO_WINDOW),
            PixelFormatAttribute::DrawToBitmap => flag(PixelFormatFlags::DRAW_TO_BITMAP),
            PixelFormatAttribute::DrawToPbuffer => self.draw_to_pbuffer as i32,
            PixelFormatAttribute::Acceleration => descriptor.acceleration().wgl_value(),
            PixelFormatAttribute::SupportGdi => flag(PixelFormatFlags::SUPPORT_GDI),
            PixelFormatAttribute::SupportOpenGL => flag(PixelFormatFlags::SUPPORT_OPENGL),
            PixelFormatAttribute::DoubleBuffer => flag(PixelFormatFlags::DOUBLEBUFFER),
            PixelFormatAttribute::Stereo => flag(PixelFormatFlags::STEREO),
            PixelFormatAttribute::PixelType => match descriptor.pixel_type {
                PixelType::Rgba => WGL_TYPE_RGBA_ARB,
                PixelType::ColorIndex => WGL_TYPE_COLORINDEX_ARB,
            },
            PixelFormatAttribute::ColorBits => descriptor.color_bits as i32,
            PixelFormatAttribute::RedBits => descriptor.channels.red_bits as i32,
            PixelFormatAttribute::RedShift => descriptor.channels.red_shift as i32,
            PixelFormatAttribute::GreenBits => descriptor.channels.green_bits as i32,
            PixelFormatAttribute::GreenShift => descriptor.channels.green_shift as i32,
            PixelFormatAttribute::BlueBits => descriptor.channels.blue_bits as i32,
            PixelFormatAttribute::BlueShift => descriptor.channels.blue_shift as i32,
            PixelFormatAttribute::AlphaBits => descriptor.channels.alpha_bits as i32,
            PixelFormatAttribute::AlphaShift => descriptor.channels.alpha_shift as i32,
            PixelFormatAttribute::AccumBits => descriptor.accum_bits as i32,
            PixelFormatAttribute::DepthBits => descriptor.depth_bits as i32,
            PixelFormatAttribute::StencilBits => descriptor.stencil_bits as i32,
            PixelFormatAttribute::AuxBuffers => descriptor.aux_buffers as i32,
        }
    }

    /// Whether this format satisfies one `(attribute, value)` pair of an extended filter.
    pub(crate) fn satisfies(&self, attribute: PixelFormatAttribute, value: i32) -> bool {
        let actual = self.attribute(attribute);
        match attribute.match_criterion() {
            MatchCriterion::Exact => actual == value,
            MatchCriterion::Minimum => actual >= value,
            MatchCriterion::Boolean => (actual != 0) == (value != 0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct CapabilityKey {
    flags: u32,
    pixel_type: PixelType,
    color_bits: u8,
    channels: ColorChannels,
    accum_bits: u8,
    aux_buffers: u8,
    draw_to_pbuffer: bool,
}

/// Attributes of the extended pixel format query path, numbered as in `WGL_ARB_pixel_format`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PixelFormatAttribute {
    NumberPixelFormats = WGL_NUMBER_PIXEL_FORMATS_ARB,
    DrawToWindow = WGL_DRAW_TO_WINDOW_ARB,
    DrawToBitmap = WGL_DRAW_TO_BITMAP_ARB,
    Acceleration = WGL_ACCELERATION_ARB,
    SupportGdi = WGL_SUPPORT_GDI_ARB,
    SupportOpenGL = WGL_SUPPORT_OPENGL_ARB,
    DoubleBuffer = WGL_DOUBLE_BUFFER_ARB,
    Stereo = WGL_STEREO_ARB,
    PixelType = WGL_PIXEL_TYPE_ARB,
    ColorBits = WGL_COLOR_BITS_ARB,
    RedBits = WGL_RED_BITS_ARB,
    RedShift = WGL_RED_SHIFT_ARB,
    GreenBits = WGL_GREEN_BITS_ARB,
    GreenShift = WGL_GREEN_SHIFT_ARB,
    BlueBits = WGL_BLUE_BITS_ARB,
    BlueShift = WGL_BLUE_SHIFT_ARB,
    AlphaBits = WGL_ALPHA_BITS_ARB,
    AlphaShift = WGL_ALPHA_SHIFT_ARB,
    AccumBits = WGL_ACCUM_BITS_ARB,
    DepthBits = WGL_DEPTH_BITS_ARB,
    StencilBits = WGL_STENCIL_BITS_ARB,
    AuxBuffers = WGL_AUX_BUFFERS_ARB,
    DrawToPbuffer = WGL_DRAW_TO_PBUFFER_ARB,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum MatchCriterion {
    Exact,
    Minimum,
    Boolean,
}

impl PixelFormatAttribute {
    pub(crate) fn match_criterion(self) -> MatchCriterion {
        match self {
            PixelFormatAttribute::DrawToWindow
            | PixelFormatAttribute::DrawToBitmap
            | PixelFormatAttribute::DrawToPbuffer
            | PixelFormatAttribute::SupportGdi
            | PixelFormatAttribute::SupportOpenGL
            | PixelFormatAttribute::DoubleBuffer
            | PixelFormatAttribute::Stereo => MatchCriterion::Boolean,
            PixelFormatAttribute::ColorBits
            | PixelFormatAttribute::RedBits
            | PixelFormatAttribute::GreenBits
            | PixelFormatAttribute::BlueBits
            | PixelFormatAttribute::AlphaBits
            | PixelFormatAttribute::AccumBits
            | PixelFormatAttribute::DepthBits
            | PixelFormatAttribute::StencilBits
            | PixelFormatAttribute::AuxBuffers => MatchCriterion::Minimum,
            PixelFormatAttribute::NumberPixelFormats
            | PixelFormatAttribute::Acceleration
            | PixelFormatAttribute::PixelType
            | PixelFormatAttribute::RedShift
            | PixelFormatAttribute::GreenShift
            | PixelFormatAttribute::BlueShift
            | PixelFormatAttribute::AlphaShift => MatchCriterion::Exact,
        }
    }

    /// The `WGL_*_ARB` enumerant of this attribute.
    #[inline]
    pub fn wgl_enum(self) -> u32 {
        self as u32
    }
}
