// surfbind/src/catalog.rs
//
//! The global pixel format catalog.
//!
//! A single ordered list backs both query paths. Formats that can be bound to a window or bitmap
//! come first and are the only ones the basic path (`DescribePixelFormat()`-style enumeration and
//! best-match choice) can see; offscreen-only formats follow and are reachable only through the
//! extended, attribute-based path.

use crate::device::Device;
use crate::error::{Error, WindowingApiError};
use crate::pixel_format::{ColorChannels, PixelFormat, PixelFormatAttribute, PixelFormatDescriptor};
use crate::pixel_format::{PixelFormatFlags, PixelFormatIndex};
use crate::surface::DrawableID;

use fnv::FnvHashMap;
use log::debug;
use std::cmp::Ordering;

const DEPTH_STENCIL_ICD: [(u8, u8); 4] = [(0, 0), (16, 0), (24, 0), (24, 8)];
const DEPTH_STENCIL_GENERIC: [(u8, u8); 2] = [(16, 0), (32, 8)];
const DEPTH_STENCIL_OFFSCREEN: [(u8, u8); 2] = [(0, 0), (24, 8)];

const GENERIC_ACCUM_BITS: u8 = 64;

/// An ordered list of pixel formats, onscreen formats first.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelFormatCatalog {
    formats: Vec<PixelFormat>,
    onscreen_count: usize,
}

impl Default for PixelFormatCatalog {
    /// A catalog shaped like a typical desktop driver: accelerated window formats, the generic
    /// software formats (the only ones that can draw to bitmaps), then pbuffer-only formats.
    fn default() -> PixelFormatCatalog {
        let mut formats = vec![];

        let icd = PixelFormatFlags::DRAW_TO_WINDOW | PixelFormatFlags::SUPPORT_OPENGL;
        for channels in [ColorChannels::rgba8(), ColorChannels::rgb8()] {
            for flags in [icd | PixelFormatFlags::DOUBLEBUFFER, icd] {
                for (depth_bits, stencil_bits) in DEPTH_STENCIL_ICD {
                    formats.push(PixelFormat {
                        descriptor: PixelFormatDescriptor::new(
                            flags,
                            channels,
                            depth_bits,
                            stencil_bits,
                        ),
                        draw_to_pbuffer: true,
                    });
                }
            }
        }

        let generic_gdi = PixelFormatFlags::DRAW_TO_WINDOW
            | PixelFormatFlags::DRAW_TO_BITMAP
            | PixelFormatFlags::SUPPORT_GDI
            | PixelFormatFlags::SUPPORT_OPENGL
            | PixelFormatFlags::GENERIC_FORMAT;
        let generic_double_buffered = PixelFormatFlags::DRAW_TO_WINDOW
            | PixelFormatFlags::SUPPORT_OPENGL
            | PixelFormatFlags::GENERIC_FORMAT
            | PixelFormatFlags::DOUBLEBUFFER;
        for flags in [generic_gdi, generic_double_buffered] {
            for (depth_bits, stencil_bits) in DEPTH_STENCIL_GENERIC {
                let mut descriptor = PixelFormatDescriptor::new(
                    flags,
                    ColorChannels::rgba8(),
                    depth_bits,
                    stencil_bits,
                );
                descriptor.accum_bits = GENERIC_ACCUM_BITS;
                formats.push(PixelFormat {
                    descriptor,
                    draw_to_pbuffer: false,
                });
            }
        }

        for channels in [ColorChannels::rgba8(), ColorChannels::rgb8()] {
            for (depth_bits, stencil_bits) in DEPTH_STENCIL_OFFSCREEN {
                formats.push(PixelFormat {
                    descriptor: PixelFormatDescriptor::new(
                        PixelFormatFlags::SUPPORT_OPENGL,
                        channels,
                        depth_bits,
                        stencil_bits,
                    ),
                    draw_to_pbuffer: true,
                });
            }
        }

        PixelFormatCatalog::partitioned(formats)
    }
}

impl PixelFormatCatalog {
    /// Creates a catalog from an arbitrary list.
    ///
    /// Onscreen formats are moved ahead of offscreen-only ones; the relative order within each
    /// part is kept. Fails with `InvalidData` if any format's color depth is not the sum of its
    /// channel sizes or its channels are not packed blue first.
    pub fn new(formats: Vec<PixelFormat>) -> Result<PixelFormatCatalog, WindowingApiError> {
        if let Some(slot) = formats.iter().position(|format| !format.is_consistent()) {
            debug!("Rejected catalog: format {} has an inconsistent color layout", slot + 1);
            return Err(WindowingApiError::InvalidData);
        }
        Ok(PixelFormatCatalog::partitioned(formats))
    }

    fn partitioned(formats: Vec<PixelFormat>) -> PixelFormatCatalog {
        let (mut onscreen, offscreen): (Vec<_>, Vec<_>) =
            formats.into_iter().partition(PixelFormat::is_onscreen);
        let onscreen_count = onscreen.len();
        onscreen.extend(offscreen);
        PixelFormatCatalog {
            formats: onscreen,
            onscreen_count,
        }
    }

    /// The number of formats, offscreen-only ones included.
    #[inline]
    pub fn len(&self) -> usize {
        self.formats.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    /// The number of formats visible to the basic query path.
    #[inline]
    pub fn onscreen_count(&self) -> usize {
        self.onscreen_count
    }

    /// Looks up any catalogued format.
    pub fn get(&self, index: PixelFormatIndex) -> Option<&PixelFormat> {
        let slot = (index.0 as usize).checked_sub(1)?;
        self.formats.get(slot)
    }

    /// Whether the basic query path can represent `index`.
    #[inline]
    pub fn is_onscreen_index(&self, index: PixelFormatIndex) -> bool {
        index.0 >= 1 && index.0 as usize <= self.onscreen_count
    }

    /// The leading onscreen subset, in catalog order.
    #[inline]
    pub fn basic_formats(&self) -> &[PixelFormat] {
        &self.formats[..self.onscreen_count]
    }

    /// Returns the basic format that best matches `request`, or `None` if no format has the
    /// mandatory capabilities.
    ///
    /// Exact requirements come first: requested window/bitmap/GDI/OpenGL support must be
    /// present, double buffering and stereo must match unless their `*_DONTCARE` flag is set, and
    /// the pixel type must match. Among the survivors, color, alpha, accumulation, depth (unless
    /// `DEPTH_DONTCARE`), stencil and aux sizes are compared in that order; equally good
    /// candidates keep the earlier format.
    pub fn choose_best_match(&self, request: &PixelFormatDescriptor) -> Option<PixelFormatIndex> {
        let mut best: Option<(usize, &PixelFormatDescriptor)> = None;
        for (slot, format) in self.basic_formats().iter().enumerate() {
            let candidate = &format.descriptor;
            if !has_mandatory_capabilities(request, candidate) {
                continue;
            }
            let better = match best {
                None => true,
                Some((_, best)) => is_closer_match(request, candidate, best),
            };
            if better {
                best = Some((slot, candidate));
            }
        }
        best.map(|(slot, _)| PixelFormatIndex(slot as u32 + 1))
    }

    /// Returns every format matching `filter`, grouped by capabilities.
    ///
    /// Groups appear in the order their first member appears in the catalog. Within a group,
    /// formats are sorted by depth bits, then stencil bits, both non-decreasing.
    pub fn choose_formats(
        &self,
        filter: &[(PixelFormatAttribute, i32)],
    ) -> Result<Vec<PixelFormatIndex>, WindowingApiError> {
        if filter
            .iter()
            .any(|&(attribute, _)| attribute == PixelFormatAttribute::NumberPixelFormats)
        {
            return Err(WindowingApiError::InvalidData);
        }

        let mut group_slots = FnvHashMap::default();
        let mut groups: Vec<Vec<(u8, u8, PixelFormatIndex)>> = vec![];
        for (slot, format) in self.formats.iter().enumerate() {
            if !filter
                .iter()
                .all(|&(attribute, value)| format.satisfies(attribute, value))
            {
                continue;
            }
            let group = *group_slots
                .entry(format.capability_key())
                .or_insert_with(|| {
                    groups.push(vec![]);
                    groups.len() - 1
                });
            groups[group].push((
                format.descriptor.depth_bits,
                format.descriptor.stencil_bits,
                PixelFormatIndex(slot as u32 + 1),
            ));
        }

        Ok(groups
            .into_iter()
            .flat_map(|mut group| {
                group.sort_by_key(|&(depth_bits, stencil_bits, _)| (depth_bits, stencil_bits));
                group.into_iter().map(|(_, _, index)| index)
            })
            .collect())
    }

    /// Returns the raw values of `attributes` for the format at `index`.
    ///
    /// `NumberPixelFormats` reports the full catalog size and is the only attribute that can be
    /// queried without a valid index.
    pub fn attributes(
        &self,
        index: PixelFormatIndex,
        attributes: &[PixelFormatAttribute],
    ) -> Result<Vec<i32>, WindowingApiError> {
        let format = self.get(index);
        attributes
            .iter()
            .map(|&attribute| match (attribute, format) {
                (PixelFormatAttribute::NumberPixelFormats, _) => Ok(self.len() as i32),
                (_, Some(format)) => Ok(format.attribute(attribute)),
                (_, None) => Err(WindowingApiError::InvalidPixelFormat),
            })
            .collect()
    }
}

impl Device {
    /// Returns the descriptors of the basic formats, in catalog order.
    ///
    /// The drawable only has to be live; its class does not narrow the list.
    pub fn describe_pixel_formats(
        &self,
        drawable: DrawableID,
    ) -> Result<Vec<PixelFormatDescriptor>, Error> {
        let result = self
            .drawable(drawable)
            .map(|_| {
                self.catalog()
                    .basic_formats()
                    .iter()
                    .map(|format| format.descriptor)
                    .collect()
            })
            .map_err(Error::PixelFormatSelectionFailed);
        self.record(result)
    }

    /// Returns the number of basic formats, as `DescribePixelFormat()` reports it.
    pub fn pixel_format_count(&self, drawable: DrawableID) -> Result<u32, Error> {
        let result = self
            .drawable(drawable)
            .map(|_| self.catalog().onscreen_count() as u32)
            .map_err(Error::PixelFormatSelectionFailed);
        self.record(result)
    }

    /// Describes one basic format.
    pub fn describe_pixel_format(
        &self,
        drawable: DrawableID,
        index: PixelFormatIndex,
    ) -> Result<PixelFormatDescriptor, Error> {
        self.record(self.describe_pixel_format_inner(drawable, index))
    }

    /// Picks the basic format closest to `request`. See `PixelFormatCatalog::choose_best_match()`.
    pub fn choose_pixel_format(
        &self,
        drawable: DrawableID,
        request: &PixelFormatDescriptor,
    ) -> Result<PixelFormatIndex, Error> {
        let result = self
            .drawable(drawable)
            .map_err(Error::PixelFormatSelectionFailed)
            .and_then(|_| {
                self.catalog()
                    .choose_best_match(request)
                    .ok_or(Error::NoPixelFormatFound)
            });
        self.record(result)
    }

    /// Returns every format, offscreen-only ones included, that satisfies `filter`.
    pub fn choose_pixel_formats(
        &self,
        drawable: DrawableID,
        filter: &[(PixelFormatAttribute, i32)],
    ) -> Result<Vec<PixelFormatIndex>, Error> {
        let result = self
            .drawable(drawable)
            .and_then(|_| self.catalog().choose_formats(filter))
            .map_err(Error::PixelFormatSelectionFailed);
        self.record(result)
    }

    /// Queries raw attribute values of any format in the full catalog.
    pub fn pixel_format_attributes(
        &self,
        drawable: DrawableID,
        index: PixelFormatIndex,
        attributes: &[PixelFormatAttribute],
    ) -> Result<Vec<i32>, Error> {
        let result = self
            .drawable(drawable)
            .and_then(|_| self.catalog().attributes(index, attributes))
            .map_err(Error::PixelFormatSelectionFailed);
        self.record(result)
    }

    fn describe_pixel_format_inner(
        &self,
        drawable: DrawableID,
        index: PixelFormatIndex,
    ) -> Result<PixelFormatDescriptor, Error> {
        self.drawable(drawable)
            .map_err(Error::PixelFormatSelectionFailed)?;
        if !self.catalog().is_onscreen_index(index) {
            return Err(Error::PixelFormatSelectionFailed(
                WindowingApiError::InvalidPixelFormat,
            ));
        }
        self.catalog()
            .get(index)
            .map(|format| format.descriptor)
            .ok_or(Error::PixelFormatSelectionFailed(
                WindowingApiError::InvalidPixelFormat,
            ))
    }
}

fn has_mandatory_capabilities(
    request: &PixelFormatDescriptor,
    candidate: &PixelFormatDescriptor,
) -> bool {
    if request.pixel_type != candidate.pixel_type {
        return false;
    }
    let required = request.flags
        & (PixelFormatFlags::DRAW_TO_WINDOW
            | PixelFormatFlags::DRAW_TO_BITMAP
            | PixelFormatFlags::SUPPORT_GDI
            | PixelFormatFlags::SUPPORT_OPENGL);
    if !candidate.flags.contains(required) {
        return false;
    }
    let exact = [
        (PixelFormatFlags::DOUBLEBUFFER, PixelFormatFlags::DOUBLEBUFFER_DONTCARE),
        (PixelFormatFlags::STEREO, PixelFormatFlags::STEREO_DONTCARE),
    ];
    exact.iter().all(|&(flag, dont_care)| {
        request.flags.contains(dont_care)
            || request.flags.contains(flag) == candidate.flags.contains(flag)
    })
}

fn is_closer_match(
    request: &PixelFormatDescriptor,
    candidate: &PixelFormatDescriptor,
    best: &PixelFormatDescriptor,
) -> bool {
    let depth_matters = !request.flags.contains(PixelFormatFlags::DEPTH_DONTCARE);
    let sizes = [
        (true, request.color_bits, candidate.color_bits, best.color_bits),
        (
            true,
            request.channels.alpha_bits,
            candidate.channels.alpha_bits,
            best.channels.alpha_bits,
        ),
        (true, request.accum_bits, candidate.accum_bits, best.accum_bits),
        (depth_matters, request.depth_bits, candidate.depth_bits, best.depth_bits),
        (true, request.stencil_bits, candidate.stencil_bits, best.stencil_bits),
        (true, request.aux_buffers, candidate.aux_buffers, best.aux_buffers),
    ];
    for (considered, requested, candidate, best) in sizes {
        if !considered || requested == 0 {
            continue;
        }
        match compare_size(requested, candidate, best) {
            Ordering::Less => return true,
            Ordering::Greater => return false,
            Ordering::Equal => {}
        }
    }
    false
}

// `Less` means the candidate size is closer to the request than the best one so far. Growing
// towards an unmet request wins, and so does a smaller size that still meets the request.
fn compare_size(requested: u8, candidate: u8, best: u8) -> Ordering {
    if candidate == best {
        Ordering::Equal
    } else if (requested > best && candidate > best) || (candidate >= requested && candidate < best)
    {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pixel_format::{PixelType, WGL_FULL_ACCELERATION_ARB};

    fn window_request(flags: PixelFormatFlags) -> PixelFormatDescriptor {
        PixelFormatDescriptor {
            flags: PixelFormatFlags::DRAW_TO_WINDOW | PixelFormatFlags::SUPPORT_OPENGL | flags,
            color_bits: 32,
            ..PixelFormatDescriptor::default()
        }
    }

    #[test]
    fn test_onscreen_formats_lead() {
        let catalog = PixelFormatCatalog::default();
        assert!(catalog.onscreen_count() < catalog.len());
        let (basic, rest) = catalog.formats.split_at(catalog.onscreen_count());
        assert!(basic.iter().all(PixelFormat::is_onscreen));
        assert!(rest.iter().all(|format| !format.is_onscreen()));
        assert!(rest.iter().all(|format| format.draw_to_pbuffer));
    }

    #[test]
    fn test_new_moves_offscreen_formats_last() {
        let defaults = PixelFormatCatalog::default();
        let mut shuffled = defaults.formats.clone();
        shuffled.reverse();
        let catalog = PixelFormatCatalog::new(shuffled).unwrap();
        assert_eq!(catalog.onscreen_count(), defaults.onscreen_count());
        assert!(catalog.basic_formats().iter().all(PixelFormat::is_onscreen));
    }

    #[test]
    fn test_new_rejects_inconsistent_color_layouts() {
        let defaults = PixelFormatCatalog::default();
        assert!(defaults.formats.iter().all(PixelFormat::is_consistent));

        let mut wrong_depth = defaults.formats.clone();
        wrong_depth[0].descriptor.color_bits = 24;
        assert_eq!(
            PixelFormatCatalog::new(wrong_depth),
            Err(WindowingApiError::InvalidData)
        );

        let mut wrong_shift = defaults.formats.clone();
        wrong_shift[2].descriptor.channels.red_shift = 0;
        assert_eq!(
            PixelFormatCatalog::new(wrong_shift),
            Err(WindowingApiError::InvalidData)
        );

        let mut oversized = defaults.formats.clone();
        let channels = ColorChannels {
            red_bits: 200,
            green_bits: 200,
            ..ColorChannels::default()
        };
        oversized[3].descriptor = PixelFormatDescriptor::new(
            PixelFormatFlags::DRAW_TO_WINDOW | PixelFormatFlags::SUPPORT_OPENGL,
            channels,
            0,
            0,
        );
        assert_eq!(
            PixelFormatCatalog::new(oversized),
            Err(WindowingApiError::InvalidData)
        );
    }

    #[test]
    fn test_index_bounds() {
        let catalog = PixelFormatCatalog::default();
        assert!(catalog.get(PixelFormatIndex(0)).is_none());
        assert!(catalog.get(PixelFormatIndex(1)).is_some());
        assert!(catalog.get(PixelFormatIndex(catalog.len() as u32)).is_some());
        assert!(catalog.get(PixelFormatIndex(catalog.len() as u32 + 1)).is_none());
        assert!(!catalog.is_onscreen_index(PixelFormatIndex(0)));
        assert!(catalog.is_onscreen_index(PixelFormatIndex(catalog.onscreen_count() as u32)));
        assert!(!catalog.is_onscreen_index(PixelFormatIndex(catalog.onscreen_count() as u32 + 1)));
    }

    #[test]
    fn test_best_match_prefers_requested_depth_and_stencil() {
        let catalog = PixelFormatCatalog::default();
        let mut request = window_request(PixelFormatFlags::DOUBLEBUFFER);
        request.depth_bits = 24;
        request.stencil_bits = 8;
        let index = catalog.choose_best_match(&request).unwrap();
        let chosen = catalog.get(index).unwrap().descriptor;
        assert!(chosen.is_double_buffered());
        assert_eq!(chosen.color_bits, 32);
        assert_eq!((chosen.depth_bits, chosen.stencil_bits), (24, 8));
        assert_eq!(chosen.acceleration(), crate::Acceleration::Full);
    }

    #[test]
    fn test_best_match_grows_towards_unmet_depth() {
        let catalog = PixelFormatCatalog::default();
        let mut request = window_request(PixelFormatFlags::DOUBLEBUFFER);
        request.depth_bits = 31;
        let index = catalog.choose_best_match(&request).unwrap();
        // Only the generic double-buffered format reaches 31 bits.
        let chosen = catalog.get(index).unwrap().descriptor;
        assert_eq!(chosen.depth_bits, 32);
        assert_eq!(chosen.acceleration(), crate::Acceleration::None);
    }

    #[test]
    fn test_best_match_single_buffer_is_exact() {
        let catalog = PixelFormatCatalog::default();
        let index = catalog
            .choose_best_match(&window_request(PixelFormatFlags::empty()))
            .unwrap();
        assert!(!catalog.get(index).unwrap().descriptor.is_double_buffered());

        let index = catalog
            .choose_best_match(&window_request(PixelFormatFlags::DOUBLEBUFFER_DONTCARE))
            .unwrap();
        assert_eq!(index, PixelFormatIndex(1));
    }

    #[test]
    fn test_best_match_rejects_impossible_requests() {
        let catalog = PixelFormatCatalog::default();
        assert_eq!(catalog.choose_best_match(&window_request(PixelFormatFlags::STEREO)), None);

        let bitmap_double_buffered = PixelFormatDescriptor {
            flags: PixelFormatFlags::DRAW_TO_BITMAP | PixelFormatFlags::DOUBLEBUFFER,
            ..PixelFormatDescriptor::default()
        };
        assert_eq!(catalog.choose_best_match(&bitmap_double_buffered), None);

        let color_index = PixelFormatDescriptor {
            pixel_type: PixelType::ColorIndex,
            ..window_request(PixelFormatFlags::empty())
        };
        assert_eq!(catalog.choose_best_match(&color_index), None);
    }

    #[test]
    fn test_best_match_bitmap_is_generic() {
        let catalog = PixelFormatCatalog::default();
        let request = PixelFormatDescriptor {
            flags: PixelFormatFlags::DRAW_TO_BITMAP | PixelFormatFlags::SUPPORT_OPENGL,
            color_bits: 24,
            depth_bits: 16,
            ..PixelFormatDescriptor::default()
        };
        let index = catalog.choose_best_match(&request).unwrap();
        let chosen = catalog.get(index).unwrap().descriptor;
        assert!(chosen.flags.contains(PixelFormatFlags::DRAW_TO_BITMAP));
        assert!(chosen.flags.contains(PixelFormatFlags::GENERIC_FORMAT));
        assert_eq!(chosen.depth_bits, 16);
    }

    #[test]
    fn test_extended_enumeration_reaches_offscreen_formats() {
        let catalog = PixelFormatCatalog::default();
        let pbuffer_formats = catalog
            .choose_formats(&[(PixelFormatAttribute::DrawToPbuffer, 1)])
            .unwrap();
        assert!(pbuffer_formats
            .iter()
            .any(|&index| !catalog.is_onscreen_index(index)));

        let window_formats = catalog
            .choose_formats(&[
                (PixelFormatAttribute::DrawToWindow, 1),
                (PixelFormatAttribute::Acceleration, WGL_FULL_ACCELERATION_ARB),
            ])
            .unwrap();
        assert!(window_formats
            .iter()
            .all(|&index| catalog.is_onscreen_index(index)));
    }

    #[test]
    fn test_extended_enumeration_rejects_count_filter() {
        let catalog = PixelFormatCatalog::default();
        assert_eq!(
            catalog.choose_formats(&[(PixelFormatAttribute::NumberPixelFormats, 1)]),
            Err(WindowingApiError::InvalidData)
        );
    }

    #[test]
    fn test_attribute_query() {
        let catalog = PixelFormatCatalog::default();
        let count = catalog
            .attributes(PixelFormatIndex(0), &[PixelFormatAttribute::NumberPixelFormats])
            .unwrap();
        assert_eq!(count, vec![catalog.len() as i32]);
        assert_eq!(
            catalog.attributes(PixelFormatIndex(0), &[PixelFormatAttribute::ColorBits]),
            Err(WindowingApiError::InvalidPixelFormat)
        );
        let values = catalog
            .attributes(
                PixelFormatIndex(1),
                &[PixelFormatAttribute::ColorBits, PixelFormatAttribute::AlphaShift],
            )
            .unwrap();
        assert_eq!(values, vec![32, 24]);
    }
}
