//! `Glyph` and related types.

use super::{Cursor, Metrics};
use crate::{errors::ParseErrorKind, ParseError, TableTag};

#[derive(Debug, Clone)]
pub(crate) enum Glyph<'a> {
    Empty,
    Simple(&'a [u8]),
    Composite {
        /// xMin, yMin, xMax, yMax
        header: [u8; 8],
        components: Vec<GlyphComponent>,
        /// Optional instructions after the last component descriptor
        instructions: &'a [u8],
    },
}

impl<'a> Glyph<'a> {
    pub(super) fn new(raw: Cursor<'a>) -> Result<Self, ParseError> {
        if raw.bytes.is_empty() {
            return Ok(Self::Empty);
        }

        let mut cursor = raw;
        let number_of_contours = cursor.read_u16()?;
        if number_of_contours > i16::MAX as u16 {
            // Composite glyph
            let header = cursor.read_byte_array::<8>()?;
            let mut has_more_components = true;
            let mut components = Vec::with_capacity(1);
            while has_more_components {
                let (component, new_has_more_components) = GlyphComponent::new(&mut cursor)?;
                components.push(component);
                has_more_components = new_has_more_components;
            }
            Ok(Self::Composite {
                header,
                components,
                instructions: cursor.bytes,
            })
        } else {
            // Simple glyph
            Ok(Self::Simple(raw.bytes))
        }
    }

    /// Returns glyph indices referenced by this glyph.
    pub(crate) fn component_indices(&self) -> impl Iterator<Item = u16> + '_ {
        let components = match self {
            Self::Composite { components, .. } => components.as_slice(),
            Self::Empty | Self::Simple(_) => &[],
        };
        components.iter().map(|component| component.glyph_idx)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct GlyphComponent {
    pub(crate) flags: u16,
    pub(crate) glyph_idx: u16,
    pub(crate) args: GlyphComponentArgs,
    pub(crate) transform: TransformData,
}

impl GlyphComponent {
    pub(crate) const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
    pub(crate) const WE_HAVE_A_SCALE: u16 = 0x0008;
    pub(crate) const MORE_COMPONENTS: u16 = 0x0020;
    pub(crate) const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
    pub(crate) const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;
    pub(crate) const WE_HAVE_INSTRUCTIONS: u16 = 0x0100;

    fn new(cursor: &mut Cursor<'_>) -> Result<(Self, bool), ParseError> {
        let flags = cursor.read_u16()?;
        let glyph_idx = cursor.read_u16()?;
        let args = if flags & Self::ARG_1_AND_2_ARE_WORDS != 0 {
            GlyphComponentArgs::U32(cursor.read_u32()?)
        } else {
            GlyphComponentArgs::U16(cursor.read_u16()?)
        };
        let transform = if flags & Self::WE_HAVE_A_SCALE != 0 {
            TransformData::Scale(cursor.read_u16()?)
        } else if flags & Self::WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            TransformData::TwoScales([cursor.read_u16()?, cursor.read_u16()?])
        } else if flags & Self::WE_HAVE_A_TWO_BY_TWO != 0 {
            TransformData::Affine([
                cursor.read_u16()?,
                cursor.read_u16()?,
                cursor.read_u16()?,
                cursor.read_u16()?,
            ])
        } else {
            TransformData::None
        };
        let this = Self {
            flags,
            glyph_idx,
            args,
            transform,
        };

        let has_more_components = flags & Self::MORE_COMPONENTS != 0;
        Ok((this, has_more_components))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum GlyphComponentArgs {
    U16(u16),
    U32(u32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum TransformData {
    None,
    Scale(u16),
    TwoScales([u16; 2]),
    Affine([u16; 4]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OutlinePoint {
    pub(crate) x: i32,
    pub(crate) y: i32,
    pub(crate) on_curve: bool,
}

/// Decoded outline of a simple glyph.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SimpleOutline<'a> {
    pub(crate) bbox: [i16; 4],
    pub(crate) end_points: Vec<u16>,
    pub(crate) instructions: &'a [u8],
    /// Points with absolute coordinates.
    pub(crate) points: Vec<OutlinePoint>,
}

impl<'a> SimpleOutline<'a> {
    const ON_CURVE_POINT: u8 = 0x01;
    const X_SHORT_VECTOR: u8 = 0x02;
    const Y_SHORT_VECTOR: u8 = 0x04;
    const REPEAT_FLAG: u8 = 0x08;
    const X_IS_SAME_OR_POSITIVE: u8 = 0x10;
    const Y_IS_SAME_OR_POSITIVE: u8 = 0x20;

    pub(crate) fn parse(raw: &'a [u8]) -> Result<Self, ParseError> {
        let mut cursor = Cursor::for_table(raw, TableTag::GLYF);
        let contour_count = cursor.read_u16_checked(|count| {
            if count > i16::MAX as u16 {
                Err(ParseErrorKind::UnexpectedTableFormat(count))
            } else {
                Ok(usize::from(count))
            }
        })?;
        let bbox = [
            cursor.read_i16()?,
            cursor.read_i16()?,
            cursor.read_i16()?,
            cursor.read_i16()?,
        ];

        let end_points_cursor = cursor;
        let end_points = cursor.read_u16_array(contour_count)?;
        let is_monotonic = end_points.windows(2).all(|window| window[0] < window[1]);
        if !is_monotonic {
            return Err(end_points_cursor.err(ParseErrorKind::MalformedOutline));
        }
        let point_count = end_points.last().map_or(0, |&last| usize::from(last) + 1);

        let instruction_len = cursor.read_u16()?;
        let instructions = cursor.split_at(instruction_len.into())?.bytes;

        let mut flags = Vec::with_capacity(point_count);
        while flags.len() < point_count {
            let flag = cursor.read_u8()?;
            let repeat_count = if flag & Self::REPEAT_FLAG != 0 {
                usize::from(cursor.read_u8()?) + 1
            } else {
                1
            };
            if flags.len() + repeat_count > point_count {
                return Err(cursor.err(ParseErrorKind::MalformedOutline));
            }
            flags.extend(core::iter::repeat_n(flag, repeat_count));
        }

        let xs = Self::read_coordinates(
            &mut cursor,
            &flags,
            Self::X_SHORT_VECTOR,
            Self::X_IS_SAME_OR_POSITIVE,
        )?;
        let ys = Self::read_coordinates(
            &mut cursor,
            &flags,
            Self::Y_SHORT_VECTOR,
            Self::Y_IS_SAME_OR_POSITIVE,
        )?;
        let points = flags
            .iter()
            .zip(xs.into_iter().zip(ys))
            .map(|(&flag, (x, y))| OutlinePoint {
                x,
                y,
                on_curve: flag & Self::ON_CURVE_POINT != 0,
            })
            .collect();

        Ok(Self {
            bbox,
            end_points,
            instructions,
            points,
        })
    }

    fn read_coordinates(
        cursor: &mut Cursor<'_>,
        flags: &[u8],
        short_flag: u8,
        same_or_positive_flag: u8,
    ) -> Result<Vec<i32>, ParseError> {
        let mut value = 0_i32;
        flags
            .iter()
            .map(|&flag| {
                let delta = if flag & short_flag != 0 {
                    let magnitude = i32::from(cursor.read_u8()?);
                    if flag & same_or_positive_flag != 0 {
                        magnitude
                    } else {
                        -magnitude
                    }
                } else if flag & same_or_positive_flag != 0 {
                    0
                } else {
                    i32::from(cursor.read_i16()?)
                };
                value += delta;
                Ok(value)
            })
            .collect()
    }

    /// Computes the bounding box from the points. Returns zeros if there are no points.
    #[allow(clippy::cast_possible_truncation)] // coordinates originate from `i16` values
    pub(crate) fn computed_bbox(&self) -> [i16; 4] {
        let Some(first) = self.points.first() else {
            return [0; 4];
        };
        let init = [first.x, first.y, first.x, first.y];
        let [x_min, y_min, x_max, y_max] =
            self.points.iter().fold(init, |[x_min, y_min, x_max, y_max], pt| {
                [x_min.min(pt.x), y_min.min(pt.y), x_max.max(pt.x), y_max.max(pt.y)]
            });
        [x_min as i16, y_min as i16, x_max as i16, y_max as i16]
    }
}

/// [`Glyph`] together with metrics read from the `hmtx` and (optionally) `vmtx` tables.
#[derive(Debug, Clone)]
pub(crate) struct GlyphWithMetrics<'a> {
    pub(crate) inner: Glyph<'a>,
    pub(crate) horizontal: Metrics,
    pub(crate) vertical: Option<Metrics>,
}
