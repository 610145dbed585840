//! Transformed `glyf` table (version 0) for WOFF2.

use super::{write_u16, write_u32};
use crate::{
    errors::ParseErrorKind,
    font::{Glyph, GlyphComponent, GlyphData, OutlinePoint, SimpleOutline},
    ParseError, TableTag,
};

/// Writes a `255UInt16` value.
#[allow(clippy::cast_possible_truncation)] // intentional
pub(super) fn write_255_u16(buffer: &mut Vec<u8>, value: u16) {
    const WORD_CODE: u8 = 253;
    const ONE_MORE_BYTE_CODE2: u8 = 254;
    const ONE_MORE_BYTE_CODE1: u8 = 255;
    const LOWEST_U_CODE: u16 = 253;

    if value < LOWEST_U_CODE {
        buffer.push(value as u8);
    } else if value < 2 * LOWEST_U_CODE {
        buffer.push(ONE_MORE_BYTE_CODE1);
        buffer.push((value - LOWEST_U_CODE) as u8);
    } else if value < 762 {
        buffer.push(ONE_MORE_BYTE_CODE2);
        buffer.push((value - 2 * LOWEST_U_CODE) as u8);
    } else {
        buffer.push(WORD_CODE);
        write_u16(buffer, value);
    }
}

/// Writes a point delta in the triplet encoding: a flag byte into `flags`,
/// and 1 to 4 coordinate bytes into `glyphs`.
#[allow(clippy::cast_possible_truncation)] // intentional
fn write_triplet(flags: &mut Vec<u8>, glyphs: &mut Vec<u8>, on_curve: bool, dx: i32, dy: i32) {
    let on_curve_bit = if on_curve { 0 } else { 128 };
    let (abs_x, abs_y) = (dx.unsigned_abs(), dy.unsigned_abs());
    let x_sign_bit = u8::from(dx >= 0);
    let y_sign_bit = u8::from(dy >= 0);
    let xy_sign_bits = x_sign_bit + 2 * y_sign_bit;

    if dx == 0 && abs_y < 1280 {
        flags.push(on_curve_bit + ((abs_y & 0xf00) >> 7) as u8 + y_sign_bit);
        glyphs.push(abs_y as u8);
    } else if dy == 0 && abs_x < 1280 {
        flags.push(on_curve_bit + 10 + ((abs_x & 0xf00) >> 7) as u8 + x_sign_bit);
        glyphs.push(abs_x as u8);
    } else if abs_x < 65 && abs_y < 65 {
        let (x, y) = (abs_x - 1, abs_y - 1);
        let flag = 20 + (x & 0x30) as u8 + ((y & 0x30) >> 2) as u8;
        flags.push(on_curve_bit + flag + xy_sign_bits);
        glyphs.push((((x & 0xf) << 4) | (y & 0xf)) as u8);
    } else if abs_x < 769 && abs_y < 769 {
        let (x, y) = (abs_x - 1, abs_y - 1);
        let flag = 84 + 12 * ((x & 0x300) >> 8) as u8 + ((y & 0x300) >> 6) as u8;
        flags.push(on_curve_bit + flag + xy_sign_bits);
        glyphs.push(x as u8);
        glyphs.push(y as u8);
    } else if abs_x < 4096 && abs_y < 4096 {
        flags.push(on_curve_bit + 120 + xy_sign_bits);
        glyphs.push((abs_x >> 4) as u8);
        glyphs.push((((abs_x & 0xf) << 4) | (abs_y >> 8)) as u8);
        glyphs.push(abs_y as u8);
    } else {
        flags.push(on_curve_bit + 124 + xy_sign_bits);
        glyphs.push((abs_x >> 8) as u8);
        glyphs.push(abs_x as u8);
        glyphs.push((abs_y >> 8) as u8);
        glyphs.push(abs_y as u8);
    }
}

#[derive(Debug, Default)]
struct Streams {
    n_contours: Vec<u8>,
    n_points: Vec<u8>,
    flags: Vec<u8>,
    glyphs: Vec<u8>,
    composites: Vec<u8>,
    bbox_bitmap: Vec<u8>,
    bboxes: Vec<u8>,
    instructions: Vec<u8>,
}

impl Streams {
    fn set_bbox(&mut self, glyph_idx: u16, bbox: &[u8]) {
        let glyph_idx = usize::from(glyph_idx);
        self.bbox_bitmap[glyph_idx / 8] |= 0x80 >> (glyph_idx % 8);
        self.bboxes.extend_from_slice(bbox);
    }

    fn write_simple(
        &mut self,
        glyph_idx: u16,
        outline: &SimpleOutline<'_>,
    ) -> Result<(), ParseError> {
        let malformed =
            || ParseError::new(ParseErrorKind::MalformedOutline).with_table(TableTag::GLYF);

        let contour_count = i16::try_from(outline.end_points.len()).map_err(|_| malformed())?;
        self.n_contours.extend_from_slice(&contour_count.to_be_bytes());
        let mut prev_end = None::<u16>;
        for &end in &outline.end_points {
            let point_count = match prev_end {
                None => end.checked_add(1),
                Some(prev) => end.checked_sub(prev),
            };
            write_255_u16(&mut self.n_points, point_count.ok_or_else(malformed)?);
            prev_end = Some(end);
        }

        let mut prev = OutlinePoint {
            x: 0,
            y: 0,
            on_curve: true,
        };
        for &point in &outline.points {
            let (dx, dy) = (point.x - prev.x, point.y - prev.y);
            write_triplet(&mut self.flags, &mut self.glyphs, point.on_curve, dx, dy);
            prev = point;
        }

        let instruction_len =
            u16::try_from(outline.instructions.len()).map_err(|_| malformed())?;
        write_255_u16(&mut self.glyphs, instruction_len);
        self.instructions.extend_from_slice(outline.instructions);

        if outline.bbox != outline.computed_bbox() {
            let bbox: Vec<u8> = outline
                .bbox
                .iter()
                .flat_map(|val| val.to_be_bytes())
                .collect();
            self.set_bbox(glyph_idx, &bbox);
        }
        Ok(())
    }

    fn write_composite(
        &mut self,
        glyph_idx: u16,
        header: &[u8; 8],
        components: &[GlyphComponent],
        instructions: &[u8],
    ) -> Result<(), ParseError> {
        self.n_contours.extend_from_slice(&(-1_i16).to_be_bytes());
        for component in components {
            component.write(&mut self.composites);
        }
        let has_instructions = components
            .iter()
            .any(|component| component.flags & GlyphComponent::WE_HAVE_INSTRUCTIONS != 0);
        if has_instructions {
            let (len, rest) = instructions.split_first_chunk::<2>().ok_or_else(|| {
                ParseError::new(ParseErrorKind::UnexpectedEof).with_table(TableTag::GLYF)
            })?;
            let len = u16::from_be_bytes(*len);
            let instructions = rest.get(..usize::from(len)).ok_or_else(|| {
                ParseError::new(ParseErrorKind::UnexpectedEof).with_table(TableTag::GLYF)
            })?;
            write_255_u16(&mut self.glyphs, len);
            self.instructions.extend_from_slice(instructions);
        }
        // Composite glyphs always have an explicit bounding box.
        self.set_bbox(glyph_idx, header);
        Ok(())
    }
}

/// Transformed `glyf` table.
#[derive(Debug)]
pub(super) struct GlyfTransform {
    pub(super) data: Vec<u8>,
    /// Upper bound on the size of the `glyf` table reconstructed by a decoder.
    pub(super) reconstructed_len_bound: usize,
}

impl GlyfTransform {
    const HEADER_LEN: usize = 36;

    pub(super) fn new(glyphs: &GlyphData<'_>) -> Result<Self, ParseError> {
        let glyph_count = glyphs.glyph_count;
        let bitmap_len = 4 * usize::from(glyph_count).div_ceil(32);
        let mut streams = Streams {
            bbox_bitmap: vec![0; bitmap_len],
            ..Streams::default()
        };

        let mut reconstructed_len_bound = 0;
        for glyph_idx in 0..glyph_count {
            match glyphs.glyph(glyph_idx)? {
                // Glyphs without contours are reconstructed as empty ones.
                Glyph::Empty => {
                    streams.n_contours.extend_from_slice(&[0, 0]);
                }
                Glyph::Simple(raw) if raw.starts_with(&[0, 0]) => {
                    streams.n_contours.extend_from_slice(&[0, 0]);
                }
                Glyph::Simple(raw) => {
                    let outline = SimpleOutline::parse(raw)?;
                    streams.write_simple(glyph_idx, &outline)?;
                    // header, end points, instructions, and the worst case for flags / coordinates
                    reconstructed_len_bound += 12
                        + 2 * outline.end_points.len()
                        + outline.instructions.len()
                        + 5 * outline.points.len()
                        + 3;
                }
                Glyph::Composite {
                    header,
                    components,
                    instructions,
                } => {
                    let len_before = streams.composites.len();
                    streams.write_composite(glyph_idx, &header, &components, instructions)?;
                    reconstructed_len_bound +=
                        10 + streams.composites.len() - len_before + instructions.len() + 3;
                }
            }
        }

        let mut data = Vec::with_capacity(Self::HEADER_LEN);
        write_u16(&mut data, 0); // reserved
        write_u16(&mut data, 0); // optionFlags
        write_u16(&mut data, glyph_count);
        write_u16(&mut data, glyphs.loca.format.to_raw());
        let Streams {
            n_contours,
            n_points,
            flags,
            glyphs: glyph_stream,
            composites,
            bbox_bitmap,
            bboxes,
            instructions,
        } = streams;
        let bbox_stream_len = bbox_bitmap.len() + bboxes.len();
        for len in [
            n_contours.len(),
            n_points.len(),
            flags.len(),
            glyph_stream.len(),
            composites.len(),
            bbox_stream_len,
            instructions.len(),
        ] {
            write_u32(&mut data, u32::try_from(len).expect("stream length overflow"));
        }
        debug_assert_eq!(data.len(), Self::HEADER_LEN);

        for stream in [
            n_contours,
            n_points,
            flags,
            glyph_stream,
            composites,
            bbox_bitmap,
            bboxes,
            instructions,
        ] {
            data.extend(stream);
        }
        Ok(Self {
            data,
            reconstructed_len_bound,
        })
    }
}
