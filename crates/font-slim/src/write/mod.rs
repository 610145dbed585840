//! Table serializers and container writers.

use core::{iter, mem};

pub(crate) use self::woff::encode_woff;
#[cfg(feature = "woff2")]
pub(crate) use self::woff2::encode_woff2;
use crate::{
    font::{
        CmapTable, Glyph, GlyphComponent, GlyphComponentArgs, GlyphData, LocaFormat, LocaTable,
        Metrics, MetricsHeader, MetricsTable, SegmentDeltas, SegmentWithDelta, SegmentedCoverage,
        SequentialMapGroup, TransformData,
    },
    FontContainer, TableTag,
};

#[cfg(feature = "woff2")]
mod brotli;
#[cfg(feature = "woff2")]
mod glyf_transform;
mod gdef;
mod gpos;
mod gsub;
mod kern;
mod layout;
mod woff;
#[cfg(feature = "woff2")]
mod woff2;

pub(crate) fn write_u16(writer: &mut Vec<u8>, value: u16) {
    writer.extend_from_slice(&value.to_be_bytes());
}

pub(crate) fn write_u32(writer: &mut Vec<u8>, value: u32) {
    writer.extend_from_slice(&value.to_be_bytes());
}

pub(crate) fn pad_to_4_bytes(writer: &mut Vec<u8>) {
    if writer.len() % 4 > 0 {
        let zero_padding = 4 - writer.len() % 4;
        writer.extend(iter::repeat_n(0_u8, zero_padding));
    }
}

impl SegmentedCoverage {
    fn from_map(map: &[(char, u16)]) -> Self {
        let mut groups = vec![];
        let [(first_char, first_idx), rest @ ..] = map else {
            return Self::default();
        };
        let mut current_group = SequentialMapGroup {
            start_char_code: (*first_char).into(),
            end_char_code: (*first_char).into(),
            start_glyph_id: (*first_idx).into(),
        };

        for &(ch, glyph_idx) in rest {
            if u32::from(ch) == current_group.end_char_code + 1
                && u32::from(glyph_idx) == current_group.map_unchecked(ch)
            {
                current_group.end_char_code += 1;
            } else {
                let prev_group = mem::replace(
                    &mut current_group,
                    SequentialMapGroup {
                        start_char_code: ch.into(),
                        end_char_code: ch.into(),
                        start_glyph_id: glyph_idx.into(),
                    },
                );
                groups.push(prev_group);
            }
        }

        groups.push(current_group);
        Self { groups }
    }

    fn subtable_len(&self) -> usize {
        16 + 12 * self.groups.len()
    }

    fn write(&self, writer: &mut Vec<u8>) {
        write_u16(writer, 12); // subtable format
        write_u16(writer, 0); // reserved

        write_u32(
            writer,
            self.subtable_len()
                .try_into()
                .expect("subtable_len overflow"),
        );
        write_u32(writer, 0); // language
        write_u32(
            writer,
            self.groups.len().try_into().expect("groups.len() overflow"),
        );
        for group in &self.groups {
            write_u32(writer, group.start_char_code);
            write_u32(writer, group.end_char_code);
            write_u32(writer, group.start_glyph_id);
        }
    }
}

impl SegmentDeltas<'static> {
    /// Maximum number of segments so that the subtable length fits into `u16`.
    const MAX_SEGMENTS: usize = (u16::MAX as usize - 16) / 8;

    /// Converts BMP groups from `coverage` into segments. Groups exceeding the subtable capacity
    /// are truncated; they are still present in the accompanying format 12 subtable.
    fn from_coverage(coverage: &SegmentedCoverage) -> (Self, bool) {
        let bmp_groups = coverage
            .groups
            .iter()
            .filter(|group| group.end_char_code < u32::from(u16::MAX));
        #[allow(clippy::cast_possible_truncation)]
        // `_ as u16` is safe due to filtering above
        let delta_segments = bmp_groups.map(|group| {
            let start_code = group.start_char_code as u16;
            SegmentWithDelta {
                start_code,
                end_code: group.end_char_code as u16,
                id_delta: (group.start_glyph_id as u16).wrapping_sub(start_code),
                id_range_offset: 0,
            }
        });
        let mut segments: Vec<_> = delta_segments.collect();
        let is_truncated = segments.len() >= Self::MAX_SEGMENTS;
        segments.truncate(Self::MAX_SEGMENTS - 1);

        // The final segment must have `start_code == end_code == 0xffff`.
        segments.push(SegmentWithDelta {
            start_code: u16::MAX,
            end_code: u16::MAX,
            id_delta: 1, // will map `start_code` to glyph #0 (the missing glyph) as recommended
            id_range_offset: 0,
        });
        let this = Self {
            segments,
            glyph_id_array: &[],
        };
        (this, is_truncated)
    }
}

impl SegmentDeltas<'_> {
    fn subtable_len(&self) -> usize {
        16 + 8 * self.segments.len() + self.glyph_id_array.len()
    }

    fn write(&self, writer: &mut Vec<u8>) {
        write_u16(writer, 4); // subtable format
        write_u16(
            writer,
            self.subtable_len()
                .try_into()
                .expect("subtable_len overflow"),
        );
        write_u16(writer, 0); // language

        let segment_count = u16::try_from(self.segments.len()).expect("segments.len() overflow");
        write_u16(writer, 2 * segment_count);
        let entry_selector = u16::try_from(segment_count.max(1).ilog2()).unwrap_or(0);
        let search_range = 1 << (entry_selector + 1);
        write_u16(writer, search_range);
        write_u16(writer, entry_selector);
        let range_shift = (2 * segment_count).saturating_sub(search_range);
        write_u16(writer, range_shift);

        for segment in &self.segments {
            write_u16(writer, segment.end_code);
        }
        write_u16(writer, 0); // reserved padding
        for segment in &self.segments {
            write_u16(writer, segment.start_code);
        }
        for segment in &self.segments {
            write_u16(writer, segment.id_delta);
        }
        for segment in &self.segments {
            write_u16(writer, segment.id_range_offset);
        }
        writer.extend_from_slice(self.glyph_id_array);
    }
}

impl CmapTable<'_> {
    /// Writes a `cmap` table for the specified map, which must be sorted by char.
    ///
    /// The table always contains a format 4 subtable for BMP chars, referenced by the (0, 3)
    /// and (3, 1) encoding records. If there are non-BMP chars (or the BMP chars do not fit
    /// into format 4), a format 12 subtable is added and referenced by the (0, 4) and (3, 10)
    /// records.
    pub(crate) fn write_for_map(map: &[(char, u16)], writer: &mut Vec<u8>) {
        let coverage = SegmentedCoverage::from_map(map);
        let (deltas, is_truncated) = SegmentDeltas::from_coverage(&coverage);
        let has_non_bmp = map
            .last()
            .is_some_and(|&(ch, _)| u32::from(ch) >= u32::from(u16::MAX));
        let needs_coverage = has_non_bmp || is_truncated;

        let table_start = writer.len();
        write_u16(writer, 0); // table version
        let record_count: u16 = if needs_coverage { 4 } else { 2 };
        write_u16(writer, record_count);

        let deltas_offset = 4 + 8 * u32::from(record_count);
        let coverage_offset =
            deltas_offset + u32::try_from(deltas.subtable_len()).expect("subtable_len overflow");
        let mut records = vec![
            (Self::UNICODE_PLATFORM, 3, deltas_offset),
            (Self::WINDOWS_PLATFORM, 1, deltas_offset),
        ];
        if needs_coverage {
            records.push((Self::UNICODE_PLATFORM, 4, coverage_offset));
            records.push((Self::WINDOWS_PLATFORM, 10, coverage_offset));
        }
        records.sort_unstable();
        for (platform_id, encoding_id, offset) in records {
            write_u16(writer, platform_id);
            write_u16(writer, encoding_id);
            write_u32(writer, offset);
        }

        debug_assert_eq!(writer.len() - table_start, deltas_offset as usize);
        deltas.write(writer);
        if needs_coverage {
            coverage.write(writer);
        }
    }
}

impl MetricsTable<'_> {
    /// Writes long metrics and side bearings, collapsing trailing equal advances.
    /// Returns the number of long metrics.
    pub(crate) fn write_for_glyphs(metrics: &[Metrics], writer: &mut Vec<u8>) -> u16 {
        let mut number_of_metrics = metrics.len();
        while let Some([prev, current]) = metrics[..number_of_metrics].last_chunk::<2>() {
            if prev.advance != current.advance {
                break;
            }
            number_of_metrics -= 1;
        }

        for (i, glyph) in metrics.iter().enumerate() {
            if i < number_of_metrics {
                write_u16(writer, glyph.advance);
            }
            write_u16(writer, glyph.side_bearing);
        }

        // The number of metrics doesn't exceed the number of glyphs, which fits into `u16`
        u16::try_from(number_of_metrics).unwrap_or(u16::MAX)
    }
}

impl MetricsHeader<'_> {
    pub(crate) fn write(&self, number_of_metrics: u16, writer: &mut Vec<u8>) {
        writer.extend_from_slice(&self.raw[..Self::EXPECTED_LEN - 2]);
        write_u16(writer, number_of_metrics);
    }
}

impl LocaTable<'_> {
    pub(crate) fn write(locations: &[usize], writer: &mut Vec<u8>) -> LocaFormat {
        let all_even = locations.iter().all(|&loc| loc % 2 == 0);
        let in_bounds = locations
            .last()
            .is_none_or(|&loc| loc <= usize::from(u16::MAX) * 2);
        if all_even && in_bounds {
            for &loc in locations {
                #[allow(clippy::cast_possible_truncation)]
                // doesn't happen due to the preceding check
                write_u16(writer, (loc / 2) as u16);
            }
            LocaFormat::Short
        } else {
            for &loc in locations {
                write_u32(writer, u32::try_from(loc).expect("glyph location overflow"));
            }
            LocaFormat::Long
        }
    }
}

impl GlyphData<'_> {
    /// Writes the `head` table with zeroed `checkSumAdjustment` and the specified `loca` format.
    pub(crate) fn write_head_table(original: &[u8], loca_format: LocaFormat, writer: &mut Vec<u8>) {
        const CHECKSUM_OFFSET: usize = FontContainer::HEAD_CHECKSUM_OFFSET;

        writer.extend_from_slice(&original[..CHECKSUM_OFFSET]);
        write_u32(writer, 0); // adjusted when serializing the container
        writer.extend_from_slice(&original[CHECKSUM_OFFSET + 4..Self::LOCA_FORMAT_OFFSET]);
        write_u16(writer, loca_format.to_raw());
        writer.extend_from_slice(&original[Self::LOCA_FORMAT_OFFSET + 2..]);
    }
}

impl Glyph<'_> {
    pub(crate) fn write(&self, writer: &mut Vec<u8>) {
        match self {
            Self::Empty => { /* do nothing */ }
            Self::Simple(bytes) => {
                writer.extend_from_slice(bytes);
            }
            Self::Composite {
                header,
                components,
                instructions,
            } => {
                write_u16(writer, u16::MAX); // numberOfContours = -1
                writer.extend_from_slice(header);
                for component in components {
                    component.write(writer);
                }
                writer.extend_from_slice(instructions);
            }
        }
    }
}

impl GlyphComponent {
    pub(crate) fn write(&self, writer: &mut Vec<u8>) {
        write_u16(writer, self.flags);
        write_u16(writer, self.glyph_idx);
        match self.args {
            GlyphComponentArgs::U16(args) => write_u16(writer, args),
            GlyphComponentArgs::U32(args) => write_u32(writer, args),
        }
        match self.transform {
            TransformData::None => { /* do nothing */ }
            TransformData::Scale(val) => write_u16(writer, val),
            TransformData::TwoScales([x, y]) => {
                write_u16(writer, x);
                write_u16(writer, y);
            }
            TransformData::Affine([xx, xy, yx, yy]) => {
                write_u16(writer, xx);
                write_u16(writer, xy);
                write_u16(writer, yx);
                write_u16(writer, yy);
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
#[cfg_attr(test, derive(PartialEq))]
pub(crate) struct TableRecord {
    pub(crate) tag: TableTag,
    pub(crate) checksum: u32,
    /// Offset is initially recorded relative to the table data start. It's always 4-byte aligned.
    pub(crate) offset: u32,
    pub(crate) length: u32,
}

impl TableRecord {
    const BYTE_LEN: usize = 16;

    fn write_opentype(&self, writer: &mut Vec<u8>) {
        writer.extend_from_slice(&self.tag.0);
        write_u32(writer, self.checksum);
        write_u32(writer, self.offset);
        write_u32(writer, self.length);
    }

    fn self_checksum(&self) -> u32 {
        u32::from_be_bytes(self.tag.0)
            .wrapping_add(self.checksum)
            .wrapping_add(self.offset)
            .wrapping_add(self.length)
    }
}

/// Lays out table data of a [`FontContainer`] and computes the table directory.
#[derive(Debug, Clone)]
pub(crate) struct FontWriter {
    sfnt_version: u32,
    pub(crate) tables: Vec<TableRecord>,
    /// Contains *aligned* table data
    pub(crate) table_data: Vec<u8>,
}

impl FontWriter {
    const SFNT_HEADER_LEN: usize = 12;

    pub(crate) fn new(container: &FontContainer) -> Self {
        const CHECKSUM_OFFSET: usize = FontContainer::HEAD_CHECKSUM_OFFSET;

        let mut this = Self {
            sfnt_version: container.sfnt_version(),
            tables: vec![],
            table_data: vec![],
        };
        for (tag, data) in container.iter() {
            if tag == TableTag::HEAD && data.len() >= CHECKSUM_OFFSET + 4 {
                // The `head` checksum is computed with zeroed `checkSumAdjustment`.
                this.write_table(tag, |buffer| {
                    buffer.extend_from_slice(&data[..CHECKSUM_OFFSET]);
                    write_u32(buffer, 0);
                    buffer.extend_from_slice(&data[CHECKSUM_OFFSET + 4..]);
                });
            } else {
                this.write_raw_table(tag, data);
            }
        }
        this
    }

    fn write_table<T>(&mut self, tag: TableTag, with: impl FnOnce(&mut Vec<u8>) -> T) -> T {
        let offset = self.table_data.len();
        debug_assert_eq!(offset % 4, 0, "unaligned offset: {offset}");

        let output = with(&mut self.table_data);
        let length = self.table_data.len() - offset;
        // Pad the table heap to a 4-byte boundary.
        pad_to_4_bytes(&mut self.table_data);

        let checksum = FontContainer::checksum(&self.table_data[offset..]);
        self.tables.push(TableRecord {
            tag,
            checksum,
            offset: u32::try_from(offset).expect("table offset overflow"),
            length: u32::try_from(length).expect("table length overflow"),
        });
        output
    }

    fn write_raw_table(&mut self, tag: TableTag, content: &[u8]) {
        self.write_table(tag, |buffer| buffer.extend_from_slice(content));
    }

    pub(crate) fn sfnt_version(&self) -> u32 {
        self.sfnt_version
    }

    fn write_sfnt_header(&self) -> Vec<u8> {
        let mut buffer = vec![];
        write_u32(&mut buffer, self.sfnt_version);

        let table_count = u16::try_from(self.tables.len()).expect("too many tables");
        write_u16(&mut buffer, table_count);
        let entry_selector = table_count.checked_ilog2().unwrap_or(0);
        let search_range = 16_u32 << entry_selector;
        let range_shift = (16 * u32::from(table_count)).saturating_sub(search_range);
        #[allow(clippy::cast_possible_truncation)] // values overflow only for >4,095 tables
        {
            write_u16(&mut buffer, search_range as u16);
            write_u16(&mut buffer, entry_selector as u16);
            write_u16(&mut buffer, range_shift as u16);
        }

        debug_assert_eq!(buffer.len(), Self::SFNT_HEADER_LEN);
        buffer
    }

    /// Returns the starting offset of table data.
    pub(crate) fn data_offset(&self) -> usize {
        Self::SFNT_HEADER_LEN + self.tables.len() * TableRecord::BYTE_LEN
    }

    /// Returns the size of the serialized sfnt font.
    pub(crate) fn sfnt_len(&self) -> usize {
        self.data_offset() + self.table_data.len()
    }

    pub(crate) fn into_opentype(mut self) -> Vec<u8> {
        let mut buffer = self.write_sfnt_header();
        self.adjust_data(FontContainer::checksum(&buffer));

        self.tables.sort_unstable_by_key(|record| record.tag);
        for record in &self.tables {
            record.write_opentype(&mut buffer);
        }
        buffer.extend(self.table_data);
        buffer
    }

    /// Shifts table offsets by the table directory length and patches
    /// `checkSumAdjustment` in the `head` table.
    pub(crate) fn adjust_data(&mut self, sfnt_header_checksum: u32) {
        let data_offset = self.data_offset();
        let data_offset_u32 = u32::try_from(data_offset).expect("data_offset overflow");

        let mut file_checksum = sfnt_header_checksum;
        for record in &mut self.tables {
            record.offset += data_offset_u32;
            file_checksum = file_checksum
                .wrapping_add(record.self_checksum())
                .wrapping_add(record.checksum);
        }
        self.patch_head_table(file_checksum, data_offset);
    }

    pub(crate) fn adjust_data_for_sfnt(&mut self) {
        let header = self.write_sfnt_header();
        self.adjust_data(FontContainer::checksum(&header));
    }

    fn checksum_adjustment_offset(&self) -> Option<usize> {
        let head_table = self
            .tables
            .iter()
            .find(|record| record.tag == TableTag::HEAD)?;
        let min_len = FontContainer::HEAD_CHECKSUM_OFFSET + 4;
        (head_table.length as usize >= min_len)
            .then(|| head_table.offset as usize + FontContainer::HEAD_CHECKSUM_OFFSET)
    }

    fn patch_head_table(&mut self, file_checksum: u32, data_offset: usize) {
        let checksum_adjustment = FontContainer::SFNT_CHECKSUM.wrapping_sub(file_checksum);

        let Some(offset) = self.checksum_adjustment_offset() else {
            return;
        };
        // At this point, the table offset already includes the heap offset, so we need to subtract it.
        let offset = offset - data_offset;
        self.table_data[offset..offset + 4].copy_from_slice(&checksum_adjustment.to_be_bytes());
    }

    /// Returns unpadded table data for the specified record. Must be called after `adjust_data()`.
    pub(crate) fn table_bytes(&self, record: &TableRecord) -> &[u8] {
        let start = record.offset as usize - self.data_offset();
        &self.table_data[start..start + record.length as usize]
    }
}
