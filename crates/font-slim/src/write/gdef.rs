//! Subsetting and serialization of the `GDEF` table.

use super::layout::{subset_coverage, write_coverage, TableWriter};
use crate::{
    font::{CaretValue, GdefTable},
    GlyphRenumbering,
};

fn subset_glyph_records<T: Clone>(
    records: &[(u16, T)],
    renumbering: &GlyphRenumbering,
) -> Vec<(u16, T)> {
    let mut records: Vec<_> = records
        .iter()
        .filter_map(|(glyph, record)| Some((renumbering.get(*glyph)?, record.clone())))
        .collect();
    records.sort_unstable_by_key(|(glyph, _)| *glyph);
    records
}

/// Writes a list with a coverage and an offset to a record for each covered glyph.
fn write_glyph_records<T>(
    records: &[(u16, T)],
    write_record: impl Fn(&T) -> Option<Vec<u8>>,
) -> Option<Option<Vec<u8>>> {
    if records.is_empty() {
        return Some(None);
    }
    let coverage: Vec<_> = records.iter().map(|(glyph, _)| *glyph).collect();
    let mut writer = TableWriter::default();
    writer
        .offset16(write_coverage(&coverage)?)
        .count(records.len())?;
    for (_, record) in records {
        writer.offset16(write_record(record)?);
    }
    writer.finish().map(Some)
}

impl CaretValue {
    fn write(self) -> Vec<u8> {
        let (format, value) = match self {
            Self::Coordinate(value) => (1_u16, value.to_be_bytes()),
            Self::Point(index) => (2, index.to_be_bytes()),
        };
        let mut buffer = format.to_be_bytes().to_vec();
        buffer.extend_from_slice(&value);
        buffer
    }
}

impl GdefTable {
    /// Retains and renumbers data for retained glyphs.
    pub(crate) fn subset(&self, renumbering: &GlyphRenumbering) -> Self {
        let mark_glyph_sets = self.mark_glyph_sets.as_ref().map(|sets| {
            sets.iter()
                .map(|glyphs| subset_coverage(glyphs, renumbering))
                .collect()
        });
        Self {
            glyph_classes: self.glyph_classes.subset(renumbering),
            attach_points: subset_glyph_records(&self.attach_points, renumbering),
            ligature_carets: subset_glyph_records(&self.ligature_carets, renumbering),
            mark_attach_classes: self.mark_attach_classes.subset(renumbering),
            mark_glyph_sets,
        }
    }

    /// Checks whether the table has no data. Mark glyph sets are referenced by index from
    /// lookups, so they count even if empty.
    pub(crate) fn is_empty(&self) -> bool {
        let no_mark_glyph_sets = self.mark_glyph_sets.as_ref().is_none_or(Vec::is_empty);
        self.glyph_classes.0.is_empty()
            && self.attach_points.is_empty()
            && self.ligature_carets.is_empty()
            && self.mark_attach_classes.0.is_empty()
            && no_mark_glyph_sets
    }

    /// Serializes the table as version 1.0, or 1.2 if it has mark glyph sets.
    /// Returns `None` if an offset overflows.
    pub(crate) fn write(&self) -> Option<Vec<u8>> {
        let glyph_classes = if self.glyph_classes.0.is_empty() {
            None
        } else {
            Some(self.glyph_classes.write()?)
        };
        let attach_list = write_glyph_records(&self.attach_points, |points| {
            let mut writer = TableWriter::default();
            writer.count(points.len())?.glyphs(points);
            writer.finish()
        })?;
        let ligature_caret_list = write_glyph_records(&self.ligature_carets, |carets| {
            let mut writer = TableWriter::default();
            writer.count(carets.len())?;
            for caret in carets {
                writer.offset16(caret.write());
            }
            writer.finish()
        })?;
        let mark_attach_classes = if self.mark_attach_classes.0.is_empty() {
            None
        } else {
            Some(self.mark_attach_classes.write()?)
        };

        let mut writer = TableWriter::default();
        let minor_version = if self.mark_glyph_sets.is_some() { 2 } else { 0 };
        writer
            .u16(1)
            .u16(minor_version)
            .nullable_offset16(glyph_classes)
            .nullable_offset16(attach_list)
            .nullable_offset16(ligature_caret_list)
            .nullable_offset16(mark_attach_classes);
        if let Some(sets) = &self.mark_glyph_sets {
            let mut sets_writer = TableWriter::default();
            sets_writer.u16(1).count(sets.len())?;
            for glyphs in sets {
                sets_writer.offset32(write_coverage(glyphs)?);
            }
            writer.offset16(sets_writer.finish()?);
        }
        writer.finish()
    }
}
