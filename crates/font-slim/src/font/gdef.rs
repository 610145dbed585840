//! `GDEF` table parsing.

use super::{
    layout::{parse_coverage, read_coverage, ClassDef},
    Cursor,
};
use crate::{errors::ParseErrorKind, ParseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CaretValue {
    Coordinate(i16),
    /// Index of a contour point in the ligature glyph.
    Point(u16),
}

impl CaretValue {
    fn parse(mut cursor: Cursor<'_>) -> Result<Self, ParseError> {
        let format_cursor = cursor;
        match cursor.read_u16()? {
            // Format 3 additionally references a device table, which is not retained.
            1 | 3 => Ok(Self::Coordinate(cursor.read_i16()?)),
            2 => Ok(Self::Point(cursor.read_u16()?)),
            format => Err(format_cursor.err(ParseErrorKind::UnexpectedTableFormat(format))),
        }
    }
}

/// Parsed `GDEF` table. The item variation store (version 1.3) is not retained.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct GdefTable {
    pub(crate) glyph_classes: ClassDef,
    /// Glyph → attachment point indices.
    pub(crate) attach_points: Vec<(u16, Vec<u16>)>,
    /// Ligature glyph → caret positions.
    pub(crate) ligature_carets: Vec<(u16, Vec<CaretValue>)>,
    pub(crate) mark_attach_classes: ClassDef,
    /// Mark glyph sets referenced from lookups by index (version 1.2+).
    pub(crate) mark_glyph_sets: Option<Vec<Vec<u16>>>,
}

impl GdefTable {
    pub(crate) fn parse(mut cursor: Cursor<'_>) -> Result<Self, ParseError> {
        let table = cursor;
        let version = cursor.read_u32_checked(|version| {
            if (0x_0001_0000..=0x_0001_0003).contains(&version) {
                Ok(version)
            } else {
                Err(ParseErrorKind::UnexpectedTableVersion(version))
            }
        })?;
        let glyph_classes = ClassDef::read(&mut cursor, table)?;
        let attach_list_offset = cursor.read_u16()?;
        let ligature_caret_list_offset = cursor.read_u16()?;
        let mark_attach_classes = ClassDef::read(&mut cursor, table)?;
        let mark_glyph_sets_offset = if version >= 0x_0001_0002 {
            Some(cursor.read_u16()?)
        } else {
            None
        };

        let attach_points = Self::parse_glyph_records(table, attach_list_offset, |mut points| {
            let count = points.read_u16()?;
            points.read_u16_array(count.into())
        })?;
        let ligature_carets =
            Self::parse_glyph_records(table, ligature_caret_list_offset, |mut ligature| {
                let ligature_cursor = ligature;
                let count = ligature.read_u16()?;
                let offsets = ligature.read_u16_array(count.into())?;
                offsets
                    .into_iter()
                    .map(|offset| CaretValue::parse(ligature_cursor.at(offset.into())?))
                    .collect()
            })?;

        let mark_glyph_sets = match mark_glyph_sets_offset {
            None => None,
            Some(0) => Some(vec![]),
            Some(offset) => Some(Self::parse_mark_glyph_sets(table.at(offset.into())?)?),
        };

        Ok(Self {
            glyph_classes,
            attach_points,
            ligature_carets,
            mark_attach_classes,
            mark_glyph_sets,
        })
    }

    /// Parses a list consisting of a coverage and per-glyph records (attachment list or
    /// ligature caret list).
    fn parse_glyph_records<'a, R>(
        table: Cursor<'a>,
        list_offset: u16,
        parse_record: impl Fn(Cursor<'a>) -> Result<R, ParseError>,
    ) -> Result<Vec<(u16, R)>, ParseError> {
        if list_offset == 0 {
            return Ok(vec![]);
        }
        let mut list = table.at(list_offset.into())?;
        let list_cursor = list;
        let coverage = read_coverage(&mut list, list_cursor)?;
        let count = list.read_u16()?;
        let offsets = list.read_u16_array(count.into())?;
        coverage
            .into_iter()
            .zip(offsets)
            .map(|(glyph, offset)| Ok((glyph, parse_record(list_cursor.at(offset.into())?)?)))
            .collect()
    }

    fn parse_mark_glyph_sets(mut cursor: Cursor<'_>) -> Result<Vec<Vec<u16>>, ParseError> {
        let sets_cursor = cursor;
        cursor.read_u16_checked(|format| {
            if format == 1 {
                Ok(())
            } else {
                Err(ParseErrorKind::UnexpectedTableFormat(format))
            }
        })?;
        let count = cursor.read_u16()?;
        (0..count)
            .map(|_| {
                let offset = cursor.read_u32()? as usize;
                parse_coverage(sets_cursor.at(offset)?)
            })
            .collect()
    }
}
