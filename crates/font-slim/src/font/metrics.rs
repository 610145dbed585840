//! Horizontal and vertical metrics (`hhea` / `hmtx`, `vhea` / `vmtx`).

use super::Cursor;
use crate::{errors::ParseErrorKind, ParseError};

/// Metrics of a single glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Metrics {
    pub(crate) advance: u16,
    /// Left side bearing for horizontal metrics, top side bearing for vertical ones.
    /// Stored as raw bits of an `i16`.
    pub(crate) side_bearing: u16,
}

/// `hhea` or `vhea` table. Both have the same layout, with the number of long metrics
/// recorded in the last field.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MetricsHeader<'a> {
    pub(crate) raw: &'a [u8],
    pub(crate) number_of_metrics: u16,
}

impl<'a> MetricsHeader<'a> {
    pub(crate) const EXPECTED_LEN: usize = 36; // 18 words

    pub(super) fn parse(cursor: Cursor<'a>) -> Result<Self, ParseError> {
        if cursor.bytes.len() != Self::EXPECTED_LEN {
            return Err(cursor.err(ParseErrorKind::UnexpectedTableLen {
                expected: Self::EXPECTED_LEN,
                actual: cursor.bytes.len(),
            }));
        }
        let mut count_cursor = cursor.at(Self::EXPECTED_LEN - 2)?;
        let number_of_metrics = count_cursor.read_u16_checked(|count| {
            if count == 0 {
                Err(ParseErrorKind::UnexpectedTableLen {
                    expected: 1,
                    actual: 0,
                })
            } else {
                Ok(count)
            }
        })?;
        Ok(Self {
            raw: cursor.bytes,
            number_of_metrics,
        })
    }
}

/// `hmtx` or `vmtx` table.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MetricsTable<'a> {
    cursor: Cursor<'a>,
    number_of_metrics: u16,
}

impl<'a> MetricsTable<'a> {
    pub(super) fn new(
        cursor: Cursor<'a>,
        header: &MetricsHeader<'_>,
        glyph_count: u16,
    ) -> Result<Self, ParseError> {
        let number_of_metrics = header.number_of_metrics.min(glyph_count.max(1));
        let expected_len = 4 * usize::from(number_of_metrics)
            + 2 * usize::from(glyph_count.saturating_sub(number_of_metrics));
        if cursor.bytes.len() < expected_len {
            return Err(cursor.err(ParseErrorKind::UnexpectedTableLen {
                expected: expected_len,
                actual: cursor.bytes.len(),
            }));
        }
        Ok(Self {
            cursor,
            number_of_metrics,
        })
    }

    pub(crate) fn metrics(&self, glyph_idx: u16) -> Result<Metrics, ParseError> {
        let (advance, side_bearing);
        if glyph_idx < self.number_of_metrics {
            let mut cursor = self.cursor.at(usize::from(glyph_idx) * 4)?;
            advance = cursor.read_u16()?;
            side_bearing = cursor.read_u16()?;
        } else {
            let advance_offset = usize::from(self.number_of_metrics - 1) * 4;
            advance = self.cursor.at(advance_offset)?.read_u16()?;

            let bearing_offset = usize::from(self.number_of_metrics) * 4
                + usize::from(glyph_idx - self.number_of_metrics) * 2;
            side_bearing = self.cursor.at(bearing_offset)?.read_u16()?;
        }
        Ok(Metrics {
            advance,
            side_bearing,
        })
    }
}
