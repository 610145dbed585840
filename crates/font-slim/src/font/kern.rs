//! Legacy `kern` table.

use super::Cursor;
use crate::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct KernPair {
    pub(crate) left: u16,
    pub(crate) right: u16,
    pub(crate) value: i16,
}

/// Format 0 subtable with an ordered list of kerning pairs.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct KernSubtable {
    pub(crate) coverage: u16,
    pub(crate) pairs: Vec<KernPair>,
}

/// `kern` table in the OpenType (version 0) layout. Only format 0 subtables are retained.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct KernTable {
    pub(crate) subtables: Vec<KernSubtable>,
}

impl KernTable {
    const SUBTABLE_HEADER_LEN: usize = 6;

    /// Returns `Ok(None)` if the table has no supported subtables or uses the Apple layout.
    pub(crate) fn parse(mut cursor: Cursor<'_>) -> Result<Option<Self>, ParseError> {
        let version = cursor.read_u16()?;
        if version != 0 {
            log::debug!("skipping `kern` table with unsupported version {version}");
            return Ok(None);
        }

        let table_count = cursor.read_u16()?;
        let mut subtables = vec![];
        for _ in 0..table_count {
            let mut subtable = cursor;
            subtable.skip(2)?; // version
            let len = usize::from(subtable.read_u16()?);
            let coverage = subtable.read_u16()?;
            let format = coverage >> 8;
            if format != 0 {
                log::debug!("skipping `kern` subtable with unsupported format {format}");
                cursor.skip(len.max(Self::SUBTABLE_HEADER_LEN))?;
                continue;
            }

            let pair_count = usize::from(subtable.read_u16()?);
            subtable.skip(6)?; // searchRange, entrySelector, rangeShift
            let mut pairs = Vec::with_capacity(pair_count);
            for _ in 0..pair_count {
                pairs.push(KernPair {
                    left: subtable.read_u16()?,
                    right: subtable.read_u16()?,
                    value: subtable.read_i16()?,
                });
            }
            // `length` overflows for large subtables, so the number of pairs is used instead.
            cursor.skip(Self::SUBTABLE_HEADER_LEN + 8 + 6 * pair_count)?;
            subtables.push(KernSubtable { coverage, pairs });
        }

        Ok(if subtables.is_empty() {
            None
        } else {
            Some(Self { subtables })
        })
    }
}
