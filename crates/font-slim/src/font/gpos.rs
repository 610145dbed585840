//! `GPOS` lookup subtables.
//!
//! Device tables (hinting adjustments for specific sizes) referenced from value records and
//! anchors are not retained.

use super::{
    layout::{read_coverage, ClassDef, ContextSubtable, LayoutTable, LookupSubtable},
    Cursor,
};
use crate::{errors::ParseErrorKind, ParseError, TableTag};

/// Adjustments from a value record: x placement, y placement, x advance and y advance.
/// Fields not present in the value format are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ValueRecord(pub(crate) [i16; 4]);

impl ValueRecord {
    /// Value format bits for the fields stored in [`ValueRecord`].
    pub(crate) const VALUE_FLAGS: u16 = 0x000f;
    const DEVICE_FLAGS: u16 = 0x00f0;

    fn read(cursor: &mut Cursor<'_>, format: u16) -> Result<Self, ParseError> {
        let mut values = [0; 4];
        for (bit, value) in values.iter_mut().enumerate() {
            if format & (1 << bit) != 0 {
                *value = cursor.read_i16()?;
            }
        }
        let device_offsets = (format & Self::DEVICE_FLAGS).count_ones() as usize;
        cursor.skip(2 * device_offsets)?;
        Ok(Self(values))
    }

    fn read_pair(cursor: &mut Cursor<'_>, formats: [u16; 2]) -> Result<[Self; 2], ParseError> {
        Ok([Self::read(cursor, formats[0])?, Self::read(cursor, formats[1])?])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Anchor {
    pub(crate) x: i16,
    pub(crate) y: i16,
    /// Index of the glyph contour point (anchor format 2).
    pub(crate) point: Option<u16>,
}

impl Anchor {
    fn parse(mut cursor: Cursor<'_>) -> Result<Self, ParseError> {
        let format = cursor.read_u16_checked(|format| {
            if (1..=3).contains(&format) {
                Ok(format)
            } else {
                Err(ParseErrorKind::UnexpectedTableFormat(format))
            }
        })?;
        let x = cursor.read_i16()?;
        let y = cursor.read_i16()?;
        let point = if format == 2 {
            Some(cursor.read_u16()?)
        } else {
            None
        };
        Ok(Self { x, y, point })
    }

    /// Reads a nullable offset to an anchor relative to `base`.
    fn read(cursor: &mut Cursor<'_>, base: Cursor<'_>) -> Result<Option<Self>, ParseError> {
        match cursor.read_u16()? {
            0 => Ok(None),
            offset => Self::parse(base.at(offset.into())?).map(Some),
        }
    }
}

/// Anchors per mark class for each record of a base, mark-to-mark or ligature component array.
fn parse_anchor_array(
    mut cursor: Cursor<'_>,
    class_count: u16,
) -> Result<Vec<Vec<Option<Anchor>>>, ParseError> {
    let array = cursor;
    let count = cursor.read_u16()?;
    let mut records = Vec::with_capacity(count.into());
    for _ in 0..count {
        let anchors = (0..class_count)
            .map(|_| Anchor::read(&mut cursor, array))
            .collect::<Result<_, _>>()?;
        records.push(anchors);
    }
    Ok(records)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MarkRecord {
    pub(crate) class: u16,
    pub(crate) anchor: Anchor,
}

impl MarkRecord {
    fn parse_array(mut cursor: Cursor<'_>) -> Result<Vec<Self>, ParseError> {
        let array = cursor;
        let count = cursor.read_u16()?;
        (0..count)
            .map(|_| {
                let class = cursor.read_u16()?;
                let offset = cursor.read_u16()?;
                let anchor = Anchor::parse(array.at(offset.into())?)?;
                Ok(Self { class, anchor })
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PairValue {
    pub(crate) second: u16,
    pub(crate) values: [ValueRecord; 2],
}

/// Pair adjustment by glyph classes (format 2).
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ClassPairs {
    pub(crate) value_formats: [u16; 2],
    pub(crate) coverage: Vec<u16>,
    pub(crate) first_classes: ClassDef,
    pub(crate) second_classes: ClassDef,
    /// Values indexed by the first and then by the second class.
    pub(crate) values: Vec<Vec<[ValueRecord; 2]>>,
}

/// Mark-to-base or mark-to-mark attachment.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MarkAttachment {
    pub(crate) class_count: u16,
    pub(crate) marks: Vec<(u16, MarkRecord)>,
    /// Base glyphs (or marks being attached to) with an anchor per mark class.
    pub(crate) bases: Vec<(u16, Vec<Option<Anchor>>)>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MarkToLigature {
    pub(crate) class_count: u16,
    pub(crate) marks: Vec<(u16, MarkRecord)>,
    /// Ligatures with anchors per component and mark class.
    pub(crate) ligatures: Vec<(u16, Vec<Vec<Option<Anchor>>>)>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PosSubtable {
    Single {
        value_format: u16,
        values: Vec<(u16, ValueRecord)>,
    },
    /// Pair adjustment by glyphs (format 1): first glyph → pairs starting with it.
    Pairs {
        value_formats: [u16; 2],
        sets: Vec<(u16, Vec<PairValue>)>,
    },
    ClassPairs(ClassPairs),
    /// Glyph → entry and exit anchors.
    Cursive(Vec<(u16, [Option<Anchor>; 2])>),
    MarkAttachment(MarkAttachment),
    MarkToLigature(MarkToLigature),
    Context(ContextSubtable),
}

impl LookupSubtable for PosSubtable {
    const TABLE: TableTag = TableTag::GPOS;
    const EXTENSION: u16 = 9;

    fn parse(lookup_type: u16, mut cursor: Cursor<'_>) -> Result<Option<Self>, ParseError> {
        let table = cursor;
        if matches!(lookup_type, Self::CONTEXT | Self::CHAINED_CONTEXT) {
            let chained = lookup_type == Self::CHAINED_CONTEXT;
            return Ok(ContextSubtable::parse(chained, cursor)?.map(Self::Context));
        }

        let format = cursor.read_u16()?;
        Ok(Some(match (lookup_type, format) {
            (Self::SINGLE, 1 | 2) => {
                let coverage = read_coverage(&mut cursor, table)?;
                let value_format = cursor.read_u16()?;
                let values = if format == 1 {
                    let value = ValueRecord::read(&mut cursor, value_format)?;
                    coverage.into_iter().map(|glyph| (glyph, value)).collect()
                } else {
                    let count = cursor.read_u16()?;
                    let values = (0..count)
                        .map(|_| ValueRecord::read(&mut cursor, value_format))
                        .collect::<Result<Vec<_>, _>>()?;
                    coverage.into_iter().zip(values).collect()
                };
                Self::Single {
                    value_format: value_format & ValueRecord::VALUE_FLAGS,
                    values,
                }
            }
            (Self::PAIR, 1) => {
                let coverage = read_coverage(&mut cursor, table)?;
                let value_formats = [cursor.read_u16()?, cursor.read_u16()?];
                let count = cursor.read_u16()?;
                let offsets = cursor.read_u16_array(count.into())?;
                let sets = coverage.into_iter().zip(offsets).map(|(glyph, offset)| {
                    let mut set = table.at(offset.into())?;
                    let count = set.read_u16()?;
                    let mut pairs = Vec::with_capacity(count.into());
                    for _ in 0..count {
                        let second = set.read_u16()?;
                        let values = ValueRecord::read_pair(&mut set, value_formats)?;
                        pairs.push(PairValue { second, values });
                    }
                    Ok((glyph, pairs))
                });
                Self::Pairs {
                    value_formats: value_formats.map(|format| format & ValueRecord::VALUE_FLAGS),
                    sets: sets.collect::<Result<_, ParseError>>()?,
                }
            }
            (Self::PAIR, 2) => {
                let coverage = read_coverage(&mut cursor, table)?;
                let value_formats = [cursor.read_u16()?, cursor.read_u16()?];
                let first_classes = ClassDef::read(&mut cursor, table)?;
                let second_classes = ClassDef::read(&mut cursor, table)?;
                let first_count = cursor.read_u16()?;
                let second_count = cursor.read_u16()?;
                let mut values = Vec::with_capacity(first_count.into());
                for _ in 0..first_count {
                    let row = (0..second_count)
                        .map(|_| ValueRecord::read_pair(&mut cursor, value_formats))
                        .collect::<Result<_, _>>()?;
                    values.push(row);
                }
                Self::ClassPairs(ClassPairs {
                    value_formats: value_formats.map(|format| format & ValueRecord::VALUE_FLAGS),
                    coverage,
                    first_classes,
                    second_classes,
                    values,
                })
            }
            (Self::CURSIVE, 1) => {
                let coverage = read_coverage(&mut cursor, table)?;
                let count = cursor.read_u16()?;
                let mut anchors = Vec::with_capacity(count.into());
                for _ in 0..count {
                    let entry = Anchor::read(&mut cursor, table)?;
                    let exit = Anchor::read(&mut cursor, table)?;
                    anchors.push([entry, exit]);
                }
                Self::Cursive(coverage.into_iter().zip(anchors).collect())
            }
            (Self::MARK_TO_BASE | Self::MARK_TO_LIGATURE | Self::MARK_TO_MARK, 1) => {
                let mark_coverage = read_coverage(&mut cursor, table)?;
                let base_coverage = read_coverage(&mut cursor, table)?;
                let class_count = cursor.read_u16()?;
                let mark_array = table.at(cursor.read_u16()?.into())?;
                let marks = mark_coverage
                    .into_iter()
                    .zip(MarkRecord::parse_array(mark_array)?)
                    .collect();
                let mut base_array = table.at(cursor.read_u16()?.into())?;

                if lookup_type == Self::MARK_TO_LIGATURE {
                    let ligature_array = base_array;
                    let count = base_array.read_u16()?;
                    let offsets = base_array.read_u16_array(count.into())?;
                    let ligatures = offsets.into_iter().map(|offset| {
                        parse_anchor_array(ligature_array.at(offset.into())?, class_count)
                    });
                    let ligatures = ligatures.collect::<Result<Vec<_>, _>>()?;
                    Self::MarkToLigature(MarkToLigature {
                        class_count,
                        marks,
                        ligatures: base_coverage.into_iter().zip(ligatures).collect(),
                    })
                } else {
                    let anchors = parse_anchor_array(base_array, class_count)?;
                    Self::MarkAttachment(MarkAttachment {
                        class_count,
                        marks,
                        bases: base_coverage.into_iter().zip(anchors).collect(),
                    })
                }
            }
            _ => {
                log::debug!(
                    "skipping unsupported GPOS subtable (type {lookup_type}, format {format})"
                );
                return Ok(None);
            }
        }))
    }
}

impl PosSubtable {
    pub(crate) const SINGLE: u16 = 1;
    pub(crate) const PAIR: u16 = 2;
    pub(crate) const CURSIVE: u16 = 3;
    pub(crate) const MARK_TO_BASE: u16 = 4;
    pub(crate) const MARK_TO_LIGATURE: u16 = 5;
    pub(crate) const MARK_TO_MARK: u16 = 6;
    pub(crate) const CONTEXT: u16 = 7;
    pub(crate) const CHAINED_CONTEXT: u16 = 8;
}

/// Parsed `GPOS` table.
pub(crate) type GposTable = LayoutTable<PosSubtable>;
