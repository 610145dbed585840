//! Common structure of OpenType layout tables (`GSUB` and `GPOS`).
//!
//! Both tables consist of a script list, a feature list and a lookup list; only lookup subtables
//! differ, so the table is generic over the [`LookupSubtable`] type. Building blocks shared by
//! subtables (coverage, class definitions and sequence contexts) are defined here as well.

use super::Cursor;
use crate::{errors::ParseErrorKind, ParseError, TableTag};

/// Lookup flag signalling that the lookup record contains the mark filtering set index.
pub(crate) const USE_MARK_FILTERING_SET: u16 = 0x0010;

/// Subtable of a layout lookup.
pub(crate) trait LookupSubtable: Sized {
    /// Table the lookups with these subtables belong to.
    const TABLE: TableTag;
    /// Type of extension lookups wrapping other subtables with 32-bit offsets.
    const EXTENSION: u16;

    /// Parses a subtable with the specified lookup type (extensions already resolved).
    /// Returns `Ok(None)` for unsupported lookup types or subtable formats.
    fn parse(lookup_type: u16, cursor: Cursor<'_>) -> Result<Option<Self>, ParseError>;
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LangSys {
    pub(crate) required_feature_index: u16,
    pub(crate) feature_indices: Vec<u16>,
}

impl LangSys {
    pub(crate) const NO_REQUIRED_FEATURE: u16 = 0xffff;

    fn parse(mut cursor: Cursor<'_>) -> Result<Self, ParseError> {
        cursor.skip(2)?; // lookupOrderOffset
        let required_feature_index = cursor.read_u16()?;
        let count = cursor.read_u16()?;
        Ok(Self {
            required_feature_index,
            feature_indices: cursor.read_u16_array(count.into())?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Script {
    pub(crate) tag: [u8; 4],
    pub(crate) default_lang_sys: Option<LangSys>,
    pub(crate) lang_systems: Vec<([u8; 4], LangSys)>,
}

impl Script {
    fn parse(tag: [u8; 4], mut cursor: Cursor<'_>) -> Result<Self, ParseError> {
        let table_cursor = cursor;
        let default_offset = cursor.read_u16()?;
        let default_lang_sys = if default_offset == 0 {
            None
        } else {
            Some(LangSys::parse(table_cursor.at(default_offset.into())?)?)
        };

        let count = cursor.read_u16()?;
        let lang_systems = (0..count).map(|_| {
            let tag = cursor.read_byte_array::<4>()?;
            let offset = cursor.read_u16()?;
            Ok((tag, LangSys::parse(table_cursor.at(offset.into())?)?))
        });
        Ok(Self {
            tag,
            default_lang_sys,
            lang_systems: lang_systems.collect::<Result<_, ParseError>>()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Feature {
    pub(crate) tag: [u8; 4],
    pub(crate) lookup_indices: Vec<u16>,
}

impl Feature {
    fn parse(tag: [u8; 4], mut cursor: Cursor<'_>) -> Result<Self, ParseError> {
        cursor.skip(2)?; // featureParamsOffset
        let count = cursor.read_u16()?;
        Ok(Self {
            tag,
            lookup_indices: cursor.read_u16_array(count.into())?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Lookup<T> {
    /// Lookup type with extensions resolved.
    pub(crate) lookup_type: u16,
    pub(crate) flag: u16,
    pub(crate) mark_filtering_set: Option<u16>,
    pub(crate) subtables: Vec<T>,
    /// Number of subtables skipped during parsing since they are not supported.
    pub(crate) skipped_subtables: usize,
}

impl<T: LookupSubtable> Lookup<T> {
    fn parse(mut cursor: Cursor<'_>) -> Result<Self, ParseError> {
        let table_cursor = cursor;
        let raw_type = cursor.read_u16()?;
        let flag = cursor.read_u16()?;
        let count = cursor.read_u16()?;
        let offsets = cursor.read_u16_array(count.into())?;
        let mark_filtering_set = if flag & USE_MARK_FILTERING_SET == 0 {
            None
        } else {
            Some(cursor.read_u16()?)
        };

        let mut lookup_type = raw_type;
        let mut subtables = Vec::with_capacity(offsets.len());
        let mut skipped_subtables = 0;
        for (i, offset) in offsets.into_iter().enumerate() {
            let mut subtable = table_cursor.at(offset.into())?;
            let mut subtable_type = raw_type;
            if raw_type == T::EXTENSION {
                let extension = subtable;
                subtable.skip(2)?; // format
                subtable_type = subtable.read_u16()?;
                subtable = extension.at(subtable.read_u32()? as usize)?;
            }
            // All subtables in a lookup must have the same type, so the first one decides.
            if i == 0 {
                lookup_type = subtable_type;
            } else if subtable_type != lookup_type {
                log::debug!(
                    "skipping `{}` subtable with mismatched type {subtable_type}",
                    T::TABLE
                );
                skipped_subtables += 1;
                continue;
            }
            match T::parse(subtable_type, subtable)? {
                Some(parsed) => subtables.push(parsed),
                None => skipped_subtables += 1,
            }
        }

        Ok(Self {
            lookup_type,
            flag,
            mark_filtering_set,
            subtables,
            skipped_subtables,
        })
    }
}

/// Parsed `GSUB` or `GPOS` table. Feature variations (version 1.1) are not retained.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LayoutTable<T> {
    pub(crate) scripts: Vec<Script>,
    pub(crate) features: Vec<Feature>,
    pub(crate) lookups: Vec<Lookup<T>>,
}

impl<T: LookupSubtable> LayoutTable<T> {
    pub(crate) fn parse(mut cursor: Cursor<'_>) -> Result<Self, ParseError> {
        let table_cursor = cursor;
        cursor.read_u16_checked(|major| {
            if major == 1 {
                Ok(())
            } else {
                Err(ParseErrorKind::UnexpectedTableVersion(major.into()))
            }
        })?;
        cursor.skip(2)?; // minorVersion
        let script_list_offset = cursor.read_u16()?;
        let feature_list_offset = cursor.read_u16()?;
        let lookup_list_offset = cursor.read_u16()?;

        let scripts = parse_tagged_list(table_cursor, script_list_offset, Script::parse)?;
        let features = parse_tagged_list(table_cursor, feature_list_offset, Feature::parse)?;
        let mut lookups = vec![];
        if lookup_list_offset != 0 {
            let mut list = table_cursor.at(lookup_list_offset.into())?;
            let list_cursor = list;
            for _ in 0..list.read_u16()? {
                let offset = list.read_u16()?;
                lookups.push(Lookup::parse(list_cursor.at(offset.into())?)?);
            }
        }

        Ok(Self {
            scripts,
            features,
            lookups,
        })
    }
}

fn parse_tagged_list<'a, R>(
    table_cursor: Cursor<'a>,
    list_offset: u16,
    parse_record: impl Fn([u8; 4], Cursor<'a>) -> Result<R, ParseError>,
) -> Result<Vec<R>, ParseError> {
    if list_offset == 0 {
        return Ok(vec![]);
    }
    let mut list = table_cursor.at(list_offset.into())?;
    let list_cursor = list;
    (0..list.read_u16()?)
        .map(|_| {
            let tag = list.read_byte_array::<4>()?;
            let offset = list.read_u16()?;
            parse_record(tag, list_cursor.at(offset.into())?)
        })
        .collect()
}

/// Parses a coverage table into the list of covered glyphs in the coverage index order.
pub(crate) fn parse_coverage(mut cursor: Cursor<'_>) -> Result<Vec<u16>, ParseError> {
    let format_cursor = cursor;
    match cursor.read_u16()? {
        1 => {
            let count = cursor.read_u16()?;
            cursor.read_u16_array(count.into())
        }
        2 => {
            let range_count = cursor.read_u16()?;
            let mut glyphs = vec![];
            for _ in 0..range_count {
                let start = cursor.read_u16()?;
                let end = cursor.read_u16()?;
                cursor.skip(2)?; // startCoverageIndex
                if start <= end {
                    glyphs.extend(start..=end);
                }
            }
            Ok(glyphs)
        }
        format => Err(format_cursor.err(ParseErrorKind::UnexpectedTableFormat(format))),
    }
}

/// Reads a 16-bit offset and parses the coverage table it points to relative to `base`.
pub(crate) fn read_coverage(
    cursor: &mut Cursor<'_>,
    base: Cursor<'_>,
) -> Result<Vec<u16>, ParseError> {
    let offset = cursor.read_u16()?;
    parse_coverage(base.at(offset.into())?)
}

/// Reads a count followed by 16-bit offsets to coverage tables relative to `base`.
pub(crate) fn read_coverages(
    cursor: &mut Cursor<'_>,
    base: Cursor<'_>,
) -> Result<Vec<Vec<u16>>, ParseError> {
    let count = cursor.read_u16()?;
    (0..count).map(|_| read_coverage(cursor, base)).collect()
}

fn read_sequence(cursor: &mut Cursor<'_>) -> Result<Vec<u16>, ParseError> {
    let count = cursor.read_u16()?;
    cursor.read_u16_array(count.into())
}

/// Class definition: glyphs assigned to non-zero classes, ordered by glyph.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ClassDef(pub(crate) Vec<(u16, u16)>);

impl ClassDef {
    pub(crate) fn parse(mut cursor: Cursor<'_>) -> Result<Self, ParseError> {
        let format_cursor = cursor;
        let mut entries = match cursor.read_u16()? {
            1 => {
                let start_glyph = cursor.read_u16()?;
                let count = cursor.read_u16()?;
                let classes = cursor.read_u16_array(count.into())?;
                (0..count)
                    .zip(classes)
                    .filter_map(|(i, class)| Some((start_glyph.checked_add(i)?, class)))
                    .collect()
            }
            2 => {
                let range_count = cursor.read_u16()?;
                let mut entries = vec![];
                for _ in 0..range_count {
                    let start = cursor.read_u16()?;
                    let end = cursor.read_u16()?;
                    let class = cursor.read_u16()?;
                    if start <= end {
                        entries.extend((start..=end).map(|glyph| (glyph, class)));
                    }
                }
                entries
            }
            format => {
                return Err(format_cursor.err(ParseErrorKind::UnexpectedTableFormat(format)));
            }
        };
        entries.retain(|&(_, class)| class != 0);
        entries.sort_unstable_by_key(|&(glyph, _)| glyph);
        entries.dedup_by_key(|(glyph, _)| *glyph);
        Ok(Self(entries))
    }

    /// Reads a nullable 16-bit offset and parses the class definition relative to `base`.
    pub(crate) fn read(cursor: &mut Cursor<'_>, base: Cursor<'_>) -> Result<Self, ParseError> {
        match cursor.read_u16()? {
            0 => Ok(Self::default()),
            offset => Self::parse(base.at(offset.into())?),
        }
    }

    pub(crate) fn class(&self, glyph: u16) -> u16 {
        self.0
            .binary_search_by_key(&glyph, |&(glyph, _)| glyph)
            .map_or(0, |idx| self.0[idx].1)
    }
}

/// Application of a lookup at a position in the input sequence of a context rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SequenceLookup {
    pub(crate) sequence_index: u16,
    pub(crate) lookup_index: u16,
}

impl SequenceLookup {
    fn read_array(cursor: &mut Cursor<'_>, count: u16) -> Result<Vec<Self>, ParseError> {
        (0..count)
            .map(|_| {
                Ok(Self {
                    sequence_index: cursor.read_u16()?,
                    lookup_index: cursor.read_u16()?,
                })
            })
            .collect()
    }
}

/// Rule of a sequence context. Depending on the subtable format, the sequences consist
/// of glyphs or glyph classes.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ContextRule {
    pub(crate) backtrack: Vec<u16>,
    /// Input sequence without the first element, which is determined by the rule set.
    pub(crate) input: Vec<u16>,
    pub(crate) lookahead: Vec<u16>,
    pub(crate) lookups: Vec<SequenceLookup>,
}

impl ContextRule {
    fn parse(mut cursor: Cursor<'_>, chained: bool) -> Result<Self, ParseError> {
        let backtrack = if chained {
            read_sequence(&mut cursor)?
        } else {
            vec![]
        };
        let input_len = cursor.read_u16_checked(|count| {
            count
                .checked_sub(1)
                .ok_or(ParseErrorKind::UnexpectedTableLen {
                    expected: 1,
                    actual: 0,
                })
        })?;

        let (input, lookahead, lookup_count) = if chained {
            let input = cursor.read_u16_array(input_len.into())?;
            let lookahead = read_sequence(&mut cursor)?;
            (input, lookahead, cursor.read_u16()?)
        } else {
            let lookup_count = cursor.read_u16()?;
            (cursor.read_u16_array(input_len.into())?, vec![], lookup_count)
        };
        Ok(Self {
            backtrack,
            input,
            lookahead,
            lookups: SequenceLookup::read_array(&mut cursor, lookup_count)?,
        })
    }

    fn parse_sets(
        base: Cursor<'_>,
        offsets: Vec<u16>,
        chained: bool,
    ) -> Result<Vec<Vec<Self>>, ParseError> {
        offsets
            .into_iter()
            .map(|offset| {
                if offset == 0 {
                    return Ok(vec![]);
                }
                let mut set = base.at(offset.into())?;
                let set_cursor = set;
                let count = set.read_u16()?;
                let rule_offsets = set.read_u16_array(count.into())?;
                rule_offsets
                    .into_iter()
                    .map(|offset| Self::parse(set_cursor.at(offset.into())?, chained))
                    .collect()
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ContextRules {
    /// Rule sets keyed by the first input glyph (format 1).
    Glyphs(Vec<(u16, Vec<ContextRule>)>),
    /// Rule sets indexed by the class of the first input glyph (format 2).
    Classes {
        coverage: Vec<u16>,
        backtrack_classes: ClassDef,
        input_classes: ClassDef,
        lookahead_classes: ClassDef,
        rule_sets: Vec<Vec<ContextRule>>,
    },
    /// Single rule with a coverage per sequence position (format 3).
    Coverages {
        backtrack: Vec<Vec<u16>>,
        input: Vec<Vec<u16>>,
        lookahead: Vec<Vec<u16>>,
        lookups: Vec<SequenceLookup>,
    },
}

/// Sequence context or chained sequence context subtable (`GSUB` types 5 and 6,
/// `GPOS` types 7 and 8).
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ContextSubtable {
    pub(crate) chained: bool,
    pub(crate) rules: ContextRules,
}

impl ContextSubtable {
    pub(crate) fn parse(chained: bool, mut cursor: Cursor<'_>) -> Result<Option<Self>, ParseError> {
        let base = cursor;
        let rules = match cursor.read_u16()? {
            1 => {
                let coverage = read_coverage(&mut cursor, base)?;
                let count = cursor.read_u16()?;
                let offsets = cursor.read_u16_array(count.into())?;
                let rule_sets = ContextRule::parse_sets(base, offsets, chained)?;
                ContextRules::Glyphs(coverage.into_iter().zip(rule_sets).collect())
            }
            2 => {
                let coverage = read_coverage(&mut cursor, base)?;
                let (backtrack_classes, input_classes, lookahead_classes) = if chained {
                    (
                        ClassDef::read(&mut cursor, base)?,
                        ClassDef::read(&mut cursor, base)?,
                        ClassDef::read(&mut cursor, base)?,
                    )
                } else {
                    let input_classes = ClassDef::read(&mut cursor, base)?;
                    (ClassDef::default(), input_classes, ClassDef::default())
                };
                let count = cursor.read_u16()?;
                let offsets = cursor.read_u16_array(count.into())?;
                ContextRules::Classes {
                    coverage,
                    backtrack_classes,
                    input_classes,
                    lookahead_classes,
                    rule_sets: ContextRule::parse_sets(base, offsets, chained)?,
                }
            }
            3 if chained => {
                let backtrack = read_coverages(&mut cursor, base)?;
                let input = read_coverages(&mut cursor, base)?;
                let lookahead = read_coverages(&mut cursor, base)?;
                let lookup_count = cursor.read_u16()?;
                ContextRules::Coverages {
                    backtrack,
                    input,
                    lookahead,
                    lookups: SequenceLookup::read_array(&mut cursor, lookup_count)?,
                }
            }
            3 => {
                let glyph_count = cursor.read_u16()?;
                let lookup_count = cursor.read_u16()?;
                let input = (0..glyph_count)
                    .map(|_| read_coverage(&mut cursor, base))
                    .collect::<Result<_, _>>()?;
                ContextRules::Coverages {
                    backtrack: vec![],
                    input,
                    lookahead: vec![],
                    lookups: SequenceLookup::read_array(&mut cursor, lookup_count)?,
                }
            }
            format => {
                log::debug!("skipping sequence context subtable with format {format}");
                return Ok(None);
            }
        };
        Ok(Some(Self { chained, rules }))
    }
}
