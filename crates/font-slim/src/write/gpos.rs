//! Subsetting and serialization of `GPOS` subtables.

use super::{
    layout::{subset_coverage, write_coverage, SubsetSubtable, TableWriter},
    write_u16,
};
use crate::{
    font::{
        Anchor, ClassPairs, ContextSubtable, MarkAttachment, MarkRecord, MarkToLigature,
        PairValue, PosSubtable, ValueRecord,
    },
    GlyphRenumbering,
};

impl ValueRecord {
    fn write(self, writer: &mut TableWriter, format: u16) {
        for (bit, value) in self.0.into_iter().enumerate() {
            if format & (1 << bit) != 0 {
                writer.i16(value);
            }
        }
    }
}

impl Anchor {
    fn write(self) -> Vec<u8> {
        let mut buffer = vec![];
        write_u16(&mut buffer, if self.point.is_some() { 2 } else { 1 });
        buffer.extend_from_slice(&self.x.to_be_bytes());
        buffer.extend_from_slice(&self.y.to_be_bytes());
        if let Some(point) = self.point {
            write_u16(&mut buffer, point);
        }
        buffer
    }
}

fn write_anchor_array(records: &[Vec<Option<Anchor>>]) -> Option<Vec<u8>> {
    let mut writer = TableWriter::default();
    writer.count(records.len())?;
    for anchor in records.iter().flatten() {
        writer.nullable_offset16(anchor.map(Anchor::write));
    }
    writer.finish()
}

fn write_mark_array(marks: &[(u16, MarkRecord)]) -> Option<Vec<u8>> {
    let mut writer = TableWriter::default();
    writer.count(marks.len())?;
    for (_, mark) in marks {
        writer.u16(mark.class).offset16(mark.anchor.write());
    }
    writer.finish()
}

/// Retains records for retained glyphs in the glyph order. Returns `None` if no records remain.
fn subset_records<T: Clone>(
    records: &[(u16, T)],
    renumbering: &GlyphRenumbering,
) -> Option<Vec<(u16, T)>> {
    let mut records: Vec<_> = records
        .iter()
        .filter_map(|(glyph, record)| Some((renumbering.get(*glyph)?, record.clone())))
        .collect();
    records.sort_unstable_by_key(|(glyph, _)| *glyph);
    (!records.is_empty()).then_some(records)
}

fn glyphs<T>(records: &[(u16, T)]) -> Vec<u16> {
    records.iter().map(|(glyph, _)| *glyph).collect()
}

impl SubsetSubtable for PosSubtable {
    fn subset(&self, renumbering: &GlyphRenumbering) -> Option<Self> {
        Some(match self {
            Self::Single {
                value_format,
                values,
            } => Self::Single {
                value_format: *value_format,
                values: subset_records(values, renumbering)?,
            },
            Self::Pairs {
                value_formats,
                sets,
            } => {
                let mut sets: Vec<_> = sets
                    .iter()
                    .filter_map(|(first, pairs)| {
                        let first = renumbering.get(*first)?;
                        let mut pairs: Vec<_> = pairs
                            .iter()
                            .filter_map(|pair| {
                                Some(PairValue {
                                    second: renumbering.get(pair.second)?,
                                    values: pair.values,
                                })
                            })
                            .collect();
                        pairs.sort_unstable_by_key(|pair| pair.second);
                        (!pairs.is_empty()).then_some((first, pairs))
                    })
                    .collect();
                if sets.is_empty() {
                    return None;
                }
                sets.sort_unstable_by_key(|(first, _)| *first);
                Self::Pairs {
                    value_formats: *value_formats,
                    sets,
                }
            }
            Self::ClassPairs(pairs) => {
                let coverage = subset_coverage(&pairs.coverage, renumbering);
                if coverage.is_empty() {
                    return None;
                }
                Self::ClassPairs(ClassPairs {
                    value_formats: pairs.value_formats,
                    coverage,
                    first_classes: pairs.first_classes.subset(renumbering),
                    second_classes: pairs.second_classes.subset(renumbering),
                    values: pairs.values.clone(),
                })
            }
            Self::Cursive(anchors) => Self::Cursive(subset_records(anchors, renumbering)?),
            Self::MarkAttachment(attachment) => Self::MarkAttachment(MarkAttachment {
                class_count: attachment.class_count,
                marks: subset_records(&attachment.marks, renumbering)?,
                bases: subset_records(&attachment.bases, renumbering)?,
            }),
            Self::MarkToLigature(attachment) => Self::MarkToLigature(MarkToLigature {
                class_count: attachment.class_count,
                marks: subset_records(&attachment.marks, renumbering)?,
                ligatures: subset_records(&attachment.ligatures, renumbering)?,
            }),
            Self::Context(context) => Self::Context(context.subset(renumbering)?),
        })
    }

    fn context_mut(&mut self) -> Option<&mut ContextSubtable> {
        match self {
            Self::Context(context) => Some(context),
            _ => None,
        }
    }

    fn write(&self) -> Option<Vec<u8>> {
        let mut writer = TableWriter::default();
        match self {
            Self::Single {
                value_format,
                values,
            } => {
                let coverage = write_coverage(&glyphs(values))?;
                let shared_value = match values.as_slice() {
                    [(_, first), rest @ ..] if rest.iter().all(|(_, value)| value == first) => {
                        Some(*first)
                    }
                    _ => None,
                };
                if let Some(value) = shared_value {
                    writer.u16(1).offset16(coverage).u16(*value_format);
                    value.write(&mut writer, *value_format);
                } else {
                    writer.u16(2).offset16(coverage).u16(*value_format);
                    writer.count(values.len())?;
                    for (_, value) in values {
                        value.write(&mut writer, *value_format);
                    }
                }
            }
            Self::Pairs {
                value_formats,
                sets,
            } => {
                let [first_format, second_format] = *value_formats;
                writer.u16(1).offset16(write_coverage(&glyphs(sets))?);
                writer.u16(first_format).u16(second_format);
                writer.count(sets.len())?;
                for (_, pairs) in sets {
                    let mut set = TableWriter::default();
                    set.count(pairs.len())?;
                    for pair in pairs {
                        set.u16(pair.second);
                        pair.values[0].write(&mut set, first_format);
                        pair.values[1].write(&mut set, second_format);
                    }
                    writer.offset16(set.finish()?);
                }
            }
            Self::ClassPairs(pairs) => {
                let [first_format, second_format] = pairs.value_formats;
                writer.u16(2).offset16(write_coverage(&pairs.coverage)?);
                writer.u16(first_format).u16(second_format);
                writer.offset16(pairs.first_classes.write()?);
                writer.offset16(pairs.second_classes.write()?);
                let second_count = pairs.values.first().map_or(0, Vec::len);
                writer.count(pairs.values.len())?.count(second_count)?;
                for [first, second] in pairs.values.iter().flatten() {
                    first.write(&mut writer, first_format);
                    second.write(&mut writer, second_format);
                }
            }
            Self::Cursive(anchors) => {
                writer.u16(1).offset16(write_coverage(&glyphs(anchors))?);
                writer.count(anchors.len())?;
                for (_, [entry, exit]) in anchors {
                    writer.nullable_offset16(entry.map(Anchor::write));
                    writer.nullable_offset16(exit.map(Anchor::write));
                }
            }
            Self::MarkAttachment(attachment) => {
                let bases: Vec<_> = attachment
                    .bases
                    .iter()
                    .map(|(_, anchors)| anchors.clone())
                    .collect();
                writer
                    .u16(1)
                    .offset16(write_coverage(&glyphs(&attachment.marks))?)
                    .offset16(write_coverage(&glyphs(&attachment.bases))?)
                    .u16(attachment.class_count)
                    .offset16(write_mark_array(&attachment.marks)?)
                    .offset16(write_anchor_array(&bases)?);
            }
            Self::MarkToLigature(attachment) => {
                let mut ligatures = TableWriter::default();
                ligatures.count(attachment.ligatures.len())?;
                for (_, components) in &attachment.ligatures {
                    ligatures.offset16(write_anchor_array(components)?);
                }
                writer
                    .u16(1)
                    .offset16(write_coverage(&glyphs(&attachment.marks))?)
                    .offset16(write_coverage(&glyphs(&attachment.ligatures))?)
                    .u16(attachment.class_count)
                    .offset16(write_mark_array(&attachment.marks)?)
                    .offset16(ligatures.finish()?);
            }
            Self::Context(context) => return context.write(),
        }
        writer.finish()
    }
}
