//! Subsetting and serialization of `GSUB` subtables.

use super::layout::{subset_coverage, write_coverage, SubsetSubtable, TableWriter};
use crate::{
    font::{ContextSubtable, LigatureRule, SubstSubtable},
    GlyphRenumbering,
};

impl SubstSubtable {
    fn is_empty(&self) -> bool {
        match self {
            Self::Single(pairs) | Self::ReverseChainSingle { substitutions: pairs, .. } => {
                pairs.is_empty()
            }
            Self::Multiple(sequences) | Self::Alternate(sequences) => sequences.is_empty(),
            Self::Ligature(sets) => sets.is_empty(),
            Self::Context(_) => false,
        }
    }

    /// Writes a format 1 subtable with a coverage and offsets to per-glyph `children`.
    fn write_with_children(coverage: &[u16], children: Vec<Vec<u8>>) -> Option<Vec<u8>> {
        let mut writer = TableWriter::default();
        writer
            .u16(1)
            .offset16(write_coverage(coverage)?)
            .count(children.len())?;
        for child in children {
            writer.offset16(child);
        }
        writer.finish()
    }

    fn write_glyph_array(glyphs: &[u16]) -> Option<Vec<u8>> {
        let mut writer = TableWriter::default();
        writer.count(glyphs.len())?.glyphs(glyphs);
        writer.finish()
    }

    fn write_ligature_set(rules: &[LigatureRule]) -> Option<Vec<u8>> {
        let mut writer = TableWriter::default();
        writer.count(rules.len())?;
        for rule in rules {
            let mut ligature = TableWriter::default();
            ligature
                .u16(rule.ligature)
                .count(rule.components.len() + 1)?
                .glyphs(&rule.components);
            writer.offset16(ligature.finish()?);
        }
        writer.finish()
    }
}

impl SubsetSubtable for SubstSubtable {
    fn subset(&self, renumbering: &GlyphRenumbering) -> Option<Self> {
        let remap_all = |glyphs: &[u16]| -> Option<Vec<u16>> {
            glyphs.iter().map(|&glyph| renumbering.get(glyph)).collect()
        };
        let remap_pairs = |pairs: &[(u16, u16)]| -> Vec<(u16, u16)> {
            pairs
                .iter()
                .filter_map(|&(input, output)| {
                    Some((renumbering.get(input)?, renumbering.get(output)?))
                })
                .collect()
        };

        let subset = match self {
            Self::Single(pairs) => Self::Single(remap_pairs(pairs)),
            Self::Multiple(sequences) => {
                let sequences = sequences.iter().filter_map(|(input, outputs)| {
                    Some((renumbering.get(*input)?, remap_all(outputs)?))
                });
                Self::Multiple(sequences.collect())
            }
            Self::Alternate(sets) => {
                let sets = sets.iter().filter_map(|(input, alternates)| {
                    let input = renumbering.get(*input)?;
                    let alternates = subset_coverage(alternates, renumbering);
                    (!alternates.is_empty()).then_some((input, alternates))
                });
                Self::Alternate(sets.collect())
            }
            Self::Ligature(sets) => {
                let sets = sets.iter().filter_map(|(first, rules)| {
                    let first = renumbering.get(*first)?;
                    let rules: Vec<_> = rules
                        .iter()
                        .filter_map(|rule| {
                            Some(LigatureRule {
                                components: remap_all(&rule.components)?,
                                ligature: renumbering.get(rule.ligature)?,
                            })
                        })
                        .collect();
                    (!rules.is_empty()).then_some((first, rules))
                });
                Self::Ligature(sets.collect())
            }
            Self::Context(context) => Self::Context(context.subset(renumbering)?),
            Self::ReverseChainSingle {
                backtrack,
                lookahead,
                substitutions,
            } => {
                let subset_all = |coverages: &[Vec<u16>]| -> Option<Vec<Vec<u16>>> {
                    coverages
                        .iter()
                        .map(|glyphs| {
                            let glyphs = subset_coverage(glyphs, renumbering);
                            (!glyphs.is_empty()).then_some(glyphs)
                        })
                        .collect()
                };
                Self::ReverseChainSingle {
                    backtrack: subset_all(backtrack)?,
                    lookahead: subset_all(lookahead)?,
                    substitutions: remap_pairs(substitutions),
                }
            }
        };
        (!subset.is_empty()).then_some(subset)
    }

    fn context_mut(&mut self) -> Option<&mut ContextSubtable> {
        match self {
            Self::Context(context) => Some(context),
            _ => None,
        }
    }

    fn write(&self) -> Option<Vec<u8>> {
        match self {
            Self::Single(pairs) => {
                let mut pairs = pairs.clone();
                pairs.sort_unstable();
                let coverage: Vec<_> = pairs.iter().map(|&(input, _)| input).collect();

                let mut writer = TableWriter::default();
                writer.u16(2).offset16(write_coverage(&coverage)?);
                writer.count(pairs.len())?;
                for (_, output) in pairs {
                    writer.u16(output);
                }
                writer.finish()
            }
            Self::Multiple(sequences) | Self::Alternate(sequences) => {
                let mut sequences = sequences.clone();
                sequences.sort_unstable_by_key(|(input, _)| *input);
                let coverage: Vec<_> = sequences.iter().map(|(input, _)| *input).collect();
                let children = sequences
                    .iter()
                    .map(|(_, glyphs)| Self::write_glyph_array(glyphs))
                    .collect::<Option<_>>()?;
                Self::write_with_children(&coverage, children)
            }
            Self::Ligature(sets) => {
                let mut sets = sets.clone();
                sets.sort_unstable_by_key(|(first, _)| *first);
                let coverage: Vec<_> = sets.iter().map(|(first, _)| *first).collect();
                let children = sets
                    .iter()
                    .map(|(_, rules)| Self::write_ligature_set(rules))
                    .collect::<Option<_>>()?;
                Self::write_with_children(&coverage, children)
            }
            Self::Context(context) => context.write(),
            Self::ReverseChainSingle {
                backtrack,
                lookahead,
                substitutions,
            } => {
                let mut substitutions = substitutions.clone();
                substitutions.sort_unstable();
                let coverage: Vec<_> = substitutions.iter().map(|&(input, _)| input).collect();

                let mut writer = TableWriter::default();
                writer.u16(1).offset16(write_coverage(&coverage)?);
                writer.count(backtrack.len())?;
                for glyphs in backtrack {
                    writer.offset16(write_coverage(glyphs)?);
                }
                writer.count(lookahead.len())?;
                for glyphs in lookahead {
                    writer.offset16(write_coverage(glyphs)?);
                }
                writer.count(substitutions.len())?;
                for (_, output) in substitutions {
                    writer.u16(output);
                }
                writer.finish()
            }
        }
    }
}
