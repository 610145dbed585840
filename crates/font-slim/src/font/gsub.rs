//! `GSUB` lookup subtables.
//!
//! Substitutions that produce glyphs (single, multiple, alternate, ligature and reverse chaining
//! single ones) are decoded together with sequence contexts; the latter only invoke other lookups.

use super::{
    layout::{read_coverage, read_coverages, ContextSubtable, LayoutTable, LookupSubtable},
    Cursor,
};
use crate::{errors::ParseErrorKind, ParseError, TableTag};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LigatureRule {
    /// Components after the first one.
    pub(crate) components: Vec<u16>,
    pub(crate) ligature: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SubstSubtable {
    /// Input glyph → substitute, ordered by the input glyph.
    Single(Vec<(u16, u16)>),
    /// Input glyph → sequence of substitutes.
    Multiple(Vec<(u16, Vec<u16>)>),
    /// Input glyph → alternates.
    Alternate(Vec<(u16, Vec<u16>)>),
    /// First glyph → ligatures starting with it, in the priority order.
    Ligature(Vec<(u16, Vec<LigatureRule>)>),
    Context(ContextSubtable),
    /// Single substitution applied in reverse order when surrounded by the specified glyphs.
    ReverseChainSingle {
        backtrack: Vec<Vec<u16>>,
        lookahead: Vec<Vec<u16>>,
        substitutions: Vec<(u16, u16)>,
    },
}

impl LookupSubtable for SubstSubtable {
    const TABLE: TableTag = TableTag::GSUB;
    const EXTENSION: u16 = 7;

    fn parse(lookup_type: u16, mut cursor: Cursor<'_>) -> Result<Option<Self>, ParseError> {
        let base = cursor;
        match lookup_type {
            Self::CONTEXT | Self::CHAINED_CONTEXT => {
                let chained = lookup_type == Self::CHAINED_CONTEXT;
                return Ok(ContextSubtable::parse(chained, cursor)?.map(Self::Context));
            }
            Self::SINGLE..=Self::LIGATURE | Self::REVERSE_CHAIN_SINGLE => { /* parsed below */ }
            _ => {
                log::debug!("skipping GSUB subtable with unsupported type {lookup_type}");
                return Ok(None);
            }
        }

        let format = cursor.read_u16()?;
        let is_supported = matches!(
            (lookup_type, format),
            (Self::SINGLE, 1 | 2)
                | (Self::MULTIPLE..=Self::LIGATURE | Self::REVERSE_CHAIN_SINGLE, 1)
        );
        if !is_supported {
            log::debug!("skipping unsupported GSUB subtable (type {lookup_type}, format {format})");
            return Ok(None);
        }
        let coverage = read_coverage(&mut cursor, base)?;

        Ok(Some(match (lookup_type, format) {
            (Self::SINGLE, 1) => {
                let delta = cursor.read_u16()?;
                let pairs = coverage
                    .into_iter()
                    .map(|glyph| (glyph, glyph.wrapping_add(delta)));
                Self::Single(pairs.collect())
            }
            (Self::SINGLE, 2) => {
                let count = cursor.read_u16()?;
                let substitutes = cursor.read_u16_array(count.into())?;
                Self::Single(coverage.into_iter().zip(substitutes).collect())
            }
            (Self::MULTIPLE | Self::ALTERNATE, _) => {
                let count = cursor.read_u16()?;
                let offsets = cursor.read_u16_array(count.into())?;
                let sequences = coverage.into_iter().zip(offsets).map(|(glyph, offset)| {
                    let mut sequence = base.at(offset.into())?;
                    let len = sequence.read_u16()?;
                    Ok((glyph, sequence.read_u16_array(len.into())?))
                });
                let sequences = sequences.collect::<Result<_, ParseError>>()?;
                if lookup_type == Self::MULTIPLE {
                    Self::Multiple(sequences)
                } else {
                    Self::Alternate(sequences)
                }
            }
            (Self::LIGATURE, _) => {
                let count = cursor.read_u16()?;
                let offsets = cursor.read_u16_array(count.into())?;
                let sets = coverage.into_iter().zip(offsets).map(|(glyph, offset)| {
                    let set_cursor = base.at(offset.into())?;
                    Ok((glyph, Self::parse_ligature_set(set_cursor)?))
                });
                Self::Ligature(sets.collect::<Result<_, ParseError>>()?)
            }
            (Self::REVERSE_CHAIN_SINGLE, _) => {
                let backtrack = read_coverages(&mut cursor, base)?;
                let lookahead = read_coverages(&mut cursor, base)?;
                let count = cursor.read_u16()?;
                let substitutes = cursor.read_u16_array(count.into())?;
                Self::ReverseChainSingle {
                    backtrack,
                    lookahead,
                    substitutions: coverage.into_iter().zip(substitutes).collect(),
                }
            }
            _ => unreachable!("checked above"),
        }))
    }
}

impl SubstSubtable {
    pub(crate) const SINGLE: u16 = 1;
    pub(crate) const MULTIPLE: u16 = 2;
    pub(crate) const ALTERNATE: u16 = 3;
    pub(crate) const LIGATURE: u16 = 4;
    pub(crate) const CONTEXT: u16 = 5;
    pub(crate) const CHAINED_CONTEXT: u16 = 6;
    pub(crate) const REVERSE_CHAIN_SINGLE: u16 = 8;

    fn parse_ligature_set(mut cursor: Cursor<'_>) -> Result<Vec<LigatureRule>, ParseError> {
        let set_cursor = cursor;
        let count = cursor.read_u16()?;
        let offsets = cursor.read_u16_array(count.into())?;
        offsets
            .into_iter()
            .map(|offset| {
                let mut ligature = set_cursor.at(offset.into())?;
                let glyph = ligature.read_u16()?;
                let component_count = ligature.read_u16_checked(|count| {
                    count
                        .checked_sub(1)
                        .ok_or(ParseErrorKind::UnexpectedTableLen {
                            expected: 1,
                            actual: 0,
                        })
                })?;
                Ok(LigatureRule {
                    components: ligature.read_u16_array(component_count.into())?,
                    ligature: glyph,
                })
            })
            .collect()
    }

    fn rules(&self) -> Box<dyn Iterator<Item = SubstitutionRule<'_>> + '_> {
        match self {
            Self::Single(pairs) | Self::ReverseChainSingle { substitutions: pairs, .. } => {
                Box::new(pairs.iter().map(|(input, output)| SubstitutionRule {
                    first: *input,
                    rest: &[],
                    outputs: core::slice::from_ref(output),
                }))
            }
            Self::Multiple(sequences) | Self::Alternate(sequences) => {
                Box::new(sequences.iter().map(|(input, outputs)| SubstitutionRule {
                    first: *input,
                    rest: &[],
                    outputs,
                }))
            }
            Self::Ligature(sets) => Box::new(sets.iter().flat_map(|(first, rules)| {
                rules.iter().map(|rule| SubstitutionRule {
                    first: *first,
                    rest: &rule.components,
                    outputs: core::slice::from_ref(&rule.ligature),
                })
            })),
            // Contexts only invoke other lookups, whose rules are enumerated separately.
            Self::Context(_) => Box::new(core::iter::empty()),
        }
    }
}

/// Substitution ignoring its context: if `first` and all glyphs in `rest` are present,
/// any of `outputs` may be produced.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SubstitutionRule<'a> {
    pub(crate) first: u16,
    pub(crate) rest: &'a [u16],
    pub(crate) outputs: &'a [u16],
}

impl SubstitutionRule<'_> {
    pub(crate) fn inputs(&self) -> impl Iterator<Item = u16> + '_ {
        core::iter::once(self.first).chain(self.rest.iter().copied())
    }
}

/// Parsed `GSUB` table.
pub(crate) type GsubTable = LayoutTable<SubstSubtable>;

impl GsubTable {
    /// Iterates over all substitution rules in the table.
    pub(crate) fn rules(&self) -> impl Iterator<Item = SubstitutionRule<'_>> + '_ {
        self.lookups
            .iter()
            .flat_map(|lookup| &lookup.subtables)
            .flat_map(SubstSubtable::rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        font::{ContextRules, SequenceLookup},
        tests::TestFont,
        FontContainer,
    };

    fn test_gsub() -> GsubTable {
        let container = FontContainer::parse(&TestFont::Full.bytes()).unwrap();
        let raw = container.table(TableTag::GSUB).unwrap();
        GsubTable::parse(Cursor::for_table(raw, TableTag::GSUB)).unwrap()
    }

    #[test]
    fn parsing_test_gsub() {
        let gsub = test_gsub();

        let script_tags: Vec<_> = gsub.scripts.iter().map(|script| &script.tag).collect();
        assert_eq!(script_tags, [b"DFLT", b"latn"]);
        let default_lang_sys = gsub.scripts[0].default_lang_sys.as_ref().unwrap();
        assert_eq!(default_lang_sys.required_feature_index, 0xffff);
        assert_eq!(default_lang_sys.feature_indices, [0, 1]);
        assert_eq!(gsub.scripts[1].lang_systems.len(), 1);
        assert_eq!(&gsub.scripts[1].lang_systems[0].0, b"TRK ");

        let feature_tags: Vec<_> = gsub.features.iter().map(|feature| &feature.tag).collect();
        assert_eq!(feature_tags, [b"liga", b"smcp"]);
        assert_eq!(gsub.features[1].lookup_indices, [1, 2]);

        assert_eq!(gsub.lookups.len(), 3);
        assert_eq!(gsub.lookups[0].lookup_type, SubstSubtable::LIGATURE);
        assert_eq!(
            gsub.lookups[0].subtables,
            [SubstSubtable::Ligature(vec![(
                4,
                vec![LigatureRule {
                    components: vec![6],
                    ligature: 7,
                }]
            )])]
        );
        // Extension lookup is resolved to the wrapped type.
        assert_eq!(gsub.lookups[1].lookup_type, SubstSubtable::SINGLE);
        assert_eq!(
            gsub.lookups[1].subtables,
            [SubstSubtable::Single(vec![(2, 3)])]
        );

        assert_eq!(gsub.lookups[2].lookup_type, SubstSubtable::CHAINED_CONTEXT);
        assert_eq!(gsub.lookups[2].skipped_subtables, 0);
        let [SubstSubtable::Context(context)] = gsub.lookups[2].subtables.as_slice() else {
            panic!("unexpected subtables: {:?}", gsub.lookups[2].subtables);
        };
        assert!(context.chained);
        assert_eq!(
            context.rules,
            ContextRules::Coverages {
                backtrack: vec![vec![1]],
                input: vec![vec![2]],
                lookahead: vec![],
                lookups: vec![SequenceLookup {
                    sequence_index: 0,
                    lookup_index: 1,
                }],
            }
        );
    }

    #[test]
    fn iterating_rules() {
        let gsub = test_gsub();
        let rules: Vec<_> = gsub
            .rules()
            .map(|rule| (rule.inputs().collect::<Vec<_>>(), rule.outputs.to_vec()))
            .collect();
        assert_eq!(rules, [(vec![4, 6], vec![7]), (vec![2], vec![3])]);
    }

    #[test]
    fn single_substitution_with_delta() {
        // format 1, coverage at 6, delta -1; coverage format 1 with glyphs [3, 4]
        let raw = [0, 1, 0, 6, 0xff, 0xff, 0, 1, 0, 2, 0, 3, 0, 4];
        let subtable = SubstSubtable::parse(1, Cursor::new(&raw)).unwrap();
        assert_eq!(subtable, Some(SubstSubtable::Single(vec![(3, 2), (4, 3)])));
    }

    #[test]
    fn reverse_chain_substitution() {
        #[rustfmt::skip]
        let raw: [u16; 15] = [
            1, 16, // format, coverage offset
            1, 24, // backtrack coverages
            0, // lookahead coverages
            2, 8, 9, // substitutes
            1, 2, 3, 4, // coverage: glyphs [3, 4]
            1, 1, 5, // backtrack coverage: glyph 5
        ];
        let bytes: Vec<u8> = raw.iter().flat_map(|word| word.to_be_bytes()).collect();

        let subtable = SubstSubtable::parse(8, Cursor::new(&bytes)).unwrap().unwrap();
        assert_eq!(
            subtable,
            SubstSubtable::ReverseChainSingle {
                backtrack: vec![vec![5]],
                lookahead: vec![],
                substitutions: vec![(3, 8), (4, 9)],
            }
        );
        let rules: Vec<_> = subtable.rules().map(|rule| (rule.first, rule.outputs[0])).collect();
        assert_eq!(rules, [(3, 8), (4, 9)]);
    }

    #[test]
    fn unsupported_lookup_type_is_skipped() {
        // Type 9 doesn't exist in GSUB
        assert_eq!(SubstSubtable::parse(9, Cursor::new(&[0, 1])).unwrap(), None);
        // Single substitution format 3
        assert_eq!(SubstSubtable::parse(1, Cursor::new(&[0, 3])).unwrap(), None);
    }
}
