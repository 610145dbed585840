//! Subsetting and serialization of OpenType layout tables (`GSUB` and `GPOS`).
//!
//! Lookups that become empty after subsetting are removed together with references to them
//! from features and sequence contexts; features without lookups are removed as well.

use super::{write_u16, write_u32};
use crate::{
    font::{
        ClassDef, ContextRule, ContextRules, ContextSubtable, Feature, LangSys, LayoutTable,
        Lookup, LookupSubtable, Script, SequenceLookup,
    },
    GlyphRenumbering,
};

/// Writer for a table with 16- or 32-bit offsets to child tables. Children are laid out after
/// the header in the order their offsets were written.
#[derive(Debug, Default)]
pub(crate) struct TableWriter {
    header: Vec<u8>,
    /// Position of the offset in the header, whether the offset is 32-bit, and child data.
    children: Vec<(usize, bool, Vec<u8>)>,
}

impl TableWriter {
    pub(crate) fn u16(&mut self, value: u16) -> &mut Self {
        write_u16(&mut self.header, value);
        self
    }

    pub(crate) fn i16(&mut self, value: i16) -> &mut Self {
        self.header.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub(crate) fn u32(&mut self, value: u32) -> &mut Self {
        write_u32(&mut self.header, value);
        self
    }

    pub(crate) fn tag(&mut self, tag: [u8; 4]) -> &mut Self {
        self.header.extend_from_slice(&tag);
        self
    }

    /// Writes a 16-bit count. Returns `None` if it overflows.
    pub(crate) fn count(&mut self, count: usize) -> Option<&mut Self> {
        Some(self.u16(u16::try_from(count).ok()?))
    }

    pub(crate) fn glyphs(&mut self, glyphs: &[u16]) -> &mut Self {
        for &glyph in glyphs {
            self.u16(glyph);
        }
        self
    }

    pub(crate) fn offset16(&mut self, child: Vec<u8>) -> &mut Self {
        self.children.push((self.header.len(), false, child));
        self.u16(0)
    }

    /// Writes a 16-bit offset, or 0 (`NULL`) if the child is absent.
    pub(crate) fn nullable_offset16(&mut self, child: Option<Vec<u8>>) -> &mut Self {
        match child {
            Some(child) => self.offset16(child),
            None => self.u16(0),
        }
    }

    pub(crate) fn offset32(&mut self, child: Vec<u8>) -> &mut Self {
        self.children.push((self.header.len(), true, child));
        self.u32(0)
    }

    /// Returns `None` if an offset overflows.
    pub(crate) fn finish(self) -> Option<Vec<u8>> {
        let Self {
            mut header,
            children,
        } = self;
        let mut offset = header.len();
        for (pos, is_long, child) in &children {
            if *is_long {
                let value = u32::try_from(offset).ok()?;
                header[*pos..*pos + 4].copy_from_slice(&value.to_be_bytes());
            } else {
                let value = u16::try_from(offset).ok()?;
                header[*pos..*pos + 2].copy_from_slice(&value.to_be_bytes());
            }
            offset += child.len();
        }
        for (_, _, child) in children {
            header.extend_from_slice(&child);
        }
        Some(header)
    }
}

/// Retains and renumbers covered glyphs.
pub(crate) fn subset_coverage(glyphs: &[u16], renumbering: &GlyphRenumbering) -> Vec<u16> {
    glyphs
        .iter()
        .filter_map(|&glyph| renumbering.get(glyph))
        .collect()
}

/// Writes a coverage table for glyphs in the increasing order, choosing the more compact format.
pub(crate) fn write_coverage(glyphs: &[u16]) -> Option<Vec<u8>> {
    let mut ranges: Vec<(u16, u16)> = vec![];
    for &glyph in glyphs {
        match ranges.last_mut() {
            Some((_, end)) if end.checked_add(1) == Some(glyph) => *end = glyph,
            _ => ranges.push((glyph, glyph)),
        }
    }

    let mut writer = TableWriter::default();
    if 3 * ranges.len() < glyphs.len() {
        writer.u16(2).count(ranges.len())?;
        let mut start_index = 0_usize;
        for (start, end) in ranges {
            writer.u16(start).u16(end).count(start_index)?;
            start_index += usize::from(end - start) + 1;
        }
    } else {
        writer.u16(1).count(glyphs.len())?.glyphs(glyphs);
    }
    writer.finish()
}

fn write_coverages(writer: &mut TableWriter, coverages: &[Vec<u16>]) -> Option<()> {
    for glyphs in coverages {
        writer.offset16(write_coverage(glyphs)?);
    }
    Some(())
}

impl ClassDef {
    pub(crate) fn subset(&self, renumbering: &GlyphRenumbering) -> Self {
        let entries = self
            .0
            .iter()
            .filter_map(|&(glyph, class)| Some((renumbering.get(glyph)?, class)));
        Self(entries.collect())
    }

    /// Writes the class definition in format 2 (class ranges).
    pub(crate) fn write(&self) -> Option<Vec<u8>> {
        let mut ranges: Vec<(u16, u16, u16)> = vec![];
        for &(glyph, class) in &self.0 {
            match ranges.last_mut() {
                Some((_, end, range_class))
                    if *range_class == class && end.checked_add(1) == Some(glyph) =>
                {
                    *end = glyph;
                }
                _ => ranges.push((glyph, glyph, class)),
            }
        }

        let mut writer = TableWriter::default();
        writer.u16(2).count(ranges.len())?;
        for (start, end, class) in ranges {
            writer.u16(start).u16(end).u16(class);
        }
        writer.finish()
    }
}

impl SequenceLookup {
    fn write_all(writer: &mut TableWriter, lookups: &[Self]) {
        for lookup in lookups {
            writer.u16(lookup.sequence_index).u16(lookup.lookup_index);
        }
    }
}

impl ContextRule {
    fn subset(&self, renumbering: &GlyphRenumbering) -> Option<Self> {
        let remap_all = |glyphs: &[u16]| -> Option<Vec<u16>> {
            glyphs.iter().map(|&glyph| renumbering.get(glyph)).collect()
        };
        Some(Self {
            backtrack: remap_all(&self.backtrack)?,
            input: remap_all(&self.input)?,
            lookahead: remap_all(&self.lookahead)?,
            lookups: self.lookups.clone(),
        })
    }

    fn write(&self, chained: bool) -> Option<Vec<u8>> {
        let mut writer = TableWriter::default();
        if chained {
            writer.count(self.backtrack.len())?.glyphs(&self.backtrack);
            writer.count(self.input.len() + 1)?.glyphs(&self.input);
            writer.count(self.lookahead.len())?.glyphs(&self.lookahead);
            writer.count(self.lookups.len())?;
        } else {
            writer.count(self.input.len() + 1)?.count(self.lookups.len())?;
            writer.glyphs(&self.input);
        }
        SequenceLookup::write_all(&mut writer, &self.lookups);
        writer.finish()
    }

    /// Writes a rule set. Empty sets are represented with a `NULL` offset.
    fn write_set(rules: &[Self], chained: bool) -> Option<Option<Vec<u8>>> {
        if rules.is_empty() {
            return Some(None);
        }
        let mut writer = TableWriter::default();
        writer.count(rules.len())?;
        for rule in rules {
            writer.offset16(rule.write(chained)?);
        }
        writer.finish().map(Some)
    }
}

impl ContextSubtable {
    /// Retains rules referencing only retained glyphs. Returns `None` if no rules remain.
    pub(crate) fn subset(&self, renumbering: &GlyphRenumbering) -> Option<Self> {
        let rules = match &self.rules {
            ContextRules::Glyphs(sets) => {
                let sets: Vec<_> = sets
                    .iter()
                    .filter_map(|(first, rules)| {
                        let first = renumbering.get(*first)?;
                        let rules: Vec<_> = rules
                            .iter()
                            .filter_map(|rule| rule.subset(renumbering))
                            .collect();
                        (!rules.is_empty()).then_some((first, rules))
                    })
                    .collect();
                if sets.is_empty() {
                    return None;
                }
                ContextRules::Glyphs(sets)
            }
            ContextRules::Classes {
                coverage,
                backtrack_classes,
                input_classes,
                lookahead_classes,
                rule_sets,
            } => {
                let coverage = subset_coverage(coverage, renumbering);
                if coverage.is_empty() {
                    return None;
                }
                ContextRules::Classes {
                    coverage,
                    backtrack_classes: backtrack_classes.subset(renumbering),
                    input_classes: input_classes.subset(renumbering),
                    lookahead_classes: lookahead_classes.subset(renumbering),
                    rule_sets: rule_sets.clone(),
                }
            }
            ContextRules::Coverages {
                backtrack,
                input,
                lookahead,
                lookups,
            } => {
                // Each sequence position must match at least one retained glyph.
                let subset_all = |coverages: &[Vec<u16>]| -> Option<Vec<Vec<u16>>> {
                    coverages
                        .iter()
                        .map(|glyphs| {
                            let glyphs = subset_coverage(glyphs, renumbering);
                            (!glyphs.is_empty()).then_some(glyphs)
                        })
                        .collect()
                };
                ContextRules::Coverages {
                    backtrack: subset_all(backtrack)?,
                    input: subset_all(input)?,
                    lookahead: subset_all(lookahead)?,
                    lookups: lookups.clone(),
                }
            }
        };
        Some(Self {
            chained: self.chained,
            rules,
        })
    }

    /// Maps lookup indices referenced by rules; references to removed lookups are dropped.
    pub(crate) fn remap_lookups(&mut self, map: impl Fn(u16) -> Option<u16>) {
        let remap = |lookups: &mut Vec<SequenceLookup>| {
            lookups.retain_mut(|lookup| match map(lookup.lookup_index) {
                Some(new_index) => {
                    lookup.lookup_index = new_index;
                    true
                }
                None => false,
            });
        };

        match &mut self.rules {
            ContextRules::Glyphs(sets) => {
                for rule in sets.iter_mut().flat_map(|(_, rules)| rules) {
                    remap(&mut rule.lookups);
                }
            }
            ContextRules::Classes { rule_sets, .. } => {
                for rule in rule_sets.iter_mut().flatten() {
                    remap(&mut rule.lookups);
                }
            }
            ContextRules::Coverages { lookups, .. } => remap(lookups),
        }
    }

    pub(crate) fn write(&self) -> Option<Vec<u8>> {
        let chained = self.chained;
        let mut writer = TableWriter::default();
        match &self.rules {
            ContextRules::Glyphs(sets) => {
                let mut sets = sets.clone();
                sets.sort_unstable_by_key(|(first, _)| *first);
                let coverage: Vec<_> = sets.iter().map(|(first, _)| *first).collect();
                writer.u16(1).offset16(write_coverage(&coverage)?);
                writer.count(sets.len())?;
                for (_, rules) in &sets {
                    writer.nullable_offset16(ContextRule::write_set(rules, chained)?);
                }
            }
            ContextRules::Classes {
                coverage,
                backtrack_classes,
                input_classes,
                lookahead_classes,
                rule_sets,
            } => {
                writer.u16(2).offset16(write_coverage(coverage)?);
                if chained {
                    writer.offset16(backtrack_classes.write()?);
                    writer.offset16(input_classes.write()?);
                    writer.offset16(lookahead_classes.write()?);
                } else {
                    writer.offset16(input_classes.write()?);
                }
                writer.count(rule_sets.len())?;
                for rules in rule_sets {
                    writer.nullable_offset16(ContextRule::write_set(rules, chained)?);
                }
            }
            ContextRules::Coverages {
                backtrack,
                input,
                lookahead,
                lookups,
            } => {
                writer.u16(3);
                if chained {
                    writer.count(backtrack.len())?;
                    write_coverages(&mut writer, backtrack)?;
                    writer.count(input.len())?;
                    write_coverages(&mut writer, input)?;
                    writer.count(lookahead.len())?;
                    write_coverages(&mut writer, lookahead)?;
                    writer.count(lookups.len())?;
                } else {
                    writer.count(input.len())?.count(lookups.len())?;
                    write_coverages(&mut writer, input)?;
                }
                SequenceLookup::write_all(&mut writer, lookups);
            }
        }
        writer.finish()
    }
}

/// Subsetting and serialization of lookup subtables.
pub(crate) trait SubsetSubtable: LookupSubtable {
    /// Retains data referencing only retained glyphs and renumbers it. Returns `None` if
    /// nothing remains.
    fn subset(&self, renumbering: &GlyphRenumbering) -> Option<Self>;

    /// Returns the sequence context if this subtable is one.
    fn context_mut(&mut self) -> Option<&mut ContextSubtable>;

    /// Returns `None` if a 16-bit offset overflows.
    fn write(&self) -> Option<Vec<u8>>;
}

impl<T> Lookup<T> {
    fn write_with_subtables(&self, lookup_type: u16, subtables: Vec<Vec<u8>>) -> Option<Vec<u8>> {
        let mut writer = TableWriter::default();
        writer
            .u16(lookup_type)
            .u16(self.flag)
            .count(subtables.len())?;
        for subtable in subtables {
            writer.offset16(subtable);
        }
        if let Some(set_index) = self.mark_filtering_set {
            writer.u16(set_index);
        }
        writer.finish()
    }
}

impl LangSys {
    fn write(&self) -> Option<Vec<u8>> {
        let mut writer = TableWriter::default();
        writer
            .u16(0) // lookupOrderOffset
            .u16(self.required_feature_index)
            .count(self.feature_indices.len())?
            .glyphs(&self.feature_indices);
        writer.finish()
    }
}

impl Script {
    fn write(&self) -> Option<Vec<u8>> {
        let mut writer = TableWriter::default();
        let default_lang_sys = match &self.default_lang_sys {
            Some(lang_sys) => Some(lang_sys.write()?),
            None => None,
        };
        writer.nullable_offset16(default_lang_sys);
        writer.count(self.lang_systems.len())?;
        for (tag, lang_sys) in &self.lang_systems {
            writer.tag(*tag).offset16(lang_sys.write()?);
        }
        writer.finish()
    }
}

impl Feature {
    fn write(&self) -> Option<Vec<u8>> {
        let mut writer = TableWriter::default();
        writer
            .u16(0) // featureParamsOffset
            .count(self.lookup_indices.len())?
            .glyphs(&self.lookup_indices);
        writer.finish()
    }
}

/// Writes a list of tagged records followed by the record tables.
fn write_tagged_list(records: Vec<([u8; 4], Vec<u8>)>) -> Option<Vec<u8>> {
    let mut writer = TableWriter::default();
    writer.count(records.len())?;
    for (tag, table) in records {
        writer.tag(tag).offset16(table);
    }
    writer.finish()
}

impl<T: SubsetSubtable> LayoutTable<T> {
    /// Retains and renumbers lookup data referencing retained glyphs only. Returns `None`
    /// if no lookups remain.
    pub(crate) fn subset(&self, renumbering: &GlyphRenumbering) -> Option<Self> {
        let skipped: usize = self
            .lookups
            .iter()
            .map(|lookup| lookup.skipped_subtables)
            .sum();
        if skipped > 0 {
            log::warn!(
                "dropping {skipped} unsupported subtable(s) from `{}` lookups",
                T::TABLE
            );
        }

        let mut lookup_map = Vec::with_capacity(self.lookups.len());
        let mut lookups = vec![];
        for lookup in &self.lookups {
            let subtables: Vec<_> = lookup
                .subtables
                .iter()
                .filter_map(|subtable| subtable.subset(renumbering))
                .collect();
            if subtables.is_empty() {
                lookup_map.push(None);
                continue;
            }
            lookup_map.push(u16::try_from(lookups.len()).ok());
            lookups.push(Lookup {
                lookup_type: lookup.lookup_type,
                flag: lookup.flag,
                mark_filtering_set: lookup.mark_filtering_set,
                subtables,
                skipped_subtables: 0,
            });
        }
        let removed_count = self.lookups.len() - lookups.len();
        if removed_count > 0 {
            log::debug!(
                "removing {removed_count} `{}` lookup(s) not applicable to retained glyphs",
                T::TABLE
            );
        }
        if lookups.is_empty() {
            return None;
        }

        let new_lookup = |idx: u16| lookup_map.get(usize::from(idx)).copied().flatten();
        let subtables = lookups.iter_mut().flat_map(|lookup| &mut lookup.subtables);
        for subtable in subtables {
            if let Some(context) = subtable.context_mut() {
                context.remap_lookups(new_lookup);
            }
        }

        let mut feature_map = Vec::with_capacity(self.features.len());
        let mut features = vec![];
        for feature in &self.features {
            let lookup_indices: Vec<_> = feature
                .lookup_indices
                .iter()
                .filter_map(|&idx| new_lookup(idx))
                .collect();
            if lookup_indices.is_empty() {
                feature_map.push(None);
                continue;
            }
            feature_map.push(u16::try_from(features.len()).ok());
            features.push(Feature {
                tag: feature.tag,
                lookup_indices,
            });
        }

        let new_feature = |idx: u16| feature_map.get(usize::from(idx)).copied().flatten();
        let subset_lang_sys = |lang_sys: &LangSys| LangSys {
            required_feature_index: new_feature(lang_sys.required_feature_index)
                .unwrap_or(LangSys::NO_REQUIRED_FEATURE),
            feature_indices: lang_sys
                .feature_indices
                .iter()
                .filter_map(|&idx| new_feature(idx))
                .collect(),
        };
        let scripts = self.scripts.iter().map(|script| Script {
            tag: script.tag,
            default_lang_sys: script.default_lang_sys.as_ref().map(subset_lang_sys),
            lang_systems: script
                .lang_systems
                .iter()
                .map(|(tag, lang_sys)| (*tag, subset_lang_sys(lang_sys)))
                .collect(),
        });

        Some(Self {
            scripts: scripts.collect(),
            features,
            lookups,
        })
    }

    /// Serializes this table in the version 1.0 layout. If 16-bit offsets to lookups overflow,
    /// all lookups are wrapped into extension lookups. Returns `None` if offsets still overflow.
    pub(crate) fn write(&self) -> Option<Vec<u8>> {
        self.write_with(false).or_else(|| {
            log::debug!(
                "`{}` offsets overflow; retrying with extension lookups",
                T::TABLE
            );
            self.write_with(true)
        })
    }

    fn write_with(&self, use_extensions: bool) -> Option<Vec<u8>> {
        let scripts = self
            .scripts
            .iter()
            .map(|script| Some((script.tag, script.write()?)))
            .collect::<Option<_>>()?;
        let features = self
            .features
            .iter()
            .map(|feature| Some((feature.tag, feature.write()?)))
            .collect::<Option<_>>()?;

        let mut writer = TableWriter::default();
        writer
            .u32(0x_0001_0000) // version 1.0
            .offset16(write_tagged_list(scripts)?)
            .offset16(write_tagged_list(features)?)
            .offset16(self.write_lookup_list(use_extensions)?);
        writer.finish()
    }

    fn write_lookup_list(&self, use_extensions: bool) -> Option<Vec<u8>> {
        let subtables: Vec<Vec<_>> = self
            .lookups
            .iter()
            .map(|lookup| lookup.subtables.iter().map(T::write).collect())
            .collect::<Option<_>>()?;

        let mut writer = TableWriter::default();
        writer.count(self.lookups.len())?;
        if !use_extensions {
            for (lookup, subtables) in self.lookups.iter().zip(subtables) {
                writer.offset16(lookup.write_with_subtables(lookup.lookup_type, subtables)?);
            }
            return writer.finish();
        }

        // Lookups with extension subtables are laid out first; wrapped subtables follow
        // all of them and are referenced with 32-bit offsets.
        let lookup_header_len = |lookup: &Lookup<T>| {
            let filtering_set_len = if lookup.mark_filtering_set.is_some() { 2 } else { 0 };
            6 + 10 * lookup.subtables.len() + filtering_set_len
        };
        let mut lookup_start = 2 + 2 * self.lookups.len();
        let headers_len: usize = self.lookups.iter().map(lookup_header_len).sum();
        let mut data_offset = lookup_start + headers_len;
        let mut data = vec![];
        for (lookup, subtables) in self.lookups.iter().zip(subtables) {
            let lookup_len = lookup_header_len(lookup);
            let extension_start = lookup_start + lookup_len - 8 * subtables.len();
            let mut extensions = Vec::with_capacity(subtables.len());
            for (i, subtable) in subtables.into_iter().enumerate() {
                let extension_offset = extension_start + 8 * i;
                let mut extension = vec![];
                write_u16(&mut extension, 1); // format
                write_u16(&mut extension, lookup.lookup_type);
                write_u32(&mut extension, u32::try_from(data_offset - extension_offset).ok()?);
                extensions.push(extension);
                data_offset += subtable.len();
                data.extend_from_slice(&subtable);
            }
            writer.offset16(lookup.write_with_subtables(T::EXTENSION, extensions)?);
            lookup_start += lookup_len;
        }
        let mut list = writer.finish()?;
        list.extend_from_slice(&data);
        Some(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        font::{Cursor, GsubTable, SubstSubtable},
        tests::{renumbering, TestFont},
        Font, FontContainer, TableTag,
    };

    #[test]
    fn writing_coverage() {
        let sparse = write_coverage(&[1, 3, 5]).unwrap();
        assert_eq!(sparse, [0, 1, 0, 3, 0, 1, 0, 3, 0, 5]);
        let dense: Vec<_> = (10..20).collect();
        let written = write_coverage(&dense).unwrap();
        assert_eq!(written, [0, 2, 0, 1, 0, 10, 0, 19, 0, 0]);
    }

    #[test]
    fn class_def_round_trip() {
        let class_def = ClassDef(vec![(2, 1), (3, 1), (4, 2), (7, 1)]);
        let written = class_def.write().unwrap();
        assert_eq!(
            written,
            [0, 2, 0, 3, 0, 2, 0, 3, 0, 1, 0, 4, 0, 4, 0, 2, 0, 7, 0, 7, 0, 1]
        );
        assert_eq!(ClassDef::parse(Cursor::new(&written)).unwrap(), class_def);
    }

    #[test]
    fn table_writer_detects_overflow() {
        let mut writer = TableWriter::default();
        writer.offset16(vec![0; 70_000]).offset16(vec![1]);
        assert!(writer.finish().is_none());

        let mut writer = TableWriter::default();
        writer.offset32(vec![0; 70_000]).offset32(vec![1]);
        let written = writer.finish().unwrap();
        assert_eq!(written[4..8], 70_008_u32.to_be_bytes());
    }

    #[test]
    fn gsub_round_trip() {
        let container = FontContainer::parse(&TestFont::Full.bytes()).unwrap();
        let font = Font::new(&container).unwrap();
        let gsub = font.gsub.as_ref().unwrap();

        let written = gsub.write().unwrap();
        let parsed = GsubTable::parse(Cursor::for_table(&written, TableTag::GSUB)).unwrap();
        assert_eq!(parsed, *gsub);
    }

    #[test]
    fn empty_lookups_and_features_are_removed() {
        let container = FontContainer::parse(&TestFont::Full.bytes()).unwrap();
        let font = Font::new(&container).unwrap();
        // Retained glyphs: [0, 4, 6, 7] -> [0, 1, 2, 3]; only the `fi` ligature remains.
        let subset = font
            .gsub
            .as_ref()
            .unwrap()
            .subset(&renumbering(&font, "fi"))
            .unwrap();

        assert_eq!(subset.lookups.len(), 1);
        assert_eq!(subset.features.len(), 1);
        assert_eq!(subset.features[0].tag, *b"liga");
        assert_eq!(subset.features[0].lookup_indices, [0]);
        for script in &subset.scripts {
            let default_lang_sys = script.default_lang_sys.as_ref().unwrap();
            assert_eq!(default_lang_sys.feature_indices, [0]);
        }
        let (_, turkish) = &subset.scripts[1].lang_systems[0];
        assert_eq!(turkish.feature_indices, [0]);
    }

    #[test]
    fn context_lookup_references_are_remapped() {
        let container = FontContainer::parse(&TestFont::Full.bytes()).unwrap();
        let font = Font::new(&container).unwrap();
        // Retained glyphs: [0, 1, 2, 3]; the ligature lookup #0 is removed.
        let subset = font
            .gsub
            .as_ref()
            .unwrap()
            .subset(&renumbering(&font, "AB"))
            .unwrap();

        assert_eq!(subset.lookups.len(), 2);
        assert_eq!(subset.features.len(), 1);
        assert_eq!(subset.features[0].tag, *b"smcp");
        assert_eq!(subset.features[0].lookup_indices, [0, 1]);
        let [SubstSubtable::Context(context)] = subset.lookups[1].subtables.as_slice() else {
            panic!("unexpected subtables: {:?}", subset.lookups[1].subtables);
        };
        assert_eq!(
            context.rules,
            ContextRules::Coverages {
                backtrack: vec![vec![1]],
                input: vec![vec![2]],
                lookahead: vec![],
                lookups: vec![SequenceLookup {
                    sequence_index: 0,
                    lookup_index: 0,
                }],
            }
        );

        let written = subset.write().unwrap();
        let parsed = GsubTable::parse(Cursor::new(&written)).unwrap();
        assert_eq!(parsed, subset);
    }

    #[test]
    fn context_with_unretained_glyphs_is_dropped() {
        let container = FontContainer::parse(&TestFont::Full.bytes()).unwrap();
        let font = Font::new(&container).unwrap();
        // `A` (glyph 1) from the backtrack coverage is not retained.
        let subset = font
            .gsub
            .as_ref()
            .unwrap()
            .subset(&renumbering(&font, "B"))
            .unwrap();
        assert_eq!(subset.lookups.len(), 1);
        assert_eq!(subset.lookups[0].lookup_type, SubstSubtable::SINGLE);
    }

    #[test]
    fn nothing_is_retained_for_unrelated_glyphs() {
        let container = FontContainer::parse(&TestFont::Full.bytes()).unwrap();
        let font = Font::new(&container).unwrap();
        let gsub = font.gsub.as_ref().unwrap();
        assert!(gsub.subset(&renumbering(&font, "A")).is_none());
    }

    fn single_lookup(pairs: Vec<(u16, u16)>) -> Lookup<SubstSubtable> {
        Lookup {
            lookup_type: SubstSubtable::SINGLE,
            flag: 0,
            mark_filtering_set: None,
            subtables: vec![SubstSubtable::Single(pairs)],
            skipped_subtables: 0,
        }
    }

    #[test]
    fn offset_overflow_is_detected() {
        let pairs = (0..40_000_u16).map(|glyph| (glyph, glyph + 1)).collect();
        let gsub = GsubTable {
            scripts: vec![],
            features: vec![],
            lookups: vec![single_lookup(pairs)],
        };
        assert!(gsub.write().is_none());
    }

    #[test]
    fn extension_lookups_on_offset_overflow() {
        let lookups = (0..4_u16).map(|i| {
            let pairs = (0..15_000_u16).map(|glyph| (glyph, glyph + i)).collect();
            single_lookup(pairs)
        });
        let gsub = GsubTable {
            scripts: vec![],
            features: vec![Feature {
                tag: *b"test",
                lookup_indices: vec![0, 1, 2, 3],
            }],
            lookups: lookups.collect(),
        };
        assert!(gsub.write_with(false).is_none());

        let written = gsub.write().unwrap();
        let lookup_list_offset = usize::from(u16::from_be_bytes([written[8], written[9]]));
        let first_lookup_offset = usize::from(u16::from_be_bytes([
            written[lookup_list_offset + 2],
            written[lookup_list_offset + 3],
        ]));
        let lookup_type_pos = lookup_list_offset + first_lookup_offset;
        assert_eq!(written[lookup_type_pos..lookup_type_pos + 2], [0, 7]);

        let parsed = GsubTable::parse(Cursor::new(&written)).unwrap();
        assert_eq!(parsed, gsub);
    }

    #[test]
    fn mark_filtering_set_is_retained() {
        let lookup = Lookup {
            lookup_type: SubstSubtable::SINGLE,
            flag: 0x0318, // mark attachment type 3, `USE_MARK_FILTERING_SET`, `IGNORE_MARKS`
            mark_filtering_set: Some(2),
            subtables: vec![SubstSubtable::Single(vec![(1, 2)])],
            skipped_subtables: 0,
        };
        let gsub = GsubTable {
            scripts: vec![],
            features: vec![],
            lookups: vec![lookup],
        };
        let written = gsub.write().unwrap();
        let parsed = GsubTable::parse(Cursor::new(&written)).unwrap();
        assert_eq!(parsed, gsub);
    }
}
