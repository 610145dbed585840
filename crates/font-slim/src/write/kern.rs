//! Subsetting and serialization of the legacy `kern` table.

use super::write_u16;
use crate::{
    font::{KernPair, KernSubtable, KernTable},
    GlyphRenumbering,
};

impl KernTable {
    /// Retains pairs where both glyphs are retained. Returns `None` if no pairs remain.
    pub(crate) fn subset(&self, renumbering: &GlyphRenumbering) -> Option<Self> {
        let subtables = self.subtables.iter().filter_map(|subtable| {
            let mut pairs: Vec<_> = subtable
                .pairs
                .iter()
                .filter_map(|pair| {
                    Some(KernPair {
                        left: renumbering.get(pair.left)?,
                        right: renumbering.get(pair.right)?,
                        value: pair.value,
                    })
                })
                .collect();
            pairs.sort_unstable_by_key(|pair| (pair.left, pair.right));
            (!pairs.is_empty()).then_some(KernSubtable {
                coverage: subtable.coverage,
                pairs,
            })
        });
        let subtables: Vec<_> = subtables.collect();
        (!subtables.is_empty()).then_some(Self { subtables })
    }

    #[allow(clippy::cast_possible_truncation)]
    // `length` and binary search params may overflow for huge subtables; readers use `nPairs` instead
    pub(crate) fn write(&self) -> Vec<u8> {
        let mut buffer = vec![];
        write_u16(&mut buffer, 0); // version
        write_u16(&mut buffer, self.subtables.len() as u16);
        for subtable in &self.subtables {
            let pair_count = subtable.pairs.len() as u32;
            write_u16(&mut buffer, 0); // subtable version
            write_u16(&mut buffer, (14 + 6 * pair_count) as u16);
            write_u16(&mut buffer, subtable.coverage);

            write_u16(&mut buffer, pair_count as u16);
            let entry_selector = pair_count.checked_ilog2().unwrap_or(0);
            let search_range = 6_u32 << entry_selector;
            write_u16(&mut buffer, search_range as u16);
            write_u16(&mut buffer, entry_selector as u16);
            write_u16(
                &mut buffer,
                (6 * pair_count).saturating_sub(search_range) as u16,
            );
            for pair in &subtable.pairs {
                write_u16(&mut buffer, pair.left);
                write_u16(&mut buffer, pair.right);
                buffer.extend_from_slice(&pair.value.to_be_bytes());
            }
        }
        buffer
    }
}
