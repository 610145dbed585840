//! Rewriting font tables for a retained glyph set.

use crate::{
    errors::ParseErrorKind,
    font::{
        CmapTable, Font, Glyph, GlyphData, GlyphWithMetrics, LocaTable, Metrics, MetricsHeader,
        MetricsTable,
    },
    write::{pad_to_4_bytes, write_u16, write_u32},
    FontContainer, GlyphRenumbering, ParseError, RetainedSet, TableTag,
};

/// Tables not referencing glyph indices, which are copied to subsets as is.
const GLYPH_AGNOSTIC_TABLES: [TableTag; 12] = [
    TableTag::CVT,
    TableTag::FPGM,
    TableTag::PREP,
    TableTag::GASP,
    TableTag::NAME,
    TableTag::META,
    TableTag::STAT,
    TableTag::FVAR,
    TableTag::AVAR,
    TableTag::MVAR,
    TableTag::CVAR,
    TableTag::CPAL,
];

/// Tables rewritten for subsets; they are omitted if no data remains for retained glyphs.
const REWRITTEN_TABLES: [TableTag; 15] = [
    TableTag::HEAD,
    TableTag::HHEA,
    TableTag::MAXP,
    TableTag::OS2,
    TableTag::HMTX,
    TableTag::CMAP,
    TableTag::LOCA,
    TableTag::GLYF,
    TableTag::KERN,
    TableTag::POST,
    TableTag::VHEA,
    TableTag::VMTX,
    TableTag::GDEF,
    TableTag::GSUB,
    TableTag::GPOS,
];

/// Tables invalidated by any change to the font.
const INVALIDATED_TABLES: [TableTag; 1] = [TableTag::DSIG];

/// Subset of a [`Font`] produced by removing glyphs not in a [`RetainedSet`] and renumbering
/// the remaining ones.
#[derive(Debug)]
pub struct FontSubset<'a> {
    pub(crate) font: Font<'a>,
    pub(crate) renumbering: GlyphRenumbering,
    /// Char map with new glyph indices, ordered by char.
    pub(crate) char_map: Vec<(char, u16)>,
    /// Glyphs in the new order, with composite components renumbered.
    pub(crate) glyphs: Vec<GlyphWithMetrics<'a>>,
}

impl<'a> FontSubset<'a> {
    /// Creates a subset of the `font` retaining the specified glyphs.
    ///
    /// # Errors
    ///
    /// Returns an error if glyph data cannot be parsed.
    pub fn new(font: Font<'a>, retained: &RetainedSet) -> Result<Self, ParseError> {
        let renumbering = GlyphRenumbering::new(retained);
        let char_map = font
            .char_map(|glyph_idx| retained.contains(glyph_idx))?
            .into_iter()
            .filter_map(|(ch, old_idx)| Some((ch, renumbering.get(old_idx)?)))
            .collect();

        let mut glyphs = Vec::with_capacity(renumbering.len());
        for (old_idx, _) in renumbering.iter() {
            let mut glyph = font.glyph(old_idx)?;
            if let Glyph::Composite { components, .. } = &mut glyph.inner {
                for component in components {
                    let old_component_idx = component.glyph_idx;
                    component.glyph_idx = renumbering.get(old_component_idx).ok_or_else(|| {
                        ParseError::new(ParseErrorKind::UnretainedGlyph(old_component_idx))
                            .with_table(TableTag::GLYF)
                    })?;
                }
            }
            glyphs.push(glyph);
        }

        Ok(Self {
            font,
            renumbering,
            char_map,
            glyphs,
        })
    }

    /// Returns the number of glyphs in the subset.
    pub fn glyph_count(&self) -> usize {
        self.glyphs.len()
    }

    /// Lists chars mapped by the subset together with new glyph indices.
    pub fn char_map(&self) -> &[(char, u16)] {
        &self.char_map
    }

    /// Writes subset tables into a new container.
    ///
    /// # Errors
    ///
    /// Returns an error if a table copied with modifications (e.g., `post`) is malformed.
    pub fn to_container(&self) -> Result<FontContainer, ParseError> {
        let source = self.font.container();
        let mut container = FontContainer::new(FontContainer::TRUETYPE_VERSION);

        let mut glyf = vec![];
        let mut locations = Vec::with_capacity(self.glyphs.len() + 1);
        locations.push(0);
        for glyph in &self.glyphs {
            glyph.inner.write(&mut glyf);
            pad_to_4_bytes(&mut glyf);
            locations.push(glyf.len());
        }
        let mut loca = vec![];
        let loca_format = LocaTable::write(&locations, &mut loca);

        let mut head = vec![];
        GlyphData::write_head_table(self.font.glyphs.head, loca_format, &mut head);
        container.set_table(TableTag::HEAD, head);

        let horizontal: Vec<_> = self.glyphs.iter().map(|glyph| glyph.horizontal).collect();
        let (hhea, hmtx) = Self::write_metrics(&self.font.hhea, &horizontal);
        container.set_table(TableTag::HHEA, hhea);
        container.set_table(TableTag::MAXP, self.write_maxp());
        if let Some(os2) = source.table(TableTag::OS2) {
            container.set_table(TableTag::OS2, self.write_os2(os2));
        }
        container.set_table(TableTag::HMTX, hmtx);

        let mut cmap = vec![];
        CmapTable::write_for_map(&self.char_map, &mut cmap);
        container.set_table(TableTag::CMAP, cmap);

        container.set_table(TableTag::LOCA, loca);
        container.set_table(TableTag::GLYF, glyf);
        for tag in GLYPH_AGNOSTIC_TABLES {
            if let Some(table) = source.table(tag) {
                container.set_table(tag, table.to_vec());
            }
        }
        if let Some(kern) = &self.font.kern {
            if let Some(kern) = kern.subset(&self.renumbering) {
                container.set_table(TableTag::KERN, kern.write());
            }
        }
        if let Some(post) = source.table(TableTag::POST) {
            container.set_table(TableTag::POST, Self::write_post(post)?);
        }

        if let Some((vhea, _)) = &self.font.vertical {
            let vertical: Option<Vec<_>> =
                self.glyphs.iter().map(|glyph| glyph.vertical).collect();
            if let Some(vertical) = vertical {
                let (vhea, vmtx) = Self::write_metrics(vhea, &vertical);
                container.set_table(TableTag::VHEA, vhea);
                container.set_table(TableTag::VMTX, vmtx);
            }
        }

        self.write_layout_tables(&mut container);

        for tag in source.tags() {
            if container.table(tag).is_some() {
                continue;
            }
            if REWRITTEN_TABLES.contains(&tag) || INVALIDATED_TABLES.contains(&tag) {
                log::debug!("dropping `{tag}` table from the subset");
            } else {
                log::warn!("dropping `{tag}` table: glyph-indexed data cannot be subsetted");
            }
        }
        Ok(container)
    }

    fn write_layout_tables(&self, container: &mut FontContainer) {
        let mut set_table = |tag: TableTag, table: Option<Vec<u8>>| match table {
            Some(table) => container.set_table(tag, table),
            None => log::warn!("dropping `{tag}` table since its subset has offset overflow"),
        };

        if let Some(gdef) = &self.font.gdef {
            let gdef = gdef.subset(&self.renumbering);
            if !gdef.is_empty() {
                set_table(TableTag::GDEF, gdef.write());
            }
        }
        if let Some(gsub) = self.font.gsub.as_ref() {
            if let Some(gsub) = gsub.subset(&self.renumbering) {
                set_table(TableTag::GSUB, gsub.write());
            }
        }
        if let Some(gpos) = self.font.gpos.as_ref() {
            if let Some(gpos) = gpos.subset(&self.renumbering) {
                set_table(TableTag::GPOS, gpos.write());
            }
        }
    }

    fn write_metrics(
        header: &MetricsHeader<'_>,
        metrics: &[Metrics],
    ) -> (Vec<u8>, Vec<u8>) {
        let mut table = vec![];
        let number_of_metrics = MetricsTable::write_for_glyphs(metrics, &mut table);
        let mut header_bytes = vec![];
        header.write(number_of_metrics, &mut header_bytes);
        (header_bytes, table)
    }

    fn write_maxp(&self) -> Vec<u8> {
        let maxp = self.font.glyphs.maxp;
        let mut buffer = Vec::with_capacity(maxp.len());
        // Patch the number of glyphs (u16 at bytes 4..6), and leave other bytes intact.
        buffer.extend_from_slice(&maxp[..4]);
        // The number of retained glyphs doesn't exceed the original number of glyphs.
        write_u16(
            &mut buffer,
            u16::try_from(self.glyphs.len()).unwrap_or(u16::MAX),
        );
        buffer.extend_from_slice(&maxp[6..]);
        buffer
    }

    /// Patches `usFirstCharIndex` and `usLastCharIndex`.
    fn write_os2(&self, os2: &[u8]) -> Vec<u8> {
        const FIRST_CHAR_OFFSET: usize = 64;

        let mut buffer = os2.to_vec();
        let (Some(&(first, _)), Some(&(last, _))) = (self.char_map.first(), self.char_map.last())
        else {
            return buffer;
        };
        if let Some(range) = buffer.get_mut(FIRST_CHAR_OFFSET..FIRST_CHAR_OFFSET + 4) {
            let clamp = |ch: char| u16::try_from(u32::from(ch)).unwrap_or(u16::MAX);
            range[..2].copy_from_slice(&clamp(first).to_be_bytes());
            range[2..].copy_from_slice(&clamp(last).to_be_bytes());
        }
        buffer
    }

    /// Truncates the `post` table to version 3.0 so that it doesn't contain glyph names.
    fn write_post(post: &[u8]) -> Result<Vec<u8>, ParseError> {
        const HEADER_LEN: usize = 32;

        let Some(header) = post.get(4..HEADER_LEN) else {
            let err = ParseError::new(ParseErrorKind::UnexpectedTableLen {
                expected: HEADER_LEN,
                actual: post.len(),
            });
            return Err(err.with_table(TableTag::POST));
        };
        let mut buffer = Vec::with_capacity(HEADER_LEN);
        write_u32(&mut buffer, 0x_0003_0000);
        buffer.extend_from_slice(header);
        Ok(buffer)
    }
}
