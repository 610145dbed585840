//! Glyph closure and renumbering.

use std::collections::BTreeSet;

use crate::{font::SubstitutionRule, Font, ParseError};

/// Set of glyphs retained in a font subset. Always contains the missing glyph (index 0).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetainedSet {
    glyphs: BTreeSet<u16>,
    has_mapped_glyphs: bool,
}

impl RetainedSet {
    /// Computes the closure of glyphs reachable from `chars`: glyphs mapped from the chars
    /// by `cmap`, components of composite glyphs, and outputs of `GSUB` substitutions whose
    /// inputs are all retained.
    ///
    /// Chars not mapped by the font are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if glyph data or the `cmap` table is malformed, or if a glyph
    /// index is out of range.
    pub fn compute(font: &Font<'_>, chars: &BTreeSet<char>) -> Result<Self, ParseError> {
        let mut this = Self {
            glyphs: BTreeSet::new(),
            has_mapped_glyphs: false,
        };
        let mut worklist = vec![0];
        for &ch in chars {
            let glyph_idx = font.map_char(ch)?;
            if glyph_idx != 0 {
                this.has_mapped_glyphs = true;
                worklist.push(glyph_idx);
            }
        }

        let rules: Vec<SubstitutionRule<'_>> =
            font.gsub.iter().flat_map(|gsub| gsub.rules()).collect();
        loop {
            this.expand_components(font, &mut worklist)?;
            // Substitutions are rechecked every time the set grows.
            for rule in &rules {
                if rule.inputs().all(|glyph| this.glyphs.contains(&glyph)) {
                    let new_outputs = rule
                        .outputs
                        .iter()
                        .filter(|&glyph| !this.glyphs.contains(glyph));
                    worklist.extend(new_outputs);
                }
            }
            if worklist.is_empty() {
                break;
            }
        }
        Ok(this)
    }

    fn expand_components(
        &mut self,
        font: &Font<'_>,
        worklist: &mut Vec<u16>,
    ) -> Result<(), ParseError> {
        while let Some(glyph_idx) = worklist.pop() {
            if !self.glyphs.insert(glyph_idx) {
                continue; // already processed
            }
            let glyph = font.raw_glyph(glyph_idx)?;
            worklist.extend(glyph.component_indices());
        }
        Ok(())
    }

    /// Checks whether at least one requested char was mapped to a glyph.
    pub fn has_mapped_glyphs(&self) -> bool {
        self.has_mapped_glyphs
    }

    /// Checks whether the specified glyph is retained.
    pub fn contains(&self, glyph_idx: u16) -> bool {
        self.glyphs.contains(&glyph_idx)
    }

    /// Returns the number of retained glyphs.
    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    /// Always returns `false` since the missing glyph is always retained.
    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    /// Iterates over retained glyph indices in the increasing order.
    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.glyphs.iter().copied()
    }
}

impl Font<'_> {
    /// Computes the glyph closure for the specified chars. This is a shortcut for
    /// [`RetainedSet::compute()`].
    ///
    /// # Errors
    ///
    /// Proxies errors from [`RetainedSet::compute()`].
    pub fn glyph_closure(&self, chars: &BTreeSet<char>) -> Result<RetainedSet, ParseError> {
        RetainedSet::compute(self, chars)
    }
}

/// Order-preserving mapping from the original glyph indices to indices in a subset.
#[derive(Debug, Clone)]
pub struct GlyphRenumbering {
    /// Old indices in the increasing order; the new index is the position in this vector.
    old_indices: Vec<u16>,
}

impl GlyphRenumbering {
    /// Creates a renumbering for the retained glyphs.
    pub fn new(retained: &RetainedSet) -> Self {
        Self {
            old_indices: retained.iter().collect(),
        }
    }

    /// Returns the new index for an old glyph index, or `None` if the glyph is not retained.
    pub fn get(&self, old_idx: u16) -> Option<u16> {
        let new_idx = self.old_indices.binary_search(&old_idx).ok()?;
        // The number of retained glyphs doesn't exceed the number of `u16` values.
        u16::try_from(new_idx).ok()
    }

    /// Returns the old glyph index for the new one.
    pub fn old_index(&self, new_idx: u16) -> Option<u16> {
        self.old_indices.get(usize::from(new_idx)).copied()
    }

    /// Returns the number of glyphs in the subset.
    pub fn len(&self) -> usize {
        self.old_indices.len()
    }

    /// Checks whether the renumbering is empty.
    pub fn is_empty(&self) -> bool {
        self.old_indices.is_empty()
    }

    /// Iterates over `(old, new)` index pairs in the increasing order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, u16)> + '_ {
        self.old_indices.iter().zip(0_u16..).map(|(&old, new)| (old, new))
    }
}
