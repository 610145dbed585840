//! Structured view over a [`FontContainer`].

use core::ops;

pub(crate) use self::{
    cmap::{CmapTable, SegmentDeltas, SegmentWithDelta, SegmentedCoverage, SequentialMapGroup},
    glyph::{
        Glyph, GlyphComponent, GlyphComponentArgs, GlyphWithMetrics, OutlinePoint, SimpleOutline,
        TransformData,
    },
    gdef::{CaretValue, GdefTable},
    gpos::{
        Anchor, ClassPairs, GposTable, MarkAttachment, MarkRecord, MarkToLigature, PairValue,
        PosSubtable, ValueRecord,
    },
    gsub::{GsubTable, LigatureRule, SubstSubtable, SubstitutionRule},
    kern::{KernPair, KernSubtable, KernTable},
    layout::{
        ClassDef, ContextRule, ContextRules, ContextSubtable, Feature, LangSys, LayoutTable,
        Lookup, LookupSubtable, Script, SequenceLookup,
    },
    metrics::{Metrics, MetricsHeader, MetricsTable},
};
pub use self::name::FontNames;
use crate::{
    errors::{MapError, ParseError, ParseErrorKind},
    FontContainer, TableTag,
};

mod cmap;
mod gdef;
mod glyph;
mod gpos;
mod gsub;
mod kern;
mod layout;
mod metrics;
mod name;

/// Read-only cursor over big-endian font data that tracks the offset for error reporting.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Cursor<'a> {
    pub(crate) bytes: &'a [u8],
    offset: usize,
    table: Option<TableTag>,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            offset: 0,
            table: None,
        }
    }

    pub(crate) fn for_table(bytes: &'a [u8], tag: TableTag) -> Self {
        Self {
            bytes,
            offset: 0,
            table: Some(tag),
        }
    }

    pub(crate) fn err(&self, kind: ParseErrorKind) -> ParseError {
        ParseError {
            kind,
            offset: self.offset,
            table: self.table,
        }
    }

    pub(crate) fn skip(&mut self, n: usize) -> Result<(), ParseError> {
        if self.bytes.len() < n {
            Err(self.err(ParseErrorKind::UnexpectedEof))
        } else {
            self.bytes = &self.bytes[n..];
            self.offset += n;
            Ok(())
        }
    }

    /// Splits off the first `len` bytes into a separate cursor and advances this one past them.
    pub(crate) fn split_at(&mut self, len: usize) -> Result<Self, ParseError> {
        let head = self.range(0..len)?;
        self.skip(len)?;
        Ok(head)
    }

    /// Returns a cursor over the specified range relative to the current position.
    pub(crate) fn range(&self, range: ops::Range<usize>) -> Result<Self, ParseError> {
        let bytes = self.bytes.get(range.clone()).ok_or_else(|| {
            self.err(ParseErrorKind::RangeOutOfBounds {
                range: range.clone(),
                len: self.bytes.len(),
            })
        })?;
        Ok(Self {
            bytes,
            offset: self.offset + range.start,
            table: self.table,
        })
    }

    /// Returns a cursor starting at the specified offset relative to the current position.
    pub(crate) fn at(&self, offset: usize) -> Result<Self, ParseError> {
        if offset > self.bytes.len() {
            return Err(self.err(ParseErrorKind::OffsetOutOfBounds(offset)));
        }
        Ok(Self {
            bytes: &self.bytes[offset..],
            offset: self.offset + offset,
            table: self.table,
        })
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, ParseError> {
        let [byte] = self.read_byte_array::<1>()?;
        Ok(byte)
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, ParseError> {
        self.read_byte_array::<2>().map(u16::from_be_bytes)
    }

    pub(crate) fn read_i16(&mut self) -> Result<i16, ParseError> {
        self.read_byte_array::<2>().map(i16::from_be_bytes)
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, ParseError> {
        self.read_byte_array::<4>().map(u32::from_be_bytes)
    }

    pub(crate) fn read_byte_array<const N: usize>(&mut self) -> Result<[u8; N], ParseError> {
        if self.bytes.len() < N {
            return Err(self.err(ParseErrorKind::UnexpectedEof));
        }
        let mut array = [0_u8; N];
        array.copy_from_slice(&self.bytes[..N]);
        self.bytes = &self.bytes[N..];
        self.offset += N;
        Ok(array)
    }

    pub(crate) fn read_u16_checked<T>(
        &mut self,
        check: impl FnOnce(u16) -> Result<T, ParseErrorKind>,
    ) -> Result<T, ParseError> {
        let start = *self;
        let value = self.read_u16()?;
        check(value).map_err(|kind| start.err(kind))
    }

    pub(crate) fn read_u32_checked<T>(
        &mut self,
        check: impl FnOnce(u32) -> Result<T, ParseErrorKind>,
    ) -> Result<T, ParseError> {
        let start = *self;
        let value = self.read_u32()?;
        check(value).map_err(|kind| start.err(kind))
    }

    /// Reads an array of `len` big-endian `u16` values.
    pub(crate) fn read_u16_array(&mut self, len: usize) -> Result<Vec<u16>, ParseError> {
        let mut array_cursor = self.split_at(2 * len)?;
        (0..len).map(|_| array_cursor.read_u16()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LocaFormat {
    Short,
    Long,
}

impl LocaFormat {
    const fn bytes_per_offset(self) -> usize {
        match self {
            Self::Short => 2,
            Self::Long => 4,
        }
    }

    pub(crate) const fn to_raw(self) -> u16 {
        match self {
            Self::Short => 0,
            Self::Long => 1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct LocaTable<'a> {
    pub(crate) format: LocaFormat,
    cursor: Cursor<'a>,
}

impl<'a> LocaTable<'a> {
    fn new(format: LocaFormat, glyph_count: u16, cursor: Cursor<'a>) -> Result<Self, ParseError> {
        let expected_len = format.bytes_per_offset() * (usize::from(glyph_count) + 1);
        // Some fonts have extra trailing offsets; they are ignored.
        if cursor.bytes.len() < expected_len {
            Err(cursor.err(ParseErrorKind::UnexpectedTableLen {
                expected: expected_len,
                actual: cursor.bytes.len(),
            }))
        } else {
            Ok(Self { format, cursor })
        }
    }

    fn glyph_range(&self, glyph_idx: u16) -> Result<ops::Range<usize>, ParseError> {
        let glyph_idx = usize::from(glyph_idx);
        let mut cursor = self.cursor;
        let (start, end) = match self.format {
            LocaFormat::Short => {
                cursor.skip(glyph_idx * 2)?;
                let start = usize::from(cursor.read_u16()?) * 2;
                (start, usize::from(cursor.read_u16()?) * 2)
            }
            LocaFormat::Long => {
                cursor.skip(glyph_idx * 4)?;
                let start = cursor.read_u32()? as usize;
                (start, cursor.read_u32()? as usize)
            }
        };
        if start > end {
            let kind = ParseErrorKind::RangeOutOfBounds {
                range: start..end,
                len: end,
            };
            return Err(cursor.err(kind));
        }
        Ok(start..end)
    }
}

/// `glyf` and `loca` tables together with the `head` and `maxp` data needed to read them.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GlyphData<'a> {
    pub(crate) head: &'a [u8],
    pub(crate) maxp: &'a [u8],
    pub(crate) glyph_count: u16,
    pub(crate) loca: LocaTable<'a>,
    pub(crate) glyf: &'a [u8],
}

impl<'a> GlyphData<'a> {
    pub(crate) const HEAD_MIN_LEN: usize = 54;
    pub(crate) const LOCA_FORMAT_OFFSET: usize = 50;

    pub(crate) fn new(container: &'a FontContainer) -> Result<Self, ParseError> {
        let head = required_table(container, TableTag::HEAD)?;
        let loca_format = Self::parse_loca_format(head)?;
        let maxp = required_table(container, TableTag::MAXP)?;
        let glyph_count = Self::parse_glyph_count(maxp)?;
        let loca = required_table(container, TableTag::LOCA)?;
        let loca = LocaTable::new(loca_format, glyph_count, loca)?;
        let glyf = required_table(container, TableTag::GLYF)?;
        Ok(Self {
            head: head.bytes,
            maxp: maxp.bytes,
            glyph_count,
            loca,
            glyf: glyf.bytes,
        })
    }

    fn parse_loca_format(mut head: Cursor<'_>) -> Result<LocaFormat, ParseError> {
        if head.bytes.len() < Self::HEAD_MIN_LEN {
            return Err(head.err(ParseErrorKind::UnexpectedTableLen {
                expected: Self::HEAD_MIN_LEN,
                actual: head.bytes.len(),
            }));
        }
        head.read_u32_checked(|version| {
            if version == 0x_0001_0000 {
                Ok(())
            } else {
                Err(ParseErrorKind::UnexpectedTableVersion(version))
            }
        })?;
        head.skip(Self::LOCA_FORMAT_OFFSET - 4)?;
        // ^ fontRevision, checksumAdjustment, magicNumber, flags, unitsPerEm, created, modified,
        // bounding box, macStyle, lowestRecPPEM, fontDirectionHint

        head.read_u16_checked(|raw_format| match raw_format {
            0 => Ok(LocaFormat::Short),
            1 => Ok(LocaFormat::Long),
            _ => Err(ParseErrorKind::UnexpectedLocaFormat(raw_format)),
        })
    }

    fn parse_glyph_count(mut maxp: Cursor<'_>) -> Result<u16, ParseError> {
        maxp.read_u32_checked(|version| {
            if version == 0x_0000_5000 || version == 0x_0001_0000 {
                Ok(())
            } else {
                Err(ParseErrorKind::UnexpectedTableVersion(version))
            }
        })?;
        maxp.read_u16()
    }

    pub(crate) fn glyph(&self, glyph_idx: u16) -> Result<Glyph<'a>, ParseError> {
        if glyph_idx >= self.glyph_count {
            let err = ParseError::new(ParseErrorKind::GlyphOutOfRange(glyph_idx.into()));
            return Err(err.with_table(TableTag::GLYF));
        }
        let range = self.loca.glyph_range(glyph_idx)?;
        let glyf = Cursor::for_table(self.glyf, TableTag::GLYF);
        Glyph::new(glyf.range(range)?)
    }
}

fn required_table(container: &FontContainer, tag: TableTag) -> Result<Cursor<'_>, ParseError> {
    container
        .table(tag)
        .map(|bytes| Cursor::for_table(bytes, tag))
        .ok_or_else(|| ParseError::missing_table(tag))
}

/// TrueType font parsed from a [`FontContainer`].
///
/// Only the tables required for subsetting are decoded; glyph data is decoded lazily.
#[derive(Debug)]
pub struct Font<'a> {
    pub(crate) container: &'a FontContainer,
    pub(crate) cmap: CmapTable<'a>,
    pub(crate) glyphs: GlyphData<'a>,
    pub(crate) hhea: MetricsHeader<'a>,
    pub(crate) hmtx: MetricsTable<'a>,
    pub(crate) vertical: Option<(MetricsHeader<'a>, MetricsTable<'a>)>,
    pub(crate) gsub: Option<GsubTable>,
    pub(crate) gpos: Option<GposTable>,
    pub(crate) gdef: Option<GdefTable>,
    pub(crate) kern: Option<KernTable>,
}

impl<'a> Font<'a> {
    /// Parses tables necessary for subsetting from the container.
    ///
    /// # Errors
    ///
    /// Returns an error if a required table is missing (e.g., the font has CFF outlines
    /// instead of `glyf`) or cannot be parsed.
    pub fn new(container: &'a FontContainer) -> Result<Self, ParseError> {
        let glyphs = GlyphData::new(container)?;
        let glyph_count = glyphs.glyph_count;
        let cmap = CmapTable::parse(required_table(container, TableTag::CMAP)?)?;

        let hhea = MetricsHeader::parse(required_table(container, TableTag::HHEA)?)?;
        let hmtx = required_table(container, TableTag::HMTX)?;
        let hmtx = MetricsTable::new(hmtx, &hhea, glyph_count)?;
        let vertical = match (
            container.table(TableTag::VHEA),
            container.table(TableTag::VMTX),
        ) {
            (Some(vhea), Some(vmtx)) => {
                let vhea = MetricsHeader::parse(Cursor::for_table(vhea, TableTag::VHEA))?;
                let vmtx = Cursor::for_table(vmtx, TableTag::VMTX);
                let vmtx = MetricsTable::new(vmtx, &vhea, glyph_count)?;
                Some((vhea, vmtx))
            }
            _ => None,
        };

        let gsub = container
            .table(TableTag::GSUB)
            .map(|bytes| GsubTable::parse(Cursor::for_table(bytes, TableTag::GSUB)))
            .transpose()?;
        let gpos = container
            .table(TableTag::GPOS)
            .map(|bytes| GposTable::parse(Cursor::for_table(bytes, TableTag::GPOS)))
            .transpose()?;
        let gdef = container
            .table(TableTag::GDEF)
            .map(|bytes| GdefTable::parse(Cursor::for_table(bytes, TableTag::GDEF)))
            .transpose()?;
        let kern = container
            .table(TableTag::KERN)
            .map(|bytes| KernTable::parse(Cursor::for_table(bytes, TableTag::KERN)))
            .transpose()?
            .flatten();

        Ok(Self {
            container,
            cmap,
            glyphs,
            hhea,
            hmtx,
            vertical,
            gsub,
            gpos,
            gdef,
            kern,
        })
    }

    /// Returns the container this font is parsed from.
    pub fn container(&self) -> &'a FontContainer {
        self.container
    }

    /// Returns the number of glyphs in the font as per the `maxp` table.
    pub fn glyph_count(&self) -> u16 {
        self.glyphs.glyph_count
    }

    /// Maps a char to a glyph index. Returns 0 (the missing glyph) if the char is not mapped,
    /// including the case when it cannot be represented in the `cmap` subtable.
    ///
    /// # Errors
    ///
    /// Returns an error if the `cmap` table is malformed.
    pub fn map_char(&self, ch: char) -> Result<u16, ParseError> {
        match self.cmap.map_char(ch) {
            Ok(idx) => Ok(idx),
            Err(MapError::CharTooLarge) => Ok(0),
            Err(MapError::InvalidOffset | MapError::GlyphIdOverflow) => {
                Err(ParseError::new(ParseErrorKind::InvalidCharMapping(ch))
                    .with_table(TableTag::CMAP))
            }
        }
    }

    /// Lists all chars mapped to the glyphs satisfying `filter`, in the increasing char order.
    pub(crate) fn char_map(
        &self,
        filter: impl Fn(u16) -> bool,
    ) -> Result<Vec<(char, u16)>, ParseError> {
        let mut map = vec![];
        for ch in self.cmap.chars() {
            let glyph_idx = self.map_char(ch)?;
            if glyph_idx != 0 && glyph_idx < self.glyphs.glyph_count && filter(glyph_idx) {
                map.push((ch, glyph_idx));
            }
        }
        Ok(map)
    }

    pub(crate) fn raw_glyph(&self, glyph_idx: u16) -> Result<Glyph<'a>, ParseError> {
        self.glyphs.glyph(glyph_idx)
    }

    pub(crate) fn glyph(&self, glyph_idx: u16) -> Result<GlyphWithMetrics<'a>, ParseError> {
        let inner = self.raw_glyph(glyph_idx)?;
        let horizontal = self.hmtx.metrics(glyph_idx)?;
        let vertical = self
            .vertical
            .as_ref()
            .map(|(_, vmtx)| vmtx.metrics(glyph_idx))
            .transpose()?;
        Ok(GlyphWithMetrics {
            inner,
            horizontal,
            vertical,
        })
    }
}
