use core::{fmt, ops};

use crate::{OutputFormat, TableTag};

/// Kind of a font [`ParseError`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ParseErrorKind {
    /// Unexpected end of the font data.
    #[error("unexpected end of the font data")]
    UnexpectedEof,
    /// Unexpected sfnt version (e.g., a WOFF file or a font collection was supplied).
    #[error("unexpected font version ({0:#010x})")]
    UnexpectedFontVersion(u32),
    /// Missing required font table (e.g., `head`).
    #[error("missing required font table")]
    MissingTable,
    /// The same table is listed in the table directory more than once.
    #[error("font table is listed in the table directory more than once")]
    DuplicateTable,
    /// No supported subtable in the `cmap` table.
    #[error("no supported subtable in the `cmap` table")]
    NoSupportedCmap,
    /// Offset inferred from the table data is out of bounds.
    #[error("offset ({0}) inferred from the table data is out of bounds")]
    OffsetOutOfBounds(usize),
    /// Range inferred from the table data is out of bounds.
    #[error("range ({range:?}) inferred from the table data is out of bounds (..{len})")]
    RangeOutOfBounds {
        /// Inferred range.
        range: ops::Range<usize>,
        /// Length of the indexed data.
        len: usize,
    },
    /// Unexpected table version.
    #[error("unexpected table version ({0})")]
    UnexpectedTableVersion(u32),
    /// Unexpected table length.
    #[error("unexpected table length: expected {expected}, got {actual}")]
    UnexpectedTableLen {
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },
    /// Unexpected table format (e.g., for a `cmap` subtable).
    #[error("unexpected table format ({0})")]
    UnexpectedTableFormat(u16),
    /// Unexpected `indexToLocFormat` value in the `head` table.
    #[error("unexpected `loca` format ({0})")]
    UnexpectedLocaFormat(u16),
    /// `cmap` subtable maps a char to an invalid location or glyph index.
    #[error("`cmap` mapping for char {0:?} is invalid")]
    InvalidCharMapping(char),
    /// Simple glyph outline is malformed (e.g., its contour end points are not increasing).
    #[error("malformed glyph outline")]
    MalformedOutline,
    /// Glyph index is not less than the number of glyphs in the font.
    #[error("glyph index ({0}) is out of range")]
    GlyphOutOfRange(u32),
    /// A retained glyph refers to a glyph that is not retained.
    #[error("glyph {0} is referenced by a retained glyph, but is not retained itself")]
    UnretainedGlyph(u16),
}

/// Errors that can occur when parsing an OpenType font or its tables.
#[derive(Debug)]
pub struct ParseError {
    pub(crate) kind: ParseErrorKind,
    pub(crate) offset: usize,
    pub(crate) table: Option<TableTag>,
}

impl fmt::Display for ParseError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(table) = self.table {
            write!(formatter, "[{table}] ")?;
        }
        if self.offset > 0 {
            write!(formatter, "{}: ", self.offset)?;
        }
        fmt::Display::fmt(&self.kind, formatter)
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl ParseError {
    pub(crate) fn new(kind: ParseErrorKind) -> Self {
        Self {
            kind,
            offset: 0,
            table: None,
        }
    }

    pub(crate) fn missing_table(tag: TableTag) -> Self {
        Self::new(ParseErrorKind::MissingTable).with_table(tag)
    }

    pub(crate) fn with_table(mut self, tag: TableTag) -> Self {
        self.table = Some(tag);
        self
    }

    /// Gets the error kind.
    pub fn kind(&self) -> &ParseErrorKind {
        &self.kind
    }

    /// Gets the table this error relates to.
    pub fn table(&self) -> Option<TableTag> {
        self.table
    }

    /// Gets the offset in the font data (or in the table data if [`Self::table()`] is set).
    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// Errors mapping a char via the `cmap` table.
#[derive(Debug)]
pub(crate) enum MapError {
    /// Char cannot be represented by the subtable (e.g., a non-BMP char in a format 4 subtable).
    CharTooLarge,
    InvalidOffset,
    GlyphIdOverflow,
}

/// Errors produced by the subsetting stages of the pipeline.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SubsetError {
    /// Input bytes are not a parseable font container. This error is fatal for the whole run.
    #[error("input is not a parseable font: {0}")]
    Format(#[source] ParseError),
    /// A font table is malformed in a way that prevents safe glyph renumbering.
    /// The pipeline recovers by emitting the original font.
    #[error("cannot subset font: {0}")]
    Structural(#[source] ParseError),
}

/// Errors encoding a font into a specific [`OutputFormat`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum EncodeError {
    /// Encoder for the format has an unmet dependency in this build.
    #[error("{format} output requires {capability}, which is not available in this build")]
    MissingCapability {
        /// Format that was requested.
        format: OutputFormat,
        /// Human-readable description of the missing capability.
        capability: &'static str,
    },
    /// Format is not supported at all.
    #[error("{0} output is not supported")]
    NotImplemented(OutputFormat),
}
