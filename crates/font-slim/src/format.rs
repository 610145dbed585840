//! Output formats and their encoders.

use core::{fmt, str::FromStr};

use crate::{errors::EncodeError, write, FontContainer};

/// Distribution format of an output font.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum OutputFormat {
    /// TrueType font (`.ttf`).
    Ttf,
    /// The same bytes as [`Self::Ttf`] with the `.otf` extension. No CFF conversion is performed.
    Otf,
    /// WOFF 1.0 (zlib-compressed tables).
    Woff,
    /// WOFF 2.0 (Brotli-compressed, with an optionally transformed `glyf` table).
    Woff2,
    /// SVG font. Not supported.
    Svg,
    /// Embedded OpenType. Not supported.
    Eot,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Ttf => "TTF",
            Self::Otf => "OTF",
            Self::Woff => "WOFF",
            Self::Woff2 => "WOFF2",
            Self::Svg => "SVG",
            Self::Eot => "EOT",
        })
    }
}

/// Error parsing an [`OutputFormat`] from a string.
#[derive(Debug, thiserror::Error)]
#[error("unknown output format `{0}`; expected one of ttf, otf, woff, woff2, svg, eot")]
pub struct ParseFormatError(String);

impl FromStr for OutputFormat {
    type Err = ParseFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.extension().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseFormatError(s.to_owned()))
    }
}

/// Options for [`OutputFormat::encode()`].
#[derive(Debug, Clone, Copy)]
pub struct EncodeOptions {
    /// Store the `glyf` table transformed in WOFF2 output. Default: `true`.
    pub transform_glyf: bool,
    /// Brotli quality for WOFF2 output (0..=11). Default: 11.
    pub brotli_quality: u8,
    /// zlib compression level for WOFF output (0..=10). Default: 9.
    pub woff_compression: u8,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            transform_glyf: true,
            brotli_quality: 11,
            woff_compression: 9,
        }
    }
}

/// Encoder function for a specific format.
pub type EncodeFn = fn(&FontContainer, &EncodeOptions) -> Result<Vec<u8>, EncodeError>;

fn encode_sfnt(container: &FontContainer, _: &EncodeOptions) -> Result<Vec<u8>, EncodeError> {
    Ok(container.serialize())
}

fn encode_woff(container: &FontContainer, options: &EncodeOptions) -> Result<Vec<u8>, EncodeError> {
    Ok(write::encode_woff(container, options.woff_compression))
}

#[cfg(feature = "woff2")]
fn encode_woff2(
    container: &FontContainer,
    options: &EncodeOptions,
) -> Result<Vec<u8>, EncodeError> {
    Ok(write::encode_woff2(
        container,
        options.brotli_quality,
        options.transform_glyf,
    ))
}

#[cfg(not(feature = "woff2"))]
fn encode_woff2(_: &FontContainer, _: &EncodeOptions) -> Result<Vec<u8>, EncodeError> {
    Err(EncodeError::MissingCapability {
        format: OutputFormat::Woff2,
        capability: "Brotli compression (the `woff2` crate feature)",
    })
}

fn encode_svg(_: &FontContainer, _: &EncodeOptions) -> Result<Vec<u8>, EncodeError> {
    Err(EncodeError::NotImplemented(OutputFormat::Svg))
}

fn encode_eot(_: &FontContainer, _: &EncodeOptions) -> Result<Vec<u8>, EncodeError> {
    Err(EncodeError::NotImplemented(OutputFormat::Eot))
}

impl OutputFormat {
    /// All formats in the canonical order.
    pub const ALL: [Self; 6] = [
        Self::Ttf,
        Self::Otf,
        Self::Woff,
        Self::Woff2,
        Self::Svg,
        Self::Eot,
    ];

    /// Returns the file extension for this format (without the leading dot).
    pub fn extension(self) -> &'static str {
        match self {
            Self::Ttf => "ttf",
            Self::Otf => "otf",
            Self::Woff => "woff",
            Self::Woff2 => "woff2",
            Self::Svg => "svg",
            Self::Eot => "eot",
        }
    }

    /// Returns the encoder for this format.
    pub fn encoder(self) -> EncodeFn {
        match self {
            Self::Ttf | Self::Otf => encode_sfnt,
            Self::Woff => encode_woff,
            Self::Woff2 => encode_woff2,
            Self::Svg => encode_svg,
            Self::Eot => encode_eot,
        }
    }

    /// Encodes `container` in this format.
    ///
    /// # Errors
    ///
    /// Returns an error if the format is not supported, or is not available in this build.
    pub fn encode(
        self,
        container: &FontContainer,
        options: &EncodeOptions,
    ) -> Result<Vec<u8>, EncodeError> {
        (self.encoder())(container, options)
    }
}

/// Encoded font in a specific format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    /// Format of the data.
    pub format: OutputFormat,
    /// Encoded font data.
    pub data: Vec<u8>,
}

impl OutputArtifact {
    /// Returns the length of the encoded data in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Checks whether the encoded data is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
