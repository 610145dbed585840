//! Font subsetting and re-encoding for the web.
//!
//! The crate reduces a TrueType font to the glyphs needed to render a set of chars
//! and re-encodes the result as TTF / OTF, WOFF or WOFF2.
//!
//! # Overview
//!
//! - [`FontContainer`] is the sfnt table directory: it can be parsed from and serialized to bytes.
//! - [`Font`] is a structured view over the container tables required for subsetting.
//! - [`RetainedSet`] is the glyph closure for a set of chars; it accounts for composite glyphs
//!   and `GSUB` substitutions.
//! - [`FontSubset`] rewrites font tables so that only retained glyphs remain.
//! - [`OutputFormat`] encodes a container into one of the supported formats.
//! - [`run()`] ties all of these together, reporting progress as a sequence of [`Event`]s.
//!
//! # Crate features
//!
//! ## `woff2`
//!
//! *(On by default)*
//!
//! Enables WOFF2 output, which requires Brotli compression. If the feature is disabled,
//! requesting [`OutputFormat::Woff2`] results in [`EncodeError::MissingCapability`].
//!
//! # Examples
//!
//! ```no_run
//! use font_slim::{run, OutputFormat, Request};
//!
//! let font_bytes = std::fs::read("font.ttf")?;
//! let request = Request::new(&font_bytes)
//!     .with_custom_chars("Hello, world!")
//!     .with_formats([OutputFormat::Ttf, OutputFormat::Woff2]);
//! let report = run(&request)?;
//! for artifact in &report.artifacts {
//!     println!("{}: {} bytes", artifact.format, artifact.len());
//! }
//! # Ok::<_, Box<dyn std::error::Error>>(())
//! ```

#![doc(html_root_url = "https://docs.rs/font-slim/0.1.0")]

mod charset;
mod closure;
mod container;
mod errors;
mod font;
mod format;
mod pipeline;
mod subset;
#[cfg(test)]
pub(crate) mod tests;
mod write;

#[cfg(doctest)]
doc_comment::doctest!("../README.md");

pub use crate::{
    charset::resolve_chars,
    closure::{GlyphRenumbering, RetainedSet},
    container::{FontContainer, TableTag},
    errors::{EncodeError, ParseError, ParseErrorKind, SubsetError},
    font::{Font, FontNames},
    format::{EncodeFn, EncodeOptions, OutputArtifact, OutputFormat, ParseFormatError},
    pipeline::{run, run_with_observer, Event, Level, Options, Report, Request, Stage},
    subset::FontSubset,
};
