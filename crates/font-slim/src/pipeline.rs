//! Subsetting pipeline: parse, extract names, resolve chars, compute closure, rewrite and encode.

use std::{collections::BTreeSet, fmt, panic, thread};

use crate::{
    charset::resolve_chars,
    errors::{EncodeError, SubsetError},
    format::{EncodeOptions, OutputArtifact, OutputFormat},
    Font, FontContainer, FontNames, FontSubset, ParseError, RetainedSet, TableTag,
};

/// Pipeline stage an [`Event`] relates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Stage {
    /// Parsing the input font.
    Load,
    /// Extracting font names.
    Metadata,
    /// Resolving the set of chars.
    Charset,
    /// Computing the glyph closure.
    Closure,
    /// Rewriting font tables.
    Rewrite,
    /// Encoding output formats.
    Encode,
    /// Pipeline has finished.
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Load => "load",
            Self::Metadata => "metadata",
            Self::Charset => "charset",
            Self::Closure => "closure",
            Self::Rewrite => "rewrite",
            Self::Encode => "encode",
            Self::Done => "done",
        })
    }
}

/// Severity of an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// Informational message.
    Info,
    /// Recovered problem (e.g., subsetting was skipped).
    Warn,
    /// Failure of a single output format.
    Error,
}

impl From<Level> for log::Level {
    fn from(level: Level) -> Self {
        match level {
            Level::Info => Self::Info,
            Level::Warn => Self::Warn,
            Level::Error => Self::Error,
        }
    }
}

/// Progress / log event emitted by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Stage the event relates to.
    pub stage: Stage,
    /// Overall progress in percent (0..=100). Never decreases during a run.
    pub percent: u8,
    /// Event severity.
    pub level: Level,
    /// Human-readable message.
    pub message: String,
}

/// Options for [`run()`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    /// Encode output formats on separate threads.
    pub parallel_encoding: bool,
    /// Options passed to encoders.
    pub encode: EncodeOptions,
}

/// Input for a pipeline [`run()`].
#[derive(Debug, Clone)]
pub struct Request<'a> {
    font: &'a [u8],
    remote_chars: Option<&'a str>,
    custom_chars: &'a str,
    formats: Vec<OutputFormat>,
    options: Options,
}

impl<'a> Request<'a> {
    /// Creates a request for the specified font data. By default, no chars and no formats are requested.
    pub fn new(font: &'a [u8]) -> Self {
        Self {
            font,
            remote_chars: None,
            custom_chars: "",
            formats: vec![],
            options: Options::default(),
        }
    }

    /// Sets the fetched char list text.
    #[must_use]
    pub fn with_remote_chars(mut self, text: Option<&'a str>) -> Self {
        self.remote_chars = text;
        self
    }

    /// Sets user-supplied chars.
    #[must_use]
    pub fn with_custom_chars(mut self, text: &'a str) -> Self {
        self.custom_chars = text;
        self
    }

    /// Sets output formats. Duplicate formats are ignored.
    #[must_use]
    pub fn with_formats(mut self, formats: impl IntoIterator<Item = OutputFormat>) -> Self {
        self.formats.clear();
        for format in formats {
            if !self.formats.contains(&format) {
                self.formats.push(format);
            }
        }
        self
    }

    /// Sets pipeline options.
    #[must_use]
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Returns deduplicated output formats in the order of their first occurrence.
    pub fn formats(&self) -> &[OutputFormat] {
        &self.formats
    }
}

/// Result of a pipeline [`run()`].
#[derive(Debug)]
pub struct Report {
    /// Produced artifacts in the order formats were requested.
    pub artifacts: Vec<OutputArtifact>,
    /// Names extracted from the input font.
    pub metadata: FontNames,
    /// All events emitted during the run.
    pub events: Vec<Event>,
    /// Formats that failed to encode, together with the failure reason.
    pub failures: Vec<(OutputFormat, EncodeError)>,
    /// Whether artifacts contain the subsetted font (as opposed to the original one).
    pub subsetted: bool,
}

impl Report {
    /// Checks whether at least one artifact was produced.
    pub fn is_success(&self) -> bool {
        !self.artifacts.is_empty()
    }

    /// Returns an aggregated failure message if no artifacts were produced.
    pub fn failure_message(&self) -> Option<String> {
        if self.is_success() {
            return None;
        }
        if self.failures.is_empty() {
            return Some("no output formats were requested".to_owned());
        }
        let reasons: Vec<_> = self
            .failures
            .iter()
            .map(|(format, err)| format!("{format}: {err}"))
            .collect();
        Some(format!("no fonts were produced ({})", reasons.join("; ")))
    }
}

/// Sequence of events with non-decreasing progress percentage.
struct EventLog<'a> {
    events: Vec<Event>,
    percent: u8,
    observer: &'a mut dyn FnMut(&Event),
}

impl fmt::Debug for EventLog<'_> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("EventLog")
            .field("events", &self.events)
            .field("percent", &self.percent)
            .finish_non_exhaustive()
    }
}

impl<'a> EventLog<'a> {
    fn new(observer: &'a mut dyn FnMut(&Event)) -> Self {
        Self {
            events: vec![],
            percent: 0,
            observer,
        }
    }

    fn push(&mut self, stage: Stage, percent: u8, level: Level, message: String) {
        self.percent = self.percent.max(percent.min(100));
        log::log!(target: "font_slim", level.into(), "[{stage}] {message}");
        let event = Event {
            stage,
            percent: self.percent,
            level,
            message,
        };
        (self.observer)(&event);
        self.events.push(event);
    }

    fn info(&mut self, stage: Stage, percent: u8, message: String) {
        self.push(stage, percent, Level::Info, message);
    }

    fn warn(&mut self, stage: Stage, percent: u8, message: String) {
        self.push(stage, percent, Level::Warn, message);
    }
}

const LOAD_PERCENT: u8 = 5;
const METADATA_PERCENT: u8 = 10;
const CHARSET_PERCENT: u8 = 30;
const CLOSURE_PERCENT: u8 = 35;
const REWRITE_PERCENT: u8 = 45;
const ENCODE_START_PERCENT: u8 = 50;
const ENCODE_END_PERCENT: u8 = 95;

/// Computes the subset. Returns `Ok(None)` if no requested char is mapped to a glyph.
fn subset_container(
    container: &FontContainer,
    chars: &BTreeSet<char>,
    events: &mut EventLog<'_>,
) -> Result<Option<FontContainer>, ParseError> {
    // CFF outlines are not subsetted.
    if !container.has_truetype_outlines() {
        return Err(ParseError::missing_table(TableTag::GLYF));
    }
    let font = Font::new(container)?;
    let retained = RetainedSet::compute(&font, chars)?;
    if !retained.has_mapped_glyphs() {
        return Ok(None);
    }
    events.info(
        Stage::Closure,
        CLOSURE_PERCENT,
        format!(
            "retained {} of {} glyphs",
            retained.len(),
            font.glyph_count()
        ),
    );

    let subset = FontSubset::new(font, &retained)?;
    let container = subset.to_container()?;
    events.info(
        Stage::Rewrite,
        REWRITE_PERCENT,
        format!(
            "rewritten font has {} glyphs and {} tables",
            subset.glyph_count(),
            container.tags().len()
        ),
    );
    Ok(Some(container))
}

fn encode_all(
    container: &FontContainer,
    formats: &[OutputFormat],
    options: &Options,
) -> Vec<Result<Vec<u8>, EncodeError>> {
    if !options.parallel_encoding || formats.len() < 2 {
        return formats
            .iter()
            .map(|format| format.encode(container, &options.encode))
            .collect();
    }

    thread::scope(|scope| {
        let handles: Vec<_> = formats
            .iter()
            .map(|&format| scope.spawn(move || format.encode(container, &options.encode)))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or_else(|err| panic::resume_unwind(err)))
            .collect()
    })
}

/// Runs the pipeline without observing events as they occur.
///
/// # Errors
///
/// Returns an error only if the input font cannot be parsed. All other problems are recovered from,
/// and are reported as [`Event`]s and [`Report::failures`].
pub fn run(request: &Request<'_>) -> Result<Report, SubsetError> {
    run_with_observer(request, |_| { /* do nothing */ })
}

/// Runs the pipeline, passing each event to `observer` as soon as it is emitted.
///
/// # Errors
///
/// Returns an error only if the input font cannot be parsed.
pub fn run_with_observer(
    request: &Request<'_>,
    mut observer: impl FnMut(&Event),
) -> Result<Report, SubsetError> {
    let mut events = EventLog::new(&mut observer);

    let original = match FontContainer::parse(request.font) {
        Ok(container) => container,
        Err(err) => {
            let err = SubsetError::Format(err);
            events.push(Stage::Load, 0, Level::Error, err.to_string());
            return Err(err);
        }
    };
    events.info(
        Stage::Load,
        LOAD_PERCENT,
        format!(
            "loaded font ({} bytes, {} tables)",
            request.font.len(),
            original.tags().len()
        ),
    );

    let metadata = FontNames::extract(&original);
    events.info(
        Stage::Metadata,
        METADATA_PERCENT,
        format!(
            "font family: {}, full name: {}",
            metadata.family.as_deref().unwrap_or("(none)"),
            metadata.full.as_deref().unwrap_or("(none)")
        ),
    );

    let chars = resolve_chars(request.remote_chars, request.custom_chars);
    let subset = if chars.is_empty() {
        events.warn(
            Stage::Charset,
            CHARSET_PERCENT,
            "no chars requested; subsetting is skipped".to_owned(),
        );
        None
    } else {
        events.info(
            Stage::Charset,
            CHARSET_PERCENT,
            format!("{} distinct chars requested", chars.len()),
        );
        match subset_container(&original, &chars, &mut events) {
            Ok(Some(container)) => Some(container),
            Ok(None) => {
                events.warn(
                    Stage::Closure,
                    CLOSURE_PERCENT,
                    "none of the requested chars is mapped by the font; subsetting is skipped"
                        .to_owned(),
                );
                None
            }
            Err(err) => {
                let err = SubsetError::Structural(err);
                events.warn(
                    Stage::Rewrite,
                    REWRITE_PERCENT,
                    format!("{err}; falling back to the original font"),
                );
                None
            }
        }
    };
    let subsetted = subset.is_some();
    let container = subset.as_ref().unwrap_or(&original);

    let formats = request.formats();
    let results = encode_all(container, formats, &request.options);
    let mut artifacts = Vec::with_capacity(formats.len());
    let mut failures = vec![];
    let format_count = formats.len();
    for (i, (&format, result)) in formats.iter().zip(results).enumerate() {
        let span = usize::from(ENCODE_END_PERCENT - ENCODE_START_PERCENT);
        let percent = usize::from(ENCODE_START_PERCENT) + span * (i + 1) / format_count;
        let percent = u8::try_from(percent).unwrap_or(ENCODE_END_PERCENT);
        match result {
            Ok(data) => {
                events.info(
                    Stage::Encode,
                    percent,
                    format!("encoded {format} ({} bytes)", data.len()),
                );
                artifacts.push(OutputArtifact { format, data });
            }
            Err(err) => {
                let level = match &err {
                    EncodeError::NotImplemented(_) => Level::Warn,
                    _ => Level::Error,
                };
                events.push(Stage::Encode, percent, level, err.to_string());
                failures.push((format, err));
            }
        }
    }

    let mut report = Report {
        artifacts,
        metadata,
        events: vec![],
        failures,
        subsetted,
    };
    if let Some(message) = report.failure_message() {
        events.push(Stage::Done, 100, Level::Error, message);
    } else {
        events.info(
            Stage::Done,
            100,
            format!("produced {} font(s)", report.artifacts.len()),
        );
    }
    report.events = events.events;
    Ok(report)
}
