//! Command-line front end for `font-slim`.

use std::{
    borrow::Cow,
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::Context as _;
use clap::Parser;
use font_slim::{EncodeOptions, Event, FontNames, Options, OutputFormat, Request};

use crate::fetch::{fetch_text, FETCH_TIMEOUT};

mod fetch;

/// Subsets a TrueType font to the specified chars and writes it in web-friendly formats.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Font file to subset.
    font: PathBuf,
    /// Chars to retain in the subset.
    #[arg(short, long, default_value = "")]
    chars: String,
    /// File with additional chars to retain (e.g., text of a web page).
    #[arg(long)]
    chars_file: Option<PathBuf>,
    /// `http://` URL of a document with additional chars to retain. The fetch times out
    /// after 10 seconds.
    #[arg(long)]
    chars_url: Option<String>,
    /// Output formats (ttf, otf, woff, woff2, svg, eot).
    #[arg(
        short,
        long = "format",
        value_delimiter = ',',
        default_values_t = [OutputFormat::Ttf, OutputFormat::Woff2]
    )]
    formats: Vec<OutputFormat>,
    /// Output directory. Defaults to `result` in the font directory.
    #[arg(short, long)]
    out_dir: Option<PathBuf>,
    /// Encode output formats in parallel.
    #[arg(long)]
    parallel: bool,
    /// Store the `glyf` table untransformed in WOFF2 output.
    #[arg(long)]
    no_glyf_transform: bool,
    /// Brotli quality for WOFF2 output.
    #[arg(long, default_value_t = 11, value_parser = clap::value_parser!(u8).range(0..=11))]
    brotli_quality: u8,
    /// Increases logging verbosity; can be specified multiple times.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }

    fn out_dir(&self) -> PathBuf {
        self.out_dir.clone().unwrap_or_else(|| {
            let font_dir = self.font.parent().unwrap_or(Path::new("."));
            font_dir.join("result")
        })
    }

    fn output_stem(&self) -> Cow<'_, str> {
        self.font
            .file_stem()
            .map_or(Cow::Borrowed("font"), |stem| stem.to_string_lossy())
    }

    /// Returns the family and full font names, falling back to the font file stem
    /// and to the family name respectively.
    fn display_names(&self, names: &FontNames) -> (String, String) {
        let family = names
            .family
            .clone()
            .unwrap_or_else(|| self.output_stem().into_owned());
        let full = names.full.clone().unwrap_or_else(|| family.clone());
        (family, full)
    }

    /// Reads the chars file. Failures are logged and do not abort the run.
    fn read_chars_file(&self) -> Option<String> {
        let path = self.chars_file.as_ref()?;
        match fs::read_to_string(path) {
            Ok(text) => Some(text),
            Err(err) => {
                log::error!(
                    "failed reading chars from {}: {err}; proceeding without them",
                    path.display()
                );
                None
            }
        }
    }

    /// Fetches the chars URL. Failures are logged and do not abort the run.
    fn fetch_chars_url(&self) -> Option<String> {
        let url = self.chars_url.as_ref()?;
        match fetch_text(url, FETCH_TIMEOUT) {
            Ok(text) => Some(text),
            Err(err) => {
                log::error!("failed fetching chars from {url}: {err:#}; proceeding without them");
                None
            }
        }
    }

    /// Combines chars from the chars file and the chars URL.
    fn remote_chars(&self) -> Option<String> {
        match (self.read_chars_file(), self.fetch_chars_url()) {
            (Some(mut file_chars), Some(url_chars)) => {
                file_chars.push_str(&url_chars);
                Some(file_chars)
            }
            (file_chars, url_chars) => file_chars.or(url_chars),
        }
    }

    fn options(&self) -> Options {
        Options {
            parallel_encoding: self.parallel,
            encode: EncodeOptions {
                transform_glyf: !self.no_glyf_transform,
                brotli_quality: self.brotli_quality,
                ..EncodeOptions::default()
            },
        }
    }

    /// Returns paths of the written files. An empty list means that no fonts were produced.
    fn run(&self) -> anyhow::Result<Vec<PathBuf>> {
        let font = fs::read(&self.font)
            .with_context(|| format!("failed reading font from {}", self.font.display()))?;
        let remote_chars = self.remote_chars();
        let request = Request::new(&font)
            .with_remote_chars(remote_chars.as_deref())
            .with_custom_chars(&self.chars)
            .with_formats(self.formats.iter().copied())
            .with_options(self.options());

        let report = font_slim::run_with_observer(&request, |event: &Event| {
            log::debug!("progress: {}%", event.percent);
        })?;
        let (family, full_name) = self.display_names(&report.metadata);
        log::info!("font: {full_name} (family: {family})");
        if !report.is_success() {
            return Ok(vec![]);
        }

        let out_dir = self.out_dir();
        fs::create_dir_all(&out_dir)
            .with_context(|| format!("failed creating output dir {}", out_dir.display()))?;
        let stem = self.output_stem();
        let mut written = Vec::with_capacity(report.artifacts.len());
        for artifact in &report.artifacts {
            let path = out_dir.join(format!("{stem}-subset.{}", artifact.format.extension()));
            fs::write(&path, &artifact.data)
                .with_context(|| format!("failed writing {}", path.display()))?;
            println!("{}: {} bytes", path.display(), artifact.len());
            written.push(path);
        }
        Ok(written)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, args.log_filter()),
    );

    match args.run() {
        Ok(written) if !written.is_empty() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
