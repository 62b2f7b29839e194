//! Extract command - read the fields of a card without submitting them.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Args, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use bizscan_core::models::config::ExtractionConfig;
use bizscan_core::{CanonicalField, CanonicalRecord, ExtractionGateway, GeminiGateway, ImageInput, LanguageMode};

use super::config;

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Card image (PNG, JPEG, WebP, ...)
    #[arg(required = true)]
    input: PathBuf,

    /// Script to prefer for name and position (default from config)
    #[arg(short, long, value_enum)]
    language: Option<Language>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Language {
    /// Vietnamese/English
    Latin,
    /// Korean
    Korean,
}

impl From<Language> for LanguageMode {
    fn from(language: Language) -> Self {
        match language {
            Language::Latin => LanguageMode::Latin,
            Language::Korean => LanguageMode::Korean,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

/// Read and downscale the card image.
pub fn load_image(path: &Path, config: &ExtractionConfig) -> anyhow::Result<ImageInput> {
    if !path.exists() {
        anyhow::bail!("Input file not found: {}", path.display());
    }
    let image = ImageInput::from_path(path)
        .with_context(|| format!("Failed to read image {}", path.display()))?
        .downscaled(config.max_image_size)?;
    info!("Loaded {} ({}, {} bytes)", path.display(), image.mime_type(), image.len());
    Ok(image)
}

/// Build the gateway, with a hint when no API key is available.
pub fn gateway(config: &ExtractionConfig) -> anyhow::Result<GeminiGateway> {
    GeminiGateway::from_config(config).with_context(|| {
        format!(
            "Set {} or 'bizscan config set extraction.api_key <KEY>'",
            config.api_key_env
        )
    })
}

pub fn spinner(message: &'static str) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

/// Print non-blocking review hints to stderr.
pub fn print_warnings(record: &CanonicalRecord) {
    for warning in record.review_warnings() {
        eprintln!("{} {}", style("!").yellow(), warning);
    }
}

pub async fn run(args: ExtractArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = config::load(&config::resolve_path(config_path))?;
    let language = args
        .language
        .map(LanguageMode::from)
        .unwrap_or(config.extraction.language);

    let image = load_image(&args.input, &config.extraction)?;
    let gateway = gateway(&config.extraction)?;

    let pb = spinner("Reading card...")?;
    let result = gateway.extract(&image, language).await;
    pb.finish_and_clear();
    let record = result?;

    print_warnings(&record);

    let output = format_record(&record, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    Ok(())
}

pub fn format_record(record: &CanonicalRecord, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(record)?),
        OutputFormat::Csv => format_csv(record),
        OutputFormat::Text => Ok(format_text(record)),
    }
}

fn format_csv(record: &CanonicalRecord) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record(CanonicalField::ALL.iter().map(|f| f.key()))?;
    wtr.write_record(record.fields().map(|(_, value)| value))?;

    Ok(String::from_utf8(wtr.into_inner()?)?)
}

pub fn format_text(record: &CanonicalRecord) -> String {
    let mut output = String::new();
    for (field, value) in record.fields() {
        output.push_str(&format!("{:<16} {}\n", format!("{}:", field.label()), value));
    }
    output
}
