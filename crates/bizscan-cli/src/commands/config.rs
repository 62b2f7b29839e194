//! Config command - manage configuration.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand, ValueEnum};
use console::style;

use bizscan_core::models::config::{AppConfig, SubmissionMethod};
use bizscan_core::{CanonicalField, apps_script_template, parse_prefilled_link};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Show current configuration
    Show,

    /// Initialize a new configuration file
    Init(InitArgs),

    /// Get a specific configuration value
    Get {
        /// Configuration key (e.g., "submission.webhookUrl")
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// New value
        value: String,
    },

    /// Show configuration file path
    Path,

    /// Check the submission settings
    Validate,

    /// Build the form mapping from a prefilled form link
    ParseLink {
        /// Prefilled link copied from the form editor
        url: String,

        /// Store the mapping and form URL in the config file
        #[arg(long)]
        save: bool,
    },

    /// Switch the active submission method
    Use {
        #[arg(value_enum)]
        method: Method,
    },

    /// Print an Apps Script webhook receiver for the current webhook mapping
    AppsScript,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Method {
    /// Multipart post to a Google Form
    GoogleForm,
    /// JSON post to a webhook
    Webhook,
}

impl From<Method> for SubmissionMethod {
    fn from(method: Method) -> Self {
        match method {
            Method::GoogleForm => SubmissionMethod::GoogleForm,
            Method::Webhook => SubmissionMethod::Webhook,
        }
    }
}

#[derive(Args)]
struct InitArgs {
    /// Output path for configuration file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overwrite existing file
    #[arg(long)]
    force: bool,
}

pub fn run(args: ConfigArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let path = resolve_path(config_path);
    match args.command {
        ConfigCommand::Show => show_config(&path),
        ConfigCommand::Init(init_args) => init_config(init_args, &path),
        ConfigCommand::Get { key } => get_config(&path, &key),
        ConfigCommand::Set { key, value } => set_config(&path, &key, &value),
        ConfigCommand::Path => show_path(&path),
        ConfigCommand::Validate => validate_config(&path),
        ConfigCommand::ParseLink { url, save } => parse_link(&path, &url, save),
        ConfigCommand::Use { method } => use_method(&path, method.into()),
        ConfigCommand::AppsScript => apps_script(&path),
    }
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bizscan")
        .join("config.json")
}

/// The config file in use: `--config` if given, else the default location.
pub fn resolve_path(config_path: Option<&str>) -> PathBuf {
    config_path.map(PathBuf::from).unwrap_or_else(default_config_path)
}

/// Load the config file, falling back to defaults when it does not exist.
pub fn load(path: &Path) -> anyhow::Result<AppConfig> {
    if path.exists() {
        Ok(AppConfig::from_file(path)?)
    } else {
        Ok(AppConfig::default())
    }
}

fn save(config: &AppConfig, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    config.save(path)?;
    Ok(())
}

fn show_config(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        eprintln!(
            "{} No config file found, showing defaults.",
            style("ℹ").blue()
        );
    }
    let config = load(path)?;

    println!("{}", serde_json::to_string_pretty(&config)?);

    Ok(())
}

fn init_config(args: InitArgs, path: &Path) -> anyhow::Result<()> {
    let output_path = args.output.unwrap_or_else(|| path.to_path_buf());

    if output_path.exists() && !args.force {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            output_path.display()
        );
    }

    save(&AppConfig::default(), &output_path)?;

    println!(
        "{} Created configuration file at {}",
        style("✓").green(),
        output_path.display()
    );

    Ok(())
}

fn get_config(path: &Path, key: &str) -> anyhow::Result<()> {
    let json = serde_json::to_value(load(path)?)?;

    let mut current = &json;
    for part in key.split('.') {
        current = current
            .get(part)
            .ok_or_else(|| anyhow::anyhow!("Configuration key not found: {}", key))?;
    }

    println!("{}", serde_json::to_string_pretty(current)?);

    Ok(())
}

fn set_config(path: &Path, key: &str, value: &str) -> anyhow::Result<()> {
    let config = load(path)?;

    // Values that are not valid JSON are taken as plain strings.
    let parsed_value: serde_json::Value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));

    let mut json = serde_json::to_value(&config)?;

    let parts: Vec<&str> = key.split('.').collect();
    let mut current = &mut json;

    for (i, part) in parts.iter().enumerate() {
        if i == parts.len() - 1 {
            if let Some(obj) = current.as_object_mut() {
                obj.insert((*part).to_string(), parsed_value.clone());
            } else {
                anyhow::bail!("Cannot set value at non-object path");
            }
        } else {
            current = current
                .get_mut(*part)
                .ok_or_else(|| anyhow::anyhow!("Configuration path not found: {}", key))?;
        }
    }

    let config: AppConfig = serde_json::from_value(json)?;
    save(&config, path)?;

    println!(
        "{} Set {} = {}",
        style("✓").green(),
        key,
        serde_json::to_string(&parsed_value)?
    );

    Ok(())
}

fn show_path(path: &Path) -> anyhow::Result<()> {
    println!("Configuration file: {}", path.display());

    if path.exists() {
        println!("Status: {}", style("exists").green());
    } else {
        println!("Status: {}", style("not created").yellow());
        println!();
        println!("Run 'bizscan config init' to create a configuration file.");
    }

    Ok(())
}

/// Print submission issues; returns whether any of them is an error.
fn report_issues(config: &AppConfig) -> bool {
    let issues = config.submission.validate();
    for issue in &issues {
        if issue.is_error() {
            eprintln!("{} {}", style("✗").red(), issue.message);
        } else {
            eprintln!("{} {}", style("!").yellow(), issue.message);
        }
    }
    issues.iter().any(|i| i.is_error())
}

fn validate_config(path: &Path) -> anyhow::Result<()> {
    let config = load(path)?;

    if report_issues(&config) {
        anyhow::bail!("Submission settings for {} are incomplete", config.submission.method);
    }

    println!(
        "{} Submission via {} to {}",
        style("✓").green(),
        config.submission.method,
        config.submission.destination_url()
    );

    Ok(())
}

fn parse_link(path: &Path, url: &str, save_result: bool) -> anyhow::Result<()> {
    let parsed = parse_prefilled_link(url)?;

    println!("Form URL: {}", parsed.form_url);
    for field in CanonicalField::ALL {
        let target = parsed.mapping.get(field);
        if target.is_empty() {
            println!("  {:<20} {}", field.label(), style("(not found)").dim());
        } else {
            println!("  {:<20} {}", field.label(), target);
        }
    }
    for entry in &parsed.unassigned {
        println!(
            "{} {} did not match any field; assign it with 'bizscan config set'",
            style("!").yellow(),
            entry
        );
    }

    if save_result {
        let mut config = load(path)?;
        config.submission.apply_parsed_link(&parsed);
        save(&config, path)?;
        println!(
            "{} Saved form mapping to {}",
            style("✓").green(),
            path.display()
        );
        if config.submission.method != SubmissionMethod::GoogleForm {
            println!("Run 'bizscan config use google-form' to submit to this form.");
        }
    }

    Ok(())
}

fn use_method(path: &Path, method: SubmissionMethod) -> anyhow::Result<()> {
    let mut config = load(path)?;
    config.submission.method = method;
    save(&config, path)?;

    println!("{} Submitting via {}", style("✓").green(), method);
    report_issues(&config);

    Ok(())
}

fn apps_script(path: &Path) -> anyhow::Result<()> {
    let config = load(path)?;
    print!("{}", apps_script_template(&config.submission.webhook_mapping));
    Ok(())
}
