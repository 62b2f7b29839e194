//! Payload command - show what a record would be submitted as.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use console::style;

use bizscan_core::{CanonicalRecord, Payload, build_payload};

use super::config;

/// Arguments for the payload command.
#[derive(Args)]
pub struct PayloadArgs {
    /// Record JSON file (as written by 'bizscan extract')
    #[arg(required = true)]
    record: PathBuf,
}

pub fn run(args: PayloadArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = config::load(&config::resolve_path(config_path))?;

    let content = fs::read_to_string(&args.record)
        .with_context(|| format!("Failed to read {}", args.record.display()))?;
    let record: CanonicalRecord = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a record", args.record.display()))?;

    let submission = &config.submission;
    if submission.is_configured() {
        eprintln!(
            "{} POST {} ({})",
            style("ℹ").blue(),
            submission.destination_url(),
            submission.method
        );
    } else {
        eprintln!(
            "{} No destination set for {}; nothing would be sent.",
            style("!").yellow(),
            submission.method
        );
    }

    match build_payload(&record, submission) {
        Payload::Form(form) => {
            if form.is_empty() {
                eprintln!(
                    "{} No form fields are mapped; run 'bizscan config parse-link'.",
                    style("!").yellow()
                );
            }
            for (name, value) in form.fields() {
                println!("{}={}", name, value);
            }
        }
        Payload::Webhook(webhook) => println!("{}", webhook.to_json()),
    }

    Ok(())
}
