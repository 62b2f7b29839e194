//! Scan command - one full scan, review and submit cycle.

use std::path::PathBuf;
use std::str::FromStr;

use clap::Args;
use console::{Term, style};
use tracing::debug;

use bizscan_core::error::SessionError;
use bizscan_core::models::config::AppConfig;
use bizscan_core::{
    CanonicalField, HttpTransport, LanguageMode, ReviewSession, SessionState, SubmissionAdapter,
};

use super::config;
use super::extract::{Language, gateway, load_image, print_warnings, spinner};

/// Arguments for the scan command.
#[derive(Args)]
pub struct ScanArgs {
    /// Card image (PNG, JPEG, WebP, ...)
    #[arg(required = true)]
    input: PathBuf,

    /// Script to prefer for name and position (default from config)
    #[arg(short, long, value_enum)]
    language: Option<Language>,

    /// Override an extracted field before review
    #[arg(long = "set", value_name = "FIELD=VALUE")]
    set: Vec<String>,

    /// Submit without interactive review
    #[arg(short, long)]
    yes: bool,
}

/// What the user chose at the review prompt.
#[derive(Debug, PartialEq, Eq)]
enum ReviewAction {
    Edit(CanonicalField),
    Send,
    Cancel,
}

fn parse_action(input: &str) -> Option<ReviewAction> {
    match input.trim().to_lowercase().as_str() {
        "s" | "send" => Some(ReviewAction::Send),
        "c" | "cancel" | "q" => Some(ReviewAction::Cancel),
        other => other
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| CanonicalField::ALL.get(i).copied())
            .map(ReviewAction::Edit),
    }
}

fn parse_assignment(assignment: &str) -> anyhow::Result<(CanonicalField, String)> {
    let (key, value) = assignment
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("Expected FIELD=VALUE, got '{}'", assignment))?;
    let field = CanonicalField::from_str(key).map_err(anyhow::Error::msg)?;
    Ok((field, value.to_string()))
}

pub async fn run(args: ScanArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = config::load(&config::resolve_path(config_path))?;
    let language = args
        .language
        .map(LanguageMode::from)
        .unwrap_or(config.extraction.language);

    let assignments = args
        .set
        .iter()
        .map(|a| parse_assignment(a))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let term = Term::stdout();
    if !args.yes && !term.is_term() {
        anyhow::bail!("Interactive review needs a terminal. Use --yes to submit directly.");
    }

    let image = load_image(&args.input, &config.extraction)?;
    let gateway = gateway(&config.extraction)?;
    let adapter = SubmissionAdapter::new(HttpTransport::from_config(&config.http)?);

    let mut session = ReviewSession::new();

    let pb = spinner("Reading card...")?;
    let scanned = session.scan(&gateway, &image, language).await;
    pb.finish_and_clear();
    scanned?;

    if session.state() == SessionState::Error {
        return fail(&mut session);
    }

    for (field, value) in assignments {
        session.edit(field, value)?;
    }

    if args.yes {
        print_record(&session);
        submit(&mut session, &adapter, &config).await?;
    } else {
        review(&term, &mut session, &adapter, &config).await?;
    }

    match session.state() {
        SessionState::Success => {
            if let Some(receipt) = session.receipt() {
                println!(
                    "{} Sent {} field(s) via {} at {}",
                    style("✓").green(),
                    receipt.fields_sent,
                    receipt.method,
                    receipt.sent_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
            }
            println!("{}", serde_json::to_string_pretty(session.record())?);
            session.next_scan()?;
            Ok(())
        }
        SessionState::Error => fail(&mut session),
        SessionState::Idle => {
            println!("{} Discarded.", style("ℹ").blue());
            Ok(())
        }
        state => anyhow::bail!("Scan ended while {}", state),
    }
}

/// Acknowledge the error and exit with the user-facing message.
fn fail(session: &mut ReviewSession) -> anyhow::Result<()> {
    let message = session.error_message().unwrap_or_default().to_string();
    session.retry()?;
    anyhow::bail!(message)
}

async fn submit(
    session: &mut ReviewSession,
    adapter: &SubmissionAdapter<HttpTransport>,
    config: &AppConfig,
) -> anyhow::Result<()> {
    let pb = spinner("Sending...")?;
    let result = session.confirm(adapter, &config.submission).await;
    pb.finish_and_clear();
    result?;
    Ok(())
}

async fn review(
    term: &Term,
    session: &mut ReviewSession,
    adapter: &SubmissionAdapter<HttpTransport>,
    config: &AppConfig,
) -> anyhow::Result<()> {
    loop {
        print_record(session);
        term.write_str("[1-6] edit field, [s] send, [c] cancel: ")?;
        let input = term.read_line()?;

        match parse_action(&input) {
            Some(ReviewAction::Edit(field)) => {
                term.write_str(&format!("{}: ", field.label()))?;
                let value = term.read_line_initial_text(session.record().get(field))?;
                session.edit(field, value.trim())?;
            }
            Some(ReviewAction::Send) => match submit(session, adapter, config).await {
                Ok(()) => return Ok(()),
                Err(e) => match e.downcast_ref::<SessionError>() {
                    Some(SessionError::NotConfigured(method)) => {
                        debug!("Confirm refused: {}", e);
                        term.write_line(&format!(
                            "{} No destination set for {}. Configure it with 'bizscan config' and send again.",
                            style("!").yellow(),
                            method
                        ))?;
                    }
                    _ => return Err(e),
                },
            },
            Some(ReviewAction::Cancel) => {
                session.cancel()?;
                return Ok(());
            }
            None => term.write_line("Unknown choice.")?,
        }
    }
}

fn print_record(session: &ReviewSession) {
    println!();
    for (i, (field, value)) in session.record().fields().enumerate() {
        let shown = if value.is_empty() {
            style("(empty)".to_string()).dim()
        } else {
            style(value.to_string())
        };
        println!("  {}. {:<16} {}", i + 1, field.label(), shown);
    }
    println!();
    print_warnings(session.record());
}
