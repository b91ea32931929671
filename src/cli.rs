use crate::case::{CaseArtifact, CaseField, CaseRequest, RenderStatus};
use crate::config::Config;
use crate::error::PipelineError;
use crate::pipeline::{PipelineStage, StageListener};
use crate::setup::{ArtifactToggles, PipelineSetupService};
use crate::voice::Voice;
use crate::{log_debug, ui};

use anyhow::{Context, Result};
use clap::builder::{Styles, styling::AnsiColor};
use clap::{Args, Parser, Subcommand, crate_version};
use colored::Colorize;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const LOG_FILE: &str = "physiocase-debug.log";
const DEFAULT_OUTPUT_DIR: &str = "physiocase-output";

/// CLI structure defining the available commands and global arguments
#[derive(Parser)]
#[command(
    author,
    version = crate_version!(),
    about = "physiocase: evidence-augmented physiotherapy case studies",
    long_about = "Generate teaching case studies for physiotherapy students, optionally grounded in recent systematic reviews, with narrated audio, illustrations and a PDF handout.",
    disable_version_flag = true,
    after_help = get_dynamic_help(),
    styles = get_styles(),
)]
pub struct Cli {
    /// Subcommands available for the CLI
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Log debug messages to a file
    #[arg(
        short = 'l',
        long = "log",
        global = true,
        help = "Log debug messages to a file"
    )]
    pub log: bool,

    /// Specify a custom log file path
    #[arg(
        long = "log-file",
        global = true,
        help = "Specify a custom log file path"
    )]
    pub log_file: Option<String>,

    /// Mirror log lines to stderr
    #[arg(long = "log-stderr", global = true, help = "Mirror log lines to stderr")]
    pub log_stderr: bool,

    /// Suppress non-essential output (spinners, waiting messages, etc.)
    #[arg(
        short = 'q',
        long = "quiet",
        global = true,
        help = "Suppress non-essential output"
    )]
    pub quiet: bool,

    /// Display the version
    #[arg(
        short = 'v',
        long = "version",
        global = true,
        help = "Display the version"
    )]
    pub version: bool,
}

/// Enumeration of available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Generate a case study
    #[command(
        about = "Generate a physiotherapy case study",
        long_about = "Generate a case study for SUBJECT, then narrate, illustrate and typeset it. Missing artifacts do not fail the command."
    )]
    Generate(GenerateArgs),

    /// List narration voices
    #[command(about = "List available narration voices")]
    Voices,

    /// Show or update configuration
    #[command(about = "Show or update configuration")]
    Config {
        /// Print the effective configuration
        #[arg(short, long, help = "Print the effective configuration")]
        show: bool,

        /// Set the text generation model
        #[arg(long, help = "Set the text generation model")]
        model: Option<String>,

        /// Set the sampling temperature
        #[arg(long, help = "Set the sampling temperature (0.0 to 2.0)")]
        temperature: Option<f64>,

        /// Set the number of literature records per prompt
        #[arg(long, help = "Set the number of literature records per prompt")]
        max_results: Option<usize>,
    },
}

/// Arguments of the `generate` command
#[derive(Args, Clone, Debug, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct GenerateArgs {
    /// Condition or scenario, e.g. "frozen shoulder"
    pub subject: String,

    /// Narration voice
    #[arg(long, help = "Narration voice (see 'physiocase voices')")]
    pub voice: Option<String>,

    #[arg(long, help = "Patient age")]
    pub age: Option<String>,

    #[arg(long, help = "Patient gender")]
    pub gender: Option<String>,

    #[arg(long, help = "Patient occupation")]
    pub occupation: Option<String>,

    #[arg(long, help = "Working diagnosis")]
    pub diagnosis: Option<String>,

    #[arg(long = "medical-history", help = "Relevant medical history")]
    pub medical_history: Option<String>,

    #[arg(long, help = "Lifestyle notes")]
    pub lifestyle: Option<String>,

    /// Fields to surface in the prompt; defaults to every field given
    #[arg(
        long,
        value_delimiter = ',',
        value_parser = parse_case_field,
        help = "Comma-separated fields to include in the prompt (defaults to every field given)"
    )]
    pub include: Vec<CaseField>,

    #[arg(long, help = "Ground the case in retrieved systematic reviews")]
    pub evidence: bool,

    #[arg(long = "no-audio", help = "Skip audio narration")]
    pub no_audio: bool,

    #[arg(long = "no-images", help = "Skip illustrations")]
    pub no_images: bool,

    #[arg(long = "no-document", help = "Skip the PDF handout")]
    pub no_document: bool,

    #[arg(short, long, help = "Directory to write the artifacts to")]
    pub out: Option<PathBuf>,
}

fn parse_case_field(value: &str) -> Result<CaseField, String> {
    value.parse()
}

impl GenerateArgs {
    fn field_values(&self) -> [(CaseField, Option<&String>); 6] {
        [
            (CaseField::Age, self.age.as_ref()),
            (CaseField::Gender, self.gender.as_ref()),
            (CaseField::Occupation, self.occupation.as_ref()),
            (CaseField::Diagnosis, self.diagnosis.as_ref()),
            (CaseField::MedicalHistory, self.medical_history.as_ref()),
            (CaseField::Lifestyle, self.lifestyle.as_ref()),
        ]
    }

    /// Build the pipeline request.
    ///
    /// Without `--include`, every field given on the command line is
    /// surfaced; with it, only the listed ones.
    pub fn to_request(&self) -> CaseRequest {
        let mut request = CaseRequest::new(self.subject.clone()).with_evidence(self.evidence);
        request.voice.clone_from(&self.voice);

        for (field, value) in self.field_values() {
            if let Some(value) = value {
                request = if self.include.is_empty() {
                    request.with_included_field(field, value.clone())
                } else {
                    request.with_field(field, value.clone())
                };
            }
        }
        request.include.extend(self.include.iter().copied());
        request
    }

    /// Build the request and reject it before any service is set up
    pub fn validated_request(&self) -> Result<CaseRequest> {
        let request = self.to_request();
        request
            .clone()
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid request: {e}"))?;
        Ok(request)
    }

    pub fn toggles(&self) -> ArtifactToggles {
        ArtifactToggles {
            audio: !self.no_audio,
            images: !self.no_images,
            document: !self.no_document,
            evidence: self.evidence,
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.out
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR))
    }
}

/// Define custom styles for Clap
fn get_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default().bold())
        .usage(AnsiColor::Cyan.on_default().bold())
        .literal(AnsiColor::Green.on_default().bold())
        .placeholder(AnsiColor::Yellow.on_default())
        .valid(AnsiColor::Blue.on_default().bold())
        .invalid(AnsiColor::Red.on_default().bold())
        .error(AnsiColor::Red.on_default().bold())
}

/// Parse the command-line arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Dynamic help listing the narration voices
fn get_dynamic_help() -> String {
    let voices = Voice::all_names()
        .iter()
        .map(|v| format!("{}", v.bold()))
        .collect::<Vec<_>>()
        .join(" • ");

    format!("\nAvailable voices: {voices}")
}

/// Main function to parse arguments and handle the command
pub async fn main() -> Result<()> {
    let cli = parse_args();

    if cli.version {
        ui::print_version(crate_version!());
        return Ok(());
    }

    if cli.log {
        crate::logger::enable_logging();
        let log_file = cli.log_file.as_deref().unwrap_or(LOG_FILE);
        crate::logger::set_log_file(log_file)?;
        crate::logger::set_log_to_stderr(cli.log_stderr);

        // Load config to check for verbose logging settings
        if let Ok(config) = Config::load() {
            crate::logger::set_verbose_logging(config.performance.verbose_logging);
            if config.performance.verbose_logging {
                log_debug!("Verbose logging enabled - will show HTTP client logs");
            }
        }
    } else {
        crate::logger::disable_logging();
    }

    if cli.quiet {
        ui::set_quiet_mode(true);
    }

    if let Some(command) = cli.command {
        handle_command(command).await
    } else {
        // If no subcommand is provided, print the help
        let _ = Cli::parse_from(["physiocase", "--help"]);
        Ok(())
    }
}

/// Handle the command based on parsed arguments
pub async fn handle_command(command: Commands) -> Result<()> {
    match command {
        Commands::Generate(args) => handle_generate(args).await,
        Commands::Voices => {
            handle_voices();
            Ok(())
        }
        Commands::Config {
            show,
            model,
            temperature,
            max_results,
        } => handle_config(show, model, temperature, max_results),
    }
}

/// Handle the `Generate` command
async fn handle_generate(args: GenerateArgs) -> Result<()> {
    log_debug!("Handling 'generate' command with args: {:?}", args);

    let request = args.validated_request()?;
    let config = Config::load()?;
    let mut setup = PipelineSetupService::new(config).with_toggles(args.toggles());
    let builder = setup.create_builder()?;
    for warning in setup.warnings() {
        ui::print_warning(warning);
    }

    let spinner = ui::create_spinner("Preparing case request...");
    let listener: StageListener = {
        let spinner = spinner.clone();
        Arc::new(move |stage: PipelineStage| {
            spinner.set_message(format!("{}...", capitalize(&stage.to_string())));
        })
    };
    let orchestrator = builder.on_stage(listener).build();

    let result = orchestrator.run(request).await;
    spinner.finish_and_clear();

    let artifact = match result {
        Ok(artifact) => artifact,
        Err(PipelineError::Validation(e)) => {
            return Err(anyhow::anyhow!("Invalid request: {e}"));
        }
        Err(e @ (PipelineError::Assembly(_) | PipelineError::Generation(_))) => {
            return Err(anyhow::Error::new(e).context("No case was produced"));
        }
    };

    let out_dir = args.output_dir();
    let written = write_artifact(&out_dir, &artifact)?;

    ui::print_bordered_content(&artifact.text);
    ui::print_newline();
    report_outcomes(&artifact);
    for path in &written {
        ui::print_message(&format!("  {}", ui::dim(&path.display().to_string())));
    }

    if artifact.is_partial() {
        ui::print_warning("Case generated with missing artifacts");
    } else {
        ui::print_success("Case generated");
    }
    Ok(())
}

fn report_outcomes(artifact: &CaseArtifact) {
    for outcome in &artifact.outcomes {
        match &outcome.status {
            RenderStatus::Produced => ui::print_info(&format!("✓ {}", outcome.kind)),
            RenderStatus::Skipped => {
                ui::print_message(&ui::dim(&format!("- {} skipped", outcome.kind)));
            }
            RenderStatus::Failed(reason) => {
                ui::print_warning(&format!("✗ {} not produced: {reason}", outcome.kind));
            }
        }
    }
}

/// Write every produced artifact into `dir`, returning the written paths.
///
/// Layout: `case.md`, `narration.mp3`, `image_<n>.png`, `case.pdf` and a
/// `run.json` summary of the run.
pub fn write_artifact(dir: &Path, artifact: &CaseArtifact) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let mut written = Vec::new();
    let mut write = |name: String, bytes: &[u8]| -> Result<()> {
        let path = dir.join(name);
        fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
        Ok(())
    };

    write("case.md".to_string(), artifact.text.as_bytes())?;
    if let Some(audio) = &artifact.audio {
        write("narration.mp3".to_string(), audio)?;
    }
    for (index, image) in artifact.images.iter().enumerate() {
        write(format!("image_{}.png", index + 1), image)?;
    }
    if let Some(document) = &artifact.document {
        write("case.pdf".to_string(), document)?;
    }

    let summary = json!({
        "run_id": artifact.run_id,
        "sections": artifact.sections,
        "outcomes": artifact.outcomes,
        "images": artifact.images.len(),
    });
    write("run.json".to_string(), serde_json::to_string_pretty(&summary)?.as_bytes())?;

    Ok(written)
}

/// Handle the `Voices` command
fn handle_voices() {
    ui::print_info("Available narration voices:");
    for voice in Voice::ALL {
        println!("  {} {}", voice.name().bold(), ui::dim(voice.vendor_id()));
    }
}

/// Handle the `Config` command
fn handle_config(
    show: bool,
    model: Option<String>,
    temperature: Option<f64>,
    max_results: Option<usize>,
) -> Result<()> {
    log_debug!(
        "Handling 'config' command with show: {}, model: {:?}, temperature: {:?}, max_results: {:?}",
        show,
        model,
        temperature,
        max_results
    );

    let mut config = Config::load()?;
    let mut changed = false;

    if let Some(model) = model {
        config.generation.model = model;
        changed = true;
    }
    if let Some(temperature) = temperature {
        config.generation.temperature = temperature;
        changed = true;
    }
    if let Some(max_results) = max_results {
        config.evidence.max_results = max_results;
        changed = true;
    }

    if changed {
        config.validate()?;
        config.save()?;
        ui::print_success("Configuration updated");
    }

    if show || !changed {
        print_config(&config)?;
    }
    Ok(())
}

fn print_config(config: &Config) -> Result<()> {
    ui::print_info(&format!(
        "Configuration file: {}",
        Config::get_config_path()?.display()
    ));
    println!("{}", toml::to_string_pretty(config)?);

    let credential = |name: &str, set: bool| {
        let state = if set { "set".green() } else { "missing".red() };
        println!("  {name}: {state}");
    };
    ui::print_info("Credentials:");
    credential(crate::config::OPENAI_API_KEY_ENV, !config.generation.api_key.is_empty());
    credential(crate::config::ELEVEN_API_KEY_ENV, !config.speech.api_key.is_empty());
    credential(crate::config::REPLICATE_API_TOKEN_ENV, !config.images.api_token.is_empty());
    credential(crate::config::NCBI_API_KEY_ENV, !config.evidence.api_key.is_empty());
    Ok(())
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
