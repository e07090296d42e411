//! Prompt evaluation CLI.
//!
//! Appends a prompt to every song in a dataset, asks the model for the genre
//! and reports how many it got right.

use anyhow::{bail, Context};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use promptbench_core::{LlmConfig, ModelCaller, OpenAiClient, KNOWN_MODELS};
use promptbench_eval::{
    print_report, write_transcript, ConfigLoader, Dataset, EvalConfig, EvalHarness, EvalProgress,
    EvaluationReport, JsonFileDataset, PromptbenchConfig,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

/// Exit status after Ctrl+C, as for SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

/// Score a prompt by how well it gets a model to name the genre of song lyrics.
#[derive(Parser, Debug)]
#[command(name = "promptbench")]
#[command(about = "Evaluate a classification prompt against a labeled dataset")]
#[command(version)]
struct Args {
    /// Dataset file: JSON array or JSON Lines of {text, expected_label} records
    #[arg(long, short = 'd', required_unless_present = "list_models")]
    dataset: Option<PathBuf>,

    /// Prompt appended to every item
    #[arg(long, short = 'p', conflicts_with = "prompt_file")]
    prompt: Option<String>,

    /// Read the prompt from a file
    #[arg(long)]
    prompt_file: Option<PathBuf>,

    /// Model identifier (e.g. gpt-4o-mini, gpt-4o, gpt-4-turbo, gpt-3.5-turbo)
    #[arg(long, short = 'm')]
    model: Option<String>,

    /// Temperature for generation (0.0-1.0)
    #[arg(long)]
    temperature: Option<f32>,

    /// How answers are compared to labels: contains, exact or fuzzy
    #[arg(long)]
    match_method: Option<String>,

    /// Additional attempts after a failed model call
    #[arg(long)]
    max_retries: Option<u32>,

    /// Seconds to wait between attempts
    #[arg(long)]
    retry_delay: Option<f64>,

    /// Seconds to wait after each item
    #[arg(long)]
    item_delay: Option<f64>,

    /// Number of items to evaluate, from the start of the dataset (default: all)
    #[arg(long, short = 's')]
    sample: Option<usize>,

    /// Base URL of an OpenAI-compatible API
    #[arg(long)]
    base_url: Option<String>,

    /// OpenAI API key (can also use OPENAI_API_KEY env var)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// LLM request timeout in seconds
    #[arg(long)]
    llm_timeout: Option<u64>,

    /// Maximum tokens per model answer
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Output format: table or json
    #[arg(long, short = 'o', default_value = "table")]
    output: String,

    /// Write the JSON report to this file
    #[arg(long)]
    output_file: Option<PathBuf>,

    /// Directory for the prompt_results_<time>.txt transcript
    #[arg(long)]
    transcript_dir: Option<PathBuf>,

    /// Only print the score, not every item
    #[arg(long)]
    no_details: bool,

    /// Extra config file, applied after ~/.promptbench/config.toml and ./promptbench.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the known model identifiers and exit
    #[arg(long)]
    list_models: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Seconds flag to `Duration`; `validate` rejects anything this drops.
fn secs_arg(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs).ok()
}

impl Args {
    /// Validate CLI arguments.
    fn validate(&self) -> Result<(), String> {
        if self.list_models {
            return Ok(());
        }

        if !["table", "json"].contains(&self.output.as_str()) {
            return Err(format!(
                "Invalid output format '{}'. Use 'table' or 'json'.",
                self.output
            ));
        }

        if self.prompt.is_none() && self.prompt_file.is_none() {
            return Err("a prompt is required (--prompt or --prompt-file)".to_string());
        }

        if self
            .api_key
            .as_deref()
            .map_or(true, |key| key.trim().is_empty())
        {
            return Err("an API key is required (--api-key or OPENAI_API_KEY)".to_string());
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err(format!(
                    "temperature ({}) must be between 0.0 and 1.0",
                    temperature
                ));
            }
        }

        for (name, value) in [
            ("retry-delay", self.retry_delay),
            ("item-delay", self.item_delay),
        ] {
            if let Some(secs) = value {
                if !secs.is_finite() || secs < 0.0 {
                    return Err(format!("{} ({}) must be a non-negative number", name, secs));
                }
                if secs_arg(secs).is_none() {
                    return Err(format!("{} ({}) is too large", name, secs));
                }
            }
        }

        if self.llm_timeout == Some(0) {
            return Err("llm-timeout must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Merge the discovered config files and the explicit `--config` file.
    fn file_config(&self) -> anyhow::Result<PromptbenchConfig> {
        let (mut config, loaded) = ConfigLoader::new().load();
        for path in &loaded {
            log::info!("Loaded config from {}", path.display());
        }

        if let Some(path) = &self.config {
            config.merge(ConfigLoader::load_file(path)?);
            log::info!("Loaded config from {}", path.display());
        }

        Ok(config)
    }

    /// Build LlmConfig from file config, then CLI arguments.
    fn llm_config(&self, file: &PromptbenchConfig) -> LlmConfig {
        let mut config = file.to_llm_config();

        if let Some(v) = &self.model {
            config = config.with_model(v.clone());
        }
        if let Some(v) = &self.base_url {
            config = config.with_base_url(v.clone());
        }
        if let Some(v) = self.temperature {
            config = config.with_temperature(v);
        }
        if let Some(v) = self.llm_timeout {
            config = config.with_timeout(Duration::from_secs(v));
        }
        if let Some(v) = self.max_tokens {
            config = config.with_max_tokens(v);
        }
        if let Some(v) = self.max_retries {
            config = config.with_max_retries(v);
        }
        if let Some(v) = self.retry_delay.and_then(secs_arg) {
            config = config.with_retry_delay(v);
        }

        config
    }

    /// Build EvalConfig from file config, then CLI arguments.
    fn eval_config(&self, file: &PromptbenchConfig, llm: &LlmConfig) -> EvalConfig {
        let mut config = file
            .to_eval_config()
            .with_model(llm.model.clone())
            .with_temperature(llm.temperature)
            .with_max_retries(llm.max_retries)
            .with_retry_delay(llm.retry_delay);

        if let Some(name) = &self.match_method {
            config = config.with_match_method(name.parse().unwrap_or_default());
        }
        if let Some(v) = self.item_delay.and_then(secs_arg) {
            config = config.with_inter_item_delay(v);
        }

        config
    }

    fn sample(&self, file: &PromptbenchConfig) -> Option<usize> {
        self.sample
            .or_else(|| file.eval.as_ref().and_then(|e| e.sample))
    }

    fn transcript_dir(&self, file: &PromptbenchConfig) -> Option<PathBuf> {
        self.transcript_dir
            .clone()
            .or_else(|| file.eval.as_ref().and_then(|e| e.transcript_dir.clone()))
    }

    fn show_details(&self, file: &PromptbenchConfig) -> bool {
        !self.no_details
            && file
                .eval
                .as_ref()
                .and_then(|e| e.show_details)
                .unwrap_or(true)
    }

    /// The prompt text, from `--prompt` or `--prompt-file`.
    fn resolve_prompt(&self) -> anyhow::Result<String> {
        let prompt = match (&self.prompt, &self.prompt_file) {
            (Some(prompt), _) => prompt.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read prompt file {}", path.display()))?,
            (None, None) => bail!("a prompt is required (--prompt or --prompt-file)"),
        };

        let prompt = prompt.trim().to_string();
        if prompt.is_empty() {
            bail!("prompt is empty");
        }
        Ok(prompt)
    }
}

/// Run evaluation with progress bar.
async fn run_with_progress<D: Dataset>(
    harness: &EvalHarness,
    dataset: &D,
    sample_size: Option<usize>,
    prompt: &str,
) -> anyhow::Result<EvaluationReport> {
    let items = dataset
        .load(sample_size)
        .await
        .with_context(|| format!("Failed to load dataset '{}'", dataset.name()))?;

    eprintln!("Evaluating prompt against {} songs...\n", items.len());

    let progress_bar = ProgressBar::new(0);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("#>-"),
    );

    let report = harness
        .evaluate_with_progress(&items, prompt, |progress| match progress {
            EvalProgress::Started { total } => {
                progress_bar.set_length(total as u64);
                progress_bar.set_message("Evaluating...");
            }
            EvalProgress::ItemCompleted {
                index,
                total,
                expected,
                predicted,
                correct,
                error,
                ..
            } => {
                progress_bar.println(format!(
                    "Song {}/{}: {} Expected: {}, Predicted: {}",
                    index + 1,
                    total,
                    if correct { "✓" } else { "✗" },
                    expected,
                    predicted
                ));
                progress_bar.set_position(index as u64 + 1);
                if error {
                    progress_bar.set_message("(some failures)");
                }
            }
            _ => {} // Handle future variants gracefully
        })
        .await;

    progress_bar.finish_with_message("Complete");
    Ok(report)
}

/// Output results in the requested format.
fn output_results(
    report: &EvaluationReport,
    args: &Args,
    show_details: bool,
    transcript_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    match args.output.as_str() {
        "json" => {
            let json =
                serde_json::to_string_pretty(report).context("Failed to serialize results")?;
            match &args.output_file {
                Some(path) => {
                    std::fs::write(path, &json)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    eprintln!("Results written to: {}", path.display());
                }
                None => println!("{}", json),
            }
        }
        _ => {
            print_report(report, show_details);
            if let Some(path) = &args.output_file {
                report
                    .write_json(path)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("\nDetailed results written to: {}", path.display());
            }
        }
    }

    if let Some(dir) = transcript_dir {
        let path = write_transcript(report, &dir)
            .with_context(|| format!("Failed to write transcript in {}", dir.display()))?;
        eprintln!("Results saved to {}", path.display());
    }

    if args.output != "json" {
        println!("\n{}/{}", report.correct_count, report.total_count);
    }
    Ok(())
}

async fn run(args: &Args) -> anyhow::Result<()> {
    let file_config = args.file_config()?;
    let llm_config = args.llm_config(&file_config);
    llm_config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid LLM configuration: {}", e))?;
    let eval_config = args.eval_config(&file_config, &llm_config);

    let prompt = args.resolve_prompt()?;
    let Some(dataset_path) = args.dataset.clone() else {
        bail!("--dataset is required");
    };
    let sample = args.sample(&file_config);

    eprintln!("=== Prompt Evaluation ===");
    eprintln!("Dataset: {}", dataset_path.display());
    eprintln!("Model: {}", eval_config.model);
    eprintln!("Match method: {}", eval_config.match_method);
    eprintln!(
        "Sample size: {}",
        sample
            .map(|s| s.to_string())
            .unwrap_or_else(|| "all".to_string())
    );
    eprintln!();

    let api_key = args.api_key.clone().unwrap_or_default();
    let client = OpenAiClient::new(api_key, llm_config.clone())?;
    let caller = ModelCaller::from_config(Arc::new(client), &llm_config);
    let harness = EvalHarness::new(caller, eval_config);

    let dataset = JsonFileDataset::new(dataset_path);
    let report = run_with_progress(&harness, &dataset, sample, &prompt).await?;

    output_results(
        &report,
        args,
        args.show_details(&file_config),
        args.transcript_dir(&file_config),
    )
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    if args.list_models {
        println!("Available models:");
        for (idx, model) in KNOWN_MODELS.iter().enumerate() {
            println!("{}. {}", idx + 1, model);
        }
        return ExitCode::SUCCESS;
    }

    tokio::select! {
        result = run(&args) => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\nProgram interrupted by user. Exiting...");
            ExitCode::from(EXIT_INTERRUPTED)
        }
    }
}
