use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "tribunal",
    version,
    about = "Run LLM-as-judge evaluation suites"
)]
pub struct Cli {
    /// Emit logs as newline-delimited JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run every eligible case of a suite and report the results
    Run(RunArgs),
    /// Parse a suite and build its judges without running anything
    Validate(ValidateArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum JudgeBackend {
    /// Fixed answer for every judge call (offline runs, CI smoke tests)
    Fake,
    /// Live calls to the OpenAI chat completions API
    Openai,
}

#[derive(Parser, Debug, Clone)]
pub struct JudgeArgs {
    #[arg(long, value_enum, default_value = "fake", env = "TRIBUNAL_JUDGE")]
    pub judge: JudgeBackend,

    /// Answer returned by the fake judge backend
    #[arg(long, default_value = "YES")]
    pub fake_response: String,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Override the OpenAI base URL (proxies, local gateways)
    #[arg(long, env = "OPENAI_BASE_URL")]
    pub openai_base_url: Option<String>,

    /// Model used when a dataset config does not name one
    #[arg(long, env = "TRIBUNAL_JUDGE_MODEL")]
    pub judge_model: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    #[arg(long, default_value = "tribunal.yaml")]
    pub config: PathBuf,

    #[command(flatten)]
    pub judge: JudgeArgs,

    /// Run cases one at a time in listed order
    #[arg(long)]
    pub sequential: bool,

    #[arg(long)]
    pub max_concurrency: Option<usize>,

    /// Only run cases in these categories (repeatable)
    #[arg(long = "category")]
    pub categories: Vec<String>,

    /// Per-case timeout in seconds
    #[arg(long)]
    pub case_timeout: Option<u64>,

    /// Write the full run summary as JSON
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Print passing cases too
    #[arg(long, short)]
    pub verbose: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct ValidateArgs {
    #[arg(long, default_value = "tribunal.yaml")]
    pub config: PathBuf,
}
