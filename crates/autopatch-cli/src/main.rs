//! Autopatch CLI
//!
//! The `autopatch` command asks a model for a code change, applies it to a
//! checkout, and builds, tests and re-prompts until it passes or the
//! attempt budget runs out.
//!
//! ## Commands
//!
//! - `run`: run a full repair session and open a pull request
//! - `parse`: parse a saved model reply
//! - `splice`: reconstruct a file from a placeholder block
//! - `branch-name`: print the branch name for a summary
//! - `show-session`: print a verified session artifact

mod openai;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};

use autopatch_ci::Toolchain;
use autopatch_core::{
    branch_name, parse_response, read_session_artifact, splice_file, write_session_artifact,
    ChangeRequest, Collaborators, GhCliPublisher, GitCli, PathPolicy, RepairLoop, RepoKind,
    SeedFiles, SessionConfig, Summary, TestPolicy,
};

use crate::openai::{OpenAiClient, OpenAiConfig};

const DEFAULT_ARTIFACTS_DIR: &str = ".autopatch/sessions";

#[derive(Parser)]
#[command(name = "autopatch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Model-driven code changes with a build/test repair loop", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a repair session against a checkout
    Run {
        /// Working checkout (cloned into when --repo-url is given)
        #[arg(long)]
        checkout: PathBuf,

        /// Repository kind: go, rust, cpp, python
        #[arg(long)]
        kind: RepoKind,

        /// Description of the change
        #[arg(short, long)]
        prompt: String,

        /// Clone this repository into the checkout first
        #[arg(long)]
        repo_url: Option<String>,

        /// Seed file for the prompt, relative to the checkout (repeatable)
        #[arg(short, long = "file")]
        files: Vec<String>,

        /// Use every source file of the repository kind as context
        #[arg(long, conflicts_with = "files")]
        whole_repo: bool,

        /// Maximum prompt cycles
        #[arg(long, env = "AUTOPATCH_MAX_ATTEMPTS")]
        max_attempts: Option<u32>,

        /// Run or skip the test stage (default depends on --kind)
        #[arg(long)]
        test_policy: Option<TestPolicy>,

        /// Where model-supplied paths may be written: contained, unrestricted
        #[arg(long, env = "AUTOPATCH_PATH_POLICY")]
        path_policy: Option<PathPolicy>,

        /// Per-stage timeout in seconds (0 = none)
        #[arg(long, default_value = "1200")]
        stage_timeout: u64,

        /// Model name
        #[arg(long, env = "AUTOPATCH_MODEL")]
        model: Option<String>,

        /// Directory for session artifacts
        #[arg(long, default_value = DEFAULT_ARTIFACTS_DIR)]
        artifacts_dir: PathBuf,
    },

    /// Parse a saved model reply and print it as JSON
    Parse {
        /// File containing the raw reply
        response: PathBuf,
    },

    /// Reconstruct a full file from a block containing the placeholder
    Splice {
        /// Current file on disk
        original: PathBuf,

        /// Model block with one placeholder line
        block: PathBuf,
    },

    /// Print the branch name a summary would get now
    BranchName {
        summary: String,
    },

    /// Print a recorded session after verifying its digest
    ShowSession {
        session_id: String,

        /// Directory holding session artifacts
        #[arg(long, default_value = DEFAULT_ARTIFACTS_DIR)]
        artifacts_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    autopatch_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run {
            checkout,
            kind,
            prompt,
            repo_url,
            files,
            whole_repo,
            max_attempts,
            test_policy,
            path_policy,
            stage_timeout,
            model,
            artifacts_dir,
        } => {
            let seeds = if whole_repo {
                SeedFiles::WholeRepository
            } else {
                SeedFiles::Paths(files)
            };
            let mut request = ChangeRequest::new(prompt, seeds, kind);
            if let Some(url) = repo_url {
                request = request.with_repo_url(url);
            }
            let options = RunOptions {
                max_attempts,
                test_policy,
                path_policy,
                stage_timeout,
                model,
            };
            cmd_run(&checkout, &request, options, &artifacts_dir).await
        }
        Commands::Parse { response } => cmd_parse(&response),
        Commands::Splice { original, block } => cmd_splice(&original, &block),
        Commands::BranchName { summary } => cmd_branch_name(&summary),
        Commands::ShowSession {
            session_id,
            artifacts_dir,
        } => cmd_show_session(&session_id, &artifacts_dir),
    }
}

/// Flag overrides applied on top of `SessionConfig::from_env`.
struct RunOptions {
    max_attempts: Option<u32>,
    test_policy: Option<TestPolicy>,
    path_policy: Option<PathPolicy>,
    stage_timeout: u64,
    model: Option<String>,
}

fn session_config(options: &RunOptions) -> Result<SessionConfig> {
    let mut config = SessionConfig::from_env().context("Invalid session configuration")?;
    if let Some(n) = options.max_attempts {
        config.max_attempts = n;
    }
    if let Some(policy) = options.path_policy {
        config.path_policy = policy;
    }
    config.validate()?;
    Ok(config)
}

/// Run a full session and write its artifact
async fn cmd_run(
    checkout: &Path,
    request: &ChangeRequest,
    options: RunOptions,
    artifacts_dir: &Path,
) -> Result<()> {
    let config = session_config(&options)?;

    let mut model_config = OpenAiConfig::from_env()?;
    if let Some(model) = &options.model {
        model_config = model_config.with_model(model);
    }
    let model = OpenAiClient::new(model_config).context("Failed to create model client")?;

    let test_policy = options
        .test_policy
        .unwrap_or_else(|| request.repo_kind.default_test_policy());
    let toolchain = Toolchain::for_kind(request.repo_kind, test_policy, options.stage_timeout);

    let collab = Collaborators {
        model: Arc::new(model),
        builder: toolchain.builder(),
        tester: toolchain.tester(),
        vcs: Arc::new(GitCli::new(checkout)),
        publisher: Arc::new(GhCliPublisher::new(checkout)),
    };

    info!(
        checkout = %checkout.display(),
        kind = %request.repo_kind,
        max_attempts = config.max_attempts,
        "starting repair session"
    );
    let run = RepairLoop::new(checkout, config, collab)
        .run_recorded(request)
        .await;

    let artifact = write_session_artifact(&run.log, artifacts_dir)
        .with_context(|| format!("Failed to write session artifact to {:?}", artifacts_dir))?;
    println!("Session: {}", run.log.session_id);
    println!("Artifact: {}", artifact.display());

    let report = run.result.context("Repair session failed")?;
    println!("Branch: {}", report.branch);
    println!("Attempts: {}", report.attempts.len());
    println!("Pull request: {}", report.pr_link);
    Ok(())
}

/// Parse a saved reply
fn cmd_parse(path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read response file: {:?}", path))?;
    let parsed = parse_response(&text).context("Response did not parse")?;
    println!("{}", serde_json::to_string_pretty(&parsed)?);
    Ok(())
}

/// Splice a block into its original
fn cmd_splice(original: &Path, block: &Path) -> Result<()> {
    let model = std::fs::read_to_string(block)
        .with_context(|| format!("Failed to read block file: {:?}", block))?;
    let spliced = splice_file(original, &model).context("Splice failed")?;
    print!("{spliced}");
    Ok(())
}

fn cmd_branch_name(summary: &str) -> Result<()> {
    let summary = Summary::new(summary)?;
    println!("{}", branch_name(&summary, chrono::Utc::now()));
    Ok(())
}

/// Show a verified session artifact
fn cmd_show_session(session_id: &str, artifacts_dir: &Path) -> Result<()> {
    let log = read_session_artifact(session_id, artifacts_dir)
        .with_context(|| format!("Failed to load session {session_id}"))?;
    println!("{}", serde_json::to_string_pretty(&log)?);
    Ok(())
}
