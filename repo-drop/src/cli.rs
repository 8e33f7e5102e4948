///
/// This module implements the CLI interface for repo-drop: command parsing,
/// argument validation, and the entrypoints for both sides of the upload API.
///
/// All core logic (records, flattening, synchronisation) lives in the [`repo-drop-core`]
/// crate. This module is strictly CLI glue and orchestration.
///
/// ## Commands
/// - `serve`: run the upload server, optionally with a YAML config file
/// - `push`: flatten local files and directories into one batch and submit it to a
///   running upload server
///
/// ## How To Use
/// - For command-line users: use the installed `repo-drop` binary with `--help`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// [`repo-drop-core`]: ../../repo-drop-core/
use crate::load_config::{default_config, load_config};
use crate::server::serve;
use crate::submit::{submit, Submission};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use repo_drop_core::collector::BatchCollector;
use repo_drop_core::contract::Credential;
use repo_drop_core::flatten::flatten;
use repo_drop_core::local::{self, LocalOptions};
use std::path::PathBuf;

/// CLI for repo-drop: push files and folders into a GitHub repository branch.
#[derive(Parser)]
#[clap(
    name = "repo-drop",
    version,
    about = "Upload local files and folders into a GitHub repository through a small upload server"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the upload server
    Serve {
        /// Path to the YAML config file; built-in defaults when omitted
        #[clap(long)]
        config: Option<PathBuf>,
    },
    /// Flatten local files and directories and upload them as one batch
    Push {
        /// Files and directories to upload; a directory keeps its own name as the first path segment
        #[clap(required = true)]
        paths: Vec<PathBuf>,
        /// Base URL of the upload server
        #[clap(long, env = "REPO_DROP_SERVER", default_value = "http://localhost:5000")]
        server: String,
        /// Target repository, e.g. https://github.com/owner/repo
        #[clap(long)]
        repo_url: String,
        /// GitHub token with contents write access
        #[clap(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: String,
        /// Target branch (defaults to main)
        #[clap(long)]
        branch: Option<String>,
        /// Commit message used for every file (defaults to "Upload <path>")
        #[clap(long)]
        message: Option<String>,
        /// Directory names to skip while walking (repeatable)
        #[clap(long = "exclude", default_values_t = [String::from(".git")])]
        exclude: Vec<String>,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Serve { config } => {
            let config = match config {
                Some(path) => load_config(path)?,
                None => default_config()?,
            };
            tracing::info!(command = "serve", "Starting upload server");
            serve(config).await
        }
        Commands::Push {
            paths,
            server,
            repo_url,
            token,
            branch,
            message,
            exclude,
        } => {
            let options = LocalOptions {
                excluded: exclude,
                ..LocalOptions::default()
            };
            let submission = Submission {
                server_url: server,
                repo_url,
                token: Credential::new(token),
                branch,
                commit_message: message,
            };
            push(&paths, &options, &submission).await
        }
    }
}

async fn push(paths: &[PathBuf], options: &LocalOptions, submission: &Submission) -> Result<()> {
    let mut roots = Vec::with_capacity(paths.len());
    for path in paths {
        let root = local::open(path, options)
            .await
            .with_context(|| format!("Cannot open {}", path.display()))?;
        roots.push(root);
    }

    let mut collector = BatchCollector::new();
    let oversize = collector.add(flatten(roots).await);
    if collector.is_empty() {
        bail!("No files found to upload");
    }
    if oversize > 0 {
        eprintln!("warning: {oversize} file(s) exceed 1 MiB and will be rejected by GitHub");
    }
    tracing::info!(
        command = "push",
        files = collector.len(),
        bytes = collector.total_size(),
        "Collected batch"
    );

    let client = reqwest::Client::new();
    let response = submit(&client, submission, collector.list()).await?;

    println!("{}", response.message);
    for uploaded in response.uploaded_files.iter().flatten() {
        println!("  uploaded {uploaded}");
    }
    for failure in response.errors.iter().flatten() {
        eprintln!("  failed   {}: {}", failure.file, failure.error);
    }

    if response.success {
        collector.clear();
        tracing::info!(command = "push", "Upload batch accepted");
        Ok(())
    } else {
        tracing::error!(command = "push", message = %response.message, "Upload batch failed");
        bail!("Upload failed: {}", response.message)
    }
}
