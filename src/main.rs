//! lazycommit - CLI entry point.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use git2::Repository;
use tracing::warn;

use lazycommit::git::{CommitCommand, collect_changes};
use lazycommit::llm::{CompletionRequest, Echo, OpenAiTransport, generate_message};
use lazycommit::prompt::{CompiledPrompt, DiffInclusion, compile};
use lazycommit::{Cli, Config, logging};

#[tokio::main]
async fn main() -> ExitCode {
    logging::init_subscriber();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Step 1: Validate configuration
    let config = Config::from_cli(cli)?;

    // Step 2: Open git repository
    let repo = Repository::open_from_env()
        .context("Not a git repository. Run lazycommit from within a git repository.")?;

    // Step 3: Collect changes
    let changes = collect_changes(&repo, &config.target)?;

    // Step 4: Compile the prompt within the token budget
    let estimator = config.estimator.build(&config.model)?;
    let prompt = compile(&changes, &config.compile, estimator.as_ref())?;
    report_compilation(&prompt);

    // Step 5: Generate the message
    let transport = OpenAiTransport::new(config.openai.clone())
        .context("Failed to create HTTP client")?;
    let request =
        CompletionRequest::new(&config.model, prompt.messages).with_stream(config.stream);

    let message = if config.stream {
        let mut echo = Echo::new(std::io::stdout());
        let message = generate_message(&transport, request, |piece| echo.write(piece)).await?;
        println!();
        message
    } else {
        let message = generate_message(&transport, request, |_| {}).await?;
        println!("{}", message.cyan());
        message
    };
    println!();

    // Step 6: Apply
    let command = CommitCommand::for_target(&message, &config.target)?;
    if config.dry_run {
        println!("Run the following command to commit:");
        println!("{}", command.to_shell_string());
    } else {
        command.run()?;
    }

    Ok(())
}

/// Surface everything the budget forced out of the prompt.
fn report_compilation(prompt: &CompiledPrompt) {
    for warning in &prompt.warnings {
        warn!("{}", warning);
    }

    for file in &prompt.files {
        match file.inclusion {
            DiffInclusion::Full => {}
            DiffInclusion::Truncated {
                kept_lines,
                total_lines,
            } => warn!(
                "Diff of {} truncated to {} of {} lines",
                file.path, kept_lines, total_lines
            ),
            DiffInclusion::Omitted => warn!("Diff of {} omitted", file.path),
        }
    }
}
