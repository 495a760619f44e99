mod cli;
mod commands;
mod config;
mod error;
mod output;

use crate::{
    cli::{Args, Commands, OutputFormat},
    commands::CommandExecutor,
    config::AppConfig,
    error::{CliError, Result},
};
use clap::Parser;
#[cfg(feature = "colored-output")]
use colored::*;
use std::process;
use tracing::{Level, debug, error};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let output_format = args.output;
    let result = run(args).await;

    if let Err(e) = result {
        match output_format {
            OutputFormat::Json => {
                let mut error_json = serde_json::json!({
                    "status": "error",
                    "message": e.to_string(),
                });
                if let Some(errors) = e.field_errors() {
                    error_json["errors"] = serde_json::to_value(errors).unwrap_or_default();
                }
                println!("{}", error_json);
            }
            OutputFormat::Pretty => {
                error!("Application error: {}", e);
                #[cfg(feature = "colored-output")]
                {
                    eprintln!("{} {}", "Error:".red().bold(), e);
                }
                #[cfg(not(feature = "colored-output"))]
                {
                    eprintln!("Error: {}", e);
                }
                if let Some(errors) = e.field_errors() {
                    let output = output::OutputManager::new(false, OutputFormat::Pretty);
                    eprintln!("{}", output.format_field_errors(errors));
                }
                if e.requires_login() && matches!(e, CliError::Client(_)) {
                    eprintln!("Run `feedline login <username>` to start a new session.");
                }
            }
        }
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    init_logging(args.verbose, args.quiet)?;

    let app_config = AppConfig::load(args.config.as_deref())?;
    debug!(?app_config, "Loaded configuration");

    // Commands that never touch the API.
    match &args.command {
        Commands::Completions { shell } => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Args::command();
            let bin_name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, bin_name, &mut std::io::stdout());
            return Ok(());
        }
        Commands::Config { show, reset } => {
            if *reset {
                AppConfig::reset(args.config.as_deref())?;
                println!("✓ Configuration reset to defaults");
            } else if *show {
                println!("{}", app_config.show()?);
            } else {
                println!(
                    "Use --show to display current configuration or --reset to reset to defaults"
                );
            }
            return Ok(());
        }
        _ => {}
    }

    let client_config = app_config.client_config(args.api_url.as_deref())?;
    let session_file = app_config.session_file(args.session_file.as_deref())?;
    let executor = CommandExecutor::new(client_config, session_file, args.output)?;

    match args.command {
        Commands::Login { username, password } => executor.login(&username, password).await?,
        Commands::Register {
            username,
            email,
            cpf,
            password,
        } => executor.register(username, email, cpf, password).await?,
        Commands::Logout => executor.logout()?,
        Commands::Whoami => executor.whoami().await?,
        Commands::Feed { following } => executor.feed(following).await?,
        Commands::Post { title, content } => executor.create_post(title, content).await?,
        Commands::Like { post_id } => executor.like(post_id, true).await?,
        Commands::Unlike { post_id } => executor.like(post_id, false).await?,
        Commands::Comments { post_id } => executor.comments(post_id).await?,
        Commands::Comment { post_id, content } => executor.comment(post_id, &content).await?,
        Commands::Profile {
            picture: Some(path),
            ..
        } => executor.update_picture(&path).await?,
        Commands::Profile {
            username, posts, ..
        } => executor.profile(username, posts).await?,
        Commands::Account {
            username,
            email,
            new_password,
            current_password,
        } => {
            executor
                .account(username, email, new_password, current_password)
                .await?
        }
        Commands::Follow { username } => executor.follow(&username, true).await?,
        Commands::Unfollow { username } => executor.follow(&username, false).await?,
        Commands::Followers { username } => executor.followers(&username).await?,
        Commands::Following { username } => executor.following(username.as_deref()).await?,
        Commands::Completions { .. } | Commands::Config { .. } => {}
    }

    Ok(())
}

/// Logs go to stderr so JSON output on stdout stays machine readable.
fn init_logging(verbose: bool, quiet: bool) -> Result<()> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    let subscriber = tracing_subscriber::registry().with(filter);

    subscriber
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(verbose),
        )
        .init();
    Ok(())
}
