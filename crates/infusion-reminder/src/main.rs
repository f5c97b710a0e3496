//! `reminder` - CLI for infusion-reminder
//!
//! Runs the web panel, one-off checkups and variable management.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;

use infusion_reminder::cli::{CheckCommand, Cli, Command, ConfigCommand, VarCommand};
use infusion_reminder::{init_logging, web, CheckupOutcome, Config, Panel, Storage};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    match cli.command {
        Command::Config(config_cmd) => handle_config(cli.config, config_cmd),
        Command::Serve(serve_cmd) => {
            let config = load_config(cli.config)?;
            let listen = serve_cmd
                .listen
                .unwrap_or_else(|| config.server.listen_addr.clone());
            let addr: SocketAddr = listen
                .parse()
                .with_context(|| format!("invalid listen address: {listen}"))?;
            let panel = Arc::new(Panel::open(config).context("failed to open panel")?);
            web::serve(panel, addr).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Check(check_cmd) => {
            let config = load_config(cli.config)?;
            handle_check(config, &check_cmd).await
        }
        Command::Status(status_cmd) => {
            let config = load_config(cli.config)?;
            handle_status(&config, status_cmd.json)
        }
        Command::Var(var_cmd) => {
            let config = load_config(cli.config)?;
            handle_var(&config, var_cmd)
        }
    }
}

fn load_config(path: Option<std::path::PathBuf>) -> anyhow::Result<Config> {
    Config::load_from(path).context("failed to load configuration")
}

async fn handle_check(config: Config, cmd: &CheckCommand) -> anyhow::Result<ExitCode> {
    let panel = Panel::open(config).context("failed to open panel")?;
    let outcome = panel.run_checkup(cmd.notify).await?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }

    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_outcome(outcome: &CheckupOutcome) {
    println!("{}", outcome.message);
    if let Some(report) = &outcome.dispatch {
        println!();
        if report.is_empty() {
            println!("No notification channel is enabled.");
        }
        for delivery in &report.deliveries {
            match &delivery.outcome {
                Ok(()) => println!("  [ok]     {:<8} {}", delivery.channel, delivery.recipient),
                Err(e) => println!(
                    "  [failed] {:<8} {}: {e}",
                    delivery.channel, delivery.recipient
                ),
            }
        }
    }
}

fn handle_status(config: &Config, json: bool) -> anyhow::Result<ExitCode> {
    let storage = Storage::open(config.database_path())?;
    let stats = storage.stats()?;
    let settings = storage.settings()?;

    if json {
        let status = serde_json::json!({
            "database_path": config.database_path(),
            "upload_dir": config.upload_dir(),
            "stats": stats,
            "send_sms": settings.send_sms(),
            "trigger_ifttt": settings.trigger_ifttt(),
            "language": settings.language().code(),
            "trigger_time": settings.trigger_time().format("%H:%M").to_string(),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("reminder status");
        println!("---------------");
        println!("Database:      {}", config.database_path().display());
        println!("Upload dir:    {}", config.upload_dir().display());
        println!("Variables:     {}", stats.total_variables);
        println!("Numbers:       {}", stats.destination_numbers);
        println!("IFTTT makers:  {}", stats.ifttt_makers);
        println!("SMS:           {}", on_off(settings.send_sms()));
        println!("IFTTT:         {}", on_off(settings.trigger_ifttt()));
        println!("Language:      {}", settings.language().native_name());
        println!("Trigger time:  {} UTC", settings.trigger_time().format("%H:%M"));
        if let Some(updated) = stats.last_updated {
            println!("Last change:   {}", updated.format("%Y-%m-%d %H:%M:%S UTC"));
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

fn handle_config(path: Option<std::path::PathBuf>, cmd: ConfigCommand) -> anyhow::Result<ExitCode> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = Config::load_unchecked(path)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Server]");
                println!("  Listen address:     {}", config.server.listen_addr);
                println!("  Public URL:         {}", config.server.public_url);
                println!(
                    "  Secret key:         {}",
                    if config.server.secret_key.is_empty() { "(not set)" } else { "(set)" }
                );
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!("  Upload dir:         {}", config.upload_dir().display());
                println!();
                println!("[Services]");
                println!("  Twilio API:         {}", config.services.twilio_api_base);
                println!("  IFTTT:              {}", config.services.ifttt_base);
                println!("  IFTTT event:        {}", config.services.ifttt_event);
                println!("  ATrigger API:       {}", config.services.atrigger_base);
                println!("  HTTP timeout (s):   {}", config.services.http_timeout_secs);
                println!();
                println!("[Variables]");
                println!("  Seeded:             {}", config.variables.len());
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.or(path).unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => {
                    println!("Configuration error: {e}");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_var(config: &Config, cmd: VarCommand) -> anyhow::Result<ExitCode> {
    let storage = Storage::open(config.database_path())?;
    match cmd {
        VarCommand::List { json } => {
            let all = storage.list()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&all)?);
            } else {
                for var in all {
                    println!("{:<30} {}", var.name, var.value);
                }
            }
        }
        VarCommand::Get { name } => match storage.get(&name)? {
            Some(value) => println!("{value}"),
            None => bail!("{name} is not set"),
        },
        VarCommand::Set { name, value } => {
            let stored = storage.set_validated(&name, &value)?;
            println!("{name} = {stored}");
        }
        VarCommand::Unset { name } => {
            if !storage.remove(&name)? {
                bail!("{name} is not set");
            }
            println!("Removed {name}");
        }
    }
    Ok(ExitCode::SUCCESS)
}
