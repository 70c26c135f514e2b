//! Proxy host CLI.

use clap::Parser;
use proxyhost::cli::{Cli, Commands, ConfigCommands};
use proxyhost::commands::{self, CommandResult};
use std::env;
use std::process;

fn main() {
    let cli = Cli::parse();
    let human = cli.human_readable;

    // argv[0] selects the default config location and the program mode
    let arg0 = env::args().next().unwrap_or_else(|| "proxy".to_string());

    if let Err(e) = run_command(&cli, &arg0, human) {
        if human {
            eprintln!("Error: {}", e);
        } else {
            eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
        }
        process::exit(1);
    }
}

fn run_command(cli: &Cli, arg0: &str, human: bool) -> Result<(), proxyhost::Error> {
    let overrides = cli.overrides();
    match &cli.command {
        None => {
            let result = commands::run(arg0, &overrides, false)?;
            output(&result, human);
        }
        Some(Commands::Run { foreground }) => {
            let result = commands::run(arg0, &overrides, *foreground)?;
            output(&result, human);
        }
        Some(Commands::Config { command }) => match command {
            ConfigCommands::Show => {
                let result = commands::config_show(arg0, &overrides)?;
                output(&result, human);
            }
            ConfigCommands::Get { name } => {
                let result = commands::config_get(arg0, &overrides, name)?;
                output(&result, human);
            }
            ConfigCommands::Check { path } => {
                let result = commands::config_check(path)?;
                output(&result, human);
            }
        },
    }
    Ok(())
}

/// Print output in JSON or human-readable format.
fn output<T: CommandResult>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}
