pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "cquiz",
    about = "Colleague quiz operator CLI",
    long_about = "Inspect configuration, apply migrations and review stored quizzes.",
    after_help = "Examples:\n  cquiz config\n  cquiz migrate\n  cquiz quizzes"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "List stored quizzes with their phase and answer progress")]
    Quizzes,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => commands::config::run(),
        Command::Migrate => commands::migrate::run(),
        Command::Quizzes => commands::quizzes::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
