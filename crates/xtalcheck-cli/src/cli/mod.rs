mod commands;
mod helpers;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use xtalcheck_core::domain::CheckError;

pub fn run_from_env() -> i32 {
    init_tracing();
    let args: Vec<String> = std::env::args().collect();
    match parse_and_dispatch(args) {
        Ok(code) => code,
        Err(error) => {
            let check_error = error.as_check_error();
            eprintln!("{}", check_error.diagnostic_line());
            check_error.exit_code()
        }
    }
}

fn init_tracing() {
    // Verdict lines go through tracing, so the subscriber writes to stderr
    // and leaves stdout to the run summaries.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => dispatch_parsed(cli.command),
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(name = "xtalcheck", about = "Structure-group cross-check engine")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Cross-check canonical structures of all groups sharing a composition
    Crosscheck(commands::CrosscheckArgs),
    /// Compare one group's canonical structure against a secondary id range
    Canonicals(commands::CanonicalsArgs),
    /// Verify every group member against its group's canonical structure
    Groupmembers(commands::GroupmembersArgs),
    /// Audit declared spacegroups against lattice-derived crystal systems
    Spacegroups(commands::SpacegroupsArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Crosscheck(args) => commands::run_crosscheck_command(args),
        CliCommand::Canonicals(args) => commands::run_canonicals_command(args),
        CliCommand::Groupmembers(args) => commands::run_groupmembers_command(args),
        CliCommand::Spacegroups(args) => commands::run_spacegroups_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Check(CheckError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<CheckError> for CliError {
    fn from(error: CheckError) -> Self {
        Self::Check(error)
    }
}

impl CliError {
    fn as_check_error(&self) -> CheckError {
        match self {
            Self::Usage(message) => CheckError::input_validation("CLI.USAGE", message.clone()),
            Self::Check(error) => error.clone(),
            Self::Internal(error) => CheckError::internal("CLI.INTERNAL", format!("{error:#}")),
        }
    }
}
