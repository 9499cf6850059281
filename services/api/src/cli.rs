use crate::roster::{run_roster, run_suggest_role, RosterArgs, SuggestRoleArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use headstart::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Headstart",
    about = "Run the Headstart teammate-matching service or inspect roster snapshots",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Filter and sort a roster snapshot the way the dashboard does
    Roster(RosterArgs),
    /// Print the role suggested for a set of skills
    SuggestRole(SuggestRoleArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Roster(args) => run_roster(args),
        Command::SuggestRole(args) => {
            run_suggest_role(args);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_and_flags_parse() {
        let cli = Cli::try_parse_from(["headstart"]).expect("parses");
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from([
            "headstart",
            "roster",
            "team.csv",
            "--needs",
            "needsDev",
            "--sort",
            "hours",
            "--direction",
            "asc",
        ])
        .expect("parses");
        let Some(Command::Roster(args)) = cli.command else {
            panic!("expected roster command");
        };
        assert_eq!(args.file.to_str(), Some("team.csv"));
        assert_eq!(args.needs.as_deref(), Some("needsDev"));
        assert_eq!(args.direction.as_deref(), Some("asc"));

        let cli = Cli::try_parse_from([
            "headstart",
            "suggest-role",
            "--skill",
            "Finances",
            "--skill",
            "Market Research",
        ])
        .expect("parses");
        let Some(Command::SuggestRole(args)) = cli.command else {
            panic!("expected suggest-role command");
        };
        assert_eq!(args.skills, ["Finances", "Market Research"]);
    }
}
