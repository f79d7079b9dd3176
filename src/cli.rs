use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "anonbot")]
#[command(author, version, about = "Anonymous message relay bot for Telegram", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the bot in normal mode
    Run,

    /// Run the bot in staging mode (uses staging environment variables)
    RunStaging,

    /// Apply database migrations and exit
    Migrate,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_means_run() {
        let cli = Cli::try_parse_from(["anonbot"]).unwrap();
        assert_eq!(cli.command, None);
    }

    #[test]
    fn test_subcommands() {
        let cli = Cli::try_parse_from(["anonbot", "run-staging"]).unwrap();
        assert_eq!(cli.command, Some(Commands::RunStaging));

        let cli = Cli::try_parse_from(["anonbot", "migrate"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Migrate));
    }
}
