use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "tubedrop")]
#[command(author, version, about = "Telegram bot that downloads YouTube videos and sends them back", long_about = None)]
pub struct Cli {
    /// Config file (defaults to ./tubedrop.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the bot (default)
    Run,

    /// Download a video locally without Telegram
    Download {
        /// YouTube link
        url: String,

        /// Directory to save the file in
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },

    /// Validate configuration and probe the fetch backend
    Check,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_no_subcommand_means_run() {
        let cli = Cli::try_parse_from(["tubedrop"]).unwrap();
        assert_eq!(cli.command, None);
        assert_eq!(cli.config, None);
    }

    #[test]
    fn test_download_with_output_and_global_config() {
        let cli = Cli::try_parse_from([
            "tubedrop",
            "download",
            "https://youtu.be/abc123",
            "--output",
            "/tmp/videos",
            "--config",
            "bot.toml",
        ])
        .unwrap();

        assert_eq!(
            cli.command,
            Some(Commands::Download {
                url: "https://youtu.be/abc123".to_string(),
                output: Some(PathBuf::from("/tmp/videos")),
            })
        );
        assert_eq!(cli.config, Some(PathBuf::from("bot.toml")));
    }

    #[test]
    fn test_download_requires_url() {
        assert!(Cli::try_parse_from(["tubedrop", "download"]).is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
