use clap::{Parser, Subcommand};

/// CLI surface definition. A thin pass-through over the storage engine:
/// no command ever prints a decrypted key.
#[derive(Parser, Debug)]
#[command(
    name = "keyhold",
    about = "Per-provider encrypted API key store",
    version,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Store an API key for a provider (reads the key from stdin when omitted).
    Set {
        provider: String,
        key: Option<String>,
    },
    /// Remove a provider's stored key.
    Rm { provider: String },
    /// List providers with a stored key.
    List,
    /// Show non-sensitive info about a provider's stored key.
    Show { provider: String },
    /// Verify a stored key decrypts and still matches the provider's format.
    Check { provider: String },
    /// List recognized providers.
    Providers,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_set_with_inline_key() {
        let cli = Cli::try_parse_from(["keyhold", "set", "openai", "sk-abc"])
            .expect("parse should succeed");
        assert_eq!(
            cli.command,
            Command::Set {
                provider: "openai".to_string(),
                key: Some("sk-abc".to_string()),
            }
        );
    }

    #[test]
    fn parses_set_without_key() {
        let cli = Cli::try_parse_from(["keyhold", "set", "openai"]).expect("parse should succeed");
        assert_eq!(
            cli.command,
            Command::Set {
                provider: "openai".to_string(),
                key: None,
            }
        );
    }

    #[test]
    fn parses_show_and_rm() {
        let cli = Cli::try_parse_from(["keyhold", "show", "google"]).expect("parse");
        assert_eq!(
            cli.command,
            Command::Show {
                provider: "google".to_string()
            }
        );

        let cli = Cli::try_parse_from(["keyhold", "rm", "google"]).expect("parse");
        assert_eq!(
            cli.command,
            Command::Rm {
                provider: "google".to_string()
            }
        );
    }

    #[test]
    fn parses_config_init() {
        let cli = Cli::try_parse_from(["keyhold", "config", "init"]).expect("parse");
        assert_eq!(cli.command, Command::Config(ConfigCommand::Init));
    }

    #[test]
    fn rejects_missing_subcommand() {
        assert!(Cli::try_parse_from(["keyhold"]).is_err());
    }
}
