use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "vds", about = "Versioned dataset store", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Store root directory; overrides the configuration file
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Save a new dataset version
    Save(SaveArgs),
    /// Show a saved version
    Load(LoadArgs),
    /// Print a version's body
    Body(BodyArgs),
    /// Show version history
    Log(LogArgs),
    /// Generate a signing key
    Keygen(KeygenArgs),
}

#[derive(Args)]
pub struct SaveArgs {
    /// Body file; reuses the previous version's body when omitted
    pub body: Option<PathBuf>,
    /// Body format; guessed from the file extension when omitted
    #[arg(long = "body-format")]
    pub body_format: Option<String>,
    /// The first CSV row names the columns
    #[arg(long)]
    pub header: bool,
    /// JSON schema file for the body's entries
    #[arg(long)]
    pub schema: Option<PathBuf>,
    /// Address of the version this one follows
    #[arg(short, long)]
    pub previous: Option<String>,
    /// Dataset title
    #[arg(long)]
    pub name: Option<String>,
    #[arg(short, long)]
    pub title: Option<String>,
    #[arg(short, long)]
    pub message: Option<String>,
    /// Signing key file; overrides the configuration file
    #[arg(short, long)]
    pub key: Option<PathBuf>,
    /// Fail when any entry violates the schema
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args)]
pub struct LoadArgs {
    pub address: String,
    /// Verify the commit signature with this signing key file's public half
    #[arg(short, long)]
    pub key: Option<PathBuf>,
}

#[derive(Args)]
pub struct BodyArgs {
    pub address: String,
    /// Entries to print; zero prints all
    #[arg(short = 'n', long, default_value = "0")]
    pub limit: usize,
    #[arg(long, default_value = "0")]
    pub offset: usize,
    /// Print the stored bytes unparsed
    #[arg(long)]
    pub raw: bool,
}

#[derive(Args)]
pub struct LogArgs {
    pub address: String,
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
    #[arg(long)]
    pub oneline: bool,
}

#[derive(Args)]
pub struct KeygenArgs {
    /// Where to write the key; defaults to the configured key file
    pub path: Option<PathBuf>,
    /// Replace an existing key file
    #[arg(long)]
    pub force: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_save_with_previous() {
        let cli = Cli::try_parse_from([
            "vds", "save", "cities.csv", "--header", "-p", "/vds/abc/dataset.json", "-t", "fix typo",
        ])
        .unwrap();
        if let Command::Save(args) = cli.command {
            assert_eq!(args.body, Some(PathBuf::from("cities.csv")));
            assert!(args.header);
            assert_eq!(args.previous.as_deref(), Some("/vds/abc/dataset.json"));
            assert_eq!(args.title.as_deref(), Some("fix typo"));
            assert!(!args.strict);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_save_without_body() {
        let cli = Cli::try_parse_from(["vds", "save", "--previous", "/vds/abc", "--name", "cities"]).unwrap();
        if let Command::Save(args) = cli.command {
            assert!(args.body.is_none());
            assert_eq!(args.name.as_deref(), Some("cities"));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_body_window() {
        let cli = Cli::try_parse_from(["vds", "body", "/vds/abc", "-n", "10", "--offset", "5"]).unwrap();
        if let Command::Body(args) = cli.command {
            assert_eq!(args.limit, 10);
            assert_eq!(args.offset, 5);
            assert!(!args.raw);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_log_oneline() {
        let cli = Cli::try_parse_from(["vds", "log", "/vds/abc", "--oneline", "-n", "5"]).unwrap();
        if let Command::Log(args) = cli.command {
            assert!(args.oneline);
            assert_eq!(args.limit, 5);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_keygen() {
        let cli = Cli::try_parse_from(["vds", "keygen", "--force"]).unwrap();
        if let Command::Keygen(args) = cli.command {
            assert!(args.force);
            assert!(args.path.is_none());
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_globals() {
        let cli = Cli::try_parse_from(["vds", "--verbose", "--store", "/tmp/s", "--format", "json", "log", "/vds/abc"])
            .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.store, Some(PathBuf::from("/tmp/s")));
        assert!(matches!(cli.format, OutputFormat::Json));
    }

    #[test]
    fn save_requires_nothing_positional() {
        assert!(Cli::try_parse_from(["vds", "load"]).is_err());
        assert!(Cli::try_parse_from(["vds", "save"]).is_ok());
    }
}
