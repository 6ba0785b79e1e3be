use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "splitload",
    about = "Move file trees through a bounded-size chunk store",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Raise log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML file with transfer settings
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Encode a file or directory and store it as chunks
    Upload(UploadArgs),
    /// Rebuild a tree from its chunks
    Download(DownloadArgs),
    /// List the chunks of a manifest
    Inspect(InspectArgs),
}

#[derive(Args)]
pub struct UploadArgs {
    pub path: PathBuf,
    /// Directory holding the chunk store
    #[arg(long)]
    pub store: PathBuf,
    /// Also write the manifest to this file
    #[arg(long)]
    pub manifest: Option<PathBuf>,
    #[arg(long)]
    pub max_chunk_size: Option<u64>,
    #[arg(long)]
    pub buffer_size: Option<usize>,
}

#[derive(Args)]
pub struct DownloadArgs {
    /// Manifest file or share string
    pub source: String,
    #[arg(long)]
    pub store: PathBuf,
    /// Directory to rebuild the tree in
    #[arg(long, default_value = ".")]
    pub path: PathBuf,
    /// Replace an existing entry of the same name
    #[arg(long)]
    pub overwrite: bool,
    #[arg(long)]
    pub buffer_size: Option<usize>,
}

#[derive(Args)]
pub struct InspectArgs {
    /// Manifest file or share string
    pub source: String,
    /// Check each chunk against this store
    #[arg(long)]
    pub store: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_upload() {
        let cli = Cli::try_parse_from([
            "splitload", "upload", "photos", "--store", "/srv/chunks", "--max-chunk-size", "1000",
        ])
        .unwrap();
        if let Command::Upload(args) = cli.command {
            assert_eq!(args.path, PathBuf::from("photos"));
            assert_eq!(args.store, PathBuf::from("/srv/chunks"));
            assert_eq!(args.max_chunk_size, Some(1000));
            assert!(args.manifest.is_none());
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_download_defaults() {
        let cli = Cli::try_parse_from(["splitload", "download", "m.json", "--store", "s"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Text);
        if let Command::Download(args) = cli.command {
            assert_eq!(args.path, PathBuf::from("."));
            assert!(!args.overwrite);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::try_parse_from([
            "splitload", "inspect", "m.json", "-vv", "--format", "json", "--config", "splitload.toml",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.config, Some(PathBuf::from("splitload.toml")));
        assert!(matches!(cli.command, Command::Inspect(_)));
    }

    #[test]
    fn upload_requires_store() {
        assert!(Cli::try_parse_from(["splitload", "upload", "photos"]).is_err());
    }
}
