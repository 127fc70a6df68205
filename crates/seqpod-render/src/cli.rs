use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use seqpod_image::Platform;
use seqpod_observe::LoggerFormat;

#[derive(Parser, Debug)]
#[command(name = "seqpod-render", version, about = "Render seqpod task pods offline")]
pub struct Cli {
    #[command(flatten)]
    pub log: LogArgs,

    #[command(flatten)]
    pub registry: RegistryArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the pod a task would run in.
    Pod {
        /// Task manifest (JSON). `-` reads stdin.
        task: PathBuf,

        /// Namespace used when the manifest has none.
        #[arg(short, long, default_value = "default")]
        namespace: String,

        /// Emit compact JSON.
        #[arg(long)]
        compact: bool,
    },
    /// Print the default command of an image for every platform it ships.
    Image {
        reference: String,
    },
}

#[derive(Args, Debug)]
pub struct LogArgs {
    /// Log format, overrides SEQPOD_LOG_FORMAT.
    #[arg(long, global = true)]
    pub log_format: Option<LoggerFormat>,

    /// Log filter, overrides SEQPOD_LOG.
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Args, Debug)]
pub struct RegistryArgs {
    /// Platform whose image defaults fill in missing step commands, overrides SEQPOD_PLATFORM.
    #[arg(long, global = true)]
    pub platform: Option<Platform>,

    /// Registry host reached over plain HTTP. Repeatable.
    #[arg(long = "insecure-registry", global = true)]
    pub insecure: Vec<String>,

    /// Registry request timeout in seconds. Unset waits indefinitely.
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_pod_with_overrides() {
        let cli = Cli::try_parse_from([
            "seqpod-render",
            "pod",
            "task.json",
            "--platform",
            "linux/arm64",
            "--insecure-registry",
            "localhost:5000",
            "--log-format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.registry.platform, Some(Platform::new("linux", "arm64")));
        assert_eq!(cli.registry.insecure, vec!["localhost:5000".to_string()]);
        assert_eq!(cli.log.log_format, Some(LoggerFormat::Json));
        let Command::Pod { task, namespace, compact } = cli.command else {
            panic!("expected pod subcommand");
        };
        assert_eq!(task, PathBuf::from("task.json"));
        assert_eq!(namespace, "default");
        assert!(!compact);
        assert_eq!(cli.registry.timeout, None);
    }

    #[test]
    fn timeout_is_opt_in() {
        let cli = Cli::try_parse_from(["seqpod-render", "image", "alpine", "--timeout", "10"]).unwrap();
        assert_eq!(cli.registry.timeout, Some(10));
    }

    #[test]
    fn rejects_malformed_platform() {
        assert!(Cli::try_parse_from(["seqpod-render", "image", "alpine", "--platform", "linux"]).is_err());
    }
}
