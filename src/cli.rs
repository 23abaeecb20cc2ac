use std::path::PathBuf;

use clap::Parser;

/// Watch a repository and write Markdown change reports.
#[derive(Parser, Debug)]
#[command(name = "repo-sentinel", version)]
pub struct Cli {
    /// Run a single check and exit instead of scheduling.
    #[arg(long)]
    pub once: bool,

    /// Load environment variables from this file instead of `./.env`.
    #[arg(long, value_name = "PATH")]
    pub env_file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["repo-sentinel"]).unwrap();
        assert!(!cli.once);
        assert!(cli.env_file.is_none());
    }

    #[test]
    fn test_flags() {
        let cli =
            Cli::try_parse_from(["repo-sentinel", "--once", "--env-file", "conf/prod.env"]).unwrap();
        assert!(cli.once);
        assert_eq!(cli.env_file, Some(PathBuf::from("conf/prod.env")));
    }

    #[test]
    fn test_unknown_flag_rejected() {
        assert!(Cli::try_parse_from(["repo-sentinel", "--watch"]).is_err());
    }
}
