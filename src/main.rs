use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use pkgvc::installer::{Installer, Overwrite};
use pkgvc::registry::{LocalActivator, LocalIndex, NullTransactionInstaller};
use pkgvc::resolve::SpecResolver;
use pkgvc::runtime::{RealRuntime, Runtime};
use pkgvc::vcs::GitVcs;

/// pkgvc - install packages directly from version control
///
/// Resolves a package name or repository URL, clones the source, installs
/// the dependencies its headers declare, and activates the checkout as an
/// installed package.
///
/// Examples:
///   pkgvc install foo                             # from the local index
///   pkgvc install https://example.com/foo.git     # straight from a URL
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Install root directory (overrides defaults; also via PKGVC_ROOT)
    #[arg(
        long = "root",
        short = 'r',
        env = "PKGVC_ROOT",
        value_name = "PATH",
        global = true
    )]
    install_root: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Check out and install a package from its repository
    Install(InstallArgs),
}

#[derive(clap::Args, Debug)]
struct InstallArgs {
    /// Package name from the index, or a repository URL
    #[arg(value_name = "NAME_OR_URL")]
    spec: String,

    /// Install under this name instead of the derived one
    #[arg(long, value_name = "NAME")]
    name: Option<String>,

    /// Revision (commit, tag, or branch) to check out
    #[arg(long, value_name = "REV")]
    rev: Option<String>,

    /// Overwrite an existing checkout without prompting
    #[arg(long, short = 'y')]
    yes: bool,

    /// Give up on clone/checkout after this many seconds
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,
}

fn default_root<R: Runtime>(runtime: &R) -> Result<PathBuf> {
    Ok(runtime
        .home_dir()
        .context("Cannot determine home directory")?
        .join(".pkgvc")
        .join("packages"))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = Arc::new(RealRuntime);

    match cli.command {
        Commands::Install(args) => {
            let root = match cli.install_root {
                Some(root) => root,
                None => default_root(runtime.as_ref())?,
            };

            let index = LocalIndex::load(runtime.as_ref(), &root.join("index.json"))?;
            let mut desc = SpecResolver::new(&index).resolve(
                &args.spec,
                args.name.as_deref(),
                args.rev.as_deref(),
            )?;

            let mut installer = Installer::new(
                Arc::clone(&runtime),
                Arc::new(GitVcs),
                Arc::new(NullTransactionInstaller),
                Arc::new(LocalActivator::new(Arc::clone(&runtime))),
                root,
            );
            if args.yes {
                installer = installer.with_overwrite(Overwrite::Always);
            }
            if let Some(secs) = args.timeout {
                installer = installer.with_deadline(Duration::from_secs(secs));
            }

            let dir = installer.install(&mut desc).await?;
            println!(
                "Installed {} {} at {}",
                desc.name,
                desc.version.as_deref().unwrap_or("0"),
                dir.display()
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_install_parsing() {
        let cli = Cli::try_parse_from(["pkgvc", "install", "foo"]).unwrap();
        match cli.command {
            Commands::Install(args) => {
                assert_eq!(args.spec, "foo");
                assert_eq!(args.name, None);
                assert_eq!(args.rev, None);
                assert!(!args.yes);
            }
        }
        assert_eq!(cli.install_root, None);
    }

    #[test]
    fn test_cli_install_url_with_flags() {
        let cli = Cli::try_parse_from([
            "pkgvc",
            "install",
            "https://example.com/foo.git",
            "--name",
            "foo",
            "--rev",
            "deadbeef",
            "-y",
        ])
        .unwrap();
        match cli.command {
            Commands::Install(args) => {
                assert_eq!(args.spec, "https://example.com/foo.git");
                assert_eq!(args.name.as_deref(), Some("foo"));
                assert_eq!(args.rev.as_deref(), Some("deadbeef"));
                assert!(args.yes);
            }
        }
    }

    #[test]
    fn test_cli_global_root_parsing() {
        let cli = Cli::try_parse_from(["pkgvc", "--root", "/tmp/pkgs", "install", "foo"]).unwrap();
        assert_eq!(cli.install_root, Some(PathBuf::from("/tmp/pkgs")));
    }

    #[test]
    fn test_cli_timeout_parsing() {
        let cli =
            Cli::try_parse_from(["pkgvc", "install", "foo", "--timeout", "30"]).unwrap();
        match cli.command {
            Commands::Install(args) => assert_eq!(args.timeout, Some(30)),
        }
    }

    #[test]
    fn test_cli_no_subcommand_fails() {
        assert!(Cli::try_parse_from(["pkgvc", "foo"]).is_err());
    }
}
