mod checker;
mod config;
mod github;
mod output;
mod platform;
mod registry;
mod release;
mod version_check;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::checker::ReadinessChecker;
use crate::config::{CheckerConfig, DEFAULT_CONFIG_FILE, Overrides, load_file_config};
use crate::github::GithubReleases;
use crate::output::{EnvFileSink, GITHUB_ENV, GITHUB_OUTPUT};
use crate::platform::Platform;
use crate::registry::DockerHub;
use crate::version_check::DEFAULT_VERSION_FILE;

#[derive(Parser, Debug)]
#[command(
    name = "relgate",
    version,
    about = "Gate downstream image builds on upstream releases",
    long_about = None
)]
struct Cli {
    /// Config file to read instead of ./.relgate.toml
    #[arg(global = true, long, env = "RELGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Upstream GitHub repository as owner/name
    #[arg(global = true, long, env = "RELGATE_REPO")]
    repo: Option<String>,

    /// Base URL of the GitHub REST API
    #[arg(global = true, long, env = "RELGATE_GITHUB_API")]
    github_api: Option<String>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(global = true, short, long, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decide whether the custom image needs a build for the latest release
    Check(CheckArgs),
    /// Report whether upstream published a release newer than the recorded one
    Release(ReleaseArgs),
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Official upstream image, e.g. library/caddy
    #[arg(long, env = "RELGATE_OFFICIAL_IMAGE")]
    official_image: Option<String>,

    /// Downstream image to build
    #[arg(long, env = "DOCKERHUB_REPOSITORY_NAME")]
    custom_image: Option<String>,

    /// Extra prefix for the downstream image tag
    #[arg(long, env = "RELGATE_CUSTOM_TAG_PREFIX")]
    custom_tag_prefix: Option<String>,

    /// Required platform, repeatable or comma separated (e.g. linux/arm/v7)
    #[arg(
        long = "platform",
        value_name = "PLATFORM",
        env = "RELGATE_PLATFORMS",
        value_delimiter = ','
    )]
    platforms: Vec<Platform>,

    /// Base URL of the registry API
    #[arg(long, env = "RELGATE_REGISTRY_API")]
    registry_api: Option<String>,
}

#[derive(Args, Debug)]
struct ReleaseArgs {
    /// Previously released version; falls back to the version file
    #[arg(long, env = "PREVIOUS_VERSION")]
    previous_version: Option<String>,

    /// JSON file holding the recorded version under "version"
    #[arg(long, default_value = DEFAULT_VERSION_FILE)]
    version_file: PathBuf,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn resolve_config(cli: &Cli, overrides: Overrides) -> Result<CheckerConfig> {
    let (path, explicit) = match &cli.config {
        Some(path) => (path.clone(), true),
        None => (Path::new(DEFAULT_CONFIG_FILE).to_path_buf(), false),
    };
    let file = load_file_config(&path, explicit).await?;
    let overrides = Overrides {
        repo: cli.repo.clone(),
        github_api: cli.github_api.clone(),
        ..overrides
    };
    CheckerConfig::resolve(file, overrides).context("invalid configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = run(&cli).await;
    if let Err(err) = &result {
        output::annotate_error(&format!("{:#}", err));
    }
    result
}

async fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Check(args) => {
            let overrides = Overrides {
                official_image: args.official_image.clone(),
                custom_image: args.custom_image.clone(),
                custom_tag_prefix: args.custom_tag_prefix.clone(),
                required_platforms: (!args.platforms.is_empty()).then(|| args.platforms.clone()),
                registry_api: args.registry_api.clone(),
                ..Overrides::default()
            };
            let cfg = resolve_config(cli, overrides).await?;
            let gh = github::client(&cfg.github_api, cfg.github_timeout)?;
            let registry = DockerHub::new(&cfg.registry_api, cfg.registry_timeout)?;
            let checker = ReadinessChecker::new(cfg, GithubReleases::new(gh), registry);
            let mut sink = EnvFileSink::from_env(GITHUB_OUTPUT);
            let decision = checker.run(&mut sink).await?;
            let custom = decision
                .custom
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| String::from("skipped"));
            println!(
                "check: done (needs_build={} latest_version={} official={} custom={})",
                decision.needs_build, decision.latest_version, decision.official, custom
            );
        }
        Commands::Release(args) => {
            let cfg = resolve_config(cli, Overrides::default()).await?;
            let previous =
                version_check::previous_version(args.previous_version.clone(), &args.version_file)
                    .await?;
            let gh = github::client(&cfg.github_api, cfg.github_timeout)?;
            let mut sink = EnvFileSink::from_env(GITHUB_ENV);
            let check = version_check::run_version_check(
                &GithubReleases::new(gh),
                &cfg.repo,
                &previous,
                &mut sink,
            )
            .await?;
            println!(
                "release: done (new_release={} latest={} previous={})",
                check.is_new, check.latest, check.previous
            );
        }
    }

    Ok(())
}
