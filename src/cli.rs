use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Parser;

use crate::types::{Config, DEFAULT_CI_MARKER, MAX_LIMIT, Repo};

#[derive(Parser, Debug)]
#[command(name = "prnudge", version)]
#[command(
    about = "Find open pull requests nobody has touched in a while and post a reminder to whoever is holding them up"
)]
struct CliArgs {
    /// Number of weeks without updates after which a PR is considered stale
    #[arg(long = "stale-duration", value_name = "WEEKS", value_parser = clap::value_parser!(u32).range(1..))]
    pub stale_duration: u32,

    /// Repository to check for stale PRs, e.g. swiftlang/swift-syntax
    #[arg(short = 'r', long, value_name = "OWNER/REPO")]
    pub repo: String,

    /// Print the gh commands that would post the reminders instead of posting them
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Comments containing this text are treated as CI bot commands and ignored
    #[arg(long = "ci-marker", value_name = "TEXT", default_value = DEFAULT_CI_MARKER)]
    pub ci_marker: String,

    /// Maximum number of stale PRs to process (at most 2000)
    #[arg(short = 'L', long, default_value = "30", value_name = "NUM", value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_LIMIT)))]
    pub limit: u32,
}

impl CliArgs {
    pub fn validate(&self) -> Result<()> {
        if self.ci_marker.trim().is_empty() {
            anyhow::bail!("--ci-marker cannot be empty");
        }
        Ok(())
    }
}

fn build_config(cli: CliArgs, now: DateTime<Utc>) -> Result<Config> {
    cli.validate()?;

    let repo = Repo::parse(&cli.repo)
        .map_err(|e| anyhow::anyhow!("Invalid repository format '{}': {}", cli.repo, e))?;

    Ok(Config::new(repo, cli.stale_duration, now)
        .with_dry_run(cli.dry_run)
        .with_ci_marker(cli.ci_marker)
        .with_limit(cli.limit as usize))
}

/// Parses command-line arguments into a run configuration, with the
/// staleness cutoff measured back from `now`.
pub fn parse_args_at<I, T>(args: I, now: DateTime<Utc>) -> Result<Config>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = CliArgs::try_parse_from(args)?;
    build_config(cli, now)
}

/// Parses command-line arguments into a run configuration.
pub fn parse_args<I, T>(args: I) -> Result<Config>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    parse_args_at(args, Utc::now())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        CliArgs::command().debug_assert();
    }
}
