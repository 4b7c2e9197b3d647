use std::io::Write;

use anyhow::{Context, Result};
use chrono_humanize::HumanTime;
use tracing::info;
use url::Url;

use crate::{
    classify::{Routing, route},
    types::{CommentSink, Config, PermissionLookup, PullRequest, PullRequestSource, Repo},
};

/// A reminder decided for one stale pull request.
#[derive(Debug, Clone, PartialEq)]
pub struct Reminder {
    pub number: u64,
    pub url: Url,
    pub routing: Routing,
    pub body: String,
}

impl Reminder {
    pub fn for_pull_request(pr: &PullRequest, routing: Routing, stale_weeks: u32) -> Self {
        Self {
            number: pr.number,
            url: pr.url.clone(),
            body: routing.message(&pr.author, stale_weeks),
            routing,
        }
    }

    /// The `gh` invocation that posts this reminder.
    pub fn gh_command(&self, repo: &Repo) -> Vec<String> {
        vec![
            "gh".to_string(),
            "pr".to_string(),
            "-R".to_string(),
            repo.to_string(),
            "comment".to_string(),
            self.number.to_string(),
            "--body".to_string(),
            self.body.clone(),
        ]
    }
}

/// Joins arguments into a line that can be pasted into a POSIX shell.
/// Arguments containing whitespace are single-quoted.
pub fn format_shell_command(args: &[String]) -> String {
    args.iter()
        .map(|arg| {
            if arg.is_empty() {
                "''".to_string()
            } else if arg.chars().any(char::is_whitespace) || arg.contains('\'') {
                format!("'{}'", arg.replace('\'', r"'\''"))
            } else {
                arg.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

async fn author_can_merge<P>(permissions: &P, repo: &Repo, login: &str) -> Result<bool>
where
    P: PermissionLookup + ?Sized,
{
    Ok(permissions.permission(repo, login).await?.can_merge())
}

/// Fetches stale pull requests and sends a reminder to each one.
///
/// Pull requests are handled one at a time in the order the forge returns
/// them. In dry-run mode the equivalent `gh` command is written to `out` and
/// nothing is posted. The first failing lookup or post aborts the run;
/// reminders already posted stay posted.
pub async fn remind_stale_pull_requests<F, W>(
    config: &Config,
    forge: &F,
    out: &mut W,
) -> Result<Vec<Reminder>>
where
    F: PullRequestSource + PermissionLookup + CommentSink + Sync,
    W: Write,
{
    let pulls = forge.fetch_stale_pull_requests(config).await?;
    info!(count = pulls.len(), repo = %config.repo, "found stale pull requests");

    let mut reminders = Vec::with_capacity(pulls.len());

    for pr in &pulls {
        let routing = route(pr, &config.ci_marker, move || {
            author_can_merge(forge, &config.repo, &pr.author)
        })
        .await
        .with_context(|| format!("Failed to decide reminder for {}", pr.url))?;

        info!(
            number = pr.number,
            routing = routing.as_str(),
            "last updated {}",
            HumanTime::from(pr.updated_at)
        );

        let reminder = Reminder::for_pull_request(pr, routing, config.stale_weeks);

        if config.dry_run {
            writeln!(
                out,
                "{}",
                format_shell_command(&reminder.gh_command(&config.repo))
            )?;
        } else {
            forge
                .post_comment(&config.repo, reminder.number, &reminder.body)
                .await?;
        }

        reminders.push(reminder);
    }

    Ok(reminders)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_format_plain_args() {
        assert_eq!(
            format_shell_command(&args(&["gh", "pr", "-R", "o/r", "comment", "7"])),
            "gh pr -R o/r comment 7"
        );
    }

    #[test]
    fn test_format_quotes_whitespace() {
        assert_eq!(
            format_shell_command(&args(&["--body", "please review", "a\tb", "line\nbreak"])),
            "--body 'please review' 'a\tb' 'line\nbreak'"
        );
    }

    #[test]
    fn test_format_escapes_single_quotes_and_empty() {
        assert_eq!(
            format_shell_command(&args(&["it's done", ""])),
            r"'it'\''s done' ''"
        );
    }
}
