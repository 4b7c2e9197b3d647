//! Prnudge: reminders for stale pull requests.
//!
//! Finds open, non-draft pull requests that have not been updated for a
//! configurable number of weeks and posts a comment asking whoever the PR is
//! waiting on to move it forward: the author when reviewers spoke last or
//! when it is approved and they can merge, the reviewers otherwise. A dry-run
//! mode prints the equivalent `gh` commands instead of posting.

pub mod classify;
pub mod cli;
pub mod github;
mod graphql;
pub mod query;
mod search;
pub mod types;

pub use classify::{CODE_OWNERS, Interactions, Routing, relevant_reviewers, route};
pub use cli::{parse_args, parse_args_at};
pub use github::GitHub;
pub use query::{Reminder, format_shell_command, remind_stale_pull_requests};
pub use types::{
    AuthorAssociation, Comment, CommentSink, Commit, Config, DEFAULT_CI_MARKER, DEFAULT_LIMIT,
    DISTANT_PAST, MAX_LIMIT, Permission, PermissionLookup, PullRequest, PullRequestSource, Repo,
    RepoError, Review, ReviewDecision, ReviewRequest,
};
