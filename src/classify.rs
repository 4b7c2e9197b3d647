//! Decides who a stale pull request reminder is addressed to and what it
//! says.
//!
//! Routing looks at two timestamps: the latest interaction from a reviewer
//! and the latest interaction from the author. An approved pull request is
//! handed to whoever can merge it. Otherwise the reminder goes to the author
//! when reviewers spoke last, and to the reviewers in every other case.

use std::{collections::BTreeSet, future::Future};

use chrono::{DateTime, Utc};

use crate::types::{Comment, DISTANT_PAST, PullRequest};

/// Placeholder used when nobody has been asked to review.
pub const CODE_OWNERS: &str = "Code Owners of this repository";

const CLOSE_OR_DRAFT: &str = "Should the PR be no longer relevant, please close it. \
    Should you take more time to work on it, please mark it as draft to disable these \
    notifications.";

/// Who gets pinged and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routing {
    /// Approved, and the author can merge it themselves.
    MergeOrClose,
    /// Approved, but the author lacks merge access.
    HelpMerge { reviewers: Vec<String> },
    /// Reviewers responded after the author's last activity.
    AddressFeedback,
    /// Waiting on reviewers.
    RequestReview { reviewers: Vec<String> },
}

/// The latest activity on each side of a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interactions {
    pub last_reviewer: DateTime<Utc>,
    pub last_author: DateTime<Utc>,
}

impl Interactions {
    pub fn of(pr: &PullRequest, reviewers: &[String], ci_marker: &str) -> Self {
        Self {
            last_reviewer: last_reviewer_interaction(pr, reviewers, ci_marker),
            last_author: last_author_interaction(pr, ci_marker),
        }
    }

    pub fn waiting_on_author(&self) -> bool {
        self.last_author < self.last_reviewer
    }
}

fn is_human_comment(comment: &Comment, ci_marker: &str) -> bool {
    !comment.body.contains(ci_marker)
}

/// Requested reviewers plus affiliated reviewers who already reviewed,
/// deduplicated and sorted.
pub fn relevant_reviewers(pr: &PullRequest) -> Vec<String> {
    let requested = pr.review_requests.iter().map(|r| r.reviewer.clone());
    let reviewed = pr
        .reviews
        .iter()
        .filter(|review| review.association.is_affiliated())
        .map(|review| review.author.clone());

    requested
        .chain(reviewed)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn last_reviewer_interaction(
    pr: &PullRequest,
    reviewers: &[String],
    ci_marker: &str,
) -> DateTime<Utc> {
    let reviews = pr
        .reviews
        .iter()
        .filter(|review| review.association.is_affiliated())
        .map(|review| review.submitted_at);
    let comments = pr
        .comments
        .iter()
        .filter(|c| reviewers.contains(&c.author) && is_human_comment(c, ci_marker))
        .map(|c| c.created_at);

    reviews.chain(comments).max().unwrap_or(DISTANT_PAST)
}

pub fn last_author_interaction(pr: &PullRequest, ci_marker: &str) -> DateTime<Utc> {
    let commits = pr
        .commits
        .iter()
        .flat_map(|commit| [commit.authored_at, commit.committed_at]);
    let comments = pr
        .comments
        .iter()
        .filter(|c| c.author == pr.author && is_human_comment(c, ci_marker))
        .map(|c| c.created_at);

    commits.chain(comments).max().unwrap_or(DISTANT_PAST)
}

/// Picks the routing for a pull request.
///
/// `author_can_merge` is only consulted for approved pull requests, so a
/// permission lookup behind it is skipped for everything else.
pub async fn route<F, Fut>(
    pr: &PullRequest,
    ci_marker: &str,
    author_can_merge: F,
) -> anyhow::Result<Routing>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<bool>>,
{
    let reviewers = relevant_reviewers(pr);

    if pr.is_approved() {
        return Ok(if author_can_merge().await? {
            Routing::MergeOrClose
        } else {
            Routing::HelpMerge { reviewers }
        });
    }

    if Interactions::of(pr, &reviewers, ci_marker).waiting_on_author() {
        Ok(Routing::AddressFeedback)
    } else {
        Ok(Routing::RequestReview { reviewers })
    }
}

/// `@alice, @bob`, or the code owners placeholder when nobody is listed.
pub fn mention_reviewers(reviewers: &[String]) -> String {
    if reviewers.is_empty() {
        return CODE_OWNERS.to_string();
    }
    reviewers
        .iter()
        .map(|r| format!("@{}", r))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Routing {
    /// Renders the full comment body.
    pub fn message(&self, author: &str, stale_weeks: u32) -> String {
        let request = match self {
            Routing::MergeOrClose => format!(
                "@{} given this PR has an approving review, please try and merge the PR.",
                author
            ),
            Routing::HelpMerge { reviewers } => format!(
                "{} given this PR has an approving review but the author does not have merge \
                 access, please help the author to make the PR pass CI checks and get it merged.",
                mention_reviewers(reviewers)
            ),
            Routing::AddressFeedback => format!(
                "@{} to help move this PR forward, please address the review feedback.",
                author
            ),
            Routing::RequestReview { reviewers } => format!(
                "{} to help move this PR forward, please review it.",
                mention_reviewers(reviewers)
            ),
        };

        format!(
            "This PR has not been modified for {} weeks. {} {}",
            stale_weeks, request, CLOSE_OR_DRAFT
        )
    }

    /// Short label used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Routing::MergeOrClose => "merge-or-close",
            Routing::HelpMerge { .. } => "help-merge",
            Routing::AddressFeedback => "address-feedback",
            Routing::RequestReview { .. } => "request-review",
        }
    }
}
