use std::{fmt, sync::OnceLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::Deserialize;
use url::Url;

/// Marker that identifies comments addressed to the CI bot.
pub const DEFAULT_CI_MARKER: &str = "@swift-ci";

/// Default number of pull requests fetched per run (same as `gh pr list`).
pub const DEFAULT_LIMIT: usize = 30;

/// Most pull requests one run can page through.
pub const MAX_LIMIT: u32 = 2000;

/// Timestamp used when a pull request has no interaction of a given kind.
///
/// Must compare less than any real interaction timestamp, so a pull request
/// with no activity at all never looks like it is waiting on its author.
pub const DISTANT_PAST: DateTime<Utc> = DateTime::<Utc>::UNIX_EPOCH;

/// Login GitHub reports for authors whose account has been deleted.
pub const GHOST_LOGIN: &str = "ghost";

/// Errors produced when parsing an `owner/name` repository identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoError {
    InvalidFormat(String),
    EmptyOwner,
    EmptyName,
    InvalidCharacters(String),
}

impl fmt::Display for RepoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoError::InvalidFormat(s) => {
                write!(f, "expected 'owner/name', got '{}'", s)
            }
            RepoError::EmptyOwner => write!(f, "repository owner cannot be empty"),
            RepoError::EmptyName => write!(f, "repository name cannot be empty"),
            RepoError::InvalidCharacters(part) => {
                write!(f, "'{}' contains characters not allowed by GitHub", part)
            }
        }
    }
}

impl std::error::Error for RepoError {}

fn repo_component_regex() -> &'static Regex {
    static COMPONENT: OnceLock<Regex> = OnceLock::new();
    COMPONENT.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("valid regex"))
}

/// A GitHub repository identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Repo {
    owner: String,
    name: String,
}

impl Repo {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Result<Self, RepoError> {
        let owner = owner.into();
        let name = name.into();

        if owner.is_empty() {
            return Err(RepoError::EmptyOwner);
        }
        if name.is_empty() {
            return Err(RepoError::EmptyName);
        }

        let component = repo_component_regex();
        for part in [&owner, &name] {
            if !component.is_match(part) {
                return Err(RepoError::InvalidCharacters(part.clone()));
            }
        }

        Ok(Self { owner, name })
    }

    /// Parses `owner/name`.
    pub fn parse(s: &str) -> Result<Self, RepoError> {
        let s = s.trim();
        match s.split_once('/') {
            Some((owner, name)) if !name.contains('/') => Self::new(owner, name),
            _ => Err(RepoError::InvalidFormat(s.to_string())),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Repo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Aggregate review state GitHub computes for a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewDecision {
    Approved,
    ChangesRequested,
    ReviewRequired,
}

/// How a review author is related to the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorAssociation {
    Collaborator,
    Contributor,
    FirstTimer,
    FirstTimeContributor,
    Mannequin,
    Member,
    None,
    Owner,
}

impl AuthorAssociation {
    /// Collaborators, members and owners. Reviews from anyone else do not
    /// affect who gets pinged.
    pub fn is_affiliated(&self) -> bool {
        matches!(
            self,
            AuthorAssociation::Collaborator | AuthorAssociation::Member | AuthorAssociation::Owner
        )
    }
}

/// Repository permission level reported for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Admin,
    Maintain,
    Write,
    Push,
    Triage,
    Read,
    None,
}

impl Permission {
    pub fn can_merge(&self) -> bool {
        matches!(
            self,
            Permission::Write | Permission::Push | Permission::Admin
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub body: String,
}

/// Author and committer dates differ after a rebase or amend.
#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
    pub authored_at: DateTime<Utc>,
    pub committed_at: DateTime<Utc>,
}

/// A submitted review.
#[derive(Debug, Clone, PartialEq)]
pub struct Review {
    pub author: String,
    pub submitted_at: DateTime<Utc>,
    pub association: AuthorAssociation,
}

/// A reviewer (user login or team slug) who has been asked for a review but
/// has not given one yet.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewRequest {
    pub reviewer: String,
}

/// Snapshot of a stale pull request and the activity needed to route a
/// reminder.
#[derive(Debug, Clone, PartialEq)]
pub struct PullRequest {
    pub number: u64,
    pub author: String,
    pub url: Url,
    pub updated_at: DateTime<Utc>,
    pub review_decision: Option<ReviewDecision>,
    pub comments: Vec<Comment>,
    pub commits: Vec<Commit>,
    pub review_requests: Vec<ReviewRequest>,
    pub reviews: Vec<Review>,
}

impl PullRequest {
    pub fn is_approved(&self) -> bool {
        self.review_decision == Some(ReviewDecision::Approved)
    }
}

/// Run configuration. Built once from the command line and passed by
/// reference to everything that needs it.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub repo: Repo,
    pub stale_weeks: u32,
    /// Pull requests last updated before this instant are stale.
    pub cutoff: DateTime<Utc>,
    pub dry_run: bool,
    pub ci_marker: String,
    pub limit: usize,
}

impl Config {
    pub fn new(repo: Repo, stale_weeks: u32, now: DateTime<Utc>) -> Self {
        Self {
            repo,
            stale_weeks,
            cutoff: now - Duration::weeks(i64::from(stale_weeks)),
            dry_run: false,
            ci_marker: DEFAULT_CI_MARKER.to_string(),
            limit: DEFAULT_LIMIT,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_ci_marker(mut self, marker: impl Into<String>) -> Self {
        self.ci_marker = marker.into();
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// Source of stale pull requests.
#[async_trait]
pub trait PullRequestSource {
    /// Returns open, non-draft pull requests in `config.repo` last updated
    /// before `config.cutoff`. Filtering happens on the server.
    async fn fetch_stale_pull_requests(&self, config: &Config) -> anyhow::Result<Vec<PullRequest>>;
}

#[async_trait]
pub trait PermissionLookup {
    async fn permission(&self, repo: &Repo, login: &str) -> anyhow::Result<Permission>;
}

#[async_trait]
pub trait CommentSink {
    async fn post_comment(&self, repo: &Repo, number: u64, body: &str) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_repo_parse_valid() {
        let repo = Repo::parse("swiftlang/swift-syntax").unwrap();
        assert_eq!(repo.owner(), "swiftlang");
        assert_eq!(repo.name(), "swift-syntax");
        assert_eq!(repo.to_string(), "swiftlang/swift-syntax");
    }

    #[test]
    fn test_repo_parse_trims_whitespace() {
        let repo = Repo::parse("  owner/repo.rs ").unwrap();
        assert_eq!(repo.to_string(), "owner/repo.rs");
    }

    #[test]
    fn test_repo_parse_rejects_bad_shapes() {
        assert_eq!(
            Repo::parse("owner"),
            Err(RepoError::InvalidFormat("owner".to_string()))
        );
        assert!(matches!(
            Repo::parse("a/b/c"),
            Err(RepoError::InvalidFormat(_))
        ));
        assert_eq!(Repo::parse("/repo"), Err(RepoError::EmptyOwner));
        assert_eq!(Repo::parse("owner/"), Err(RepoError::EmptyName));
        assert_eq!(
            Repo::parse("own er/repo"),
            Err(RepoError::InvalidCharacters("own er".to_string()))
        );
    }

    #[test]
    fn test_merge_capable_permissions() {
        assert!(Permission::Admin.can_merge());
        assert!(Permission::Write.can_merge());
        assert!(Permission::Push.can_merge());
        assert!(!Permission::Maintain.can_merge());
        assert!(!Permission::Triage.can_merge());
        assert!(!Permission::Read.can_merge());
        assert!(!Permission::None.can_merge());
    }

    #[test]
    fn test_permission_deserializes_lowercase() {
        let p: Permission = serde_json::from_str("\"write\"").unwrap();
        assert_eq!(p, Permission::Write);
        assert!(serde_json::from_str::<Permission>("\"superuser\"").is_err());
    }

    #[test]
    fn test_association_affiliation() {
        assert!(AuthorAssociation::Owner.is_affiliated());
        assert!(AuthorAssociation::Member.is_affiliated());
        assert!(AuthorAssociation::Collaborator.is_affiliated());
        assert!(!AuthorAssociation::Contributor.is_affiliated());
        assert!(!AuthorAssociation::FirstTimeContributor.is_affiliated());
        assert!(!AuthorAssociation::None.is_affiliated());
    }

    #[test]
    fn test_config_cutoff_is_weeks_before_now() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let config = Config::new(Repo::parse("owner/repo").unwrap(), 2, now);
        assert_eq!(
            config.cutoff,
            Utc.with_ymd_and_hms(2024, 2, 16, 12, 0, 0).unwrap()
        );
        assert!(!config.dry_run);
        assert_eq!(config.ci_marker, DEFAULT_CI_MARKER);
        assert_eq!(config.limit, DEFAULT_LIMIT);
    }

    #[test]
    fn test_distant_past_is_before_any_real_timestamp() {
        let early = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 1).unwrap();
        assert!(DISTANT_PAST < early);
    }
}
