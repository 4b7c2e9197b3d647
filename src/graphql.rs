use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use url::Url;

use crate::types::{
    AuthorAssociation, Comment, Commit, GHOST_LOGIN, PullRequest, Review, ReviewDecision,
    ReviewRequest,
};

pub const SEARCH_QUERY: &str = r#"
    query($query: String!, $first: Int!, $after: String) {
        search(query: $query, type: ISSUE, first: $first, after: $after) {
            nodes {
                ... on PullRequest {
                    number
                    url
                    updatedAt
                    reviewDecision
                    author {
                        login
                    }
                    reviewRequests(first: 100) {
                        nodes {
                            requestedReviewer {
                                ... on User { login }
                                ... on Bot { login }
                                ... on Mannequin { login }
                                ... on Team { combinedSlug }
                            }
                        }
                    }
                    reviews(last: 100) {
                        nodes {
                            author {
                                login
                            }
                            submittedAt
                            authorAssociation
                        }
                    }
                    commits(last: 100) {
                        nodes {
                            commit {
                                authoredDate
                                committedDate
                            }
                        }
                    }
                    comments(last: 100) {
                        nodes {
                            author {
                                login
                            }
                            createdAt
                            body
                        }
                    }
                }
            }
            pageInfo {
                hasNextPage
                endCursor
            }
        }
    }
"#;

/// GitHub caps `first` and `last` on connections at 100.
pub const MAX_PAGE_SIZE: usize = 100;

/// Builds the request body for one page of the stale pull request search.
pub fn create_search_request(
    search_query: &str,
    first: usize,
    after: Option<&str>,
) -> serde_json::Value {
    serde_json::json!({
        "query": SEARCH_QUERY,
        "variables": {
            "query": search_query,
            "first": first.min(MAX_PAGE_SIZE),
            "after": after,
        }
    })
}

#[derive(Debug, Deserialize)]
pub struct GraphQLResponse {
    pub data: Option<SearchData>,
    #[serde(default)]
    pub errors: Vec<GraphQLError>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQLError {
    pub message: String,
}

impl GraphQLResponse {
    /// Returns the search results, or the server's error messages when the
    /// query was rejected.
    pub fn into_search(self) -> Result<SearchResults> {
        if !self.errors.is_empty() {
            let messages: Vec<&str> = self.errors.iter().map(|e| e.message.as_str()).collect();
            anyhow::bail!("GitHub GraphQL query failed: {}", messages.join("; "));
        }
        self.data
            .map(|data| data.search)
            .context("GitHub GraphQL response contained no data")
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchData {
    pub search: SearchResults,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub nodes: Vec<GraphQLPullRequest>,
    pub page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Connection<T> {
    pub nodes: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQLAuthor {
    pub login: String,
}

fn login_or_ghost(author: Option<GraphQLAuthor>) -> String {
    author.map_or_else(|| GHOST_LOGIN.to_string(), |a| a.login)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLPullRequest {
    pub number: u64,
    pub url: String,
    pub updated_at: DateTime<Utc>,
    pub review_decision: Option<ReviewDecision>,
    pub author: Option<GraphQLAuthor>,
    pub review_requests: Connection<GraphQLReviewRequest>,
    pub reviews: Connection<GraphQLReview>,
    pub commits: Connection<GraphQLCommitNode>,
    pub comments: Connection<GraphQLComment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLReviewRequest {
    pub requested_reviewer: Option<GraphQLRequestedReviewer>,
}

/// Users, bots and mannequins have a login. Teams are mentioned by their
/// `org/slug` combined slug.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLRequestedReviewer {
    pub login: Option<String>,
    pub combined_slug: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLReview {
    pub author: Option<GraphQLAuthor>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub author_association: AuthorAssociation,
}

#[derive(Debug, Deserialize)]
pub struct GraphQLCommitNode {
    pub commit: GraphQLCommit,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLCommit {
    pub authored_date: DateTime<Utc>,
    pub committed_date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLComment {
    pub author: Option<GraphQLAuthor>,
    pub created_at: DateTime<Utc>,
    pub body: String,
}

pub fn convert_review_requests(
    requests: Connection<GraphQLReviewRequest>,
) -> Vec<ReviewRequest> {
    requests
        .nodes
        .into_iter()
        .filter_map(|request| request.requested_reviewer)
        .filter_map(|reviewer| reviewer.login.or(reviewer.combined_slug))
        .map(|reviewer| ReviewRequest { reviewer })
        .collect()
}

/// Pending reviews have no submission time yet and are skipped.
pub fn convert_reviews(reviews: Connection<GraphQLReview>) -> Vec<Review> {
    reviews
        .nodes
        .into_iter()
        .filter_map(|review| {
            Some(Review {
                submitted_at: review.submitted_at?,
                author: login_or_ghost(review.author),
                association: review.author_association,
            })
        })
        .collect()
}

pub fn convert_commits(commits: Connection<GraphQLCommitNode>) -> Vec<Commit> {
    commits
        .nodes
        .into_iter()
        .map(|node| Commit {
            authored_at: node.commit.authored_date,
            committed_at: node.commit.committed_date,
        })
        .collect()
}

pub fn convert_comments(comments: Connection<GraphQLComment>) -> Vec<Comment> {
    comments
        .nodes
        .into_iter()
        .map(|comment| Comment {
            author: login_or_ghost(comment.author),
            created_at: comment.created_at,
            body: comment.body,
        })
        .collect()
}

pub fn convert_graphql_pr(graphql_pr: GraphQLPullRequest) -> Result<PullRequest> {
    let url = Url::parse(&graphql_pr.url)
        .with_context(|| format!("Invalid URL for PR #{}: '{}'", graphql_pr.number, graphql_pr.url))?;

    Ok(PullRequest {
        number: graphql_pr.number,
        author: login_or_ghost(graphql_pr.author),
        url,
        updated_at: graphql_pr.updated_at,
        review_decision: graphql_pr.review_decision,
        comments: convert_comments(graphql_pr.comments),
        commits: convert_commits(graphql_pr.commits),
        review_requests: convert_review_requests(graphql_pr.review_requests),
        reviews: convert_reviews(graphql_pr.reviews),
    })
}
