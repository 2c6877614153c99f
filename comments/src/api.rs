use crate::state::Failure;
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(thiserror::Error, Debug)]
pub enum CommentApiError {
    #[error("API rejected the request with status {status}: {body}")]
    Rejected { status: StatusCode, body: String },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<&CommentApiError> for Failure {
    fn from(error: &CommentApiError) -> Self {
        match error {
            CommentApiError::Rejected { status, body } => Failure::Rejected {
                status: status.as_u16(),
                body: body.clone(),
            },
            CommentApiError::Http(e) => Failure::Transport(e.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub post_id: u64,
    pub author_name: String,
    pub content: String,
}

/// Comment endpoints of the content API.
#[async_trait]
pub trait CommentApi: Send + Sync {
    async fn request_otp(&self, email: &str) -> Result<(), CommentApiError>;

    /// Returns the issued token, or `None` when the API accepted the code
    /// without issuing one.
    async fn verify_otp(&self, email: &str, code: &str) -> Result<Option<String>, CommentApiError>;

    /// Looks up the numeric id of a post known by its UUID.
    async fn resolve_post_id(&self, post_id: &str) -> Result<u64, CommentApiError>;

    async fn submit_comment(&self, token: &str, comment: &NewComment) -> Result<(), CommentApiError>;
}

#[derive(Deserialize)]
struct VerifyResponse {
    #[serde(default)]
    token: Option<String>,
}

#[derive(Deserialize)]
struct PostIdResponse {
    id: u64,
}

pub struct HttpCommentApi {
    client: reqwest::Client,
    api_base: String,
}

impl HttpCommentApi {
    pub fn new(api_base: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, CommentApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::warn!(status = %status, body, "comment API rejected request");
    Err(CommentApiError::Rejected { status, body })
}

#[async_trait]
impl CommentApi for HttpCommentApi {
    async fn request_otp(&self, email: &str) -> Result<(), CommentApiError> {
        let response = self
            .client
            .post(self.url("/comments/request-otp"))
            .json(&json!({ "email": email }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn verify_otp(&self, email: &str, code: &str) -> Result<Option<String>, CommentApiError> {
        let response = self
            .client
            .post(self.url("/comments/verify-otp"))
            .json(&json!({ "email": email, "code": code }))
            .send()
            .await?;
        let verified: VerifyResponse = check(response).await?.json().await?;
        Ok(verified.token.filter(|t| !t.is_empty()))
    }

    async fn resolve_post_id(&self, post_id: &str) -> Result<u64, CommentApiError> {
        let response = self
            .client
            .get(self.url(&format!("/posts/uuid/{post_id}")))
            .send()
            .await?;
        let post: PostIdResponse = check(response).await?.json().await?;
        Ok(post.id)
    }

    async fn submit_comment(&self, token: &str, comment: &NewComment) -> Result<(), CommentApiError> {
        let response = self
            .client
            .post(self.url("/comments"))
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .json(comment)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}
