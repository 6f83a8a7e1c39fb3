//! Twitter API v1.1 object definitions
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Author identity, as it appears in the `user` object of a tweet
/// Identity is the `id`, the other fields are display only
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub screen_name: String,
    pub profile_image_url: Option<String>,
}

/// One tweet of a timeline page
/// `id` is kept as string because the numeric value does not fit in a JSON double
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TweetRecord {
    pub id: String,
    pub author: User,
    pub text: Option<String>,
    pub created_at: Option<DateTime<FixedOffset>>,
}

/// Response of `users/show.json`
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct UserProfile {
    pub id_str: String,
    pub name: String,
    pub screen_name: String,
    pub description: Option<String>,
    pub profile_image_url_https: Option<String>,
    #[serde(default)]
    pub followers_count: u64,
    #[serde(default)]
    pub friends_count: u64,
    #[serde(default)]
    pub statuses_count: u64,
}

/// Error body of the v1.1 API, e.g. `{"errors":[{"code":88,"message":"Rate limit exceeded"}]}`
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    pub code: i64,
    pub message: String,
}

impl ErrorResponse {
    /// The first platform error code of the body, if the body is a Twitter error object
    pub fn first_code(body: &str) -> Option<i64> {
        serde_json::from_str::<ErrorResponse>(body)
            .ok()
            .and_then(|res| res.errors.first().map(|detail| detail.code))
    }
}
