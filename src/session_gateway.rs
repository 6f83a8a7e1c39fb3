//! Session Gateway
//! Authenticated access to the Twitter API. The fetch controller only knows the trait,
//! so it can be driven by a mock in the tests
use std::time::Duration;

use anyhow::Result;
use log::{debug, warn};
use thiserror::Error;
use url::Url;

use crate::config::{AppCredential, UserCredential};
use crate::error::TwitterError;
use crate::oauth::OAuthSigner;
use crate::twitter_object::{ErrorResponse, UserProfile};

const API_SERVER: &str = "https://api.twitter.com";

/// Successful HTTP response
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayResponse {
    pub status: u16,
    pub body: String,
}

/// The request reached the network but did not succeed
/// `code` is the platform error code found in the body, if any
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("request failed (status: {status:?}, code: {code:?}): {message}")]
pub struct TransportError {
    pub status: Option<u16>,
    pub code: Option<i64>,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The request could not be built or signed
    #[error("request was not sent: {0}")]
    Internal(String),
}

#[cfg(test)]
use mockall::automock;
#[cfg_attr(test, automock)]
pub trait SessionGateway {
    /// Whether a user session is present
    fn is_authenticated(&self) -> bool;
    /// Send a signed request
    /// * params: query parameters, they are signed and appended to the url
    fn send(
        &self,
        method: &str,
        url: &str,
        params: &[(String, String)],
    ) -> Result<GatewayResponse, GatewayError>;
    fn fetch_profile(&self, user_id: &str) -> Result<UserProfile, TwitterError>;
}

/// Twitter Client
/// It needs to know the endpoints and all required credentials
pub struct TwitterClient {
    agent: ureq::Agent,
    server: Url,
    app_cred: AppCredential,
    user_cred: Option<UserCredential>,
}

impl TwitterClient {
    /// Constructs new Twitter Client
    /// * app_cred: consumer key and secret of the app
    /// * user_cred: It is optional, without it there is no session and every fetch fails as not authenticated
    pub fn new(app_cred: AppCredential, user_cred: Option<UserCredential>) -> Result<Self> {
        let server = Url::parse(API_SERVER)?;
        let agent: ureq::Agent = ureq::AgentBuilder::new()
            .timeout_read(Duration::from_secs(5))
            .timeout_write(Duration::from_secs(5))
            .build();

        Ok(TwitterClient {
            agent,
            server,
            app_cred,
            user_cred,
        })
    }

    /// Id of the session user
    pub fn user_id(&self) -> Option<&str> {
        self.user_cred.as_ref().map(|cred| cred.user_id.as_str())
    }

    /// Absolute url of an API path e.g. `1.1/users/show.json`
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.server.join(path)?)
    }
}

impl SessionGateway for TwitterClient {
    fn is_authenticated(&self) -> bool {
        self.user_cred.is_some()
    }

    fn send(
        &self,
        method: &str,
        url: &str,
        params: &[(String, String)],
    ) -> Result<GatewayResponse, GatewayError> {
        let user_cred = match &self.user_cred {
            Some(cred) => cred,
            None => return Err(GatewayError::Internal("Credential is not loaded.".to_string())),
        };
        let url = Url::parse(url).map_err(|e| GatewayError::Internal(e.to_string()))?;

        let signer = OAuthSigner::new(
            &self.app_cred.consumer_key,
            &self.app_cred.consumer_secret,
            &user_cred.oauth_token,
            &user_cred.oauth_token_secret,
        );
        let authorization = signer
            .authorization(method, &url, params)
            .map_err(|e| GatewayError::Internal(e.to_string()))?;

        let mut request = self
            .agent
            .request_url(method, &url)
            .set("Authorization", &authorization);
        for (key, value) in params {
            request = request.query(key, value);
        }
        debug!("{} {} {:?}", method, url, params);

        match request.call() {
            Ok(response) => {
                let status = response.status();
                let body = response.into_string().map_err(|e| TransportError {
                    status: Some(status),
                    code: None,
                    message: e.to_string(),
                })?;
                Ok(GatewayResponse { status, body })
            }
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                let code = ErrorResponse::first_code(&body);
                warn!("Request was rejected with {} (code: {:?})", status, code);
                Err(TransportError {
                    status: Some(status),
                    code,
                    message: body,
                }
                .into())
            }
            Err(ureq::Error::Transport(transport)) => Err(TransportError {
                status: None,
                code: None,
                message: transport.to_string(),
            }
            .into()),
        }
    }

    /// Load user information
    /// * user_id: ID of the user account to be fetched
    fn fetch_profile(&self, user_id: &str) -> Result<UserProfile, TwitterError> {
        if !self.is_authenticated() {
            return Err(TwitterError::NotAuthenticated);
        }
        let url = self
            .endpoint("1.1/users/show.json")
            .map_err(|e| TwitterError::Unknown(e.to_string()))?;
        let params = vec![("user_id".to_string(), user_id.to_string())];

        let response = self.send("GET", url.as_str(), &params)?;
        serde_json::from_str(&response.body).map_err(|e| {
            warn!("Profile of {} could not be decoded: {}", user_id, e);
            TwitterError::InvalidResponse
        })
    }
}
