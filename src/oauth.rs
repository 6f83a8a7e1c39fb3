//! OAuth 1.0a signature for user-context requests
//! ref: <https://developer.twitter.com/en/docs/authentication/oauth-1-0a/creating-a-signature>
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use url::Url;
use uuid::Uuid;

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const OAUTH_VERSION: &str = "1.0";

/// Signs requests with the app credential(consumer) and the user credential(token)
pub struct OAuthSigner<'a> {
    consumer_key: &'a str,
    consumer_secret: &'a str,
    token: &'a str,
    token_secret: &'a str,
}

impl<'a> OAuthSigner<'a> {
    pub fn new(
        consumer_key: &'a str,
        consumer_secret: &'a str,
        token: &'a str,
        token_secret: &'a str,
    ) -> Self {
        OAuthSigner {
            consumer_key,
            consumer_secret,
            token,
            token_secret,
        }
    }

    /// Value of the `Authorization` header
    /// * method: HTTP method e.g. GET
    /// * url: endpoint, its query string is not signed (pass it in `params`)
    /// * params: query parameters sent with the request
    pub fn authorization(
        &self,
        method: &str,
        url: &Url,
        params: &[(String, String)],
    ) -> Result<String> {
        let nonce = Uuid::new_v4().simple().to_string();
        let timestamp = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        Ok(self.authorization_with(method, url, params, &nonce, timestamp))
    }

    fn authorization_with(
        &self,
        method: &str,
        url: &Url,
        params: &[(String, String)],
        nonce: &str,
        timestamp: u64,
    ) -> String {
        let mut oauth_params = self.oauth_params(nonce, timestamp);
        let signature = self.signature(method, url, params, &oauth_params);
        oauth_params.push(("oauth_signature".to_string(), signature));
        oauth_params.sort();

        let header = oauth_params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("OAuth {}", header)
    }

    fn oauth_params(&self, nonce: &str, timestamp: u64) -> Vec<(String, String)> {
        vec![
            ("oauth_consumer_key".to_string(), self.consumer_key.to_string()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            ("oauth_signature_method".to_string(), SIGNATURE_METHOD.to_string()),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_token".to_string(), self.token.to_string()),
            ("oauth_version".to_string(), OAUTH_VERSION.to_string()),
        ]
    }

    fn signature(
        &self,
        method: &str,
        url: &Url,
        params: &[(String, String)],
        oauth_params: &[(String, String)],
    ) -> String {
        let base = signature_base(method, url, params.iter().chain(oauth_params));
        let hmac_digest = hmacsha1::hmac_sha1(self.signing_key().as_bytes(), base.as_bytes());
        base64::encode(hmac_digest)
    }

    fn signing_key(&self) -> String {
        format!(
            "{}&{}",
            percent_encode(self.consumer_secret),
            percent_encode(self.token_secret)
        )
    }
}

/// `METHOD&encoded(base url)&encoded(sorted parameter string)`
fn signature_base<'p>(
    method: &str,
    url: &Url,
    params: impl Iterator<Item = &'p (String, String)>,
) -> String {
    let mut encoded: Vec<(String, String)> = params
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();
    let parameter_string = encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut base_url = url.clone();
    base_url.set_query(None);
    base_url.set_fragment(None);

    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        percent_encode(base_url.as_str()),
        percent_encode(&parameter_string)
    )
}

/// RFC 3986 encoding: form encoding plus the three characters it treats differently
fn percent_encode(value: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(value.as_bytes()).collect();
    encoded
        .replace('+', "%20")
        .replace('*', "%2A")
        .replace("%7E", "~")
}
