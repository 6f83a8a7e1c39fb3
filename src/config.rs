//! Credentials and fetch settings
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Tweets per request, the maximum of `home_timeline.json`
pub const PAGE_SIZE: u32 = 200;
/// Requests of one fetch session
pub const REQUEST_BUDGET: usize = 4;

/// App side credentials
/// It will be passed in build time and it will not be changed by app users
#[derive(Debug, Deserialize, Serialize)]
pub struct AppCredential {
    pub consumer_key: String,
    pub consumer_secret: String,
}

/// User side credentials of an existing session
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct UserCredential {
    pub screen_name: String,
    pub user_id: String,
    pub oauth_token: String,
    pub oauth_token_secret: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchSettings {
    pub page_size: u32,
    pub request_budget: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        FetchSettings {
            page_size: PAGE_SIZE,
            request_budget: REQUEST_BUDGET,
        }
    }
}

/// Load user credential from the file
/// * config_path: path of the credential stored file
pub fn load_user_credential(config_path: &Path) -> Result<UserCredential> {
    let file = OpenOptions::new().read(true).open(config_path)?;
    let loaded_config = serde_json::from_reader(file)?;
    Ok(loaded_config)
}

/// Get the default path of the user credential file
/// It assumes the file is in your home dir
pub fn find_default_config_file() -> Option<PathBuf> {
    let default_path = ".tweetscounter.json";
    home::home_dir().map(|mut path| {
        path.push(default_path);
        path
    })
}
