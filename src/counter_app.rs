//! App module and interface between CLI and the timeline pipeline
//! pub methods are expected to be called from `main`
use std::fs::File;
use std::path::Path;

use anyhow::Result;
use log::{debug, info, warn};

use crate::config::{load_user_credential, AppCredential};
use crate::error::TwitterError;
use crate::fetch_controller::TimelineFetchController;
use crate::session_gateway::{SessionGateway, TwitterClient};
use crate::timeline::Timeline;

/// Count the tweets of the home timeline per user and print the ranking
///
/// The progress is logged after every page, the ranking is printed once the fetch session ends
/// * controller: fetch controller with its gateway
/// * before: the most recent tweet id to count, `None` for the latest tweets
/// * top: how many users to print
/// * user: screen name of a user whose counted tweets are printed after the ranking
/// * output: where to store the final timeline as JSON
pub fn count_tweets<G: SessionGateway>(
    controller: &mut TimelineFetchController<G>,
    before: Option<String>,
    top: usize,
    user: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    debug!(
        "args: before={:?}, top={}, user={:?}, output={:?}",
        &before, top, user, output
    );

    let mut failure: Option<TwitterError> = None;
    let outcome = controller.fetch_timeline(before, |update| match update {
        Ok(timeline) => info!(
            "Page {}: {} tweets by {} users (next max_id: {:?})",
            timeline.pages(),
            timeline.total_tweets(),
            timeline.users().len(),
            timeline.max_id()
        ),
        Err(e) => failure = Some(e),
    });
    if let Some(e) = failure {
        return Err(anyhow::Error::new(e).context("Failed to fetch the timeline"));
    }
    info!(
        "Finished after {} requests ({:?})",
        controller.requests_made(),
        outcome
    );

    for line in format_ranking(controller.timeline(), top) {
        println!("{}", line);
    }
    if let Some(screen_name) = user {
        match format_user_tweets(controller.timeline(), screen_name) {
            Some(lines) => {
                println!();
                for line in lines {
                    println!("{}", line);
                }
            }
            None => warn!("@{} has no tweet on the fetched timeline", screen_name),
        }
    }

    if let Some(path) = output {
        if path.exists() {
            debug!("Output file {} will be overwritten", path.display());
        }
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, controller.timeline())?;
        info!("Saved the timeline to {}", path.display());
    }
    Ok(())
}

/// Print a user profile
pub fn show_profile(gateway: &impl SessionGateway, user_id: &str) -> Result<()> {
    let profile = gateway.fetch_profile(user_id)?;
    println!("{} (@{})", profile.name, profile.screen_name);
    if let Some(description) = &profile.description {
        println!("{}", description);
    }
    println!(
        "tweets: {}, following: {}, followers: {}",
        profile.statuses_count, profile.friends_count, profile.followers_count
    );
    if let Some(image) = &profile.profile_image_url_https {
        println!("picture: {}", image);
    }
    Ok(())
}

/// Lines of the ranking, `rank. @screen_name (name): count`
pub fn format_ranking(timeline: &Timeline, top: usize) -> Vec<String> {
    timeline
        .users()
        .iter()
        .take(top)
        .enumerate()
        .map(|(rank, entry)| {
            format!(
                "{}. @{} ({}): {}",
                rank + 1,
                entry.user.screen_name,
                entry.user.name,
                entry.count
            )
        })
        .collect()
}

/// Lines of the tweets counted for a user, `None` if the user was not seen
///
/// The first line is the user, then one line per tweet: `id date text`
pub fn format_user_tweets(timeline: &Timeline, screen_name: &str) -> Option<Vec<String>> {
    let entry = timeline.find_by_screen_name(screen_name)?;
    let mut lines = vec![format!(
        "@{} ({}): {} tweets",
        entry.user.screen_name, entry.user.name, entry.count
    )];
    lines.extend(entry.tweets.iter().map(|tweet| {
        let date = tweet
            .created_at
            .map(|date| date.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        let text = tweet.text.as_deref().unwrap_or("").replace('\n', " ");
        format!("{} {} {}", tweet.id, date, text)
    }));
    Some(lines)
}

/// Initalize Twitter Client
///
/// If there is no credential file then the client has no session, every fetch will fail as not authenticated
/// * app_cred: consumer key and secret
/// * config_path: path to the user credential file
pub fn init_client(app_cred: AppCredential, config_path: &Path) -> Result<TwitterClient> {
    let user_cred = match load_user_credential(config_path) {
        Ok(user_cred) => Some(user_cred),
        Err(e) => {
            warn!(
                "No user credential in {}: {}",
                config_path.display(),
                e
            );
            None
        }
    };
    TwitterClient::new(app_cred, user_cred)
}
