//! CLI tool counting who tweets the most on your home timeline
//! It fetches up to 4 pages of 200 tweets and ranks the authors by their number of tweets
use anyhow::anyhow;
use env_logger::Env;
use log::error;
use structopt::StructOpt;

use tweetscounter::config::{find_default_config_file, AppCredential, FetchSettings};
use tweetscounter::counter_app;
use tweetscounter::error::TwitterError;
use tweetscounter::fetch_controller::TimelineFetchController;

mod cli;

use cli::{Action::*, CommandLineArgs};

/// Entrypoint Function
///
/// It will use the following environment variables (the keys are effective only the build time)
/// * `TWEETSCOUNTER_LOG_LEVEL` Log level setting e.g. `TWEETSCOUNTER_LOG_LEVEL=tweetscounter=debug`
/// * `TWEETSCOUNTER_CK` Consumer Key, it will be used for calling Twitter API as app
/// * `TWEETSCOUNTER_CS` Consumer Secret, it will be used for calling Twitter API as app
fn main() -> anyhow::Result<()> {
    let env = Env::default().filter_or("TWEETSCOUNTER_LOG_LEVEL", "info");
    env_logger::init_from_env(env);

    let app_cred = match (option_env!("TWEETSCOUNTER_CK"), option_env!("TWEETSCOUNTER_CS")) {
        (Some(consumer_key), Some(consumer_secret)) => AppCredential {
            consumer_key: consumer_key.to_string(),
            consumer_secret: consumer_secret.to_string(),
        },
        _ => {
            error!(
                "Please confirm the following environment values are defined at build time: {}, {}",
                "TWEETSCOUNTER_CK", "TWEETSCOUNTER_CS"
            );
            return Err(anyhow!("App credential is not defined."));
        }
    };

    let CommandLineArgs {
        action,
        config_file,
    } = CommandLineArgs::from_args();

    let config_file = config_file
        .or_else(find_default_config_file)
        .ok_or(anyhow!("Failed to find config file."))?;

    let tw_client = counter_app::init_client(app_cred, &config_file)?;

    match action {
        Count {
            before,
            pages,
            top,
            user,
            output,
        } => {
            let mut settings = FetchSettings::default();
            if let Some(pages) = pages {
                settings.request_budget = pages.max(1);
            }
            let mut controller = TimelineFetchController::new(tw_client, settings);
            counter_app::count_tweets(
                &mut controller,
                before,
                top,
                user.as_deref(),
                output.as_deref(),
            )
        }
        Profile { user_id } => {
            let user_id = match user_id.as_deref().or_else(|| tw_client.user_id()) {
                Some(user_id) => user_id.to_string(),
                None => return Err(TwitterError::NotAuthenticated.into()),
            };
            counter_app::show_profile(&tw_client, &user_id)
        }
    }?;
    Ok(())
}
