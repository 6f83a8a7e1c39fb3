//! Timeline Aggregator
//! Keeps the number of tweets per user over all the pages of a fetch session
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, FixedOffset};
use log::debug;
use serde::Serialize;

use crate::tweet_parser::{tweet_id_value, ParsedPage};
use crate::twitter_object::{TweetRecord, User};

/// A counted tweet, without its author
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserTweet {
    pub id: String,
    pub text: Option<String>,
    pub created_at: Option<DateTime<FixedOffset>>,
}

impl From<&TweetRecord> for UserTweet {
    fn from(record: &TweetRecord) -> Self {
        Self {
            id: record.id.clone(),
            text: record.text.clone(),
            created_at: record.created_at,
        }
    }
}

/// A user and its tweets seen on the timeline, newest first
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserTweetCount {
    pub user: User,
    pub count: usize,
    pub tweets: Vec<UserTweet>,
    #[serde(skip)]
    first_seen: usize,
}

/// Users sorted by the highest number of tweets, plus the cursor of the next page
#[derive(Clone, Debug, Default, Serialize)]
pub struct Timeline {
    users: Vec<UserTweetCount>,
    max_id: Option<String>,
    pages: usize,
    /// user id -> position in `users`
    #[serde(skip)]
    index: HashMap<String, usize>,
    #[serde(skip)]
    seen_tweets: HashSet<String>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count the tweets of a page and re-rank the users
    ///
    /// Returns how many tweets were counted. A tweet id counted by an earlier page is not counted again,
    /// `max_id` of the API is inclusive so two consecutive pages share their boundary tweet.
    pub fn ingest(&mut self, page: &ParsedPage) -> usize {
        let mut counted = 0;
        for record in &page.records {
            if !self.seen_tweets.insert(record.id.clone()) {
                debug!("Tweet {} is already counted", record.id);
                continue;
            }
            match self.index.get(&record.author.id).copied() {
                Some(position) => {
                    let entry = &mut self.users[position];
                    entry.count += 1;
                    entry.tweets.push(UserTweet::from(record));
                }
                None => {
                    self.index.insert(record.author.id.clone(), self.users.len());
                    self.users.push(UserTweetCount {
                        user: record.author.clone(),
                        count: 1,
                        tweets: vec![UserTweet::from(record)],
                        first_seen: self.index.len(),
                    });
                }
            }
            counted += 1;
        }

        self.users.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.first_seen.cmp(&b.first_seen))
        });
        for (position, entry) in self.users.iter().enumerate() {
            self.index.insert(entry.user.id.clone(), position);
        }

        if let Some(cursor) = &page.cursor {
            self.lower_cursor(cursor);
        }
        self.pages += 1;
        counted
    }

    /// The cursor only moves to older tweets
    fn lower_cursor(&mut self, cursor: &str) {
        let is_older = match (&self.max_id, tweet_id_value(cursor)) {
            (None, _) => true,
            (Some(current), Some(new)) => {
                tweet_id_value(current).map_or(true, |current| new < current)
            }
            (Some(_), None) => false,
        };
        if is_older {
            self.max_id = Some(cursor.to_string());
        }
    }

    /// Users ranked by descending count, ties in the order they were first seen
    pub fn users(&self) -> &[UserTweetCount] {
        &self.users
    }

    /// Upper bound of the next page, `None` until a non-empty page was ingested
    pub fn max_id(&self) -> Option<&str> {
        self.max_id.as_deref()
    }

    pub fn count_for(&self, user_id: &str) -> usize {
        self.index
            .get(user_id)
            .map_or(0, |&position| self.users[position].count)
    }

    /// Tweets of a user in the order they were counted, empty for an unknown user
    pub fn tweets_for(&self, user_id: &str) -> &[UserTweet] {
        self.index
            .get(user_id)
            .map(|&position| self.users[position].tweets.as_slice())
            .unwrap_or(&[])
    }

    /// Lookup by `screen_name`, case insensitive as on Twitter
    pub fn find_by_screen_name(&self, screen_name: &str) -> Option<&UserTweetCount> {
        let screen_name = screen_name.trim_start_matches('@');
        self.users
            .iter()
            .find(|entry| entry.user.screen_name.eq_ignore_ascii_case(screen_name))
    }

    pub fn total_tweets(&self) -> usize {
        self.seen_tweets.len()
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
