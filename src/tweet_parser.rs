//! Tweet Record Parser
//! Turns one raw `home_timeline.json` page into typed records and the cursor for the next (older) page
use chrono::{DateTime, FixedOffset};
use log::debug;
use serde::Deserialize;
use serde_json::Value;

use crate::twitter_object::{TweetRecord, User};

/// e.g. `Wed Oct 10 20:19:24 +0000 2018`
const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Result of parsing one page
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParsedPage {
    /// Well-formed tweets, in the order of the page
    pub records: Vec<TweetRecord>,
    /// Smallest tweet id of the page, `None` when nothing well-formed was found
    pub cursor: Option<String>,
    /// Number of elements dropped as malformed
    pub skipped: usize,
}

impl ParsedPage {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// Only the fields we need; everything else in the payload is ignored.
// Fields are taken as raw values, a null or mistyped optional field must not drop the tweet.
#[derive(Deserialize)]
struct RawTweet {
    id_str: Option<Value>,
    id: Option<Value>,
    text: Option<Value>,
    full_text: Option<Value>,
    created_at: Option<Value>,
    user: Option<RawUser>,
}

#[derive(Deserialize)]
struct RawUser {
    id_str: Option<Value>,
    id: Option<Value>,
    name: Option<Value>,
    screen_name: Option<Value>,
    profile_image_url_https: Option<Value>,
    profile_image_url: Option<Value>,
}

/// Numeric value of a tweet id, `None` if it is not a decimal number
pub fn tweet_id_value(id: &str) -> Option<u64> {
    id.trim().parse::<u64>().ok()
}

/// Parse a page of tweet objects
///
/// Elements without a numeric id or without an identifiable author are skipped, never fatal.
/// * raw_page: the decoded JSON array of the response
pub fn parse(raw_page: &[Value]) -> ParsedPage {
    let mut page = ParsedPage::default();
    let mut min_id: Option<u64> = None;

    for (index, value) in raw_page.iter().enumerate() {
        let (id_value, record) = match to_record(value) {
            Some(parsed) => parsed,
            None => {
                debug!("Skip malformed tweet at index {}", index);
                page.skipped += 1;
                continue;
            }
        };
        if min_id.map_or(true, |min| id_value < min) {
            min_id = Some(id_value);
            page.cursor = Some(record.id.clone());
        }
        page.records.push(record);
    }

    debug!(
        "Parsed {} tweets ({} skipped), cursor: {:?}",
        page.records.len(),
        page.skipped,
        page.cursor
    );
    page
}

fn to_record(value: &Value) -> Option<(u64, TweetRecord)> {
    let raw = RawTweet::deserialize(value).ok()?;
    let id_value = numeric_id(raw.id_str.as_ref(), raw.id.as_ref())?;
    let raw_user = raw.user?;
    let user_id = numeric_id(raw_user.id_str.as_ref(), raw_user.id.as_ref())?;

    let author = User {
        id: user_id.to_string(),
        name: string_field(&raw_user.name).unwrap_or_default(),
        screen_name: string_field(&raw_user.screen_name).unwrap_or_default(),
        profile_image_url: string_field(&raw_user.profile_image_url_https)
            .or_else(|| string_field(&raw_user.profile_image_url)),
    };
    let created_at = raw
        .created_at
        .as_ref()
        .and_then(Value::as_str)
        .and_then(parse_created_at);

    let record = TweetRecord {
        id: id_value.to_string(),
        author,
        text: string_field(&raw.full_text).or_else(|| string_field(&raw.text)),
        created_at,
    };
    Some((id_value, record))
}

fn string_field(value: &Option<Value>) -> Option<String> {
    value.as_ref().and_then(Value::as_str).map(str::to_string)
}

fn numeric_id(id_str: Option<&Value>, id: Option<&Value>) -> Option<u64> {
    id_str
        .and_then(Value::as_str)
        .and_then(tweet_id_value)
        .or_else(|| id.and_then(Value::as_u64))
}

fn parse_created_at(created_at: &str) -> Option<DateTime<FixedOffset>> {
    match DateTime::parse_from_str(created_at, CREATED_AT_FORMAT) {
        Ok(date) => Some(date),
        Err(e) => {
            debug!("Ignore unparsable created_at {:?}: {}", created_at, e);
            None
        }
    }
}
