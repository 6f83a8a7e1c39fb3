//! Timeline Fetch Controller
//! Fetches the home timeline page by page, older tweets on each request, and reports the
//! aggregated [`Timeline`] after every page
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::Value;

use crate::config::FetchSettings;
use crate::error::TwitterError;
use crate::session_gateway::SessionGateway;
use crate::timeline::Timeline;
use crate::tweet_parser;

pub const HOME_TIMELINE_URL: &str = "https://api.twitter.com/1.1/statuses/home_timeline.json";

/// Stops a fetch session before its next request
/// Clones share the same flag, so it can be cancelled from another thread or from the page callback
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// A cancellation is consumed by the session it stops
    fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

/// How a fetch session ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    /// All the requests of the budget were made
    BudgetExhausted,
    /// The last page brought no tweet that was not counted yet
    Exhausted,
    Cancelled,
    /// The error was passed to the page callback
    Failed,
}

pub struct TimelineFetchController<G: SessionGateway> {
    gateway: G,
    settings: FetchSettings,
    timeline: Timeline,
    requests_count: usize,
    cancellation: CancellationToken,
}

impl<G: SessionGateway> TimelineFetchController<G> {
    pub fn new(gateway: G, settings: FetchSettings) -> Self {
        TimelineFetchController {
            gateway,
            settings,
            timeline: Timeline::new(),
            requests_count: 0,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Start over with an empty timeline (e.g. on refresh), returns the previous one
    pub fn reset_timeline(&mut self) -> Timeline {
        std::mem::take(&mut self.timeline)
    }

    /// Requests made by the current or the last fetch session
    pub fn requests_made(&self) -> usize {
        self.requests_count
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Fetch the home timeline
    ///
    /// Pages are requested one after the other, each one with the cursor of the previous page,
    /// until the request budget is used, the timeline has no older tweets, the session is
    /// cancelled or a request fails. `on_page` receives the timeline after every page, or the
    /// error that ended the session. Errors are never retried.
    /// * before_id: `max_id` of the first request, `None` for the most recent tweets
    /// * on_page: called in fetch order, at most once with an error
    pub fn fetch_timeline<F>(&mut self, before_id: Option<String>, mut on_page: F) -> FetchOutcome
    where
        F: FnMut(Result<&Timeline, TwitterError>),
    {
        self.requests_count = 0;
        info!("Start to fetch the timeline (max_id: {:?})", before_id);

        let outcome = self.run_session(before_id, &mut on_page);
        // a cancel requested during the last page has nothing left to stop
        if outcome != FetchOutcome::Cancelled && self.cancellation.take() {
            debug!("Session ended as {:?} before the cancellation was applied", outcome);
        }
        outcome
    }

    fn run_session<F>(&mut self, before_id: Option<String>, on_page: &mut F) -> FetchOutcome
    where
        F: FnMut(Result<&Timeline, TwitterError>),
    {
        let mut cursor = before_id;
        loop {
            if self.cancellation.take() {
                info!("Fetch session is cancelled after {} requests", self.requests_count);
                return FetchOutcome::Cancelled;
            }
            if !self.gateway.is_authenticated() {
                warn!("There is no active session");
                on_page(Err(TwitterError::NotAuthenticated));
                return FetchOutcome::Failed;
            }

            debug!(
                "Request {} / {} (max_id: {:?})",
                self.requests_count + 1,
                self.settings.request_budget,
                cursor
            );
            let raw_page = match self.request_page(cursor.as_deref()) {
                Ok(raw_page) => raw_page,
                Err(e) => {
                    warn!("Fetch session failed: {}", e);
                    on_page(Err(e));
                    return FetchOutcome::Failed;
                }
            };

            let page = tweet_parser::parse(&raw_page);
            if page.is_empty() {
                debug!("Page has no tweet ({} skipped)", page.skipped);
            }
            let counted = self.timeline.ingest(&page);
            on_page(Ok(&self.timeline));
            self.requests_count += 1;

            if self.requests_count >= self.settings.request_budget {
                info!("Request budget of {} is used", self.settings.request_budget);
                return FetchOutcome::BudgetExhausted;
            }
            if counted == 0 {
                info!("No older tweets on the timeline");
                return FetchOutcome::Exhausted;
            }
            cursor = self.timeline.max_id().map(str::to_string);
        }
    }

    fn request_params(&self, max_id: Option<&str>) -> Vec<(String, String)> {
        let mut params = vec![
            ("count".to_string(), self.settings.page_size.to_string()),
            ("include_entities".to_string(), "false".to_string()),
            ("exclude_replies".to_string(), "false".to_string()),
        ];
        if let Some(max_id) = max_id {
            params.push(("max_id".to_string(), max_id.to_string()));
        }
        params
    }

    fn request_page(&self, max_id: Option<&str>) -> Result<Vec<Value>, TwitterError> {
        let params = self.request_params(max_id);
        let response = self.gateway.send("GET", HOME_TIMELINE_URL, &params)?;

        if response.body.trim().is_empty() {
            warn!("Timeline response has no body (status: {})", response.status);
            return Err(TwitterError::InvalidResponse);
        }
        match serde_json::from_str::<Value>(&response.body) {
            Ok(Value::Array(tweets)) => Ok(tweets),
            Ok(_) => {
                warn!("Timeline response is not an array");
                Err(TwitterError::InvalidResponse)
            }
            Err(e) => {
                warn!("Timeline response could not be decoded: {}", e);
                Err(TwitterError::InvalidResponse)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::*;
    use serde_json::{json, Value};

    use super::{FetchOutcome, TimelineFetchController, HOME_TIMELINE_URL};
    use crate::config::FetchSettings;
    use crate::error::TwitterError;
    use crate::session_gateway::{
        GatewayError, GatewayResponse, MockSessionGateway, TransportError,
    };

    /// Tweets `top` down to `top - 9`, by three users
    fn page_body(top: u64) -> String {
        let tweets: Vec<Value> = (top - 9..=top)
            .rev()
            .map(|id| {
                json!({
                    "id_str": id.to_string(),
                    "text": "hello",
                    "user": {
                        "id_str": (id % 3).to_string(),
                        "name": format!("User {}", id % 3),
                        "screen_name": format!("user{}", id % 3)
                    }
                })
            })
            .collect();
        Value::Array(tweets).to_string()
    }

    fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Answers like the API: `max_id` is inclusive, without it the newest tweet is 100
    fn timeline_gateway(expected_requests: usize) -> MockSessionGateway {
        let mut gateway = MockSessionGateway::new();
        gateway.expect_is_authenticated().return_const(true);
        gateway
            .expect_send()
            .with(eq("GET"), eq(HOME_TIMELINE_URL), always())
            .times(expected_requests)
            .returning(|_, _, params| {
                let top = param(params, "max_id")
                    .map(|id| id.parse::<u64>().unwrap())
                    .unwrap_or(100);
                Ok(GatewayResponse {
                    status: 200,
                    body: page_body(top),
                })
            });
        gateway
    }

    fn failing_gateway(error: fn() -> GatewayError) -> MockSessionGateway {
        let mut gateway = MockSessionGateway::new();
        gateway.expect_is_authenticated().return_const(true);
        gateway
            .expect_send()
            .times(1)
            .returning(move |_, _, _| Err(error()));
        gateway
    }

    fn body_gateway(body: &'static str) -> MockSessionGateway {
        let mut gateway = MockSessionGateway::new();
        gateway.expect_is_authenticated().return_const(true);
        gateway.expect_send().times(1).returning(move |_, _, _| {
            Ok(GatewayResponse {
                status: 200,
                body: body.to_string(),
            })
        });
        gateway
    }

    fn run(
        controller: &mut TimelineFetchController<MockSessionGateway>,
        before_id: Option<String>,
    ) -> (FetchOutcome, Vec<Result<usize, TwitterError>>) {
        let mut updates = Vec::new();
        let outcome = controller.fetch_timeline(before_id, |update| {
            updates.push(update.map(|timeline| timeline.total_tweets()))
        });
        (outcome, updates)
    }

    #[test]
    fn not_authenticated_sends_nothing() {
        let mut gateway = MockSessionGateway::new();
        gateway.expect_is_authenticated().return_const(false);
        gateway.expect_send().never();
        let mut controller = TimelineFetchController::new(gateway, FetchSettings::default());

        let (outcome, updates) = run(&mut controller, None);
        assert_eq!(outcome, FetchOutcome::Failed);
        assert_eq!(updates, vec![Err(TwitterError::NotAuthenticated)]);
        assert_eq!(controller.requests_made(), 0);
    }

    #[test]
    fn four_pages_then_stop() {
        let mut controller =
            TimelineFetchController::new(timeline_gateway(4), FetchSettings::default());

        let (outcome, updates) = run(&mut controller, None);
        assert_eq!(outcome, FetchOutcome::BudgetExhausted);
        assert_eq!(updates, vec![Ok(10), Ok(19), Ok(28), Ok(37)]);
        assert_eq!(controller.requests_made(), 4);
        assert_eq!(controller.timeline().max_id(), Some("64"));
        assert_eq!(controller.timeline().pages(), 4);
    }

    #[test]
    fn request_parameters() {
        let mut gateway = MockSessionGateway::new();
        gateway.expect_is_authenticated().return_const(true);
        gateway
            .expect_send()
            .withf(|method, url, params| {
                method == "GET"
                    && url == HOME_TIMELINE_URL
                    && param(params, "count") == Some("200")
                    && param(params, "include_entities") == Some("false")
                    && param(params, "exclude_replies") == Some("false")
                    && param(params, "max_id") == Some("5000")
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(GatewayResponse {
                    status: 200,
                    body: page_body(5000),
                })
            });
        let settings = FetchSettings {
            request_budget: 1,
            ..FetchSettings::default()
        };
        let mut controller = TimelineFetchController::new(gateway, settings);

        let (outcome, updates) = run(&mut controller, Some("5000".to_string()));
        assert_eq!(outcome, FetchOutcome::BudgetExhausted);
        assert_eq!(updates, vec![Ok(10)]);
    }

    #[test]
    fn first_request_has_no_max_id() {
        let mut gateway = MockSessionGateway::new();
        gateway.expect_is_authenticated().return_const(true);
        gateway
            .expect_send()
            .withf(|_, _, params| param(params, "max_id").is_none())
            .times(1)
            .returning(|_, _, _| {
                Ok(GatewayResponse {
                    status: 200,
                    body: "[]".to_string(),
                })
            });
        let mut controller = TimelineFetchController::new(gateway, FetchSettings::default());
        run(&mut controller, None);
    }

    #[test]
    fn rate_limit_code() {
        let mut controller = TimelineFetchController::new(
            failing_gateway(|| {
                GatewayError::Transport(TransportError {
                    status: Some(429),
                    code: Some(88),
                    message: "Rate limit exceeded".to_string(),
                })
            }),
            FetchSettings::default(),
        );
        let (outcome, updates) = run(&mut controller, None);
        assert_eq!(outcome, FetchOutcome::Failed);
        assert_eq!(updates, vec![Err(TwitterError::RateLimitExceeded)]);
    }

    #[test]
    fn other_transport_error() {
        let mut controller = TimelineFetchController::new(
            failing_gateway(|| {
                GatewayError::Transport(TransportError {
                    status: None,
                    code: None,
                    message: "connection reset".to_string(),
                })
            }),
            FetchSettings::default(),
        );
        let (_, updates) = run(&mut controller, None);
        assert_eq!(updates, vec![Err(TwitterError::InvalidResponse)]);
    }

    #[test]
    fn unexpected_failure_is_unknown() {
        let mut controller = TimelineFetchController::new(
            failing_gateway(|| GatewayError::Internal("clock went backwards".to_string())),
            FetchSettings::default(),
        );
        let (_, updates) = run(&mut controller, None);
        assert_eq!(
            updates,
            vec![Err(TwitterError::Unknown("clock went backwards".to_string()))]
        );
    }

    #[test]
    fn empty_body_is_invalid() {
        let mut controller =
            TimelineFetchController::new(body_gateway(""), FetchSettings::default());
        let (outcome, updates) = run(&mut controller, None);
        assert_eq!(outcome, FetchOutcome::Failed);
        assert_eq!(updates, vec![Err(TwitterError::InvalidResponse)]);
    }

    #[test]
    fn body_that_is_not_an_array_is_invalid() {
        let mut controller = TimelineFetchController::new(
            body_gateway(r#"{"errors":[{"code":34,"message":"Sorry"}]}"#),
            FetchSettings::default(),
        );
        let (_, updates) = run(&mut controller, None);
        assert_eq!(updates, vec![Err(TwitterError::InvalidResponse)]);
    }

    #[test]
    fn undecodable_body_is_invalid() {
        let mut controller =
            TimelineFetchController::new(body_gateway("[{\"id_str\":"), FetchSettings::default());
        let (_, updates) = run(&mut controller, None);
        assert_eq!(updates, vec![Err(TwitterError::InvalidResponse)]);
    }

    #[test]
    fn empty_page_ends_the_session() {
        let mut controller =
            TimelineFetchController::new(body_gateway("[]"), FetchSettings::default());
        let (outcome, updates) = run(&mut controller, None);
        assert_eq!(outcome, FetchOutcome::Exhausted);
        assert_eq!(updates, vec![Ok(0)]);
        assert_eq!(controller.timeline().max_id(), None);
    }

    #[test]
    fn error_after_pages_keeps_delivered_ones() {
        let mut gateway = MockSessionGateway::new();
        gateway.expect_is_authenticated().return_const(true);
        let mut calls = 0;
        gateway.expect_send().times(2).returning(move |_, _, _| {
            calls += 1;
            if calls == 1 {
                Ok(GatewayResponse {
                    status: 200,
                    body: page_body(100),
                })
            } else {
                Err(GatewayError::Transport(TransportError {
                    status: Some(429),
                    code: Some(88),
                    message: "Rate limit exceeded".to_string(),
                }))
            }
        });
        let mut controller = TimelineFetchController::new(gateway, FetchSettings::default());

        let (outcome, updates) = run(&mut controller, None);
        assert_eq!(outcome, FetchOutcome::Failed);
        assert_eq!(updates, vec![Ok(10), Err(TwitterError::RateLimitExceeded)]);
        assert_eq!(controller.timeline().total_tweets(), 10);
    }

    #[test]
    fn cancelled_before_start() {
        let mut controller =
            TimelineFetchController::new(timeline_gateway(4), FetchSettings::default());
        let token = controller.cancellation_token();
        token.cancel();

        let (outcome, updates) = run(&mut controller, None);
        assert_eq!(outcome, FetchOutcome::Cancelled);
        assert!(updates.is_empty());
        assert!(!token.is_cancelled());

        // the next session is not affected
        let (outcome, updates) = run(&mut controller, None);
        assert_eq!(outcome, FetchOutcome::BudgetExhausted);
        assert_eq!(updates.len(), 4);
    }

    #[test]
    fn cancelled_between_pages() {
        let mut controller =
            TimelineFetchController::new(timeline_gateway(1), FetchSettings::default());
        let token = controller.cancellation_token();
        let mut pages = 0;

        let outcome = controller.fetch_timeline(None, |update| {
            assert!(update.is_ok());
            pages += 1;
            token.cancel();
        });
        assert_eq!(outcome, FetchOutcome::Cancelled);
        assert_eq!(pages, 1);
        assert_eq!(controller.requests_made(), 1);
    }

    #[test]
    fn new_session_resets_the_counter() {
        let mut controller =
            TimelineFetchController::new(timeline_gateway(8), FetchSettings::default());
        let (outcome, _) = run(&mut controller, None);
        assert_eq!(outcome, FetchOutcome::BudgetExhausted);

        let previous = controller.reset_timeline();
        assert_eq!(previous.total_tweets(), 37);
        assert!(controller.timeline().is_empty());

        let (outcome, updates) = run(&mut controller, None);
        assert_eq!(outcome, FetchOutcome::BudgetExhausted);
        assert_eq!(updates, vec![Ok(10), Ok(19), Ok(28), Ok(37)]);
        assert_eq!(controller.requests_made(), 4);
    }

    #[test]
    fn continuing_from_the_cursor_accumulates() {
        let settings = FetchSettings {
            request_budget: 2,
            ..FetchSettings::default()
        };
        let mut controller = TimelineFetchController::new(timeline_gateway(4), settings);
        run(&mut controller, None);
        let cursor = controller.timeline().max_id().map(str::to_string);
        assert_eq!(cursor.as_deref(), Some("82"));

        let (outcome, updates) = run(&mut controller, cursor);
        assert_eq!(outcome, FetchOutcome::BudgetExhausted);
        assert_eq!(updates, vec![Ok(28), Ok(37)]);
    }

    #[test]
    fn refetching_the_same_tweets_ends_the_session() {
        let mut controller =
            TimelineFetchController::new(timeline_gateway(5), FetchSettings::default());
        let (_, first) = run(&mut controller, Some("100".to_string()));
        assert_eq!(first.len(), 4);

        let (outcome, updates) = run(&mut controller, Some("100".to_string()));
        assert_eq!(outcome, FetchOutcome::Exhausted);
        assert_eq!(updates, vec![Ok(37)]);
        assert_eq!(controller.requests_made(), 1);
    }

    #[test]
    fn cancel_on_the_last_page_does_not_leak() {
        let settings = FetchSettings {
            request_budget: 1,
            ..FetchSettings::default()
        };
        let mut controller = TimelineFetchController::new(timeline_gateway(2), settings);
        let token = controller.cancellation_token();

        let outcome = controller.fetch_timeline(None, |_| token.cancel());
        assert_eq!(outcome, FetchOutcome::BudgetExhausted);
        assert!(!token.is_cancelled());

        controller.reset_timeline();
        let (outcome, updates) = run(&mut controller, None);
        assert_eq!(outcome, FetchOutcome::BudgetExhausted);
        assert_eq!(updates, vec![Ok(10)]);
    }

    #[test]
    fn cancel_on_a_failed_request_does_not_leak() {
        let mut gateway = MockSessionGateway::new();
        gateway.expect_is_authenticated().return_const(true);
        let mut calls = 0;
        gateway.expect_send().times(2).returning(move |_, _, _| {
            calls += 1;
            if calls == 1 {
                Err(GatewayError::Transport(TransportError {
                    status: Some(503),
                    code: None,
                    message: "Over capacity".to_string(),
                }))
            } else {
                Ok(GatewayResponse {
                    status: 200,
                    body: "[]".to_string(),
                })
            }
        });
        let mut controller = TimelineFetchController::new(gateway, FetchSettings::default());
        let token = controller.cancellation_token();

        let outcome = controller.fetch_timeline(None, |_| token.cancel());
        assert_eq!(outcome, FetchOutcome::Failed);

        let (outcome, updates) = run(&mut controller, None);
        assert_eq!(outcome, FetchOutcome::Exhausted);
        assert_eq!(updates, vec![Ok(0)]);
    }

    #[test]
    fn boundary_tweet_only_ends_the_session() {
        let mut gateway = MockSessionGateway::new();
        gateway.expect_is_authenticated().return_const(true);
        gateway
            .expect_send()
            .times(2)
            .returning(|_, _, params| {
                let body = match param(params, "max_id") {
                    None => page_body(100),
                    Some(max_id) => json!([{
                        "id_str": max_id,
                        "user": { "id_str": "1", "name": "User 1", "screen_name": "user1" }
                    }])
                    .to_string(),
                };
                Ok(GatewayResponse { status: 200, body })
            });
        let mut controller = TimelineFetchController::new(gateway, FetchSettings::default());

        let (outcome, updates) = run(&mut controller, None);
        assert_eq!(outcome, FetchOutcome::Exhausted);
        assert_eq!(updates, vec![Ok(10), Ok(10)]);
        assert_eq!(controller.timeline().max_id(), Some("91"));
        assert_eq!(controller.requests_made(), 2);
    }

    #[test]
    fn budget_is_checked_before_an_empty_last_page() {
        let mut gateway = MockSessionGateway::new();
        gateway.expect_is_authenticated().return_const(true);
        let mut calls = 0;
        gateway.expect_send().times(4).returning(move |_, _, params| {
            calls += 1;
            let body = if calls < 4 {
                let top = param(params, "max_id")
                    .map(|id| id.parse::<u64>().unwrap())
                    .unwrap_or(100);
                page_body(top)
            } else {
                "[]".to_string()
            };
            Ok(GatewayResponse { status: 200, body })
        });
        let mut controller = TimelineFetchController::new(gateway, FetchSettings::default());

        let (outcome, updates) = run(&mut controller, None);
        assert_eq!(outcome, FetchOutcome::BudgetExhausted);
        assert_eq!(updates, vec![Ok(10), Ok(19), Ok(28), Ok(28)]);
    }
}
