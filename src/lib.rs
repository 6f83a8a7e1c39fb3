//! Counts who tweets the most on a Twitter home timeline
//!
//! The pipeline is [`fetch_controller::TimelineFetchController`]: it requests the timeline page by
//! page through a [`session_gateway::SessionGateway`], parses each page with [`tweet_parser`] and
//! accumulates the counts per user in a [`timeline::Timeline`].
pub mod config;
pub mod counter_app;
pub mod error;
pub mod fetch_controller;
pub mod oauth;
pub mod session_gateway;
pub mod timeline;
pub mod tweet_parser;
pub mod twitter_object;
