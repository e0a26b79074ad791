// Bluesky API client — authentication, notifications, post history, replies.
//
// Talks XRPC directly over reqwest. Each submodule handles one area of the
// API surface; `social` is the trait the pipeline depends on.

pub mod client;
pub mod facets;
pub mod notifications;
pub mod posts;
pub mod profiles;
pub mod rate_limit;
pub mod reply;
pub mod social;

pub use client::BlueskyClient;
pub use social::SocialClient;
