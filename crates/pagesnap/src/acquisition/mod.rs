//! HTTP-side acquisition: the fetch primitive and the robots.txt policy.
//!
//! The browser renders the page; everything else (robots.txt, sub-resource
//! bytes) goes over plain HTTP.

pub mod http_client;
pub mod robots;

pub use http_client::{AssetFetcher, HttpClient, HttpResponse};
pub use robots::{parse_robots, RobotsChecker, RobotsPolicy, RobotsRules};
