//! Discourse latest-replies feed service.
//!
//! Serves the most recent non-opening posts across all visible topics as a
//! JSON feed, enriched with topic, category, tag and author metadata and
//! filtered by the viewer's category access.

pub mod auth;
pub mod avatars;
pub mod config;
pub mod constants;
pub mod db;
pub mod feed;
pub mod web;
