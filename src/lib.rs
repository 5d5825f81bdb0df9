//! Murmur: a feed cache consistency engine.
//!
//! Keeps independently paginated views of overlapping timelines (global,
//! following-only, per-profile) consistent under optimistic likes, follows
//! and posts, while pages are fetched incrementally by cursor.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
