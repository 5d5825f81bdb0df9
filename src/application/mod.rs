//! Application layer: backend contract, pager, patch engine and session.

pub mod backend;
pub mod engine;
pub mod error;
pub mod pager;
pub mod pagination;
pub mod session;
