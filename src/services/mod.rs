//! Domain services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business rules and persistence so route handlers can
//! stay focused on protocol translation, throttling, and auth plumbing.

pub mod account;
pub mod portfolio;
pub mod session;
pub mod watchlist;
