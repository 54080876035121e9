//! rentnest - rental listings with a social layer
//!
//! Hosts publish accommodations, everyone can post, comment and follow, and
//! followers are notified by in-app notice and email.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
