//! HTTP request handlers for all API endpoints.
//!
//! Handlers are organized by surface:
//!
//! - [`auth`]: registration, login/logout, password change, account deletion
//! - [`predictions`]: scoring, history, CSV import/export, email reports, stats
//! - [`admin`]: user management, system analytics, model metrics
//!
//! Each handler validates the request, checks authorization via the
//! [`crate::api::models::users::CurrentUser`] extractor, runs its business
//! logic through the database repositories, and serializes the response.
//! Errors are returned as [`crate::errors::Error`], which maps to HTTP status
//! codes automatically.

pub mod admin;
pub mod auth;
pub mod predictions;
