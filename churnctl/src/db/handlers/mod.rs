//! Repository implementations for database access.
//!
//! Each repository wraps a SQLx connection or transaction, provides
//! strongly-typed CRUD operations, and returns domain models from
//! [`crate::db::models`]. The common surface lives on the [`Repository`]
//! trait; entity-specific queries hang off the concrete structs.
//!
//! - [`Users`]: account management and authentication lookups
//! - [`Predictions`]: churn prediction records, history, and aggregates
//! - [`analytics`]: admin-facing system analytics
//! - [`model_metrics`]: stored model evaluation metrics

pub mod analytics;
pub mod model_metrics;
pub mod predictions;
pub mod repository;
pub mod users;

pub use predictions::Predictions;
pub use repository::Repository;
pub use users::Users;
