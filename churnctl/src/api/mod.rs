//! API layer for HTTP request handling and data models.
//!
//! This module contains the REST API implementation, organized into:
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! - **Authentication** (`/authentication/*`): register, login, logout,
//!   password change, account deletion
//! - **Predictions** (`/api/v1/predictions*`): single and bulk scoring,
//!   paginated history, CSV export, email reports
//! - **Stats** (`/api/v1/stats*`, `/api/v1/model/metrics`): per-user
//!   aggregates, monthly trend, model evaluation metrics
//! - **Admin** (`/api/v1/admin/*`): user management and system analytics
//!
//! All endpoints are documented with OpenAPI annotations using `utoipa`;
//! interactive docs are served at `/docs`.

pub mod handlers;
pub mod models;
