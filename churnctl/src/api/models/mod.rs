pub mod auth;
pub mod pagination;
pub mod predictions;
pub mod stats;
pub mod users;
