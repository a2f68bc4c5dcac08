//! Database layer: repositories over request/response models with a unified
//! error taxonomy.

pub mod errors;
pub mod handlers;
pub mod models;
