pub mod predictions;
pub mod users;
