pub mod identity;
pub mod interactions;
pub mod posts;
pub mod users;
pub mod validation;
