pub mod follows;
pub mod health;
pub mod likes;
pub mod posts;
pub mod profile;
pub mod webhooks;
