pub mod access;
pub mod health;
pub mod webhooks;
