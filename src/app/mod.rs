pub mod auth;
pub mod categories;
pub mod comments;
pub mod csrf;
pub mod reactions;
pub mod subscriptions;
pub mod users;
pub mod validation;
pub mod videos;
