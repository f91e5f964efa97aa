pub mod category;
pub mod comment;
pub mod reaction;
pub mod user;
pub mod video;
