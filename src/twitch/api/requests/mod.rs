pub mod followers;
pub mod moderation;
