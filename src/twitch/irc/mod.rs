pub mod client;
pub mod command_system;
pub mod commands;
pub mod handler;

pub use client::IrcClient;
pub use handler::MessageHandler;
