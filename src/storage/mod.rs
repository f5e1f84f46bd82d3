pub mod client;

pub use client::StorageClient;
