pub mod events;
pub mod filter;
pub mod health;
pub mod jobs;
pub mod process;
pub mod upload;
