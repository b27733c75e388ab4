mod api_types;
pub mod cache;
mod cached_client;
mod client;
mod error;
mod resources;
mod token;
pub mod types;

pub use cached_client::CachedTrackerClient;
pub use client::{Redirect, DEFAULT_BASE_URL};
pub use error::ApiError;
pub use token::TokenSlot;
