//! Application services: listing state, page loads and sitemap generation.

pub mod backend;
pub mod debounce;
pub mod detail;
pub mod error;
pub mod filters;
pub mod listing;
pub mod pagination;
pub mod scroll;
pub mod session;
pub mod sitemap;
pub mod sync;
