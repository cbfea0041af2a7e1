// Share access - asset resolution, unlock, listing and liveness
pub mod core;
mod error;
mod handlers;
mod types;

pub use error::{LISTING_ERROR_MESSAGE, ListingError, ShareError};
pub use handlers::{
    fallback_handler, healthcheck_handler, listing_handler, photo_handler, share_view_handler,
    unlock_handler, video_handler,
};
pub use types::*;
