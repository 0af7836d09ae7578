//! Response bodies rendered from device state.
//!
//! Both renderers are pure: they read a `&Device` and return owned bytes,
//! which the response writer copies and streams.

pub mod landing;
pub mod status;

pub use landing::{html_escape, render_page};
pub use status::render_status_json;
