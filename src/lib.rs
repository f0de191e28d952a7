#![forbid(unsafe_code)]

pub(crate) mod app;
pub(crate) mod config;
pub(crate) mod futures;
pub(crate) mod image_cache;
pub(crate) mod screen;
pub(crate) mod style;
pub(crate) mod utils;
pub use app::App;
