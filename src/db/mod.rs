pub mod draft;
pub mod models;

pub use draft::DraftBoard;
