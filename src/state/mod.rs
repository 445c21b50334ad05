pub mod projection_store;

pub use projection_store::ProjectionStore;
