pub mod age;
pub mod builder;
pub mod normalizer;
pub mod played;
pub mod scoring;
