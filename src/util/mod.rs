pub mod batch;
pub mod persistence;
pub mod version;
