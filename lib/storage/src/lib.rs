pub mod dataset;
pub mod store;

pub use dataset::{Dataset, DEFAULT_FAKE_FIELD, DEFAULT_REAL_FIELD, FAKE_LABEL, REAL_LABEL};
pub use store::{MatrixDescription, MatrixStore};
