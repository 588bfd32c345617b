pub mod coords;
pub mod dataset;
pub mod preprocess;
pub mod store;
