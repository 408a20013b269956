pub mod compile;
pub mod documents;
pub mod error;
pub mod stores;
