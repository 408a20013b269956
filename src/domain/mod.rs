//! Core value types shared by the compile pipeline and its collaborators.

pub mod documents;
pub mod engine;
pub mod error;
pub mod outcome;
