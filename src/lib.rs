pub mod error;
pub mod models;
pub mod controllers;

pub use error::{Error, Result};

#[cfg(test)]
pub mod test_support;
