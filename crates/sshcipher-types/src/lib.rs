#![forbid(unsafe_code)]
#![doc = "Algorithm identifiers and error types for the sshcipher workspace."]

pub mod algorithm;
pub mod error;

pub use algorithm::*;
pub use error::*;
