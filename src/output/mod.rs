//! End-of-run output: genome artifacts, result manifest and statistics log.

mod writer;

pub use writer::*;
