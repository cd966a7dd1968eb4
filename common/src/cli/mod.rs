//! Command-line policy shared by the binaries.

mod color;

pub use color::LogColor;
