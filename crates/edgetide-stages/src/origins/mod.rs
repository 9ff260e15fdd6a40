//! Built-in origins.

pub mod raw_data;
