pub mod builder;
pub mod label;
