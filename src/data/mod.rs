pub mod aggregate;
pub mod event;
