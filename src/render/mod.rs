pub mod backend;
pub mod scene;
pub mod text;
