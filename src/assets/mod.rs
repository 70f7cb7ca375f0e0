pub mod fonts;
pub mod thumbs;
