pub mod ease;
pub mod interp;
pub mod lookup;
pub mod state;
pub mod tracker;
