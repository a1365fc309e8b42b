pub mod engine;
pub mod open_set;
pub mod path;
pub mod state;
