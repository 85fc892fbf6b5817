//! scoreboard_rust - terminal scoreboard over the live session store

pub mod board;
pub mod config;
pub mod refresh;
pub mod selector;

pub use config::BoardConfig;
pub use refresh::PresentationAdapter;
pub use selector::{Command, Selection};
