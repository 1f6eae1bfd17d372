mod deck;
mod event;

pub use deck::*;
pub use event::*;
