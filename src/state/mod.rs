pub mod filter;
pub mod focus;

pub use filter::{filter, matches};
pub use focus::{FocusLevel, FocusState};
