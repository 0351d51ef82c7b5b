pub mod error;
pub mod lifecycle;
pub mod state;
pub mod types;
pub mod validation;

pub use error::{ErrorKind, MarketError, ValidationErrors};
pub use state::MarketState;
pub use types::*;
