pub mod binance;
pub mod error;

pub use binance::{BinanceVenue, Market};
pub use error::VenueError;
