pub mod binance;
pub mod coingecko;
pub mod groq;
pub mod messages;
pub mod synthetic;
pub mod traits;
