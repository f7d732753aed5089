pub mod opportunity;
pub mod pnl;
pub mod scalper;
pub mod viability;
