pub mod eod;
pub mod market;
