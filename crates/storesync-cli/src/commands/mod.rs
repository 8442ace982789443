pub mod audit;
pub mod common;
pub mod pull;
pub mod push;
