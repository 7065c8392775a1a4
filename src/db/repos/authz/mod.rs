pub mod audit;
pub mod catalog;
pub mod policies;
pub mod seed;
pub mod snapshot;
