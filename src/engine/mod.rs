pub mod crypto;
pub mod normalize;
pub mod seed;
pub mod visibility;
