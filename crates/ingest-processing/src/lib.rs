pub mod chunk;
pub mod dates;
pub mod dedup;
pub mod transform;
