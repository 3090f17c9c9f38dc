pub mod frame_counter;
pub mod sizes;

pub use frame_counter::*;
