pub mod walker;
pub mod random;
pub mod raider;

pub use walker::{build, loop_around, offset, Walker, WalkerKind};
pub use random::RandomWalker;
pub use raider::RaiderWalker;
