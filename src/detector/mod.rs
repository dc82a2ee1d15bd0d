pub mod classifier;
pub mod pullback;

pub use pullback::PullbackRule;
