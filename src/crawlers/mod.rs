pub mod frontier;
pub mod scheduler;


pub use frontier::{Frontier, FrontierEntry, Offer};
pub use scheduler::{Phase, Scheduler};
