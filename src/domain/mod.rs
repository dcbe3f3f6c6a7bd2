pub mod cutoff;
pub mod event;
pub mod rate;
pub mod region;

pub use cutoff::*;
pub use event::*;
pub use rate::*;
pub use region::*;
