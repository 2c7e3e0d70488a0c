//! Wall-clock abstraction.

pub mod clock;

pub use clock::{Clock, MockClock, SystemClock};
