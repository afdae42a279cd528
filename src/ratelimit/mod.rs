//! Sliding-window rate limiting logic and state management.

mod backend;
mod clock;
mod limiter;
mod shared;
mod sharded;
mod window;

pub use backend::AdmissionControl;
pub use clock::{Clock, ManualClock, SystemClock};
pub use limiter::SlidingWindowLimiter;
pub(crate) use limiter::validate_limits;
pub use shared::SharedLimiter;
pub use sharded::ShardedLimiter;
pub use window::KeyWindow;
