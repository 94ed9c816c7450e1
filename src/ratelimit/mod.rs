//! Rate limiting logic and state management.

mod abuse;
mod backend;
mod blocklist;
mod decision;
mod limiter;
mod policy;
mod store;
pub(crate) mod violations;
mod window;

pub use abuse::{AbuseSuspect, HOUR_WEIGHT, MINUTE_WEIGHT};
pub use backend::{AdmissionBackend, FailSafe, FailureMode, UNAVAILABLE_REASON};
pub use blocklist::{BlockEntry, BlockList, BlockOrigin};
pub use decision::{Decision, Remaining, BLOCKED_REASON};
pub use limiter::RateLimiter;
pub use policy::{user_key, LimitPolicy, LimitType, PolicyResolver};
pub use store::EventStore;
pub use violations::{Violation, ViolationLog};
pub use window::{EventWindow, Period, TierRing};
