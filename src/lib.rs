pub mod macros;

mod addr;
mod computed;
mod constant;
mod dependencies;
mod detection;
mod diff;
mod equality;
mod limit;
mod observable;
mod schedule;
mod subscribable;
mod value;

use std::rc::Rc;

pub use computed::Computed;
pub use constant::Constant;
pub use dependencies::Dependencies;
pub use detection::{ignore, is_tracking, tracked_count};
pub use diff::{compare_arrays, DiffOptions, Edit, EditKind};
pub use limit::{Extender, NotificationPolicy, RateLimitMethod};
pub use observable::{Observable, Toggle};
pub use schedule::{advance, batch, in_batch, now, tick};
pub use subscribable::{Event, Subscribable, Subscription};
pub use value::{Access, Ref, Value, ValueKind};

pub trait Source: 'static {
	/// This function is called when we want this source to bring
	/// itself up to date; lazily evaluated sources recompute here.
	/// Returns the resulting version.
	fn update(&self) -> u64;

	/// This function should return the current version. The version
	/// is bumped on every accepted change.
	fn version(&self) -> u64;

	/// Register a change hook that fires after every accepted change,
	/// in order with ordinary subscribers. Returns the hook id.
	fn attach(&self, hook: Rc<dyn Fn()>) -> u64;

	/// Remove a previously attached change hook.
	fn detach(&self, hook: u64);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
	/// A computed without a write function was used as a setter.
	#[error("computed is not writable")]
	NotWritable,
}
