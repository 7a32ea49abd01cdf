use std::hash::Hash;
use std::rc::Rc;

/// Per-instance change-detection strategy.
///
/// The default hashes values with `fxhash`, so "changed" means the
/// content hash moved; a write that stores an equal-but-distinct value
/// is accepted silently. `With` swaps in a caller-supplied comparer and
/// `Always` treats every write as a change.
pub(crate) enum Equality<T> {
	Hash(Rc<dyn Fn(&T) -> u64>),
	With(Rc<dyn Fn(&T, &T) -> bool>),
	Always,
}

impl<T> Clone for Equality<T> {
	fn clone(&self) -> Self {
		match self {
			Equality::Hash(hash) => Equality::Hash(hash.clone()),
			Equality::With(eq) => Equality::With(eq.clone()),
			Equality::Always => Equality::Always,
		}
	}
}

impl<T> Equality<T> {
	pub fn hashed() -> Self
	where
		T: Hash,
	{
		Equality::Hash(Rc::new(|value| fxhash::hash64(value)))
	}

	pub fn with(eq: impl Fn(&T, &T) -> bool + 'static) -> Self {
		Equality::With(Rc::new(eq))
	}

	pub fn differs(&self, old: &T, new: &T) -> bool {
		match self {
			Equality::Hash(hash) => hash(old) != hash(new),
			Equality::With(eq) => !eq(old, new),
			Equality::Always => true,
		}
	}

	/// Marker for the value a rate-limited window started from. Only
	/// the hashed strategy can recognize a value that came back; the
	/// others always deliver at flush time.
	pub fn window_base(&self, value: &T) -> Option<u64> {
		match self {
			Equality::Hash(hash) => Some(hash(value)),
			_ => None,
		}
	}

	pub fn matches_base(&self, base: u64, value: &T) -> bool {
		match self {
			Equality::Hash(hash) => hash(value) == base,
			_ => false,
		}
	}
}
