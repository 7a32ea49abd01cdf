use std::ops::Deref;
use std::rc::Rc;

use crate::Error;

/// What a `Value` wraps.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ValueKind {
	Constant,
	Observable,
	Computed,
}

/// A unified read handle over a plain value, an observable or a
/// computed. Consumers that accept "value or reactive cell" hold one
/// of these and read it uniformly.
pub struct Value<T> {
	value: Rc<dyn Access<T>>,
}

impl<T> Clone for Value<T> {
	fn clone(&self) -> Self {
		Value {
			value: self.value.clone(),
		}
	}
}

impl<T> Value<T>
where
	T: 'static,
{
	pub fn new(value: Rc<dyn Access<T>>) -> Self {
		Value { value }
	}

	/// Wrap a plain, inert value.
	pub fn constant(value: T) -> Self {
		crate::Constant::new(value).into()
	}

	/// Tracked read.
	pub fn get(&self) -> Ref<'_, T> {
		self.value.get()
	}

	/// Untracked read.
	pub fn get_once(&self) -> Ref<'_, T> {
		self.value.get_once()
	}

	pub fn kind(&self) -> ValueKind {
		self.value.kind()
	}

	pub fn is_reactive(&self) -> bool {
		self.value.kind() != ValueKind::Constant
	}

	pub fn writable(&self) -> bool {
		self.value.writable()
	}

	/// Write through to the underlying cell; constants and read-only
	/// computeds refuse.
	pub fn try_set(&self, value: T) -> Result<(), Error> {
		self.value.try_set(value)
	}
}

pub enum Ref<'a, T> {
	Ref(&'a T),
	Cell(std::cell::Ref<'a, T>),
}

impl<'a, T> Deref for Ref<'a, T> {
	type Target = T;

	fn deref(&self) -> &Self::Target {
		match self {
			Ref::Cell(guard) => guard.deref(),
			Ref::Ref(value) => value,
		}
	}
}

pub trait Access<T>: 'static {
	fn get(&self) -> Ref<'_, T>;
	fn get_once(&self) -> Ref<'_, T>;
	fn kind(&self) -> ValueKind;
	fn writable(&self) -> bool;
	fn try_set(&self, value: T) -> Result<(), Error>;
}
