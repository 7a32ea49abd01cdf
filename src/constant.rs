use std::fmt::Debug;
use std::rc::Rc;

use crate::value::{Access, Ref, Value, ValueKind};
use crate::{Error, Source};

/// An inert value behind the reactive read interface: never registers
/// a dependency, never changes.
pub struct Constant<T> {
	body: Rc<ConstantBody<T>>,
}

impl<T> Clone for Constant<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

struct ConstantBody<T> {
	value: T,
}

impl<T> Constant<T> {
	pub fn new(value: T) -> Self {
		Constant {
			body: Rc::new(ConstantBody { value }),
		}
	}

	pub fn get(&self) -> &T {
		&self.body.value
	}
}

impl<T> Source for ConstantBody<T>
where
	T: 'static,
{
	fn update(&self) -> u64 {
		self.version()
	}

	fn version(&self) -> u64 {
		0
	}

	fn attach(&self, _: Rc<dyn Fn()>) -> u64 {
		0
	}

	fn detach(&self, _: u64) {}
}

impl<T> Access<T> for ConstantBody<T>
where
	T: 'static,
{
	fn get(&self) -> Ref<'_, T> {
		Ref::Ref(&self.value)
	}

	fn get_once(&self) -> Ref<'_, T> {
		Ref::Ref(&self.value)
	}

	fn kind(&self) -> ValueKind {
		ValueKind::Constant
	}

	fn writable(&self) -> bool {
		false
	}

	fn try_set(&self, _: T) -> Result<(), Error> {
		Err(Error::NotWritable)
	}
}

impl<T> From<Constant<T>> for Value<T>
where
	T: 'static,
{
	fn from(constant: Constant<T>) -> Self {
		Value::new(constant.body)
	}
}

impl<T> Debug for Constant<T>
where
	T: Debug,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.get().fmt(f)
	}
}
