use std::cell::{Cell, RefCell};
use std::rc::Rc;

use mockall::predicate::eq;
use tether::{
	advance, batch, Computed, Error, Event, Extender, Observable, RateLimitMethod, Subscribable,
	Subscription, Value, ValueKind,
};


use mock::Spy;

#[test]
fn computed_follows_dependency_writes() {
	let a = Observable::new(10u64);
	assert_eq!(*a.get_once(), 10);

	let b = Computed::new({
		let a = a.clone();
		move || *a.get() + 10
	});

	assert_eq!(*b.get_once(), 20);

	let mock = mock::SharedMock::new();

	mock.get().expect_trigger().times(1).return_const(());

	let subscription = b.subscribe({
		let mock = mock.clone();
		move |value| mock.get().trigger(*value)
	});

	a.set(20);

	assert_eq!(*b.get_once(), 30);
	mock.get().checkpoint();
	subscription.dispose();
}

#[test]
fn equal_writes_are_stored_silently() {
	let a = Observable::new(5u64);

	let mock = mock::SharedMock::new();
	mock.get().expect_trigger().times(0).return_const(());

	let _subscription = a.subscribe({
		let mock = mock.clone();
		move |value| mock.get().trigger(*value)
	});

	a.set(5);
	a.set(5);
	mock.get().checkpoint();

	mock.get()
		.expect_trigger()
		.with(eq(7u64))
		.times(1)
		.return_const(());
	a.set(7);
	a.set(7);
	mock.get().checkpoint();
}

#[test]
fn conditional_reads_swap_subscriptions() {
	let flag = Observable::new(true);
	let a = Observable::new(1u64);
	let b = Observable::new(2u64);

	let chooser = Computed::new({
		let flag = flag.clone();
		let a = a.clone();
		let b = b.clone();
		move || if *flag.get() { *a.get() } else { *b.get() }
	});

	assert_eq!(chooser.dependencies_count(), 2);
	assert_eq!(a.subscriptions_count(None), 1);
	assert_eq!(b.subscriptions_count(None), 0);
	assert_eq!(*chooser.get_once(), 1);

	flag.set(false);

	assert_eq!(chooser.dependencies_count(), 2);
	assert_eq!(a.subscriptions_count(None), 0);
	assert_eq!(b.subscriptions_count(None), 1);
	assert_eq!(*chooser.get_once(), 2);

	// the stale branch no longer triggers re-evaluation
	let mock = mock::SharedMock::new();
	mock.get().expect_trigger().times(0).return_const(());
	let _subscription = chooser.subscribe({
		let mock = mock.clone();
		move |value| mock.get().trigger(*value)
	});
	a.set(100);
	mock.get().checkpoint();
	assert_eq!(*chooser.get_once(), 2);
}

#[test]
fn reentrant_reads_short_circuit_to_the_cache() {
	let base = Observable::new(1u64);
	let slot: Rc<RefCell<Option<Computed<u64>>>> = Rc::new(RefCell::new(None));

	let accumulator = Computed::new({
		let base = base.clone();
		let slot = slot.clone();
		move || {
			let current = *base.get();
			let myself = slot.borrow().clone();
			match myself {
				Some(myself) => current + *myself.get(),
				None => current,
			}
		}
	});

	assert_eq!(*accumulator.get_once(), 1);

	*slot.borrow_mut() = Some(accumulator.clone());
	base.set(2);

	// the inner read observed the cached 1, not an endless recursion
	assert_eq!(*accumulator.get_once(), 3);
}

#[test]
fn double_dispose_is_a_noop() {
	let value = Observable::new(1u64);
	assert_eq!(value.subscriptions_count(None), 0);

	let handle = value.subscribe(|_| {});
	assert_eq!(value.subscriptions_count(None), 1);

	handle.dispose();
	handle.dispose();
	assert!(handle.is_disposed());
	assert_eq!(value.subscriptions_count(None), 0);
}

#[test]
fn deferred_delivery_coalesces_a_turn_into_one_notification() {
	let value = Observable::new(0u64);
	value.extend(Extender::Deferred);

	let mock = mock::SharedMock::new();
	mock.get()
		.expect_trigger()
		.with(eq(3u64))
		.times(1)
		.return_const(());

	let _subscription = value.subscribe({
		let mock = mock.clone();
		move |value| mock.get().trigger(*value)
	});

	batch(|| {
		value.set(1);
		value.set(2);
		value.set(3);
	});

	mock.get().checkpoint();
}

#[test]
fn deferred_write_back_to_the_delivered_value_is_suppressed() {
	let value = Observable::new(1u64);
	value.extend(Extender::Deferred);

	let mock = mock::SharedMock::new();
	mock.get().expect_trigger().times(0).return_const(());

	let _subscription = value.subscribe({
		let mock = mock.clone();
		move |value| mock.get().trigger(*value)
	});

	batch(|| {
		value.set(2);
		value.set(1);
	});

	mock.get().checkpoint();
}

#[test]
fn debounce_delivers_once_the_writes_stop() {
	let value = Observable::new(0u64);
	value.extend(Extender::RateLimit {
		timeout: 50,
		method: RateLimitMethod::NotifyWhenChangesStop,
	});

	let mock = mock::SharedMock::new();
	mock.get()
		.expect_trigger()
		.with(eq(2u64))
		.times(1)
		.return_const(());

	let _subscription = value.subscribe({
		let mock = mock.clone();
		move |value| mock.get().trigger(*value)
	});

	value.set(1);
	advance(30);
	value.set(2); // resets the timer
	advance(30); // 60ms in, but only 30ms since the last write
	advance(25); // now the window has been quiet long enough

	mock.get().checkpoint();
}

#[test]
fn throttle_delivers_the_latest_value_at_a_fixed_cadence() {
	let value = Observable::new(0u64);
	value.extend(Extender::RateLimit {
		timeout: 50,
		method: RateLimitMethod::NotifyAtFixedRate,
	});

	let mock = mock::SharedMock::new();
	mock.get()
		.expect_trigger()
		.with(eq(3u64))
		.times(1)
		.return_const(());

	let _subscription = value.subscribe({
		let mock = mock.clone();
		move |value| mock.get().trigger(*value)
	});

	value.set(1);
	advance(10);
	value.set(2);
	advance(10);
	value.set(3);
	advance(40);

	mock.get().checkpoint();
}

#[test]
fn a_limited_computed_updates_its_cache_synchronously() {
	let source = Observable::new(1u64);
	let doubled = Computed::new({
		let source = source.clone();
		move || *source.get() * 2
	});
	doubled.extend(Extender::Deferred);

	let mock = mock::SharedMock::new();
	mock.get()
		.expect_trigger()
		.with(eq(6u64))
		.times(1)
		.return_const(());

	let _subscription = doubled.subscribe({
		let mock = mock.clone();
		move |value| mock.get().trigger(*value)
	});

	batch(|| {
		source.set(2);
		assert_eq!(*doubled.get_once(), 4);
		source.set(3);
	});

	mock.get().checkpoint();
	assert_eq!(*doubled.get_once(), 6);
}

#[test]
fn pure_computeds_sleep_until_observed() {
	let source = Observable::new(1u64);
	let evaluations = Rc::new(Cell::new(0u32));

	let doubled = Computed::pure({
		let source = source.clone();
		let evaluations = evaluations.clone();
		move || {
			evaluations.set(evaluations.get() + 1);
			*source.get() * 2
		}
	});

	assert_eq!(evaluations.get(), 0);
	assert_eq!(*doubled.get_once(), 2);
	assert_eq!(evaluations.get(), 1);
	assert_eq!(source.subscriptions_count(None), 0);

	assert_eq!(*doubled.get_once(), 2);
	assert_eq!(evaluations.get(), 1);

	source.set(5);
	assert_eq!(evaluations.get(), 1);
	assert_eq!(*doubled.get_once(), 10);
	assert_eq!(evaluations.get(), 2);

	let subscription = doubled.subscribe(|_| {});
	assert_eq!(source.subscriptions_count(None), 1);

	source.set(6);
	assert_eq!(evaluations.get(), 3);
	assert_eq!(*doubled.get_once(), 12);

	subscription.dispose();
	assert_eq!(source.subscriptions_count(None), 0);
}

#[test]
fn writable_computeds_route_through_their_write_function() {
	let celsius = Observable::new(0i64);

	let fahrenheit = Computed::writable(
		{
			let celsius = celsius.clone();
			move || *celsius.get() * 9 / 5 + 32
		},
		{
			let celsius = celsius.clone();
			move |value| celsius.set((value - 32) * 5 / 9)
		},
	);

	assert_eq!(*fahrenheit.get_once(), 32);

	fahrenheit.set(212).unwrap();
	assert_eq!(*celsius.get_once(), 100);
	assert_eq!(*fahrenheit.get_once(), 212);

	let read_only = Computed::new({
		let celsius = celsius.clone();
		move || *celsius.get()
	});
	assert_eq!(read_only.set(1), Err(Error::NotWritable));
}

#[test]
fn disposal_freezes_the_value_and_severs_dependencies() {
	let source = Observable::new(1u64);
	let doubled = Computed::new({
		let source = source.clone();
		move || *source.get() * 2
	});

	assert!(doubled.is_active());
	assert_eq!(source.subscriptions_count(None), 1);

	doubled.dispose();
	assert!(doubled.is_disposed());
	assert_eq!(source.subscriptions_count(None), 0);

	source.set(10);
	assert_eq!(*doubled.get_once(), 2);

	// writes to a disposed computed are dropped, not an error
	assert!(doubled.set(5).is_ok());
	doubled.dispose();
}

#[test]
fn ignored_reads_do_not_become_dependencies() {
	let tracked = Observable::new(1u64);
	let untracked = Observable::new(10u64);

	let sum = Computed::new({
		let tracked = tracked.clone();
		let untracked = untracked.clone();
		move || *tracked.get() + tether::ignore(|| *untracked.get())
	});

	assert_eq!(sum.dependencies_count(), 1);
	assert_eq!(*sum.get_once(), 11);

	untracked.set(20);
	assert_eq!(*sum.get_once(), 11);

	tracked.set(2);
	assert_eq!(*sum.get_once(), 22);
}

#[test]
fn untracked_reads_are_not_dependencies() {
	let a = Observable::new(1u64);
	let b = Observable::new(2u64);

	let c = Computed::new({
		let a = a.clone();
		let b = b.clone();
		move || *a.get() + *b.get_once()
	});

	assert_eq!(c.dependencies_count(), 1);
	assert_eq!(b.subscriptions_count(None), 0);
}

#[test]
fn a_panicking_evaluation_leaves_the_last_good_state() {
	let source = Observable::new(1u64);
	let explode = Observable::new(false);

	let computed = Computed::new({
		let source = source.clone();
		let explode = explode.clone();
		move || {
			if *explode.get() {
				panic!("read function failure");
			}
			*source.get() * 10
		}
	});

	assert_eq!(*computed.get_once(), 10);
	assert_eq!(computed.dependencies_count(), 2);

	let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| explode.set(true)));
	assert!(result.is_err());

	// last good value and the previous subscriptions survive
	assert_eq!(*computed.get_once(), 10);
	assert_eq!(computed.dependencies_count(), 2);
	assert!(!tether::is_tracking());

	explode.set(false);
	source.set(2);
	assert_eq!(*computed.get_once(), 20);
}

#[test]
fn unchanged_computed_results_do_not_cascade() {
	let number = Observable::new(2u64);
	let parity = Computed::new({
		let number = number.clone();
		move || *number.get() % 2
	});

	let mock = mock::SharedMock::new();
	mock.get().expect_trigger().times(0).return_const(());
	let _subscription = parity.subscribe({
		let mock = mock.clone();
		move |value| mock.get().trigger(*value)
	});

	number.set(4);
	mock.get().checkpoint();
	assert_eq!(*parity.get_once(), 0);
}

#[test]
fn before_change_presents_the_outgoing_value() {
	let value = Observable::new(1u64);
	let log: Rc<RefCell<Vec<(&str, u64)>>> = Rc::new(RefCell::new(Vec::new()));

	let _before = value.subscribe_event(Event::BeforeChange, {
		let log = log.clone();
		move |value| log.borrow_mut().push(("before", *value))
	});
	let _after = value.subscribe({
		let log = log.clone();
		move |value| log.borrow_mut().push(("after", *value))
	});

	value.set(9);
	assert_eq!(&*log.borrow(), &[("before", 1), ("after", 9)]);
}

#[test]
fn subscribable_dispatches_in_subscription_order() {
	let events: Subscribable<u64> = Subscribable::new();
	let log: Rc<RefCell<Vec<(&str, u64)>>> = Rc::new(RefCell::new(Vec::new()));

	let first = events.subscribe({
		let log = log.clone();
		move |value| log.borrow_mut().push(("first", *value))
	});
	let _second = events.subscribe({
		let log = log.clone();
		move |value| log.borrow_mut().push(("second", *value))
	});

	events.notify_subscribers(&1);
	assert_eq!(&*log.borrow(), &[("first", 1), ("second", 1)]);

	first.dispose();
	events.notify_subscribers(&2);
	assert_eq!(log.borrow().last(), Some(&("second", 2)));
	assert_eq!(events.subscriptions_count(None), 1);
}

#[test]
fn disposal_during_dispatch_does_not_skip_unrelated_subscribers() {
	let value = Observable::new(0u64);
	let log: Rc<RefCell<Vec<(&str, u64)>>> = Rc::new(RefCell::new(Vec::new()));
	let victim: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

	let _first = value.subscribe({
		let log = log.clone();
		let victim = victim.clone();
		move |value| {
			log.borrow_mut().push(("first", *value));
			if let Some(victim) = victim.borrow().as_ref() {
				victim.dispose();
			}
		}
	});
	let second = value.subscribe({
		let log = log.clone();
		move |value| log.borrow_mut().push(("second", *value))
	});
	*victim.borrow_mut() = Some(second);

	// the round in flight still runs its full snapshot
	value.set(1);
	assert_eq!(&*log.borrow(), &[("first", 1), ("second", 1)]);

	// from the next round on the disposed entry is gone
	value.set(2);
	assert_eq!(log.borrow().len(), 3);
	assert_eq!(log.borrow().last(), Some(&("first", 2)));
}

#[test]
fn value_handles_unify_constants_and_cells() {
	let plain: Value<u64> = Value::constant(5);
	assert!(!plain.is_reactive());
	assert!(!plain.writable());
	assert_eq!(plain.try_set(9), Err(Error::NotWritable));
	assert_eq!(*plain.get_once(), 5);

	let cell = Observable::new(1u64);
	let value: Value<u64> = cell.clone().into();
	assert!(value.is_reactive());
	assert_eq!(value.kind(), ValueKind::Observable);
	assert!(value.writable());
	value.try_set(7).unwrap();
	assert_eq!(*cell.get_once(), 7);

	let derived: Value<u64> = Computed::new({
		let cell = cell.clone();
		move || *cell.get()
	})
	.into();
	assert_eq!(derived.kind(), ValueKind::Computed);
	assert!(!derived.writable());
	assert_eq!(derived.try_set(3), Err(Error::NotWritable));
	assert_eq!(*derived.get_once(), 7);
}

#[test]
fn in_place_mutation_detects_content_changes() {
	let items = Observable::new(vec![1u64, 2]);
	let count = Computed::new({
		let items = items.clone();
		move || items.get().len() as u64
	});

	items.modify(|items| items.push(3));
	assert_eq!(*count.get_once(), 3);

	let mock = mock::SharedMock::new();
	mock.get().expect_trigger().times(0).return_const(());
	let _subscription = count.subscribe({
		let mock = mock.clone();
		move |value| mock.get().trigger(*value)
	});

	items.modify(|_| {});
	mock.get().checkpoint();
}

#[test]
fn toggle_flips_boolean_cells() {
	let flag = Observable::new(false);
	flag.toggle();
	assert!(*flag.get_once());
	flag.toggle();
	assert!(!*flag.get_once());
}

#[test]
fn force_set_notifies_without_a_value_change() {
	let value = Observable::new(1u64);

	let mock = mock::SharedMock::new();
	mock.get()
		.expect_trigger()
		.with(eq(1u64))
		.times(1)
		.return_const(());

	let _subscription = value.subscribe({
		let mock = mock.clone();
		move |value| mock.get().trigger(*value)
	});

	value.force_set(1);
	mock.get().checkpoint();
}

#[test]
fn computed_macro_clones_its_captures() {
	let a = Observable::new(1u64);
	let b = Observable::new(2u64);

	let sum = tether::computed!((a, b) => *a.get() + *b.get());
	assert_eq!(*sum.get_once(), 3);

	a.set(10);
	assert_eq!(*sum.get_once(), 12);

	let lazy = tether::pure!((sum) => *sum.get() * 10);
	assert_eq!(*lazy.get_once(), 120);
	b.set(0);
	assert_eq!(*lazy.get_once(), 100);
}

#[test]
fn deferred_computeds_wait_for_their_first_read() {
	let source = Observable::new(2u64);
	let evaluations = Rc::new(Cell::new(0u32));

	let squared = Computed::deferred({
		let source = source.clone();
		let evaluations = evaluations.clone();
		move || {
			evaluations.set(evaluations.get() + 1);
			*source.get() * *source.get()
		}
	});

	assert_eq!(evaluations.get(), 0);
	assert!(!squared.is_active());

	assert_eq!(*squared.get_once(), 4);
	assert_eq!(evaluations.get(), 1);
	assert!(squared.is_active());

	source.set(3);
	assert_eq!(*squared.get_once(), 9);
}

#[test]
fn chained_computeds_cascade_in_one_write() {
	let base = Observable::new(1u64);
	let doubled = Computed::new({
		let base = base.clone();
		move || *base.get() * 2
	});
	let quadrupled = Computed::new({
		let doubled = doubled.clone();
		move || *doubled.get() * 2
	});

	let mock = mock::SharedMock::new();
	mock.get()
		.expect_trigger()
		.with(eq(12u64))
		.times(1)
		.return_const(());
	let _subscription = quadrupled.subscribe({
		let mock = mock.clone();
		move |value| mock.get().trigger(*value)
	});

	base.set(3);
	assert_eq!(*quadrupled.get_once(), 12);
	mock.get().checkpoint();
}
