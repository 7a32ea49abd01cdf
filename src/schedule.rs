use std::cell::{Cell, RefCell};
use std::rc::Rc;

thread_local! {
	static STARTED: Cell<bool> = Cell::new(false);
	static QUEUE: RefCell<Vec<Rc<dyn Fn()>>> = RefCell::new(Vec::new());
	static TIMERS: RefCell<Vec<Timer>> = RefCell::new(Vec::new());
	static NOW: Cell<u64> = Cell::new(0);
	static NEXT_TIMER: Cell<u64> = Cell::new(1);
}

struct Timer {
	id: u64,
	deadline: u64,
	task: Rc<dyn Fn()>,
}

pub fn in_batch() -> bool {
	STARTED.with(|started| started.get())
}

/// Group writes into one turn. Deferred notifications scheduled inside
/// flush once, at the close of the outermost batch.
pub fn batch(func: impl FnOnce()) {
	let is_root = batch_start();
	func();
	if is_root {
		batch_stop();
		run_queue();
	}
}

fn batch_start() -> bool {
	STARTED.with(|started| {
		if !started.get() {
			started.set(true);
			true
		} else {
			false
		}
	})
}

fn batch_stop() {
	STARTED.with(|started| started.set(false));
}

/// The turn boundary for code that does not use `batch`: flush every
/// deferred notification queued so far.
pub fn tick() {
	run_queue();
}

fn run_queue() {
	loop {
		let tasks = QUEUE.with(|queue| std::mem::take(&mut *queue.borrow_mut()));

		if tasks.is_empty() {
			break;
		}

		for task in tasks {
			task();
		}
	}
}

pub(crate) fn enqueue(task: Rc<dyn Fn()>) {
	QUEUE.with(|queue| queue.borrow_mut().push(task));
}

/// Current reading of the virtual clock, in milliseconds.
pub fn now() -> u64 {
	NOW.with(|now| now.get())
}

pub(crate) fn set_timeout(delay: u64, task: Rc<dyn Fn()>) -> u64 {
	let id = NEXT_TIMER.with(|next| {
		let id = next.get();
		next.set(id + 1);
		id
	});
	let deadline = now() + delay;
	TIMERS.with(|timers| {
		timers.borrow_mut().push(Timer {
			id,
			deadline,
			task,
		})
	});
	id
}

pub(crate) fn clear_timeout(id: u64) {
	TIMERS.with(|timers| timers.borrow_mut().retain(|timer| timer.id != id));
}

/// Advance the virtual clock, firing due timers in deadline order.
/// Timer tasks may schedule further timers; anything due within the
/// advanced window fires in this call.
pub fn advance(delta: u64) {
	let target = now() + delta;

	loop {
		let due = TIMERS.with(|timers| {
			let mut timers = timers.borrow_mut();
			let mut best: Option<(u64, u64, usize)> = None;
			for (index, timer) in timers.iter().enumerate() {
				if timer.deadline > target {
					continue;
				}
				let key = (timer.deadline, timer.id);
				if best.map_or(true, |(deadline, id, _)| key < (deadline, id)) {
					best = Some((key.0, key.1, index));
				}
			}
			best.map(|(_, _, index)| timers.remove(index))
		});

		match due {
			Some(timer) => {
				NOW.with(|now| now.set(now.get().max(timer.deadline)));
				(timer.task)();
			}
			None => break,
		}
	}

	NOW.with(|now| now.set(target));
}
