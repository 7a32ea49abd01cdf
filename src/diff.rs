use std::hash::Hash;

use fxhash::FxHashMap;
use smallvec::SmallVec;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EditKind {
	Retained,
	Added,
	Deleted,
}

/// One entry of an edit script. `index` is a position in the new array
/// for added and retained entries, in the old array for deleted ones.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Edit<T> {
	pub kind: EditKind,
	pub value: T,
	pub index: usize,
	/// For a delete/add pair recognized as a relocation: the partner's
	/// index (the add's new-array position on the delete, the delete's
	/// old-array position on the add).
	pub moved: Option<usize>,
}

#[derive(Clone, Copy, Default, Debug)]
pub struct DiffOptions {
	/// Pair up every relocation regardless of how many comparisons it
	/// takes; by default the move search stops after a budget linear
	/// in the array sizes.
	pub dont_limit_moves: bool,
	/// Omit retained entries from the script.
	pub sparse: bool,
}

/// Compute an ordered edit script turning `old` into `new`.
///
/// Matching is a patience diff: each new element is assigned the next
/// unused occurrence of its value in `old`, and the longest increasing
/// chain of those assignments becomes the retained set, preferring
/// earlier indices on ties. Replaying the script against `old` —
/// removing deletions at their index, inserting additions at theirs —
/// reproduces `new` exactly.
pub fn compare_arrays<T>(old: &[T], new: &[T], options: DiffOptions) -> Vec<Edit<T>>
where
	T: Eq + Hash + Clone,
{
	let mut occurrences: FxHashMap<&T, SmallVec<[usize; 2]>> = FxHashMap::default();
	for (index, value) in old.iter().enumerate() {
		occurrences.entry(value).or_default().push(index);
	}

	// candidate old index per new element, consumed in order so
	// duplicates match by availability
	let mut cursors: FxHashMap<&T, usize> = FxHashMap::default();
	let mut candidates: Vec<Option<usize>> = Vec::with_capacity(new.len());
	for value in new {
		let candidate = occurrences.get(value).and_then(|list| {
			let cursor = cursors.entry(value).or_insert(0);
			if *cursor < list.len() {
				let index = list[*cursor];
				*cursor += 1;
				Some(index)
			} else {
				None
			}
		});
		candidates.push(candidate);
	}

	let retained = longest_increasing(&candidates);

	let mut edits: Vec<Edit<T>> = Vec::with_capacity(old.len().max(new.len()));
	let mut old_cursor = 0usize;
	let mut new_cursor = 0usize;

	for &(old_index, new_index) in &retained {
		while old_cursor < old_index {
			edits.push(Edit {
				kind: EditKind::Deleted,
				value: old[old_cursor].clone(),
				index: old_cursor,
				moved: None,
			});
			old_cursor += 1;
		}
		while new_cursor < new_index {
			edits.push(Edit {
				kind: EditKind::Added,
				value: new[new_cursor].clone(),
				index: new_cursor,
				moved: None,
			});
			new_cursor += 1;
		}
		edits.push(Edit {
			kind: EditKind::Retained,
			value: new[new_index].clone(),
			index: new_index,
			moved: None,
		});
		old_cursor = old_index + 1;
		new_cursor = new_index + 1;
	}
	while old_cursor < old.len() {
		edits.push(Edit {
			kind: EditKind::Deleted,
			value: old[old_cursor].clone(),
			index: old_cursor,
			moved: None,
		});
		old_cursor += 1;
	}
	while new_cursor < new.len() {
		edits.push(Edit {
			kind: EditKind::Added,
			value: new[new_cursor].clone(),
			index: new_cursor,
			moved: None,
		});
		new_cursor += 1;
	}

	find_moves(&mut edits, old.len().max(new.len()), options.dont_limit_moves);

	if options.sparse {
		edits.retain(|edit| edit.kind != EditKind::Retained);
	}

	edits
}

/// Longest strictly increasing chain of candidate old indices, as
/// `(old index, new index)` pairs in new-array order.
fn longest_increasing(candidates: &[Option<usize>]) -> Vec<(usize, usize)> {
	// patience: `tails[k]` is the pair ending the best known chain of
	// length k + 1; binary search keeps the whole pass n log n
	let mut pairs: Vec<(usize, usize)> = Vec::new();
	let mut parents: Vec<Option<usize>> = Vec::new();
	let mut tails: Vec<usize> = Vec::new();

	for (new_index, candidate) in candidates.iter().enumerate() {
		let old_index = match candidate {
			Some(index) => *index,
			None => continue,
		};

		let position = tails.partition_point(|&tail| pairs[tail].0 < old_index);
		parents.push(if position > 0 {
			Some(tails[position - 1])
		} else {
			None
		});
		pairs.push((old_index, new_index));

		let latest = pairs.len() - 1;
		if position == tails.len() {
			tails.push(latest);
		} else {
			tails[position] = latest;
		}
	}

	let mut chain = Vec::new();
	let mut current = tails.last().copied();
	while let Some(index) = current {
		chain.push(pairs[index]);
		current = parents[index];
	}
	chain.reverse();
	chain
}

/// Pair up deleted and added entries of equal value so consumers can
/// reposition instead of destroy-and-recreate. The comparison budget
/// keeps this pass near-linear unless the caller lifts it.
fn find_moves<T: Eq>(edits: &mut [Edit<T>], scale: usize, dont_limit: bool) {
	let budget = if dont_limit {
		usize::MAX
	} else {
		scale.saturating_mul(10)
	};
	let mut failed = 0usize;

	let deleted: Vec<usize> = positions(edits, EditKind::Deleted);
	let added: Vec<usize> = positions(edits, EditKind::Added);

	for &delete in &deleted {
		let mut partner = None;
		for &add in &added {
			if edits[add].moved.is_some() {
				continue;
			}
			if edits[add].value == edits[delete].value {
				partner = Some(add);
				break;
			}
			failed += 1;
			if failed > budget {
				return;
			}
		}
		if let Some(add) = partner {
			edits[delete].moved = Some(edits[add].index);
			edits[add].moved = Some(edits[delete].index);
		}
	}
}

fn positions<T>(edits: &[Edit<T>], kind: EditKind) -> Vec<usize> {
	edits
		.iter()
		.enumerate()
		.filter(|(_, edit)| edit.kind == kind)
		.map(|(position, _)| position)
		.collect()
}
