use crate::range::{Ipv4Range, ProviderRange};

struct Entry<T> {
	range: Ipv4Range,
	seq: usize,
	value: T,
}

/// Immutable point-containment index over possibly overlapping IPv4 ranges.
///
/// Entries are kept sorted by start address. The sorted array doubles as an
/// implicit balanced tree (the node of `lo..hi` is its midpoint), and
/// `max_end[mid]` holds the largest end address within `lo..hi`, so a query
/// only descends into subtrees that can still contain the point.
///
/// Overlapping ranges are all kept. Matches are reported in insertion order.
pub struct IntervalIndex<T> {
	entries: Vec<Entry<T>>,
	max_end: Vec<u32>,
}

impl<T> IntervalIndex<T> {
	pub fn build(ranges: impl IntoIterator<Item = ProviderRange<T>>) -> Self {
		let mut entries: Vec<_> = ranges
			.into_iter()
			.enumerate()
			.map(|(seq, r)| Entry {
				range: r.range,
				seq,
				value: r.provider,
			})
			.collect();
		entries.sort_unstable_by_key(|e| (e.range.start, e.seq));

		let mut max_end = vec![0; entries.len()];
		fill_max_end(&entries, &mut max_end, 0, entries.len());
		Self { entries, max_end }
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// All values whose range contains `point`, first inserted first.
	pub fn query(&self, point: u32) -> Vec<&T> {
		let mut hits = Vec::new();
		self.collect(point, 0, self.entries.len(), &mut hits);
		hits.sort_unstable_by_key(|e| e.seq);
		hits.into_iter().map(|e| &e.value).collect()
	}

	/// The first inserted value whose range contains `point`.
	pub fn first(&self, point: u32) -> Option<&T> {
		let mut best = None;
		self.first_in(point, 0, self.entries.len(), &mut best);
		best.map(|e| &e.value)
	}

	pub fn iter(&self) -> impl Iterator<Item = (Ipv4Range, &T)> {
		self.entries.iter().map(|e| (e.range, &e.value))
	}

	fn collect<'a>(&'a self, point: u32, lo: usize, hi: usize, hits: &mut Vec<&'a Entry<T>>) {
		if lo >= hi {
			return;
		}
		let mid = lo + (hi - lo) / 2;
		if self.max_end[mid] < point {
			return;
		}
		self.collect(point, lo, mid, hits);
		let e = &self.entries[mid];
		// everything right of mid starts at or after e
		if e.range.start > point {
			return;
		}
		if e.range.end >= point {
			hits.push(e);
		}
		self.collect(point, mid + 1, hi, hits);
	}

	// same walk as collect, keeping only the lowest seq
	fn first_in<'a>(&'a self, point: u32, lo: usize, hi: usize, best: &mut Option<&'a Entry<T>>) {
		if lo >= hi {
			return;
		}
		let mid = lo + (hi - lo) / 2;
		if self.max_end[mid] < point {
			return;
		}
		self.first_in(point, lo, mid, best);
		let e = &self.entries[mid];
		if e.range.start > point {
			return;
		}
		if e.range.end >= point && best.is_none_or(|b| e.seq < b.seq) {
			*best = Some(e);
		}
		self.first_in(point, mid + 1, hi, best);
	}
}

fn fill_max_end<T>(entries: &[Entry<T>], max_end: &mut [u32], lo: usize, hi: usize) -> u32 {
	if lo >= hi {
		return 0;
	}
	let mid = lo + (hi - lo) / 2;
	let m = entries[mid]
		.range
		.end
		.max(fill_max_end(entries, max_end, lo, mid))
		.max(fill_max_end(entries, max_end, mid + 1, hi));
	max_end[mid] = m;
	m
}
