use std::{fmt, net::Ipv4Addr};

use log::*;
use rayon::prelude::*;

use crate::{
	error::{Error, Result},
	interval::IntervalIndex,
	range::{normalize, ProviderRange},
	source::RangeSource,
	utils::{FromLst, Tally},
};

/// A range expression left out of the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
	pub provider: String,
	pub expr: String,
}

impl fmt::Display for Skipped {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}: invalid range {:?}", self.provider, self.expr)
	}
}

/// Collects provider ranges for a [`Classifier`].
///
/// Ranges are indexed in the order they are added; when ranges of different
/// providers overlap, the one added first wins.
#[derive(Default)]
pub struct ClassifierBuilder {
	providers: Vec<String>,
	ranges: Vec<ProviderRange<usize>>,
	skipped: Vec<Skipped>,
}

impl ClassifierBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Index of `name` in the provider table, registering it if new.
	pub fn provider(&mut self, name: &str) -> usize {
		match self.providers.iter().position(|p| p == name) {
			Some(i) => i,
			None => {
				self.providers.push(name.to_string());
				self.providers.len() - 1
			}
		}
	}

	pub fn add_range(&mut self, provider: &str, expr: &str) -> Result<()> {
		let i = self.provider(provider);
		self.append_line(expr, i)
	}

	/// Adds every provider of `src` in name order. Malformed ranges are skipped.
	pub fn add_source(&mut self, src: &RangeSource) -> Tally {
		let mut c = Tally::default();
		for (name, ranges) in src {
			let i = self.provider(name);
			c += self.append_from(ranges, i);
		}
		c
	}

	pub fn build(self) -> Classifier {
		let index = IntervalIndex::build(self.ranges);
		info!(
			"indexed {} ranges of {} providers, skipped {}",
			index.len(),
			self.providers.len(),
			self.skipped.len()
		);
		Classifier {
			providers: self.providers,
			index,
			skipped: self.skipped,
		}
	}
}

impl FromLst<usize> for ClassifierBuilder {
	fn append_line(&mut self, l: &str, v: usize) -> Result<()> {
		let provider = self
			.providers
			.get(v)
			.ok_or_else(|| Error::UnknownProvider(v.to_string()))?;
		match normalize(provider, l) {
			Ok(r) => {
				self.ranges.push(r.relabel(v));
				Ok(())
			}
			Err(e) => {
				self.skipped.push(Skipped {
					provider: provider.clone(),
					expr: l.to_string(),
				});
				Err(e)
			}
		}
	}
}

/// Maps IPv4 addresses to the provider announcing them.
///
/// Immutable once built, share it by reference between threads.
pub struct Classifier {
	providers: Vec<String>,
	index: IntervalIndex<usize>,
	skipped: Vec<Skipped>,
}

impl Classifier {
	pub fn builder() -> ClassifierBuilder {
		ClassifierBuilder::new()
	}

	pub fn from_source(src: &RangeSource) -> Self {
		let mut b = ClassifierBuilder::new();
		b.add_source(src);
		b.build()
	}

	/// All providers, including those left without a valid range.
	pub fn providers(&self) -> &[String] {
		&self.providers
	}

	pub fn range_count(&self) -> usize {
		self.index.len()
	}

	/// Number of indexed ranges per provider, in provider table order.
	pub fn provider_ranges(&self) -> Vec<(&str, usize)> {
		let mut counts = vec![0; self.providers.len()];
		for (_, &i) in self.index.iter() {
			counts[i] += 1;
		}
		self.providers
			.iter()
			.map(|p| p.as_str())
			.zip(counts)
			.collect()
	}

	pub fn skipped(&self) -> &[Skipped] {
		&self.skipped
	}

	pub fn classify_addr(&self, addr: Ipv4Addr) -> Option<&str> {
		self.index
			.first(addr.into())
			.map(|&i| self.providers[i].as_str())
	}

	/// `Ok(None)` when the address is valid but no range covers it.
	pub fn classify(&self, addr: &str) -> Result<Option<&str>> {
		let p = self.classify_addr(parse_addr(addr)?);
		trace!("{} -> {:?}", addr, p);
		Ok(p)
	}

	/// Every provider covering `addr`, the winning one first.
	pub fn matches(&self, addr: &str) -> Result<Vec<&str>> {
		let addr = parse_addr(addr)?;
		Ok(self
			.index
			.query(addr.into())
			.into_iter()
			.map(|&i| self.providers[i].as_str())
			.collect())
	}

	/// One result per input address, in input order.
	pub fn classify_batch<S: AsRef<str>>(
		&self,
		addrs: impl IntoIterator<Item = S>,
	) -> Vec<Result<Option<&str>>> {
		addrs
			.into_iter()
			.map(|a| self.classify(a.as_ref()))
			.collect()
	}

	/// Like [`Classifier::classify_batch`], spread over the rayon thread pool.
	pub fn par_classify<S: AsRef<str> + Sync>(&self, addrs: &[S]) -> Vec<Result<Option<&str>>> {
		addrs
			.par_iter()
			.map(|a| self.classify(a.as_ref()))
			.collect()
	}
}

/// Dotted quad, surrounding whitespace ignored.
pub fn parse_addr(s: &str) -> Result<Ipv4Addr> {
	s.trim_ascii()
		.parse()
		.map_err(|_| Error::InvalidAddress(s.to_string()))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn acme() -> Classifier {
		let src: RangeSource = [(
			"acme",
			vec!["10.0.0.0/24".to_string(), "10.0.1.5/32".to_string()],
		)]
		.into_iter()
		.collect();
		Classifier::from_source(&src)
	}

	fn source(m: &[(&str, &[&str])]) -> RangeSource {
		m.iter()
			.map(|(p, r)| (*p, r.iter().map(|s| s.to_string()).collect()))
			.collect()
	}

	#[test]
	fn test_acme() {
		let c = acme();
		assert_eq!(c.classify("10.0.0.1").unwrap(), Some("acme"));
		assert_eq!(c.classify("10.0.1.5").unwrap(), Some("acme"));
		assert_eq!(c.classify("10.0.2.1").unwrap(), None);
		assert_eq!(c.classify(" 10.0.0.255\n").unwrap(), Some("acme"));
		assert!(matches!(
			c.classify("10.0.0"),
			Err(Error::InvalidAddress(a)) if a == "10.0.0"
		));
	}

	#[test]
	fn test_batch() {
		let c = acme();
		let r = c.classify_batch(["10.0.0.1", "8.8.8.8", "not-an-ip"]);
		assert_eq!(r.len(), 3);
		assert_eq!(r[0].as_ref().unwrap(), &Some("acme"));
		assert_eq!(r[1].as_ref().unwrap(), &None);
		assert!(matches!(r[2], Err(Error::InvalidAddress(_))));

		let addrs: Vec<String> = (0..1000)
			.map(|i| match i % 3 {
				0 => format!("10.0.0.{}", i % 256),
				1 => format!("10.0.{}.5", i % 256),
				_ => format!("10.0.0.{}", i),
			})
			.collect();
		let seq = c.classify_batch(&addrs);
		let par = c.par_classify(&addrs);
		assert_eq!(seq.len(), par.len());
		for (a, b) in seq.iter().zip(par.iter()) {
			match (a, b) {
				(Ok(a), Ok(b)) => assert_eq!(a, b),
				(Err(Error::InvalidAddress(a)), Err(Error::InvalidAddress(b))) => assert_eq!(a, b),
				_ => panic!("{:?} != {:?}", a, b),
			}
		}
	}

	#[test]
	fn test_malformed_skipped() {
		env_logger::builder().is_test(true).try_init().ok();
		let c = Classifier::from_source(&source(&[
			("acme", &["999.1.1.1/24", "10.0.0.0/24", "not-an-ip"]),
			("broken", &["nope", "1.2.3.4/40"]),
			("globex", &["192.0.2.0/24"]),
		]));
		assert_eq!(c.range_count(), 2);
		assert_eq!(c.providers(), ["acme", "broken", "globex"]);
		assert_eq!(
			c.provider_ranges(),
			[("acme", 1), ("broken", 0), ("globex", 1)]
		);
		let skipped: Vec<_> = c.skipped().iter().map(|s| s.expr.as_str()).collect();
		assert_eq!(skipped, ["999.1.1.1/24", "not-an-ip", "nope", "1.2.3.4/40"]);
		assert_eq!(
			c.skipped()[3].to_string(),
			"broken: invalid range \"1.2.3.4/40\""
		);
		assert_eq!(c.classify("10.0.0.9").unwrap(), Some("acme"));
		assert_eq!(c.classify("192.0.2.1").unwrap(), Some("globex"));
		assert_eq!(c.classify("999.1.1.1").ok(), None);
	}

	#[test]
	fn test_overlap() {
		let src = source(&[
			("zeta", &["10.0.0.0/8"]),
			("alpha", &["10.1.0.0/16"]),
			("mid", &["10.1.2.3"]),
		]);
		for _ in 0..3 {
			let c = Classifier::from_source(&src);
			// providers are added in name order, the first added wins
			assert_eq!(c.classify("10.1.2.3").unwrap(), Some("alpha"));
			assert_eq!(c.matches("10.1.2.3").unwrap(), ["alpha", "mid", "zeta"]);
			assert_eq!(c.classify("10.2.0.0").unwrap(), Some("zeta"));
		}

		let mut b = Classifier::builder();
		b.add_range("zeta", "10.0.0.0/8").unwrap();
		b.add_range("alpha", "10.1.0.0/16").unwrap();
		assert!(b.add_range("alpha", "10.1.0.0/99").is_err());
		let c = b.build();
		assert_eq!(c.classify("10.1.2.3").unwrap(), Some("zeta"));
		assert_eq!(c.skipped().len(), 1);
	}

	#[test]
	fn test_extremes() {
		let c = Classifier::from_source(&source(&[
			("low", &["0.0.0.0/32"]),
			("high", &["255.255.255.255"]),
		]));
		for (addr, expected) in [
			("0.0.0.0", Some("low")),
			("0.0.0.1", None),
			("255.255.255.254", None),
			("255.255.255.255", Some("high")),
		] {
			assert_eq!(c.classify(addr).unwrap(), expected, "{}", addr);
		}
	}

	#[test]
	fn test_empty() {
		let c = Classifier::from_source(&RangeSource::new());
		assert!(c.providers().is_empty());
		assert_eq!(c.classify("8.8.8.8").unwrap(), None);
		assert_eq!(c.classify_addr(Ipv4Addr::BROADCAST), None);
	}

	#[test]
	fn test_unknown_provider_index() {
		let mut b = ClassifierBuilder::new();
		assert!(matches!(
			b.append_line("10.0.0.0/8", 3),
			Err(Error::UnknownProvider(_))
		));
	}
}
