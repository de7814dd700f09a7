use std::{fmt, net::Ipv4Addr};

use crate::error::{Error, Result};

/// Inclusive range of IPv4 addresses, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ipv4Range {
	pub start: u32,
	pub end: u32,
}

impl Ipv4Range {
	pub fn single(addr: Ipv4Addr) -> Self {
		let addr = u32::from(addr);
		Self {
			start: addr,
			end: addr,
		}
	}

	/// The block of `2^(32 - prefix_len)` addresses containing `addr`.
	pub fn from_cidr(addr: Ipv4Addr, prefix_len: u32) -> Option<Self> {
		if prefix_len > 32 {
			return None;
		}
		let mask = prefix_mask(prefix_len);
		let start = u32::from(addr) & mask;
		Some(Self {
			start,
			end: start | !mask,
		})
	}

	/// Accepts `a.b.c.d/len`, `a.b.c.d/m.m.m.m` and a bare `a.b.c.d`.
	pub fn parse(s: &str) -> Option<Self> {
		let s = s.trim_ascii();
		let Some((addr, len)) = s.split_once('/') else {
			return Some(Self::single(s.parse().ok()?));
		};
		let addr: Ipv4Addr = addr.parse().ok()?;
		let prefix_len = if len.contains('.') {
			netmask_len(len.parse().ok()?)?
		} else if !len.is_empty() && len.bytes().all(|b| b.is_ascii_digit()) {
			len.parse().ok()?
		} else {
			return None;
		};
		Self::from_cidr(addr, prefix_len)
	}

	pub fn contains(&self, addr: u32) -> bool {
		self.start <= addr && addr <= self.end
	}

	pub fn len(&self) -> u64 {
		(self.end - self.start) as u64 + 1
	}

	pub fn first(&self) -> Ipv4Addr {
		Ipv4Addr::from(self.start)
	}

	pub fn last(&self) -> Ipv4Addr {
		Ipv4Addr::from(self.end)
	}
}

impl fmt::Display for Ipv4Range {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}-{}", self.first(), self.last())
	}
}

fn prefix_mask(prefix_len: u32) -> u32 {
	// shifting a u32 by 32 overflows
	u32::MAX.checked_shl(32 - prefix_len).unwrap_or(0)
}

// only contiguous masks, "255.0.255.0" is rejected
fn netmask_len(mask: Ipv4Addr) -> Option<u32> {
	let mask = u32::from(mask);
	let len = mask.leading_ones();
	(len + mask.trailing_zeros() == 32).then_some(len)
}

/// A range labeled with the provider that announces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderRange<P> {
	pub provider: P,
	pub range: Ipv4Range,
}

impl<P> ProviderRange<P> {
	pub fn new(provider: P, range: Ipv4Range) -> Self {
		Self { provider, range }
	}

	pub fn relabel<Q>(self, provider: Q) -> ProviderRange<Q> {
		ProviderRange {
			provider,
			range: self.range,
		}
	}
}

/// Parse one range expression owned by `provider`.
pub fn normalize<'a>(provider: &'a str, expr: &str) -> Result<ProviderRange<&'a str>> {
	match Ipv4Range::parse(expr) {
		Some(range) => Ok(ProviderRange::new(provider, range)),
		None => Err(Error::MalformedRange {
			provider: provider.to_string(),
			expr: expr.to_string(),
		}),
	}
}
