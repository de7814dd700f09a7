// INI-like conf:
//	# comment
//	[section]
//	key = value
// unknown keys and stray lines are warned about, section order is kept

use std::path::{Path, PathBuf};

use log::warn;

use crate::{error::Result, utils::read_lines};

pub trait Section {
	fn set(&mut self, k: &str, v: &str);
}

pub trait Conf: Sized {
	fn new() -> Self;
	fn sec_mut(&mut self, name: &str) -> &mut dyn Section;

	fn from_lines(conf: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
		let mut ret = Self::new();
		let mut sec = None;
		for l in conf {
			let l = l.as_ref().trim_ascii();
			if l.is_empty() || l.starts_with('#') {
				// empty line or comment
			} else if l.starts_with('[') && l.ends_with(']') {
				let name = l[1..l.len() - 1].trim_ascii();
				sec = Some(ret.sec_mut(name));
			} else if let Some(sec) = sec.as_mut() {
				match l.split_once('=') {
					None => warn!("invalid line, expected key = value: {}", l),
					Some((k, v)) => sec.set(k.trim_ascii_end(), v.trim_ascii_start()),
				}
			} else {
				warn!("invalid line, not in a section: {}", l);
			}
		}
		ret
	}

	fn from_file(conf: impl AsRef<Path>) -> Result<Self> {
		Ok(Self::from_lines(read_lines(conf)?))
	}
}

// ip2cloud's conf: a [global] section, every other section is a provider

#[derive(Debug)]
pub struct Ip2CloudConf {
	pub global: GlobalSec,
	pub providers: Vec<ProviderSec>,
}

impl Conf for Ip2CloudConf {
	fn new() -> Self {
		Self {
			global: GlobalSec::new(),
			providers: Vec::new(),
		}
	}

	fn sec_mut(&mut self, name: &str) -> &mut dyn Section {
		if name.eq_ignore_ascii_case("global") {
			return &mut self.global;
		}
		// a repeated section extends the provider instead of shadowing it
		match self.providers.iter().position(|p| p.name == name) {
			Some(i) => &mut self.providers[i],
			None => {
				self.providers.push(ProviderSec::new(name));
				let len = self.providers.len();
				&mut self.providers[len - 1]
			}
		}
	}
}

impl Default for Ip2CloudConf {
	fn default() -> Self {
		Self::new()
	}
}

#[derive(Debug)]
pub struct GlobalSec {
	pub data_dir: PathBuf,
	pub source: Option<PathBuf>,
	pub workers: Option<usize>,
}

impl GlobalSec {
	fn new() -> Self {
		Self {
			data_dir: PathBuf::from("data"),
			source: None,
			workers: None,
		}
	}
}

impl Section for GlobalSec {
	fn set(&mut self, k: &str, v: &str) {
		match k.to_ascii_lowercase().as_str() {
			"data_dir" => self.data_dir = PathBuf::from(v),
			"source" => self.source = Some(PathBuf::from(v)),
			"workers" => match v.parse() {
				Ok(n) if n > 0 => self.workers = Some(n),
				_ => warn!("invalid workers: {}", v),
			},
			_ => warn!("unknown key: {}", k),
		}
	}
}

#[derive(Debug)]
pub struct ProviderSec {
	pub name: String,
	pub files: Vec<PathBuf>,
	pub ranges: Vec<String>,
}

impl ProviderSec {
	fn new(name: &str) -> Self {
		Self {
			name: name.to_string(),
			files: Vec::new(),
			ranges: Vec::new(),
		}
	}
}

impl Section for ProviderSec {
	fn set(&mut self, k: &str, v: &str) {
		match k.to_ascii_lowercase().as_str() {
			"files" => self.files.extend(v.split_ascii_whitespace().map(PathBuf::from)),
			"ranges" => self.ranges.extend(v.split_ascii_whitespace().map(|s| s.to_string())),
			_ => warn!("unknown key: \"{}\"", k),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test() {
		env_logger::builder()
			.is_test(true)
			.filter_level(log::LevelFilter::Trace)
			.try_init()
			.ok();
		let c = Ip2CloudConf::from_file("../example.conf").unwrap();
		println!("{:?}", c);
		assert_eq!(c.global.data_dir, Path::new("data"));
		assert!(!c.providers.is_empty());
	}

	#[test]
	fn test_sections() {
		let c = Ip2CloudConf::from_lines([
			"stray = line",
			"# comment",
			"[Global]",
			"data_dir = /var/lib/ip2cloud",
			"workers = 0",
			"color = blue",
			"[acme]",
			"ranges = 10.0.0.0/24  10.0.1.5/32",
			"files = acme.txt",
			"[globex]",
			"ranges = 192.0.2.0/24",
			"no equals sign here",
			"[acme]",
			"ranges = 10.0.2.0/24",
		]);
		assert_eq!(c.global.data_dir, Path::new("/var/lib/ip2cloud"));
		assert_eq!(c.global.workers, None);
		assert_eq!(c.global.source, None);

		let names: Vec<_> = c.providers.iter().map(|p| p.name.as_str()).collect();
		assert_eq!(names, ["acme", "globex"]);
		assert_eq!(
			c.providers[0].ranges,
			["10.0.0.0/24", "10.0.1.5/32", "10.0.2.0/24"]
		);
		assert_eq!(c.providers[0].files, [PathBuf::from("acme.txt")]);
		assert_eq!(c.providers[1].ranges, ["192.0.2.0/24"]);
	}
}
