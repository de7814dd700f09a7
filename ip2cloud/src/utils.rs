use std::{fs, path::Path};

use log::*;

use crate::error::{Error, Result};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
	pub loaded: usize,
	pub skipped: usize,
}

impl std::ops::AddAssign for Tally {
	fn add_assign(&mut self, rhs: Self) {
		self.loaded += rhs.loaded;
		self.skipped += rhs.skipped;
	}
}

/// Line list loading: one entry per line, blank lines and `#` comments ignored.
pub trait FromLst<T: Copy> {
	fn append_line(&mut self, l: &str, v: T) -> Result<()>;

	fn append_from(&mut self, lst: impl IntoIterator<Item = impl AsRef<str>>, v: T) -> Tally {
		let mut c = Tally::default();
		for l in lst {
			let l = l.as_ref();
			let l = l.trim_ascii();
			if l.is_empty() || l.starts_with('#') {
				continue;
			}
			match self.append_line(l, v) {
				Ok(()) => c.loaded += 1,
				Err(e) => {
					warn!("skipping line: {}", e);
					c.skipped += 1;
				}
			}
		}
		c
	}

	fn append_from_file(&mut self, file: impl AsRef<Path>, value: T) -> Result<Tally> {
		let file = file.as_ref();
		let c = self.append_from(read_lines(file)?, value);
		info!("loaded {} entries from {}", c.loaded, file.display());
		Ok(c)
	}
}

/// Lines of `f`. Bytes that are not UTF-8 are replaced rather than ending the list,
/// so one bad line is rejected on its own by whoever parses it.
pub fn read_lines(f: impl AsRef<Path>) -> Result<impl Iterator<Item = String>> {
	let f = f.as_ref();
	let buf = fs::read(f).map_err(|e| Error::io(f, e))?;
	let lines: Vec<String> = buf
		.split(|&b| b == b'\n')
		.map(|l| String::from_utf8_lossy(l).into_owned())
		.collect();
	Ok(lines.into_iter())
}

// fresh scratch directory per test and process
#[cfg(test)]
pub(crate) fn test_dir(name: &str) -> std::path::PathBuf {
	let d = std::env::temp_dir().join(format!("ip2cloud-{}-{}", name, std::process::id()));
	let _ = std::fs::remove_dir_all(&d);
	std::fs::create_dir_all(&d).unwrap();
	d
}
