use std::{
	fs::{self, OpenOptions},
	io::{BufWriter, Write},
	path::{Path, PathBuf},
};

use log::*;

use crate::{
	error::{Error, Result},
	source::{provider_files, RangeSource},
	utils::read_lines,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInfo {
	pub name: String,
	pub range_count: usize,
}

/// Directory of `<provider>.txt` range lists.
pub struct Store {
	pub data_dir: PathBuf,
}

impl Store {
	pub fn new(data_dir: impl Into<PathBuf>) -> Self {
		Self {
			data_dir: data_dir.into(),
		}
	}

	pub fn init(&self) -> Result<()> {
		fs::create_dir_all(&self.data_dir).map_err(|e| Error::io(&self.data_dir, e))
	}

	fn path(&self, provider: &str) -> Result<PathBuf> {
		if provider.is_empty()
			|| provider.starts_with('.')
			|| provider.contains(['/', '\\'])
		{
			return Err(Error::InvalidProviderName(provider.to_string()));
		}
		Ok(self.data_dir.join(format!("{}.txt", provider)))
	}

	pub fn exists(&self, provider: &str) -> bool {
		self.path(provider).is_ok_and(|p| p.is_file())
	}

	/// Appends to the provider's list, creating it if needed.
	pub fn add_ranges(&self, provider: &str, ranges: &[impl AsRef<str>]) -> Result<()> {
		self.write_ranges(provider, ranges, true)
	}

	pub fn overwrite_ranges(&self, provider: &str, ranges: &[impl AsRef<str>]) -> Result<()> {
		self.write_ranges(provider, ranges, false)
	}

	fn write_ranges(&self, provider: &str, ranges: &[impl AsRef<str>], append: bool) -> Result<()> {
		let path = self.path(provider)?;
		self.init()?;
		let f = OpenOptions::new()
			.create(true)
			.write(true)
			.append(append)
			.truncate(!append)
			.open(&path)
			.map_err(|e| Error::io(&path, e))?;
		let mut w = BufWriter::new(f);
		for r in ranges {
			writeln!(w, "{}", r.as_ref()).map_err(|e| Error::io(&path, e))?;
		}
		w.flush().map_err(|e| Error::io(&path, e))?;
		info!("wrote {} ranges to {}", ranges.len(), path.display());
		Ok(())
	}

	pub fn remove_provider(&self, provider: &str) -> Result<()> {
		let path = self.path(provider)?;
		if !path.is_file() {
			return Err(Error::UnknownProvider(provider.to_string()));
		}
		fs::remove_file(&path).map_err(|e| Error::io(&path, e))
	}

	/// Sorted by name. A missing data dir lists nothing.
	pub fn list_providers(&self) -> Result<Vec<ProviderInfo>> {
		if !self.data_dir.exists() {
			return Ok(Vec::new());
		}
		let mut ret = Vec::new();
		for (name, path) in provider_files(&self.data_dir)? {
			let range_count = read_lines(&path)?
				.filter(|l| {
					let l = l.trim_ascii();
					!l.is_empty() && !l.starts_with('#')
				})
				.count();
			ret.push(ProviderInfo { name, range_count });
		}
		Ok(ret)
	}

	pub fn load(&self) -> Result<RangeSource> {
		RangeSource::from_dir(&self.data_dir)
	}

	/// Copies `*.txt` lists from `dir`, keeping providers that already exist.
	pub fn seed_from_dir(&self, dir: impl AsRef<Path>) -> Result<usize> {
		self.init()?;
		let mut c = 0;
		for (name, src) in provider_files(dir.as_ref())? {
			let dst = match self.path(&name) {
				Ok(dst) => dst,
				Err(e) => {
					warn!("skipping {}: {}", src.display(), e);
					continue;
				}
			};
			if dst.exists() {
				debug!("keeping existing {}", dst.display());
				continue;
			}
			fs::copy(&src, &dst).map_err(|e| Error::io(&src, e))?;
			c += 1;
		}
		info!("seeded {} providers from {}", c, dir.as_ref().display());
		Ok(c)
	}
}
