use std::{
	collections::{btree_map, BTreeMap},
	fs,
	path::{Path, PathBuf},
};

use log::*;

use crate::{
	conf::Ip2CloudConf,
	error::{Error, Result},
	utils::FromLst,
};

/// Provider name to range expressions, providers in name order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RangeSource(BTreeMap<String, Vec<String>>);

impl RangeSource {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, provider: impl Into<String>, ranges: Vec<String>) {
		self.0.insert(provider.into(), ranges);
	}

	/// The ranges of `provider`, created empty if missing.
	pub fn provider_mut(&mut self, provider: &str) -> &mut Vec<String> {
		self.0.entry(provider.to_string()).or_default()
	}

	pub fn get(&self, provider: &str) -> Option<&[String]> {
		self.0.get(provider).map(|r| r.as_slice())
	}

	pub fn iter(&self) -> btree_map::Iter<'_, String, Vec<String>> {
		self.0.iter()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn range_count(&self) -> usize {
		self.0.values().map(|r| r.len()).sum()
	}

	/// `{"provider": ["cidr", ...], ...}`
	pub fn from_json(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let s = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
		let m = serde_json::from_str(&s).map_err(|e| Error::Json {
			path: path.to_path_buf(),
			source: e,
		})?;
		let src = Self(m);
		info!(
			"loaded {} providers, {} ranges from {}",
			src.len(),
			src.range_count(),
			path.display()
		);
		Ok(src)
	}

	/// Every `<provider>.txt` in `dir`, one range per line.
	pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
		let dir = dir.as_ref();
		let mut src = Self::new();
		for (name, path) in provider_files(dir)? {
			src.provider_mut(&name);
			src.append_from_file(&path, name.as_str())?;
		}
		Ok(src)
	}

	/// Provider sections of the conf, `files` first then inline `ranges`.
	pub fn from_conf(conf: &Ip2CloudConf) -> Result<Self> {
		let mut src = Self::new();
		for p in conf.providers.iter() {
			src.provider_mut(&p.name);
			for f in p.files.iter() {
				src.append_from_file(f, p.name.as_str())?;
			}
			let c = src.append_from(p.ranges.iter(), p.name.as_str());
			debug!("{} inline ranges for {}", c.loaded, p.name);
		}
		Ok(src)
	}
}

impl<'a> FromLst<&'a str> for RangeSource {
	fn append_line(&mut self, l: &str, provider: &'a str) -> Result<()> {
		self.provider_mut(provider).push(l.to_string());
		Ok(())
	}
}

impl<'a> IntoIterator for &'a RangeSource {
	type Item = (&'a String, &'a Vec<String>);
	type IntoIter = btree_map::Iter<'a, String, Vec<String>>;

	fn into_iter(self) -> Self::IntoIter {
		self.0.iter()
	}
}

impl<P: Into<String>> FromIterator<(P, Vec<String>)> for RangeSource {
	fn from_iter<I: IntoIterator<Item = (P, Vec<String>)>>(iter: I) -> Self {
		Self(iter.into_iter().map(|(p, r)| (p.into(), r)).collect())
	}
}

/// `(provider, path)` of every `*.txt` file directly under `dir`, sorted by name.
pub(crate) fn provider_files(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
	let mut ret = Vec::new();
	for e in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
		let path = e.map_err(|e| Error::io(dir, e))?.path();
		if !path.is_file() || path.extension().and_then(|x| x.to_str()) != Some("txt") {
			continue;
		}
		if let Some(name) = path.file_stem().and_then(|s| s.to_str()) {
			ret.push((name.to_string(), path.clone()));
		}
	}
	ret.sort();
	Ok(ret)
}

#[cfg(test)]
mod tests {
	use std::fs;

	use super::*;
	use crate::{conf::Conf, utils::test_dir};

	#[test]
	fn test_from_json() {
		let dir = test_dir("source_json");
		let f = dir.join("cloud_data.json");
		fs::write(
			&f,
			r#"{"gcp": ["34.0.0.0/8"], "acme": ["10.0.0.0/24", "10.0.1.5/32", "not-an-ip"]}"#,
		)
		.unwrap();
		let src = RangeSource::from_json(&f).unwrap();
		let names: Vec<_> = src.iter().map(|(p, _)| p.as_str()).collect();
		assert_eq!(names, ["acme", "gcp"]);
		// kept verbatim, validation happens at build time
		assert_eq!(src.get("acme").unwrap().len(), 3);
		assert_eq!(src.range_count(), 4);

		fs::write(&f, "[1, 2, 3]").unwrap();
		assert!(matches!(RangeSource::from_json(&f), Err(Error::Json { .. })));
		assert!(matches!(
			RangeSource::from_json(dir.join("missing.json")),
			Err(Error::Source { .. })
		));
	}

	#[test]
	fn test_from_dir() {
		let dir = test_dir("source_dir");
		fs::write(dir.join("aws.txt"), "52.0.0.0/8\n\n# comment\n 63.32.0.0/14 \n").unwrap();
		fs::write(dir.join("empty.txt"), "").unwrap();
		fs::write(dir.join("notes.md"), "1.2.3.4/32\n").unwrap();
		fs::create_dir_all(dir.join("nested.txt")).unwrap();

		let src = RangeSource::from_dir(&dir).unwrap();
		assert_eq!(src.len(), 2);
		assert_eq!(src.get("aws").unwrap(), ["52.0.0.0/8", "63.32.0.0/14"]);
		assert_eq!(src.get("empty").unwrap().len(), 0);

		assert!(matches!(
			RangeSource::from_dir(dir.join("missing")),
			Err(Error::Source { .. })
		));
	}

	#[test]
	fn test_from_dir_invalid_utf8() {
		let dir = test_dir("source_dir_utf8");
		fs::write(dir.join("acme.txt"), b"10.0.0.0/24\n\xff\xfe bad\n192.0.2.0/24\n").unwrap();

		let src = RangeSource::from_dir(&dir).unwrap();
		let ranges = src.get("acme").unwrap();
		assert_eq!(ranges.len(), 3);
		assert_eq!(ranges[2], "192.0.2.0/24");

		let c = crate::Classifier::from_source(&src);
		assert_eq!(c.classify("10.0.0.1").unwrap(), Some("acme"));
		assert_eq!(c.classify("192.0.2.1").unwrap(), Some("acme"));
		assert_eq!(c.skipped().len(), 1);
		assert_eq!(c.skipped()[0].provider, "acme");
	}

	#[test]
	fn test_from_conf() {
		let dir = test_dir("source_conf");
		let f = dir.join("acme.txt");
		fs::write(&f, "10.0.0.0/24\n").unwrap();
		let conf = Ip2CloudConf::from_lines([
			"[acme]".to_string(),
			format!("files = {}", f.display()),
			"ranges = 10.0.1.5/32".to_string(),
			"[globex]".to_string(),
		]);
		let src = RangeSource::from_conf(&conf).unwrap();
		assert_eq!(src.get("acme").unwrap(), ["10.0.0.0/24", "10.0.1.5/32"]);
		assert_eq!(src.get("globex").unwrap().len(), 0);
	}

	#[test]
	fn test_from_iter() {
		let src: RangeSource = [("b", vec!["1.0.0.0/8".to_string()]), ("a", vec![])]
			.into_iter()
			.collect();
		let names: Vec<_> = (&src).into_iter().map(|(p, _)| p.clone()).collect();
		assert_eq!(names, ["a", "b"]);
	}
}
