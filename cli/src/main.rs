use std::{
	collections::BTreeMap,
	fs::File,
	io::{self, BufRead, BufReader, BufWriter, Write},
	path::Path,
	process::ExitCode,
};

use anyhow::{bail, Context};
use clap::Parser;
use log::*;
use serde::Serialize;

use ip2cloud::{
	conf::{Conf, Ip2CloudConf},
	store::Store,
	Classifier, Ipv4Range, RangeSource,
};

mod args;
use args::*;

const BATCH_SIZE: usize = 4096;

fn main() -> ExitCode {
	let args = CliArgs::parse();

	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	match run(args) {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			error!("{:#}", e);
			ExitCode::FAILURE
		}
	}
}

fn run(args: CliArgs) -> anyhow::Result<()> {
	let conf = if args.conf.is_file() {
		info!("read config from {}", args.conf.display());
		Ip2CloudConf::from_file(&args.conf)?
	} else {
		debug!("no config at {}", args.conf.display());
		Ip2CloudConf::default()
	};
	let store = Store::new(args.data_dir.unwrap_or_else(|| conf.global.data_dir.clone()));

	match args.cmd {
		None => lookup(args.lookup, &conf, &store),
		Some(Cmd::List) => list(&store),
		Some(Cmd::Add(a)) => add(a, &store),
		Some(Cmd::Remove { provider }) => {
			store.remove_provider(&provider)?;
			println!("Removed provider '{}'", provider);
			Ok(())
		}
		Some(Cmd::Check { source }) => check(source.as_deref(), &conf, &store),
		Some(Cmd::Seed { dir }) => {
			let c = store.seed_from_dir(&dir)?;
			println!("Seeded {} providers into {}", c, store.data_dir.display());
			Ok(())
		}
	}
}

// --source, then the config's source, then its provider sections, then the data dir
fn load_source(source: Option<&Path>, conf: &Ip2CloudConf, store: &Store) -> anyhow::Result<RangeSource> {
	let src = if let Some(f) = source.or(conf.global.source.as_deref()) {
		RangeSource::from_json(f)?
	} else if !conf.providers.is_empty() {
		RangeSource::from_conf(conf)?
	} else {
		store
			.load()
			.context("no range data, run `ip2cloud seed <dir>` or pass --source")?
	};
	if src.is_empty() {
		warn!("no providers found, every lookup will miss");
	}
	Ok(src)
}

fn lookup(args: LArgs, conf: &Ip2CloudConf, store: &Store) -> anyhow::Result<()> {
	if let Some(n) = args.workers.or(conf.global.workers) {
		if let Err(e) = rayon::ThreadPoolBuilder::new()
			.num_threads(n.max(1))
			.build_global()
		{
			warn!("failed to set up {} workers: {}", n, e);
		}
	}

	let c = Classifier::from_source(&load_source(args.source.as_deref(), conf, store)?);
	let filter: Vec<String> = args
		.provider
		.iter()
		.map(|p| p.trim().to_ascii_lowercase())
		.filter(|p| !p.is_empty())
		.collect();
	let mut out = Output::new(args.json);

	if !args.ips.is_empty() {
		classify(&c, &args.ips, &filter, &mut out)?;
	} else {
		let mut batch = Vec::with_capacity(BATCH_SIZE);
		for l in io::stdin().lock().lines() {
			let l = l.context("error reading stdin")?;
			let l = l.trim_ascii();
			if l.is_empty() {
				continue;
			}
			batch.push(l.to_string());
			if batch.len() >= BATCH_SIZE {
				classify(&c, &batch, &filter, &mut out)?;
				batch.clear();
			}
		}
		classify(&c, &batch, &filter, &mut out)?;
	}
	out.finish()
}

fn classify(c: &Classifier, batch: &[String], filter: &[String], out: &mut Output) -> io::Result<()> {
	for (addr, r) in batch.iter().zip(c.par_classify(batch)) {
		match r {
			Ok(Some(p)) => {
				if filter.is_empty() || filter.iter().any(|f| f.eq_ignore_ascii_case(p)) {
					out.push(p, addr)?;
				}
			}
			Ok(None) => {}
			Err(e) => warn!("{}", e),
		}
	}
	Ok(())
}

enum Output {
	Lines(BufWriter<io::Stdout>),
	Json(BTreeMap<String, Vec<String>>),
}

impl Output {
	fn new(json: bool) -> Self {
		if json {
			Self::Json(BTreeMap::new())
		} else {
			Self::Lines(BufWriter::with_capacity(256 * 1024, io::stdout()))
		}
	}

	fn push(&mut self, provider: &str, addr: &str) -> io::Result<()> {
		match self {
			Self::Lines(w) => writeln!(w, "[{}] : {}", provider, addr),
			Self::Json(m) => {
				m.entry(provider.to_string())
					.or_default()
					.push(addr.to_string());
				Ok(())
			}
		}
	}

	fn finish(self) -> anyhow::Result<()> {
		match self {
			Self::Lines(mut w) => w.flush().context("error flushing output")?,
			Self::Json(m) => {
				let mut w = io::stdout().lock();
				let mut ser = serde_json::Serializer::with_formatter(
					&mut w,
					serde_json::ser::PrettyFormatter::with_indent(b"    "),
				);
				m.serialize(&mut ser)?;
				writeln!(w)?;
			}
		}
		Ok(())
	}
}

fn list(store: &Store) -> anyhow::Result<()> {
	let providers = store.list_providers()?;
	if providers.is_empty() {
		println!("No providers found. Run 'ip2cloud seed <dir>' to import range lists.");
		return Ok(());
	}
	let width = providers
		.iter()
		.map(|p| p.name.len())
		.max()
		.unwrap_or(0)
		.max("PROVIDER".len());
	println!("{:<width$}  RANGES", "PROVIDER");
	for p in providers.iter() {
		println!("{:<width$}  {}", p.name, p.range_count);
	}
	let total: usize = providers.iter().map(|p| p.range_count).sum();
	println!("\n{:<width$}  {}", "TOTAL", total);
	Ok(())
}

fn add(args: AddArgs, store: &Store) -> anyhow::Result<()> {
	let mut ranges = args.ranges;
	match args.file.as_deref() {
		None => {}
		Some(f) if f == Path::new("-") => ranges.extend(read_ranges(io::stdin().lock())?),
		Some(f) => {
			let h = File::open(f).with_context(|| format!("opening {}", f.display()))?;
			ranges.extend(read_ranges(BufReader::new(h))?);
		}
	}
	if ranges.is_empty() {
		bail!("no ranges provided, pass them as arguments or with -f");
	}
	for r in ranges.iter() {
		if Ipv4Range::parse(r).is_none() {
			warn!("{}: {:?} is not a valid range and will be skipped on lookup", args.provider, r);
		}
	}

	if args.overwrite {
		store.overwrite_ranges(&args.provider, &ranges[..])?;
		println!("Overwrote {} with {} ranges", args.provider, ranges.len());
	} else {
		let existed = store.exists(&args.provider);
		store.add_ranges(&args.provider, &ranges[..])?;
		if existed {
			println!("Appended {} ranges to {}", ranges.len(), args.provider);
		} else {
			println!("Added {} ranges to {}", ranges.len(), args.provider);
		}
	}
	Ok(())
}

fn read_ranges(r: impl BufRead) -> anyhow::Result<Vec<String>> {
	let mut ret = Vec::new();
	for l in r.lines() {
		let l = l.context("error reading ranges")?;
		let l = l.trim_ascii();
		if !l.is_empty() && !l.starts_with('#') {
			ret.push(l.to_string());
		}
	}
	Ok(ret)
}

fn check(source: Option<&Path>, conf: &Ip2CloudConf, store: &Store) -> anyhow::Result<()> {
	let c = Classifier::from_source(&load_source(source, conf, store)?);
	for (p, n) in c.provider_ranges() {
		println!("{:>8}  {}", n, p);
	}
	for s in c.skipped() {
		println!("skipped  {}", s);
	}
	println!(
		"{} providers, {} ranges, {} skipped",
		c.providers().len(),
		c.range_count(),
		c.skipped().len()
	);
	Ok(())
}
