use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Check IPs against cloud provider ranges
#[derive(Parser)]
#[command(name = "ip2cloud", version, args_conflicts_with_subcommands = true)]
pub struct CliArgs {
	/// Config file, ignored if missing
	#[arg(short, long, global = true, default_value = "ip2cloud.conf")]
	pub conf: PathBuf,

	/// Directory of <provider>.txt range lists, overrides the config
	#[arg(short, long, global = true)]
	pub data_dir: Option<PathBuf>,

	#[command(subcommand)]
	pub cmd: Option<Cmd>,

	#[command(flatten)]
	pub lookup: LArgs,
}

#[derive(Args)]
pub struct LArgs {
	/// JSON file mapping provider to ranges, used instead of the data dir
	#[arg(short, long)]
	pub source: Option<PathBuf>,

	/// Print matches grouped by provider as JSON
	#[arg(short, long)]
	pub json: bool,

	/// Only report these providers, e.g. aws,gcp
	#[arg(short, long, value_delimiter = ',')]
	pub provider: Vec<String>,

	/// Worker threads, defaults to the number of CPUs
	#[arg(short, long)]
	pub workers: Option<usize>,

	/// Addresses to look up, read from stdin when empty
	pub ips: Vec<String>,
}

#[derive(Args)]
pub struct AddArgs {
	pub provider: String,

	/// Read ranges from a file, '-' for stdin
	#[arg(short, long)]
	pub file: Option<PathBuf>,

	/// Replace the provider's ranges instead of appending
	#[arg(long)]
	pub overwrite: bool,

	pub ranges: Vec<String>,
}

#[derive(Subcommand)]
pub enum Cmd {
	/// List providers and range counts
	List,
	/// Add ranges to a provider
	Add(AddArgs),
	/// Remove a provider and its ranges
	Remove { provider: String },
	/// Build the index and report skipped ranges
	Check {
		#[arg(short, long)]
		source: Option<PathBuf>,
	},
	/// Copy <provider>.txt lists from a directory into the data dir
	Seed { dir: PathBuf },
}
