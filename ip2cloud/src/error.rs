use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("{provider}: malformed range {expr:?}")]
	MalformedRange { provider: String, expr: String },

	#[error("invalid address {0:?}")]
	InvalidAddress(String),

	#[error("failed to read {}", .path.display())]
	Source {
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	#[error("failed to parse {}", .path.display())]
	Json {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},

	#[error("unknown provider {0:?}")]
	UnknownProvider(String),

	#[error("invalid provider name {0:?}")]
	InvalidProviderName(String),
}

impl Error {
	pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
		Self::Source {
			path: path.into(),
			source,
		}
	}
}

pub type Result<T> = std::result::Result<T, Error>;
