//! Registry configuration, read from TOML.
//!
//! ```toml
//! base_url = "https://data.example.org"
//! type_aspect = "terria"
//!
//! [headers]
//! Authorization = "Bearer ..."
//!
//! [[format_rules]]
//! id = "WMS"
//! formatRegex = "^wms$"
//! definition = { type = "wms" }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::formats::{FormatRule, FormatRules};
use crate::resolver::ResolverSettings;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
	/// Registry root used when a reference carries no url of its own.
	pub base_url: Option<String>,
	/// Extra headers sent with every registry request.
	pub headers: BTreeMap<String, String>,
	/// Aspect carrying the explicit catalog type of a record.
	pub type_aspect: String,
	/// Key of the type tag inside [`type_aspect`](Self::type_aspect).
	pub type_key: String,
	pub format_rules: Vec<FormatRule>,
}

impl Default for RegistryConfig {
	fn default() -> Self {
		Self {
			base_url: None,
			headers: BTreeMap::new(),
			type_aspect: "terria".to_string(),
			type_key: "type".to_string(),
			format_rules: FormatRule::defaults(),
		}
	}
}

impl RegistryConfig {
	pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(input)?;
		config.validate()?;
		Ok(config)
	}

	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let input = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&input)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if let Some(url) = &self.base_url {
			url::Url::parse(url).map_err(|error| ConfigError::InvalidUrl { url: url.clone(), error })?;
		}
		FormatRules::prepare(&self.format_rules)?;
		Ok(())
	}

	/// Compiles the settings a [`Resolver`](crate::Resolver) runs with.
	pub fn settings(&self) -> Result<ResolverSettings, ConfigError> {
		Ok(ResolverSettings {
			registry_url: self.base_url.clone(),
			type_aspect: self.type_aspect.clone(),
			type_key: self.type_key.clone(),
			format_rules: FormatRules::prepare(&self.format_rules)?,
		})
	}
}
