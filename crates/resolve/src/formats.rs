//! Distribution format rules.
//!
//! Rules map a distribution's declared format (and optionally its url) to a
//! catalog type. The first matching rule wins; rule order is the only
//! tie-break, never distribution order.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::ConfigError;
use crate::record::Aspects;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatRule {
	pub id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub format_regex: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub url_regex: Option<String>,
	/// Fixed trait values for the created model. `type` names its catalog type.
	#[serde(default)]
	pub definition: Map<String, Value>,
}

impl FormatRule {
	pub fn new(id: &str, format_regex: &str, type_tag: &str) -> Self {
		let mut definition = Map::new();
		definition.insert("type".to_string(), json!(type_tag));
		Self {
			id: id.to_string(),
			format_regex: Some(format_regex.to_string()),
			url_regex: None,
			definition,
		}
	}

	pub fn with_url_regex(mut self, url_regex: &str) -> Self {
		self.url_regex = Some(url_regex.to_string());
		self
	}

	pub fn with_field(mut self, trait_id: &str, value: impl Into<Value>) -> Self {
		self.definition.insert(trait_id.to_string(), value.into());
		self
	}

	pub fn type_tag(&self) -> Option<&str> {
		self.definition.get("type")?.as_str()
	}

	/// The standard rule list.
	pub fn defaults() -> Vec<Self> {
		vec![
			Self::new("WMS", "^wms$", "wms"),
			Self::new("WMS-GROUP", "^wms-group$", "wms-group"),
			Self::new("EsriMapServer", "^esri (mapserver|map server|rest|tiled map service)$", "esri-mapServer")
				.with_url_regex("MapServer"),
			Self::new("CSV", "^csv(-geo-)?", "csv"),
			Self::new("CZML", "^czml$", "czml"),
			Self::new("KML", "^km[lz]$", "kml"),
			Self::new("GeoJSON", "^geojson$", "geojson"),
			Self::new("WFS", "^wfs$", "wfs"),
			// MapServer is still accepted as a format; the url decides
			Self::new("EsriFeatureServerGroup", "ESRI (MAPSERVER|FEATURESERVER)", "esri-featureServer-group")
				.with_url_regex("FeatureServer$|FeatureServer/$"),
			Self::new("EsriFeatureServer", "ESRI (MAPSERVER|FEATURESERVER)", "esri-featureServer")
				.with_url_regex("FeatureServer/\\d"),
		]
	}
}

/// A rule with compiled, case-insensitive patterns.
#[derive(Debug, Clone)]
pub struct PreparedRule {
	pub id: String,
	pub type_tag: String,
	format: Option<Regex>,
	url: Option<Regex>,
	definition: Map<String, Value>,
}

impl PreparedRule {
	/// Fixed fields other than the type.
	pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
		self.definition.iter().filter(|(k, _)| k.as_str() != "type")
	}

	fn matches(&self, format: &str, url: &str) -> bool {
		self.format.as_ref().is_none_or(|re| re.is_match(format)) && self.url.as_ref().is_none_or(|re| re.is_match(url))
	}
}

/// An ordered, compiled rule list.
#[derive(Debug, Clone, Default)]
pub struct FormatRules {
	rules: Vec<PreparedRule>,
}

impl FormatRules {
	/// Compiles `rules`. Rules without a type are skipped.
	pub fn prepare(rules: &[FormatRule]) -> Result<Self, ConfigError> {
		let mut prepared = Vec::with_capacity(rules.len());
		for rule in rules {
			let Some(type_tag) = rule.type_tag() else {
				tracing::warn!(rule = %rule.id, "format rule has no type, skipping");
				continue;
			};
			prepared.push(PreparedRule {
				id: rule.id.clone(),
				type_tag: type_tag.to_string(),
				format: compile(&rule.id, rule.format_regex.as_deref())?,
				url: compile(&rule.id, rule.url_regex.as_deref())?,
				definition: rule.definition.clone(),
			});
		}
		Ok(Self { rules: prepared })
	}

	pub fn len(&self) -> usize {
		self.rules.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rules.is_empty()
	}

	/// Finds the first rule, in rule order, matching any distribution.
	///
	/// A distribution's format is `dataset-format.format`, falling back to
	/// `dcat-distribution-strings.format`; its url is `downloadURL`, falling back
	/// to `accessURL`. Distributions lacking either are never matched.
	pub fn find_match<'r, 'd>(&'r self, distributions: &[&'d Value]) -> Option<(&'r PreparedRule, &'d Value)> {
		let candidates: Vec<(&'d Value, String, String)> = distributions
			.iter()
			.filter_map(|d| {
				let (format, url) = format_and_url(d)?;
				Some((*d, format, url))
			})
			.collect();

		self.rules.iter().find_map(|rule| {
			candidates
				.iter()
				.find(|(_, format, url)| rule.matches(format, url))
				.map(|(d, _, _)| (rule, *d))
		})
	}
}

fn compile(rule: &str, pattern: Option<&str>) -> Result<Option<Regex>, ConfigError> {
	pattern
		.map(|p| {
			RegexBuilder::new(p)
				.case_insensitive(true)
				.build()
				.map_err(|error| ConfigError::InvalidPattern {
					rule: rule.to_string(),
					error,
				})
		})
		.transpose()
}

/// Declared format and url of a distribution record.
pub fn format_and_url(distribution: &Value) -> Option<(String, String)> {
	let aspects = distribution.get("aspects")?.as_object()?;
	let dcat = aspects.get(Aspects::DCAT_DISTRIBUTION).and_then(Value::as_object);

	let format = aspects
		.get(Aspects::DATASET_FORMAT)
		.and_then(|f| f.get("format"))
		.and_then(Value::as_str)
		.or_else(|| dcat?.get("format")?.as_str())?;
	let url = distribution_url(dcat)?;
	Some((format.to_string(), url.to_string()))
}

/// `downloadURL`, falling back to `accessURL`.
pub fn distribution_url(dcat: Option<&Map<String, Value>>) -> Option<&str> {
	let dcat = dcat?;
	dcat.get("downloadURL")
		.and_then(Value::as_str)
		.or_else(|| dcat.get("accessURL")?.as_str())
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use rstest::rstest;

	use super::*;

	fn distribution(format: &str, url: &str) -> Value {
		json!({
			"id": format,
			"aspects": { "dcat-distribution-strings": { "format": format, "downloadURL": url } }
		})
	}

	fn defaults() -> FormatRules {
		FormatRules::prepare(&FormatRule::defaults()).unwrap()
	}

	#[rstest]
	#[case("WMS", "http://x/wms", "wms")]
	#[case("csv-geo-au", "http://x/a.csv", "csv")]
	#[case("KMZ", "http://x/a.kmz", "kml")]
	#[case("Esri REST", "http://x/arcgis/rest/services/a/MapServer", "esri-mapServer")]
	#[case("ESRI FeatureServer", "http://x/arcgis/rest/services/a/FeatureServer", "esri-featureServer-group")]
	#[case("ESRI FeatureServer", "http://x/arcgis/rest/services/a/FeatureServer/0", "esri-featureServer")]
	fn test_default_rules(#[case] format: &str, #[case] url: &str, #[case] expected: &str) {
		let d = distribution(format, url);
		let rules = defaults();
		let (rule, _) = rules.find_match(&[&d]).unwrap();
		assert_eq!(rule.type_tag, expected);
	}

	#[test]
	fn test_default_rules_all_compile() {
		assert_eq!(defaults().len(), FormatRule::defaults().len());
		assert_eq!(crate::ResolverSettings::default().format_rules.len(), FormatRule::defaults().len());
	}

	#[test]
	fn test_rule_order_breaks_ties() {
		let rules = FormatRules::prepare(&[FormatRule::new("WMS", "^wms$", "wms"), FormatRule::new("CSV", "^csv$", "csv")]).unwrap();
		let csv = distribution("csv", "http://x/a.csv");
		let wms = distribution("wms", "http://x/wms");

		let (rule, matched) = rules.find_match(&[&csv, &wms]).unwrap();
		assert_eq!(rule.type_tag, "wms");
		assert_eq!(matched, &wms);
	}

	#[test]
	fn test_dataset_format_wins_and_url_required() {
		let d = json!({
			"aspects": {
				"dataset-format": { "format": "GeoJSON" },
				"dcat-distribution-strings": { "format": "json", "accessURL": "http://x/a.json" }
			}
		});
		assert_eq!(format_and_url(&d), Some(("GeoJSON".to_string(), "http://x/a.json".to_string())));

		let no_url = json!({ "aspects": { "dcat-distribution-strings": { "format": "wms" } } });
		assert!(defaults().find_match(&[&no_url]).is_none());
	}

	#[test]
	fn test_invalid_pattern_rejected() {
		let err = FormatRules::prepare(&[FormatRule::new("bad", "(", "wms")]).unwrap_err();
		assert!(matches!(err, ConfigError::InvalidPattern { ref rule, .. } if rule == "bad"));
	}

	#[test]
	fn test_rule_serde_shape() {
		let rule: FormatRule = serde_json::from_value(json!({
			"id": "WMS",
			"formatRegex": "^wms$",
			"definition": { "type": "wms", "layers": "a" }
		}))
		.unwrap();
		assert_eq!(rule, FormatRule::new("WMS", "^wms$", "wms").with_field("layers", "a"));
		let prepared = FormatRules::prepare(&[rule]).unwrap();
		let fields: Vec<&String> = prepared.rules[0].fields().map(|(k, _)| k).collect();
		assert_eq!(fields, ["layers"]);
	}
}
