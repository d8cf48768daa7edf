//! Built-in catalog entry types.

use crate::common::CommonTraits;
use crate::error::TypeError;
use crate::traits::{TraitDef, TraitSet, TraitSetBuilder};
use crate::types::{TypeDef, TypeRegistryBuilder};

/// Tags of the built-in catalog types.
pub struct CatalogTypes;

impl CatalogTypes {
	pub const GROUP: &'static str = "group";
	pub const WMS: &'static str = "wms";
	pub const WMS_GROUP: &'static str = "wms-group";
	pub const ESRI_MAP_SERVER: &'static str = "esri-mapServer";
	pub const ESRI_FEATURE_SERVER: &'static str = "esri-featureServer";
	pub const ESRI_FEATURE_SERVER_GROUP: &'static str = "esri-featureServer-group";
	pub const CSV: &'static str = "csv";
	pub const CZML: &'static str = "czml";
	pub const KML: &'static str = "kml";
	pub const GEOJSON: &'static str = "geojson";
	pub const WFS: &'static str = "wfs";
}

/// Traits every catalog member carries.
pub fn catalog_member_traits() -> TraitSetBuilder {
	TraitSet::builder()
		.with(TraitDef::primitive(CommonTraits::NAME))
		.with(TraitDef::primitive(CommonTraits::DESCRIPTION))
		.with(TraitDef::primitive(CommonTraits::URL))
		.with(TraitDef::object_array(CommonTraits::INFO, "name"))
		.with(TraitDef::primitive(CommonTraits::ACCESS_TYPE))
		.with(TraitDef::primitive(CommonTraits::IS_EXPERIENCING_ISSUES))
		.with(TraitDef::primitive_array(CommonTraits::SHARE_KEYS).merge())
		.with(TraitDef::primitive(CommonTraits::IS_GROUP))
		.with(TraitDef::primitive(CommonTraits::IS_MAPPABLE))
		.with(TraitDef::primitive(CommonTraits::IS_CHARTABLE))
}

fn group_traits() -> TraitSetBuilder {
	catalog_member_traits()
		.with(TraitDef::primitive_array(CommonTraits::MEMBERS).merge())
		.with(TraitDef::primitive(CommonTraits::IS_OPEN))
}

fn group(tag: &str, extra: &[TraitDef]) -> Result<TypeDef, TypeError> {
	let traits = extra.iter().cloned().fold(group_traits(), TraitSetBuilder::with).build()?;
	Ok(TypeDef::new(tag, traits).with_default(CommonTraits::IS_GROUP, true))
}

fn mappable(tag: &str, chartable: bool, extra: &[TraitDef]) -> Result<TypeDef, TypeError> {
	let traits = extra
		.iter()
		.cloned()
		.fold(catalog_member_traits(), TraitSetBuilder::with)
		.build()?;
	Ok(TypeDef::new(tag, traits)
		.with_default(CommonTraits::IS_MAPPABLE, true)
		.with_default(CommonTraits::IS_CHARTABLE, chartable))
}

/// Declarations of every built-in catalog type.
pub fn catalog_types() -> Result<Vec<TypeDef>, TypeError> {
	let layers = TraitDef::primitive("layers");
	Ok(vec![
		group(CatalogTypes::GROUP, &[])?,
		group(CatalogTypes::WMS_GROUP, &[])?,
		group(CatalogTypes::ESRI_FEATURE_SERVER_GROUP, &[])?,
		mappable(CatalogTypes::WMS, false, &[layers.clone(), TraitDef::primitive("styles")])?,
		mappable(CatalogTypes::ESRI_MAP_SERVER, false, &[layers])?,
		mappable(CatalogTypes::ESRI_FEATURE_SERVER, false, &[])?,
		mappable(CatalogTypes::CSV, true, &[])?,
		mappable(CatalogTypes::CZML, false, &[])?,
		mappable(CatalogTypes::KML, false, &[])?,
		mappable(CatalogTypes::GEOJSON, false, &[])?,
		mappable(CatalogTypes::WFS, false, &[TraitDef::primitive("typeNames")])?,
	])
}

impl TypeRegistryBuilder {
	/// Registers every built-in catalog type.
	pub fn with_catalog_types(&mut self) -> Result<&mut Self, TypeError> {
		self.register_all(catalog_types()?)
	}
}
