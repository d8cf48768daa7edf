//! The reference catalog type and the stratum it relies on.

use std::sync::Arc;

use cairn_strata::builtins::catalog_member_traits;
use cairn_strata::{CommonTraits, OrderError, StratumOrder, StratumOrderBuilder, TraitDef, TypeDef, TypeError, TypeRegistry};

/// Tag of reference placeholders.
pub const MAGDA_REFERENCE: &str = "magda-reference";

/// Stratum holding values read straight off a registry record. Sits just
/// above `defaults`.
pub const REGISTRY_RECORD: &str = "magda-record";

/// Trait ids specific to references.
pub struct ReferenceTraits;

impl ReferenceTraits {
	pub const RECORD_ID: &'static str = "recordId";
	pub const MAGDA_RECORD: &'static str = "magdaRecord";
	pub const OVERRIDE: &'static str = "override";
	pub const ADD_OR_OVERRIDE_ASPECTS: &'static str = "addOrOverrideAspects";
	pub const DISTRIBUTION_FORMATS: &'static str = "distributionFormats";

	/// Traits whose values decide whether a reference must resolve again.
	pub const FINGERPRINT: [&'static str; 6] = [
		CommonTraits::URL,
		Self::RECORD_ID,
		Self::MAGDA_RECORD,
		Self::OVERRIDE,
		Self::ADD_OR_OVERRIDE_ASPECTS,
		Self::DISTRIBUTION_FORMATS,
	];
}

/// Registers the strata written by the resolver.
pub fn register_strata(builder: &mut StratumOrderBuilder) -> Result<&mut StratumOrderBuilder, OrderError> {
	builder.add_default(REGISTRY_RECORD)
}

pub fn reference_type() -> Result<TypeDef, TypeError> {
	let traits = catalog_member_traits()
		.with(TraitDef::primitive(ReferenceTraits::RECORD_ID))
		.with(TraitDef::object(ReferenceTraits::MAGDA_RECORD))
		.with(TraitDef::object(ReferenceTraits::OVERRIDE))
		.with(TraitDef::object(ReferenceTraits::ADD_OR_OVERRIDE_ASPECTS))
		.with(TraitDef::object_array(ReferenceTraits::DISTRIBUTION_FORMATS, "id"))
		.build()?;
	Ok(TypeDef::new(MAGDA_REFERENCE, traits))
}

/// The common strata plus [`REGISTRY_RECORD`].
pub fn standard_order() -> Result<Arc<StratumOrder>, OrderError> {
	let mut builder = StratumOrderBuilder::common();
	register_strata(&mut builder)?;
	Ok(Arc::new(builder.build()))
}

/// The built-in catalog types plus [`MAGDA_REFERENCE`].
pub fn standard_types(order: Arc<StratumOrder>) -> Result<Arc<TypeRegistry>, TypeError> {
	let mut builder = TypeRegistry::builder(order);
	builder.with_catalog_types()?.register(reference_type()?)?;
	Ok(Arc::new(builder.build()))
}
