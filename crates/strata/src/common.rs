//! Names shared by every catalog model: the standard strata and the catalog
//! member traits.

/// Standard stratum names.
///
/// Their relative priority is installed by [`StratumOrderBuilder::common`](crate::StratumOrderBuilder::common),
/// never implied by these constants.
pub struct CommonStrata;

impl CommonStrata {
	/// Built-in values installed when a model is constructed.
	pub const DEFAULTS: &'static str = "defaults";
	/// Fallback values that only fill gaps left by every loaded stratum.
	pub const UNDERRIDE: &'static str = "underride";
	/// Values from the catalog definition (init files, registry facets).
	pub const DEFINITION: &'static str = "definition";
	/// Values changed by the user.
	pub const USER: &'static str = "user";
	/// Programmatic overrides; wins over everything.
	pub const OVERRIDE: &'static str = "override";
}

/// Trait ids shared by catalog members.
pub struct CommonTraits;

impl CommonTraits {
	pub const NAME: &'static str = "name";
	pub const DESCRIPTION: &'static str = "description";
	pub const URL: &'static str = "url";
	pub const INFO: &'static str = "info";
	pub const ACCESS_TYPE: &'static str = "accessType";
	pub const IS_EXPERIENCING_ISSUES: &'static str = "isExperiencingIssues";
	pub const SHARE_KEYS: &'static str = "shareKeys";
	pub const MEMBERS: &'static str = "members";
	pub const IS_OPEN: &'static str = "isOpen";
	pub const IS_GROUP: &'static str = "isGroup";
	pub const IS_MAPPABLE: &'static str = "isMappable";
	pub const IS_CHARTABLE: &'static str = "isChartable";
}
