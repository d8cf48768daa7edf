//! Layered trait model for catalog entries.
//!
//! A [`Model`] holds named [`Stratum`] layers of raw trait values. Reading a
//! trait flattens those layers according to the trait's [`Combine`] rule and
//! the [`StratumOrder`] the model was created with.

pub mod catalog;
pub mod common;
pub mod error;
pub mod model;
pub mod order;
pub mod stratum;
pub mod traits;
pub mod types;

pub use catalog::Catalog;
pub use common::{CommonStrata, CommonTraits};
pub use error::{ModelError, OrderError, TypeError};
pub use model::{Model, ModelId};
pub use order::{Priority, StratumBand, StratumOrder, StratumOrderBuilder};
pub use stratum::{DerivedValues, Stratum};
pub use traits::{ArrayMerge, Combine, IdKey, ObjectArraySpec, TraitDef, TraitKind, TraitSet, TraitSetBuilder};
pub use types::builtins::{self, CatalogTypes};
pub use types::{TypeDef, TypeRegistry, TypeRegistryBuilder};
