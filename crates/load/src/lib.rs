//! Loading of model strata.
//!
//! [`LoadMemoizer`] decides when a fetch runs at all: a repeated load with an
//! unchanged fingerprint is free, concurrent loads share one fetch, and a
//! generation counter keeps a superseded fetch from committing. The
//! [`LoadableStratum`] protocol builds on it to install fetched strata on a
//! [`Model`](cairn_strata::Model).

pub mod document;
pub mod error;
pub mod loadable;
pub mod memo;

#[cfg(feature = "http")]
pub use document::HttpDocumentFetcher;
pub use document::{DocumentFetcher, JsonDocumentStratum, TraitProjection, decode_document};
pub use error::LoadError;
pub use loadable::{LoadableStratum, StratumLoader, fingerprint};
pub use memo::{Fingerprint, LoadMemoizer, LoadStatus, LoadTicket};
