//! Compiles a declarative spec of analytics event attributes into
//! flattened, typed SQL expressions, and classifies traffic sources
//! into channel labels via an ordered rule set.
//!
//! Everything in this crate is a pure, stateless transformation over
//! immutable inputs. Configuration is validated once up front
//! ([`validate::validate`]); after that, compilation and per-row
//! classification are deterministic and can be parallelized freely.

pub mod bundle;
pub mod channel;
pub mod checks;
pub mod clickid;
pub mod config;
pub mod error;
pub mod params;
pub mod rollup;
pub mod tuple;
pub mod url;
pub mod validate;
pub mod value;

pub use bundle::CompiledBundle;
pub use channel::{ChannelEngine, FALLBACK_LABEL};
pub use config::{AttributionConfig, CustomConfig};
pub use error::ConfigError;
pub use tuple::{AttributionTuple, TupleColumns};
