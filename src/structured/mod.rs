//! Structured output module.
//!
//! Turns untrusted model text into schema-conforming JSON:
//! - [`parse_structured`] / [`repair`]: best-effort syntactic repair of near-JSON
//! - [`schema_for`] / [`provider_schema`]: schema generation from wire records
//! - [`OutputValidator`]: jsonschema validation plus typed decoding
//!
//! # Examples
//!
//! ```
//! use wellness_ai_gateway::structured::parse_structured;
//! use serde_json::json;
//!
//! let raw = "Here it is:\n```json\n{\"a\":1,}\n```";
//! assert_eq!(parse_structured(raw).unwrap(), json!({"a": 1}));
//! assert!(parse_structured("no json here").is_err());
//! ```

pub mod repair;
pub mod schema;
pub mod validator;

pub use repair::{parse_structured, repair, RepairStep};
pub use schema::{clean_for_provider, provider_schema, schema_for};
pub use validator::OutputValidator;
