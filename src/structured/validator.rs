//! Output validator for structured responses.
//!
//! Compiles the full schema of a wire record with `jsonschema` and reports
//! every violation with its instance path, then decodes with `serde_json`.
//! Compiled validators are cached per record type for the life of the process.

use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::schema::schema_for;
use crate::{Error, ErrorContext, Result};

static COMPILED: Lazy<Mutex<HashMap<TypeId, Arc<OutputValidator>>>> = Lazy::new(|| Mutex::new(HashMap::new()));

pub struct OutputValidator {
    name: &'static str,
    compiled: JSONSchema,
}

impl OutputValidator {
    /// Compile a validator from a raw schema.
    pub fn new(name: &'static str, schema: &Value) -> Result<Self> {
        let compiled = JSONSchema::compile(schema).map_err(|e| {
            Error::structured_output(format!("schema for {} failed to compile: {}", name, e))
                .with_context(ErrorContext::new().with_source("validator"))
        })?;
        Ok(Self { name, compiled })
    }

    /// Validator for the full generated schema of `T`.
    pub fn for_type<T: JsonSchema>(name: &'static str) -> Result<Self> {
        Self::new(name, &schema_for::<T>())
    }

    /// Like [`for_type`](Self::for_type), but compiled once per `T` and shared.
    pub fn cached<T: JsonSchema + 'static>(name: &'static str) -> Result<Arc<Self>> {
        let mut compiled = COMPILED.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(v) = compiled.get(&TypeId::of::<T>()) {
            return Ok(v.clone());
        }
        let validator = Arc::new(Self::for_type::<T>(name)?);
        compiled.insert(TypeId::of::<T>(), validator.clone());
        Ok(validator)
    }

    pub fn validate(&self, value: &Value) -> Result<()> {
        if let Err(errors) = self.compiled.validate(value) {
            let details = errors
                .map(|e| {
                    let path = e.instance_path.to_string();
                    if path.is_empty() {
                        e.to_string()
                    } else {
                        format!("{}: {}", path, e)
                    }
                })
                .collect::<Vec<_>>();
            return Err(Error::structured_output(format!(
                "invalid {}: {}",
                self.name,
                details.join("; ")
            ))
            .with_context(ErrorContext::new().with_source("validator")));
        }
        Ok(())
    }

    /// Validate, then deserialize into `T`.
    pub fn decode<T: DeserializeOwned>(&self, value: Value) -> Result<T> {
        self.validate(&value)?;
        serde_json::from_value(value).map_err(|e| {
            Error::structured_output(format!("invalid {}: {}", self.name, e))
                .with_context(ErrorContext::new().with_source("validator"))
        })
    }
}
