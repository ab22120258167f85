use std::fmt;

use schemars::gen::SchemaGenerator;
use schemars::schema::{InstanceType, Metadata, Schema, SchemaObject, SingleOrVec};
use schemars::JsonSchema;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// Identifier of a task, link or marker. Clients send ids as strings or
/// integers interchangeably; both normalize to the same string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[cfg_attr(feature = "server", derive(ts_rs::TS))]
#[cfg_attr(feature = "server", ts(export))]
#[serde(transparent)]
pub struct ItemId(String);

/// Parent id of top-level tasks. Never names a real task.
pub const ROOT_ID: &str = "0";

impl ItemId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into().trim().to_string())
    }

    pub fn root() -> Self {
        Self(ROOT_ID.to_string())
    }

    pub fn is_root(&self) -> bool {
        self.0 == ROOT_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value, when the id is a plain non-negative integer.
    pub fn as_number(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<u64> for ItemId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IdVisitor;

        impl Visitor<'_> for IdVisitor {
            type Value = ItemId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string or integer id")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<ItemId, E> {
                if v.trim().is_empty() {
                    return Err(E::custom("id must not be empty"));
                }
                Ok(ItemId::new(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<ItemId, E> {
                Ok(ItemId::from(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<ItemId, E> {
                Ok(ItemId(v.to_string()))
            }

            #[allow(clippy::float_cmp, clippy::cast_possible_truncation)]
            fn visit_f64<E: de::Error>(self, v: f64) -> Result<ItemId, E> {
                if v.is_finite() && v.fract() == 0.0 {
                    Ok(ItemId((v as i64).to_string()))
                } else {
                    Err(E::custom(format!("{v} is not a valid id")))
                }
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

impl JsonSchema for ItemId {
    fn schema_name() -> String {
        "ItemId".to_string()
    }

    fn is_referenceable() -> bool {
        false
    }

    fn json_schema(_gen: &mut SchemaGenerator) -> Schema {
        SchemaObject {
            instance_type: Some(SingleOrVec::Vec(vec![
                InstanceType::String,
                InstanceType::Integer,
            ])),
            metadata: Some(Box::new(Metadata {
                description: Some("Item id (string or integer)".to_string()),
                ..Default::default()
            })),
            ..Default::default()
        }
        .into()
    }
}
