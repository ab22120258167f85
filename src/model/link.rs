use std::fmt;

use schemars::gen::SchemaGenerator;
use schemars::schema::{InstanceType, Metadata, Schema, SchemaObject};
use schemars::JsonSchema;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::ids::ItemId;

/// Dependency type. On the wire it is the chart's numeric code as a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LinkKind {
    #[default]
    FinishToStart,
    StartToStart,
    FinishToFinish,
    StartToFinish,
}

impl LinkKind {
    pub const ALL: [LinkKind; 4] = [
        LinkKind::FinishToStart,
        LinkKind::StartToStart,
        LinkKind::FinishToFinish,
        LinkKind::StartToFinish,
    ];

    pub fn code(self) -> &'static str {
        match self {
            LinkKind::FinishToStart => "0",
            LinkKind::StartToStart => "1",
            LinkKind::FinishToFinish => "2",
            LinkKind::StartToFinish => "3",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LinkKind::FinishToStart => "finish_to_start",
            LinkKind::StartToStart => "start_to_start",
            LinkKind::FinishToFinish => "finish_to_finish",
            LinkKind::StartToFinish => "start_to_finish",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|k| k.code() == raw || k.name().eq_ignore_ascii_case(raw))
            .or_else(|| match raw.to_ascii_uppercase().as_str() {
                "FS" => Some(LinkKind::FinishToStart),
                "SS" => Some(LinkKind::StartToStart),
                "FF" => Some(LinkKind::FinishToFinish),
                "SF" => Some(LinkKind::StartToFinish),
                _ => None,
            })
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for LinkKind {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for LinkKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct KindVisitor;

        impl Visitor<'_> for KindVisitor {
            type Value = LinkKind;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a link type \"0\"..\"3\"")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<LinkKind, E> {
                LinkKind::parse(v).ok_or_else(|| {
                    E::custom(format!("invalid link type \"{v}\" (expected \"0\"..\"3\")"))
                })
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<LinkKind, E> {
                usize::try_from(v)
                    .ok()
                    .and_then(|i| LinkKind::ALL.get(i).copied())
                    .ok_or_else(|| E::custom(format!("invalid link type {v} (expected 0..3)")))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<LinkKind, E> {
                u64::try_from(v)
                    .map_err(|_| E::custom(format!("invalid link type {v} (expected 0..3)")))
                    .and_then(|u| self.visit_u64(u))
            }
        }

        deserializer.deserialize_any(KindVisitor)
    }
}

impl JsonSchema for LinkKind {
    fn schema_name() -> String {
        "LinkKind".to_string()
    }

    fn is_referenceable() -> bool {
        false
    }

    fn json_schema(_gen: &mut SchemaGenerator) -> Schema {
        SchemaObject {
            instance_type: Some(InstanceType::String.into()),
            enum_values: Some(
                LinkKind::ALL
                    .iter()
                    .map(|k| serde_json::Value::String(k.code().to_string()))
                    .collect(),
            ),
            metadata: Some(Box::new(Metadata {
                description: Some(
                    "0 = finish_to_start, 1 = start_to_start, 2 = finish_to_finish, 3 = start_to_finish"
                        .to_string(),
                ),
                ..Default::default()
            })),
            ..Default::default()
        }
        .into()
    }
}

/// A dependency edge between two tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: ItemId,
    #[serde(alias = "sourceId")]
    pub source: ItemId,
    #[serde(alias = "targetId")]
    pub target: ItemId,
    #[serde(rename = "type", default)]
    pub kind: LinkKind,
    /// Working-day offset applied to the constraint.
    #[serde(default)]
    pub lag: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Link {
    pub fn new(id: ItemId, source: ItemId, target: ItemId, kind: LinkKind) -> Self {
        Self {
            id,
            source,
            target,
            kind,
            lag: 0,
            color: None,
        }
    }

    pub fn touches(&self, task: &ItemId) -> bool {
        &self.source == task || &self.target == task
    }
}
