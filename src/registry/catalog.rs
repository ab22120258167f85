#![allow(clippy::needless_pass_by_value)]

use schemars::gen::SchemaSettings;
use serde::Serialize;
use serde_json::Value;

use super::{CommandCategory, CommandInfo};

/// A registry entry: metadata + JSON schema for the params.
#[derive(Debug, Clone, Serialize)]
pub struct CommandRegistryEntry {
    pub name: &'static str,
    pub description: &'static str,
    pub category: CommandCategory,
    pub undoable: bool,
    pub llm_hidden: bool,
    pub reschedules: bool,
    pub param_schema: Value,
}

pub(super) fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// Inline JSON schema for a params type. Subschemas are inlined and the
/// `$schema`/`title` noise is stripped so the result can be handed to a
/// function-calling model as-is.
pub(super) fn schema_value<T: schemars::JsonSchema>() -> Value {
    let settings = SchemaSettings::draft07().with(|s| {
        s.inline_subschemas = true;
        s.option_nullable = false;
        s.option_add_null_type = true;
    });
    let root = settings.into_generator().into_root_schema_for::<T>();
    let mut value = serde_json::to_value(root).unwrap_or_else(|_| empty_object_schema());
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
        obj.remove("definitions");
    }
    value
}

pub(super) fn entry(info: CommandInfo, param_schema: Value) -> CommandRegistryEntry {
    CommandRegistryEntry {
        name: info.name,
        description: info.description,
        category: info.category,
        undoable: info.undoable,
        llm_hidden: info.llm_hidden,
        reschedules: info.reschedules,
        param_schema,
    }
}

pub(super) fn de<T: serde::de::DeserializeOwned>(input: &Value) -> Result<T, String> {
    let input = if input.is_null() {
        serde_json::json!({})
    } else {
        input.clone()
    };
    serde_json::from_value(input).map_err(|e| e.to_string())
}

/// The complete command registry, auto-generated from param struct schemas.
pub fn command_registry() -> Vec<CommandRegistryEntry> {
    super::Command::registry_entries()
}

pub fn find(name: &str) -> Option<CommandRegistryEntry> {
    command_registry().into_iter().find(|e| e.name == name)
}

/// Tool list for a function-calling model, one tool per LLM-visible command.
/// Shape: `[{ name, description, input_schema }]`; the provider layer adapts
/// it to the wire format it needs.
pub fn to_llm_tools() -> Value {
    Value::Array(
        command_registry()
            .into_iter()
            .filter(|e| !e.llm_hidden)
            .map(|e| {
                serde_json::json!({
                    "name": e.name,
                    "description": e.description,
                    "input_schema": e.param_schema,
                })
            })
            .collect(),
    )
}

/// Help text for command discovery.
/// Three tiers: no topic → categories, category → command list, command → full schema.
pub fn help_text(topic: Option<&str>) -> String {
    let registry = command_registry();
    let visible: Vec<&CommandRegistryEntry> = registry.iter().filter(|e| !e.llm_hidden).collect();

    match topic {
        None => {
            let mut lines = vec!["Available command categories:".to_string()];
            for cat in CommandCategory::all() {
                let count = visible.iter().filter(|e| e.category == *cat).count();
                if count > 0 {
                    lines.push(format!("  {} ({count}): {}", cat.slug(), cat.description()));
                }
            }
            lines.push(String::new());
            lines.push("Use `help task` to list commands in a category.".to_string());
            lines.push("Use `help add_task` for full parameter details.".to_string());
            lines.join("\n")
        }
        Some(topic) => {
            if let Some(entry) = registry.iter().find(|e| e.name == topic) {
                let schema_str = serde_json::to_string_pretty(&entry.param_schema)
                    .unwrap_or_else(|_| "{}".to_string());
                return format!(
                    "{}: {}\nCategory: {} | Undoable: {}\n\nParameters:\n{}",
                    entry.name,
                    entry.description,
                    entry.category.slug(),
                    if entry.undoable { "yes" } else { "no" },
                    schema_str,
                );
            }

            let cat_lower = topic.to_lowercase();
            let matching: Vec<&&CommandRegistryEntry> = visible
                .iter()
                .filter(|e| e.category.slug() == cat_lower)
                .collect();

            if matching.is_empty() {
                format!("Unknown topic: \"{topic}\". Use `help` to see categories and commands.")
            } else {
                let mut lines = vec![format!("{topic} commands:")];
                for entry in &matching {
                    lines.push(format!("  - {}: {}", entry.name, entry.description));
                }
                lines.push(String::new());
                lines.push("Use `help <command>` for parameter details.".to_string());
                lines.join("\n")
            }
        }
    }
}

/// JSON Schema formatted catalog (for the HTTP API and CLI).
pub fn to_json_schema() -> Value {
    Value::Array(
        command_registry()
            .iter()
            .map(|e| {
                serde_json::json!({
                    "name": e.name,
                    "description": e.description,
                    "category": e.category.slug(),
                    "undoable": e.undoable,
                    "llmHidden": e.llm_hidden,
                    "inputSchema": e.param_schema,
                })
            })
            .collect(),
    )
}
