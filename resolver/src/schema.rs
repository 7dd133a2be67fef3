use std::collections::HashMap;
use std::sync::OnceLock;

use log::warn;
use regex::Regex;
use vmf::block::BlockKind;

/// Classification of how a field's value participates in geometric and
/// identifier rewriting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Treatment {
    #[default]
    None,
    /// Direction vector: rotates, never translates.
    Offset,
    /// Euler angles: composes with the placement rotation.
    Angle,
    /// World point: rotates, then translates.
    Position,
    /// Names another entity: rewritten by name fixup, not by geometry.
    EntityName,
    /// References other blocks by numeric id: shifted with the id offset.
    Identifier,
}

/// Per-class field treatments built from class-description sources, plus the
/// table of connection inputs whose parameter addresses an entity. Fully
/// populated before resolution begins, read-only afterward.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    classes: HashMap<String, HashMap<String, Treatment>>,
    inputs: HashMap<String, Treatment>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        SchemaRegistry::default()
    }

    /// Merge field treatments into a class's entry, creating it if absent.
    /// Re-declaring a field overwrites its prior treatment, so patch sources
    /// loaded later can correct earlier ones.
    pub fn register_class<I>(&mut self, name: &str, fields: I)
    where
        I: IntoIterator<Item = (String, Treatment)>,
    {
        let entry = self.classes.entry(name.to_string()).or_default();
        for (field, treatment) in fields {
            entry.insert(field, treatment);
        }
    }

    pub fn register_field(&mut self, class_name: &str, field: &str, treatment: Treatment) {
        self.classes
            .entry(class_name.to_string())
            .or_default()
            .insert(field.to_string(), treatment);
    }

    /// Copy every field treatment from each parent that the child does not
    /// already define. Parents are processed in declaration order, so earlier
    /// parents win when several declare a field the child lacks. Unknown
    /// parents are a warning, not an error.
    pub fn resolve_inheritance(&mut self, class_name: &str, parent_names: &[String]) {
        for parent in parent_names {
            let Some(fields) = self.classes.get(parent.as_str()).cloned() else {
                warn!("undefined parent for class {}: {}", class_name, parent);
                continue;
            };
            let entry = self.classes.entry(class_name.to_string()).or_default();
            for (field, treatment) in fields {
                entry.entry(field).or_insert(treatment);
            }
        }
    }

    /// Treatment for a field on a class; `None` when neither the class nor
    /// the field is known.
    pub fn classify(&self, class_name: &str, field_name: &str) -> Treatment {
        self.field_treatment(class_name, field_name)
            .unwrap_or(Treatment::None)
    }

    /// Treatment a class explicitly carries for a field, if any. Callers use
    /// the `Option` to distinguish "declared None" from "not declared".
    pub fn field_treatment(&self, class_name: &str, field_name: &str) -> Option<Treatment> {
        self.classes
            .get(class_name)
            .and_then(|fields| fields.get(field_name))
            .copied()
    }

    pub fn register_input(&mut self, name: &str, treatment: Treatment) {
        self.inputs.insert(name.to_string(), treatment);
    }

    /// Treatment of a connection input's parameter field, if declared.
    pub fn input_treatment(&self, input_name: &str) -> Option<Treatment> {
        self.inputs.get(input_name).copied()
    }
}

/// Structural defaults: treatments implied by the block kind alone,
/// independent of any entity class. Field names match literally, except the
/// displacement rows which match the `row<N>` pattern.
pub fn structural_treatment(kind: &BlockKind, field: &str) -> Treatment {
    static ROW: OnceLock<Regex> = OnceLock::new();

    match kind {
        BlockKind::Side => match field {
            "plane" | "uaxis" | "vaxis" => Treatment::Position,
            _ => Treatment::None,
        },
        BlockKind::Entity => match field {
            "origin" | "lowerleft" | "lowerright" | "upperleft" | "upperright" => {
                Treatment::Position
            }
            "angles" => Treatment::Angle,
            "targetname" | "parentname" => Treatment::EntityName,
            _ => Treatment::None,
        },
        BlockKind::DispInfo => {
            if field == "startposition" {
                Treatment::Position
            } else {
                Treatment::None
            }
        }
        BlockKind::Normals | BlockKind::Offsets | BlockKind::OffsetNormals => {
            let row = ROW.get_or_init(|| Regex::new("^row[0-9]+$").unwrap());
            if row.is_match(field) {
                Treatment::Offset
            } else {
                Treatment::None
            }
        }
        _ => Treatment::None,
    }
}
