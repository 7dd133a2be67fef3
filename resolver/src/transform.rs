use vmf::block::{Block, BlockKind};
use vmf::value::Vector3;

use crate::schema::{SchemaRegistry, Treatment, structural_treatment};

/// Apply a placement to a subtree: every property value whose treatment
/// calls for it is rotated and/or translated, recursing into every child.
///
/// Treatment lookup is two ordered passes: the structural default for the
/// block kind first, then — on entities — the per-class schema declaration,
/// which overrides the default when present.
pub fn transform(
    block: &mut Block,
    translation: &Vector3,
    rotation: &Vector3,
    schema: &SchemaRegistry,
) {
    let class_name = if block.kind == BlockKind::Entity {
        block.class_name()
    } else {
        None
    };

    for property in &mut block.properties {
        let mut treatment = structural_treatment(&block.kind, &property.key);
        if let Some(class_name) = &class_name {
            if let Some(declared) = schema.field_treatment(class_name, &property.key) {
                treatment = declared;
            }
        }

        match treatment {
            Treatment::Offset => property.value.rotate(rotation),
            Treatment::Angle => property.value.add_angles(rotation),
            Treatment::Position => {
                property.value.rotate(rotation);
                property.value.offset(translation);
            }
            // Names and identifiers are rewritten during cloning, not here.
            Treatment::None | Treatment::EntityName | Treatment::Identifier => {}
        }
    }

    for child in &mut block.children {
        transform(child, translation, rotation, schema);
    }
}
