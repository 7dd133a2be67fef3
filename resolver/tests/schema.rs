use std::path::Path;

use resolver::fgd::{load_fgd, load_fgd_source};
use resolver::schema::{SchemaRegistry, Treatment, structural_treatment};
use vmf::block::BlockKind;

fn registry_from(source: &str) -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    load_fgd_source(source, Path::new("."), &mut registry);
    registry
}

#[test]
fn field_types_map_to_treatments() {
    let registry = registry_from(
        r#"
@PointClass = thing : "A thing"
[
    origin(origin) : "Origin"
    angles(angle) : "Angles"
    target(target_destination) : "Target"
    source(target_source) : "Source"
    filtername(filterclass) : "Filter"
    sides(sidelist) : "Sides"
    movedir(vector) : "Move direction"
    endpoint(vecline) : "End point"
    health(integer) : "Health" : 100
]
"#,
    );

    assert_eq!(registry.classify("thing", "origin"), Treatment::Position);
    assert_eq!(registry.classify("thing", "angles"), Treatment::Angle);
    assert_eq!(registry.classify("thing", "target"), Treatment::EntityName);
    assert_eq!(registry.classify("thing", "source"), Treatment::EntityName);
    assert_eq!(registry.classify("thing", "filtername"), Treatment::EntityName);
    assert_eq!(registry.classify("thing", "sides"), Treatment::Identifier);
    assert_eq!(registry.classify("thing", "movedir"), Treatment::Offset);
    // Axis helpers hold world points despite the vector-looking name.
    assert_eq!(registry.classify("thing", "endpoint"), Treatment::Position);
    assert_eq!(registry.classify("thing", "health"), Treatment::None);
    // Unknown class or field: never an error.
    assert_eq!(registry.classify("thing", "unheard_of"), Treatment::None);
    assert_eq!(registry.classify("no_such_class", "origin"), Treatment::None);
}

#[test]
fn inheritance_copies_missing_fields_only() {
    let registry = registry_from(
        r#"
@BaseClass = Parent
[
    origin(origin) : "Origin"
    target(target_destination) : "Target"
]
@PointClass base(Parent) = child : "Child"
[
    target(string) : "Overridden"
]
"#,
    );

    assert_eq!(registry.classify("child", "origin"), Treatment::Position);
    // The child's explicit declaration wins over the parent's.
    assert_eq!(registry.classify("child", "target"), Treatment::None);
}

#[test]
fn earlier_parents_win() {
    let registry = registry_from(
        r#"
@BaseClass = First
[
    shared(origin) : "Shared"
]
@BaseClass = Second
[
    shared(vector) : "Shared"
]
@PointClass base(First, Second) = child : "Child"
[
]
"#,
    );
    assert_eq!(registry.classify("child", "shared"), Treatment::Position);
}

#[test]
fn unknown_parent_is_recoverable() {
    let registry = registry_from(
        r#"
@PointClass base(NeverDeclared) = orphan : "Orphan"
[
    origin(origin) : "Origin"
]
"#,
    );
    assert_eq!(registry.classify("orphan", "origin"), Treatment::Position);
}

#[test]
fn brush_classes_never_rotate_angles() {
    let registry = registry_from(
        r#"
@BaseClass = Angles
[
    angles(angle) : "Angles"
]
@SolidClass base(Angles) = func_wall : "A wall"
[
]
"#,
    );
    assert_eq!(registry.classify("func_wall", "angles"), Treatment::None);
}

#[test]
fn redeclaring_a_field_overwrites() {
    let registry = registry_from(
        r#"
@PointClass = patched : "First pass"
[
    dir(vector) : "Direction"
]
@PointClass = patched : "Second pass"
[
    dir(origin) : "Actually a point"
]
"#,
    );
    assert_eq!(registry.classify("patched", "dir"), Treatment::Position);
}

#[test]
fn continuation_lines_are_joined() {
    let registry = registry_from(
        "@PointClass base(Parent) = split_decl :\n    \"Description on its own line\"\n[\n    origin(origin) : \"Origin\"\n]\n",
    );
    assert_eq!(registry.classify("split_decl", "origin"), Treatment::Position);
}

#[test]
fn comments_are_stripped_outside_strings() {
    let registry = registry_from(
        r#"
// a full-line comment
@PointClass = commented : "Class" // trailing comment
[
    url(string) : "See http://example//path" : : "slashes in strings survive"
    origin(origin) : "Origin" // another
]
"#,
    );
    assert_eq!(registry.classify("commented", "origin"), Treatment::Position);
    assert_eq!(registry.classify("commented", "url"), Treatment::None);
}

#[test]
fn vector_special_cases() {
    let registry = registry_from(
        r#"
@PointClass = func_useableladder : "Ladder"
[
    point0(vector) : "Start"
    point1(vector) : "End"
]
@PointClass = info_overlay : "Overlay"
[
    BasisOrigin(vector) : "Origin"
    BasisNormal(vector) : "Normal"
    BasisU(vector) : "U"
    BasisV(vector) : "V"
    uv0(vector) : "Corner"
]
"#,
    );

    assert_eq!(
        registry.classify("func_useableladder", "point0"),
        Treatment::Position
    );
    assert_eq!(
        registry.classify("func_useableladder", "point1"),
        Treatment::Position
    );
    assert_eq!(
        registry.classify("info_overlay", "BasisOrigin"),
        Treatment::Position
    );
    assert_eq!(
        registry.classify("info_overlay", "BasisNormal"),
        Treatment::Offset
    );
    assert_eq!(registry.classify("info_overlay", "BasisU"), Treatment::Offset);
    assert_eq!(registry.classify("info_overlay", "uv0"), Treatment::None);
}

#[test]
fn inputs_with_entity_parameters_are_registered() {
    let registry = registry_from(
        r#"
@PointClass = thing : "Thing"
[
    input SetOwner(target_destination) : "Reparent"
    input Kill(void) : "Remove"
]
"#,
    );
    assert_eq!(
        registry.input_treatment("SetOwner"),
        Some(Treatment::EntityName)
    );
    assert_eq!(registry.input_treatment("Kill"), None);
}

#[test]
fn includes_load_relative_to_the_including_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("base.fgd"),
        "@BaseClass = Targetname\n[\n    targetname(target_source) : \"Name\"\n]\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("game.fgd"),
        "@include \"base.fgd\"\n@PointClass base(Targetname) = item : \"Item\"\n[\n]\n",
    )
    .unwrap();

    let mut registry = SchemaRegistry::new();
    load_fgd(&dir.path().join("game.fgd"), &mut registry);
    assert_eq!(registry.classify("item", "targetname"), Treatment::EntityName);
}

#[test]
fn registry_contract_is_directly_usable() {
    let mut registry = SchemaRegistry::new();
    registry.register_class(
        "door",
        vec![("speed".to_string(), Treatment::None)],
    );
    registry.register_field("base_door", "origin", Treatment::Position);
    registry.resolve_inheritance("door", &["base_door".to_string()]);

    assert_eq!(registry.classify("door", "origin"), Treatment::Position);
    assert_eq!(registry.classify("door", "speed"), Treatment::None);
    assert_eq!(registry.field_treatment("door", "speed"), Some(Treatment::None));
    assert_eq!(registry.field_treatment("door", "unknown"), None);
}

#[test]
fn structural_defaults() {
    assert_eq!(
        structural_treatment(&BlockKind::Side, "plane"),
        Treatment::Position
    );
    assert_eq!(
        structural_treatment(&BlockKind::Entity, "angles"),
        Treatment::Angle
    );
    assert_eq!(
        structural_treatment(&BlockKind::Entity, "targetname"),
        Treatment::EntityName
    );
    assert_eq!(
        structural_treatment(&BlockKind::DispInfo, "startposition"),
        Treatment::Position
    );
    assert_eq!(
        structural_treatment(&BlockKind::Normals, "row12"),
        Treatment::Offset
    );
    assert_eq!(
        structural_treatment(&BlockKind::Normals, "power"),
        Treatment::None
    );
    assert_eq!(
        structural_treatment(&BlockKind::Unknown("whatever".to_string()), "origin"),
        Treatment::None
    );
}
