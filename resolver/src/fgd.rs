use std::path::Path;
use std::sync::OnceLock;

use log::{info, warn};
use regex::Regex;

use crate::schema::{SchemaRegistry, Treatment};

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Load one FGD class-description file into the registry, following
/// `@include` directives relative to the including file. Loading is
/// best-effort: unreadable files and malformed lines warn and are skipped,
/// never fatal.
pub fn load_fgd(path: &Path, registry: &mut SchemaRegistry) {
    info!("loading {}", path.display());

    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            warn!("cannot read '{}': {}", path.display(), err);
            return;
        }
    };

    let base_dir = path.parent().unwrap_or(Path::new("."));
    load_fgd_source(&source, base_dir, registry);
}

/// Parse FGD source text. Split out from [`load_fgd`] so the grammar can be
/// exercised without touching disk.
pub fn load_fgd_source(source: &str, base_dir: &Path, registry: &mut SchemaRegistry) {
    let mut lines = source.lines();
    let mut current_class: Option<String> = None;

    while let Some(raw) = lines.next() {
        let mut line = clean_line(raw);
        if line.is_empty() {
            continue;
        }
        // Declarations continue onto the next line when they end in `+` or
        // a bare `:` (a description split across lines).
        while line.ends_with('+') || line.ends_with(':') {
            let Some(next) = lines.next() else { break };
            line = format!("{}{}", line.trim_end_matches(['+', ' ', '\t']), clean_line(next));
        }

        if let Some(caps) = include_re().captures(&line) {
            load_fgd(&base_dir.join(&caps[1]), registry);
        } else if let Some(caps) = class_header_re().captures(&line) {
            current_class = parse_class_header(&line, &caps[1], registry);
        } else if let Some(caps) = input_re().captures(&line) {
            if caps[2].eq_ignore_ascii_case("target_destination") {
                registry.register_input(&caps[1], Treatment::EntityName);
            }
        } else if let Some(class_name) = &current_class {
            if field_decl_re().is_match(&line) {
                parse_field_decl(&line, class_name, registry);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Line grammar
// ---------------------------------------------------------------------------

fn include_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^@include "([^"]+)""#).unwrap())
}

fn class_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^@([A-Z][A-Za-z]*Class)( |=)").unwrap())
}

fn base_group_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"base\(\s*[A-Za-z0-9_]+(\s*,\s*[A-Za-z0-9_]+)*\s*\)").unwrap()
    })
}

fn field_decl_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9_]+\s*\(\s*[A-Za-z0-9_]+\s*\)(\s*readonly\s*|\s*):").unwrap()
    })
}

fn input_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^input\s+([A-Za-z0-9_]+)\s*\(\s*([A-Za-z0-9_]+)\s*\)").unwrap())
}

/// Strip a `//` comment (outside quoted strings, escape-aware) and trim.
fn clean_line(raw: &str) -> String {
    let line = raw.trim();
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' => in_string = !in_string,
            '/' if !in_string && line.as_bytes().get(i + 1) == Some(&b'/') => {
                return line[..i].trim_end().to_string();
            }
            _ => {}
        }
    }
    line.to_string()
}

/// Parse `@SomeClass base(Parent1, Parent2) ... = name : "description" ...`.
/// Returns the class name the following field declarations belong to.
fn parse_class_header(
    line: &str,
    class_type: &str,
    registry: &mut SchemaRegistry,
) -> Option<String> {
    let eq = line.find('=')?;
    let after_eq = &line[eq + 1..];
    let end = after_eq
        .find([':', '['])
        .unwrap_or(after_eq.len());
    let name = after_eq[..end].trim().to_string();
    if name.is_empty() {
        return None;
    }

    registry.register_class(&name, std::iter::empty());

    // Brush geometry carries no angle semantics: a brush-based class must
    // not rotate its angles field, whatever its parents declare.
    if class_type.eq_ignore_ascii_case("SolidClass") {
        registry.register_field(&name, "angles", Treatment::None);
    }

    let mut parents = Vec::new();
    for group in base_group_re().find_iter(line) {
        // Only base() groups in the header part, before the `=` separator.
        if group.start() >= eq {
            break;
        }
        let inner = &group.as_str()[group.as_str().find('(').unwrap_or(0) + 1
            ..group.as_str().len() - 1];
        parents.extend(inner.split(',').map(|p| p.trim().to_string()));
    }
    registry.resolve_inheritance(&name, &parents);

    Some(name)
}

/// Parse `fieldname(typename) [readonly] : ...` inside a class body.
fn parse_field_decl(line: &str, class_name: &str, registry: &mut SchemaRegistry) {
    let Some(open) = line.find('(') else { return };
    let Some(close) = line[open..].find(')').map(|i| i + open) else {
        return;
    };
    let field = line[..open].trim_end();
    let type_name = line[open + 1..close].trim().to_ascii_lowercase();

    registry.register_field(class_name, field, field_treatment(class_name, field, &type_name));
}

/// Default treatment implied by an FGD field type.
fn field_treatment(class_name: &str, field: &str, type_name: &str) -> Treatment {
    match type_name {
        "angle" => Treatment::Angle,
        "origin" => Treatment::Position,
        "target_destination" | "target_source" | "filterclass" => Treatment::EntityName,
        // Single-point axis helpers hold absolute world coordinates, not
        // the direction their name suggests.
        "vecline" => Treatment::Position,
        "sidelist" => Treatment::Identifier,
        "vector" => vector_treatment(class_name, field),
        _ => Treatment::None,
    }
}

/// `vector` maps to Offset, except where the upstream class descriptions
/// mislabel absolute points as vectors.
fn vector_treatment(class_name: &str, field: &str) -> Treatment {
    match class_name {
        "func_useableladder" if field == "point0" || field == "point1" => Treatment::Position,
        "info_overlay" => match field {
            "BasisOrigin" => Treatment::Position,
            "BasisNormal" | "BasisU" | "BasisV" => Treatment::Offset,
            _ => Treatment::None,
        },
        _ => Treatment::Offset,
    }
}
