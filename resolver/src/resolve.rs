use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use log::{info, warn};
use regex::Regex;

use vmf::Document;
use vmf::block::{Block, BlockKind};
use vmf::value::{ArrayStyle, Value, Vector3};

use crate::error::ResolveError;
use crate::schema::{SchemaRegistry, Treatment};
use crate::transform::transform;

// ---------------------------------------------------------------------------
// Fixup
// ---------------------------------------------------------------------------

/// Policy for renaming entities cloned out of a fragment, so that several
/// insertions of one fragment keep disjoint namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FixupStyle {
    #[default]
    Prefix,
    Postfix,
    None,
}

impl FixupStyle {
    /// Numeric encoding used by the `fixup_style` property. Out-of-range
    /// codes behave as no fixup.
    pub fn from_code(code: i64) -> FixupStyle {
        match code {
            0 => FixupStyle::Prefix,
            1 => FixupStyle::Postfix,
            _ => FixupStyle::None,
        }
    }
}

/// Apply the fixup style to an entity name. Names starting with the global
/// (`@`) or procedural (`!`) sigils are reserved and never renamed.
fn fixup_name(name: &str, style: FixupStyle, target_name: Option<&str>) -> String {
    let Some(target) = target_name else {
        return name.to_string();
    };
    match style {
        FixupStyle::None => name.to_string(),
        _ if name.starts_with('@') || name.starts_with('!') => name.to_string(),
        FixupStyle::Prefix => format!("{}{}", target, name),
        FixupStyle::Postfix => format!("{}{}", name, target),
    }
}

// ---------------------------------------------------------------------------
// Replacement directives
// ---------------------------------------------------------------------------

/// `$parameter` and `#material` substitutions collected from one reference
/// entity. Scoped to that single invocation.
#[derive(Debug, Default)]
struct Replacements {
    /// (`$placeholder`, replacement), longest placeholder first so a short
    /// key never prefix-matches inside a longer one.
    parameters: Vec<(String, String)>,
    /// (material name, replacement), sigil stripped, longest first.
    materials: Vec<(String, String)>,
}

impl Replacements {
    /// Read every `replaceN` property off a reference entity.
    fn collect(reference: &Block) -> Replacements {
        static REPLACE_KEY: OnceLock<Regex> = OnceLock::new();
        let replace_key = REPLACE_KEY.get_or_init(|| Regex::new("^replace[0-9]*$").unwrap());

        let mut replacements = Replacements::default();
        for property in &reference.properties {
            if !replace_key.is_match(&property.key) {
                continue;
            }
            let text = property.value.to_string();
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            let (token, rest) = match text.split_once(' ') {
                Some((token, rest)) => (token, rest.trim()),
                None => (text, ""),
            };

            if let Some(material) = token.strip_prefix('#') {
                replacements
                    .materials
                    .push((material.to_string(), rest.to_string()));
            } else if token.starts_with('$') {
                replacements
                    .parameters
                    .push((token.to_string(), rest.to_string()));
            } else {
                warn!(
                    "invalid property replacement name \"{}\" - needs to begin with a $",
                    token
                );
            }
        }

        replacements
            .parameters
            .sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        replacements
            .materials
            .sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        replacements
    }

    fn has_parameters(&self) -> bool {
        !self.parameters.is_empty()
    }

    /// Substitute every `$` placeholder occurring in `text`.
    fn apply_parameters(&self, text: &str) -> String {
        let mut result = text.to_string();
        for (placeholder, replacement) in &self.parameters {
            result = result.replace(placeholder.as_str(), replacement);
        }
        result
    }

    /// Replacement for a material, matched against the whole value.
    fn material(&self, material: &str) -> Option<&str> {
        self.materials
            .iter()
            .find(|(name, _)| name == material)
            .map(|(_, replacement)| replacement.as_str())
    }
}

// ---------------------------------------------------------------------------
// Clone
// ---------------------------------------------------------------------------

/// Everything one fragment invocation carries into the clone pass.
struct CloneContext<'a> {
    id_offset: i64,
    node_offset: i64,
    fixup: FixupStyle,
    target_name: Option<&'a str>,
    replacements: &'a Replacements,
    schema: &'a SchemaRegistry,
}

impl CloneContext<'_> {
    fn fixup_active(&self) -> bool {
        self.fixup != FixupStyle::None && self.target_name.is_some()
    }
}

/// Deep-copy a subtree, applying parameter substitution, name fixup,
/// identifier offsetting, and material replacement as each property is
/// copied. The source tree is never mutated: every invocation builds fresh
/// nodes, so one cached fragment can seed any number of clones.
fn clone_block(source: &Block, ctx: &CloneContext<'_>) -> Block {
    let mut block = Block::new(source.kind.clone());

    let class_name = if source.kind == BlockKind::Entity {
        source.class_name()
    } else {
        None
    };

    for property in &source.properties {
        let raw = property.value.to_string();
        // A property that came from a replacement directive was explicitly
        // authored by the invoker; name fixup must leave it alone.
        let mut fixup_allowed = true;
        let text = if ctx.replacements.has_parameters() && raw.contains('$') {
            fixup_allowed = false;
            ctx.replacements.apply_parameters(&raw)
        } else {
            raw
        };

        // Re-type the (possibly substituted) text in the source value's shape.
        let mut value = match &property.value {
            Value::Vector3Array(array) if array.style == ArrayStyle::Bare => {
                Value::parse_row(&text)
            }
            _ => Value::parse(&text),
        };

        if source.kind == BlockKind::Connections {
            if fixup_allowed && ctx.fixup_active() {
                value = Value::Text(rewrite_invoke_names(&text, ctx));
            }
        } else if source.kind == BlockKind::Side && property.key == "material" {
            if let Some(replacement) = ctx.replacements.material(&text) {
                value = Value::Text(replacement.to_string());
            }
        } else if property.key == "groupid" {
            if let Value::Number(n) = &mut value {
                *n += ctx.id_offset as f64;
            }
        } else if property.key == "nodeid" {
            if let Value::Number(n) = &mut value {
                *n += ctx.node_offset as f64;
            }
        } else if source.kind == BlockKind::Entity {
            let treatment = class_name
                .as_deref()
                .and_then(|class| ctx.schema.field_treatment(class, &property.key))
                .unwrap_or(Treatment::None);

            if treatment == Treatment::Identifier {
                value.offset_identifiers(ctx.id_offset);
            } else if fixup_allowed
                && (property.key == "targetname" || treatment == Treatment::EntityName)
                && ctx.fixup_active()
            {
                value = Value::Text(fixup_name(&text, ctx.fixup, ctx.target_name));
            }
        }

        block.push_property(property.key.clone(), value);
    }

    for child in &source.children {
        block.children.push(clone_block(child, ctx));
    }

    block.offset_id(ctx.id_offset);
    block
}

/// Rewrite the entity names inside one connection invoke string: the target
/// (first field) always, and the parameter (third field) when the input is
/// declared to address an entity.
fn rewrite_invoke_names(invoke: &str, ctx: &CloneContext<'_>) -> String {
    let mut fields: Vec<String> = invoke.split(',').map(str::to_string).collect();
    if fields.is_empty() {
        return invoke.to_string();
    }
    fields[0] = fixup_name(&fields[0], ctx.fixup, ctx.target_name);
    if fields.len() > 2
        && ctx.schema.input_treatment(&fields[1]) == Some(Treatment::EntityName)
    {
        fields[2] = fixup_name(&fields[2], ctx.fixup, ctx.target_name);
    }
    fields.join(",")
}

// ---------------------------------------------------------------------------
// Proxy connections
// ---------------------------------------------------------------------------

/// One output collected from a reference entity's `instance:` connection,
/// waiting to be merged onto the instance-local entity it names.
#[derive(Debug)]
struct ProxyConnection {
    output_name: String,
    invoke: String,
}

type ProxyMap = HashMap<String, Vec<ProxyConnection>>;

/// Collect proxy outputs from the reference entity's own connection block.
/// Keys look like `instance:LocalName;OutputName`.
fn collect_proxy_connections(connections: &Block, map: &mut ProxyMap) {
    for property in &connections.properties {
        let Some((target, output)) = property.key.split_once(';') else {
            continue;
        };
        let Some(local_name) = target.strip_prefix("instance:") else {
            continue;
        };
        info!("found proxy output: {}", property.key);
        map.entry(local_name.to_string())
            .or_default()
            .push(ProxyConnection {
                output_name: output.to_string(),
                invoke: property.value.to_string(),
            });
    }
}

/// Merge collected proxy outputs into a cloned entity's connection block,
/// then drop the relay edges that addressed the deleted proxy entity.
fn merge_proxy_outputs(entity: &mut Block, outputs: &[ProxyConnection]) {
    let index = match entity
        .children
        .iter()
        .position(|c| c.kind == BlockKind::Connections)
    {
        Some(index) => index,
        None => {
            entity.children.push(Block::new(BlockKind::Connections));
            entity.children.len() - 1
        }
    };
    let connections = &mut entity.children[index];

    for output in outputs {
        info!("remapped proxy output {}", output.output_name);
        connections.push_property(output.output_name.clone(), Value::Text(output.invoke.clone()));
    }
    connections
        .properties
        .retain(|p| !p.value.to_string().contains(",ProxyRelay,"));
}

/// Rewrite `instance:` inputs on an ordinary entity so they address the
/// flattened entity name directly: `inst,instance:local;Input,...` becomes
/// `inst-local,Input,...`, other invocation fields untouched.
fn rewrite_instance_inputs(entity: &mut Block) {
    let Some(connections) = entity.find_child_mut(&BlockKind::Connections) else {
        return;
    };
    for property in &mut connections.properties {
        let invoke = property.value.to_string();
        let fields: Vec<&str> = invoke.split(',').collect();
        if fields.len() < 2 {
            continue;
        }
        let Some(input) = fields[1].strip_prefix("instance:") else {
            continue;
        };
        let Some((local_name, command)) = input.split_once(';') else {
            continue;
        };

        let mut rewritten = vec![format!("{}-{}", fields[0], local_name), command.to_string()];
        rewritten.extend(fields[2..].iter().map(|f| f.to_string()));
        property.value = Value::Text(rewritten.join(","));
    }
}

// ---------------------------------------------------------------------------
// Fragment loading
// ---------------------------------------------------------------------------

/// Supplies parsed fragment trees by reference path: a usable tree, or a
/// failure signal the resolver reports and recovers from.
pub trait FragmentLoader {
    fn load(&mut self, path: &str) -> Result<Document, ResolveError>;
}

/// Loads fragments from a content-root directory on disk.
pub struct DirLoader {
    root: PathBuf,
}

impl DirLoader {
    pub fn new(root: impl Into<PathBuf>) -> DirLoader {
        DirLoader { root: root.into() }
    }

    /// Path heuristics: the path as given (preferring a `.vmf`-suffixed
    /// sibling), then with a leading component stripped when it repeats the
    /// root directory's own name.
    fn resolve_path(&self, path: &str) -> Option<PathBuf> {
        if let Some(found) = existing_map_file(&self.root.join(path)) {
            return Some(found);
        }
        if let Some((first, rest)) = path.split_once('/') {
            if self.root.file_name().is_some_and(|name| name == first) {
                return existing_map_file(&self.root.join(rest));
            }
        }
        None
    }
}

fn existing_map_file(candidate: &Path) -> Option<PathBuf> {
    let mut with_extension = candidate.as_os_str().to_os_string();
    with_extension.push(".vmf");
    let with_extension = PathBuf::from(with_extension);
    if with_extension.is_file() {
        Some(with_extension)
    } else if candidate.is_file() {
        Some(candidate.to_path_buf())
    } else {
        None
    }
}

impl FragmentLoader for DirLoader {
    fn load(&mut self, path: &str) -> Result<Document, ResolveError> {
        let Some(resolved) = self.resolve_path(path) else {
            return Err(ResolveError::FragmentNotFound(path.to_string()));
        };
        info!("parsing {}...", resolved.display());

        let source = std::fs::read_to_string(&resolved).map_err(|err| ResolveError::Io {
            path: path.to_string(),
            source: err,
        })?;

        let parser = vmf::parser::Parser::new(source, 0);
        parser.parse().map_err(|errors| ResolveError::Parse {
            path: path.to_string(),
            messages: errors.into_iter().map(|e| e.message).collect(),
        })
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Options for a resolution run.
#[derive(Debug, Clone, Copy)]
pub struct ResolveOptions {
    /// Delete `func_instance_io_proxy` entities from the output. The
    /// cleanup stage can ask for them to be kept.
    pub remove_io_proxies: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        ResolveOptions {
            remove_io_proxies: true,
        }
    }
}

/// State for one resolution run: the schema, the fragment loader, and the
/// memoized cache of fully-resolved fragment trees. All of it is owned by
/// the caller, so isolated resolutions can run side by side.
pub struct Resolver<'a> {
    schema: &'a SchemaRegistry,
    loader: &'a mut dyn FragmentLoader,
    options: ResolveOptions,
    /// Fully-resolved fragment trees, memoized per reference path.
    cache: HashMap<String, Document>,
    /// Chain of fragment paths currently being resolved, for cycle refusal.
    in_progress: Vec<String>,
}

impl<'a> Resolver<'a> {
    pub fn new(schema: &'a SchemaRegistry, loader: &'a mut dyn FragmentLoader) -> Resolver<'a> {
        Resolver::with_options(schema, loader, ResolveOptions::default())
    }

    pub fn with_options(
        schema: &'a SchemaRegistry,
        loader: &'a mut dyn FragmentLoader,
        options: ResolveOptions,
    ) -> Resolver<'a> {
        Resolver {
            schema,
            loader,
            options,
            cache: HashMap::new(),
            in_progress: Vec::new(),
        }
    }

    /// Flatten every fragment reference in `document`, in place. Individual
    /// references that cannot be inserted are logged and dropped; the rest
    /// of the document still resolves.
    pub fn resolve(&mut self, document: &mut Document) {
        self.resolve_document(document);
        info!("instances resolved.");
    }

    fn resolve_document(&mut self, document: &mut Document) {
        let mut auto_name = 0usize;
        let mut last_id = document.max_id();
        let mut last_node_id = document.max_node_id();

        // Reverse index order: insertions at the current position never
        // perturb the indices still to be visited.
        for index in (0..document.blocks.len()).rev() {
            if document.blocks[index].kind != BlockKind::Entity {
                continue;
            }
            let Some(class_name) = document.blocks[index].class_name() else {
                continue;
            };

            match class_name.as_str() {
                "func_instance" => {
                    let reference = document.blocks.remove(index);
                    self.insert_instance(
                        document,
                        index,
                        &reference,
                        &mut auto_name,
                        &mut last_id,
                        &mut last_node_id,
                    );
                }
                "func_instance_parms" => {
                    // Parameter declarations are metadata for the editor.
                    document.blocks.remove(index);
                }
                "func_instance_io_proxy" => {
                    if self.options.remove_io_proxies {
                        document.blocks.remove(index);
                    }
                }
                _ => rewrite_instance_inputs(&mut document.blocks[index]),
            }
        }
    }

    /// Expand one removed reference entity into the host at `index`.
    fn insert_instance(
        &mut self,
        host: &mut Document,
        index: usize,
        reference: &Block,
        auto_name: &mut usize,
        last_id: &mut i64,
        last_node_id: &mut i64,
    ) {
        let origin = reference
            .get("origin")
            .and_then(Value::as_vector3)
            .copied()
            .unwrap_or_else(Vector3::zero);
        let angles = reference
            .get("angles")
            .and_then(Value::as_vector3)
            .copied()
            .unwrap_or_else(Vector3::zero);
        let fixup = reference
            .get("fixup_style")
            .and_then(Value::as_number)
            .map(|code| FixupStyle::from_code(code as i64))
            .unwrap_or_default();

        let mut target_name = reference.get("targetname").map(|v| v.to_string());
        if fixup != FixupStyle::None && target_name.is_none() {
            target_name = Some(format!("AutoInstance{}", *auto_name));
            *auto_name += 1;
        }

        let Some(file) = reference.get("file").map(|v| v.to_string()) else {
            warn!("invalid instance at ({})", origin);
            return;
        };

        let mut proxy_map = ProxyMap::new();
        if let Some(connections) = reference.find_child(&BlockKind::Connections) {
            collect_proxy_connections(connections, &mut proxy_map);
        }
        let replacements = Replacements::collect(reference);

        if !self.ensure_fragment(&file) {
            warn!("could not insert instance of '{}'", file);
            return;
        }

        info!("inserting instance of {} at ({}), ({})", file, origin, angles);

        let ctx = CloneContext {
            id_offset: *last_id,
            node_offset: *last_node_id,
            fixup,
            target_name: target_name.as_deref(),
            replacements: &replacements,
            schema: self.schema,
        };
        let fragment = &self.cache[&file];

        // World geometry joins the host's world block.
        let world_clones: Vec<Block> = fragment
            .world()
            .map(|world| {
                world
                    .children
                    .iter()
                    .filter(|c| matches!(c.kind, BlockKind::Group | BlockKind::Solid))
                    .map(|c| {
                        let mut clone = clone_block(c, &ctx);
                        transform(&mut clone, &origin, &angles, self.schema);
                        clone
                    })
                    .collect()
            })
            .unwrap_or_default();

        // Entities take the reference's former position, keeping their
        // relative order; matching proxy outputs merge in as they pass.
        let mut entity_clones: Vec<Block> = Vec::new();
        for child in &fragment.blocks {
            if child.kind != BlockKind::Entity {
                continue;
            }
            let original_name = child.get("targetname").map(|v| v.to_string());
            let mut clone = clone_block(child, &ctx);
            transform(&mut clone, &origin, &angles, self.schema);

            if let Some(outputs) = original_name.as_deref().and_then(|n| proxy_map.get(n)) {
                merge_proxy_outputs(&mut clone, outputs);
            }
            entity_clones.push(clone);
        }

        match host.world_index() {
            Some(world_index) => host.blocks[world_index].children.extend(world_clones),
            None if !world_clones.is_empty() => {
                warn!(
                    "host has no world block; dropping {} brushes from '{}'",
                    world_clones.len(),
                    file
                );
            }
            None => {}
        }

        let mut at = index;
        for clone in entity_clones {
            host.blocks.insert(at, clone);
            at += 1;
        }

        *last_id = host.max_id();
        *last_node_id = host.max_node_id();
    }

    /// Make sure `path` is in the fragment cache, loading and recursively
    /// resolving it on first use. Failed loads are not cached; a later
    /// reference retries.
    fn ensure_fragment(&mut self, path: &str) -> bool {
        if self.cache.contains_key(path) {
            return true;
        }
        if self.in_progress.iter().any(|p| p == path) {
            warn!(
                "fragment '{}' references itself (via {}); skipping",
                path,
                self.in_progress.join(" -> ")
            );
            return false;
        }

        let mut document = match self.loader.load(path) {
            Ok(document) => document,
            Err(err) => {
                warn!("{}", err);
                return false;
            }
        };

        self.in_progress.push(path.to_string());
        self.resolve_document(&mut document);
        self.in_progress.pop();

        self.cache.insert(path.to_string(), document);
        true
    }
}
