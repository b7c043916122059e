//! Node-type modules: the compiled schema a binding is instantiated from
//!
//! A node-type module is the output of the schema compiler, shipped as JSON.
//! It lists the data nodes of a YANG module (plus nodes other modules augment
//! into it), their kinds, types, defaults and namespaces. Loading it resolves
//! every typedef, leafref and identity reference up front, so instance trees
//! never meet an unresolved type.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{BindError, Result};
use crate::types::{EnumMember, Identity, Leafref, Pattern, TypeSpec, YangType};
use crate::value::YangValue;

/// Kind of a schema data node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    Container,
    List,
    Leaf,
    LeafList,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Container => "container",
            NodeKind::List => "list",
            NodeKind::Leaf => "leaf",
            NodeKind::LeafList => "leaf-list",
        }
    }
}

/// How list entries are ordered on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListOrdering {
    /// Insertion order (`ordered-by user`, and lists that do not say)
    #[default]
    Insertion,
    /// Canonical key order (explicit `ordered-by system`)
    Canonical,
}

/// A YANG module contributing nodes to a node-type module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub name: String,
    pub namespace: String,
    pub prefix: String,
}

/// One compiled schema node
#[derive(Debug)]
pub struct SchemaNode {
    name: String,
    kind: NodeKind,
    path: Arc<str>,
    module: Arc<ModuleInfo>,
    type_spec: Option<Arc<TypeSpec>>,
    default: Option<YangValue>,
    presence: bool,
    keys: Vec<String>,
    ordering: ListOrdering,
    unique: bool,
    max_elements: Option<usize>,
    children: IndexMap<String, Arc<SchemaNode>>,
}

impl SchemaNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Schema path without predicates, e.g. `/interfaces/interface/name`
    pub fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn path_arc(&self) -> Arc<str> {
        Arc::clone(&self.path)
    }

    /// Module that defines this node
    pub fn module(&self) -> &ModuleInfo {
        &self.module
    }

    pub fn namespace(&self) -> &str {
        &self.module.namespace
    }

    /// Resolved type of a leaf or leaf-list
    pub fn type_spec(&self) -> Option<&Arc<TypeSpec>> {
        self.type_spec.as_ref()
    }

    pub fn default(&self) -> Option<&YangValue> {
        self.default.as_ref()
    }

    pub fn is_presence(&self) -> bool {
        self.presence
    }

    /// Key leaf names of a list, in key order
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn is_key(&self, name: &str) -> bool {
        self.keys.iter().any(|k| k == name)
    }

    pub fn ordering(&self) -> ListOrdering {
        self.ordering
    }

    /// Leaf-list with set semantics (duplicates rejected)
    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn max_elements(&self) -> Option<usize> {
        self.max_elements
    }

    /// Children in declaration order
    pub fn children(&self) -> impl Iterator<Item = &Arc<SchemaNode>> {
        self.children.values()
    }

    pub fn child(&self, name: &str) -> Option<&Arc<SchemaNode>> {
        self.children.get(name)
    }
}

/// A compiled node-type module
#[derive(Debug)]
pub struct SchemaModule {
    module: Arc<ModuleInfo>,
    modules: Vec<Arc<ModuleInfo>>,
    root: Arc<SchemaNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawModule {
    module_name: String,
    namespace: String,
    prefix: Option<String>,
    #[serde(default)]
    imports: Vec<RawImport>,
    #[serde(default)]
    typedefs: HashMap<String, RawType>,
    #[serde(default)]
    identities: Vec<RawIdentity>,
    #[serde(alias = "data")]
    nodes: Vec<RawNode>,
}

#[derive(Debug, Deserialize)]
struct RawImport {
    name: String,
    namespace: String,
    prefix: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawIdentity {
    name: String,
    #[serde(default)]
    base: Vec<String>,
    module: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawType {
    Name(String),
    Spec(Box<RawTypeSpec>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawTypeSpec {
    base: String,
    range: Option<String>,
    length: Option<String>,
    #[serde(default)]
    pattern: Vec<RawPattern>,
    #[serde(default, rename = "enum")]
    enums: Vec<RawEnum>,
    #[serde(default, rename = "bit")]
    bits: Vec<String>,
    fraction_digits: Option<u8>,
    path: Option<String>,
    require_instance: Option<bool>,
    #[serde(default)]
    members: Vec<RawType>,
    identity: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPattern {
    Source(String),
    Full {
        pattern: String,
        #[serde(default, rename = "invert-match")]
        invert_match: bool,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawEnum {
    Name(String),
    Full { name: String, value: Option<i64> },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawNode {
    name: String,
    kind: NodeKind,
    #[serde(rename = "type")]
    node_type: Option<RawType>,
    default: Option<Value>,
    #[serde(default)]
    presence: bool,
    key: Option<String>,
    ordered_by: Option<String>,
    #[serde(default)]
    unique: bool,
    max_elements: Option<usize>,
    module: Option<String>,
    #[serde(default)]
    children: Vec<RawNode>,
}

impl SchemaModule {
    /// Load a node-type module from the given path
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Load a node-type module from a JSON string
    pub fn from_json_str(content: &str) -> Result<Self> {
        let raw: RawModule = serde_json::from_str(content)?;
        Compiler::new(&raw)?.compile(&raw)
    }

    /// Name of the YANG module this binding was generated for
    pub fn name(&self) -> &str {
        &self.module.name
    }

    pub fn namespace(&self) -> &str {
        &self.module.namespace
    }

    /// The main module followed by every module contributing nodes
    pub fn modules(&self) -> impl Iterator<Item = &ModuleInfo> {
        self.modules.iter().map(|m| m.as_ref())
    }

    /// Look a contributing module up by name or prefix
    pub fn module_info(&self, name_or_prefix: &str) -> Option<&ModuleInfo> {
        self.modules()
            .find(|m| m.name == name_or_prefix || m.prefix == name_or_prefix)
    }

    /// Synthetic root whose children are the top-level data nodes
    pub fn root(&self) -> &Arc<SchemaNode> {
        &self.root
    }

    pub fn top_level(&self, name: &str) -> Option<&Arc<SchemaNode>> {
        self.root.child(name)
    }

    /// Find a node by schema path; module prefixes on steps are ignored
    pub fn find(&self, path: &str) -> Option<&Arc<SchemaNode>> {
        let mut node = &self.root;
        for step in path.split('/').filter(|s| !s.is_empty()) {
            let name = step.rsplit_once(':').map(|(_, n)| n).unwrap_or(step);
            node = node.child(name)?;
        }
        if Arc::ptr_eq(node, &self.root) {
            None
        } else {
            Some(node)
        }
    }
}

impl std::str::FromStr for SchemaModule {
    type Err = BindError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_json_str(s)
    }
}

fn invalid(msg: impl Into<String>) -> BindError {
    BindError::InvalidSchema(msg.into())
}

/// Resolves raw module contents into compiled nodes
struct Compiler<'a> {
    modules: Vec<Arc<ModuleInfo>>,
    typedefs: &'a HashMap<String, RawType>,
    leaves: HashMap<String, &'a RawNode>,
    /// Identities keyed by (module, name)
    identities: HashMap<(String, String), Identity>,
    identity_bases: HashMap<(String, String), Vec<(String, String)>>,
    resolving: Vec<String>,
}

impl<'a> Compiler<'a> {
    fn new(raw: &'a RawModule) -> Result<Self> {
        let main = Arc::new(ModuleInfo {
            name: raw.module_name.clone(),
            namespace: raw.namespace.clone(),
            prefix: raw.prefix.clone().unwrap_or_else(|| raw.module_name.clone()),
        });
        let mut modules = vec![main];
        for import in &raw.imports {
            if modules.iter().any(|m| m.name == import.name) {
                return Err(invalid(format!("module '{}' declared twice", import.name)));
            }
            modules.push(Arc::new(ModuleInfo {
                name: import.name.clone(),
                namespace: import.namespace.clone(),
                prefix: import.prefix.clone().unwrap_or_else(|| import.name.clone()),
            }));
        }

        let mut compiler = Self {
            modules,
            typedefs: &raw.typedefs,
            leaves: HashMap::new(),
            identities: HashMap::new(),
            identity_bases: HashMap::new(),
            resolving: Vec::new(),
        };

        for identity in &raw.identities {
            let module = match &identity.module {
                Some(m) => Arc::clone(compiler.module(m)?),
                None => Arc::clone(&compiler.modules[0]),
            };
            let key = (module.name.clone(), identity.name.clone());
            let entry = Identity {
                name: identity.name.clone(),
                module: module.name.clone(),
                namespace: module.namespace.clone(),
                prefix: module.prefix.clone(),
            };
            if compiler.identities.insert(key, entry).is_some() {
                return Err(invalid(format!(
                    "identity '{}:{}' declared twice",
                    module.name, identity.name
                )));
            }
        }
        for identity in &raw.identities {
            let module = match &identity.module {
                Some(m) => compiler.module(m)?.name.clone(),
                None => raw.module_name.clone(),
            };
            let bases = identity
                .base
                .iter()
                .map(|b| compiler.identity_key(b, &module))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| invalid(format!("identity '{}:{}': {}", module, identity.name, e)))?;
            compiler.identity_bases.insert((module, identity.name.clone()), bases);
        }

        fn index<'r>(
            nodes: &'r [RawNode],
            parent: &str,
            out: &mut HashMap<String, &'r RawNode>,
        ) {
            for node in nodes {
                let path = format!("{}/{}", parent, node.name);
                if matches!(node.kind, NodeKind::Leaf | NodeKind::LeafList) {
                    out.insert(path.clone(), node);
                }
                index(&node.children, &path, out);
            }
        }
        index(&raw.nodes, "", &mut compiler.leaves);

        Ok(compiler)
    }

    /// Resolve an identity reference made from `context` module: `prefix:name`
    /// names its module, a bare name means the context module's identity (or
    /// the only identity of that name)
    fn identity_key(&self, reference: &str, context: &str) -> std::result::Result<(String, String), String> {
        if let Some((qualifier, name)) = reference.split_once(':') {
            let module = self
                .modules
                .iter()
                .find(|m| m.name == qualifier || m.prefix == qualifier)
                .ok_or_else(|| format!("unknown module '{}' in identity '{}'", qualifier, reference))?;
            let key = (module.name.clone(), name.to_string());
            return if self.identities.contains_key(&key) {
                Ok(key)
            } else {
                Err(format!("unknown identity '{}'", reference))
            };
        }
        let key = (context.to_string(), reference.to_string());
        if self.identities.contains_key(&key) {
            return Ok(key);
        }
        let mut named = self.identities.keys().filter(|(_, n)| n == reference);
        match (named.next(), named.next()) {
            (Some(key), None) => Ok(key.clone()),
            (Some(_), Some(_)) => Err(format!("identity '{}' is ambiguous; qualify it with a prefix", reference)),
            (None, _) => Err(format!("unknown identity '{}'", reference)),
        }
    }

    fn module(&self, name_or_prefix: &str) -> Result<&Arc<ModuleInfo>> {
        self.modules
            .iter()
            .find(|m| m.name == name_or_prefix || m.prefix == name_or_prefix)
            .ok_or_else(|| invalid(format!("unknown module '{}'", name_or_prefix)))
    }

    fn compile(mut self, raw: &RawModule) -> Result<SchemaModule> {
        let main = Arc::clone(&self.modules[0]);
        let mut children = IndexMap::new();
        for node in &raw.nodes {
            let compiled = self.node(node, "", &main)?;
            if children.insert(node.name.clone(), compiled).is_some() {
                return Err(invalid(format!("duplicate top-level node '{}'", node.name)));
            }
        }
        if children.is_empty() {
            tracing::warn!(module = %raw.module_name, "node-type module declares no data nodes");
        }
        let root = Arc::new(SchemaNode {
            name: String::new(),
            kind: NodeKind::Container,
            path: Arc::from("/"),
            module: Arc::clone(&main),
            type_spec: None,
            default: None,
            presence: false,
            keys: Vec::new(),
            ordering: ListOrdering::Insertion,
            unique: false,
            max_elements: None,
            children,
        });
        tracing::debug!(
            module = %raw.module_name,
            leaves = self.leaves.len(),
            "compiled node-type module"
        );
        Ok(SchemaModule {
            module: main,
            modules: self.modules,
            root,
        })
    }

    fn node(&mut self, raw: &RawNode, parent: &str, parent_module: &Arc<ModuleInfo>) -> Result<Arc<SchemaNode>> {
        let path = format!("{}/{}", parent, raw.name);
        let module = match &raw.module {
            Some(m) => Arc::clone(self.module(m)?),
            None => Arc::clone(parent_module),
        };

        let is_data_leaf = matches!(raw.kind, NodeKind::Leaf | NodeKind::LeafList);
        if is_data_leaf && !raw.children.is_empty() {
            return Err(invalid(format!("{} '{}' cannot have children", raw.kind.as_str(), path)));
        }
        if raw.presence && raw.kind != NodeKind::Container {
            return Err(invalid(format!("presence on non-container '{}'", path)));
        }

        let type_spec = match (&raw.node_type, is_data_leaf) {
            (Some(t), true) => {
                let spec = self.resolve(t, &path).map_err(|e| invalid(format!("{}: {}", path, e)))?;
                check_complete(&spec).map_err(|e| invalid(format!("{}: {}", path, e)))?;
                Some(Arc::new(spec))
            }
            (None, true) => return Err(invalid(format!("{} '{}' has no type", raw.kind.as_str(), path))),
            (Some(_), false) => return Err(invalid(format!("{} '{}' cannot have a type", raw.kind.as_str(), path))),
            (None, false) => None,
        };

        let default = match (&raw.default, raw.kind, &type_spec) {
            (None, _, _) => None,
            (Some(v), NodeKind::Leaf, Some(spec)) => {
                let text = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Some(
                    spec.parse_text(&text)
                        .map_err(|e| invalid(format!("{}: bad default: {}", path, e)))?,
                )
            }
            (Some(_), _, _) => return Err(invalid(format!("default on non-leaf '{}'", path))),
        };

        let mut children = IndexMap::new();
        for child in &raw.children {
            let compiled = self.node(child, &path, &module)?;
            if children.insert(child.name.clone(), compiled).is_some() {
                return Err(invalid(format!("duplicate child '{}' under '{}'", child.name, path)));
            }
        }

        let keys: Vec<String> = match (&raw.key, raw.kind) {
            (Some(k), NodeKind::List) => k.split_whitespace().map(String::from).collect(),
            (None, NodeKind::List) => return Err(invalid(format!("list '{}' has no key", path))),
            (Some(_), _) => return Err(invalid(format!("key on non-list '{}'", path))),
            (None, _) => Vec::new(),
        };
        let mut seen = HashSet::new();
        for key in &keys {
            let ok = children
                .get(key)
                .is_some_and(|c: &Arc<SchemaNode>| c.kind == NodeKind::Leaf && !c.type_spec.as_ref().is_some_and(|t| t.is_empty_type()));
            if !ok || !seen.insert(key) {
                return Err(invalid(format!("list '{}' has bad key '{}'", path, key)));
            }
        }

        let ordering = match raw.ordered_by.as_deref() {
            None | Some("user") => ListOrdering::Insertion,
            Some("system") => ListOrdering::Canonical,
            Some(other) => return Err(invalid(format!("{}: unknown ordered-by '{}'", path, other))),
        };

        Ok(Arc::new(SchemaNode {
            name: raw.name.clone(),
            kind: raw.kind,
            path: Arc::from(path.as_str()),
            module,
            type_spec,
            default,
            presence: raw.presence,
            keys,
            ordering,
            unique: raw.unique,
            max_elements: raw.max_elements,
            children,
        }))
    }

    /// Resolve a type reference in the context of the leaf at `context`
    fn resolve(&mut self, raw: &RawType, context: &str) -> std::result::Result<TypeSpec, String> {
        match raw {
            RawType::Name(name) => self.resolve_name(name, context),
            RawType::Spec(spec) => {
                let mut t = self.resolve_name(&spec.base, context)?;
                if let Some(fd) = spec.fraction_digits {
                    t = t.with_fraction_digits(fd)?;
                }
                if let Some(range) = &spec.range {
                    t = t.with_range(range)?;
                }
                if let Some(length) = &spec.length {
                    t = t.with_length(length)?;
                }
                for p in &spec.pattern {
                    let pattern = match p {
                        RawPattern::Source(s) => Pattern::new(s, false)?,
                        RawPattern::Full { pattern, invert_match } => Pattern::new(pattern, *invert_match)?,
                    };
                    t = t.with_pattern(pattern)?;
                }
                if !spec.enums.is_empty() {
                    let mut next = 0i64;
                    let mut members = Vec::with_capacity(spec.enums.len());
                    for e in &spec.enums {
                        let (name, value) = match e {
                            RawEnum::Name(n) => (n.clone(), next),
                            RawEnum::Full { name, value } => (name.clone(), value.unwrap_or(next)),
                        };
                        if members.iter().any(|m: &EnumMember| m.name == name) {
                            return Err(format!("duplicate enum '{}'", name));
                        }
                        next = value + 1;
                        members.push(EnumMember { name, value });
                    }
                    t = t.with_enums(members)?;
                }
                if !spec.bits.is_empty() {
                    t = t.with_bits(spec.bits.clone())?;
                }
                if !spec.members.is_empty() {
                    let members = spec
                        .members
                        .iter()
                        .map(|m| self.resolve(m, context))
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    t = t.with_members(members)?;
                }
                if let Some(path) = &spec.path {
                    if t.base() != YangType::Leafref {
                        return Err(format!("path on non-leafref type {}", t.name()));
                    }
                    t = self.resolve_leafref(t, path, spec.require_instance.unwrap_or(true), context)?;
                }
                if let Some(base) = &spec.identity {
                    if t.base() != YangType::Identityref {
                        return Err(format!("identity base on type {}", t.name()));
                    }
                    let main = self.modules[0].name.clone();
                    let base_key = self.identity_key(base, &main)?;
                    let allowed = self.derived_identities(&base_key);
                    t = t.with_identities(allowed);
                }
                Ok(t)
            }
        }
    }

    fn resolve_name(&mut self, name: &str, context: &str) -> std::result::Result<TypeSpec, String> {
        if let Some(builtin) = YangType::from_name(name) {
            return Ok(TypeSpec::builtin(builtin));
        }
        let local = strip_prefix(name);
        let typedefs = self.typedefs;
        let raw = typedefs
            .get(local)
            .or_else(|| self.typedefs.get(name))
            .ok_or_else(|| format!("unknown type '{}'", name))?;
        if self.resolving.iter().any(|r| r == name) {
            return Err(format!("typedef '{}' refers to itself", name));
        }
        self.resolving.push(name.to_string());
        let resolved = self.resolve(raw, context);
        self.resolving.pop();
        Ok(resolved?.rename(local))
    }

    fn resolve_leafref(
        &mut self,
        t: TypeSpec,
        path: &str,
        require_instance: bool,
        context: &str,
    ) -> std::result::Result<TypeSpec, String> {
        let target_path = normalize_leafref_path(path, context)?;
        let target: &'a RawNode = self
            .leaves
            .get(&target_path)
            .copied()
            .ok_or_else(|| format!("leafref path '{}' does not resolve to a leaf", path))?;
        let key = format!("leafref:{}", target_path);
        if self.resolving.contains(&key) {
            return Err(format!("leafref cycle through '{}'", target_path));
        }
        let raw_type = target
            .node_type
            .as_ref()
            .ok_or_else(|| format!("leafref target '{}' has no type", target_path))?;
        self.resolving.push(key);
        let target_type = self.resolve(raw_type, &target_path);
        self.resolving.pop();
        Ok(t.with_leafref(Leafref {
            path: target_path,
            require_instance,
            target: Box::new(target_type?),
        }))
    }

    /// Every identity derived (directly or transitively) from `base`
    fn derived_identities(&self, base: &(String, String)) -> Vec<Identity> {
        let mut found: Vec<Identity> = Vec::new();
        let mut frontier = vec![base.clone()];
        while let Some(current) = frontier.pop() {
            let mut keys: Vec<&(String, String)> = self
                .identity_bases
                .iter()
                .filter(|(_, bases)| bases.contains(&current))
                .map(|(key, _)| key)
                .collect();
            keys.sort();
            for key in keys {
                let Some(identity) = self.identities.get(key) else {
                    continue;
                };
                if !found.contains(identity) {
                    found.push(identity.clone());
                    frontier.push(key.clone());
                }
            }
        }
        found
    }
}

fn strip_prefix(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, n)| n).unwrap_or(name)
}

/// Types that need sub-statements to be usable
fn check_complete(t: &TypeSpec) -> std::result::Result<(), String> {
    match t.base() {
        YangType::Enumeration if t.enums().is_empty() => Err("enumeration without enum members".into()),
        YangType::Leafref if t.leafref().is_none() => Err("leafref without path".into()),
        YangType::Union => t.members().iter().try_for_each(check_complete),
        _ => Ok(()),
    }
}

/// Turn an absolute or relative leafref path into a predicate-free schema path
fn normalize_leafref_path(path: &str, context: &str) -> std::result::Result<String, String> {
    let mut without_predicates = String::with_capacity(path.len());
    let mut depth = 0usize;
    for c in path.chars() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            _ if depth == 0 => without_predicates.push(c),
            _ => {}
        }
    }

    let mut segments: Vec<&str> = if without_predicates.starts_with('/') {
        Vec::new()
    } else {
        context.split('/').filter(|s| !s.is_empty()).collect()
    };
    for step in without_predicates.split('/').filter(|s| !s.is_empty()) {
        match step.trim() {
            ".." => {
                segments
                    .pop()
                    .ok_or_else(|| format!("leafref path '{}' climbs above the root", path))?;
            }
            "." => {}
            s => segments.push(strip_prefix(s)),
        }
    }
    Ok(format!("/{}", segments.join("/")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_SCHEMA: &str = r#"{
        "module-name": "example-interfaces",
        "namespace": "urn:example:interfaces",
        "prefix": "if",
        "imports": [{"name": "example-ext", "namespace": "urn:example:ext", "prefix": "ext"}],
        "typedefs": {
            "if-name": {"base": "string", "length": "1..16", "pattern": ["[a-z]+[0-9/]*"]},
            "short-name": {"base": "if-name", "length": "1..8"}
        },
        "identities": [
            {"name": "iface-type"},
            {"name": "ethernet", "base": ["iface-type"]},
            {"name": "fast-ethernet", "base": ["ethernet"]}
        ],
        "nodes": [
            {"name": "interfaces", "kind": "container", "children": [
                {"name": "interface", "kind": "list", "key": "name", "ordered-by": "user", "children": [
                    {"name": "name", "kind": "leaf", "type": "if-name"},
                    {"name": "enabled", "kind": "leaf", "type": "boolean", "default": true},
                    {"name": "type", "kind": "leaf", "type": {"base": "identityref", "identity": "iface-type"}},
                    {"name": "mtu", "kind": "leaf", "module": "ext", "type": {"base": "uint16", "range": "68..9216"}}
                ]}
            ]},
            {"name": "default-interface", "kind": "leaf",
             "type": {"base": "leafref", "path": "/if:interfaces/if:interface/if:name"}}
        ]
    }"#;

    #[test]
    fn test_parse_schema_module() {
        let module: SchemaModule = SAMPLE_SCHEMA.parse().unwrap();

        assert_eq!(module.name(), "example-interfaces");
        assert_eq!(module.namespace(), "urn:example:interfaces");
        assert_eq!(module.modules().count(), 2);
        assert_eq!(module.module_info("ext").unwrap().name, "example-ext");
    }

    #[test]
    fn test_find_and_namespace_inheritance() {
        let module: SchemaModule = SAMPLE_SCHEMA.parse().unwrap();

        let name = module.find("/interfaces/interface/name").unwrap();
        assert_eq!(name.kind(), NodeKind::Leaf);
        assert_eq!(name.namespace(), "urn:example:interfaces");
        assert_eq!(name.type_spec().unwrap().name(), "if-name");

        let mtu = module.find("/if:interfaces/if:interface/ext:mtu").unwrap();
        assert_eq!(mtu.namespace(), "urn:example:ext");
        assert!(module.find("/interfaces/nope").is_none());
        assert!(module.find("/").is_none());
    }

    #[test]
    fn test_typedef_restrictions_accumulate() {
        let module: SchemaModule = SAMPLE_SCHEMA.parse().unwrap();
        let list = module.find("/interfaces/interface").unwrap();
        assert_eq!(list.keys(), ["name".to_string()]);
        assert_eq!(list.ordering(), ListOrdering::Insertion);

        let t = list.child("name").unwrap().type_spec().unwrap();
        assert!(t.parse_text("eth0").is_ok());
        assert!(t.parse_text("ETH0").is_err());
    }

    #[test]
    fn test_defaults_and_identities() {
        let module: SchemaModule = SAMPLE_SCHEMA.parse().unwrap();
        let enabled = module.find("/interfaces/interface/enabled").unwrap();
        assert_eq!(enabled.default(), Some(&YangValue::Bool(true)));

        let t = module.find("/interfaces/interface/type").unwrap().type_spec().unwrap();
        assert!(t.parse_text("fast-ethernet").is_ok());
        assert!(t.parse_text("iface-type").is_err());
    }

    #[test]
    fn test_identities_are_scoped_by_module() {
        let schema = r#"{"module-name": "m", "namespace": "urn:m", "prefix": "m",
            "imports": [{"name": "vendor", "namespace": "urn:vendor", "prefix": "v"}],
            "identities": [
                {"name": "iface-type"},
                {"name": "ethernet", "base": ["iface-type"]},
                {"name": "ethernet", "base": ["m:iface-type"], "module": "vendor"},
                {"name": "turbo", "base": ["ethernet"], "module": "vendor"}
            ],
            "nodes": [{"name": "kind", "kind": "leaf", "type": {"base": "identityref", "identity": "iface-type"}}]}"#;
        let module = SchemaModule::from_json_str(schema).unwrap();
        let t = module.find("/kind").unwrap().type_spec().unwrap();

        assert_eq!(t.parse_text("m:ethernet").unwrap(), YangValue::Identity("m:ethernet".into()));
        assert_eq!(t.parse_text("v:ethernet").unwrap(), YangValue::Identity("vendor:ethernet".into()));
        assert!(t.parse_text("ethernet").is_err(), "bare name matches two modules");
        assert_eq!(t.parse_text("turbo").unwrap(), YangValue::Identity("vendor:turbo".into()));
        assert_eq!(t.identity_in("urn:vendor", "turbo").unwrap().prefix, "v");

        let twice = r#"{"module-name": "m", "namespace": "urn:m",
            "identities": [{"name": "a"}, {"name": "a"}],
            "nodes": [{"name": "x", "kind": "leaf", "type": "string"}]}"#;
        assert!(SchemaModule::from_json_str(twice).is_err());
    }

    #[test]
    fn test_leafref_resolves_target_type() {
        let module: SchemaModule = SAMPLE_SCHEMA.parse().unwrap();
        let t = module.find("/default-interface").unwrap().type_spec().unwrap();
        let lr = t.leafref().unwrap();
        assert_eq!(lr.path, "/interfaces/interface/name");
        assert!(lr.require_instance);
        assert!(t.parse_text("Bad Name").is_err());
    }

    #[test]
    fn test_dangling_references_are_invalid_schema() {
        let dangling_typedef = r#"{"module-name": "m", "namespace": "urn:m",
            "nodes": [{"name": "a", "kind": "leaf", "type": "no-such-type"}]}"#;
        let err = SchemaModule::from_json_str(dangling_typedef).unwrap_err();
        assert!(matches!(err, BindError::InvalidSchema(_)));

        let dangling_leafref = r#"{"module-name": "m", "namespace": "urn:m",
            "nodes": [{"name": "a", "kind": "leaf", "type": {"base": "leafref", "path": "../missing"}}]}"#;
        let err = SchemaModule::from_json_str(dangling_leafref).unwrap_err();
        assert!(matches!(err, BindError::InvalidSchema(_)));

        let self_typedef = r#"{"module-name": "m", "namespace": "urn:m",
            "typedefs": {"loop": "loop"},
            "nodes": [{"name": "a", "kind": "leaf", "type": "loop"}]}"#;
        assert!(SchemaModule::from_json_str(self_typedef).is_err());
    }

    #[test]
    fn test_structural_errors() {
        let keyless = r#"{"module-name": "m", "namespace": "urn:m",
            "nodes": [{"name": "l", "kind": "list", "children": [{"name": "k", "kind": "leaf", "type": "string"}]}]}"#;
        assert!(SchemaModule::from_json_str(keyless).is_err());

        let bad_default = r#"{"module-name": "m", "namespace": "urn:m",
            "nodes": [{"name": "a", "kind": "leaf", "type": "uint8", "default": 300}]}"#;
        assert!(SchemaModule::from_json_str(bad_default).is_err());

        let duplicate = r#"{"module-name": "m", "namespace": "urn:m",
            "nodes": [{"name": "a", "kind": "container"}, {"name": "a", "kind": "container"}]}"#;
        assert!(SchemaModule::from_json_str(duplicate).is_err());
    }

    #[test]
    fn test_relative_leafref_path() {
        assert_eq!(
            normalize_leafref_path("../../interface[name=current()/../x]/name", "/a/interface/x/ref").unwrap(),
            "/a/interface/interface/name"
        );
        assert_eq!(normalize_leafref_path("/p:a/p:b", "/z").unwrap(), "/a/b");
        assert!(normalize_leafref_path("../../..", "/a").is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("example.json");
        std::fs::write(&path, SAMPLE_SCHEMA).unwrap();
        let module = SchemaModule::from_file(&path).unwrap();
        assert!(module.top_level("interfaces").is_some());
    }
}
