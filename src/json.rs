//! RESTCONF JSON codec (RFC 7951)
//!
//! The same elision, ordering and presence rules as the XML codec apply:
//! leaves appear once explicitly set, leaf-lists and lists keep their order,
//! containers appear only when they exist.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::error::{BindError, Result};
use crate::instance_path::{InstancePath, PathStep};
use crate::node::{Container, Node};
use crate::schema::{NodeKind, SchemaModule, SchemaNode};
use crate::tree::DataTree;
use crate::types::TypeSpec;
use crate::value::YangValue;

/// JSON flavour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JsonMode {
    /// RFC 7951: member names qualified with the module name at the top level
    /// and wherever the module changes, lists as arrays
    #[default]
    Ietf,
    /// Unqualified member names, lists as objects keyed by their
    /// space-joined key values
    Default,
}

/// Encode a tree as a JSON object holding its top-level nodes
pub fn encode(tree: &DataTree, mode: JsonMode) -> Value {
    debug!(module = tree.module().name(), ?mode, "encoding JSON");
    Value::Object(encode_container(tree.root(), None, mode))
}

/// Encode into compact JSON text
pub fn to_string(tree: &DataTree, mode: JsonMode) -> Result<String> {
    Ok(serde_json::to_string(&encode(tree, mode))?)
}

/// Encode into indented JSON text
pub fn to_string_pretty(tree: &DataTree, mode: JsonMode) -> Result<String> {
    Ok(serde_json::to_string_pretty(&encode(tree, mode))?)
}

fn encode_container(container: &Container, parent_module: Option<&str>, mode: JsonMode) -> Map<String, Value> {
    let mut members = Map::new();
    for node in container.iter() {
        if !node.has_data() {
            continue;
        }
        let schema = node.schema();
        let module = schema.module().name.as_str();
        let name = match mode {
            JsonMode::Ietf if parent_module != Some(module) => format!("{}:{}", module, schema.name()),
            _ => schema.name().to_string(),
        };

        let value = match node {
            Node::Leaf(leaf) => match leaf.explicit_value() {
                Some(value) => scalar(leaf.type_spec(), value, mode),
                None => continue,
            },
            Node::LeafList(ll) => Value::Array(ll.iter().map(|v| scalar(ll.type_spec(), v, mode)).collect()),
            Node::Container(c) => Value::Object(encode_container(c, Some(module), mode)),
            Node::List(list) => match mode {
                JsonMode::Ietf => Value::Array(
                    list.iter()
                        .map(|entry| Value::Object(encode_container(entry, Some(module), mode)))
                        .collect(),
                ),
                JsonMode::Default => Value::Object(
                    list.iter()
                        .map(|entry| {
                            let key = entry
                                .key_values()
                                .iter()
                                .map(|k| k.to_string())
                                .collect::<Vec<_>>()
                                .join(" ");
                            (key, Value::Object(encode_container(entry, Some(module), mode)))
                        })
                        .collect(),
                ),
            },
        };
        members.insert(name, value);
    }
    members
}

fn scalar(spec: &TypeSpec, value: &YangValue, mode: JsonMode) -> Value {
    match (mode, value) {
        (JsonMode::Default, YangValue::Identity(qualified)) => {
            Value::String(unqualified(qualified).to_string())
        }
        _ => spec.to_json(value),
    }
}

/// Decode RFC 7951 JSON text into a new tree
pub fn decode(json: &str, module: &Arc<SchemaModule>, top_name: &str) -> Result<DataTree> {
    decode_with(json, module, top_name, JsonMode::Ietf)
}

/// Decode JSON text in the given flavour
pub fn decode_with(json: &str, module: &Arc<SchemaModule>, top_name: &str, mode: JsonMode) -> Result<DataTree> {
    let value: Value = serde_json::from_str(json)?;
    decode_value(&value, module, top_name, mode)
}

/// Decode an already parsed JSON value.
///
/// The value is either an object of top-level members (as produced by
/// [`encode`]) or the bare body of the `top_name` node.
pub fn decode_value(value: &Value, module: &Arc<SchemaModule>, top_name: &str, mode: JsonMode) -> Result<DataTree> {
    let top = module.top_level(top_name).ok_or_else(|| {
        BindError::SchemaViolation(format!("'{}' is not a top-level node of {}", top_name, module.name()))
    })?;
    let object = value
        .as_object()
        .ok_or_else(|| BindError::SchemaViolation("JSON document must be an object".into()))?;
    debug!(module = module.name(), top = top_name, ?mode, "decoding JSON");

    let mut tree = DataTree::new(Arc::clone(module));
    let mut path = InstancePath::new();
    let wrapped = object
        .keys()
        .all(|member| module.top_level(unqualified(member)).is_some());

    let decoder = Decoder {
        module: module.as_ref(),
        mode,
    };
    if wrapped {
        decoder.members(tree.root_mut(), object, None, &mut path)?;
    } else {
        decoder.member(tree.root_mut(), top, value, &mut path)?;
    }

    tree.validate()?;
    Ok(tree)
}

fn unqualified(member: &str) -> &str {
    member.rsplit_once(':').map(|(_, n)| n).unwrap_or(member)
}

struct Decoder<'a> {
    module: &'a SchemaModule,
    mode: JsonMode,
}

impl Decoder<'_> {
    fn members(
        &self,
        container: &mut Container,
        object: &Map<String, Value>,
        parent_module: Option<&str>,
        path: &mut InstancePath,
    ) -> Result<()> {
        for (member, value) in object {
            let schema = self.resolve(container.schema(), member, parent_module, path)?;
            if container.schema().kind() == NodeKind::List && container.schema().is_key(schema.name()) {
                continue;
            }
            self.member(container, &schema, value, path)?;
        }
        Ok(())
    }

    /// Map a member name onto a child schema node, honoring module qualification
    fn resolve(
        &self,
        parent: &SchemaNode,
        member: &str,
        parent_module: Option<&str>,
        path: &InstancePath,
    ) -> Result<Arc<SchemaNode>> {
        let (prefix, name) = match member.split_once(':') {
            Some((prefix, name)) => (Some(prefix), name),
            None => (None, member),
        };
        let schema = parent
            .child(name)
            .ok_or_else(|| BindError::SchemaViolation(format!("unexpected member '{}' under {}", member, path)))?;
        let module = schema.module().name.as_str();
        match prefix {
            Some(prefix) => {
                let qualified = self.module.module_info(prefix).map(|m| m.name.as_str());
                if qualified != Some(module) {
                    return Err(BindError::SchemaViolation(format!(
                        "member '{}' under {} names the wrong module (expected '{}')",
                        member, path, module
                    )));
                }
            }
            None if self.mode == JsonMode::Ietf && parent_module.is_some_and(|p| p != module) => {
                return Err(BindError::SchemaViolation(format!(
                    "member '{}' under {} must be qualified with '{}'",
                    member, path, module
                )));
            }
            None => {}
        }
        Ok(Arc::clone(schema))
    }

    fn member(
        &self,
        container: &mut Container,
        schema: &Arc<SchemaNode>,
        value: &Value,
        path: &mut InstancePath,
    ) -> Result<()> {
        trace!(member = schema.name(), "decoding");
        let module = schema.module().name.as_str();
        let step = PathStep::new(schema.name());
        match container.child_mut(schema.name())? {
            Node::Leaf(leaf) => {
                let at = child_path(path, step);
                if leaf.changed() {
                    return Err(BindError::SchemaViolation(format!("leaf {} appears more than once", at)));
                }
                leaf.set_json(value).map_err(|e| e.with_path(&at))?;
            }
            Node::LeafList(ll) => {
                let at = child_path(path, step);
                let items = value
                    .as_array()
                    .ok_or_else(|| BindError::SchemaViolation(format!("leaf-list {} expects an array", at)))?;
                for item in items {
                    ll.append_json(item).map_err(|e| e.with_path(&at))?;
                }
            }
            Node::Container(c) => {
                path.push(step);
                let object = value
                    .as_object()
                    .ok_or_else(|| BindError::SchemaViolation(format!("container {} expects an object", path)))?;
                if schema.is_presence() {
                    c.set_present(true)?;
                }
                self.members(c, object, Some(module), path)?;
                path.steps.pop();
            }
            Node::List(list) => {
                let entries: Vec<&Value> = match value {
                    Value::Array(items) => items.iter().collect(),
                    Value::Object(map) if self.mode == JsonMode::Default => map.values().collect(),
                    _ => {
                        return Err(BindError::SchemaViolation(format!(
                            "list {} expects an array",
                            child_path(path, step)
                        )));
                    }
                };
                for entry in entries {
                    let object = entry.as_object().ok_or_else(|| {
                        BindError::SchemaViolation(format!("entries of list {} must be objects", schema.path()))
                    })?;

                    let mut entry_step = step.clone();
                    let mut keys = Vec::with_capacity(schema.keys().len());
                    for key in schema.keys() {
                        let raw = object
                            .get(key.as_str())
                            .or_else(|| object.get(&format!("{}:{}", module, key)))
                            .ok_or_else(|| {
                                BindError::SchemaViolation(format!(
                                    "entry of list {} under {} lacks key '{}'",
                                    schema.name(),
                                    path,
                                    key
                                ))
                            })?;
                        let leaf = schema.child(key).ok_or_else(|| {
                            BindError::InvalidSchema(format!("list {} lacks key leaf {}", schema.path(), key))
                        })?;
                        let spec = leaf
                            .type_spec()
                            .ok_or_else(|| BindError::InvalidSchema(format!("key {} has no type", leaf.path())))?;
                        let typed = spec
                            .parse_json(raw)
                            .map_err(|reason| BindError::invalid_value(child_path(path, entry_step.clone()), reason))?;
                        entry_step = entry_step.with_key(key.as_str(), typed.to_string());
                        keys.push(typed);
                    }

                    path.push(entry_step);
                    let at = path.to_string();
                    let created = list.add(keys).map_err(|e| e.with_path(&at))?;
                    self.members(created, object, Some(module), path)?;
                    path.steps.pop();
                }
            }
        }
        Ok(())
    }
}

fn child_path(parent: &InstancePath, step: PathStep) -> String {
    let mut path = parent.clone();
    path.push(step);
    path.to_string()
}
