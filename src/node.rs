//! Instance nodes: the typed, in-memory data tree
//!
//! Every node keeps a handle to its compiled schema node, so structure and
//! types are enforced on each mutation rather than at encode time.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{BindError, Result};
use crate::schema::{ListOrdering, NodeKind, SchemaNode};
use crate::types::{TypeSpec, YangType};
use crate::value::{TypedValue, YangValue};

/// One node of an instance tree
#[derive(Debug, Clone)]
pub enum Node {
    Leaf(Leaf),
    LeafList(LeafList),
    Container(Container),
    List(List),
}

impl Node {
    pub(crate) fn new(schema: &Arc<SchemaNode>) -> Self {
        match schema.kind() {
            NodeKind::Leaf => Node::Leaf(Leaf::new(schema)),
            NodeKind::LeafList => Node::LeafList(LeafList::new(schema)),
            NodeKind::Container => Node::Container(Container::new(schema)),
            NodeKind::List => Node::List(List::new(schema)),
        }
    }

    pub fn schema(&self) -> &Arc<SchemaNode> {
        match self {
            Node::Leaf(n) => &n.schema,
            Node::LeafList(n) => &n.schema,
            Node::Container(n) => &n.schema,
            Node::List(n) => &n.schema,
        }
    }

    pub fn name(&self) -> &str {
        self.schema().name()
    }

    pub fn kind(&self) -> NodeKind {
        self.schema().kind()
    }

    /// True if this node would appear in an encoded document
    pub fn has_data(&self) -> bool {
        match self {
            Node::Leaf(leaf) => leaf.changed(),
            Node::LeafList(ll) => !ll.is_empty(),
            Node::Container(c) => c.is_present(),
            Node::List(list) => !list.is_empty(),
        }
    }

    pub fn as_leaf(&self) -> Option<&Leaf> {
        match self {
            Node::Leaf(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_leaf_list(&self) -> Option<&LeafList> {
        match self {
            Node::LeafList(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_container(&self) -> Option<&Container> {
        match self {
            Node::Container(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&List> {
        match self {
            Node::List(n) => Some(n),
            _ => None,
        }
    }
}

/// A leaf: exactly one typed value
#[derive(Debug, Clone)]
pub struct Leaf {
    schema: Arc<SchemaNode>,
    value: TypedValue,
}

impl Leaf {
    fn new(schema: &Arc<SchemaNode>) -> Self {
        let spec = schema
            .type_spec()
            .cloned()
            .unwrap_or_else(|| Arc::new(TypeSpec::builtin(YangType::String)));
        Self {
            value: TypedValue::new(schema.path_arc(), spec, schema.default().cloned()),
            schema: Arc::clone(schema),
        }
    }

    pub fn schema(&self) -> &Arc<SchemaNode> {
        &self.schema
    }

    pub fn set(&mut self, value: impl Into<YangValue>) -> Result<()> {
        self.value.set(value)
    }

    /// Assign from the lexical form, as found in XML text
    pub fn set_str(&mut self, text: &str) -> Result<()> {
        self.value.set_str(text)
    }

    pub(crate) fn set_json(&mut self, json: &Value) -> Result<()> {
        self.value.set_json(json)
    }

    /// Current value, falling back to the schema default
    pub fn value(&self) -> Option<&YangValue> {
        self.value.get()
    }

    pub fn explicit_value(&self) -> Option<&YangValue> {
        self.value.explicit()
    }

    pub fn changed(&self) -> bool {
        self.value.changed()
    }

    pub fn is_default(&self) -> bool {
        self.value.is_default()
    }

    pub fn clear(&mut self) {
        self.value.clear()
    }

    pub fn typed_value(&self) -> &TypedValue {
        &self.value
    }

    pub fn type_spec(&self) -> &TypeSpec {
        self.value.spec()
    }
}

/// A leaf-list: an ordered sequence of values of one type
#[derive(Debug, Clone)]
pub struct LeafList {
    schema: Arc<SchemaNode>,
    spec: Arc<TypeSpec>,
    values: Vec<YangValue>,
}

impl LeafList {
    fn new(schema: &Arc<SchemaNode>) -> Self {
        let spec = schema
            .type_spec()
            .cloned()
            .unwrap_or_else(|| Arc::new(TypeSpec::builtin(YangType::String)));
        Self {
            schema: Arc::clone(schema),
            spec,
            values: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Arc<SchemaNode> {
        &self.schema
    }

    pub fn type_spec(&self) -> &TypeSpec {
        &self.spec
    }

    /// Validate and append, preserving insertion order
    pub fn append(&mut self, value: impl Into<YangValue>) -> Result<()> {
        let value = self
            .spec
            .coerce(value.into())
            .map_err(|reason| BindError::invalid_value(self.schema.path(), reason))?;
        self.push_checked(value)
    }

    /// Append from the lexical form
    pub fn append_str(&mut self, text: &str) -> Result<()> {
        let value = self
            .spec
            .parse_text(text)
            .map_err(|reason| BindError::invalid_value(self.schema.path(), reason))?;
        self.push_checked(value)
    }

    pub(crate) fn append_json(&mut self, json: &Value) -> Result<()> {
        let value = self
            .spec
            .parse_json(json)
            .map_err(|reason| BindError::invalid_value(self.schema.path(), reason))?;
        self.push_checked(value)
    }

    fn push_checked(&mut self, value: YangValue) -> Result<()> {
        if self.schema.is_unique() && self.values.contains(&value) {
            return Err(BindError::SchemaViolation(format!(
                "duplicate value '{}' in leaf-list {}",
                value,
                self.schema.path()
            )));
        }
        if let Some(max) = self.schema.max_elements()
            && self.values.len() >= max
        {
            return Err(BindError::SchemaViolation(format!(
                "leaf-list {} allows at most {} values",
                self.schema.path(),
                max
            )));
        }
        self.values.push(value);
        Ok(())
    }

    /// Replace all values at once; nothing changes unless every value is valid
    pub fn set_values<V: Into<YangValue>>(&mut self, values: impl IntoIterator<Item = V>) -> Result<()> {
        let mut staged = Self {
            schema: Arc::clone(&self.schema),
            spec: Arc::clone(&self.spec),
            values: Vec::new(),
        };
        for value in values {
            staged.append(value)?;
        }
        self.values = staged.values;
        Ok(())
    }

    /// Remove the first occurrence of a value; returns whether one was removed
    pub fn remove(&mut self, value: impl Into<YangValue>) -> bool {
        let Ok(value) = self.spec.coerce(value.into()) else {
            return false;
        };
        match self.values.iter().position(|v| *v == value) {
            Some(idx) => {
                self.values.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &YangValue> {
        self.values.iter()
    }

    pub fn values(&self) -> &[YangValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear()
    }
}

/// A container, or one entry of a list
#[derive(Debug, Clone)]
pub struct Container {
    schema: Arc<SchemaNode>,
    children: IndexMap<String, Node>,
    present: bool,
}

impl Container {
    pub(crate) fn new(schema: &Arc<SchemaNode>) -> Self {
        Self {
            schema: Arc::clone(schema),
            children: schema
                .children()
                .map(|c| (c.name().to_string(), Node::new(c)))
                .collect(),
            present: false,
        }
    }

    pub fn schema(&self) -> &Arc<SchemaNode> {
        &self.schema
    }

    pub fn child(&self, name: &str) -> Result<&Node> {
        self.children.get(name).ok_or_else(|| self.unknown(name))
    }

    pub fn child_mut(&mut self, name: &str) -> Result<&mut Node> {
        if self.is_list_entry() && self.schema.is_key(name) {
            return Err(BindError::SchemaViolation(format!(
                "key leaf '{}' of {} cannot be modified",
                name,
                self.schema.path()
            )));
        }
        match self.children.get_mut(name) {
            Some(node) => Ok(node),
            None => Err(BindError::SchemaViolation(format!(
                "'{}' is not a child of {}",
                name,
                self.schema.path()
            ))),
        }
    }

    fn unknown(&self, name: &str) -> BindError {
        BindError::SchemaViolation(format!("'{}' is not a child of {}", name, self.schema.path()))
    }

    fn wrong_kind(&self, name: &str, wanted: NodeKind) -> BindError {
        BindError::SchemaViolation(format!(
            "{}/{} is not a {}",
            self.schema.path().trim_end_matches('/'),
            name,
            wanted.as_str()
        ))
    }

    pub fn leaf(&self, name: &str) -> Result<&Leaf> {
        match self.child(name)? {
            Node::Leaf(n) => Ok(n),
            _ => Err(self.wrong_kind(name, NodeKind::Leaf)),
        }
    }

    pub fn leaf_mut(&mut self, name: &str) -> Result<&mut Leaf> {
        let err = self.wrong_kind(name, NodeKind::Leaf);
        match self.child_mut(name)? {
            Node::Leaf(n) => Ok(n),
            _ => Err(err),
        }
    }

    pub fn leaf_list(&self, name: &str) -> Result<&LeafList> {
        match self.child(name)? {
            Node::LeafList(n) => Ok(n),
            _ => Err(self.wrong_kind(name, NodeKind::LeafList)),
        }
    }

    pub fn leaf_list_mut(&mut self, name: &str) -> Result<&mut LeafList> {
        let err = self.wrong_kind(name, NodeKind::LeafList);
        match self.child_mut(name)? {
            Node::LeafList(n) => Ok(n),
            _ => Err(err),
        }
    }

    pub fn container(&self, name: &str) -> Result<&Container> {
        match self.child(name)? {
            Node::Container(n) => Ok(n),
            _ => Err(self.wrong_kind(name, NodeKind::Container)),
        }
    }

    pub fn container_mut(&mut self, name: &str) -> Result<&mut Container> {
        let err = self.wrong_kind(name, NodeKind::Container);
        match self.child_mut(name)? {
            Node::Container(n) => Ok(n),
            _ => Err(err),
        }
    }

    pub fn list(&self, name: &str) -> Result<&List> {
        match self.child(name)? {
            Node::List(n) => Ok(n),
            _ => Err(self.wrong_kind(name, NodeKind::List)),
        }
    }

    pub fn list_mut(&mut self, name: &str) -> Result<&mut List> {
        let err = self.wrong_kind(name, NodeKind::List);
        match self.child_mut(name)? {
            Node::List(n) => Ok(n),
            _ => Err(err),
        }
    }

    /// Shorthand for `leaf_mut(name)?.set(value)`
    pub fn set(&mut self, name: &str, value: impl Into<YangValue>) -> Result<()> {
        self.leaf_mut(name)?.set(value)
    }

    /// Current value of a child leaf (explicit or default)
    pub fn get(&self, name: &str) -> Option<&YangValue> {
        self.leaf(name).ok().and_then(Leaf::value)
    }

    /// Mark a presence container as existing (or not)
    pub fn set_present(&mut self, present: bool) -> Result<()> {
        if !self.schema.is_presence() {
            return Err(BindError::SchemaViolation(format!(
                "{} is not a presence container",
                self.schema.path()
            )));
        }
        self.present = present;
        Ok(())
    }

    /// Presence containers exist once created or once they hold data;
    /// other containers exist only through their descendants
    pub fn is_present(&self) -> bool {
        (self.schema.is_presence() && self.present) || self.has_data()
    }

    /// True if any descendant carries data
    pub fn has_data(&self) -> bool {
        self.children.values().any(Node::has_data)
    }

    /// Children in schema declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.children.values()
    }

    fn is_list_entry(&self) -> bool {
        self.schema.kind() == NodeKind::List
    }

    /// Key values of a list entry, in key order
    pub fn key_values(&self) -> Vec<&YangValue> {
        self.schema
            .keys()
            .iter()
            .filter_map(|k| self.children.get(k).and_then(Node::as_leaf).and_then(Leaf::value))
            .collect()
    }

    fn set_key(&mut self, name: &str, value: YangValue) -> Result<()> {
        match self.children.get_mut(name) {
            Some(Node::Leaf(leaf)) => leaf.set(value),
            _ => Err(self.unknown(name)),
        }
    }
}

/// A keyed list of container-shaped entries
#[derive(Debug, Clone)]
pub struct List {
    schema: Arc<SchemaNode>,
    entries: IndexMap<Vec<YangValue>, Container>,
}

impl List {
    fn new(schema: &Arc<SchemaNode>) -> Self {
        Self {
            schema: Arc::clone(schema),
            entries: IndexMap::new(),
        }
    }

    pub fn schema(&self) -> &Arc<SchemaNode> {
        &self.schema
    }

    /// Validate a key tuple against the key leaves' types
    fn key_tuple<K: Into<YangValue>>(&self, keys: impl IntoIterator<Item = K>) -> Result<Vec<YangValue>> {
        let raw: Vec<YangValue> = keys.into_iter().map(Into::into).collect();
        let names = self.schema.keys();
        if raw.len() != names.len() {
            return Err(BindError::SchemaViolation(format!(
                "list {} expects {} key value(s), got {}",
                self.schema.path(),
                names.len(),
                raw.len()
            )));
        }
        names
            .iter()
            .zip(raw)
            .map(|(name, value)| {
                let key = self
                    .schema
                    .child(name)
                    .ok_or_else(|| BindError::SchemaViolation(format!("missing key leaf {}", name)))?;
                let spec = key
                    .type_spec()
                    .ok_or_else(|| BindError::InvalidSchema(format!("key {} has no type", key.path())))?;
                spec.coerce(value)
                    .map_err(|reason| BindError::invalid_value(key.path(), reason))
            })
            .collect()
    }

    /// Add an entry with the given key values and return it for population
    pub fn add<K: Into<YangValue>>(&mut self, keys: impl IntoIterator<Item = K>) -> Result<&mut Container> {
        let tuple = self.key_tuple(keys)?;
        if self.entries.contains_key(&tuple) {
            return Err(BindError::SchemaViolation(format!(
                "duplicate key {} in list {}",
                format_keys(&tuple),
                self.schema.path()
            )));
        }
        if let Some(max) = self.schema.max_elements()
            && self.entries.len() >= max
        {
            return Err(BindError::SchemaViolation(format!(
                "list {} allows at most {} entries",
                self.schema.path(),
                max
            )));
        }

        let mut entry = Container::new(&self.schema);
        for (name, value) in self.schema.keys().iter().zip(&tuple) {
            entry.set_key(name, value.clone())?;
        }
        let (idx, _) = self.entries.insert_full(tuple, entry);
        Ok(&mut self.entries[idx])
    }

    pub fn get<K: Into<YangValue>>(&self, keys: impl IntoIterator<Item = K>) -> Option<&Container> {
        let tuple = self.key_tuple(keys).ok()?;
        self.entries.get(&tuple)
    }

    pub fn get_mut<K: Into<YangValue>>(&mut self, keys: impl IntoIterator<Item = K>) -> Option<&mut Container> {
        let tuple = self.key_tuple(keys).ok()?;
        self.entries.get_mut(&tuple)
    }

    /// Remove an entry; later entries keep their relative order
    pub fn remove<K: Into<YangValue>>(&mut self, keys: impl IntoIterator<Item = K>) -> bool {
        match self.key_tuple(keys) {
            Ok(tuple) => self.entries.shift_remove(&tuple).is_some(),
            Err(_) => false,
        }
    }

    /// Entries in the list's wire order: insertion order, or key order for
    /// system-ordered lists
    pub fn iter(&self) -> impl Iterator<Item = &Container> {
        let mut entries: Vec<(&Vec<YangValue>, &Container)> = self.entries.iter().collect();
        if self.schema.ordering() == ListOrdering::Canonical {
            entries.sort_by(|a, b| a.0.cmp(b.0));
        }
        entries.into_iter().map(|(_, c)| c)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear()
    }
}

pub(crate) fn format_keys(keys: &[YangValue]) -> String {
    keys.iter()
        .map(|k| format!("'{}'", k))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaModule;

    const SAMPLE_SCHEMA: &str = r#"{
        "module-name": "example-system",
        "namespace": "urn:example:system",
        "nodes": [
            {"name": "system", "kind": "container", "children": [
                {"name": "hostname", "kind": "leaf", "type": {"base": "string", "pattern": ["[a-z][a-z0-9-]*"]}},
                {"name": "dns-server", "kind": "leaf-list", "type": "string", "unique": true, "max-elements": 3},
                {"name": "tag", "kind": "leaf-list", "type": "string"},
                {"name": "ntp", "kind": "container", "presence": true, "children": [
                    {"name": "server", "kind": "leaf", "type": "string"}
                ]},
                {"name": "user", "kind": "list", "key": "name uid", "ordered-by": "system", "children": [
                    {"name": "name", "kind": "leaf", "type": "string"},
                    {"name": "uid", "kind": "leaf", "type": "uint16"},
                    {"name": "shell", "kind": "leaf", "type": "string", "default": "/bin/sh"}
                ]}
            ]}
        ]
    }"#;

    fn system() -> Container {
        let module: SchemaModule = SAMPLE_SCHEMA.parse().unwrap();
        Container::new(module.top_level("system").unwrap())
    }

    #[test]
    fn test_unknown_child_is_schema_violation() {
        let mut sys = system();
        assert!(sys.child("nope").unwrap_err().is_schema_violation());
        assert!(sys.set("nope", "x").unwrap_err().is_schema_violation());
        assert!(sys.leaf("ntp").unwrap_err().is_schema_violation());
    }

    #[test]
    fn test_rejected_leaf_keeps_prior_value() {
        let mut sys = system();
        sys.set("hostname", "router1").unwrap();
        assert!(sys.set("hostname", "Router 1").unwrap_err().is_invalid_value());
        assert_eq!(sys.get("hostname"), Some(&YangValue::from("router1")));
    }

    #[test]
    fn test_leaf_list_order_and_duplicates() {
        let mut sys = system();
        let tags = sys.leaf_list_mut("tag").unwrap();
        for v in ["c", "a", "b", "a"] {
            tags.append(v).unwrap();
        }
        let got: Vec<String> = tags.iter().map(|v| v.to_string()).collect();
        assert_eq!(got, ["c", "a", "b", "a"]);
        assert!(tags.remove("a"));
        assert_eq!(tags.values()[1], YangValue::from("b"));

        let dns = sys.leaf_list_mut("dns-server").unwrap();
        dns.append("10.0.0.1").unwrap();
        assert!(dns.append("10.0.0.1").unwrap_err().is_schema_violation());
        dns.append("10.0.0.2").unwrap();
        dns.append("10.0.0.3").unwrap();
        assert!(dns.append("10.0.0.4").unwrap_err().is_schema_violation());
    }

    #[test]
    fn test_set_values_is_all_or_nothing() {
        let mut sys = system();
        let dns = sys.leaf_list_mut("dns-server").unwrap();
        dns.append("10.0.0.1").unwrap();
        assert!(dns.set_values(["a", "b", "a"]).is_err());
        assert_eq!(dns.len(), 1);
        dns.set_values(["x", "y"]).unwrap();
        assert_eq!(dns.len(), 2);
    }

    #[test]
    fn test_presence_container() {
        let mut sys = system();
        assert!(!sys.container("ntp").unwrap().is_present());
        sys.container_mut("ntp").unwrap().set_present(true).unwrap();
        assert!(sys.container("ntp").unwrap().is_present());
        assert!(sys.has_data());
        assert!(sys.set_present(true).unwrap_err().is_schema_violation());
    }

    #[test]
    fn test_list_keys_and_ordering() {
        let mut sys = system();
        let users = sys.list_mut("user").unwrap();
        users.add([YangValue::from("zed"), YangValue::from(1000u16)]).unwrap();
        users.add([YangValue::from("amy"), YangValue::from("1001")]).unwrap();

        let err = users.add([YangValue::from("amy"), YangValue::from(1001u16)]).unwrap_err();
        assert!(err.is_schema_violation());
        assert!(users.add(["only-one"]).unwrap_err().is_schema_violation());
        assert!(users.add(["bob", "not-a-number"]).unwrap_err().is_invalid_value());

        // system-ordered: canonical key order regardless of insertion
        let names: Vec<String> = users.iter().map(|e| e.get("name").unwrap().to_string()).collect();
        assert_eq!(names, ["amy", "zed"]);

        let amy = users.get(["amy", "1001"]).unwrap();
        assert_eq!(amy.get("shell"), Some(&YangValue::from("/bin/sh")));
        assert!(!amy.leaf("shell").unwrap().changed());
        assert_eq!(amy.key_values(), [&YangValue::from("amy"), &YangValue::Uint(1001)]);
    }

    #[test]
    fn test_list_key_leaves_are_immutable() {
        let mut sys = system();
        let users = sys.list_mut("user").unwrap();
        let entry = users.add(["amy", "1"]).unwrap();
        assert!(entry.set("name", "bob").unwrap_err().is_schema_violation());
        entry.set("shell", "/bin/zsh").unwrap();
        assert!(users.remove(["amy", "1"]));
        assert!(!users.remove(["amy", "1"]));
        assert!(users.is_empty());
    }
}
