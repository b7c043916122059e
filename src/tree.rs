//! Model roots: a typed data tree instantiated from a node-type module
//!
//! The `DataTree` owns the instance tree of one module and supports
//! get/set/delete by instance path, the way a datastore does, while every
//! mutation still goes through the typed nodes.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::{BindError, Result};
use crate::instance_path::{InstancePath, PathStep};
use crate::node::{Container, List, Node};
use crate::schema::{NodeKind, SchemaModule, SchemaNode};
use crate::types::Leafref;
use crate::value::YangValue;

/// The root of an instance tree
#[derive(Debug, Clone)]
pub struct DataTree {
    /// The node-type module this tree was instantiated from
    module: Arc<SchemaModule>,
    /// Synthetic root container holding the top-level nodes
    root: Container,
}

impl DataTree {
    /// Instantiate an empty tree for the given module
    pub fn new(module: Arc<SchemaModule>) -> Self {
        let root = Container::new(module.root());
        Self { module, root }
    }

    /// Get the node-type module
    pub fn module(&self) -> &Arc<SchemaModule> {
        &self.module
    }

    /// Root container; its children are the module's top-level nodes
    pub fn root(&self) -> &Container {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Container {
        &mut self.root
    }

    pub fn container(&self, name: &str) -> Result<&Container> {
        self.root.container(name)
    }

    pub fn container_mut(&mut self, name: &str) -> Result<&mut Container> {
        self.root.container_mut(name)
    }

    pub fn list(&self, name: &str) -> Result<&List> {
        self.root.list(name)
    }

    pub fn list_mut(&mut self, name: &str) -> Result<&mut List> {
        self.root.list_mut(name)
    }

    /// True if anything in the tree would be encoded
    pub fn has_data(&self) -> bool {
        self.root.has_data()
    }

    /// Get the current value of a leaf (e.g. "/system/hostname").
    ///
    /// Returns `None` when a list entry on the way does not exist.
    pub fn get(&self, path: &str) -> Result<Option<YangValue>> {
        let parsed = InstancePath::parse(path)?;
        match self.locate(&parsed)? {
            Some(Located::Node(Node::Leaf(leaf))) => Ok(leaf.value().cloned()),
            Some(_) => Err(BindError::SchemaViolation(format!("{} is not a leaf", path))),
            None => Ok(None),
        }
    }

    /// Get the values of a leaf-list, in order
    pub fn values(&self, path: &str) -> Result<Vec<YangValue>> {
        let parsed = InstancePath::parse(path)?;
        match self.locate(&parsed)? {
            Some(Located::Node(Node::LeafList(ll))) => Ok(ll.values().to_vec()),
            Some(_) => Err(BindError::SchemaViolation(format!("{} is not a leaf-list", path))),
            None => Ok(Vec::new()),
        }
    }

    /// Get a container or a list entry
    pub fn entry(&self, path: &str) -> Result<Option<&Container>> {
        let parsed = InstancePath::parse(path)?;
        match self.locate(&parsed)? {
            Some(Located::Node(Node::Container(c))) | Some(Located::Entry(c)) => Ok(Some(c)),
            Some(_) => Err(BindError::SchemaViolation(format!(
                "{} is neither a container nor a list entry",
                path
            ))),
            None => Ok(None),
        }
    }

    /// Set a value by instance path, creating list entries on the way.
    ///
    /// A leaf takes `text` as its lexical value, a leaf-list appends it. A
    /// presence container or a keyed list entry at the end of the path is
    /// created and `text` is ignored. Nothing changes when the call fails,
    /// including list entries the path would have created.
    pub fn set(&mut self, path: &str, text: &str) -> Result<()> {
        let parsed = InstancePath::parse(path)?;
        let keys = self.plan(&parsed)?;
        let steps: Vec<_> = parsed.steps.iter().zip(&keys).collect();
        let Some((&(last, last_keys), parents)) = steps.split_last() else {
            return Err(BindError::SchemaViolation("cannot assign to the tree root".into()));
        };

        let schema = self
            .module
            .find(&parsed.schema_path())
            .ok_or_else(|| BindError::SchemaViolation(format!("no schema node for {}", path)))?;
        let parent_path: String = parents.iter().map(|(s, _)| format!("/{}", s.name)).collect();
        if self
            .module
            .find(&parent_path)
            .is_some_and(|p| p.kind() == NodeKind::List && p.is_key(&last.name))
        {
            return Err(BindError::SchemaViolation(format!("key leaf {} cannot be modified", path)));
        }
        match schema.kind() {
            NodeKind::Container if !schema.is_presence() => {
                return Err(BindError::SchemaViolation(format!("{} is not a presence container", path)));
            }
            NodeKind::List if last_keys.is_none() => {
                return Err(BindError::SchemaViolation(format!("{} needs key predicates", path)));
            }
            _ => {}
        }
        if let Some(spec) = schema.type_spec() {
            let value = spec
                .parse_text(text)
                .map_err(|reason| BindError::invalid_value(path, reason))?;
            if let Some(leafref) = spec.leafref() {
                self.check_leafref(path, leafref, &value)?;
            }
        }

        trace!(path, text, "set");
        // Entries created on the way must not outlive a failed assignment
        let mut staged = self.root.clone();
        let parent = descend(&mut staged, parents, true)?
            .ok_or_else(|| BindError::SchemaViolation(format!("cannot reach {}", path)))?;
        match parent.child_mut(&last.name)? {
            Node::Leaf(leaf) => leaf.set_str(text).map_err(|e| e.with_path(path))?,
            Node::LeafList(ll) => ll.append_str(text).map_err(|e| e.with_path(path))?,
            Node::Container(c) => c.set_present(true)?,
            Node::List(list) => match last_keys {
                Some(keys) if list.get(keys.clone()).is_none() => {
                    list.add(keys.clone())?;
                }
                Some(_) => {}
                None => return Err(BindError::SchemaViolation(format!("{} needs key predicates", path))),
            },
        }
        self.root = staged;
        Ok(())
    }

    /// Delete the node at the given path; returns whether it held data
    pub fn delete(&mut self, path: &str) -> Result<bool> {
        let parsed = InstancePath::parse(path)?;
        let keys = self.plan(&parsed)?;
        let steps: Vec<_> = parsed.steps.iter().zip(&keys).collect();
        let Some((&(last, last_keys), parents)) = steps.split_last() else {
            let had_data = self.root.has_data();
            self.root = Container::new(self.module.root());
            return Ok(had_data);
        };

        let Some(parent) = descend(&mut self.root, parents, false)? else {
            return Ok(false);
        };
        trace!(path, "delete");
        let removed = match parent.child_mut(&last.name)? {
            Node::Leaf(leaf) => {
                let had = leaf.changed();
                leaf.clear();
                had
            }
            Node::LeafList(ll) => {
                let had = !ll.is_empty();
                ll.clear();
                had
            }
            Node::Container(c) => {
                let had = c.is_present();
                let schema = Arc::clone(c.schema());
                *c = Container::new(&schema);
                had
            }
            Node::List(list) => match last_keys {
                Some(keys) => list.remove(keys.clone()),
                None => {
                    let had = !list.is_empty();
                    list.clear();
                    had
                }
            },
        };
        Ok(removed)
    }

    /// Check every leafref that requires an instance against the tree
    pub fn validate(&self) -> Result<()> {
        let mut refs = Vec::new();
        collect_leafrefs(&self.root, &mut InstancePath::new(), &mut refs);
        debug!(module = self.module.name(), leafrefs = refs.len(), "validating tree");
        for (path, leafref, value) in refs {
            self.check_leafref(&path, leafref, value)?;
        }
        Ok(())
    }

    fn check_leafref(&self, path: &str, leafref: &Leafref, value: &YangValue) -> Result<()> {
        if !leafref.require_instance || self.values_at(&leafref.path).contains(&value) {
            return Ok(());
        }
        Err(BindError::invalid_value(
            path,
            format!("no instance of {} has value '{}'", leafref.path, value),
        ))
    }

    /// Every value currently held by the leaves at a schema path
    pub(crate) fn values_at(&self, schema_path: &str) -> Vec<&YangValue> {
        let steps: Vec<&str> = schema_path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| s.rsplit_once(':').map(|(_, n)| n).unwrap_or(s))
            .collect();
        let mut out = Vec::new();
        collect_values(&self.root, &steps, &mut out);
        out
    }

    /// Check names, kinds and key predicates against the schema before any
    /// mutation; yields the typed key tuple for each list step
    fn plan(&self, path: &InstancePath) -> Result<Vec<Option<Vec<YangValue>>>> {
        let mut schema = self.module.root();
        let mut keys = Vec::with_capacity(path.len());
        for (i, step) in path.steps.iter().enumerate() {
            let node = schema.child(&step.name).ok_or_else(|| {
                BindError::SchemaViolation(format!("'{}' is not a child of {}", step.name, schema.path()))
            })?;
            let is_last = i + 1 == path.len();
            match node.kind() {
                NodeKind::List if !step.keys.is_empty() => keys.push(Some(typed_keys(node, step)?)),
                NodeKind::List if !is_last => {
                    return Err(BindError::SchemaViolation(format!(
                        "list {} needs key predicates",
                        node.path()
                    )));
                }
                NodeKind::Leaf | NodeKind::LeafList if !is_last => {
                    return Err(BindError::SchemaViolation(format!("{} has no children", node.path())));
                }
                _ if !step.keys.is_empty() => {
                    return Err(BindError::SchemaViolation(format!(
                        "{} is not a list and takes no predicates",
                        node.path()
                    )));
                }
                _ => keys.push(None),
            }
            schema = node;
        }
        Ok(keys)
    }

    fn locate<'t>(&'t self, path: &InstancePath) -> Result<Option<Located<'t>>> {
        let keys = self.plan(path)?;
        let mut container = &self.root;
        let mut located = None;
        for (step, step_keys) in path.steps.iter().zip(keys) {
            let node = container.child(&step.name)?;
            located = match (node, step_keys) {
                (Node::List(list), Some(keys)) => match list.get(keys) {
                    Some(entry) => {
                        container = entry;
                        Some(Located::Entry(entry))
                    }
                    None => return Ok(None),
                },
                (Node::Container(c), _) => {
                    container = c;
                    Some(Located::Node(node))
                }
                (node, _) => Some(Located::Node(node)),
            };
        }
        Ok(located)
    }
}

enum Located<'t> {
    Node(&'t Node),
    Entry(&'t Container),
}

/// Key predicates reordered into the list's key order and parsed with the
/// key leaves' types
fn typed_keys(list: &SchemaNode, step: &PathStep) -> Result<Vec<YangValue>> {
    if let Some((unknown, _)) = step.keys.iter().find(|(k, _)| !list.is_key(k)) {
        return Err(BindError::SchemaViolation(format!(
            "'{}' is not a key of list {}",
            unknown,
            list.path()
        )));
    }
    list.keys()
        .iter()
        .map(|name| {
            let (_, text) = step
                .keys
                .iter()
                .find(|(k, _)| k == name)
                .ok_or_else(|| BindError::SchemaViolation(format!("missing key '{}' for list {}", name, list.path())))?;
            let leaf = list
                .child(name)
                .ok_or_else(|| BindError::InvalidSchema(format!("list {} lacks key leaf {}", list.path(), name)))?;
            match leaf.type_spec() {
                Some(spec) => spec
                    .parse_text(text)
                    .map_err(|reason| BindError::invalid_value(leaf.path(), reason)),
                None => Ok(YangValue::from(text.as_str())),
            }
        })
        .collect()
}

fn descend<'t>(
    mut container: &'t mut Container,
    steps: &[(&PathStep, &Option<Vec<YangValue>>)],
    create: bool,
) -> Result<Option<&'t mut Container>> {
    for &(step, keys) in steps {
        container = match container.child_mut(&step.name)? {
            Node::Container(c) => c,
            Node::List(list) => {
                let keys = keys
                    .clone()
                    .ok_or_else(|| BindError::SchemaViolation(format!("list {} needs key predicates", step.name)))?;
                if list.get(keys.clone()).is_none() {
                    if !create {
                        return Ok(None);
                    }
                    list.add(keys.clone())?;
                }
                match list.get_mut(keys) {
                    Some(entry) => entry,
                    None => return Ok(None),
                }
            }
            _ => {
                return Err(BindError::SchemaViolation(format!("{} has no children", step.name)));
            }
        };
    }
    Ok(Some(container))
}

fn collect_values<'t>(container: &'t Container, steps: &[&str], out: &mut Vec<&'t YangValue>) {
    let Some((first, rest)) = steps.split_first() else {
        return;
    };
    match container.child(first) {
        Ok(Node::Container(c)) => collect_values(c, rest, out),
        Ok(Node::List(list)) => {
            for entry in list.iter() {
                collect_values(entry, rest, out);
            }
        }
        Ok(Node::Leaf(leaf)) if rest.is_empty() => out.extend(leaf.value()),
        Ok(Node::LeafList(ll)) if rest.is_empty() => out.extend(ll.iter()),
        _ => {}
    }
}

fn collect_leafrefs<'t>(
    container: &'t Container,
    path: &mut InstancePath,
    out: &mut Vec<(String, &'t Leafref, &'t YangValue)>,
) {
    for node in container.iter() {
        match node {
            Node::Leaf(leaf) => {
                if let Some(leafref) = leaf.type_spec().leafref()
                    && let Some(value) = leaf.explicit_value()
                {
                    out.push((child_path(path, leaf.schema().name()), leafref, value));
                }
            }
            Node::LeafList(ll) => {
                if let Some(leafref) = ll.type_spec().leafref() {
                    let at = child_path(path, ll.schema().name());
                    out.extend(ll.iter().map(|v| (at.clone(), leafref, v)));
                }
            }
            Node::Container(c) => {
                path.push(PathStep::new(c.schema().name()));
                collect_leafrefs(c, path, out);
                path.steps.pop();
            }
            Node::List(list) => {
                for entry in list.iter() {
                    let mut step = PathStep::new(list.schema().name());
                    for (key, value) in list.schema().keys().iter().zip(entry.key_values()) {
                        step = step.with_key(key.as_str(), value.to_string());
                    }
                    path.push(step);
                    collect_leafrefs(entry, path, out);
                    path.steps.pop();
                }
            }
        }
    }
}

fn child_path(parent: &InstancePath, name: &str) -> String {
    let mut path = parent.clone();
    path.push(PathStep::new(name));
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_SCHEMA: &str = r#"{
        "module-name": "example-interfaces",
        "namespace": "urn:example:interfaces",
        "prefix": "if",
        "nodes": [
            {"name": "interfaces", "kind": "container", "children": [
                {"name": "interface", "kind": "list", "key": "name", "max-elements": 2, "children": [
                    {"name": "name", "kind": "leaf", "type": "string"},
                    {"name": "enabled", "kind": "leaf", "type": "boolean", "default": "true"},
                    {"name": "address", "kind": "leaf-list", "type": "string"},
                    {"name": "settings", "kind": "container", "children": [
                        {"name": "mtu", "kind": "leaf", "type": "uint16"}
                    ]}
                ]},
                {"name": "primary", "kind": "leaf",
                 "type": {"base": "leafref", "path": "/interfaces/interface/name"}},
                {"name": "loopback", "kind": "container", "presence": true, "children": []}
            ]}
        ]
    }"#;

    fn tree() -> DataTree {
        DataTree::new(Arc::new(SAMPLE_SCHEMA.parse().unwrap()))
    }

    #[test]
    fn test_set_and_get_by_path() {
        let mut tree = tree();
        tree.set("/interfaces/interface[name='eth0']/enabled", "false").unwrap();
        assert_eq!(
            tree.get("/interfaces/interface[name='eth0']/enabled").unwrap(),
            Some(YangValue::Bool(false))
        );
        assert_eq!(tree.get("/interfaces/interface[name='eth1']/enabled").unwrap(), None);

        let entry = tree.entry("/if:interfaces/interface[name='eth0']").unwrap().unwrap();
        assert_eq!(entry.get("name"), Some(&YangValue::from("eth0")));
    }

    #[test]
    fn test_rejected_set_creates_nothing() {
        let mut tree = tree();
        let err = tree.set("/interfaces/interface[name='eth0']/enabled", "maybe").unwrap_err();
        assert!(err.is_invalid_value());
        assert!(!tree.has_data());

        assert!(tree.set("/interfaces/bogus", "1").unwrap_err().is_schema_violation());
        assert!(tree.set("/interfaces/interface/enabled", "true").unwrap_err().is_schema_violation());
    }

    #[test]
    fn test_failed_set_leaves_no_entries_behind() {
        let mut tree = tree();
        let err = tree.set("/interfaces/interface[name='eth0']/settings", "").unwrap_err();
        assert!(err.is_schema_violation());
        assert!(!tree.has_data());
        assert_eq!(tree.get("/interfaces/interface[name='eth0']/enabled").unwrap(), None);

        assert!(tree.set("/interfaces/interface", "").unwrap_err().is_schema_violation());

        tree.set("/interfaces/interface[name='eth0']/address", "10.0.0.1").unwrap();
        tree.set("/interfaces/interface[name='eth1']/address", "10.0.0.2").unwrap();
        let err = tree.set("/interfaces/interface[name='eth2']/address", "10.0.0.3").unwrap_err();
        assert!(err.is_schema_violation(), "max-elements reached");
        assert!(tree.entry("/interfaces/interface[name='eth2']").unwrap().is_none());
    }

    #[test]
    fn test_leaf_list_append_and_delete() {
        let mut tree = tree();
        let path = "/interfaces/interface[name='eth0']/address";
        tree.set(path, "10.0.0.2").unwrap();
        tree.set(path, "10.0.0.1").unwrap();
        assert_eq!(
            tree.values(path).unwrap(),
            vec![YangValue::from("10.0.0.2"), YangValue::from("10.0.0.1")]
        );
        assert!(tree.delete(path).unwrap());
        assert!(tree.values(path).unwrap().is_empty());
        assert!(tree.delete("/interfaces/interface[name='eth0']").unwrap());
        assert!(!tree.delete("/interfaces/interface[name='eth0']").unwrap());
    }

    #[test]
    fn test_leafref_requires_instance() {
        let mut tree = tree();
        let err = tree.set("/interfaces/primary", "eth0").unwrap_err();
        assert!(err.is_invalid_value());

        tree.set("/interfaces/interface[name='eth0']", "").unwrap();
        tree.set("/interfaces/primary", "eth0").unwrap();
        tree.validate().unwrap();

        tree.delete("/interfaces/interface[name='eth0']").unwrap();
        assert!(tree.validate().unwrap_err().is_invalid_value());
    }

    #[test]
    fn test_presence_container_by_path() {
        let mut tree = tree();
        tree.set("/interfaces/loopback", "").unwrap();
        assert!(tree.entry("/interfaces/loopback").unwrap().unwrap().is_present());
        assert!(tree.delete("/interfaces/loopback").unwrap());
        assert!(!tree.has_data());
    }
}
