//! NETCONF XML codec
//!
//! Encoding never walks the schema itself: it clones the path helper's
//! skeleton document and fills the copy from the instance tree in four
//! passes (copy, values, namespaces, pruning). Decoding matches elements to
//! schema nodes by local name and namespace and rebuilds a typed tree.

use std::borrow::Cow;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::document::{XmlDocument, XmlElement};
use crate::error::{BindError, Result};
use crate::instance_path::{InstancePath, PathStep};
use crate::node::{Container, Node};
use crate::path_helper::{PathHelper, SchemaIndex};
use crate::schema::{NodeKind, SchemaModule};
use crate::tree::DataTree;
use crate::types::TypeSpec;
use crate::value::YangValue;

/// Output options for [`to_string`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct XmlOptions {
    /// Indent nested elements by two spaces
    pub pretty: bool,
}

/// Serialize a tree into a document whose `root` element wraps every
/// top-level node that holds data.
///
/// Leaves are written only once they have been explicitly set, so untouched
/// defaults never reach the wire. Fails with `InvalidPathHelper` when the
/// helper is empty or was built for a different module than the tree.
pub fn encode(helper: &PathHelper, tree: &DataTree) -> Result<XmlDocument> {
    if helper.library().is_empty() || helper.root().children.is_empty() {
        return Err(BindError::InvalidPathHelper("path helper has no schema index".into()));
    }
    if !Arc::ptr_eq(helper.module(), tree.module()) {
        return Err(BindError::InvalidPathHelper(format!(
            "path helper was built for module {}, tree belongs to {}",
            helper.module().name(),
            tree.module().name()
        )));
    }
    debug!(module = tree.module().name(), "encoding XML");

    let mut root = helper.root().clone();
    fill(&mut root, tree.root(), helper.library())?;
    declare_namespaces(&mut root, None, helper.library());
    prune(&mut root, helper.library());
    Ok(XmlDocument::new(root))
}

/// Encode and serialize in one step
pub fn to_string(helper: &PathHelper, tree: &DataTree, options: XmlOptions) -> Result<String> {
    let doc = encode(helper, tree)?;
    if options.pretty {
        doc.to_string_pretty()
    } else {
        doc.to_xml_string()
    }
}

/// Replace the placeholders under `element` with one element per piece of
/// data in `container`
fn fill(element: &mut XmlElement, container: &Container, library: &SchemaIndex) -> Result<()> {
    let placeholders = std::mem::take(&mut element.children);
    for placeholder in placeholders {
        let entry = placeholder
            .schema_id
            .and_then(|id| library.get(id))
            .ok_or_else(|| BindError::InvalidPathHelper(format!("untagged skeleton element <{}>", placeholder.name)))?;
        let node = container
            .child(&entry.name)
            .map_err(|_| BindError::InvalidPathHelper(format!("skeleton node {} is not in the tree", entry.path)))?;

        match node {
            Node::Leaf(leaf) => match leaf.explicit_value() {
                Some(value) if leaf.changed() => {
                    let mut el = placeholder;
                    if !entry.empty_type {
                        write_value(&mut el, leaf.type_spec(), value);
                    }
                    element.children.push(el);
                }
                _ => trace!(path = %entry.path, "leaf never set, omitted"),
            },
            Node::LeafList(ll) => {
                for value in ll.iter() {
                    let mut el = placeholder.clone();
                    write_value(&mut el, ll.type_spec(), value);
                    element.children.push(el);
                }
            }
            Node::Container(c) => {
                if entry.presence && !c.is_present() {
                    continue;
                }
                let mut el = placeholder;
                fill(&mut el, c, library)?;
                element.children.push(el);
            }
            Node::List(list) => {
                for list_entry in list.iter() {
                    let mut el = placeholder.clone();
                    fill(&mut el, list_entry, library)?;
                    element.children.push(el);
                }
            }
        }
    }
    Ok(())
}

/// Identities are written as `prefix:name`, with the prefix declared on the
/// element carrying them
fn write_value(el: &mut XmlElement, spec: &TypeSpec, value: &YangValue) {
    match spec.identity(value) {
        Some(identity) => {
            el.prefixes.push((identity.prefix.clone(), identity.namespace.clone()));
            el.text = Some(format!("{}:{}", identity.prefix, identity.name));
        }
        None => el.text = Some(value.to_string()),
    }
}

/// Declare a namespace on each top-level element and wherever the module
/// changes from the parent's
fn declare_namespaces(element: &mut XmlElement, parent_ns: Option<&str>, library: &SchemaIndex) {
    for child in &mut element.children {
        let Some(entry) = child.schema_id.and_then(|id| library.get(id)) else {
            continue;
        };
        if entry.is_top_level() || parent_ns != Some(entry.namespace.as_str()) {
            child.namespace = Some(entry.namespace.clone());
        }
        declare_namespaces(child, Some(&entry.namespace), library);
    }
}

/// Drop non-presence containers left without children, bottom-up, and
/// strip the schema tags
fn prune(element: &mut XmlElement, library: &SchemaIndex) {
    for child in &mut element.children {
        prune(child, library);
    }
    element.children.retain_mut(|child| {
        let keep = match child.schema_id.and_then(|id| library.get(id)) {
            Some(entry) if entry.kind == NodeKind::Container && !entry.presence => !child.children.is_empty(),
            _ => true,
        };
        child.schema_id = None;
        keep
    });
}

/// Parse XML text into a new tree.
///
/// `top_name` names the top-level node the document carries. The document
/// element is either that node itself or a wrapper (such as the encoder's
/// `root`, or a NETCONF `data` or `config` element) around top-level nodes.
pub fn decode(xml: &str, module: &Arc<SchemaModule>, top_name: &str) -> Result<DataTree> {
    let doc = XmlDocument::parse(xml)?;
    decode_document(&doc, module, top_name)
}

/// Decode an already parsed document
pub fn decode_document(doc: &XmlDocument, module: &Arc<SchemaModule>, top_name: &str) -> Result<DataTree> {
    let top = module.top_level(top_name).ok_or_else(|| {
        BindError::SchemaViolation(format!("'{}' is not a top-level node of {}", top_name, module.name()))
    })?;
    debug!(module = module.name(), top = top_name, "decoding XML");

    let mut tree = DataTree::new(Arc::clone(module));
    let document_element = doc.root();
    let mut path = InstancePath::new();
    let mut scope = Vec::new();

    if document_element.name == top.name() {
        decode_child(tree.root_mut(), document_element, None, &mut scope, &mut path)?;
    } else if module.top_level(&document_element.name).is_some() {
        return Err(BindError::SchemaViolation(format!(
            "expected <{}>, found <{}>",
            top_name, document_element.name
        )));
    } else {
        let ns = document_element.namespace.as_deref();
        scope.extend(document_element.prefixes.iter().cloned());
        for child in &document_element.children {
            decode_child(tree.root_mut(), child, ns, &mut scope, &mut path)?;
        }
    }

    tree.validate()?;
    Ok(tree)
}

/// Decode one element into the matching child of `container`.
///
/// `scope` holds the namespace prefixes declared on the element's ancestors.
fn decode_child(
    container: &mut Container,
    element: &XmlElement,
    parent_ns: Option<&str>,
    scope: &mut Vec<(String, String)>,
    path: &mut InstancePath,
) -> Result<()> {
    let ns = element.namespace.as_deref().or(parent_ns);
    let schema = container.schema().child(&element.name).cloned().ok_or_else(|| {
        BindError::SchemaViolation(format!("unexpected element <{}> under {}", element.name, path))
    })?;
    if ns != Some(schema.namespace()) {
        return Err(BindError::SchemaViolation(format!(
            "element <{}> under {} is in namespace '{}', expected '{}'",
            element.name,
            path,
            ns.unwrap_or_default(),
            schema.namespace()
        )));
    }

    // Keys were consumed when the entry was created
    if container.schema().kind() == NodeKind::List && container.schema().is_key(&element.name) {
        return Ok(());
    }

    trace!(element = %element.name, "decoding");
    let outer = scope.len();
    scope.extend(element.prefixes.iter().cloned());
    let mut step = PathStep::new(element.name.as_str());
    match container.child_mut(&element.name)? {
        Node::Leaf(leaf) => {
            path.push(step);
            let at = path.to_string();
            path.steps.pop();
            if leaf.changed() {
                return Err(BindError::SchemaViolation(format!("leaf {} appears more than once", at)));
            }
            let text = qualify_identity(leaf.type_spec(), element.text_or_empty(), ns, scope)
                .map_err(|reason| BindError::invalid_value(&at, reason))?;
            leaf.set_str(&text).map_err(|e| e.with_path(&at))?;
        }
        Node::LeafList(ll) => {
            path.push(step);
            let at = path.to_string();
            path.steps.pop();
            let text = qualify_identity(ll.type_spec(), element.text_or_empty(), ns, scope)
                .map_err(|reason| BindError::invalid_value(&at, reason))?;
            ll.append_str(&text).map_err(|e| e.with_path(&at))?;
        }
        Node::Container(c) => {
            if schema.is_presence() {
                c.set_present(true)?;
            }
            path.push(step);
            for child in &element.children {
                decode_child(c, child, ns, scope, path)?;
            }
            path.steps.pop();
        }
        Node::List(list) => {
            let mut keys = Vec::with_capacity(schema.keys().len());
            for key in schema.keys() {
                let key_el = element.child(key).ok_or_else(|| {
                    BindError::SchemaViolation(format!(
                        "entry of list {} under {} lacks key <{}>",
                        element.name,
                        path,
                        key
                    ))
                })?;
                let text = match schema.child(key).and_then(|k| k.type_spec()) {
                    Some(spec) => {
                        let key_scope = [scope.as_slice(), key_el.prefixes.as_slice()].concat();
                        let key_ns = key_el.namespace.as_deref().or(ns);
                        qualify_identity(spec, key_el.text_or_empty(), key_ns, &key_scope)
                            .map_err(|reason| BindError::invalid_value(format!("{}/{}", path, element.name), reason))?
                    }
                    None => Cow::Borrowed(key_el.text_or_empty()),
                };
                step = step.with_key(key.as_str(), key_el.text_or_empty());
                keys.push(YangValue::from(text.into_owned()));
            }
            path.push(step);
            let at = path.to_string();
            let entry = list.add(keys).map_err(|e| e.with_path(&at))?;
            for child in &element.children {
                decode_child(entry, child, ns, scope, path)?;
            }
            path.steps.pop();
        }
    }
    scope.truncate(outer);
    Ok(())
}

/// Turn an identityref's `prefix:name` into `module:name` through the
/// namespace prefixes in scope; a bare name is in the element's namespace.
/// Text of any other type passes through untouched.
fn qualify_identity<'t>(
    spec: &TypeSpec,
    text: &'t str,
    ns: Option<&str>,
    scope: &[(String, String)],
) -> std::result::Result<Cow<'t, str>, String> {
    if !spec.is_identityref() {
        return Ok(Cow::Borrowed(text));
    }
    let (namespace, name) = match text.split_once(':') {
        Some((prefix, name)) => {
            let bound = scope
                .iter()
                .rev()
                .find(|(p, _)| p == prefix)
                .map(|(_, uri)| uri.as_str())
                .ok_or_else(|| format!("prefix '{}' of '{}' is not declared", prefix, text))?;
            (bound, name)
        }
        None => (ns.unwrap_or_default(), text),
    };
    spec.identity_in(namespace, name)
        .map(|identity| Cow::Owned(identity.qualified()))
        .ok_or_else(|| {
            format!(
                "identity '{}' of namespace '{}' is not derived from the base of {}",
                name,
                namespace,
                spec.name()
            )
        })
}
