//! Path helper: the schema index and skeleton document encoders work from
//!
//! A `PathHelper` is built once per node-type module. It walks the compiled
//! schema and records, for every data node, one entry in the `SchemaIndex`
//! (the "library") and one element in the skeleton document. Skeleton
//! elements carry the `SchemaId` of their schema node and no values; the XML
//! encoder clones the skeleton and fills it in.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::document::XmlElement;
use crate::error::{BindError, Result};
use crate::node::Node;
use crate::schema::{NodeKind, SchemaModule, SchemaNode};
use crate::value::YangValue;

/// Identity of a schema node within one path helper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(usize);

impl SchemaId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// What the encoder needs to know about one schema node
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    /// Schema path, e.g. `/interfaces/interface/name`
    pub path: String,
    pub name: String,
    /// Name of the module defining the node
    pub module: String,
    pub namespace: String,
    pub kind: NodeKind,
    /// Declared type name for leaves and leaf-lists (typedef or builtin)
    pub type_name: Option<String>,
    pub default: Option<YangValue>,
    pub presence: bool,
    /// Leaf of type `empty`
    pub empty_type: bool,
    pub parent: Option<SchemaId>,
}

impl IndexEntry {
    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }
}

/// Arena of index entries, addressable by `SchemaId` or schema path
#[derive(Debug, Clone, Default)]
pub struct SchemaIndex {
    entries: Vec<IndexEntry>,
    by_path: HashMap<String, SchemaId>,
}

impl SchemaIndex {
    pub fn get(&self, id: SchemaId) -> Option<&IndexEntry> {
        self.entries.get(id.0)
    }

    /// Look an entry up by schema path
    pub fn lookup(&self, path: &str) -> Option<SchemaId> {
        self.by_path.get(path).copied()
    }

    pub fn entry(&self, path: &str) -> Option<&IndexEntry> {
        self.lookup(path).and_then(|id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SchemaId, &IndexEntry)> {
        self.entries.iter().enumerate().map(|(i, e)| (SchemaId(i), e))
    }

    fn insert(&mut self, entry: IndexEntry) -> SchemaId {
        let id = SchemaId(self.entries.len());
        self.by_path.insert(entry.path.clone(), id);
        self.entries.push(entry);
        id
    }
}

/// Schema index plus skeleton document for one node-type module.
///
/// Immutable once built; share it behind an `Arc` to encode trees from
/// several threads.
#[derive(Debug, Clone)]
pub struct PathHelper {
    module: Arc<SchemaModule>,
    skeleton: XmlElement,
    library: SchemaIndex,
}

impl PathHelper {
    /// Build the index and skeleton for a module.
    ///
    /// Fails with `InvalidSchema` when the module declares no data nodes or a
    /// leaf has no resolved type.
    pub fn new(module: Arc<SchemaModule>) -> Result<Self> {
        let mut library = SchemaIndex::default();
        let mut skeleton = XmlElement::new("root");
        for node in module.root().children() {
            skeleton.children.push(register(&mut library, node, None)?);
        }
        if library.is_empty() {
            return Err(BindError::InvalidSchema(format!(
                "module {} declares no data nodes",
                module.name()
            )));
        }
        debug!(module = module.name(), nodes = library.len(), "built path helper");
        Ok(Self {
            module,
            skeleton,
            library,
        })
    }

    pub fn module(&self) -> &Arc<SchemaModule> {
        &self.module
    }

    /// The skeleton document; its children are the top-level nodes
    pub fn root(&self) -> &XmlElement {
        &self.skeleton
    }

    /// The schema index
    pub fn library(&self) -> &SchemaIndex {
        &self.library
    }

    /// Index entry for a live instance node
    pub fn index_of(&self, node: &Node) -> Option<&IndexEntry> {
        self.entry_for(node.schema())
    }

    pub fn entry_for(&self, schema: &SchemaNode) -> Option<&IndexEntry> {
        self.library.entry(schema.path())
    }
}

fn register(library: &mut SchemaIndex, node: &Arc<SchemaNode>, parent: Option<SchemaId>) -> Result<XmlElement> {
    let type_spec = match node.kind() {
        NodeKind::Leaf | NodeKind::LeafList => Some(node.type_spec().ok_or_else(|| {
            BindError::InvalidSchema(format!("{} {} has no resolved type", node.kind().as_str(), node.path()))
        })?),
        NodeKind::Container | NodeKind::List => None,
    };

    let id = library.insert(IndexEntry {
        path: node.path().to_string(),
        name: node.name().to_string(),
        module: node.module().name.clone(),
        namespace: node.namespace().to_string(),
        kind: node.kind(),
        type_name: type_spec.map(|t| t.name().to_string()),
        default: node.default().cloned(),
        presence: node.is_presence(),
        empty_type: type_spec.is_some_and(|t| t.is_empty_type()),
        parent,
    });

    let mut element = XmlElement::new(node.name());
    element.schema_id = Some(id);

    // List keys lead each entry
    let keys = node.keys().iter().filter_map(|k| node.child(k));
    let rest = node.children().filter(|c| !node.is_key(c.name()));
    for child in keys.chain(rest) {
        element.children.push(register(library, child, Some(id))?);
    }
    Ok(element)
}
