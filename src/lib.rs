//! rust-yangbind - typed YANG instance trees with NETCONF XML and RESTCONF JSON codecs
//!
//! A compiled YANG module (a *node-type module*, shipped as JSON) is loaded
//! into a [`SchemaModule`]. From it you instantiate [`DataTree`]s whose nodes
//! enforce YANG types on every assignment, and build one [`PathHelper`] that
//! the XML encoder reuses for every tree of that module.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rust_yangbind::{DataTree, PathHelper, SchemaModule, json, xml};
//!
//! let module = Arc::new(SchemaModule::from_file("example-interfaces.json").unwrap());
//! let helper = PathHelper::new(Arc::clone(&module)).unwrap();
//!
//! let mut tree = DataTree::new(Arc::clone(&module));
//! tree.set("/interfaces/interface[name='eth0']/enabled", "true").unwrap();
//!
//! let doc = xml::encode(&helper, &tree).unwrap();
//! println!("{}", doc.to_string_pretty().unwrap());
//! println!("{}", json::to_string_pretty(&tree, json::JsonMode::Ietf).unwrap());
//!
//! let back = xml::decode(&doc.to_string(), &module, "interfaces").unwrap();
//! assert_eq!(back.get("/interfaces/interface[name='eth0']/enabled").unwrap(),
//!            tree.get("/interfaces/interface[name='eth0']/enabled").unwrap());
//! ```

pub mod document;
mod error;
pub mod instance_path;
pub mod json;
pub mod node;
pub mod path_helper;
pub mod schema;
mod tree;
pub mod types;
mod value;
pub mod xml;

pub use document::{XmlDocument, XmlElement};
pub use error::{BindError, Result};
pub use instance_path::InstancePath;
pub use node::{Container, Leaf, LeafList, List, Node};
pub use path_helper::{IndexEntry, PathHelper, SchemaId, SchemaIndex};
pub use schema::{ListOrdering, NodeKind, SchemaModule, SchemaNode};
pub use tree::DataTree;
pub use types::{TypeSpec, YangType};
pub use value::{Decimal64, TypedValue, YangValue};
