//! Integration tests using an embedded node-type module

use std::sync::Arc;
use std::thread;

use rust_yangbind::json::{self, JsonMode};
use rust_yangbind::xml::{self, XmlOptions};
use rust_yangbind::{BindError, DataTree, List, PathHelper, SchemaModule, XmlDocument, YangValue};

const SAMPLE_SCHEMA: &str = r#"{
    "module-name": "example-interfaces",
    "namespace": "urn:example:interfaces",
    "prefix": "if",
    "imports": [
        {"name": "example-ip", "namespace": "urn:example:ip", "prefix": "ip"}
    ],
    "typedefs": {
        "if-name": {"base": "string", "length": "1..16", "pattern": ["[a-z]+[0-9]+(/[0-9]+)*"]}
    },
    "nodes": [
        {"name": "interfaces", "kind": "container", "children": [
            {"name": "interface", "kind": "list", "key": "name", "children": [
                {"name": "name", "kind": "leaf", "type": "if-name"},
                {"name": "description", "kind": "leaf", "type": "string"},
                {"name": "enabled", "kind": "leaf", "type": "boolean", "default": true},
                {"name": "mtu", "kind": "leaf", "type": {"base": "uint16", "range": "68..9216"}, "default": 1500},
                {"name": "tag", "kind": "leaf-list", "type": "string"},
                {"name": "ipv4", "kind": "container", "module": "example-ip", "children": [
                    {"name": "forwarding", "kind": "leaf", "type": "boolean"},
                    {"name": "address", "kind": "list", "key": "ip", "children": [
                        {"name": "ip", "kind": "leaf", "type": "string"},
                        {"name": "prefix-length", "kind": "leaf", "type": {"base": "uint8", "range": "0..32"}},
                        {"name": "origin-interface", "kind": "leaf", "module": "example-interfaces",
                         "type": {"base": "leafref", "path": "/interfaces/interface/name"}}
                    ]}
                ]}
            ]}
        ]},
        {"name": "maintenance", "kind": "container", "presence": true, "children": [
            {"name": "window", "kind": "leaf", "type": "string"}
        ]}
    ]
}"#;

fn setup() -> (Arc<SchemaModule>, PathHelper) {
    let module: Arc<SchemaModule> = Arc::new(SAMPLE_SCHEMA.parse().expect("Failed to parse schema"));
    let helper = PathHelper::new(Arc::clone(&module)).expect("Failed to build path helper");
    (module, helper)
}

fn populated(module: &Arc<SchemaModule>) -> DataTree {
    let mut tree = DataTree::new(Arc::clone(module));
    let interfaces = interfaces(&mut tree);
    let eth0 = interfaces.add(["eth0"]).unwrap();
    eth0.set("description", "uplink <core>").unwrap();
    eth0.set("enabled", true).unwrap();
    eth0.leaf_list_mut("tag").unwrap().set_values(["zeta", "alpha", "mu"]).unwrap();
    let ipv4 = eth0.container_mut("ipv4").unwrap();
    ipv4.set("forwarding", false).unwrap();
    let addr = ipv4.list_mut("address").unwrap().add(["192.0.2.1"]).unwrap();
    addr.set("prefix-length", 24u8).unwrap();
    addr.set("origin-interface", "eth0").unwrap();

    interfaces.add(["eth1"]).unwrap().set("mtu", 9000u16).unwrap();
    tree
}

fn interfaces(tree: &mut DataTree) -> &mut List {
    tree.container_mut("interfaces").unwrap().list_mut("interface").unwrap()
}

#[test]
fn test_enabled_interface_scenario() {
    let (module, helper) = setup();
    let mut tree = DataTree::new(Arc::clone(&module));
    interfaces(&mut tree)
        .add(["eth0"])
        .unwrap()
        .set("enabled", false)
        .unwrap();

    let doc = xml::encode(&helper, &tree).unwrap();
    let root = doc.root();
    assert_eq!(root.name, "root");
    assert_eq!(root.children.len(), 1);

    let interfaces = &root.children[0];
    assert_eq!(interfaces.name, "interfaces");
    assert_eq!(interfaces.namespace.as_deref(), Some("urn:example:interfaces"));

    let interface = interfaces.child("interface").unwrap();
    let children: Vec<(&str, Option<&str>)> = interface
        .children
        .iter()
        .map(|c| (c.name.as_str(), c.text.as_deref()))
        .collect();
    assert_eq!(children, [("name", Some("eth0")), ("enabled", Some("false"))]);

    let text = xml::to_string(&helper, &tree, XmlOptions::default()).unwrap();
    assert!(text.contains("<enabled>false</enabled>"), "{}", text);
}

#[test]
fn test_xml_roundtrip_is_idempotent() {
    let (module, helper) = setup();
    let tree = populated(&module);

    let first = xml::to_string(&helper, &tree, XmlOptions::default()).unwrap();
    println!("XML: {}", first);
    let decoded = xml::decode(&first, &module, "interfaces").unwrap();
    let second = xml::to_string(&helper, &decoded, XmlOptions::default()).unwrap();
    assert_eq!(first, second);

    assert_eq!(
        XmlDocument::parse(&first).unwrap(),
        xml::encode(&helper, &decoded).unwrap()
    );
}

#[test]
fn test_json_roundtrip_is_idempotent() {
    let (module, _) = setup();
    let tree = populated(&module);

    let first = json::to_string_pretty(&tree, JsonMode::Ietf).unwrap();
    println!("JSON: {}", first);
    let decoded = json::decode(&first, &module, "interfaces").unwrap();
    assert_eq!(json::to_string_pretty(&decoded, JsonMode::Ietf).unwrap(), first);

    let value = json::encode(&tree, JsonMode::Ietf);
    let eth0 = &value["example-interfaces:interfaces"]["interface"][0];
    assert_eq!(eth0["example-ip:ipv4"]["address"][0]["prefix-length"], 24);
    assert_eq!(eth0["example-ip:ipv4"]["address"][0]["example-interfaces:origin-interface"], "eth0");
}

#[test]
fn test_xml_and_json_carry_the_same_tree() {
    let (module, helper) = setup();
    let tree = populated(&module);

    let from_xml = xml::decode(&xml::encode(&helper, &tree).unwrap().to_string(), &module, "interfaces").unwrap();
    let from_json = json::decode(&json::to_string(&tree, JsonMode::Ietf).unwrap(), &module, "interfaces").unwrap();
    assert_eq!(
        json::encode(&from_xml, JsonMode::Ietf),
        json::encode(&from_json, JsonMode::Ietf)
    );
}

#[test]
fn test_defaults_are_elided_until_set() {
    let (module, helper) = setup();
    let mut tree = DataTree::new(Arc::clone(&module));
    interfaces(&mut tree).add(["eth0"]).unwrap();

    let doc = xml::encode(&helper, &tree).unwrap();
    let interface = doc.root().find("interfaces/interface").unwrap();
    assert!(interface.child("enabled").is_none());
    assert!(interface.child("mtu").is_none());
    assert_eq!(
        tree.get("/interfaces/interface[name='eth0']/mtu").unwrap(),
        Some(YangValue::Uint(1500))
    );

    // Explicitly writing the default value still counts as a change
    tree.set("/interfaces/interface[name='eth0']/mtu", "1500").unwrap();
    let doc = xml::encode(&helper, &tree).unwrap();
    let mtu = doc.root().find("interfaces/interface/mtu").unwrap();
    assert_eq!(mtu.text.as_deref(), Some("1500"));

    let leaf = interfaces(&mut tree).get(["eth0"]).unwrap().leaf("mtu").unwrap();
    assert!(leaf.changed());
    assert!(leaf.is_default());
}

#[test]
fn test_leaf_list_order_survives_both_codecs() {
    let (module, helper) = setup();
    let tree = populated(&module);
    let path = "/interfaces/interface[name='eth0']/tag";
    let expected = vec![YangValue::from("zeta"), YangValue::from("alpha"), YangValue::from("mu")];

    let xml_text = xml::encode(&helper, &tree).unwrap().to_string();
    let reparsed = XmlDocument::parse(&xml_text).unwrap();
    let tags: Vec<&str> = reparsed
        .root()
        .find("interfaces/interface")
        .unwrap()
        .children_named("tag")
        .map(|t| t.text_or_empty())
        .collect();
    assert_eq!(tags, ["zeta", "alpha", "mu"]);
    assert_eq!(xml::decode(&xml_text, &module, "interfaces").unwrap().values(path).unwrap(), expected);

    let json_text = json::to_string(&tree, JsonMode::Ietf).unwrap();
    assert_eq!(json::decode(&json_text, &module, "interfaces").unwrap().values(path).unwrap(), expected);
}

#[test]
fn test_namespace_declared_at_every_module_change() {
    let (module, helper) = setup();
    let tree = populated(&module);
    let doc = xml::encode(&helper, &tree).unwrap();

    let interface = doc.root().find("interfaces/interface").unwrap();
    assert_eq!(interface.namespace, None);
    let ipv4 = interface.child("ipv4").unwrap();
    assert_eq!(ipv4.namespace.as_deref(), Some("urn:example:ip"));
    assert_eq!(ipv4.child("forwarding").unwrap().namespace, None);

    let address = ipv4.child("address").unwrap();
    assert_eq!(address.namespace, None);
    assert_eq!(address.child("ip").unwrap().namespace, None);
    assert_eq!(
        address.child("origin-interface").unwrap().namespace.as_deref(),
        Some("urn:example:interfaces")
    );
}

#[test]
fn test_container_pruning_and_presence() {
    let (module, helper) = setup();
    let mut tree = DataTree::new(Arc::clone(&module));
    interfaces(&mut tree).add(["eth0"]).unwrap();

    let doc = xml::encode(&helper, &tree).unwrap();
    assert!(doc.root().find("interfaces/interface/ipv4").is_none());
    assert!(doc.root().child("maintenance").is_none());

    tree.set("/maintenance", "").unwrap();
    let doc = xml::encode(&helper, &tree).unwrap();
    let maintenance = doc.root().child("maintenance").unwrap();
    assert!(maintenance.children.is_empty());
    assert_eq!(
        json::encode(&tree, JsonMode::Ietf)["example-interfaces:maintenance"],
        serde_json::json!({})
    );

    let decoded = xml::decode(&doc.to_string(), &module, "maintenance").unwrap();
    assert!(decoded.container("maintenance").unwrap().is_present());
}

#[test]
fn test_rejected_set_leaves_serialization_unchanged() {
    let (module, helper) = setup();
    let mut tree = populated(&module);
    let before_xml = xml::to_string(&helper, &tree, XmlOptions::default()).unwrap();
    let before_json = json::to_string(&tree, JsonMode::Ietf).unwrap();

    let eth0 = interfaces(&mut tree).get_mut(["eth0"]).unwrap();
    assert!(eth0.set("mtu", 20u16).unwrap_err().is_invalid_value());
    assert!(eth0.set("enabled", "yes").unwrap_err().is_invalid_value());
    assert!(eth0.set("name", "eth9").unwrap_err().is_schema_violation());
    assert!(tree.set("/interfaces/interface[name='Bad Name']/mtu", "1500").is_err());
    assert!(tree
        .set("/interfaces/interface[name='eth1']/ipv4/address[ip='10.0.0.1']/origin-interface", "eth7")
        .unwrap_err()
        .is_invalid_value());
    assert!(interfaces(&mut tree).add(["eth0"]).unwrap_err().is_schema_violation());

    assert_eq!(xml::to_string(&helper, &tree, XmlOptions::default()).unwrap(), before_xml);
    assert_eq!(json::to_string(&tree, JsonMode::Ietf).unwrap(), before_json);
}

#[test]
fn test_set_on_structural_target_creates_no_entries() {
    let (module, helper) = setup();
    let mut tree = populated(&module);
    let before = xml::to_string(&helper, &tree, XmlOptions::default()).unwrap();

    let err = tree.set("/interfaces/interface[name='eth5']/ipv4", "").unwrap_err();
    assert!(err.is_schema_violation());
    let err = tree.set("/interfaces/interface[name='eth5']/ipv4/address", "").unwrap_err();
    assert!(err.is_schema_violation());
    assert!(tree.entry("/interfaces/interface[name='eth5']").unwrap().is_none());

    assert_eq!(xml::to_string(&helper, &tree, XmlOptions::default()).unwrap(), before);
}

#[test]
fn test_decode_rejects_dangling_leafref() {
    let (module, _) = setup();
    let text = r#"{"example-interfaces:interfaces": {"interface": [{"name": "eth0",
        "example-ip:ipv4": {"address": [{"ip": "10.0.0.1",
            "example-interfaces:origin-interface": "eth3"}]}}]}}"#;
    let err = json::decode(text, &module, "interfaces").unwrap_err();
    match err {
        BindError::InvalidValue { path, .. } => assert_eq!(
            path,
            "/interfaces/interface[name='eth0']/ipv4/address[ip='10.0.0.1']/origin-interface"
        ),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_shared_helper_across_threads() {
    let (module, helper) = setup();
    let helper = Arc::new(helper);
    let expected = xml::to_string(&helper, &populated(&module), XmlOptions::default()).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let helper = Arc::clone(&helper);
            let module = Arc::clone(&module);
            thread::spawn(move || xml::to_string(&helper, &populated(&module), XmlOptions::default()).unwrap())
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

#[test]
fn test_load_module_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("example-interfaces.json");
    std::fs::write(&path, SAMPLE_SCHEMA).unwrap();

    let module = SchemaModule::from_file(&path).unwrap();
    assert_eq!(module.name(), "example-interfaces");
    assert!(module.find("/interfaces/interface/ipv4/address/prefix-length").is_some());

    assert!(SchemaModule::from_file(dir.path().join("missing.json")).is_err());
}
