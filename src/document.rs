//! A small owned XML element tree
//!
//! Both the skeleton document of a path helper and the output of the XML
//! encoder are `XmlElement` trees. Parsing resolves namespaces with
//! quick-xml's `NsReader`; an element records a namespace only where it
//! differs from the namespace it inherits from its parent, which is exactly
//! where the writer emits a default `xmlns` declaration.
//!
//! Text is kept verbatim. Whitespace-only text between child elements is
//! indentation and is dropped.

use std::fmt;

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;

use crate::error::{BindError, Result};
use crate::path_helper::SchemaId;

/// One XML element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    /// Local name, without prefix
    pub name: String,
    /// Namespace declared on this element (`xmlns="..."`), if it changes here
    pub namespace: Option<String>,
    /// Prefixes declared on this element (`xmlns:prefix="..."`)
    pub prefixes: Vec<(String, String)>,
    /// Other attributes, qualified names as written
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<XmlElement>,
    /// Schema node this skeleton element stands for; cleared on encoder output
    pub(crate) schema_id: Option<SchemaId>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            prefixes: Vec::new(),
            attributes: Vec::new(),
            text: None,
            children: Vec::new(),
            schema_id: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>, namespace: impl Into<String>) -> Self {
        self.prefixes.push((prefix.into(), namespace.into()));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }

    /// Schema identity tag carried by skeleton elements
    pub fn schema_id(&self) -> Option<SchemaId> {
        self.schema_id
    }

    /// First child with the given local name
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All children with the given local name, in document order
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Follow a `/`-separated chain of first-match child names
    pub fn find(&self, path: &str) -> Option<&XmlElement> {
        path.split('/')
            .filter(|s| !s.is_empty())
            .try_fold(self, |el, name| el.child(name))
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Text content, or "" when the element has none
    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }
}

/// An XML document: a single document element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    root: XmlElement,
}

impl XmlDocument {
    pub fn new(root: XmlElement) -> Self {
        Self { root }
    }

    /// Parse XML text, resolving namespaces
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = NsReader::from_str(xml);

        // Open elements with the namespace each one resolved to
        let mut stack: Vec<(XmlElement, Option<String>)> = Vec::new();
        let mut root = None;

        loop {
            let (resolved, event) = reader.read_resolved_event().map_err(BindError::xml)?;
            match event {
                Event::Start(e) => {
                    let ns = namespace_of(&resolved)?;
                    let element = open_element(&e, ns.as_deref(), stack.last().and_then(|(_, n)| n.as_deref()))?;
                    stack.push((element, ns));
                }
                Event::Empty(e) => {
                    let ns = namespace_of(&resolved)?;
                    let element = open_element(&e, ns.as_deref(), stack.last().and_then(|(_, n)| n.as_deref()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(t) => {
                    let text = t.unescape().map_err(BindError::xml)?;
                    append_text(&mut stack, &text)?;
                }
                Event::CData(c) => {
                    let text = String::from_utf8(c.into_inner().into_owned()).map_err(BindError::xml)?;
                    append_text(&mut stack, &text)?;
                }
                Event::End(_) => {
                    let (element, _) = stack
                        .pop()
                        .ok_or_else(|| BindError::Xml("unbalanced end tag".into()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some((open, _)) = stack.last() {
            return Err(BindError::Xml(format!("element <{}> is never closed", open.name)));
        }
        root.map(Self::new)
            .ok_or_else(|| BindError::Xml("document has no root element".into()))
    }

    pub fn root(&self) -> &XmlElement {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut XmlElement {
        &mut self.root
    }

    pub fn into_root(self) -> XmlElement {
        self.root
    }

    /// Serialize without any whitespace between elements
    pub fn to_xml_string(&self) -> Result<String> {
        self.write(Writer::new(Vec::new()))
    }

    /// Serialize with two-space indentation
    pub fn to_string_pretty(&self) -> Result<String> {
        self.write(Writer::new_with_indent(Vec::new(), b' ', 2))
    }

    fn write(&self, mut writer: Writer<Vec<u8>>) -> Result<String> {
        write_element(&mut writer, &self.root)?;
        String::from_utf8(writer.into_inner()).map_err(BindError::xml)
    }
}

impl fmt::Display for XmlDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let xml = self.to_xml_string().map_err(|_| fmt::Error)?;
        f.write_str(&xml)
    }
}

impl std::str::FromStr for XmlDocument {
    type Err = BindError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn namespace_of(resolved: &ResolveResult<'_>) -> Result<Option<String>> {
    match resolved {
        ResolveResult::Bound(ns) => std::str::from_utf8(ns.as_ref())
            .map(|s| Some(s.to_string()))
            .map_err(BindError::xml),
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Unknown(prefix) => Err(BindError::Xml(format!(
            "undeclared namespace prefix '{}'",
            String::from_utf8_lossy(prefix)
        ))),
    }
}

fn open_element(e: &BytesStart<'_>, ns: Option<&str>, parent_ns: Option<&str>) -> Result<XmlElement> {
    let local = e.local_name();
    let name = std::str::from_utf8(local.as_ref()).map_err(BindError::xml)?;
    let mut element = XmlElement::new(name);
    if ns != parent_ns {
        element.namespace = ns.map(str::to_string);
    }
    for attr in e.attributes() {
        let attr = attr.map_err(BindError::xml)?;
        let key = std::str::from_utf8(attr.key.as_ref()).map_err(BindError::xml)?;
        if key == "xmlns" {
            continue;
        }
        let value = attr.unescape_value().map_err(BindError::xml)?;
        match key.strip_prefix("xmlns:") {
            Some(prefix) => element.prefixes.push((prefix.to_string(), value.into_owned())),
            None => element.attributes.push((key.to_string(), value.into_owned())),
        }
    }
    Ok(element)
}

fn attach(
    stack: &mut [(XmlElement, Option<String>)],
    root: &mut Option<XmlElement>,
    mut element: XmlElement,
) -> Result<()> {
    if !element.children.is_empty() && element.text.as_deref().is_some_and(|t| t.trim().is_empty()) {
        element.text = None;
    }
    match stack.last_mut() {
        Some((parent, _)) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(BindError::Xml("document has more than one root element".into())),
    }
    Ok(())
}

fn append_text(stack: &mut [(XmlElement, Option<String>)], text: &str) -> Result<()> {
    match stack.last_mut() {
        Some((element, _)) => element.text.get_or_insert_with(String::new).push_str(text),
        None if text.trim().is_empty() => {}
        None => return Err(BindError::Xml("text outside the root element".into())),
    }
    Ok(())
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &XmlElement) -> Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    if let Some(ns) = &element.namespace {
        start.push_attribute(("xmlns", ns.as_str()));
    }
    for (prefix, ns) in &element.prefixes {
        start.push_attribute((format!("xmlns:{}", prefix).as_str(), ns.as_str()));
    }
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() && element.text.is_none() {
        return writer.write_event(Event::Empty(start)).map_err(BindError::xml);
    }
    writer.write_event(Event::Start(start)).map_err(BindError::xml)?;
    if let Some(text) = &element.text {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(BindError::xml)?;
    }
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(BindError::xml)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_XML: &str = r#"<?xml version="1.0"?>
        <data xmlns:nc="urn:ietf:params:xml:ns:netconf:base:1.0">
          <if:interfaces xmlns:if="urn:example:interfaces">
            <if:interface nc:operation="merge">
              <if:name>eth0</if:name>
              <mtu xmlns="urn:example:ext">1500</mtu>
              <if:description><![CDATA[a < b]]></if:description>
            </if:interface>
          </if:interfaces>
        </data>"#;

    #[test]
    fn test_parse_resolves_namespaces() {
        let doc = XmlDocument::parse(SAMPLE_XML).unwrap();
        let root = doc.root();
        assert_eq!(root.name, "data");
        assert_eq!(root.namespace, None);

        let interfaces = root.child("interfaces").unwrap();
        assert_eq!(interfaces.namespace.as_deref(), Some("urn:example:interfaces"));

        let interface = interfaces.child("interface").unwrap();
        assert_eq!(interface.namespace, None, "inherited namespace is not repeated");
        assert_eq!(interface.attribute("nc:operation"), Some("merge"));
        assert_eq!(interface.find("name").unwrap().text.as_deref(), Some("eth0"));

        assert_eq!(root.prefixes, [("nc".to_string(), "urn:ietf:params:xml:ns:netconf:base:1.0".to_string())]);
        let mtu = interface.child("mtu").unwrap();
        assert_eq!(mtu.namespace.as_deref(), Some("urn:example:ext"));
        assert_eq!(mtu.text_or_empty(), "1500");
        assert_eq!(interface.child("description").unwrap().text_or_empty(), "a < b");
    }

    #[test]
    fn test_write_and_reparse() {
        let doc = XmlDocument::new(
            XmlElement::new("root").with_child(
                XmlElement::new("system")
                    .with_namespace("urn:example:system")
                    .with_child(XmlElement::new("hostname").with_text("r1 & r2"))
                    .with_child(XmlElement::new("enable-ssh")),
            ),
        );
        let xml = doc.to_xml_string().unwrap();
        assert_eq!(
            xml,
            r#"<root><system xmlns="urn:example:system"><hostname>r1 &amp; r2</hostname><enable-ssh/></system></root>"#
        );
        assert_eq!(XmlDocument::parse(&xml).unwrap(), doc);

        let pretty = doc.to_string_pretty().unwrap();
        assert!(pretty.contains("\n    <hostname>r1 &amp; r2</hostname>"));
        assert_eq!(XmlDocument::parse(&pretty).unwrap(), doc);
    }

    #[test]
    fn test_text_is_kept_verbatim() {
        let doc = XmlDocument::new(
            XmlElement::new("system")
                .with_child(XmlElement::new("descr").with_text("  uplink  "))
                .with_child(XmlElement::new("pad").with_text(" "))
                .with_child(XmlElement::new("kind").with_prefix("t", "urn:t").with_text("t:ethernet")),
        );
        for xml in [doc.to_xml_string().unwrap(), doc.to_string_pretty().unwrap()] {
            let parsed = XmlDocument::parse(&xml).unwrap();
            assert_eq!(parsed, doc);
            assert_eq!(parsed.root().child("descr").unwrap().text_or_empty(), "  uplink  ");
            assert_eq!(parsed.root().child("pad").unwrap().text_or_empty(), " ");
        }
        assert!(doc.to_xml_string().unwrap().contains(r#"<kind xmlns:t="urn:t">t:ethernet</kind>"#));

        let indented = XmlDocument::parse("<?xml version=\"1.0\"?>\n<a>\n  <b> x </b>\n</a>\n").unwrap();
        assert_eq!(indented.root().text, None);
        assert_eq!(indented.root().child("b").unwrap().text_or_empty(), " x ");
    }

    #[test]
    fn test_malformed_xml() {
        assert!(matches!(XmlDocument::parse("<a><b></a>"), Err(BindError::Xml(_))));
        assert!(matches!(XmlDocument::parse("<a>"), Err(BindError::Xml(_))));
        assert!(matches!(XmlDocument::parse(""), Err(BindError::Xml(_))));
        assert!(matches!(XmlDocument::parse("<x:a/>"), Err(BindError::Xml(_))));
        assert!(matches!(XmlDocument::parse("<a/><b/>"), Err(BindError::Xml(_))));
    }
}
