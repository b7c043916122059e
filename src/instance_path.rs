//! Instance paths addressing nodes of a data tree
//!
//! Paths use the XPath subset NETCONF and RESTCONF clients use to name a
//! single node: `/interfaces/interface[name='eth0']/enabled`. Steps may carry
//! a module prefix, list steps carry one predicate per key.

use std::fmt;

use crate::error::{BindError, Result};

/// One step of an instance path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStep {
    /// Module name or prefix qualifying the step, if any
    pub prefix: Option<String>,
    pub name: String,
    /// Key predicates as (key leaf name, lexical value)
    pub keys: Vec<(String, String)>,
}

impl PathStep {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            prefix: None,
            name: name.into(),
            keys: Vec::new(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.keys.push((key.into(), value.into()));
        self
    }
}

/// A parsed absolute instance path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstancePath {
    /// The steps of this path
    pub steps: Vec<PathStep>,
}

impl InstancePath {
    /// Create an empty instance path (the tree root)
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a path like `/if:interfaces/interface[name='eth0']/mtu`
    pub fn parse(path: &str) -> Result<Self> {
        let bad = |why: &str| BindError::SchemaViolation(format!("bad instance path '{}': {}", path, why));
        let rest = path.strip_prefix('/').ok_or_else(|| bad("must be absolute"))?;

        let mut steps = Vec::new();
        let mut chars = rest.chars().peekable();
        while chars.peek().is_some() {
            let mut ident = String::new();
            while let Some(&c) = chars.peek() {
                if c == '/' || c == '[' {
                    break;
                }
                ident.push(c);
                chars.next();
            }
            if ident.is_empty() {
                return Err(bad("empty step"));
            }
            let mut step = match ident.split_once(':') {
                Some((prefix, name)) => PathStep {
                    prefix: Some(prefix.to_string()),
                    ..PathStep::new(name)
                },
                None => PathStep::new(ident),
            };

            while chars.peek() == Some(&'[') {
                chars.next();
                let key: String = chars.by_ref().take_while(|&c| c != '=').collect();
                let quote = chars.next().filter(|c| *c == '\'' || *c == '"').ok_or_else(|| bad("predicate value must be quoted"))?;
                let mut value = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == quote {
                        closed = true;
                        break;
                    }
                    value.push(c);
                }
                if !closed || chars.next() != Some(']') {
                    return Err(bad("unterminated predicate"));
                }
                let key = key.trim();
                let key = key.rsplit_once(':').map(|(_, k)| k).unwrap_or(key);
                step.keys.push((key.to_string(), value));
            }

            steps.push(step);
            match chars.next() {
                None | Some('/') => {}
                Some(_) => return Err(bad("unexpected character after predicate")),
            }
        }
        Ok(Self { steps })
    }

    /// Append a step
    pub fn push(&mut self, step: PathStep) {
        self.steps.push(step);
    }

    /// Check if this path is empty
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Get the number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Schema path of the addressed node (predicates and prefixes dropped)
    pub fn schema_path(&self) -> String {
        if self.steps.is_empty() {
            return "/".to_string();
        }
        self.steps.iter().map(|s| format!("/{}", s.name)).collect()
    }
}

impl fmt::Display for InstancePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return f.write_str("/");
        }
        for step in &self.steps {
            f.write_str("/")?;
            if let Some(prefix) = &step.prefix {
                write!(f, "{}:", prefix)?;
            }
            f.write_str(&step.name)?;
            for (key, value) in &step.keys {
                let quote = if value.contains('\'') { '"' } else { '\'' };
                write!(f, "[{}={}{}{}]", key, quote, value, quote)?;
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for InstancePath {
    type Err = BindError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_path() {
        let path = InstancePath::parse("/interfaces/interface").unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(path.steps[1], PathStep::new("interface"));
        assert_eq!(path.schema_path(), "/interfaces/interface");
    }

    #[test]
    fn test_parse_predicates_and_prefixes() {
        let path: InstancePath = "/if:interfaces/interface[name='eth0/1'][unit=\"0\"]/mtu".parse().unwrap();
        assert_eq!(path.steps[0].prefix.as_deref(), Some("if"));
        assert_eq!(
            path.steps[1].keys,
            vec![("name".to_string(), "eth0/1".to_string()), ("unit".to_string(), "0".to_string())]
        );
        assert_eq!(path.schema_path(), "/interfaces/interface/mtu");
        assert_eq!(path.to_string(), "/if:interfaces/interface[name='eth0/1'][unit='0']/mtu");
    }

    #[test]
    fn test_parse_errors() {
        assert!(InstancePath::parse("interfaces").is_err());
        assert!(InstancePath::parse("/a//b").is_err());
        assert!(InstancePath::parse("/a[k=v]").is_err());
        assert!(InstancePath::parse("/a[k='v'").is_err());
        assert!(InstancePath::parse("/").unwrap().is_empty());
    }

    #[test]
    fn test_display_roundtrip() {
        let mut path = InstancePath::new();
        path.push(PathStep::new("users"));
        path.push(PathStep::new("user").with_key("name", "o'brien"));
        let text = path.to_string();
        assert_eq!(text, "/users/user[name=\"o'brien\"]");
        assert_eq!(InstancePath::parse(&text).unwrap(), path);
    }
}
