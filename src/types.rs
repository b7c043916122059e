//! YANG type definitions and the restriction engine

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use regex::Regex;
use serde_json::Value;

use crate::value::{Decimal64, YangValue};

/// Builtin YANG types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum YangType {
    String,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Decimal64,
    Binary,
    Boolean,
    Empty,
    Enumeration,
    Bits,
    Identityref,
    InstanceIdentifier,
    Leafref,
    Union,
}

impl YangType {
    /// Resolve a builtin type name; `None` means the name must be a typedef
    pub fn from_name(s: &str) -> Option<Self> {
        let t = match s {
            "string" => YangType::String,
            "int8" => YangType::Int8,
            "int16" => YangType::Int16,
            "int32" => YangType::Int32,
            "int64" => YangType::Int64,
            "uint8" => YangType::Uint8,
            "uint16" => YangType::Uint16,
            "uint32" => YangType::Uint32,
            "uint64" => YangType::Uint64,
            "decimal64" => YangType::Decimal64,
            "binary" => YangType::Binary,
            "boolean" => YangType::Boolean,
            "empty" => YangType::Empty,
            "enumeration" => YangType::Enumeration,
            "bits" => YangType::Bits,
            "identityref" => YangType::Identityref,
            "instance-identifier" => YangType::InstanceIdentifier,
            "leafref" => YangType::Leafref,
            "union" => YangType::Union,
            _ => return None,
        };
        Some(t)
    }

    pub fn name(&self) -> &'static str {
        match self {
            YangType::String => "string",
            YangType::Int8 => "int8",
            YangType::Int16 => "int16",
            YangType::Int32 => "int32",
            YangType::Int64 => "int64",
            YangType::Uint8 => "uint8",
            YangType::Uint16 => "uint16",
            YangType::Uint32 => "uint32",
            YangType::Uint64 => "uint64",
            YangType::Decimal64 => "decimal64",
            YangType::Binary => "binary",
            YangType::Boolean => "boolean",
            YangType::Empty => "empty",
            YangType::Enumeration => "enumeration",
            YangType::Bits => "bits",
            YangType::Identityref => "identityref",
            YangType::InstanceIdentifier => "instance-identifier",
            YangType::Leafref => "leafref",
            YangType::Union => "union",
        }
    }

    fn is_signed(&self) -> bool {
        matches!(
            self,
            YangType::Int8 | YangType::Int16 | YangType::Int32 | YangType::Int64
        )
    }

    fn is_unsigned(&self) -> bool {
        matches!(
            self,
            YangType::Uint8 | YangType::Uint16 | YangType::Uint32 | YangType::Uint64
        )
    }

    /// Value bounds of numeric types (decimal64 bounds are on the mantissa)
    fn bounds(&self) -> Option<(i128, i128)> {
        let b = match self {
            YangType::Int8 => (i8::MIN as i128, i8::MAX as i128),
            YangType::Int16 => (i16::MIN as i128, i16::MAX as i128),
            YangType::Int32 => (i32::MIN as i128, i32::MAX as i128),
            YangType::Int64 | YangType::Decimal64 => (i64::MIN as i128, i64::MAX as i128),
            YangType::Uint8 => (0, u8::MAX as i128),
            YangType::Uint16 => (0, u16::MAX as i128),
            YangType::Uint32 => (0, u32::MAX as i128),
            YangType::Uint64 => (0, u64::MAX as i128),
            _ => return None,
        };
        Some(b)
    }

    /// RFC 7951 carries 64-bit numbers as JSON strings
    fn json_as_string(&self) -> bool {
        matches!(
            self,
            YangType::Int64 | YangType::Uint64 | YangType::Decimal64
        )
    }
}

/// A compiled `pattern` restriction
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
    invert_match: bool,
}

impl Pattern {
    /// Compile a YANG pattern; YANG patterns are implicitly anchored
    pub fn new(source: &str, invert_match: bool) -> std::result::Result<Self, String> {
        let regex = Regex::new(&format!("^(?:{})$", source))
            .map_err(|e| format!("invalid pattern '{}': {}", source, e))?;
        Ok(Self {
            source: source.to_string(),
            regex,
            invert_match,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    fn matches(&self, s: &str) -> bool {
        self.regex.is_match(s) != self.invert_match
    }
}

/// An enumeration member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumMember {
    pub name: String,
    pub value: i64,
}

/// An identity an identityref may take, with its defining module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub module: String,
    pub namespace: String,
    pub prefix: String,
}

impl Identity {
    /// `module:name`, the form identityref values carry
    pub fn qualified(&self) -> String {
        format!("{}:{}", self.module, self.name)
    }

    fn is(&self, qualified: &str) -> bool {
        qualified
            .split_once(':')
            .is_some_and(|(module, name)| module == self.module && name == self.name)
    }
}

/// Leafref binding to its target leaf
#[derive(Debug, Clone)]
pub struct Leafref {
    /// Absolute schema path of the target leaf
    pub path: String,
    pub require_instance: bool,
    pub target: Box<TypeSpec>,
}

/// A resolved YANG type with all of its restrictions
#[derive(Debug, Clone)]
pub struct TypeSpec {
    name: String,
    base: YangType,
    ranges: Vec<(i128, i128)>,
    range_source: Option<String>,
    lengths: Vec<(u64, u64)>,
    length_source: Option<String>,
    patterns: Vec<Pattern>,
    enums: Vec<EnumMember>,
    bits: Vec<String>,
    fraction_digits: u8,
    members: Vec<TypeSpec>,
    leafref: Option<Leafref>,
    identities: Vec<Identity>,
}

impl TypeSpec {
    /// An unrestricted builtin type
    pub fn builtin(base: YangType) -> Self {
        Self::named(base.name(), base)
    }

    /// A type declared under `name` (a typedef or a builtin) with builtin base `base`
    pub fn named(name: &str, base: YangType) -> Self {
        Self {
            name: name.to_string(),
            base,
            ranges: Vec::new(),
            range_source: None,
            lengths: Vec::new(),
            length_source: None,
            patterns: Vec::new(),
            enums: Vec::new(),
            bits: Vec::new(),
            fraction_digits: if base == YangType::Decimal64 { 2 } else { 0 },
            members: Vec::new(),
            leafref: None,
            identities: Vec::new(),
        }
    }

    /// Declared type name (typedef name or builtin name)
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn rename(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn base(&self) -> YangType {
        self.base
    }

    /// True if this is (or resolves through a leafref to) the `empty` type
    pub fn is_empty_type(&self) -> bool {
        match &self.leafref {
            Some(lr) => lr.target.is_empty_type(),
            None => self.base == YangType::Empty,
        }
    }

    pub fn leafref(&self) -> Option<&Leafref> {
        self.leafref.as_ref()
    }

    /// True if this is (or resolves through a leafref to) an identityref
    pub fn is_identityref(&self) -> bool {
        match &self.leafref {
            Some(lr) => lr.target.is_identityref(),
            None => self.base == YangType::Identityref,
        }
    }

    /// The accepted identity named `name` in the module with `namespace`
    pub fn identity_in(&self, namespace: &str, name: &str) -> Option<&Identity> {
        match &self.leafref {
            Some(lr) => lr.target.identity_in(namespace, name),
            None => self.identities.iter().find(|i| i.namespace == namespace && i.name == name),
        }
    }

    /// The identity an identityref value stands for, looking through
    /// leafrefs and union members
    pub fn identity(&self, value: &YangValue) -> Option<&Identity> {
        let YangValue::Identity(qualified) = value else {
            return None;
        };
        if let Some(lr) = &self.leafref {
            return lr.target.identity(value);
        }
        self.identities
            .iter()
            .find(|i| i.is(qualified))
            .or_else(|| self.members.iter().find_map(|m| m.identity(value)))
    }

    /// Find an accepted identity by `name`, `module:name` or `prefix:name`
    fn lookup_identity(&self, text: &str) -> std::result::Result<&Identity, String> {
        let mut candidates = self.identities.iter().filter(|i| match text.split_once(':') {
            Some((qualifier, name)) => i.name == name && (i.module == qualifier || i.prefix == qualifier),
            None => i.name == text,
        });
        match (candidates.next(), candidates.next()) {
            (Some(identity), None) => Ok(identity),
            (Some(_), Some(_)) => Err(format!(
                "identity '{}' is defined by several modules; qualify it with its module",
                text
            )),
            (None, _) => Err(format!("identity '{}' is not derived from the base of {}", text, self.name)),
        }
    }

    pub fn enums(&self) -> &[EnumMember] {
        &self.enums
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn members(&self) -> &[TypeSpec] {
        &self.members
    }

    pub fn fraction_digits(&self) -> u8 {
        self.fraction_digits
    }

    /// Add a `range` restriction like `"1..10 | 20..max"`.
    ///
    /// Restrictions accumulate: a derived range narrows the inherited one, so
    /// every interval must lie inside some inherited interval.
    pub fn with_range(mut self, source: &str) -> std::result::Result<Self, String> {
        let (lo, hi) = self
            .base
            .bounds()
            .ok_or_else(|| format!("range restriction on non-numeric type {}", self.name))?;
        let fd = self.fraction_digits;
        let base = self.base;
        let parse_bound = |b: &str| -> std::result::Result<i128, String> {
            match b {
                "min" => Ok(lo),
                "max" => Ok(hi),
                _ if base == YangType::Decimal64 => {
                    Decimal64::parse(b, fd).map(|d| d.mantissa() as i128)
                }
                _ => b
                    .parse::<i128>()
                    .map_err(|_| format!("invalid range bound '{}'", b)),
            }
        };
        let intervals = parse_intervals(source, parse_bound)?;
        for &(a, b) in &intervals {
            if a < lo || b > hi {
                return Err(format!("range '{}' exceeds the {} value space", source, base.name()));
            }
            if !self.ranges.is_empty() && !self.ranges.iter().any(|&(x, y)| x <= a && b <= y) {
                return Err(format!("range '{}' is not a restriction of the base range", source));
            }
        }
        self.ranges = intervals;
        self.range_source = Some(source.to_string());
        Ok(self)
    }

    /// Add a `length` restriction (characters for strings, octets for binary)
    pub fn with_length(mut self, source: &str) -> std::result::Result<Self, String> {
        if !matches!(self.base, YangType::String | YangType::Binary) {
            return Err(format!("length restriction on type {}", self.name));
        }
        let intervals = parse_intervals(source, |b| match b {
            "min" => Ok(0),
            "max" => Ok(u64::MAX as i128),
            _ => b
                .parse::<u64>()
                .map(|n| n as i128)
                .map_err(|_| format!("invalid length bound '{}'", b)),
        })?;
        self.lengths = intervals
            .into_iter()
            .map(|(a, b)| (a as u64, b as u64))
            .collect();
        self.length_source = Some(source.to_string());
        Ok(self)
    }

    pub fn with_pattern(mut self, pattern: Pattern) -> std::result::Result<Self, String> {
        if self.base != YangType::String {
            return Err(format!("pattern restriction on type {}", self.name));
        }
        self.patterns.push(pattern);
        Ok(self)
    }

    pub fn with_fraction_digits(mut self, digits: u8) -> std::result::Result<Self, String> {
        if self.base != YangType::Decimal64 || !(1..=18).contains(&digits) {
            return Err(format!("invalid fraction-digits {} for {}", digits, self.name));
        }
        self.fraction_digits = digits;
        Ok(self)
    }

    /// Set the enumeration members; a derived enumeration may only restrict them
    pub fn with_enums(mut self, enums: Vec<EnumMember>) -> std::result::Result<Self, String> {
        if self.base != YangType::Enumeration {
            return Err(format!("enum statements on type {}", self.name));
        }
        if !self.enums.is_empty() {
            if let Some(extra) = enums.iter().find(|e| !self.enums.iter().any(|b| b.name == e.name)) {
                return Err(format!("enum '{}' is not in the base enumeration", extra.name));
            }
        }
        self.enums = enums;
        Ok(self)
    }

    pub fn with_bits(mut self, bits: Vec<String>) -> std::result::Result<Self, String> {
        if self.base != YangType::Bits {
            return Err(format!("bit statements on type {}", self.name));
        }
        self.bits = bits;
        Ok(self)
    }

    pub fn with_members(mut self, members: Vec<TypeSpec>) -> std::result::Result<Self, String> {
        if self.base != YangType::Union || members.is_empty() {
            return Err(format!("union {} needs at least one member type", self.name));
        }
        self.members = members;
        Ok(self)
    }

    pub fn with_leafref(mut self, leafref: Leafref) -> Self {
        self.leafref = Some(leafref);
        self
    }

    pub fn with_identities(mut self, identities: Vec<Identity>) -> Self {
        self.identities = identities;
        self
    }

    /// Parse the lexical form used in XML text content and validate it
    pub fn parse_text(&self, text: &str) -> std::result::Result<YangValue, String> {
        if let Some(lr) = &self.leafref {
            return lr.target.parse_text(text);
        }
        let value = match self.base {
            YangType::String => YangValue::String(text.to_string()),
            t if t.is_signed() => YangValue::Int(
                text.parse()
                    .map_err(|_| format!("'{}' is not a valid {}", text, t.name()))?,
            ),
            t if t.is_unsigned() => YangValue::Uint(
                text.parse()
                    .map_err(|_| format!("'{}' is not a valid {}", text, t.name()))?,
            ),
            YangType::Decimal64 => YangValue::Decimal(Decimal64::parse(text, self.fraction_digits)?),
            YangType::Boolean => match text {
                "true" => YangValue::Bool(true),
                "false" => YangValue::Bool(false),
                _ => return Err(format!("'{}' is not a valid boolean", text)),
            },
            YangType::Empty => {
                if !text.is_empty() {
                    return Err(format!("empty type cannot carry '{}'", text));
                }
                YangValue::Empty
            }
            YangType::Enumeration => YangValue::Enum(text.to_string()),
            YangType::Bits => {
                let mut set: Vec<String> = Vec::new();
                for name in text.split_whitespace() {
                    if !self.bits.iter().any(|b| b == name) {
                        return Err(format!("'{}' is not a bit of {}", name, self.name));
                    }
                    if !set.iter().any(|s| s == name) {
                        set.push(name.to_string());
                    }
                }
                set.sort_by_key(|n| self.bits.iter().position(|b| b == n));
                YangValue::Bits(set)
            }
            YangType::Binary => YangValue::Binary(
                BASE64
                    .decode(text.trim())
                    .map_err(|e| format!("invalid base64: {}", e))?,
            ),
            YangType::Identityref => YangValue::Identity(self.lookup_identity(text)?.qualified()),
            YangType::InstanceIdentifier => YangValue::InstanceId(text.to_string()),
            YangType::Union => {
                return self
                    .members
                    .iter()
                    .find_map(|m| m.parse_text(text).ok())
                    .ok_or_else(|| format!("'{}' matches no member type of union {}", text, self.name));
            }
            // Leafref without a resolved target never leaves the schema compiler.
            _ => return Err(format!("type {} cannot hold values", self.name)),
        };
        self.check(&value)?;
        Ok(value)
    }

    /// Parse an RFC 7951 JSON scalar and validate it
    pub fn parse_json(&self, json: &Value) -> std::result::Result<YangValue, String> {
        if let Some(lr) = &self.leafref {
            return lr.target.parse_json(json);
        }
        match (self.base, json) {
            (YangType::Empty, Value::Null) => Ok(YangValue::Empty),
            (YangType::Empty, Value::Array(items)) if items.len() == 1 && items[0].is_null() => {
                Ok(YangValue::Empty)
            }
            (YangType::Empty, _) => Err(format!("empty type expects [null], got {}", json)),
            (YangType::Union, _) => self
                .members
                .iter()
                .find_map(|m| m.parse_json(json).ok())
                .ok_or_else(|| format!("{} matches no member type of union {}", json, self.name)),
            (YangType::Boolean, Value::Bool(b)) => Ok(YangValue::Bool(*b)),
            (YangType::Boolean, _) => Err(format!("{} is not a boolean", json)),
            (t, Value::Number(n)) if t.is_signed() || t.is_unsigned() || t == YangType::Decimal64 => {
                self.parse_text(&n.to_string())
            }
            (t, Value::Number(_)) => Err(format!("{} expects a string, got {}", t.name(), json)),
            (_, Value::String(s)) => self.parse_text(s),
            _ => Err(format!("{} is not a scalar value", json)),
        }
    }

    /// Accept a value built in code, re-parsing it when its representation differs
    pub fn coerce(&self, value: YangValue) -> std::result::Result<YangValue, String> {
        if let Some(lr) = &self.leafref {
            return lr.target.coerce(value);
        }
        match (self.base, &value) {
            (YangType::Union, _) => {
                for member in &self.members {
                    if let Ok(v) = member.coerce(value.clone()) {
                        return Ok(v);
                    }
                }
                Err(format!("'{}' matches no member type of union {}", value, self.name))
            }
            (YangType::Empty, YangValue::Bool(true)) => Ok(YangValue::Empty),
            _ if self.same_representation(&value) => {
                self.check(&value)?;
                Ok(value)
            }
            _ => self.parse_text(&value.to_string()),
        }
    }

    fn same_representation(&self, value: &YangValue) -> bool {
        match (self.base, value) {
            (YangType::String, YangValue::String(_))
            | (YangType::Boolean, YangValue::Bool(_))
            | (YangType::Empty, YangValue::Empty)
            | (YangType::Enumeration, YangValue::Enum(_))
            | (YangType::Bits, YangValue::Bits(_))
            | (YangType::Binary, YangValue::Binary(_))
            | (YangType::Identityref, YangValue::Identity(_))
            | (YangType::InstanceIdentifier, YangValue::InstanceId(_)) => true,
            (YangType::Decimal64, YangValue::Decimal(d)) => d.fraction_digits() == self.fraction_digits,
            (t, YangValue::Int(_)) => t.is_signed(),
            (t, YangValue::Uint(_)) => t.is_unsigned(),
            _ => false,
        }
    }

    /// Check a value against every restriction of this type
    pub fn check(&self, value: &YangValue) -> std::result::Result<(), String> {
        if let Some(lr) = &self.leafref {
            return lr.target.check(value);
        }
        if self.base == YangType::Union {
            return if self.members.iter().any(|m| m.check(value).is_ok()) {
                Ok(())
            } else {
                Err(format!("'{}' matches no member type of union {}", value, self.name))
            };
        }
        if !self.same_representation(value) {
            return Err(format!("'{}' is not a valid {} value", value, self.name));
        }

        match value {
            YangValue::String(s) => {
                self.check_length(s.chars().count() as u64, s)?;
                if let Some(p) = self.patterns.iter().find(|p| !p.matches(s)) {
                    return Err(format!("'{}' does not match pattern '{}'", s, p.source()));
                }
            }
            YangValue::Binary(bytes) => self.check_length(bytes.len() as u64, "binary value")?,
            YangValue::Int(_) | YangValue::Uint(_) | YangValue::Decimal(_) => {
                let n = value.scaled().unwrap_or_default();
                let (lo, hi) = self.base.bounds().unwrap_or((i128::MIN, i128::MAX));
                if n < lo || n > hi {
                    return Err(format!("{} is out of range for {}", value, self.base.name()));
                }
                if !self.ranges.is_empty() && !self.ranges.iter().any(|&(a, b)| a <= n && n <= b) {
                    return Err(format!(
                        "{} is outside range '{}'",
                        value,
                        self.range_source.as_deref().unwrap_or_default()
                    ));
                }
            }
            YangValue::Enum(name) => {
                if !self.enums.iter().any(|e| &e.name == name) {
                    return Err(format!("'{}' is not a member of enumeration {}", name, self.name));
                }
            }
            YangValue::Bits(set) => {
                if let Some(bad) = set.iter().find(|b| !self.bits.contains(b)) {
                    return Err(format!("'{}' is not a bit of {}", bad, self.name));
                }
            }
            YangValue::Identity(qualified) => {
                if !self.identities.iter().any(|i| i.is(qualified)) {
                    return Err(format!("identity '{}' is not derived from the base of {}", qualified, self.name));
                }
            }
            YangValue::InstanceId(path) => {
                if !path.starts_with('/') {
                    return Err(format!("instance-identifier '{}' is not absolute", path));
                }
            }
            YangValue::Bool(_) | YangValue::Empty => {}
        }
        Ok(())
    }

    fn check_length(&self, len: u64, what: &str) -> std::result::Result<(), String> {
        if !self.lengths.is_empty() && !self.lengths.iter().any(|&(a, b)| a <= len && len <= b) {
            return Err(format!(
                "length of '{}' is outside '{}'",
                what,
                self.length_source.as_deref().unwrap_or_default()
            ));
        }
        Ok(())
    }

    /// Render a value as an RFC 7951 JSON scalar
    pub fn to_json(&self, value: &YangValue) -> Value {
        if let Some(lr) = &self.leafref {
            return lr.target.to_json(value);
        }
        if self.base == YangType::Union {
            if let Some(member) = self.members.iter().find(|m| m.check(value).is_ok()) {
                return member.to_json(value);
            }
        }
        match value {
            YangValue::Bool(b) => Value::Bool(*b),
            YangValue::Empty => Value::Array(vec![Value::Null]),
            YangValue::Int(n) if !self.base.json_as_string() => Value::Number((*n).into()),
            YangValue::Uint(n) if !self.base.json_as_string() => Value::Number((*n).into()),
            other => Value::String(other.to_string()),
        }
    }
}

/// Parse `a..b | c | d..e` into closed intervals
fn parse_intervals<F>(source: &str, parse_bound: F) -> std::result::Result<Vec<(i128, i128)>, String>
where
    F: Fn(&str) -> std::result::Result<i128, String>,
{
    let mut intervals = Vec::new();
    for part in source.split('|') {
        let part = part.trim();
        let (lo, hi) = match part.split_once("..") {
            Some((a, b)) => (parse_bound(a.trim())?, parse_bound(b.trim())?),
            None => {
                let v = parse_bound(part)?;
                (v, v)
            }
        };
        if lo > hi {
            return Err(format!("empty interval '{}'", part));
        }
        intervals.push((lo, hi));
    }
    Ok(intervals)
}
