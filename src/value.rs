//! YANG scalar values and the typed value cell that guards them

use std::fmt;
use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde_json::Value;

use crate::error::{BindError, Result};
use crate::types::TypeSpec;

/// A YANG `decimal64`: a signed mantissa scaled by a fixed number of fraction digits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Decimal64 {
    mantissa: i64,
    fraction_digits: u8,
}

impl Decimal64 {
    /// Build from a raw mantissa, e.g. `Decimal64::new(1250, 2)` is `12.5`
    pub fn new(mantissa: i64, fraction_digits: u8) -> Self {
        Self {
            mantissa,
            fraction_digits,
        }
    }

    /// Parse a lexical decimal into the given scale.
    ///
    /// Fails when the text has more fraction digits than the scale allows or the
    /// scaled value does not fit in 64 bits.
    pub fn parse(text: &str, fraction_digits: u8) -> std::result::Result<Self, String> {
        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text.strip_prefix('+').unwrap_or(text)),
        };
        let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
        let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if (int_part.is_empty() && frac_part.is_empty()) || !all_digits(int_part) || !all_digits(frac_part) {
            return Err(format!("'{}' is not a decimal number", text));
        }
        if frac_part.len() > fraction_digits as usize {
            return Err(format!(
                "'{}' has more than {} fraction digits",
                text, fraction_digits
            ));
        }

        let scale = 10i128.pow(fraction_digits as u32);
        let int_value: i128 = if int_part.is_empty() {
            0
        } else {
            int_part
                .parse()
                .map_err(|_| format!("'{}' is out of range for decimal64", text))?
        };
        let frac_value: i128 = if frac_part.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", frac_part, width = fraction_digits as usize);
            padded
                .parse()
                .map_err(|_| format!("'{}' is not a decimal number", text))?
        };
        let magnitude = int_value
            .checked_mul(scale)
            .and_then(|v| v.checked_add(frac_value))
            .ok_or_else(|| format!("'{}' is out of range for decimal64", text))?;
        let signed = if negative { -magnitude } else { magnitude };
        let mantissa = i64::try_from(signed)
            .map_err(|_| format!("'{}' is out of range for decimal64", text))?;
        Ok(Self::new(mantissa, fraction_digits))
    }

    pub fn mantissa(&self) -> i64 {
        self.mantissa
    }

    pub fn fraction_digits(&self) -> u8 {
        self.fraction_digits
    }
}

impl fmt::Display for Decimal64 {
    // Canonical form: no leading '+', at least one fraction digit, no trailing zeros.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scale = 10u128.pow(self.fraction_digits as u32);
        let magnitude = (self.mantissa as i128).unsigned_abs();
        let sign = if self.mantissa < 0 { "-" } else { "" };
        let int_part = magnitude / scale;
        if self.fraction_digits == 0 {
            return write!(f, "{}{}.0", sign, int_part);
        }
        let frac = format!(
            "{:0width$}",
            magnitude % scale,
            width = self.fraction_digits as usize
        );
        let frac = frac.trim_end_matches('0');
        let frac = if frac.is_empty() { "0" } else { frac };
        write!(f, "{}{}.{}", sign, int_part, frac)
    }
}

/// A YANG scalar value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum YangValue {
    String(String),
    Int(i64),
    Uint(u64),
    Decimal(Decimal64),
    Bool(bool),
    /// Value of a leaf of type `empty`
    Empty,
    Enum(String),
    /// Set bit names, in declaration order
    Bits(Vec<String>),
    Binary(Vec<u8>),
    /// Identity qualified by its defining module, `module:name`
    Identity(String),
    InstanceId(String),
}

impl YangValue {
    /// Returns the string payload of string-like values
    pub fn as_str(&self) -> Option<&str> {
        match self {
            YangValue::String(s)
            | YangValue::Enum(s)
            | YangValue::Identity(s)
            | YangValue::InstanceId(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            YangValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            YangValue::Int(n) => Some(*n),
            YangValue::Uint(n) => i64::try_from(*n).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            YangValue::Uint(n) => Some(*n),
            YangValue::Int(n) => u64::try_from(*n).ok(),
            _ => None,
        }
    }

    /// Numeric value scaled to an integer, used for range checks
    pub(crate) fn scaled(&self) -> Option<i128> {
        match self {
            YangValue::Int(n) => Some(*n as i128),
            YangValue::Uint(n) => Some(*n as i128),
            YangValue::Decimal(d) => Some(d.mantissa() as i128),
            _ => None,
        }
    }
}

impl fmt::Display for YangValue {
    /// Canonical lexical form, as carried in XML text content
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            YangValue::String(s)
            | YangValue::Enum(s)
            | YangValue::Identity(s)
            | YangValue::InstanceId(s) => f.write_str(s),
            YangValue::Int(n) => write!(f, "{}", n),
            YangValue::Uint(n) => write!(f, "{}", n),
            YangValue::Decimal(d) => write!(f, "{}", d),
            YangValue::Bool(b) => write!(f, "{}", b),
            YangValue::Empty => Ok(()),
            YangValue::Bits(bits) => f.write_str(&bits.join(" ")),
            YangValue::Binary(bytes) => f.write_str(&BASE64.encode(bytes)),
        }
    }
}

impl From<&str> for YangValue {
    fn from(s: &str) -> Self {
        YangValue::String(s.to_string())
    }
}

impl From<String> for YangValue {
    fn from(s: String) -> Self {
        YangValue::String(s)
    }
}

impl From<bool> for YangValue {
    fn from(b: bool) -> Self {
        YangValue::Bool(b)
    }
}

impl From<Decimal64> for YangValue {
    fn from(d: Decimal64) -> Self {
        YangValue::Decimal(d)
    }
}

macro_rules! impl_from_int {
    ($variant:ident as $wide:ty: $($t:ty),*) => {
        $(impl From<$t> for YangValue {
            fn from(n: $t) -> Self {
                YangValue::$variant(n as $wide)
            }
        })*
    };
}

impl_from_int!(Int as i64: i8, i16, i32, i64);
impl_from_int!(Uint as u64: u8, u16, u32, u64);

/// A value cell bound to a YANG type.
///
/// Assignment validates against the type; a rejected assignment leaves the
/// cell untouched. `changed` records whether any assignment ever succeeded.
#[derive(Debug, Clone)]
pub struct TypedValue {
    path: Arc<str>,
    spec: Arc<TypeSpec>,
    default: Option<YangValue>,
    value: Option<YangValue>,
    changed: bool,
    diverged: bool,
}

impl TypedValue {
    pub fn new(path: Arc<str>, spec: Arc<TypeSpec>, default: Option<YangValue>) -> Self {
        Self {
            path,
            spec,
            default,
            value: None,
            changed: false,
            diverged: false,
        }
    }

    pub fn spec(&self) -> &TypeSpec {
        &self.spec
    }

    /// Validate and store a value, coercing between compatible representations
    pub fn set(&mut self, value: impl Into<YangValue>) -> Result<()> {
        let value = self
            .spec
            .coerce(value.into())
            .map_err(|reason| BindError::invalid_value(&*self.path, reason))?;
        self.store(value);
        Ok(())
    }

    /// Parse the lexical (XML text) form and store it
    pub fn set_str(&mut self, text: &str) -> Result<()> {
        let value = self
            .spec
            .parse_text(text)
            .map_err(|reason| BindError::invalid_value(&*self.path, reason))?;
        self.store(value);
        Ok(())
    }

    /// Parse an RFC 7951 JSON scalar and store it
    pub fn set_json(&mut self, json: &Value) -> Result<()> {
        let value = self
            .spec
            .parse_json(json)
            .map_err(|reason| BindError::invalid_value(&*self.path, reason))?;
        self.store(value);
        Ok(())
    }

    fn store(&mut self, value: YangValue) {
        if self.default.as_ref() != Some(&value) {
            self.diverged = true;
        }
        self.value = Some(value);
        self.changed = true;
    }

    /// Current value: the explicit one, else the declared default
    pub fn get(&self) -> Option<&YangValue> {
        self.value.as_ref().or(self.default.as_ref())
    }

    /// The explicitly assigned value, ignoring the default
    pub fn explicit(&self) -> Option<&YangValue> {
        self.value.as_ref()
    }

    pub fn default_value(&self) -> Option<&YangValue> {
        self.default.as_ref()
    }

    /// True iff no assignment has ever diverged from the declared default
    pub fn is_default(&self) -> bool {
        !self.diverged
    }

    /// True once any assignment has succeeded
    pub fn changed(&self) -> bool {
        self.changed
    }

    /// Forget the explicit value and return to the pristine default state
    pub fn clear(&mut self) {
        self.value = None;
        self.changed = false;
        self.diverged = false;
    }
}
