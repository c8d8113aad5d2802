//! Parameter value domains carried by observations and goals.
//!
//! A domain is either a singleton, an enumerated set, an interval, or an
//! entity reference. Base types are flattened into the variants so the data
//! is plain and copyable across reactor boundaries.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Structural kind of a domain, independent of its base type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainKind {
    Singleton,
    Enumerated,
    Interval,
    Entity,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Domain {
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Singleton of an enumerated symbol type.
    Symbol { type_name: String, value: String },
    /// Reference to a named entity (e.g. a timeline object).
    Object(String),
    /// Integer interval; `i64::MIN`/`i64::MAX` are the open bounds.
    IntInterval { min: i64, max: i64 },
    /// Float interval; IEEE infinities are the open bounds.
    FloatInterval { min: f64, max: f64 },
    /// Enumerated set of singleton members sharing `type_name`.
    Set { type_name: String, values: Vec<Domain> },
}

impl Domain {
    pub fn symbol(type_name: impl Into<String>, value: impl Into<String>) -> Self {
        Domain::Symbol {
            type_name: type_name.into(),
            value: value.into(),
        }
    }

    pub fn object(name: impl Into<String>) -> Self {
        Domain::Object(name.into())
    }

    pub fn int_interval(min: i64, max: i64) -> Self {
        Domain::IntInterval { min, max }
    }

    pub fn float_interval(min: f64, max: f64) -> Self {
        Domain::FloatInterval { min, max }
    }

    pub fn set(type_name: impl Into<String>, values: Vec<Domain>) -> Self {
        Domain::Set {
            type_name: type_name.into(),
            values,
        }
    }

    pub fn kind(&self) -> DomainKind {
        match self {
            Domain::Bool(_) | Domain::Int(_) | Domain::Float(_) | Domain::Symbol { .. } => {
                DomainKind::Singleton
            }
            Domain::Object(_) => DomainKind::Entity,
            Domain::IntInterval { .. } | Domain::FloatInterval { .. } => DomainKind::Interval,
            Domain::Set { .. } => DomainKind::Enumerated,
        }
    }

    pub fn is_singleton(&self) -> bool {
        match self {
            Domain::IntInterval { min, max } => min == max,
            Domain::FloatInterval { min, max } => min == max,
            Domain::Set { values, .. } => values.len() == 1,
            _ => self.kind() != DomainKind::Interval && self.kind() != DomainKind::Enumerated,
        }
    }

    /// Name of the base type as it appears on the wire.
    pub fn type_name(&self) -> &str {
        match self {
            Domain::Bool(_) => "bool",
            Domain::Int(_) | Domain::IntInterval { .. } => "int",
            Domain::Float(_) | Domain::FloatInterval { .. } => "float",
            Domain::Symbol { type_name, .. } => type_name,
            Domain::Object(_) => "object",
            Domain::Set { type_name, .. } => type_name,
        }
    }
}

/// Render an integer bound, using `+inf` / `-inf` for the open bounds.
pub fn format_int_bound(value: i64) -> String {
    if value == i64::MAX {
        "+inf".to_string()
    } else if value == i64::MIN {
        "-inf".to_string()
    } else {
        value.to_string()
    }
}

/// Render a float bound, using `+inf` / `-inf` for the infinities.
pub fn format_float_bound(value: f64) -> String {
    if value == f64::INFINITY {
        "+inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        value.to_string()
    }
}

pub fn parse_int_bound(text: &str) -> Option<i64> {
    match text {
        "+inf" => Some(i64::MAX),
        "-inf" => Some(i64::MIN),
        _ => text.parse().ok(),
    }
}

pub fn parse_float_bound(text: &str) -> Option<f64> {
    match text {
        "+inf" => Some(f64::INFINITY),
        "-inf" => Some(f64::NEG_INFINITY),
        _ => text.parse().ok(),
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Bool(v) => write!(f, "{}", v),
            Domain::Int(v) => write!(f, "{}", v),
            Domain::Float(v) => write!(f, "{}", v),
            Domain::Symbol { value, .. } => write!(f, "{}", value),
            Domain::Object(name) => write!(f, "{}", name),
            Domain::IntInterval { min, max } => {
                write!(f, "[{}, {}]", format_int_bound(*min), format_int_bound(*max))
            }
            Domain::FloatInterval { min, max } => write!(
                f,
                "[{}, {}]",
                format_float_bound(*min),
                format_float_bound(*max)
            ),
            Domain::Set { values, .. } => {
                write!(f, "{{")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(Domain::Bool(true).kind(), DomainKind::Singleton);
        assert_eq!(Domain::object("auv").kind(), DomainKind::Entity);
        assert_eq!(Domain::int_interval(0, 5).kind(), DomainKind::Interval);
        assert_eq!(
            Domain::set("mode", vec![Domain::symbol("mode", "idle")]).kind(),
            DomainKind::Enumerated
        );
    }

    #[test]
    fn degenerate_interval_is_singleton() {
        assert!(Domain::int_interval(3, 3).is_singleton());
        assert!(!Domain::int_interval(3, 4).is_singleton());
    }

    #[test]
    fn symbolic_infinities() {
        assert_eq!(format_int_bound(i64::MAX), "+inf");
        assert_eq!(format_int_bound(i64::MIN), "-inf");
        assert_eq!(format_int_bound(42), "42");
        assert_eq!(format_float_bound(f64::INFINITY), "+inf");
        assert_eq!(parse_int_bound("+inf"), Some(i64::MAX));
        assert_eq!(parse_float_bound("-inf"), Some(f64::NEG_INFINITY));
        assert_eq!(parse_int_bound("17"), Some(17));
    }

    #[test]
    fn display_interval() {
        let d = Domain::int_interval(2, i64::MAX);
        assert_eq!(d.to_string(), "[2, +inf]");
    }
}
