//! XML wire form for observations, used when the agent persists or forwards
//! them out of process.
//!
//! The format is fixed and small, so the writer and reader cover exactly the
//! emitted subset:
//!
//! ```text
//! <Observation on="nav" predicate="At">
//!   <Assert name="x"><value type="int" name="7" /></Assert>
//! </Observation>
//! ```

use std::fmt::Write as _;

use thiserror::Error;
use trex_core::domain::{
    format_float_bound, format_int_bound, parse_float_bound, parse_int_bound,
};
use trex_core::{Domain, Observation, Tick};

#[derive(Debug, Error)]
pub enum WireError {
    #[error("unexpected end of input")]
    UnexpectedEnd,

    #[error("malformed element near offset {0}")]
    Malformed(usize),

    #[error("unexpected element <{0}>")]
    UnexpectedElement(String),

    #[error("missing attribute '{attribute}' on <{element}>")]
    MissingAttribute {
        element: String,
        attribute: &'static str,
    },

    #[error("bad {what} value '{value}'")]
    BadValue { what: &'static str, value: String },
}

/// Render one observation. An empty parameter list renders the self-closing
/// form.
pub fn observation_to_xml(observation: &Observation) -> String {
    let mut out = String::new();
    if observation.parameter_count() == 0 {
        let _ = write!(
            out,
            "<Observation on=\"{}\" predicate=\"{}\" />",
            escape(observation.object()),
            escape(observation.predicate())
        );
        return out;
    }

    let _ = write!(
        out,
        "<Observation on=\"{}\" predicate=\"{}\">",
        escape(observation.object()),
        escape(observation.predicate())
    );
    for (name, domain) in observation.parameters() {
        let _ = write!(out, "<Assert name=\"{}\">", escape(&name));
        domain_to_xml(&domain, &mut out);
        out.push_str("</Assert>");
    }
    out.push_str("</Observation>");
    out
}

fn domain_to_xml(domain: &Domain, out: &mut String) {
    match domain {
        Domain::Bool(v) => {
            let _ = write!(out, "<value type=\"bool\" name=\"{}\" />", v);
        }
        Domain::Int(v) => {
            let _ = write!(out, "<value type=\"int\" name=\"{}\" />", v);
        }
        Domain::Float(v) => {
            let _ = write!(out, "<value type=\"float\" name=\"{}\" />", v);
        }
        Domain::Symbol { type_name, value } => {
            let _ = write!(
                out,
                "<symbol type=\"{}\" value=\"{}\" />",
                escape(type_name),
                escape(value)
            );
        }
        Domain::Object(name) => {
            let _ = write!(out, "<object value=\"{}\" />", escape(name));
        }
        Domain::IntInterval { min, max } => {
            let _ = write!(
                out,
                "<interval type=\"int\" min=\"{}\" max=\"{}\" />",
                format_int_bound(*min),
                format_int_bound(*max)
            );
        }
        Domain::FloatInterval { min, max } => {
            let _ = write!(
                out,
                "<interval type=\"float\" min=\"{}\" max=\"{}\" />",
                format_float_bound(*min),
                format_float_bound(*max)
            );
        }
        Domain::Set { type_name, values } => {
            if values.is_empty() {
                let _ = write!(out, "<set type=\"{}\" />", escape(type_name));
            } else {
                let _ = write!(out, "<set type=\"{}\">", escape(type_name));
                for value in values {
                    domain_to_xml(value, out);
                }
                out.push_str("</set>");
            }
        }
    }
}

/// Parse one observation. The wire form carries no tick, so the caller
/// supplies the tick it was received at.
pub fn observation_from_xml(text: &str, tick: Tick) -> Result<Observation, WireError> {
    let mut scanner = Scanner::new(text);
    let tag = scanner.next_tag()?.ok_or(WireError::UnexpectedEnd)?;
    if tag.name != "Observation" || tag.kind == TagKind::Close {
        return Err(WireError::UnexpectedElement(tag.name));
    }

    let on = tag.required("on")?;
    let predicate = tag.required("predicate")?;
    let mut observation = Observation::new(tick, on, predicate);

    if tag.kind == TagKind::SelfClosing {
        return Ok(observation);
    }

    loop {
        let tag = scanner.next_tag()?.ok_or(WireError::UnexpectedEnd)?;
        match (tag.kind, tag.name.as_str()) {
            (TagKind::Close, "Observation") => break,
            (TagKind::Open, "Assert") => {
                let name = tag.required("name")?;
                let inner = scanner.next_tag()?.ok_or(WireError::UnexpectedEnd)?;
                let domain = domain_from_tag(&mut scanner, inner)?;
                let close = scanner.next_tag()?.ok_or(WireError::UnexpectedEnd)?;
                if close.kind != TagKind::Close || close.name != "Assert" {
                    return Err(WireError::UnexpectedElement(close.name));
                }
                observation = observation.with_param(name, domain);
            }
            _ => return Err(WireError::UnexpectedElement(tag.name)),
        }
    }

    Ok(observation)
}

fn domain_from_tag(scanner: &mut Scanner<'_>, tag: Tag) -> Result<Domain, WireError> {
    match tag.name.as_str() {
        "value" => {
            let type_name = tag.required("type")?;
            let name = tag.required("name")?;
            match type_name.as_str() {
                "bool" => {
                    if name == "true" {
                        Ok(Domain::Bool(true))
                    } else if name == "false" {
                        Ok(Domain::Bool(false))
                    } else {
                        Err(WireError::BadValue {
                            what: "bool",
                            value: name,
                        })
                    }
                }
                "int" => name.parse().map(Domain::Int).map_err(|_| WireError::BadValue {
                    what: "int",
                    value: name,
                }),
                _ => name
                    .parse()
                    .map(Domain::Float)
                    .map_err(|_| WireError::BadValue {
                        what: "float",
                        value: name,
                    }),
            }
        }
        "symbol" => Ok(Domain::Symbol {
            type_name: tag.required("type")?,
            value: tag.required("value")?,
        }),
        "object" => Ok(Domain::Object(tag.required("value")?)),
        "interval" => {
            let type_name = tag.required("type")?;
            let min = tag.required("min")?;
            let max = tag.required("max")?;
            if type_name == "int" {
                let min = parse_int_bound(&min).ok_or(WireError::BadValue {
                    what: "interval bound",
                    value: min,
                })?;
                let max = parse_int_bound(&max).ok_or(WireError::BadValue {
                    what: "interval bound",
                    value: max,
                })?;
                Ok(Domain::IntInterval { min, max })
            } else {
                let min = parse_float_bound(&min).ok_or(WireError::BadValue {
                    what: "interval bound",
                    value: min,
                })?;
                let max = parse_float_bound(&max).ok_or(WireError::BadValue {
                    what: "interval bound",
                    value: max,
                })?;
                Ok(Domain::FloatInterval { min, max })
            }
        }
        "set" => {
            let type_name = tag.required("type")?;
            let mut values = Vec::new();
            if tag.kind == TagKind::Open {
                loop {
                    let inner = scanner.next_tag()?.ok_or(WireError::UnexpectedEnd)?;
                    if inner.kind == TagKind::Close && inner.name == "set" {
                        break;
                    }
                    values.push(domain_from_tag(scanner, inner)?);
                }
            }
            Ok(Domain::Set { type_name, values })
        }
        _ => Err(WireError::UnexpectedElement(tag.name)),
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn unescape(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&gt;", ">")
        .replace("&lt;", "<")
        .replace("&amp;", "&")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
    Open,
    SelfClosing,
    Close,
}

struct Tag {
    name: String,
    attrs: Vec<(String, String)>,
    kind: TagKind,
}

impl Tag {
    fn required(&self, attribute: &'static str) -> Result<String, WireError> {
        self.attrs
            .iter()
            .find(|(name, _)| name == attribute)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| WireError::MissingAttribute {
                element: self.name.clone(),
                attribute,
            })
    }
}

struct Scanner<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            input: text.as_bytes(),
            pos: 0,
        }
    }

    /// Advance to the next tag, skipping any intervening text.
    fn next_tag(&mut self) -> Result<Option<Tag>, WireError> {
        while self.pos < self.input.len() && self.input[self.pos] != b'<' {
            self.pos += 1;
        }
        if self.pos >= self.input.len() {
            return Ok(None);
        }
        let start = self.pos;
        self.pos += 1;

        let closing = self.peek() == Some(b'/');
        if closing {
            self.pos += 1;
        }

        let name = self.read_name();
        if name.is_empty() {
            return Err(WireError::Malformed(start));
        }

        let mut attrs = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(b'>') => {
                    self.pos += 1;
                    let kind = if closing { TagKind::Close } else { TagKind::Open };
                    return Ok(Some(Tag { name, attrs, kind }));
                }
                Some(b'/') => {
                    self.pos += 1;
                    if self.peek() != Some(b'>') {
                        return Err(WireError::Malformed(self.pos));
                    }
                    self.pos += 1;
                    return Ok(Some(Tag {
                        name,
                        attrs,
                        kind: TagKind::SelfClosing,
                    }));
                }
                Some(_) if !closing => {
                    let attr_name = self.read_name();
                    if attr_name.is_empty() || self.peek() != Some(b'=') {
                        return Err(WireError::Malformed(self.pos));
                    }
                    self.pos += 1;
                    if self.peek() != Some(b'"') {
                        return Err(WireError::Malformed(self.pos));
                    }
                    self.pos += 1;
                    let value_start = self.pos;
                    while self.peek().is_some_and(|b| b != b'"') {
                        self.pos += 1;
                    }
                    if self.peek().is_none() {
                        return Err(WireError::UnexpectedEnd);
                    }
                    let raw = std::str::from_utf8(&self.input[value_start..self.pos])
                        .map_err(|_| WireError::Malformed(value_start))?;
                    self.pos += 1;
                    attrs.push((attr_name, unescape(raw)));
                }
                _ => return Err(WireError::Malformed(self.pos)),
            }
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn read_name(&mut self) -> String {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(observation: &Observation) -> Observation {
        let xml = observation_to_xml(observation);
        observation_from_xml(&xml, observation.tick()).expect("parse")
    }

    #[test]
    fn empty_parameter_list_is_self_closing() {
        let observation = Observation::new(3, "t", "PredA");
        let xml = observation_to_xml(&observation);
        assert_eq!(xml, "<Observation on=\"t\" predicate=\"PredA\" />");

        let back = round_trip(&observation);
        assert_eq!(back.object(), "t");
        assert_eq!(back.predicate(), "PredA");
        assert_eq!(back.parameter_count(), 0);
    }

    #[test]
    fn singletons_round_trip() {
        let observation = Observation::new(7, "nav", "At")
            .with_param("ok", Domain::Bool(true))
            .with_param("x", Domain::Int(-4))
            .with_param("depth", Domain::Float(12.25))
            .with_param("mode", Domain::symbol("NavMode", "survey"))
            .with_param("vehicle", Domain::object("auv1"));

        let back = round_trip(&observation);
        assert_eq!(back.parameters(), observation.parameters());
    }

    #[test]
    fn intervals_serialize_infinities_symbolically() {
        let observation = Observation::new(1, "t", "P")
            .with_param("window", Domain::int_interval(2, i64::MAX))
            .with_param("speed", Domain::float_interval(f64::NEG_INFINITY, 1.5));

        let xml = observation_to_xml(&observation);
        assert!(xml.contains("min=\"2\" max=\"+inf\""));
        assert!(xml.contains("min=\"-inf\" max=\"1.5\""));

        let back = round_trip(&observation);
        assert_eq!(back.parameters(), observation.parameters());
    }

    #[test]
    fn sets_round_trip() {
        let observation = Observation::new(2, "ctd", "Sampling").with_param(
            "stations",
            Domain::set(
                "Station",
                vec![Domain::object("s1"), Domain::object("s2")],
            ),
        );

        let back = round_trip(&observation);
        assert_eq!(back.parameters(), observation.parameters());
    }

    #[test]
    fn attribute_values_are_escaped() {
        let observation =
            Observation::new(4, "log", "Note").with_param("text", Domain::symbol("str", "a<b&\"c\""));
        let back = round_trip(&observation);
        assert_eq!(back.parameters(), observation.parameters());
    }

    #[test]
    fn rejects_foreign_elements() {
        let err = observation_from_xml("<Timeline name=\"t\" />", 0).unwrap_err();
        assert!(matches!(err, WireError::UnexpectedElement(_)));
    }
}
