use quick_xml::{Reader, escape::unescape, events::BytesStart, events::Event};
use rustc_hash::FxHashMap;

use super::{
    FIELD_KEY_PATH, FIELD_STATE_NAMESPACE, FIELD_TAG, LIFECYCLE_TAG, PROP_TAG, PROPS_TAG,
    SerializeError, WRAPPER_TAG, sniff_scalar,
};
use crate::dom::{ComponentType, DOM_ERROR, Element, GROUP, KeyPath, Props};

/// Lifecycle block of a reanimateable node, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleRecord {
    pub component: String,
    pub urn: String,
    pub key_path: Option<KeyPath>,
    pub state_namespace: Option<KeyPath>,
}

/// Markup read back into elements.
///
/// Every tag becomes a primitive named after it; rebuilding the root
/// reproduces the serialized tree's keys and props.
#[derive(Debug, Default)]
pub struct ParsedDom {
    pub root: Option<Element>,
    pub lifecycle: Vec<LifecycleRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Props,
    Lifecycle,
}

struct Frame {
    name: String,
    props: Props,
    record: Option<usize>,
}

#[derive(Default)]
struct Parser {
    types: FxHashMap<String, ComponentType>,
    stack: Vec<Frame>,
    section: Option<Section>,
    lifecycle: Vec<LifecycleRecord>,
    root: Option<Element>,
}

/// Parse markup written by [`serialize_dom`](super::serialize_dom).
pub fn parse_dom(xml: &str) -> Result<ParsedDom, SerializeError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut parser = Parser::default();
    let mut opened = false;
    let mut closed = false;

    loop {
        let event = reader.read_event().map_err(|e| {
            SerializeError::Malformed(format!("{e} at position {}", reader.error_position()))
        })?;
        match &event {
            Event::Start(tag) | Event::Empty(tag) if !opened => {
                if tag_name(tag)? != WRAPPER_TAG {
                    return Err(SerializeError::MissingWrapper);
                }
                opened = true;
                closed = matches!(event, Event::Empty(_));
            }
            Event::Start(tag) | Event::Empty(tag) if closed => {
                return Err(SerializeError::UnexpectedTag(tag_name(tag)?));
            }
            Event::Start(tag) => parser.open(tag, false)?,
            Event::Empty(tag) => parser.open(tag, true)?,
            Event::End(tag) => {
                let name = std::str::from_utf8(tag.name().as_ref())
                    .map_err(|e| SerializeError::Malformed(e.to_string()))?
                    .to_string();
                parser.close(&name, &mut closed)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !opened {
        return Err(SerializeError::MissingWrapper);
    }
    if !closed || !parser.stack.is_empty() {
        return Err(SerializeError::Malformed("unexpected end of document".into()));
    }
    Ok(ParsedDom {
        root: parser.root,
        lifecycle: parser.lifecycle,
    })
}

impl Parser {
    fn open(&mut self, tag: &BytesStart<'_>, empty: bool) -> Result<(), SerializeError> {
        let name = tag_name(tag)?;

        if let Some(section) = self.section {
            let entry = match section {
                Section::Props => PROP_TAG,
                Section::Lifecycle => FIELD_TAG,
            };
            if name != entry {
                return Err(SerializeError::UnexpectedTag(name));
            }
            return self.entry(section, tag);
        }

        let block = match name.as_str() {
            PROPS_TAG => Some(Section::Props),
            LIFECYCLE_TAG => Some(Section::Lifecycle),
            _ => None,
        };
        let misplaced = match block {
            Some(_) => self.stack.is_empty(),
            None => name == PROP_TAG || name == FIELD_TAG,
        };
        if misplaced {
            return Err(SerializeError::UnexpectedTag(name));
        }

        if let Some(block) = block {
            self.section = (!empty).then_some(block);
            return Ok(());
        }
        self.node(name, tag)?;
        if empty {
            self.finish()?;
        }
        Ok(())
    }

    fn close(&mut self, name: &str, closed: &mut bool) -> Result<(), SerializeError> {
        match name {
            PROPS_TAG | LIFECYCLE_TAG => self.section = None,
            PROP_TAG | FIELD_TAG if self.section.is_some() => {}
            WRAPPER_TAG if self.stack.is_empty() => *closed = true,
            _ => self.finish()?,
        }
        Ok(())
    }

    /// Start a node frame from a tag and its attributes.
    fn node(&mut self, name: String, tag: &BytesStart<'_>) -> Result<(), SerializeError> {
        let mut props = Props::new();
        let mut urn = None;
        for (attr, value) in attributes(tag)? {
            match attr.as_str() {
                "key" => props.key = Some(value),
                "xmlns" => urn = Some(value),
                _ => {
                    props.values.insert(attr, sniff_scalar(&value));
                }
            }
        }

        let record = urn.map(|urn| {
            self.lifecycle.push(LifecycleRecord {
                component: name.clone(),
                urn,
                key_path: None,
                state_namespace: None,
            });
            self.lifecycle.len() - 1
        });
        self.stack.push(Frame {
            name,
            props,
            record,
        });
        Ok(())
    }

    /// Read a `prop` or `field` entry into the innermost frame.
    fn entry(&mut self, section: Section, tag: &BytesStart<'_>) -> Result<(), SerializeError> {
        let mut name = None;
        let mut value = None;
        for (attr, text) in attributes(tag)? {
            match attr.as_str() {
                "name" => name = Some(text),
                "value" => value = Some(text),
                _ => {}
            }
        }
        let (Some(name), Some(value)) = (name, value) else {
            return Err(SerializeError::Malformed(format!(
                "<{}> needs `name` and `value`",
                tag_name(tag)?
            )));
        };
        let Some(frame) = self.stack.last_mut() else {
            return Err(SerializeError::UnexpectedTag(tag_name(tag)?));
        };

        match section {
            Section::Props => {
                let json = serde_json::from_str(&value)
                    .map_err(|source| SerializeError::Json { name: name.clone(), source })?;
                frame.props.values.insert(name, json);
            }
            Section::Lifecycle => {
                let path = KeyPath::from_json_str(&value)
                    .map_err(|source| SerializeError::Json { name: name.clone(), source })?;
                if let Some(record) = frame.record.and_then(|i| self.lifecycle.get_mut(i)) {
                    match name.as_str() {
                        FIELD_KEY_PATH => record.key_path = Some(path),
                        FIELD_STATE_NAMESPACE => record.state_namespace = Some(path),
                        _ => {}
                    }
                }
            }
        }
        Ok(())
    }

    /// Close the innermost frame and attach it to its parent.
    fn finish(&mut self) -> Result<(), SerializeError> {
        let Some(frame) = self.stack.pop() else {
            return Err(SerializeError::Malformed("unbalanced closing tag".into()));
        };
        let component = self.component(&frame.name);
        let element = Element::unbound(component, frame.props);

        match self.stack.last_mut() {
            Some(parent) => parent.props.children.push(element),
            None if self.root.is_some() => return Err(SerializeError::MultipleRoots),
            None => self.root = Some(element),
        }
        Ok(())
    }

    fn component(&mut self, name: &str) -> ComponentType {
        match name {
            GROUP => ComponentType::group(),
            DOM_ERROR => ComponentType::dom_error(),
            _ => self
                .types
                .entry(name.to_string())
                .or_insert_with(|| ComponentType::primitive(name))
                .clone(),
        }
    }
}

fn tag_name(tag: &BytesStart<'_>) -> Result<String, SerializeError> {
    std::str::from_utf8(tag.name().as_ref())
        .map(str::to_string)
        .map_err(|e| SerializeError::Malformed(e.to_string()))
}

fn attributes(tag: &BytesStart<'_>) -> Result<Vec<(String, String)>, SerializeError> {
    tag.attributes()
        .map(|attr| {
            let attr = attr.map_err(|e| SerializeError::Malformed(e.to_string()))?;
            let key = std::str::from_utf8(attr.key.as_ref())
                .map_err(|e| SerializeError::Malformed(e.to_string()))?;
            let raw = std::str::from_utf8(&attr.value)
                .map_err(|e| SerializeError::Malformed(e.to_string()))?;
            let value = unescape(raw).map_err(|e| SerializeError::Malformed(e.to_string()))?;
            Ok((key.to_string(), value.into_owned()))
        })
        .collect()
}
