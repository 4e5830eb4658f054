use quick_xml::{
    Writer,
    events::{BytesEnd, BytesStart, Event},
};
use serde_json::{Value, json};
use std::io::{Cursor, Write};

use super::{
    FIELD_KEY_PATH, FIELD_STATE_NAMESPACE, FIELD_TAG, HANDLE_MARKER, LIFECYCLE_TAG, PROP_TAG,
    PROPS_TAG, SerializeError, SerializeOptions, WRAPPER_TAG, sniff_scalar,
};
use crate::dom::BuiltElement;
use crate::handle::Handle;

/// Render a built tree as markup.
pub fn serialize_dom(
    tree: Option<&BuiltElement>,
    options: &SerializeOptions,
) -> Result<String, SerializeError> {
    let mut writer = if options.indent > 0 {
        Writer::new_with_indent(Cursor::new(Vec::new()), b' ', options.indent)
    } else {
        Writer::new(Cursor::new(Vec::new()))
    };

    match tree {
        None => write(&mut writer, Event::Empty(BytesStart::new(WRAPPER_TAG)))?,
        Some(tree) => {
            write(&mut writer, Event::Start(BytesStart::new(WRAPPER_TAG)))?;
            write_node(&mut writer, tree, options)?;
            write(&mut writer, Event::End(BytesEnd::new(WRAPPER_TAG)))?;
        }
    }

    String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| SerializeError::Write(e.to_string()))
}

fn write_node<W: Write>(
    writer: &mut Writer<W>,
    node: &BuiltElement,
    options: &SerializeOptions,
) -> Result<(), SerializeError> {
    if !is_element_name(node.name()) {
        return Err(SerializeError::InvalidName(node.name().to_string()));
    }
    let mut start = BytesStart::new(node.name());
    start.push_attribute(("key", node.key()));
    if options.reanimateable {
        start.push_attribute(("xmlns", node.component().urn().as_str()));
    }

    let mut json_props = Vec::new();
    for (name, value) in &node.props().values {
        match attribute_text(name, value) {
            Some(text) => start.push_attribute((name.as_str(), text.as_str())),
            None => json_props.push((name.as_str(), value.to_string())),
        }
    }
    for (name, handle) in &node.props().refs {
        json_props.push((name.as_str(), handle_json(handle).to_string()));
    }

    if json_props.is_empty() && !options.reanimateable && node.children().is_empty() {
        return write(writer, Event::Empty(start));
    }

    write(writer, Event::Start(start.borrow()))?;
    if !json_props.is_empty() {
        write_block(writer, PROPS_TAG, PROP_TAG, &json_props)?;
    }
    if options.reanimateable {
        write_block(
            writer,
            LIFECYCLE_TAG,
            FIELD_TAG,
            &[
                (FIELD_KEY_PATH, node.key_path().to_json_string()),
                (FIELD_STATE_NAMESPACE, node.state_namespace().to_json_string()),
            ],
        )?;
    }
    for child in node.children() {
        write_node(writer, child, options)?;
    }
    write(writer, Event::End(BytesEnd::new(node.name())))
}

/// `<block><entry name=".." value=".."/>...</block>`
fn write_block<W: Write>(
    writer: &mut Writer<W>,
    block: &str,
    entry: &str,
    items: &[(&str, String)],
) -> Result<(), SerializeError> {
    write(writer, Event::Start(BytesStart::new(block)))?;
    for (name, value) in items {
        let mut start = BytesStart::new(entry);
        start.push_attribute(("name", *name));
        start.push_attribute(("value", value.as_str()));
        write(writer, Event::Empty(start))?;
    }
    write(writer, Event::End(BytesEnd::new(block)))
}

fn write<W: Write>(writer: &mut Writer<W>, event: Event<'_>) -> Result<(), SerializeError> {
    writer
        .write_event(event)
        .map_err(|e| SerializeError::Write(e.to_string()))
}

/// Attribute text for a prop, if it reads back unchanged.
fn attribute_text(name: &str, value: &Value) -> Option<String> {
    if !is_attribute_name(name) {
        return None;
    }
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (sniff_scalar(&text) == *value).then_some(text)
}

fn is_attribute_name(name: &str) -> bool {
    is_xml_name(name) && name != "key" && !name.starts_with("xml") && !name.starts_with("__")
}

/// Component names the reader would take for markup structure are refused.
fn is_element_name(name: &str) -> bool {
    is_xml_name(name)
        && !name.to_ascii_lowercase().starts_with("xml")
        && !matches!(
            name,
            WRAPPER_TAG | PROPS_TAG | PROP_TAG | LIFECYCLE_TAG | FIELD_TAG
        )
}

fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn handle_json(handle: &Handle) -> Value {
    match handle.target() {
        Some(path) => json!({ HANDLE_MARKER: path.to_string() }),
        None => json!({ HANDLE_MARKER: null }),
    }
}
