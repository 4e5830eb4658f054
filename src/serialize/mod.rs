//! Markup form of built trees.
//!
//! ```xml
//! <Stackdom>
//!   <Group key="Group">
//!     <Web key="Web" image="nginx" port="80">
//!       <__props__>
//!         <prop name="env" value="{&quot;MODE&quot;:&quot;prod&quot;}"/>
//!       </__props__>
//!     </Web>
//!   </Group>
//! </Stackdom>
//! ```
//!
//! Scalars whose text reads back as the same JSON value are attributes.
//! Everything else (arrays, objects, nulls, handle references, reserved or
//! non-XML names) goes into the `__props__` block as JSON.
//!
//! In reanimateable mode every node also gets an `xmlns` component URN and
//! a `__lifecycle__` block with its key-path and state namespace.

mod reader;
mod writer;

pub use reader::{LifecycleRecord, ParsedDom, parse_dom};
pub use writer::serialize_dom;

use thiserror::Error;

pub(crate) const WRAPPER_TAG: &str = "Stackdom";
pub(crate) const PROPS_TAG: &str = "__props__";
pub(crate) const PROP_TAG: &str = "prop";
pub(crate) const LIFECYCLE_TAG: &str = "__lifecycle__";
pub(crate) const FIELD_TAG: &str = "field";
pub(crate) const HANDLE_MARKER: &str = "__handle__";

pub(crate) const FIELD_KEY_PATH: &str = "keyPath";
pub(crate) const FIELD_STATE_NAMESPACE: &str = "stateNamespace";

#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("failed to write markup: {0}")]
    Write(String),

    #[error("malformed markup: {0}")]
    Malformed(String),

    #[error("missing <{WRAPPER_TAG}> document element")]
    MissingWrapper,

    #[error("unexpected <{0}> element")]
    UnexpectedTag(String),

    #[error("component name `{0}` cannot be written as an element")]
    InvalidName(String),

    #[error("document has more than one root element")]
    MultipleRoots,

    #[error("invalid JSON in `{name}`")]
    Json {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Add component URNs and lifecycle blocks.
    pub reanimateable: bool,
    /// Spaces per nesting level; 0 writes everything on one line.
    pub indent: usize,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            reanimateable: false,
            indent: 2,
        }
    }
}

/// Read attribute text back into the JSON value it stands for.
pub(crate) fn sniff_scalar(text: &str) -> serde_json::Value {
    use serde_json::Value;

    match text {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(n) = text.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(n) = text.parse::<f64>()
        && let Some(n) = serde_json::Number::from_f64(n)
    {
        return Value::Number(n);
    }
    Value::String(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{BuildOptions, build};
    use crate::dom::{BuiltElement, ComponentType, Element};
    use crate::handle::{Handle, HandleRegistry};
    use crate::state::StateStore;
    use serde_json::{Value, json};

    fn built(root: &Element) -> BuiltElement {
        build(
            Some(root),
            None,
            &mut StateStore::new(),
            &mut HandleRegistry::new(),
            &BuildOptions::default(),
        )
        .unwrap()
        .tree
        .unwrap()
    }

    fn sample() -> Element {
        Element::builder(ComponentType::group())
            .child(
                Element::builder(ComponentType::primitive("Web"))
                    .prop("image", "nginx")
                    .prop("port", 80)
                    .prop("ratio", 0.5)
                    .prop("public", true)
                    .prop("version", "80")
                    .prop("env", json!({ "MODE": "prod" }))
                    .prop("tags", json!(["a", "<b>"]))
                    .prop("note", Value::Null)
                    .build()
                    .unwrap(),
            )
            .child(Element::with_children(ComponentType::primitive("Empty"), vec![]))
            .build()
            .unwrap()
    }

    #[test]
    fn test_sniff_scalar() {
        assert_eq!(sniff_scalar("true"), json!(true));
        assert_eq!(sniff_scalar("42"), json!(42));
        assert_eq!(sniff_scalar("-1.5"), json!(-1.5));
        assert_eq!(sniff_scalar("nginx"), json!("nginx"));
        assert_eq!(sniff_scalar("NaN"), json!("NaN"));
        assert_eq!(sniff_scalar(""), json!(""));
    }

    #[test]
    fn test_scalars_become_attributes() {
        let xml = serialize_dom(Some(&built(&sample())), &SerializeOptions::default()).unwrap();

        assert!(xml.starts_with("<Stackdom>"));
        assert!(xml.contains(r#"<Web key="Web" image="nginx" port="80" ratio="0.5" public="true">"#));
        assert!(xml.contains(r#"<Empty key="Empty"/>"#));
        assert!(xml.contains(r#"<prop name="version" value="&quot;80&quot;"/>"#));
        assert!(xml.contains(r#"<prop name="note" value="null"/>"#));
        assert!(!xml.contains("xmlns"));
        assert!(!xml.contains(LIFECYCLE_TAG));
    }

    #[test]
    fn test_parse_round_trips_through_build() {
        let tree = built(&sample());
        let xml = serialize_dom(Some(&tree), &SerializeOptions::default()).unwrap();
        let parsed = parse_dom(&xml).unwrap();

        assert!(parsed.lifecycle.is_empty());
        let rebuilt = built(&parsed.root.unwrap());
        assert_eq!(rebuilt, tree);
        let web = &rebuilt.children()[0];
        assert_eq!(web.props().get("version"), Some(&json!("80")));
        assert_eq!(web.props().get("tags"), Some(&json!(["a", "<b>"])));
    }

    #[test]
    fn test_compact_output() {
        let tree = built(&Element::with_children(ComponentType::group(), vec![]));
        let options = SerializeOptions {
            indent: 0,
            ..SerializeOptions::default()
        };
        assert_eq!(
            serialize_dom(Some(&tree), &options).unwrap(),
            r#"<Stackdom><Group key="Group"/></Stackdom>"#
        );
        assert_eq!(serialize_dom(None, &options).unwrap(), "<Stackdom/>");
        assert!(parse_dom("<Stackdom/>").unwrap().root.is_none());
    }

    #[test]
    fn test_reanimateable_lifecycle() {
        let app = ComponentType::composite("App", |_, _| {
            Ok(Some(Element::with_children(
                ComponentType::group(),
                vec![Element::with_children(ComponentType::primitive("Empty"), vec![])],
            )))
        });
        let tree = built(&Element::with_children(app, vec![]));
        let options = SerializeOptions {
            reanimateable: true,
            ..SerializeOptions::default()
        };
        let xml = serialize_dom(Some(&tree), &options).unwrap();
        assert!(xml.contains(&format!(r#"xmlns="{}""#, ComponentType::group().urn())));

        let parsed = parse_dom(&xml).unwrap();
        assert_eq!(parsed.lifecycle.len(), 2);
        let inner = &parsed.lifecycle[1];
        assert_eq!(inner.component, "Empty");
        assert_eq!(
            inner.key_path,
            Some(["App-Group", "Empty"].into_iter().collect())
        );
        assert_eq!(inner.state_namespace, inner.key_path);
        assert_eq!(
            inner.state_namespace.as_ref(),
            Some(tree.children()[0].state_namespace())
        );
        assert!(inner.urn.ends_with("::Empty"));

        let rebuilt = built(&parsed.root.unwrap());
        assert_eq!(rebuilt.key(), "App-Group");
    }

    #[test]
    fn test_handle_props_serialize_to_targets() {
        let db = Handle::new();
        let root = Element::builder(ComponentType::group())
            .child(Element::builder(ComponentType::primitive("Db")).handle(&db).build().unwrap())
            .child(
                Element::builder(ComponentType::primitive("Web"))
                    .reference("database", &db)
                    .reference("cache", &Handle::new())
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();
        let xml = serialize_dom(Some(&built(&root)), &SerializeOptions::default()).unwrap();

        let parsed = parse_dom(&xml).unwrap().root.unwrap();
        let web = &parsed.children()[1];
        assert_eq!(
            web.props().get("database"),
            Some(&json!({ HANDLE_MARKER: "Group.Db" }))
        );
        assert_eq!(web.props().get("cache"), Some(&json!({ HANDLE_MARKER: null })));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_dom("<Group key=\"Group\"/>"),
            Err(SerializeError::MissingWrapper)
        ));
        assert!(matches!(
            parse_dom("<Stackdom><A/><B/></Stackdom>"),
            Err(SerializeError::MultipleRoots)
        ));
        assert!(matches!(
            parse_dom("<Stackdom><A><__props__><prop name=\"x\" value=\"{\"/></__props__></A></Stackdom>"),
            Err(SerializeError::Json { name, .. }) if name == "x"
        ));
        assert!(matches!(
            parse_dom("<Stackdom><A></B></Stackdom>"),
            Err(SerializeError::Malformed(_))
        ));
        assert!(matches!(
            parse_dom("<Stackdom><A>"),
            Err(SerializeError::Malformed(_))
        ));
        assert!(matches!(
            parse_dom("<Stackdom><prop name=\"x\" value=\"1\"/></Stackdom>"),
            Err(SerializeError::UnexpectedTag(tag)) if tag == PROP_TAG
        ));
    }

    #[test]
    fn test_parse_rejects_elements_after_wrapper() {
        assert!(matches!(
            parse_dom("<Stackdom/><Foo/>"),
            Err(SerializeError::UnexpectedTag(tag)) if tag == "Foo"
        ));
        assert!(matches!(
            parse_dom("<Stackdom><A/></Stackdom><B></B>"),
            Err(SerializeError::UnexpectedTag(tag)) if tag == "B"
        ));
    }

    #[test]
    fn test_unwritable_component_names() {
        let names = [
            PROP_TAG,
            FIELD_TAG,
            PROPS_TAG,
            LIFECYCLE_TAG,
            WRAPPER_TAG,
            "My Web",
            "a<b",
            "",
            "1st",
            "XmlThing",
        ];
        for name in names {
            let tree = built(&Element::with_children(ComponentType::primitive(name), vec![]));
            assert!(
                matches!(
                    serialize_dom(Some(&tree), &SerializeOptions::default()),
                    Err(SerializeError::InvalidName(n)) if n == name
                ),
                "{name:?} should be refused"
            );
        }

        let nested = Element::with_children(
            ComponentType::group(),
            vec![Element::with_children(ComponentType::primitive("field"), vec![])],
        );
        assert!(serialize_dom(Some(&built(&nested)), &SerializeOptions::default()).is_err());
    }

    #[test]
    fn test_unusual_valid_names_round_trip() {
        let root = Element::with_children(
            ComponentType::primitive("my-web.v2"),
            vec![Element::with_children(ComponentType::primitive("_inner"), vec![])],
        );
        let tree = built(&root);
        let xml = serialize_dom(Some(&tree), &SerializeOptions::default()).unwrap();
        let rebuilt = built(&parse_dom(&xml).unwrap().root.unwrap());
        assert_eq!(rebuilt, tree);
        assert_eq!(rebuilt.children()[0].name(), "_inner");
    }
}
