use serde::Deserialize;
use serde_json::{Map, Value};

/// Opaque display fields handed through to the renderer.
pub type DisplayData = Map<String, Value>;

/// One entry of a node's `children` array.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ChildDescriptor {
    #[serde(alias = "id", deserialize_with = "string_or_number")]
    pub uid: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default, rename = "lineColour")]
    pub line_colour: Option<String>,
    #[serde(flatten)]
    pub display: DisplayData,
}

impl ChildDescriptor {
    #[cfg(test)]
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            kind: None,
            line_colour: None,
            display: DisplayData::new(),
        }
    }

    #[cfg(test)]
    pub fn with_title(mut self, title: &str) -> Self {
        self.display
            .insert("title".to_owned(), Value::String(title.to_owned()));
        self
    }
}

/// A fetched node: its own display fields plus its children.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct NodeDescriptor {
    #[serde(default, rename = "nodeId")]
    pub node_id: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default, rename = "lineColour")]
    pub line_colour: Option<String>,
    #[serde(default)]
    pub children: Vec<ChildDescriptor>,
    #[serde(flatten)]
    pub display: DisplayData,
}

impl NodeDescriptor {
    #[cfg(test)]
    pub fn with_children(children: Vec<ChildDescriptor>) -> Self {
        Self {
            children,
            ..Self::default()
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(value) => Ok(value),
        Value::Number(value) => Ok(value.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number id, found {other}"
        ))),
    }
}

/// Read a display field as text, accepting numbers too.
pub fn display_text<'a>(display: &'a DisplayData, key: &str) -> Option<std::borrow::Cow<'a, str>> {
    match display.get(key)? {
        Value::String(text) => Some(std::borrow::Cow::Borrowed(text.as_str())),
        Value::Number(number) => Some(std::borrow::Cow::Owned(number.to_string())),
        Value::Bool(flag) => Some(std::borrow::Cow::Owned(flag.to_string())),
        _ => None,
    }
}
