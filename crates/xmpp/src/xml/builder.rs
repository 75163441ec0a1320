use std::borrow::Cow;

use quick_xml::escape::partial_escape;
use tracing::warn;

use crate::stanza::ExtensionElement;

/// Incremental XML writer with byte-stable output.
///
/// Attributes are written in call order and no whitespace is ever inserted,
/// so identical call sequences always produce identical strings.
#[derive(Debug, Default)]
pub struct XmlBuilder {
    buf: String,
    open: Vec<String>,
    tag_open: bool,
}

impl XmlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `<name`. The tag stays open for attributes until a child, text,
    /// `right_angle_bracket` or `close_element` follows.
    pub fn open_element(&mut self, name: &str) -> &mut Self {
        self.right_angle_bracket();
        self.buf.push('<');
        self.buf.push_str(name);
        self.open.push(name.to_string());
        self.tag_open = true;
        self
    }

    /// Ignored, with a warning, once the start tag has been terminated.
    pub fn attribute(&mut self, name: &str, value: &str) -> &mut Self {
        if !self.tag_open {
            warn!(attribute = name, "Attribute written outside a start tag, dropping it");
            return self;
        }
        self.buf.push(' ');
        self.buf.push_str(name);
        self.buf.push_str("='");
        self.buf.push_str(&escape_attribute(value));
        self.buf.push('\'');
        self
    }

    pub fn opt_attribute(&mut self, name: &str, value: Option<&str>) -> &mut Self {
        if let Some(value) = value {
            self.attribute(name, value);
        }
        self
    }

    pub fn xmlns(&mut self, namespace: &str) -> &mut Self {
        self.attribute("xmlns", namespace)
    }

    /// Terminate the current start tag with `>`. No-op when already done.
    pub fn right_angle_bracket(&mut self) -> &mut Self {
        if self.tag_open {
            self.buf.push('>');
            self.tag_open = false;
        }
        self
    }

    pub fn text(&mut self, text: &str) -> &mut Self {
        self.right_angle_bracket();
        self.buf.push_str(&partial_escape(text));
        self
    }

    /// `<name>text</name>`, even for an empty `text`.
    pub fn element(&mut self, name: &str, text: &str) -> &mut Self {
        self.open_element(name);
        self.right_angle_bracket();
        self.text(text);
        self.close_element()
    }

    pub fn opt_element(&mut self, name: &str, text: Option<&str>) -> &mut Self {
        if let Some(text) = text {
            self.element(name, text);
        }
        self
    }

    pub fn bool_element(&mut self, name: &str, value: bool) -> &mut Self {
        self.element(name, if value { "true" } else { "false" })
    }

    /// `<name/>`
    pub fn empty_element(&mut self, name: &str) -> &mut Self {
        self.open_element(name);
        self.close_element()
    }

    /// Close the innermost open element: `/>` if its start tag is still open,
    /// `</name>` otherwise.
    pub fn close_element(&mut self) -> &mut Self {
        debug_assert!(!self.open.is_empty(), "close_element without an open element");
        let Some(name) = self.open.pop() else {
            return self;
        };
        if self.tag_open {
            self.buf.push_str("/>");
            self.tag_open = false;
        } else {
            self.buf.push_str("</");
            self.buf.push_str(&name);
            self.buf.push('>');
        }
        self
    }

    pub fn append_extension(&mut self, extension: &dyn ExtensionElement) -> &mut Self {
        extension.write_xml(self);
        self
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    /// Close anything still open and return the document.
    pub fn finish(mut self) -> String {
        while !self.open.is_empty() {
            self.close_element();
        }
        self.buf
    }
}

/// Attribute values are single-quoted, so `'` is escaped on top of the
/// text set.
fn escape_attribute(value: &str) -> Cow<'_, str> {
    if !value.contains(['\'', '<', '>', '&']) {
        return Cow::Borrowed(value);
    }
    let mut escaped = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '\'' => escaped.push_str("&apos;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            other => escaped.push(other),
        }
    }
    Cow::Owned(escaped)
}
