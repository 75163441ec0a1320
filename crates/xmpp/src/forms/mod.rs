//! XEP-0004 data forms as used by the rights and restrictions queries.

mod edit;

pub use edit::{FormEdit, Pick};

use std::fmt;
use std::str::FromStr;

use crate::error::{FormError, ParseError};
use crate::ns;
use crate::stanza::ExtensionElement;
use crate::xml::{XmlBuilder, XmlCursor, XmlEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormType {
    Form,
    Submit,
    Cancel,
    Result,
}

impl FormType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormType::Form => "form",
            FormType::Submit => "submit",
            FormType::Cancel => "cancel",
            FormType::Result => "result",
        }
    }
}

impl FromStr for FormType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "form" => Ok(FormType::Form),
            "submit" => Ok(FormType::Submit),
            "cancel" => Ok(FormType::Cancel),
            "result" => Ok(FormType::Result),
            other => Err(ParseError::InvalidValue {
                field: "x@type".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Boolean,
    Fixed,
    Hidden,
    JidMulti,
    JidSingle,
    ListMulti,
    ListSingle,
    TextMulti,
    TextPrivate,
    TextSingle,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Boolean => "boolean",
            FieldType::Fixed => "fixed",
            FieldType::Hidden => "hidden",
            FieldType::JidMulti => "jid-multi",
            FieldType::JidSingle => "jid-single",
            FieldType::ListMulti => "list-multi",
            FieldType::ListSingle => "list-single",
            FieldType::TextMulti => "text-multi",
            FieldType::TextPrivate => "text-private",
            FieldType::TextSingle => "text-single",
        }
    }

    pub fn is_multi(&self) -> bool {
        matches!(
            self,
            FieldType::JidMulti | FieldType::ListMulti | FieldType::TextMulti
        )
    }
}

impl FromStr for FieldType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "boolean" => FieldType::Boolean,
            "fixed" => FieldType::Fixed,
            "hidden" => FieldType::Hidden,
            "jid-multi" => FieldType::JidMulti,
            "jid-single" => FieldType::JidSingle,
            "list-multi" => FieldType::ListMulti,
            "list-single" => FieldType::ListSingle,
            "text-multi" => FieldType::TextMulti,
            "text-private" => FieldType::TextPrivate,
            "text-single" => FieldType::TextSingle,
            other => {
                return Err(ParseError::InvalidValue {
                    field: "field@type".to_string(),
                    value: other.to_string(),
                })
            }
        })
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormOption {
    pub label: Option<String>,
    pub value: String,
}

impl FormOption {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            label: None,
            value: value.into(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormField {
    pub var: Option<String>,
    pub field_type: Option<FieldType>,
    pub label: Option<String>,
    pub desc: Option<String>,
    pub required: bool,
    pub values: Vec<String>,
    pub options: Vec<FormOption>,
}

impl FormField {
    pub fn new(var: impl Into<String>) -> Self {
        Self {
            var: Some(var.into()),
            ..Self::default()
        }
    }

    pub fn with_type(mut self, field_type: FieldType) -> Self {
        self.field_type = Some(field_type);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.values.push(value.into());
        self
    }

    pub fn with_option(mut self, option: FormOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn first_value(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }

    fn write_xml(&self, xml: &mut XmlBuilder) {
        xml.open_element("field")
            .opt_attribute("var", self.var.as_deref())
            .opt_attribute("type", self.field_type.as_ref().map(FieldType::as_str))
            .opt_attribute("label", self.label.as_deref());
        xml.opt_element("desc", self.desc.as_deref());
        if self.required {
            xml.empty_element("required");
        }
        for value in &self.values {
            xml.element("value", value);
        }
        for option in &self.options {
            xml.open_element("option")
                .opt_attribute("label", option.label.as_deref())
                .element("value", &option.value)
                .close_element();
        }
        xml.close_element();
    }

    fn parse(cursor: &mut XmlCursor<'_>) -> Result<Self, ParseError> {
        let XmlEvent::StartTag(tag) = cursor.event() else {
            return Ok(Self::default());
        };
        let mut field = Self {
            var: tag.attribute("var").map(str::to_string),
            field_type: tag.attribute("type").map(str::parse::<FieldType>).transpose()?,
            label: tag.attribute("label").map(str::to_string),
            ..Self::default()
        };
        let depth = cursor.depth();

        loop {
            cursor.next()?;
            let child = match cursor.event() {
                XmlEvent::StartTag(child) => child.name().to_string(),
                XmlEvent::EndTag(_) if cursor.depth() == depth => break,
                XmlEvent::EndDocument => break,
                _ => continue,
            };
            match child.as_str() {
                "value" => field.values.push(cursor.read_text()?),
                "desc" => field.desc = Some(cursor.read_text()?),
                "required" => {
                    field.required = true;
                    cursor.skip_element()?;
                }
                "option" => field.options.push(parse_option(cursor)?),
                _ => cursor.skip_element()?,
            }
        }

        Ok(field)
    }
}

fn parse_option(cursor: &mut XmlCursor<'_>) -> Result<FormOption, ParseError> {
    let label = match cursor.event() {
        XmlEvent::StartTag(tag) => tag.attribute("label").map(str::to_string),
        _ => None,
    };
    let depth = cursor.depth();
    let mut value = None;

    loop {
        cursor.next()?;
        let is_value = match cursor.event() {
            XmlEvent::StartTag(child) => child.name() == "value",
            XmlEvent::EndTag(_) if cursor.depth() == depth => break,
            XmlEvent::EndDocument => break,
            _ => continue,
        };
        if is_value {
            value = Some(cursor.read_text()?);
        } else {
            cursor.skip_element()?;
        }
    }

    let value = value.ok_or_else(|| ParseError::MissingChild {
        element: "option".to_string(),
        child: "value".to_string(),
    })?;
    Ok(FormOption { label, value })
}

/// An ordered set of fields. Variable names are unique within one form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataForm {
    pub form_type: FormType,
    pub title: Option<String>,
    pub instructions: Vec<String>,
    fields: Vec<FormField>,
}

impl DataForm {
    pub fn new(form_type: FormType) -> Self {
        Self {
            form_type,
            title: None,
            instructions: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    pub fn field(&self, var: &str) -> Option<&FormField> {
        self.fields
            .iter()
            .find(|field| field.var.as_deref() == Some(var))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Append a field. Fields without a variable (e.g. `fixed` headings) are
    /// always accepted.
    pub fn add_field(&mut self, field: FormField) -> Result<(), FormError> {
        if let Some(var) = field.var.as_deref() {
            if self.field(var).is_some() {
                return Err(FormError::DuplicateVariable(var.to_string()));
            }
        }
        self.fields.push(field);
        Ok(())
    }

    /// Parse `<x xmlns='jabber:x:data'/>` with the cursor on its start tag;
    /// leaves the cursor on the matching end tag.
    pub fn parse(cursor: &mut XmlCursor<'_>) -> Result<Self, ParseError> {
        let form_type = match cursor.event() {
            XmlEvent::StartTag(tag) if tag.is("x", ns::DATA_FORMS) => {
                tag.attribute("type").unwrap_or("form").parse::<FormType>()?
            }
            XmlEvent::StartTag(tag) => {
                return Err(ParseError::UnexpectedElement {
                    expected: "x".to_string(),
                    found: tag.name().to_string(),
                })
            }
            _ => {
                return Err(ParseError::MissingChild {
                    element: "query".to_string(),
                    child: "x".to_string(),
                })
            }
        };
        let mut form = Self::new(form_type);
        let depth = cursor.depth();

        loop {
            cursor.next()?;
            let child = match cursor.event() {
                XmlEvent::StartTag(child) => child.name().to_string(),
                XmlEvent::EndTag(_) if cursor.depth() == depth => break,
                XmlEvent::EndDocument => break,
                _ => continue,
            };
            match child.as_str() {
                "title" => form.title = Some(cursor.read_text()?),
                "instructions" => form.instructions.push(cursor.read_text()?),
                "field" => {
                    let field = FormField::parse(cursor)?;
                    form.add_field(field).map_err(|e| ParseError::InvalidValue {
                        field: "field@var".to_string(),
                        value: e.to_string(),
                    })?;
                }
                _ => cursor.skip_element()?,
            }
        }

        Ok(form)
    }
}

/// Scan the element under the cursor for a nested data form, leaving the
/// cursor on the element's end tag.
///
/// Returns `None` when no form appears before the end tag, or when the
/// document ends before the element is closed.
pub(crate) fn scan_for_form(cursor: &mut XmlCursor<'_>) -> Result<Option<DataForm>, ParseError> {
    let depth = cursor.depth();
    let mut form = None;

    loop {
        cursor.next()?;
        let is_form = match cursor.event() {
            XmlEvent::StartTag(tag) => tag.is("x", ns::DATA_FORMS),
            XmlEvent::EndTag(_) if cursor.depth() == depth => break,
            XmlEvent::EndDocument => return Ok(None),
            _ => continue,
        };
        if is_form && form.is_none() {
            form = Some(DataForm::parse(cursor)?);
        } else {
            cursor.skip_element()?;
        }
    }

    Ok(form)
}

impl ExtensionElement for DataForm {
    fn element_name(&self) -> &'static str {
        "x"
    }

    fn namespace(&self) -> &'static str {
        ns::DATA_FORMS
    }

    fn write_xml(&self, xml: &mut XmlBuilder) {
        xml.open_element("x")
            .xmlns(ns::DATA_FORMS)
            .attribute("type", self.form_type.as_str());
        xml.opt_element("title", self.title.as_deref());
        for instructions in &self.instructions {
            xml.element("instructions", instructions);
        }
        for field in &self.fields {
            field.write_xml(xml);
        }
        xml.close_element();
    }
}
