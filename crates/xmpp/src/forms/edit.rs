use std::collections::BTreeMap;

use super::{DataForm, FormField, FormType};
use crate::error::FormError;

/// A user choice for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pick {
    /// Select the option with this value.
    Option(String),
    /// Check or clear a field that offers no explicit options.
    Toggle { checked: bool },
}

/// Pending edits against a server-supplied form.
///
/// Every `pick` is compared against the original form, never against earlier
/// picks, so selecting a new value and then the original one again leaves no
/// change behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormEdit {
    original: DataForm,
    overrides: BTreeMap<String, String>,
}

impl FormEdit {
    pub fn new(original: DataForm) -> Self {
        Self {
            original,
            overrides: BTreeMap::new(),
        }
    }

    pub fn original(&self) -> &DataForm {
        &self.original
    }

    pub fn pick(&self, var: &str, pick: Pick) -> Result<FormEdit, FormError> {
        let field = self
            .original
            .field(var)
            .ok_or_else(|| FormError::UnknownField(var.to_string()))?;
        if field.values.len() > 1 || field.field_type.is_some_and(|t| t.is_multi()) {
            return Err(FormError::MultiValueField(var.to_string()));
        }
        let original_value = field.first_value().unwrap_or_default();

        let new_value = match pick {
            Pick::Option(value) => {
                (original_value.is_empty() || original_value != value).then_some(value)
            }
            Pick::Toggle { checked } => {
                (!original_value.is_empty() && !checked).then(String::new)
            }
        };

        let mut next = self.clone();
        match new_value {
            Some(value) => {
                next.overrides.insert(var.to_string(), value);
            }
            None => {
                next.overrides.remove(var);
            }
        }
        Ok(next)
    }

    pub fn change_count(&self) -> usize {
        self.overrides.len()
    }

    pub fn is_changed(&self, var: &str) -> bool {
        self.overrides.contains_key(var)
    }

    /// Variables with a pending change, with their new values.
    pub fn changed_fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.overrides
            .iter()
            .map(|(var, value)| (var.as_str(), value.as_str()))
    }

    /// The `submit` form: every original field that has a variable, in
    /// original order and type, carrying its new value or the original one.
    pub fn submission(&self) -> DataForm {
        let mut form = DataForm::new(FormType::Submit);
        form.title = self.original.title.clone();
        form.instructions = self.original.instructions.clone();

        for field in self.original.fields() {
            let Some(var) = field.var.as_deref() else {
                continue;
            };
            let value = self
                .overrides
                .get(var)
                .map(String::as_str)
                .or_else(|| field.first_value());
            form.fields.push(FormField {
                var: Some(var.to_string()),
                field_type: field.field_type,
                values: value.map(str::to_string).into_iter().collect(),
                ..FormField::default()
            });
        }
        form
    }
}
