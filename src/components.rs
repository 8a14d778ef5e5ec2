//! Filename component overrides

use crate::error::Result;
use crate::grammar;

/// Parts of a filename an operation wants to change.
///
/// Every field is optional; an unset field keeps the existing value of the
/// item it is applied to. Built through [`Components::builder`], which
/// validates each field against the filename grammar.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Components {
    prefix: Option<String>,
    delimiter: Option<String>,
    padding: Option<usize>,
    suffix: Option<String>,
    extension: Option<String>,
}

impl Components {
    /// Start building a set of overrides
    pub fn builder() -> ComponentsBuilder {
        ComponentsBuilder::default()
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn delimiter(&self) -> Option<&str> {
        self.delimiter.as_deref()
    }

    pub fn padding(&self) -> Option<usize> {
        self.padding
    }

    pub fn suffix(&self) -> Option<&str> {
        self.suffix.as_deref()
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        self.prefix.is_none()
            && self.delimiter.is_none()
            && self.padding.is_none()
            && self.suffix.is_none()
            && self.extension.is_none()
    }
}

/// Builder for [`Components`]
#[derive(Debug, Clone, Default)]
pub struct ComponentsBuilder {
    inner: Components,
}

impl ComponentsBuilder {
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.inner.prefix = Some(prefix.into());
        self
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.inner.delimiter = Some(delimiter.into());
        self
    }

    pub fn padding(mut self, padding: usize) -> Self {
        self.inner.padding = Some(padding);
        self
    }

    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.inner.suffix = Some(suffix.into());
        self
    }

    /// Set the extension; a single leading dot is accepted and dropped
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        let extension = match extension.strip_prefix('.') {
            Some(rest) => rest.to_string(),
            None => extension,
        };
        self.inner.extension = Some(extension);
        self
    }

    /// Validate every set field and produce the overrides
    pub fn build(self) -> Result<Components> {
        let c = &self.inner;
        if let Some(prefix) = &c.prefix {
            grammar::validate_prefix(prefix)?;
        }
        if let Some(delimiter) = &c.delimiter {
            grammar::validate_delimiter(delimiter)?;
        }
        if let Some(suffix) = &c.suffix {
            grammar::validate_suffix(suffix)?;
        }
        if let Some(extension) = &c.extension {
            grammar::validate_extension(extension)?;
        }
        Ok(self.inner)
    }
}
