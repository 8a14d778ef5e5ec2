//! A single numbered file, real or hypothetical

use crate::components::Components;
use crate::error::{Error, Result};
use crate::grammar::{self, digit_count};
use crate::plan::{Operation, OperationPlan};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Appended to the prefix when a copy would otherwise land on its source
pub const COPY_SUFFIX: &str = "_copy";

/// One filename split into its grammar parts, optionally bound to a directory.
///
/// `frame_string` keeps leading zeros and is the source of truth for padding.
/// Items are immutable; every "mutation" returns a new item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Item {
    prefix: String,
    delimiter: String,
    frame_string: String,
    frame_number: u64,
    suffix: String,
    extension: String,
    directory: Option<PathBuf>,
}

impl Item {
    /// Build an item from its parts, validating the filename grammar
    pub fn new(
        prefix: impl Into<String>,
        delimiter: impl Into<String>,
        frame_string: impl Into<String>,
        suffix: impl Into<String>,
        extension: impl Into<String>,
    ) -> Result<Self> {
        let prefix = prefix.into();
        let delimiter = delimiter.into();
        let frame_string = frame_string.into();
        let suffix = suffix.into();
        let extension = extension.into();

        grammar::validate_prefix(&prefix)?;
        grammar::validate_delimiter(&delimiter)?;
        grammar::validate_suffix(&suffix)?;
        grammar::validate_extension(&extension)?;
        let frame_number = grammar::validate_frame_string(&frame_string)?;
        grammar::validate_boundaries(&prefix, &delimiter, &suffix, &extension)?;

        Ok(Self {
            prefix,
            delimiter,
            frame_string,
            frame_number,
            suffix,
            extension,
            directory: None,
        })
    }

    /// Build an item for `frame_number`; unset components become empty strings
    pub fn from_components(components: &Components, frame_number: u64) -> Result<Self> {
        let padding = components.padding().unwrap_or(0);
        Self::new(
            components.prefix().unwrap_or(""),
            components.delimiter().unwrap_or(""),
            format_frame(frame_number, padding),
            components.suffix().unwrap_or(""),
            components.extension().unwrap_or(""),
        )
    }

    /// Bind the item to a directory
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    pub fn frame_string(&self) -> &str {
        &self.frame_string
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    /// Number of digit characters in the frame string
    pub fn padding(&self) -> usize {
        self.frame_string.len()
    }

    pub fn filename(&self) -> String {
        let mut name = format!(
            "{}{}{}{}",
            self.prefix, self.delimiter, self.frame_string, self.suffix
        );
        if !self.extension.is_empty() {
            name.push('.');
            name.push_str(&self.extension);
        }
        name
    }

    /// Directory joined with the filename; just the filename when unlinked
    pub fn path(&self) -> PathBuf {
        match &self.directory {
            Some(dir) => dir.join(self.filename()),
            None => PathBuf::from(self.filename()),
        }
    }

    /// Whether the file is currently on disk; unlinked items never are
    pub fn exists(&self) -> bool {
        self.directory.is_some() && fs::symlink_metadata(self.path()).is_ok()
    }

    /// Same item re-padded to `max(padding, digits needed)`
    pub fn with_padding(&self, padding: usize) -> Self {
        Self {
            frame_string: format_frame(self.frame_number, padding),
            ..self.clone()
        }
    }

    /// Same item at another frame; padding defaults to the current one and
    /// widens when the number needs more digits
    pub fn with_frame_number(&self, frame_number: u64, padding: Option<usize>) -> Self {
        Self {
            frame_string: format_frame(frame_number, padding.unwrap_or(self.padding())),
            frame_number,
            ..self.clone()
        }
    }

    /// Apply component overrides, keeping the directory
    pub fn derive(&self, components: &Components) -> Result<Self> {
        let frame_string = match components.padding() {
            Some(padding) => format_frame(self.frame_number, padding),
            None => self.frame_string.clone(),
        };
        let item = Self::new(
            components.prefix().unwrap_or(&self.prefix),
            components.delimiter().unwrap_or(&self.delimiter),
            frame_string,
            components.suffix().unwrap_or(&self.suffix),
            components.extension().unwrap_or(&self.extension),
        )?;
        Ok(Self {
            directory: self.directory.clone(),
            ..item
        })
    }

    /// Propose renaming within the current directory
    pub fn rename(&self, components: &Components) -> Result<(Item, OperationPlan)> {
        let source = self.linked_path()?;
        let renamed = self.derive(components)?;
        let mut plan = OperationPlan::new();
        if renamed.filename() != self.filename() {
            plan.push(Operation::rename(source, renamed.path()));
        }
        Ok((renamed, plan))
    }

    /// Propose moving into `directory` under the same filename
    pub fn move_to(&self, directory: &Path) -> Result<(Item, OperationPlan)> {
        let source = self.linked_path()?;
        let moved = self.clone().with_directory(directory);
        let mut plan = OperationPlan::new();
        if self.directory() != Some(directory) {
            plan.push(Operation::relocate(source, moved.path()));
        }
        Ok((moved, plan))
    }

    /// Propose copying, optionally renamed and/or into another directory.
    ///
    /// With neither overrides nor a directory, or when the destination would
    /// equal the source, the copy's prefix gets [`COPY_SUFFIX`] appended.
    pub fn copy_to(
        &self,
        components: Option<&Components>,
        directory: Option<&Path>,
    ) -> Result<(Item, OperationPlan)> {
        let source = self.linked_path()?;
        let mut targets = copy_targets(std::slice::from_ref(self), components, directory)?;
        let copied = targets.remove(0);
        let plan = OperationPlan::from_operations(vec![Operation::copy(source, copied.path())]);
        Ok((copied, plan))
    }

    /// Propose deleting the file
    pub fn delete(&self) -> Result<OperationPlan> {
        let source = self.linked_path()?;
        Ok(OperationPlan::from_operations(vec![Operation::delete(source)]))
    }

    pub(crate) fn linked_path(&self) -> Result<PathBuf> {
        match &self.directory {
            Some(dir) => Ok(dir.join(self.filename())),
            None => Err(Error::UnlinkedItem {
                filename: self.filename(),
            }),
        }
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.filename())
    }
}

/// Zero-pad `frame` to at least `padding` digits
pub(crate) fn format_frame(frame: u64, padding: usize) -> String {
    format!("{:0width$}", frame, width = padding.max(digit_count(frame)))
}

/// Destination items for copying `items`, applying the `_copy` default
pub(crate) fn copy_targets(
    items: &[Item],
    components: Option<&Components>,
    directory: Option<&Path>,
) -> Result<Vec<Item>> {
    let mut targets = items
        .iter()
        .map(|item| {
            let derived = match components {
                Some(c) => item.derive(c)?,
                None => item.clone(),
            };
            Ok(match directory {
                Some(dir) => derived.with_directory(dir),
                None => derived,
            })
        })
        .collect::<Result<Vec<Item>>>()?;

    let lands_on_source = targets
        .iter()
        .zip(items)
        .any(|(target, item)| target.path() == item.path());

    if (components.is_none() && directory.is_none()) || lands_on_source {
        targets = targets
            .iter()
            .map(|target| {
                let renamed = Components::builder()
                    .prefix(format!("{}{}", target.prefix(), COPY_SUFFIX))
                    .build()?;
                target.derive(&renamed)
            })
            .collect::<Result<Vec<Item>>>()?;
    }

    Ok(targets)
}
