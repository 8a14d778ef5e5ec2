//! Frame sequences: ordered groups of items sharing one name pattern

use crate::components::Components;
use crate::error::{Error, Result};
use crate::grammar::digit_count;
use crate::item::{Item, copy_targets};
use crate::plan::{Operation, OperationPlan};
use std::collections::BTreeSet;
use std::fmt;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Structural issue found in a sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Problem {
    /// A gap exists between the first and last frame
    MissingFrames,
    /// Items do not all share one padding
    InconsistentPadding,
    /// A member filename contains a space
    FilenameIncludesSpaces,
    /// The same frame number appeared with different paddings
    DuplicateFramesWithInconsistentPadding,
}

/// Combinable set of [`Problem`]s
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Problems(BTreeSet<Problem>);

impl Problems {
    pub fn contains(&self, problem: Problem) -> bool {
        self.0.contains(&problem)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Problem> + '_ {
        self.0.iter().copied()
    }

    fn insert(&mut self, problem: Problem) {
        self.0.insert(problem);
    }
}

/// Immutable, frame-ordered list of items that agree on prefix, delimiter,
/// suffix, extension and directory.
///
/// Operations never change a sequence in place. Each returns the proposed
/// end state together with the [`OperationPlan`] that would realize it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSequence {
    items: Vec<Item>,
    siphoned_duplicates: bool,
}

impl FileSequence {
    /// Build a sequence, sorting by frame number then padding.
    ///
    /// Fails with [`Error::AnomalousItem`] when the items disagree on any
    /// shared field.
    pub fn new(mut items: Vec<Item>) -> Result<Self> {
        items.sort_by(|a, b| {
            a.frame_number()
                .cmp(&b.frame_number())
                .then_with(|| a.padding().cmp(&b.padding()))
        });
        let sequence = Self {
            items,
            siphoned_duplicates: false,
        };
        sequence.validate()?;
        Ok(sequence)
    }

    /// A sequence with no items
    pub fn empty() -> Self {
        Self::default()
    }

    /// Record that detection moved differently padded duplicates out of this group
    pub(crate) fn mark_siphoned_duplicates(mut self) -> Self {
        self.siphoned_duplicates = true;
        self
    }

    /// Check that every item agrees with the first on all shared fields
    pub fn validate(&self) -> Result<()> {
        let Some(first) = self.items.first() else {
            return Ok(());
        };

        for item in &self.items[1..] {
            let checks: [(&'static str, String, String); 5] = [
                ("prefix", first.prefix().into(), item.prefix().into()),
                ("delimiter", first.delimiter().into(), item.delimiter().into()),
                ("suffix", first.suffix().into(), item.suffix().into()),
                ("extension", first.extension().into(), item.extension().into()),
                ("directory", display_dir(first.directory()), display_dir(item.directory())),
            ];
            for (field, expected, found) in checks {
                if expected != found {
                    return Err(Error::AnomalousItem {
                        field,
                        expected,
                        found,
                        filename: item.filename(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn prefix(&self) -> Option<&str> {
        self.items.first().map(Item::prefix)
    }

    pub fn delimiter(&self) -> Option<&str> {
        self.items.first().map(Item::delimiter)
    }

    pub fn suffix(&self) -> Option<&str> {
        self.items.first().map(Item::suffix)
    }

    pub fn extension(&self) -> Option<&str> {
        self.items.first().map(Item::extension)
    }

    pub fn directory(&self) -> Option<&Path> {
        self.items.first().and_then(Item::directory)
    }

    pub fn first_frame(&self) -> Option<u64> {
        self.items.first().map(Item::frame_number)
    }

    pub fn last_frame(&self) -> Option<u64> {
        self.items.last().map(Item::frame_number)
    }

    /// Sorted, de-duplicated frame numbers present
    pub fn existing_frames(&self) -> Vec<u64> {
        let mut frames: Vec<u64> = self.items.iter().map(Item::frame_number).collect();
        frames.dedup();
        frames
    }

    /// Frames in `[first_frame, last_frame]` with no item.
    ///
    /// Allocates one entry per missing frame; prefer [`missing_ranges`]
    /// when the gaps can be large.
    ///
    /// [`missing_ranges`]: Self::missing_ranges
    pub fn missing_frames(&self) -> Vec<u64> {
        self.missing_ranges().into_iter().flatten().collect()
    }

    /// Gaps between present frames, one inclusive range per gap
    pub fn missing_ranges(&self) -> Vec<RangeInclusive<u64>> {
        self.existing_frames()
            .windows(2)
            .filter(|pair| pair[1] - pair[0] > 1)
            .map(|pair| pair[0] + 1..=pair[1] - 1)
            .collect()
    }

    /// Nominal span including gaps, saturating at `u64::MAX`
    pub fn frame_count(&self) -> u64 {
        match (self.first_frame(), self.last_frame()) {
            (Some(first), Some(last)) => (last - first).saturating_add(1),
            _ => 0,
        }
    }

    /// Number of items actually present
    pub fn actual_frame_count(&self) -> usize {
        self.items.len()
    }

    /// Most common item padding; ties go to the first encountered in frame order
    pub fn padding(&self) -> Option<usize> {
        nominal_padding(&self.items)
    }

    /// Pattern with a `#` run for the padding, e.g. `render.####.exr`
    pub fn sequence_string(&self) -> Option<String> {
        let first = self.items.first()?;
        let padding = self.padding()?;
        let mut pattern = format!(
            "{}{}{}{}",
            first.prefix(),
            first.delimiter(),
            "#".repeat(padding),
            first.suffix()
        );
        if !first.extension().is_empty() {
            pattern.push('.');
            pattern.push_str(first.extension());
        }
        Some(pattern)
    }

    /// Compact frame listing such as `1-2,4-5,7`
    pub fn frame_range_string(&self) -> String {
        let frames = self.existing_frames();
        let mut ranges: Vec<String> = Vec::new();
        let mut idx = 0;
        while idx < frames.len() {
            let start = frames[idx];
            let mut end = start;
            while idx + 1 < frames.len() && frames[idx + 1] == end + 1 {
                idx += 1;
                end = frames[idx];
            }
            ranges.push(if start == end {
                start.to_string()
            } else {
                format!("{}-{}", start, end)
            });
            idx += 1;
        }
        ranges.join(",")
    }

    pub fn filenames(&self) -> Vec<String> {
        self.items.iter().map(Item::filename).collect()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.items.iter().map(Item::path).collect()
    }

    /// Informational structural problems
    pub fn problems(&self) -> Problems {
        let mut problems = Problems::default();
        let present = self.existing_frames().len() as u64;
        if self.frame_count() > present {
            problems.insert(Problem::MissingFrames);
        }
        if let Some(first) = self.items.first() {
            if self.items.iter().any(|i| i.padding() != first.padding()) {
                problems.insert(Problem::InconsistentPadding);
            }
        }
        if self.items.iter().any(|i| i.filename().contains(' ')) {
            problems.insert(Problem::FilenameIncludesSpaces);
        }
        if self.siphoned_duplicates || self.existing_frames().len() < self.items.len() {
            problems.insert(Problem::DuplicateFramesWithInconsistentPadding);
        }
        problems
    }

    /// Propose renaming every item in place.
    ///
    /// An empty sequence, or overrides that leave every filename unchanged,
    /// yield an empty plan.
    pub fn rename(&self, components: &Components) -> Result<(FileSequence, OperationPlan)> {
        self.validate()?;
        let mut renamed = Vec::with_capacity(self.items.len());
        let mut plan = OperationPlan::new();
        for item in &self.items {
            let (new_item, item_plan) = item.rename(components)?;
            plan.extend(item_plan);
            renamed.push(new_item);
        }
        debug!(operations = plan.len(), "Planned sequence rename");
        Ok((FileSequence::new(renamed)?, plan))
    }

    /// Propose moving every item into `directory`
    pub fn move_to(&self, directory: &Path) -> Result<(FileSequence, OperationPlan)> {
        self.require_items("move")?;
        self.validate()?;
        let mut moved = Vec::with_capacity(self.items.len());
        let mut plan = OperationPlan::new();
        for item in &self.items {
            let (new_item, item_plan) = item.move_to(directory)?;
            plan.extend(item_plan);
            moved.push(new_item);
        }
        debug!(operations = plan.len(), ?directory, "Planned sequence move");
        Ok((FileSequence::new(moved)?, plan))
    }

    /// Propose copying every item, optionally renamed and/or elsewhere.
    ///
    /// See [`Item::copy_to`] for the `_copy` prefix default.
    pub fn copy_to(
        &self,
        components: Option<&Components>,
        directory: Option<&Path>,
    ) -> Result<(FileSequence, OperationPlan)> {
        self.require_items("copy")?;
        self.validate()?;
        let targets = copy_targets(&self.items, components, directory)?;
        let mut plan = OperationPlan::new();
        for (item, target) in self.items.iter().zip(&targets) {
            plan.push(Operation::copy(item.linked_path()?, target.path()));
        }
        debug!(operations = plan.len(), "Planned sequence copy");
        Ok((FileSequence::new(targets)?, plan))
    }

    /// Propose moving every item into a subdirectory named `name`
    pub fn folderize(&self, name: &str) -> Result<(FileSequence, OperationPlan)> {
        self.require_items("folderize")?;
        let parent = match self.directory() {
            Some(dir) => dir.to_path_buf(),
            None => {
                return Err(Error::UnlinkedItem {
                    filename: self.items[0].filename(),
                });
            }
        };
        let (moved, plan) = self.move_to(&parent.join(name))?;
        Ok((moved, plan.create_directories(true)))
    }

    /// Propose shifting every frame number by `delta`.
    ///
    /// Padding defaults to the sequence padding and widens when the highest
    /// new frame needs more digits. Operations are ordered high to low for
    /// positive offsets and low to high for negative ones so a frame is never
    /// overwritten before it has been moved.
    pub fn offset_frames(
        &self,
        delta: i64,
        padding: Option<usize>,
    ) -> Result<(FileSequence, OperationPlan)> {
        self.validate()?;
        let (Some(first), Some(last)) = (self.first_frame(), self.last_frame()) else {
            return Ok((self.clone(), OperationPlan::new()));
        };

        let new_first = first as i128 + delta as i128;
        if new_first < 0 {
            return Err(Error::NegativeFrame { frame: new_first });
        }
        let new_last = last as i128 + delta as i128;
        if new_last > u64::MAX as i128 {
            return Err(Error::FrameOverflow { frame: new_last });
        }

        let base = padding.or(self.padding()).unwrap_or(0);
        let padding = base.max(digit_count(new_last as u64));

        let shifted: Vec<Item> = self
            .items
            .iter()
            .map(|item| {
                let frame = (item.frame_number() as i128 + delta as i128) as u64;
                item.with_frame_number(frame, Some(padding))
            })
            .collect();

        let mut order: Vec<usize> = (0..self.items.len()).collect();
        if delta > 0 {
            order.reverse();
        }

        let mut plan = OperationPlan::new();
        for idx in order {
            let (old, new) = (&self.items[idx], &shifted[idx]);
            if old.filename() != new.filename() {
                plan.push(Operation::rename(old.linked_path()?, new.path()));
            }
        }
        debug!(delta, padding, operations = plan.len(), "Planned frame offset");
        Ok((FileSequence::new(shifted)?, plan))
    }

    /// Propose re-padding every item to `max(padding, digits it needs)`
    pub fn set_padding(&self, padding: usize) -> Result<(FileSequence, OperationPlan)> {
        self.validate()?;
        let padded: Vec<Item> = self.items.iter().map(|i| i.with_padding(padding)).collect();
        let mut plan = OperationPlan::new();
        for (old, new) in self.items.iter().zip(&padded) {
            if old.filename() != new.filename() {
                plan.push(Operation::rename(old.linked_path()?, new.path()));
            }
        }
        debug!(padding, operations = plan.len(), "Planned re-pad");
        Ok((FileSequence::new(padded)?, plan))
    }

    /// Propose deleting every item
    pub fn delete(&self) -> Result<OperationPlan> {
        self.validate()?;
        let mut plan = OperationPlan::new();
        for item in &self.items {
            plan.extend(item.delete()?);
        }
        Ok(plan)
    }

    fn require_items(&self, operation: &'static str) -> Result<()> {
        if self.items.is_empty() {
            return Err(Error::EmptySequence { operation });
        }
        Ok(())
    }
}

impl fmt::Display for FileSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sequence_string() {
            Some(pattern) => write!(f, "{} [{}]", pattern, self.frame_range_string()),
            None => f.write_str("<empty sequence>"),
        }
    }
}

/// Statistical mode of item paddings, first-encountered wins ties
pub(crate) fn nominal_padding(items: &[Item]) -> Option<usize> {
    let mut counts: Vec<(usize, usize)> = Vec::new();
    for item in items {
        match counts.iter_mut().find(|(padding, _)| *padding == item.padding()) {
            Some((_, count)) => *count += 1,
            None => counts.push((item.padding(), 1)),
        }
    }
    let mut best: Option<(usize, usize)> = None;
    for (padding, count) in counts {
        if best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((padding, count));
        }
    }
    best.map(|(padding, _)| padding)
}

fn display_dir(dir: Option<&Path>) -> String {
    dir.map(|d| d.display().to_string()).unwrap_or_default()
}
