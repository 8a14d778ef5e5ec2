//! Operation plans and their execution
//!
//! A plan is a pure value listing filesystem operations. Nothing touches the
//! disk until [`OperationPlan::execute`] is called, and execution refuses to
//! start at all when unforced conflicts are present.
//!
//! A destination that is the source of a rename or move scheduled *earlier*
//! in the same plan is vacated before it is written, so chains such as
//! shifting frames up by one are safe as long as the plan is ordered high to
//! low. A chain listed in the wrong order is an internal conflict; forced
//! execution runs it in dependency order instead of overwriting the file
//! that still has to move. Cycles are refused.

use crate::error::{Error, Result};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{Level, debug, info, span, warn};

/// Kind of filesystem operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Change the filename within the same directory
    Rename,
    /// Relocate to another directory
    Move,
    /// Duplicate content, keeping the source
    Copy,
    /// Remove the source
    Delete,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Rename => "rename",
            OperationKind::Move => "move",
            OperationKind::Copy => "copy",
            OperationKind::Delete => "delete",
        }
    }

    /// Whether the source path is free once the operation completes
    pub fn vacates_source(&self) -> bool {
        !matches!(self, OperationKind::Copy)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One proposed filesystem operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    kind: OperationKind,
    source: PathBuf,
    destination: Option<PathBuf>,
}

impl Operation {
    pub fn rename(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self::transfer(OperationKind::Rename, source, destination)
    }

    pub fn relocate(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self::transfer(OperationKind::Move, source, destination)
    }

    pub fn copy(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self::transfer(OperationKind::Copy, source, destination)
    }

    pub fn delete(source: impl Into<PathBuf>) -> Self {
        Self {
            kind: OperationKind::Delete,
            source: source.into(),
            destination: None,
        }
    }

    fn transfer(
        kind: OperationKind,
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
    ) -> Self {
        Self {
            kind,
            source: source.into(),
            destination: Some(destination.into()),
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Destination path; `None` only for deletes
    pub fn destination(&self) -> Option<&Path> {
        self.destination.as_deref()
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.destination {
            Some(dest) => write!(
                f,
                "{} {} -> {}",
                self.kind,
                self.source.display(),
                dest.display()
            ),
            None => write!(f, "{} {}", self.kind, self.source.display()),
        }
    }
}

/// How a planned destination collides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// The destination is occupied by a file outside the plan
    External,
    /// The destination is a source this plan only vacates later
    Internal,
    /// Another operation in the plan writes the same destination
    DuplicateDestination,
}

/// A flagged operation and the reason it collides
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub operation: Operation,
    pub kind: ConflictKind,
}

/// Ordered list of proposed filesystem operations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationPlan {
    operations: Vec<Operation>,
    create_directories: bool,
}

impl OperationPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_operations(operations: Vec<Operation>) -> Self {
        Self {
            operations,
            create_directories: false,
        }
    }

    /// Create missing destination directories during execution
    pub fn create_directories(mut self, create: bool) -> Self {
        self.create_directories = create;
        self
    }

    pub fn creates_directories(&self) -> bool {
        self.create_directories
    }

    pub fn push(&mut self, operation: Operation) {
        self.operations.push(operation);
    }

    /// Append another plan's operations after this plan's
    pub fn extend(&mut self, other: OperationPlan) {
        self.create_directories |= other.create_directories;
        self.operations.extend(other.operations);
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Operations whose destination collides, checked against the live filesystem
    pub fn conflicts(&self) -> Vec<Conflict> {
        let mut destination_counts: HashMap<&Path, usize> = HashMap::new();
        for dest in self.operations.iter().filter_map(Operation::destination) {
            *destination_counts.entry(dest).or_default() += 1;
        }

        // source -> index of the operation that frees it
        let mut vacated: HashMap<&Path, usize> = HashMap::new();
        for (idx, op) in self.operations.iter().enumerate() {
            if op.kind.vacates_source() {
                vacated.entry(op.source()).or_insert(idx);
            }
        }

        let mut conflicts = Vec::new();
        for (idx, op) in self.operations.iter().enumerate() {
            let Some(dest) = op.destination() else {
                continue;
            };

            let kind = if destination_counts.get(dest).copied().unwrap_or(0) > 1 {
                Some(ConflictKind::DuplicateDestination)
            } else if !path_occupied(dest) {
                None
            } else {
                match vacated.get(dest) {
                    Some(&freed_at) if freed_at < idx => None,
                    Some(&freed_at) if freed_at > idx => Some(ConflictKind::Internal),
                    _ => Some(ConflictKind::External),
                }
            };

            if let Some(kind) = kind {
                conflicts.push(Conflict {
                    operation: op.clone(),
                    kind,
                });
            }
        }
        conflicts
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicts().is_empty()
    }

    /// Order in which `execute` performs the operations.
    ///
    /// An operation that frees a path runs before any operation writing to
    /// that path, even when the plan lists it later. Otherwise plan order is
    /// kept. Operations that chain into a cycle fail with
    /// [`Error::CyclicPlan`].
    pub fn execution_order(&self) -> Result<Vec<&Operation>> {
        let count = self.operations.len();

        let mut vacated: HashMap<&Path, usize> = HashMap::new();
        for (idx, op) in self.operations.iter().enumerate() {
            if op.kind.vacates_source() {
                vacated.entry(op.source()).or_insert(idx);
            }
        }

        // freeing operation -> operations that must wait for it
        let mut waiting: Vec<Vec<usize>> = vec![Vec::new(); count];
        let mut blockers = vec![0usize; count];
        for (idx, op) in self.operations.iter().enumerate() {
            let freed_by = op.destination().and_then(|dest| vacated.get(dest));
            if let Some(&freed_by) = freed_by {
                if freed_by != idx {
                    waiting[freed_by].push(idx);
                    blockers[idx] += 1;
                }
            }
        }

        let mut ready: BTreeSet<usize> = (0..count).filter(|&idx| blockers[idx] == 0).collect();
        let mut order = Vec::with_capacity(count);
        while let Some(idx) = ready.pop_first() {
            order.push(&self.operations[idx]);
            for &next in &waiting[idx] {
                blockers[next] -= 1;
                if blockers[next] == 0 {
                    ready.insert(next);
                }
            }
        }

        if order.len() < count {
            let paths = (0..count)
                .filter(|&idx| blockers[idx] > 0)
                .map(|idx| self.operations[idx].source().to_path_buf())
                .collect();
            return Err(Error::CyclicPlan { paths });
        }
        Ok(order)
    }

    /// Perform every operation.
    ///
    /// Without `force`, any conflict aborts before the first operation with
    /// [`Error::AlreadyExists`]. With `force`, chained operations run in
    /// [`execution_order`](Self::execution_order) and remaining occupied
    /// destinations are overwritten. Failures of individual operations are
    /// collected in the returned [`ExecutionResult`]; completed operations
    /// are not undone.
    pub fn execute(&self, force: bool) -> Result<ExecutionResult> {
        let _span = span!(Level::INFO, "execute_plan", operations = self.len(), force).entered();

        let conflicts = self.conflicts();
        if !conflicts.is_empty() {
            if !force {
                let paths: Vec<PathBuf> = conflicts
                    .iter()
                    .filter_map(|c| c.operation.destination().map(Path::to_path_buf))
                    .collect();
                warn!(count = paths.len(), "Refusing to execute plan with conflicts");
                return Err(Error::AlreadyExists { paths });
            }
            warn!(count = conflicts.len(), "Overwriting conflicting destinations");
        }

        let order = self.execution_order()?;
        let mut result = ExecutionResult::default();
        for op in order {
            match apply_operation(op, force, self.create_directories) {
                Ok(()) => {
                    debug!(operation = %op, "Operation complete");
                    result.succeeded.push(op.clone());
                }
                Err(failure) => {
                    warn!(operation = %op, kind = ?failure.kind, error = %failure.message, "Operation failed");
                    result.failed.push(failure);
                }
            }
        }

        info!(
            succeeded = result.succeeded.len(),
            failed = result.failed.len(),
            "Plan executed"
        );
        Ok(result)
    }
}

/// Why a single operation failed at execution time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The source vanished between planning and execution
    SourceMissing,
    /// The destination appeared after planning and force was not given
    DestinationExists,
    /// The destination directory does not exist
    MissingDirectory,
    PermissionDenied,
    Other,
}

/// An operation that could not be performed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedOperation {
    pub operation: Operation,
    pub kind: FailureKind,
    pub message: String,
}

/// Outcome of executing a plan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    pub succeeded: Vec<Operation>,
    pub failed: Vec<FailedOperation>,
}

impl ExecutionResult {
    /// True when no operation failed
    pub fn success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "Succeeded: {}, Failed: {}",
            self.succeeded.len(),
            self.failed.len()
        )
    }
}

fn path_occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

fn failure(op: &Operation, kind: FailureKind, message: impl Into<String>) -> FailedOperation {
    FailedOperation {
        operation: op.clone(),
        kind,
        message: message.into(),
    }
}

fn io_failure(op: &Operation, err: io::Error) -> FailedOperation {
    let kind = match err.kind() {
        io::ErrorKind::NotFound if !path_occupied(op.source()) => FailureKind::SourceMissing,
        io::ErrorKind::NotFound => FailureKind::MissingDirectory,
        io::ErrorKind::PermissionDenied => FailureKind::PermissionDenied,
        io::ErrorKind::AlreadyExists => FailureKind::DestinationExists,
        _ => FailureKind::Other,
    };
    failure(op, kind, err.to_string())
}

/// Perform one operation, re-checking the filesystem first
fn apply_operation(
    op: &Operation,
    force: bool,
    create_directories: bool,
) -> std::result::Result<(), FailedOperation> {
    if !path_occupied(op.source()) {
        return Err(failure(
            op,
            FailureKind::SourceMissing,
            format!("{} does not exist", op.source().display()),
        ));
    }

    let Some(dest) = op.destination() else {
        return fs::remove_file(op.source()).map_err(|e| io_failure(op, e));
    };

    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.is_dir() {
            if create_directories {
                fs::create_dir_all(parent).map_err(|e| io_failure(op, e))?;
            } else {
                return Err(failure(
                    op,
                    FailureKind::MissingDirectory,
                    format!("{} does not exist", parent.display()),
                ));
            }
        }
    }

    if path_occupied(dest) {
        if !force {
            return Err(failure(
                op,
                FailureKind::DestinationExists,
                format!("{} already exists", dest.display()),
            ));
        }
        if dest.is_dir() {
            return Err(failure(
                op,
                FailureKind::Other,
                format!("{} is a directory", dest.display()),
            ));
        }
        warn!(destination = ?dest, "Overwriting existing file");
        if op.kind().vacates_source() {
            fs::remove_file(dest).map_err(|e| io_failure(op, e))?;
        }
    }

    match op.kind() {
        OperationKind::Rename | OperationKind::Move => {
            // Try rename first (faster for same filesystem)
            if let Err(rename_err) = fs::rename(op.source(), dest) {
                debug!(source = ?op.source(), error = %rename_err, "Rename failed, falling back to copy");
                copy_with_metadata(op.source(), dest).map_err(|_| io_failure(op, rename_err))?;
                fs::remove_file(op.source()).map_err(|e| io_failure(op, e))?;
            }
        }
        OperationKind::Copy => {
            copy_with_metadata(op.source(), dest).map_err(|e| io_failure(op, e))?;
        }
        OperationKind::Delete => {
            fs::remove_file(op.source()).map_err(|e| io_failure(op, e))?;
        }
    }

    Ok(())
}

/// Copy content and permissions, then carry over access and modification times
fn copy_with_metadata(source: &Path, dest: &Path) -> io::Result<()> {
    fs::copy(source, dest)?;

    let metadata = fs::metadata(source)?;
    let atime = filetime::FileTime::from_last_access_time(&metadata);
    let mtime = filetime::FileTime::from_last_modification_time(&metadata);
    filetime::set_file_times(dest, atime, mtime)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_empty_plan() {
        let plan = OperationPlan::new();
        assert!(plan.is_empty());
        assert!(!plan.has_conflicts());
        let result = plan.execute(false).unwrap();
        assert!(result.success());
        assert!(result.succeeded.is_empty());
    }

    #[test]
    fn test_rename_executes() {
        let temp = TempDir::new().unwrap();
        let a = touch(temp.path(), "a.0001.exr", "a");
        let b = temp.path().join("b.0001.exr");

        let plan = OperationPlan::from_operations(vec![Operation::rename(&a, &b)]);
        assert!(!plan.has_conflicts());
        let result = plan.execute(false).unwrap();
        assert!(result.success());
        assert!(!a.exists());
        assert_eq!(fs::read_to_string(&b).unwrap(), "a");
    }

    #[test]
    fn test_external_conflict_blocks_execution() {
        let temp = TempDir::new().unwrap();
        let a = touch(temp.path(), "a.0001.exr", "a");
        let b = touch(temp.path(), "b.0001.exr", "b");

        let plan = OperationPlan::from_operations(vec![Operation::rename(&a, &b)]);
        let conflicts = plan.conflicts();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::External);

        let err = plan.execute(false).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { ref paths } if paths == &vec![b.clone()]));
        assert_eq!(fs::read_to_string(&a).unwrap(), "a");
        assert_eq!(fs::read_to_string(&b).unwrap(), "b");

        let result = plan.execute(true).unwrap();
        assert!(result.success());
        assert!(!a.exists());
        assert_eq!(fs::read_to_string(&b).unwrap(), "a");
    }

    #[test]
    fn test_chain_in_safe_order_has_no_conflict() {
        let temp = TempDir::new().unwrap();
        let f1 = touch(temp.path(), "f.1.exr", "1");
        let f2 = touch(temp.path(), "f.2.exr", "2");
        let f3 = temp.path().join("f.3.exr");

        let plan = OperationPlan::from_operations(vec![
            Operation::rename(&f2, &f3),
            Operation::rename(&f1, &f2),
        ]);
        assert!(!plan.has_conflicts());
        let result = plan.execute(false).unwrap();
        assert!(result.success());
        assert!(!f1.exists());
        assert_eq!(fs::read_to_string(&f2).unwrap(), "1");
        assert_eq!(fs::read_to_string(&f3).unwrap(), "2");
    }

    #[test]
    fn test_chain_in_wrong_order_is_internal_conflict() {
        let temp = TempDir::new().unwrap();
        let f1 = touch(temp.path(), "f.1.exr", "1");
        let f2 = touch(temp.path(), "f.2.exr", "2");
        let f3 = temp.path().join("f.3.exr");

        let plan = OperationPlan::from_operations(vec![
            Operation::rename(&f1, &f2),
            Operation::rename(&f2, &f3),
        ]);
        let conflicts = plan.conflicts();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::Internal);
        assert!(plan.execute(false).is_err());
        assert!(f1.exists());
    }

    #[test]
    fn test_forced_chain_runs_in_dependency_order() {
        let temp = TempDir::new().unwrap();
        let f1 = touch(temp.path(), "f.1.exr", "1");
        let f2 = touch(temp.path(), "f.2.exr", "2");
        let f3 = temp.path().join("f.3.exr");

        let plan = OperationPlan::from_operations(vec![
            Operation::rename(&f1, &f2),
            Operation::rename(&f2, &f3),
        ]);
        let order: Vec<&Path> = plan
            .execution_order()
            .unwrap()
            .into_iter()
            .map(Operation::source)
            .collect();
        assert_eq!(order, vec![f2.as_path(), f1.as_path()]);

        let result = plan.execute(true).unwrap();
        assert!(result.success());
        assert!(!f1.exists());
        assert_eq!(fs::read_to_string(&f2).unwrap(), "1");
        assert_eq!(fs::read_to_string(&f3).unwrap(), "2");
    }

    #[test]
    fn test_execution_order_keeps_safe_plans() {
        let plan = OperationPlan::from_operations(vec![
            Operation::rename("/s/f.2.exr", "/s/f.3.exr"),
            Operation::rename("/s/f.1.exr", "/s/f.2.exr"),
            Operation::delete("/s/g.1.exr"),
        ]);
        let order = plan.execution_order().unwrap();
        let expected: Vec<&Operation> = plan.operations().iter().collect();
        assert_eq!(order, expected);
    }

    #[test]
    fn test_forced_swap_is_refused() {
        let temp = TempDir::new().unwrap();
        let a = touch(temp.path(), "x.1.exr", "a");
        let b = touch(temp.path(), "x.2.exr", "b");

        let plan = OperationPlan::from_operations(vec![
            Operation::rename(&a, &b),
            Operation::rename(&b, &a),
        ]);
        let err = plan.execute(true).unwrap_err();
        assert!(matches!(err, Error::CyclicPlan { ref paths } if paths.len() == 2));
        assert_eq!(fs::read_to_string(&a).unwrap(), "a");
        assert_eq!(fs::read_to_string(&b).unwrap(), "b");
    }

    #[test]
    fn test_copy_source_is_not_vacated() {
        let temp = TempDir::new().unwrap();
        let f1 = touch(temp.path(), "f.1.exr", "1");
        let f2 = touch(temp.path(), "f.2.exr", "2");
        let f3 = temp.path().join("f.3.exr");

        let plan = OperationPlan::from_operations(vec![
            Operation::copy(&f2, &f3),
            Operation::copy(&f1, &f2),
        ]);
        let conflicts = plan.conflicts();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::External);
    }

    #[test]
    fn test_duplicate_destinations() {
        let temp = TempDir::new().unwrap();
        let a = touch(temp.path(), "a.01.exr", "a");
        let b = touch(temp.path(), "a.001.exr", "b");
        let dest = temp.path().join("c.001.exr");

        let plan = OperationPlan::from_operations(vec![
            Operation::rename(&a, &dest),
            Operation::rename(&b, &dest),
        ]);
        let conflicts = plan.conflicts();
        assert_eq!(conflicts.len(), 2);
        assert!(conflicts
            .iter()
            .all(|c| c.kind == ConflictKind::DuplicateDestination));
    }

    #[test]
    fn test_missing_source_is_reported_not_raised() {
        let temp = TempDir::new().unwrap();
        let present = touch(temp.path(), "f.1.exr", "1");
        let absent = temp.path().join("f.2.exr");

        let plan = OperationPlan::from_operations(vec![
            Operation::delete(&present),
            Operation::delete(&absent),
        ]);
        let result = plan.execute(false).unwrap();
        assert!(!result.success());
        assert_eq!(result.succeeded.len(), 1);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].kind, FailureKind::SourceMissing);
        assert!(!present.exists());
        assert_eq!(result.summary(), "Succeeded: 1, Failed: 1");
    }

    #[test]
    fn test_missing_directory() {
        let temp = TempDir::new().unwrap();
        let src = touch(temp.path(), "f.1.exr", "1");
        let dest = temp.path().join("sub").join("f.1.exr");

        let plan = OperationPlan::from_operations(vec![Operation::relocate(&src, &dest)]);
        let result = plan.execute(false).unwrap();
        assert_eq!(result.failed[0].kind, FailureKind::MissingDirectory);
        assert!(src.exists());

        let plan = plan.create_directories(true);
        let result = plan.execute(false).unwrap();
        assert!(result.success());
        assert!(dest.exists());
    }

    #[test]
    fn test_copy_preserves_modification_time() {
        let temp = TempDir::new().unwrap();
        let src = touch(temp.path(), "f.1.exr", "1");
        let mtime = filetime::FileTime::from_unix_time(1_000_000_000, 0);
        filetime::set_file_mtime(&src, mtime).unwrap();
        let dest = temp.path().join("g.1.exr");

        let plan = OperationPlan::from_operations(vec![Operation::copy(&src, &dest)]);
        assert!(plan.execute(false).unwrap().success());
        assert!(src.exists());
        let copied = fs::metadata(&dest).unwrap();
        assert_eq!(filetime::FileTime::from_last_modification_time(&copied), mtime);
    }

    #[test]
    fn test_extend_keeps_order() {
        let mut plan = OperationPlan::from_operations(vec![Operation::delete("/x/a")]);
        let tail = OperationPlan::from_operations(vec![Operation::delete("/x/b")]);
        plan.extend(tail.create_directories(true));
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.operations()[1].source(), Path::new("/x/b"));
        assert!(plan.creates_directories());
    }

    #[test]
    fn test_operation_display() {
        let op = Operation::rename("/a/x.1.exr", "/a/y.1.exr");
        assert_eq!(op.to_string(), "rename /a/x.1.exr -> /a/y.1.exr");
        assert_eq!(Operation::delete("/a/x.1.exr").to_string(), "delete /a/x.1.exr");
    }
}
