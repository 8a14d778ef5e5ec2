//! Sequence detection
//!
//! Filenames are parsed independently, then grouped by
//! `(prefix, delimiter, suffix, extension, directory)`. Padding is not part
//! of the key: `file.001.exr` and `file.0001.exr` land in the same group.
//!
//! Within a group, a frame number that appears more than once is resolved
//! against the group's nominal padding (the mode over the whole group,
//! computed once before anything is removed). The duplicate with the nominal
//! padding stays; the others are siphoned into per-padding buckets. Any
//! group or bucket with fewer than two members is not a sequence, and its
//! files are reported as rogues.

use crate::config::Config;
use crate::error::Result;
use crate::grammar::FilenameParser;
use crate::item::Item;
use crate::sequence::{FileSequence, nominal_padding};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{Level, debug, info, span, trace};
use walkdir::WalkDir;

/// Smallest group that counts as a sequence
pub const MIN_SEQUENCE_LENGTH: usize = 2;

type GroupKey = (String, String, String, String, Option<PathBuf>);

/// Sequences found in a list of names, plus everything that is not part of one
#[derive(Debug, Clone, Default)]
pub struct Detection {
    pub sequences: Vec<FileSequence>,
    /// Unparsable names and members of groups smaller than two
    pub rogues: Vec<PathBuf>,
}

/// Result of listing a single directory
#[derive(Debug, Clone, Default)]
pub struct DirectoryScan {
    pub sequences: Vec<FileSequence>,
    pub rogues: Vec<PathBuf>,
    /// Files whose extension is on the configured movie allow-list
    pub movies: Vec<PathBuf>,
}

/// Groups filenames into [`FileSequence`]s
#[derive(Debug, Clone, Default)]
pub struct SequenceDetector {
    parser: FilenameParser,
}

impl SequenceDetector {
    pub fn new(parser: FilenameParser) -> Self {
        Self { parser }
    }

    /// Detect sequences among bare filenames, optionally all in `directory`
    pub fn detect<I, S>(&self, names: I, directory: Option<&Path>) -> Result<Detection>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed = Vec::new();
        let mut rogues = Vec::new();

        for name in names {
            let name = name.as_ref();
            match self.parser.parse(name)? {
                Some(item) => parsed.push(match directory {
                    Some(dir) => item.with_directory(dir),
                    None => item,
                }),
                None => {
                    trace!(name, "Not a sequence member");
                    rogues.push(match directory {
                        Some(dir) => dir.join(name),
                        None => PathBuf::from(name),
                    });
                }
            }
        }

        Ok(self.group(parsed, rogues))
    }

    /// Detect sequences among paths, each carrying its own directory
    pub fn detect_paths<I, P>(&self, paths: I) -> Result<Detection>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut parsed = Vec::new();
        let mut rogues = Vec::new();

        for path in paths {
            let path = path.as_ref();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                rogues.push(path.to_path_buf());
                continue;
            };
            let directory = path.parent().filter(|p| !p.as_os_str().is_empty());
            match self.parser.parse(name)? {
                Some(item) => parsed.push(match directory {
                    Some(dir) => item.with_directory(dir),
                    None => item,
                }),
                None => rogues.push(path.to_path_buf()),
            }
        }

        Ok(self.group(parsed, rogues))
    }

    fn group(&self, items: Vec<Item>, mut rogues: Vec<PathBuf>) -> Detection {
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut groups: BTreeMap<GroupKey, Vec<Item>> = BTreeMap::new();
        for item in items {
            if !seen.insert(item.path()) {
                trace!(filename = %item, "Skipping repeated name");
                continue;
            }
            let key = (
                item.prefix().to_string(),
                item.delimiter().to_string(),
                item.suffix().to_string(),
                item.extension().to_string(),
                item.directory().map(Path::to_path_buf),
            );
            groups.entry(key).or_default().push(item);
        }

        let mut sequences = Vec::new();
        for (key, group) in groups {
            if group.len() < MIN_SEQUENCE_LENGTH {
                rogues.extend(group.iter().map(Item::path));
                continue;
            }

            let split = resolve_duplicate_frames(group);
            let siphoned = !split.anomalous.is_empty();
            debug!(
                prefix = %key.0,
                extension = %key.3,
                main = split.main.len(),
                anomalous_buckets = split.anomalous.len(),
                "Resolved group"
            );

            for bucket in std::iter::once(split.main).chain(split.anomalous.into_values()) {
                if bucket.len() < MIN_SEQUENCE_LENGTH {
                    rogues.extend(bucket.iter().map(Item::path));
                    continue;
                }
                match FileSequence::new(bucket) {
                    Ok(sequence) if siphoned => sequences.push(sequence.mark_siphoned_duplicates()),
                    Ok(sequence) => sequences.push(sequence),
                    // grouping key guarantees uniform buckets
                    Err(e) => debug!(error = %e, "Discarding inconsistent bucket"),
                }
            }
        }

        rogues.sort();
        rogues.dedup();
        Detection { sequences, rogues }
    }
}

/// Detect sequences among bare filenames with the default parser
pub fn detect_file_sequences<I, S>(names: I, directory: Option<&Path>) -> Result<Vec<FileSequence>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Ok(SequenceDetector::default().detect(names, directory)?.sequences)
}

/// List one directory (no recursion) and detect the sequences in it
pub fn scan_directory(directory: &Path, config: &Config) -> Result<DirectoryScan> {
    let _span = span!(Level::INFO, "scan_directory", ?directory).entered();

    let mut names = Vec::new();
    let mut movies = Vec::new();
    let mut rogues = Vec::new();

    for entry in WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let is_movie = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| config.is_movie(ext));
        if is_movie {
            movies.push(path.to_path_buf());
            continue;
        }
        match entry.file_name().to_str() {
            Some(name) => names.push(name.to_string()),
            None => rogues.push(path.to_path_buf()),
        }
    }

    let detection = SequenceDetector::new(config.parser()).detect(&names, Some(directory))?;
    rogues.extend(detection.rogues);
    rogues.sort();

    info!(
        sequences = detection.sequences.len(),
        rogues = rogues.len(),
        movies = movies.len(),
        "Scanned directory"
    );

    Ok(DirectoryScan {
        sequences: detection.sequences,
        rogues,
        movies,
    })
}

/// A provisional group split by duplicate-frame resolution
struct PaddingSplit {
    main: Vec<Item>,
    anomalous: BTreeMap<usize, Vec<Item>>,
}

/// Keep nominal-padding duplicates in the main group, siphon the rest by padding
fn resolve_duplicate_frames(mut group: Vec<Item>) -> PaddingSplit {
    group.sort_by(|a, b| {
        a.frame_number()
            .cmp(&b.frame_number())
            .then_with(|| a.padding().cmp(&b.padding()))
    });

    let nominal = nominal_padding(&group).unwrap_or(0);

    let mut frame_counts: HashMap<u64, usize> = HashMap::new();
    for item in &group {
        *frame_counts.entry(item.frame_number()).or_default() += 1;
    }

    let mut main = Vec::new();
    let mut anomalous: BTreeMap<usize, Vec<Item>> = BTreeMap::new();
    for item in group {
        let duplicated = frame_counts.get(&item.frame_number()).copied().unwrap_or(0) > 1;
        if duplicated && item.padding() != nominal {
            trace!(filename = %item, nominal, "Siphoning duplicate frame");
            anomalous.entry(item.padding()).or_default().push(item);
        } else {
            main.push(item);
        }
    }

    PaddingSplit { main, anomalous }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::Problem;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_duplicate_padding_split() {
        let names = [
            "file.001.png",
            "file.002.png",
            "file.02.png",
            "file.003.png",
            "file.004.png",
            "file.04.png",
            "file.005.png",
        ];
        let sequences = detect_file_sequences(names, None).unwrap();
        assert_eq!(sequences.len(), 2);

        let main = sequences.iter().find(|s| s.padding() == Some(3)).unwrap();
        assert_eq!(main.existing_frames(), vec![1, 2, 3, 4, 5]);
        assert_eq!(main.actual_frame_count(), 5);

        let anomalous = sequences.iter().find(|s| s.padding() == Some(2)).unwrap();
        assert_eq!(anomalous.existing_frames(), vec![2, 4]);
        assert!(anomalous
            .problems()
            .contains(Problem::DuplicateFramesWithInconsistentPadding));
        assert!(main
            .problems()
            .contains(Problem::DuplicateFramesWithInconsistentPadding));
    }

    #[test]
    fn test_missing_frames() {
        let names = [
            "file.0001.exr",
            "file.0002.exr",
            "file.0004.exr",
            "file.0005.exr",
            "file.0007.exr",
        ];
        let sequences = detect_file_sequences(names, None).unwrap();
        assert_eq!(sequences.len(), 1);
        let seq = &sequences[0];
        assert_eq!(seq.frame_count(), 7);
        assert_eq!(seq.actual_frame_count(), 5);
        assert_eq!(seq.missing_frames(), vec![3, 6]);
    }

    #[test]
    fn test_singletons_are_not_sequences() {
        let detection = SequenceDetector::default()
            .detect(["file.0001.exr", "file.001.exr"], None)
            .unwrap();
        assert!(detection.sequences.is_empty());
        assert_eq!(detection.rogues.len(), 2);
    }

    #[test]
    fn test_repeated_names_are_counted_once() {
        let names = ["r.0001.exr", "r.0002.exr", "r.0001.exr", "solo.0001.exr", "solo.0001.exr"];
        let detection = SequenceDetector::default()
            .detect(names, Some(Path::new("/shots")))
            .unwrap();

        assert_eq!(detection.sequences.len(), 1);
        let seq = &detection.sequences[0];
        assert_eq!(seq.filenames(), vec!["r.0001.exr", "r.0002.exr"]);
        assert!(seq.problems().is_empty());
        assert_eq!(detection.rogues, vec![PathBuf::from("/shots/solo.0001.exr")]);

        let components = crate::Components::builder().prefix("comp").build().unwrap();
        let (_, plan) = seq.rename(&components).unwrap();
        assert_eq!(plan.len(), 2);
        assert!(!plan.has_conflicts());
    }

    #[test]
    fn test_padding_drift_stays_one_sequence() {
        let names = ["f.998.exr", "f.999.exr", "f.1000.exr", "f.1001.exr"];
        let sequences = detect_file_sequences(names, None).unwrap();
        assert_eq!(sequences.len(), 1);
        assert_eq!(sequences[0].actual_frame_count(), 4);
        assert!(sequences[0].problems().contains(Problem::InconsistentPadding));
    }

    #[test]
    fn test_separate_groups_and_rogues() {
        let names = [
            "beauty.0001.exr",
            "beauty.0002.exr",
            "depth.0001.exr",
            "depth.0002.exr",
            "depth.0003.exr",
            "notes.txt",
            "lonely.0001.exr",
            "beauty.0001.png",
        ];
        let detection = SequenceDetector::default()
            .detect(names, Some(Path::new("/r")))
            .unwrap();
        let patterns: Vec<String> = detection
            .sequences
            .iter()
            .filter_map(|s| s.sequence_string())
            .collect();
        assert_eq!(patterns, vec!["beauty.####.exr", "depth.####.exr"]);
        assert_eq!(
            detection.rogues,
            vec![
                PathBuf::from("/r/beauty.0001.png"),
                PathBuf::from("/r/lonely.0001.exr"),
                PathBuf::from("/r/notes.txt"),
            ]
        );
        assert_eq!(detection.sequences[0].directory(), Some(Path::new("/r")));
    }

    #[test]
    fn test_order_independent() {
        let mut names = vec![
            "file.001.png",
            "file.02.png",
            "file.002.png",
            "file.04.png",
            "file.003.png",
            "file.004.png",
        ];
        let forward = detect_file_sequences(&names, None).unwrap();
        names.reverse();
        let backward = detect_file_sequences(&names, None).unwrap();
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_detect_paths_groups_by_directory() {
        let paths = [
            "/a/f.0001.exr",
            "/a/f.0002.exr",
            "/b/f.0003.exr",
            "/b/f.0004.exr",
            "/c/f.0005.exr",
        ];
        let detection = SequenceDetector::default().detect_paths(paths).unwrap();
        assert_eq!(detection.sequences.len(), 2);
        assert_eq!(detection.rogues, vec![PathBuf::from("/c/f.0005.exr")]);
    }

    #[test]
    fn test_path_in_name_list_is_error() {
        assert!(detect_file_sequences(["a/f.0001.exr"], None).is_err());
    }

    #[test]
    fn test_scan_directory() {
        let temp = TempDir::new().unwrap();
        for name in ["r.0001.exr", "r.0002.exr", "clip.mov", "take.0001.mp4", "readme.md"] {
            fs::write(temp.path().join(name), "x").unwrap();
        }
        fs::create_dir(temp.path().join("r.0003.exr")).unwrap();

        let scan = scan_directory(temp.path(), &Config::default()).unwrap();
        assert_eq!(scan.sequences.len(), 1);
        assert_eq!(scan.sequences[0].actual_frame_count(), 2);
        assert_eq!(
            scan.movies,
            vec![temp.path().join("clip.mov"), temp.path().join("take.0001.mp4")]
        );
        assert_eq!(scan.rogues, vec![temp.path().join("readme.md")]);
    }
}
