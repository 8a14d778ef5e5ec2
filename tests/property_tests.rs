//! Property-based tests for frameseq
//!
//! Generated filenames use lowercase prefixes (optionally dotted), a
//! one-character delimiter, an optional `_word` suffix and a short
//! alphabetic extension or none at all.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use frameseq::{Item, SequenceDetector, detect_file_sequences, parse_filename};

use proptest::prelude::*;

fn delimiter() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![".", "_", "-"])
}

fn suffixes() -> impl Strategy<Value = String> {
    prop_oneof![Just(String::new()), "_[a-z]{1,4}"]
}

fn extension() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["exr", "png", "dpx", "jpg", "tif", ""])
}

fn prefixes() -> impl Strategy<Value = String> {
    prop_oneof!["[a-z]{1,8}", "[a-z]{1,4}\\.[a-z]{1,4}"]
}

fn padded(frame: u64, padding: usize) -> String {
    format!("{:0width$}", frame, width = padding)
}

// ============================================================================
// Filename grammar
// ============================================================================

proptest! {
    /// An item built from valid parts parses back to the same item; only
    /// extension-less names with a dotted tail are refused up front
    #[test]
    fn prop_filename_round_trip(
        prefix in prefixes(),
        delim in delimiter(),
        frame in 0u64..1_000_000,
        padding in 0usize..9,
        suffix in suffixes(),
        ext in extension(),
    ) {
        match Item::new(prefix, delim, padded(frame, padding), suffix, ext) {
            Ok(item) => {
                let parsed = parse_filename(&item.filename()).unwrap();
                prop_assert_eq!(parsed, Some(item));
            }
            Err(_) => prop_assert!(ext.is_empty()),
        }
    }

    /// Re-padding never drops digits and never changes the frame number
    #[test]
    fn prop_padding_is_at_least_digit_count(
        frame in 0u64..10_000_000,
        padding in 0usize..12,
    ) {
        let item = Item::new("shot", ".", frame.to_string(), "", "exr").unwrap();
        let repadded = item.with_padding(padding);

        prop_assert_eq!(repadded.frame_number(), frame);
        prop_assert_eq!(repadded.padding(), padding.max(frame.to_string().len()));
        prop_assert_eq!(repadded.frame_string().parse::<u64>().unwrap(), frame);
    }
}

// ============================================================================
// Detection
// ============================================================================

proptest! {
    /// Input order never changes what is detected
    #[test]
    fn prop_detection_is_order_independent(
        (names, shuffled) in prop::collection::btree_set(0u64..500, 2..30)
            .prop_map(|frames| frames.into_iter().map(|f| format!("plate_{:04}.dpx", f)).collect::<Vec<_>>())
            .prop_flat_map(|names| (Just(names.clone()), Just(names).prop_shuffle()))
    ) {
        let a = detect_file_sequences(&names, None).unwrap();
        let b = detect_file_sequences(&shuffled, None).unwrap();
        prop_assert_eq!(a.len(), 1);
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(a[0].actual_frame_count(), names.len());
    }

    /// Every parsed name lands in exactly one sequence or in the rogues
    #[test]
    fn prop_detection_accounts_for_every_file(
        frames in prop::collection::btree_set(0u64..200, 1..20),
        extras in prop::collection::btree_set("[a-z]{3,6}\\.txt", 0..5),
    ) {
        let mut names: Vec<String> = frames.iter().map(|f| format!("beauty.{:03}.exr", f)).collect();
        names.extend(extras.iter().cloned());

        let detection = SequenceDetector::default()
            .detect(&names, Some(Path::new("/shots")))
            .unwrap();
        let in_sequences: usize = detection.sequences.iter().map(|s| s.actual_frame_count()).sum();
        prop_assert_eq!(in_sequences + detection.rogues.len(), names.len());
    }

    /// Missing frames are exactly the holes between first and last
    #[test]
    fn prop_missing_frames_fill_the_range(
        frames in prop::collection::btree_set(0u64..300, 2..40),
    ) {
        let names: Vec<String> = frames.iter().map(|f| format!("r.{:04}.exr", f)).collect();
        let sequences = detect_file_sequences(&names, None).unwrap();
        let seq = &sequences[0];

        let first = *frames.iter().next().unwrap();
        let last = *frames.iter().next_back().unwrap();
        let expected: Vec<u64> = (first..=last).filter(|f| !frames.contains(f)).collect();

        prop_assert_eq!(seq.missing_frames(), expected);
        prop_assert_eq!(seq.frame_count(), last - first + 1);
    }
}

// ============================================================================
// Offset ordering
// ============================================================================

proptest! {
    /// Replaying an offset plan in order never lands on a name that is still taken
    #[test]
    fn prop_offset_never_overwrites(
        frames in prop::collection::btree_set(0u64..200, 2..25),
        delta in -50i64..50,
    ) {
        let min = *frames.iter().next().unwrap() as i64;
        prop_assume!(min + delta >= 0);

        let names: Vec<String> = frames.iter().map(|f| format!("cg_{:04}.tif", f)).collect();
        let sequences = detect_file_sequences(&names, Some(Path::new("/shots"))).unwrap();
        let (shifted, plan) = sequences[0].offset_frames(delta, None).unwrap();

        let mut on_disk: HashSet<String> = names.iter().map(|n| format!("/shots/{}", n)).collect();
        for op in plan.operations() {
            let source = op.source().to_string_lossy().into_owned();
            let dest = op.destination().unwrap().to_string_lossy().into_owned();
            prop_assert!(!on_disk.contains(&dest), "{} still occupied", dest);
            prop_assert!(on_disk.remove(&source));
            on_disk.insert(dest);
        }

        let expected: BTreeSet<u64> = frames.iter().map(|f| (*f as i64 + delta) as u64).collect();
        let actual: BTreeSet<u64> = shifted.existing_frames().into_iter().collect();
        prop_assert_eq!(actual, expected);
    }
}
