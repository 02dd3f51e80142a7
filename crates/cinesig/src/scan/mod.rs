//! Byte-pattern scanner.
//!
//! Matching is a sliding window with wildcard tokens. Candidate positions are
//! found with `memchr` on the first concrete byte and then verified in full,
//! which yields exactly the positions a naive window-by-window scan would.

use memchr::memchr_iter;
use serde::{Deserialize, Serialize};

use crate::memory::ModuleImage;
use crate::signature::{AddressClass, Pattern};

/// Number of match addresses kept when a pattern is ambiguous
pub const AMBIGUITY_SAMPLE: usize = 5;

/// Match-count classification for one pattern over one image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanOutcome {
    Unique(u64),
    NotFound,
    Ambiguous { count: usize, sample: Vec<u64> },
}

/// Every start offset in `data` where `pattern` matches
pub fn find_matches(data: &[u8], pattern: &Pattern) -> Vec<usize> {
    let len = pattern.len();
    if len == 0 || data.len() < len {
        return Vec::new();
    }
    let last = data.len() - len;

    let Some((anchor_idx, anchor_byte)) = pattern.anchor() else {
        // all wildcards: every window matches
        return (0..=last).collect();
    };

    memchr_iter(anchor_byte, &data[anchor_idx..=last + anchor_idx])
        .filter(|&start| pattern.matches_at(data, start))
        .collect()
}

/// Absolute addresses of all matches in the spans scanned for `class`.
///
/// Contiguous regions are scanned as one span, so a match never spans a hole
/// but may cross a section boundary.
pub fn scan_image(image: &ModuleImage, pattern: &Pattern, class: AddressClass) -> Vec<u64> {
    image
        .scan_spans(class)
        .iter()
        .flat_map(|(start, bytes)| {
            find_matches(bytes, pattern)
                .into_iter()
                .map(move |offset| start + offset as u64)
        })
        .collect()
}

/// Scan and classify: exactly one match is the only success
pub fn scan_unique(image: &ModuleImage, pattern: &Pattern, class: AddressClass) -> ScanOutcome {
    let matches = scan_image(image, pattern, class);
    match matches.as_slice() {
        [] => ScanOutcome::NotFound,
        [single] => ScanOutcome::Unique(*single),
        _ => ScanOutcome::Ambiguous {
            count: matches.len(),
            sample: matches.iter().take(AMBIGUITY_SAMPLE).copied().collect(),
        },
    }
}
