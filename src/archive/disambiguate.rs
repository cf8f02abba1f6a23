//! Choosing one file when several match a float or a cycle.
//!
//! File names follow the GDAC conventions: multi-profile files are `<wmo>_prof.nc` or
//! `<wmo>_Sprof.nc`, single profile files are `<B/M/S><R/D><wmo>_<cyc><D>.nc` where the first
//! letter marks the kind of file (B: bio, M: merged, S: synthetic), the next one the data mode
//! (R: real time, D: delayed mode) and a trailing `D` a descending profile.

use std::path::{Path, PathBuf};

use log::trace;

use crate::config::DatasetKind;

/// Whether a request is for a whole float or for some of its cycles.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum RequestShape {
    /// All the profiles of a float, from the multi-profile file.
    MultiProfile,
    /// One profile file per cycle.
    SingleCycle,
}

impl RequestShape {
    /// The shape of a request for this cycle.
    pub fn from_cycle(cycle: Option<u32>) -> Self {
        match cycle {
            Some(_) => RequestShape::SingleCycle,
            None => RequestShape::MultiProfile,
        }
    }
}

/// A test on a file name, without its `.nc` extension.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum Marker {
    /// The name starts with this.
    StartsWith(&'static str),
    /// The name does not end with this.
    NotEndsWith(&'static str),
}

impl Marker {
    fn matches(self, stem: &str) -> bool {
        match self {
            Marker::StartsWith(prefix) => stem.starts_with(prefix),
            Marker::NotEndsWith(suffix) => !stem.ends_with(suffix),
        }
    }
}

/// What made a file win over its duplicates.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum ProfileTag {
    /// Synthetic multi-profile file, `S` prefix.
    Synthetic,
    /// Real time ascending profile, `R` prefix and no trailing `D`.
    RealTimeAscent,
    /// Ascending profile, no trailing `D`.
    Ascent,
    /// Merged profile, `M` prefix.
    Merged,
}

/// A preference: all the markers must match the file name.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct Rule {
    /// Tag given to the file selected by this rule.
    pub tag: ProfileTag,
    /// Tests on the file name.
    pub markers: &'static [Marker],
}

impl Rule {
    fn matches(&self, path: &Path) -> bool {
        let stem = stem(path);
        self.markers.iter().all(|marker| marker.matches(stem))
    }
}

/// A resolved file, with the rule that selected it among duplicates if there were any.
#[derive(Clone, Debug, PartialEq)]
pub struct FileCandidate {
    /// Location of the file.
    pub path: PathBuf,
    /// `None` if the file was the only match or if no rule applied.
    pub tag: Option<ProfileTag>,
}

impl FileCandidate {
    /// A file that did not need disambiguation.
    pub fn unique(path: PathBuf) -> Self {
        FileCandidate { path, tag: None }
    }
}

const SYNTHETIC: &[Rule] = &[Rule {
    tag: ProfileTag::Synthetic,
    markers: &[Marker::StartsWith("S")],
}];
const REAL_TIME_ASCENT: &[Rule] = &[
    Rule {
        tag: ProfileTag::RealTimeAscent,
        markers: &[Marker::StartsWith("R"), Marker::NotEndsWith("D")],
    },
    Rule {
        tag: ProfileTag::Ascent,
        markers: &[Marker::NotEndsWith("D")],
    },
];
const MERGED: &[Rule] = &[Rule {
    tag: ProfileTag::Merged,
    markers: &[Marker::StartsWith("M")],
}];

/// The preferences for a dataset and request shape, tried in order. The first one matching any
/// candidate wins.
pub fn rules(kind: DatasetKind, shape: RequestShape) -> &'static [Rule] {
    match (kind, shape) {
        (DatasetKind::Standard, RequestShape::MultiProfile) => SYNTHETIC,
        (DatasetKind::Standard, RequestShape::SingleCycle) => REAL_TIME_ASCENT,
        (DatasetKind::Enriched, _) => MERGED,
    }
}

fn stem(path: &Path) -> &str {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.trim_end_matches(".nc"))
        .unwrap_or("")
}

/// Pick one of several candidate files, deterministically.
///
/// The candidates are expected to be sorted. The first candidate matching the first applicable
/// rule is returned, or the first candidate if no rule applies. Returns `None` only if there are
/// no candidates.
pub fn disambiguate(
    candidates: &[PathBuf],
    kind: DatasetKind,
    shape: RequestShape,
) -> Option<FileCandidate> {
    for rule in rules(kind, shape) {
        if let Some(path) = candidates.iter().find(|path| rule.matches(path)) {
            trace!("{:?} rule selected {}", rule.tag, path.display());
            return Some(FileCandidate {
                path: path.clone(),
                tag: Some(rule.tag),
            });
        }
    }

    trace!("no rule applies, falling back on the first candidate");
    candidates.first().cloned().map(FileCandidate::unique)
}
