//! Resolve float requests to files in a local copy of the GDAC.

use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::{
    config::{ArchiveConfig, ErrorPolicy},
    errors::ArgoDataErr,
};

pub use disambiguate::{
    disambiguate, rules, FileCandidate, Marker, ProfileTag, RequestShape, Rule,
};
pub use store::{FileStore, LocalFileStore};

mod disambiguate;
mod store;

/// Builds file name patterns for floats and cycles and picks one file per pattern.
#[derive(Debug)]
pub struct PathResolver<'a, S: FileStore> {
    config: &'a ArchiveConfig,
    store: &'a S,
}

impl<'a, S: FileStore> PathResolver<'a, S> {
    /// Create a resolver for the archive described by `config`.
    pub fn new(config: &'a ArchiveConfig, store: &'a S) -> Self {
        PathResolver { config, store }
    }

    /// The expected path of the file, with wildcards where the archive layout is not known.
    ///
    /// Multi-profile files live at `dac/<dac>/<wmo>/<wmo>_<S>prof.nc`, single profile files at
    /// `dac/<dac>/<wmo>/profiles/<B/M/S><R/D><wmo>_<cyc><D>.nc`.
    pub fn pattern(&self, wmo: u32, cycle: Option<u32>) -> PathBuf {
        let float_dir = self.config.dac_root().join("*").join(wmo.to_string());

        match cycle {
            None => float_dir.join(format!(
                "{}_{}.nc",
                wmo,
                self.config.dataset_kind.multiprofile_suffix()
            )),
            Some(cyc) => float_dir
                .join("profiles")
                .join(format!("*{}_{}*.nc", wmo, cycle_label(cyc))),
        }
    }

    /// Find the file for a float, or one of its cycles, using the configured error policy.
    pub fn resolve_path(
        &self,
        wmo: u32,
        cycle: Option<u32>,
    ) -> Result<Option<PathBuf>, ArgoDataErr> {
        self.resolve_path_with(wmo, cycle, self.config.errors)
    }

    /// Find the file for a float, or one of its cycles.
    ///
    /// Returns `Ok(None)` if nothing matches and the policy is to ignore missing files. When
    /// several files match, the choice is made by [`disambiguate`].
    pub fn resolve_path_with(
        &self,
        wmo: u32,
        cycle: Option<u32>,
        errors: ErrorPolicy,
    ) -> Result<Option<PathBuf>, ArgoDataErr> {
        Ok(self
            .resolve_candidate(wmo, cycle, errors)?
            .map(|candidate| candidate.path))
    }

    /// Like [`PathResolver::resolve_path_with`], keeping track of why the file was chosen.
    pub fn resolve_candidate(
        &self,
        wmo: u32,
        cycle: Option<u32>,
        errors: ErrorPolicy,
    ) -> Result<Option<FileCandidate>, ArgoDataErr> {
        let pattern = self.pattern(wmo, cycle);
        let mut candidates = self.store.glob(&pattern)?;
        if let Some(cyc) = cycle {
            // The wildcard after the cycle number also matches longer cycle numbers.
            let label = cycle_label(cyc);
            candidates.retain(|path| is_cycle_file(path, &label));
        }
        candidates.sort();

        match candidates.len() {
            0 => match errors {
                ErrorPolicy::Raise => Err(ArgoDataErr::FileNotFound(describe(
                    wmo, cycle, &pattern,
                ))),
                ErrorPolicy::Ignore => {
                    warn!("skipping {}", describe(wmo, cycle, &pattern));
                    Ok(None)
                }
            },
            1 => Ok(candidates.pop().map(FileCandidate::unique)),
            n => {
                let shape = RequestShape::from_cycle(cycle);
                let choice = disambiguate(&candidates, self.config.dataset_kind, shape);
                debug!("{} files match {}, using {:?}", n, pattern.display(), choice);
                Ok(choice)
            }
        }
    }

    /// Check a path against the file store.
    pub fn exists(&self, path: &Path) -> bool {
        self.store.exists(path)
    }
}

/// Cycle number as written in file names, 3 digits up to 999 and 4 digits after.
fn cycle_label(cyc: u32) -> String {
    if cyc < 1000 {
        format!("{:03}", cyc)
    } else {
        format!("{:04}", cyc)
    }
}

/// Does the file name end with exactly this cycle number, possibly followed by the descending
/// profile flag?
fn is_cycle_file(path: &Path, label: &str) -> bool {
    let stem = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.trim_end_matches(".nc"))
        .unwrap_or("");

    match stem.rsplit('_').next() {
        Some(last) => last == label || last.strip_suffix('D') == Some(label),
        None => false,
    }
}

fn describe(wmo: u32, cycle: Option<u32>, pattern: &Path) -> String {
    match cycle {
        Some(cyc) => format!("WMO {} cycle {} ({})", wmo, cyc, pattern.display()),
        None => format!("WMO {} ({})", wmo, pattern.display()),
    }
}

/*--------------------------------------------------------------------------------------------------
                                          Unit Tests
--------------------------------------------------------------------------------------------------*/
