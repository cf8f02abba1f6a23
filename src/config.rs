//! Explicit configuration threaded into the resolvers.

use std::path::{Path, PathBuf};

use strum_macros::{EnumIter, EnumString, IntoStaticStr};

use crate::errors::ArgoDataErr;

/// Which family of measurements is requested.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, EnumString, IntoStaticStr, EnumIter)]
pub enum DatasetKind {
    /// Core physical parameters (temperature, salinity, pressure).
    #[strum(to_string = "phy", serialize = "PHY", serialize = "standard")]
    Standard,
    /// Biogeochemical parameters, served from the synthetic/merged files.
    #[strum(to_string = "bgc", serialize = "BGC", serialize = "enriched")]
    Enriched,
}

impl DatasetKind {
    /// Suffix of the multi-profile file name for this kind of dataset.
    pub fn multiprofile_suffix(self) -> &'static str {
        match self {
            DatasetKind::Standard => "prof",
            DatasetKind::Enriched => "Sprof",
        }
    }
}

/// What to do when a requested file is not in the archive.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, EnumString, IntoStaticStr, EnumIter)]
pub enum ErrorPolicy {
    /// Fail the whole request on the first missing file.
    #[strum(to_string = "raise")]
    Raise,
    /// Skip missing files and return what could be found.
    #[strum(to_string = "ignore")]
    Ignore,
}

/// How chunks are resolved.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, EnumString, IntoStaticStr, EnumIter)]
pub enum ExecutionMode {
    /// One chunk after the other on the calling thread.
    #[strum(to_string = "sequential")]
    Sequential,
    /// Chunks spread across the rayon thread pool.
    #[strum(to_string = "thread", serialize = "parallel")]
    Parallel,
}

/// Settings shared by every component that touches the archive.
#[derive(Clone, Debug, PartialEq)]
pub struct ArchiveConfig {
    /// Directory holding the `dac` folder and the position index.
    pub archive_root: PathBuf,
    /// Dataset to resolve files for.
    pub dataset_kind: DatasetKind,
    /// Missing file policy.
    pub errors: ErrorPolicy,
    /// Sequential or parallel chunk resolution.
    pub execution: ExecutionMode,
}

impl ArchiveConfig {
    const DAC_DIR: &'static str = "dac";
    const INDEX_FILE: &'static str = "ar_index_global_prof.txt";
    const INDEX_FILE_GZ: &'static str = "ar_index_global_prof.txt.gz";

    /// Create a configuration with the standard dataset, raise policy and sequential execution.
    pub fn new(root: &dyn AsRef<Path>) -> Self {
        ArchiveConfig {
            archive_root: root.as_ref().to_path_buf(),
            dataset_kind: DatasetKind::Standard,
            errors: ErrorPolicy::Raise,
            execution: ExecutionMode::Sequential,
        }
    }

    /// Select the dataset kind.
    pub fn with_dataset_kind(self, dataset_kind: DatasetKind) -> Self {
        ArchiveConfig {
            dataset_kind,
            ..self
        }
    }

    /// Select the missing file policy.
    pub fn with_errors(self, errors: ErrorPolicy) -> Self {
        ArchiveConfig { errors, ..self }
    }

    /// Select the execution mode.
    pub fn with_execution(self, execution: ExecutionMode) -> Self {
        ArchiveConfig { execution, ..self }
    }

    /// The `dac` directory under the root, where the float folders live.
    pub fn dac_root(&self) -> PathBuf {
        self.archive_root.join(Self::DAC_DIR)
    }

    /// Make sure the root looks like a local copy of the GDAC.
    pub fn check_root(&self) -> Result<(), ArgoDataErr> {
        if self.dac_root().is_dir() {
            Ok(())
        } else {
            Err(ArgoDataErr::InvalidArchiveRoot(
                self.archive_root.display().to_string(),
            ))
        }
    }

    /// Location of the position index, preferring the uncompressed file.
    ///
    /// Returns `None` if neither the plain text nor the gzipped index exists.
    pub fn index_path(&self) -> Option<PathBuf> {
        [Self::INDEX_FILE, Self::INDEX_FILE_GZ]
            .iter()
            .map(|name| self.archive_root.join(name))
            .find(|path| path.is_file())
    }
}
