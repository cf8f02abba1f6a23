//! Turn a whole request into one list of files per chunk.

use std::path::PathBuf;

use log::{info, warn};
use rayon::prelude::*;

use crate::{
    archive::{FileStore, LocalFileStore, PathResolver},
    chunker::{partition, Chunk, ChunkCounts, ChunkSizes},
    config::{ArchiveConfig, ErrorPolicy, ExecutionMode},
    domain::{Domain, IdentifierDomain},
    errors::ArgoDataErr,
    index::{IndexBox, IndexSource, TextIndex},
};

/// The files for one chunk of a request.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkFiles {
    /// Position of the chunk in the partition.
    pub index: usize,
    /// Absolute paths, in request order. Empty if nothing was found for this chunk.
    pub files: Vec<PathBuf>,
}

impl ChunkFiles {
    /// Is this chunk without any files?
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Resolves requests against an archive: float requests through the file names, box requests
/// through the position index.
#[derive(Debug)]
pub struct Resolver<S: FileStore, I: IndexSource> {
    config: ArchiveConfig,
    store: S,
    index: I,
}

impl Resolver<LocalFileStore, TextIndex> {
    /// A resolver for a GDAC copy on the local file system, using its own position index.
    pub fn local(config: ArchiveConfig) -> Self {
        let index = TextIndex::for_archive(&config);
        Resolver::new(config, LocalFileStore, index)
    }
}

impl<S: FileStore, I: IndexSource> Resolver<S, I> {
    /// Assemble a resolver from its parts.
    pub fn new(config: ArchiveConfig, store: S, index: I) -> Self {
        Resolver {
            config,
            store,
            index,
        }
    }

    /// The configuration in use.
    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    /// Partition the request and find the files of every chunk.
    ///
    /// The result is always in chunk order, whatever the execution mode. Under the raise policy
    /// the first error is returned and no partial result is produced.
    pub fn resolve(
        &self,
        domain: &Domain,
        counts: &ChunkCounts,
        sizes: &ChunkSizes,
    ) -> Result<Vec<ChunkFiles>, ArgoDataErr> {
        self.config.check_root()?;

        let chunks = partition(domain, counts, sizes)?;

        let resolved: Vec<ChunkFiles> = match self.config.execution {
            ExecutionMode::Sequential => chunks
                .iter()
                .map(|chunk| self.resolve_chunk(domain, chunk))
                .collect::<Result<Vec<_>, _>>()?,
            ExecutionMode::Parallel => chunks
                .par_iter()
                .map(|chunk| self.resolve_chunk(domain, chunk))
                .collect::<Result<Vec<_>, _>>()?,
        };

        let num_files: usize = resolved.iter().map(|chunk| chunk.files.len()).sum();
        info!(
            "{} resolved to {} files in {} chunks",
            domain.cname(self.config.dataset_kind),
            num_files,
            resolved.len()
        );

        Ok(resolved)
    }

    /// Find the files of a single chunk of `request`.
    ///
    /// A box chunk leaves out the records on the upper bounds it shares with its neighbours, they
    /// belong to the next chunk.
    pub fn resolve_chunk(
        &self,
        request: &Domain,
        chunk: &Chunk,
    ) -> Result<ChunkFiles, ArgoDataErr> {
        let files = match (&chunk.domain, request) {
            (Domain::Identifiers(ids), _) => self.identifier_files(ids),
            (Domain::Box(bx), Domain::Box(whole)) => self.box_files(&IndexBox::within(bx, whole)),
            (Domain::Box(bx), Domain::Identifiers(_)) => self.box_files(&IndexBox::from(bx)),
        };

        let files = match files {
            Ok(files) => files,
            Err(err) => self.degrade(chunk, err)?,
        };

        Ok(ChunkFiles {
            index: chunk.index,
            files,
        })
    }

    // Under the ignore policy a failing chunk is left empty. A missing index or archive is
    // always an error.
    fn degrade(&self, chunk: &Chunk, err: ArgoDataErr) -> Result<Vec<PathBuf>, ArgoDataErr> {
        match (self.config.errors, err) {
            (_, err @ ArgoDataErr::IndexUnavailable(_)) => Err(err),
            (_, err @ ArgoDataErr::InvalidArchiveRoot(_)) => Err(err),
            (ErrorPolicy::Ignore, err) => {
                warn!("chunk {} ({}) left empty: {}", chunk.index, chunk.domain, err);
                Ok(vec![])
            }
            (ErrorPolicy::Raise, err) => Err(err),
        }
    }

    fn identifier_files(&self, ids: &IdentifierDomain) -> Result<Vec<PathBuf>, ArgoDataErr> {
        let resolver = PathResolver::new(&self.config, &self.store);

        let mut files = vec![];
        for &wmo in ids.wmos() {
            match ids.cycles() {
                None => files.extend(resolver.resolve_path(wmo, None)?),
                Some(cycles) => {
                    for &cyc in cycles {
                        files.extend(resolver.resolve_path(wmo, Some(cyc))?);
                    }
                }
            }
        }

        Ok(files)
    }

    fn box_files(&self, index_box: &IndexBox) -> Result<Vec<PathBuf>, ArgoDataErr> {
        let records = self.index.filter(index_box)?.ok_or_else(|| {
            ArgoDataErr::IndexUnavailable(format!(
                "no position index in {} for {}",
                self.config.archive_root.display(),
                index_box
            ))
        })?;

        let dac_root = self.config.dac_root();

        let mut files = Vec::with_capacity(records.len());
        for rec in records {
            let path = dac_root.join(&rec.file);
            if self.store.exists(&path) {
                files.push(path);
                continue;
            }

            match self.config.errors {
                ErrorPolicy::Raise => {
                    return Err(ArgoDataErr::FileNotFound(path.display().to_string()));
                }
                ErrorPolicy::Ignore => warn!("skipping {}, not in the archive", path.display()),
            }
        }

        Ok(files)
    }
}

/*--------------------------------------------------------------------------------------------------
                                          Unit Tests
--------------------------------------------------------------------------------------------------*/
