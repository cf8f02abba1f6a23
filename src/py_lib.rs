use crate::{
    chunker::{ChunkCounts, ChunkSizes},
    config::{ArchiveConfig, DatasetKind, ErrorPolicy},
    domain::{BoxDomain, Domain, IdentifierDomain},
    errors::ArgoDataErr,
    resolve::{ChunkFiles, Resolver},
};
use pyo3::{exceptions, prelude::*, wrap_pyfunction};
use std::str::FromStr;

fn config_for(root: &str, dataset: &str, errors: &str) -> PyResult<ArchiveConfig> {
    let dataset_kind = DatasetKind::from_str(dataset).map_err(ArgoDataErr::from)?;
    let errors = ErrorPolicy::from_str(errors).map_err(ArgoDataErr::from)?;

    Ok(ArchiveConfig::new(&root)
        .with_dataset_kind(dataset_kind)
        .with_errors(errors))
}

fn run(config: ArchiveConfig, domain: &Domain, chunks: &str) -> PyResult<Vec<Vec<String>>> {
    let counts = ChunkCounts::from_str(chunks)?;
    let resolved = Resolver::local(config).resolve(domain, &counts, &ChunkSizes::default())?;

    Ok(resolved.into_iter().map(to_strings).collect())
}

fn to_strings(chunk: ChunkFiles) -> Vec<String> {
    chunk
        .files
        .into_iter()
        .map(|path| path.to_string_lossy().into_owned())
        .collect()
}

/// Files of a list of floats, optionally restricted to some cycles, one list per chunk.
#[pyfunction(cycles = "None", dataset = "\"phy\"", errors = "\"raise\"", chunks = "\"auto\"")]
fn resolve_floats(
    root: &str,
    wmos: Vec<u32>,
    cycles: Option<Vec<u32>>,
    dataset: &str,
    errors: &str,
    chunks: &str,
) -> PyResult<Vec<Vec<String>>> {
    let config = config_for(root, dataset, errors)?;
    let domain = IdentifierDomain::new(&wmos, cycles.as_deref())?;

    run(config, &Domain::from(domain), chunks)
}

/// Files of the profiles in a box `[lon_min, lon_max, lat_min, lat_max, dpt_min, dpt_max,
/// date_min, date_max]`, one list per chunk.
#[pyfunction(dataset = "\"phy\"", errors = "\"raise\"", chunks = "\"auto\"")]
fn resolve_region(
    root: &str,
    region: Vec<&PyAny>,
    dataset: &str,
    errors: &str,
    chunks: &str,
) -> PyResult<Vec<Vec<String>>> {
    let config = config_for(root, dataset, errors)?;

    let vals: Vec<String> = region
        .iter()
        .map(|val| val.str().and_then(|s| s.to_str().map(str::to_owned)))
        .collect::<PyResult<_>>()?;
    let vals: Vec<&str> = vals.iter().map(String::as_str).collect();
    let domain = BoxDomain::from_strs(&vals)?;

    run(config, &Domain::from(domain), chunks)
}

/// Resolve Argo float requests to files in a local copy of the GDAC.
#[pymodule]
fn argo_data(_py: Python<'_>, m: &PyModule) -> PyResult<()> {
    m.add_wrapped(wrap_pyfunction!(resolve_floats))?;
    m.add_wrapped(wrap_pyfunction!(resolve_region))?;

    Ok(())
}

impl std::convert::From<ArgoDataErr> for PyErr {
    fn from(err: ArgoDataErr) -> PyErr {
        match err {
            ArgoDataErr::InvalidDomain(_)
            | ArgoDataErr::InvalidChunkSpec(_)
            | ArgoDataErr::StrumError(_) => exceptions::PyValueError::new_err(err.to_string()),
            ArgoDataErr::FileNotFound(_) => exceptions::PyFileNotFoundError::new_err(err.to_string()),
            _ => exceptions::PyException::new_err(err.to_string()),
        }
    }
}
