//! Split a request into balanced sub-requests that can be resolved independently.

use std::{
    collections::{BTreeMap, HashMap},
    str::FromStr,
};

use chrono::Duration;
use log::{debug, warn};
use strum_macros::{EnumIter, EnumString, IntoStaticStr};

use crate::{
    domain::{BoxDomain, Domain, IdentifierDomain, Interval, TimeRange},
    errors::ArgoDataErr,
};

/// Upper limit on the number of chunks of a single request.
const MAX_CHUNKS: usize = 100_000;

/// Axes a request can be split along, in declaration order.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash, EnumString, IntoStaticStr, EnumIter,
)]
pub enum Axis {
    /// The list of float identifiers.
    #[strum(to_string = "id", serialize = "wmo")]
    Id,
    /// Longitude, degrees.
    #[strum(to_string = "lon")]
    Lon,
    /// Latitude, degrees.
    #[strum(to_string = "lat")]
    Lat,
    /// Depth, in the native unit of the box.
    #[strum(to_string = "dpt", serialize = "depth")]
    Depth,
    /// Time, sizes are in days.
    #[strum(to_string = "time")]
    Time,
}

impl Axis {
    /// The axes that can be split for this request.
    pub fn eligible(domain: &Domain) -> Vec<Axis> {
        match domain {
            Domain::Identifiers(_) => vec![Axis::Id],
            Domain::Box(bx) => match bx.arity() {
                8 => vec![Axis::Lon, Axis::Lat, Axis::Depth, Axis::Time],
                6 => vec![Axis::Lon, Axis::Lat, Axis::Depth],
                _ => vec![Axis::Lon, Axis::Lat],
            },
        }
    }

    /// Length of the request along this axis, `None` if the request does not have this axis.
    ///
    /// The identifier axis is measured in number of floats, the time axis in days.
    fn extent(self, domain: &Domain) -> Option<f64> {
        match (self, domain) {
            (Axis::Id, Domain::Identifiers(ids)) => Some(ids.wmos().len() as f64),
            (Axis::Lon, Domain::Box(bx)) => Some(bx.lon().width()),
            (Axis::Lat, Domain::Box(bx)) => Some(bx.lat().width()),
            (Axis::Depth, Domain::Box(bx)) => bx.depth().map(|d| d.width()),
            (Axis::Time, Domain::Box(bx)) => bx
                .time()
                .map(|t| (t.end - t.start).num_seconds() as f64 / 86_400.0),
            _ => None,
        }
    }
}

/// Number of chunks requested along each axis.
#[derive(Clone, Debug, PartialEq)]
pub enum ChunkCounts {
    /// Let the chunker decide; one chunk per axis unless a chunk size forces a split.
    Auto,
    /// Axis name to number of chunks. Axes left out are not split unless a size is given.
    PerAxis(BTreeMap<String, i64>),
}

impl ChunkCounts {
    /// Build an explicit mapping from `(axis name, count)` pairs.
    pub fn per_axis(pairs: &[(&str, i64)]) -> Self {
        ChunkCounts::PerAxis(
            pairs
                .iter()
                .map(|&(name, count)| (name.to_owned(), count))
                .collect(),
        )
    }
}

impl Default for ChunkCounts {
    fn default() -> Self {
        ChunkCounts::Auto
    }
}

impl FromStr for ChunkCounts {
    type Err = ArgoDataErr;

    /// Either `auto` or a list like `lon=2,lat=3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim() == "auto" {
            return Ok(ChunkCounts::Auto);
        }

        parse_pairs(s, |name, val| {
            val.parse::<i64>().map_err(|_| {
                ArgoDataErr::InvalidChunkSpec(format!(
                    "chunk count for {} is not an integer: {}",
                    name, val
                ))
            })
        })
        .map(ChunkCounts::PerAxis)
    }
}

/// Maximum chunk width along some axes, used to derive a count for axes without one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChunkSizes(pub BTreeMap<String, f64>);

impl ChunkSizes {
    /// Build from `(axis name, size)` pairs.
    pub fn new(pairs: &[(&str, f64)]) -> Self {
        ChunkSizes(
            pairs
                .iter()
                .map(|&(name, size)| (name.to_owned(), size))
                .collect(),
        )
    }
}

impl FromStr for ChunkSizes {
    type Err = ArgoDataErr;

    /// A list like `lon=10,time=30`, possibly empty.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Ok(ChunkSizes::default());
        }

        parse_pairs(s, |name, val| {
            val.parse::<f64>().map_err(|_| {
                ArgoDataErr::InvalidChunkSpec(format!(
                    "chunk size for {} is not a number: {}",
                    name, val
                ))
            })
        })
        .map(ChunkSizes)
    }
}

fn parse_pairs<T, F>(s: &str, parse_val: F) -> Result<BTreeMap<String, T>, ArgoDataErr>
where
    F: Fn(&str, &str) -> Result<T, ArgoDataErr>,
{
    let mut map = BTreeMap::new();

    for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let mut parts = pair.splitn(2, '=');
        match (parts.next(), parts.next()) {
            (Some(name), Some(val)) => {
                let name = name.trim();
                map.insert(name.to_owned(), parse_val(name, val.trim())?);
            }
            _ => {
                return Err(ArgoDataErr::InvalidChunkSpec(format!(
                    "expected axis=value, got {}",
                    pair
                )))
            }
        }
    }

    Ok(map)
}

/// One partition of a request.
#[derive(Clone, Debug, PartialEq)]
pub struct Chunk {
    /// Position of this chunk in the partition, results are reassembled in this order.
    pub index: usize,
    /// The part of the request covered by this chunk.
    pub domain: Domain,
}

/// Split a request into chunks.
///
/// An explicit count for an axis wins over a count derived from a chunk size, which wins over
/// the automatic choice of not splitting. The output order only depends on the arguments.
pub fn partition(
    domain: &Domain,
    counts: &ChunkCounts,
    sizes: &ChunkSizes,
) -> Result<Vec<Chunk>, ArgoDataErr> {
    let plan = resolve_counts(domain, counts, sizes)?;
    debug!("chunk plan for {}: {:?}", domain, plan);

    let count = |axis: Axis| plan.get(&axis).copied().unwrap_or(1);

    let domains: Vec<Domain> = match domain {
        Domain::Identifiers(ids) => split_identifiers(ids, count(Axis::Id))
            .into_iter()
            .map(Domain::Identifiers)
            .collect(),
        Domain::Box(bx) => split_box(bx, &count).into_iter().map(Domain::Box).collect(),
    };

    Ok(domains
        .into_iter()
        .enumerate()
        .map(|(index, domain)| Chunk { index, domain })
        .collect())
}

fn parse_axis(name: &str, eligible: &[Axis]) -> Result<Axis, ArgoDataErr> {
    let axis = Axis::from_str(name)
        .map_err(|_| ArgoDataErr::InvalidChunkSpec(format!("unknown axis: {}", name)))?;

    if eligible.contains(&axis) {
        Ok(axis)
    } else {
        Err(ArgoDataErr::InvalidChunkSpec(format!(
            "axis {} cannot be chunked for this request",
            name
        )))
    }
}

fn resolve_counts(
    domain: &Domain,
    counts: &ChunkCounts,
    sizes: &ChunkSizes,
) -> Result<HashMap<Axis, usize>, ArgoDataErr> {
    let eligible = Axis::eligible(domain);

    let mut explicit: HashMap<Axis, usize> = HashMap::new();
    if let ChunkCounts::PerAxis(map) = counts {
        for (name, &count) in map {
            let axis = parse_axis(name, &eligible)?;
            if count < 1 {
                return Err(ArgoDataErr::InvalidChunkSpec(format!(
                    "chunk count for {} must be at least 1, got {}",
                    name, count
                )));
            }
            if explicit.insert(axis, count as usize).is_some() {
                return Err(ArgoDataErr::InvalidChunkSpec(format!(
                    "axis {} given more than once",
                    name
                )));
            }
        }
    }

    let mut max_sizes: HashMap<Axis, f64> = HashMap::new();
    for (name, &size) in &sizes.0 {
        let axis = parse_axis(name, &eligible)?;
        if !size.is_finite() || size <= 0.0 {
            return Err(ArgoDataErr::InvalidChunkSpec(format!(
                "chunk size for {} must be positive, got {}",
                name, size
            )));
        }
        if max_sizes.insert(axis, size).is_some() {
            return Err(ArgoDataErr::InvalidChunkSpec(format!(
                "axis {} given more than once",
                name
            )));
        }
    }

    let mut plan = HashMap::with_capacity(eligible.len());
    for axis in eligible {
        let extent = axis.extent(domain).unwrap_or(0.0);

        let mut count = match (explicit.get(&axis), max_sizes.get(&axis)) {
            (Some(&count), _) => count,
            (None, Some(&size)) => ((extent / size).ceil() as usize).max(1),
            (None, None) => 1,
        };

        if count > 1 && extent <= 0.0 {
            let name: &'static str = axis.into();
            warn!("axis {} has no extent, it will not be split", name);
            count = 1;
        }

        if axis == Axis::Id && count as f64 > extent {
            debug!("more chunks than floats requested, using one float per chunk");
            count = extent as usize;
        }

        if axis == Axis::Time {
            let seconds = whole_seconds(domain).max(1) as usize;
            if count > seconds {
                debug!("more time chunks than seconds requested, using one second per chunk");
                count = seconds;
            }
        }

        if count > MAX_CHUNKS {
            let name: &'static str = axis.into();
            return Err(ArgoDataErr::InvalidChunkSpec(format!(
                "{} chunks along {}, at most {} are allowed",
                count, name, MAX_CHUNKS
            )));
        }

        plan.insert(axis, count);
    }

    let total = plan
        .values()
        .try_fold(1usize, |total, &count| total.checked_mul(count))
        .filter(|&total| total <= MAX_CHUNKS);
    if total.is_none() {
        return Err(ArgoDataErr::InvalidChunkSpec(format!(
            "the plan {:?} makes more than {} chunks",
            plan, MAX_CHUNKS
        )));
    }

    Ok(plan)
}

/// Whole seconds spanned by the time range of a box, zero without one.
fn whole_seconds(domain: &Domain) -> i64 {
    match domain {
        Domain::Box(bx) => bx
            .time()
            .map(|time| (time.end - time.start).num_seconds())
            .unwrap_or(0),
        Domain::Identifiers(_) => 0,
    }
}

fn split_identifiers(ids: &IdentifierDomain, count: usize) -> Vec<IdentifierDomain> {
    let wmos = ids.wmos();
    let base = wmos.len() / count;
    let remainder = wmos.len() % count;

    let mut groups = Vec::with_capacity(count);
    let mut start = 0;
    for i in 0..count {
        let len = if i < remainder { base + 1 } else { base };
        groups.push(ids.subset(&wmos[start..start + len]));
        start += len;
    }

    groups
}

fn split_interval(interval: Interval, count: usize) -> Vec<Interval> {
    let width = interval.width() / count as f64;

    let bounds: Vec<f64> = (0..=count)
        .map(|i| {
            if i == count {
                interval.max
            } else {
                interval.min + i as f64 * width
            }
        })
        .collect();

    bounds
        .windows(2)
        .map(|pair| Interval::new(pair[0], pair[1]))
        .collect()
}

fn split_time(range: TimeRange, count: usize) -> Vec<TimeRange> {
    let step = (range.end - range.start).num_seconds() / count as i64;

    let bounds: Vec<_> = (0..=count)
        .map(|i| {
            if i == count {
                range.end
            } else {
                range.start + Duration::seconds(step * i as i64)
            }
        })
        .collect();

    bounds
        .windows(2)
        .map(|pair| TimeRange::new(pair[0], pair[1]))
        .collect()
}

fn split_box<F>(bx: &BoxDomain, count: &F) -> Vec<BoxDomain>
where
    F: Fn(Axis) -> usize,
{
    let lons = split_interval(bx.lon(), count(Axis::Lon));
    let lats = split_interval(bx.lat(), count(Axis::Lat));
    let depths: Vec<Option<Interval>> = match bx.depth() {
        Some(depth) => split_interval(depth, count(Axis::Depth))
            .into_iter()
            .map(Some)
            .collect(),
        None => vec![None],
    };
    let times: Vec<Option<TimeRange>> = match bx.time() {
        Some(time) => split_time(time, count(Axis::Time))
            .into_iter()
            .map(Some)
            .collect(),
        None => vec![None],
    };

    let mut boxes = Vec::with_capacity(lons.len() * lats.len() * depths.len() * times.len());
    for time in &times {
        for depth in &depths {
            for lat in &lats {
                for lon in &lons {
                    boxes.push(BoxDomain::from_parts(*lon, *lat, *depth, *time));
                }
            }
        }
    }

    boxes
}

/*--------------------------------------------------------------------------------------------------
                                          Unit Tests
--------------------------------------------------------------------------------------------------*/
