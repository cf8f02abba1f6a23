//! Filtering the position index of the archive, one row per profile.

use std::fmt;

use chrono::NaiveDateTime;

use crate::{
    domain::{BoxDomain, Interval, TimeRange},
    errors::ArgoDataErr,
};

pub use cache::{CachedIndex, IndexCache};
pub use text::TextIndex;

mod cache;
mod text;

/// One row of the position index.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexRecord {
    /// Path of the profile file, relative to the `dac` folder.
    pub file: String,
    /// Date of the profile.
    pub date: NaiveDateTime,
    /// Latitude of the profile.
    pub latitude: f64,
    /// Longitude of the profile.
    pub longitude: f64,
    /// Ocean code (A, I or P).
    pub ocean: Option<String>,
    /// Float model code.
    pub profiler_type: Option<u32>,
    /// Institution code.
    pub institution: Option<String>,
    /// Date of the last update of the file.
    pub date_update: Option<NaiveDateTime>,
}

impl IndexRecord {
    /// The float identifier, from the file path.
    pub fn wmo(&self) -> Option<u32> {
        self.file.split('/').nth(1).and_then(|wmo| wmo.parse().ok())
    }

    /// The cycle number, from the file name. `None` for multi-profile files.
    pub fn cycle(&self) -> Option<u32> {
        let stem = self.stem();
        let digits = stem.rsplit('_').next()?.trim_end_matches('D');
        digits.parse().ok()
    }

    /// Is this a descending profile?
    pub fn is_descending(&self) -> bool {
        self.cycle().is_some() && self.stem().ends_with('D')
    }

    fn stem(&self) -> &str {
        let name = self.file.rsplit('/').next().unwrap_or("");
        name.trim_end_matches(".nc")
    }
}

/// The part of a box the index can filter on: position and, possibly, time.
///
/// Depth is not in the index, it is applied later when the profiles are decoded.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IndexBox {
    /// Longitude bounds, in either the [-180, 180] or the [0, 360] convention.
    pub lon: Interval,
    /// Latitude bounds.
    pub lat: Interval,
    /// Time bounds.
    pub time: Option<TimeRange>,
    /// Upper bounds left out of the box.
    pub open_max: OpenMax,
}

/// Which upper bounds of an [`IndexBox`] are excluded.
///
/// A chunk excludes the upper bounds it shares with the next chunk, so that a record lying on the
/// boundary belongs to exactly one chunk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OpenMax {
    /// Exclude the maximum longitude.
    pub lon: bool,
    /// Exclude the maximum latitude.
    pub lat: bool,
    /// Exclude the end time.
    pub time: bool,
}

/// The whole box, all bounds included.
impl From<&BoxDomain> for IndexBox {
    fn from(bx: &BoxDomain) -> Self {
        IndexBox {
            lon: bx.lon(),
            lat: bx.lat(),
            time: bx.time(),
            open_max: OpenMax::default(),
        }
    }
}

impl IndexBox {
    /// The box of one chunk of the `request` box.
    ///
    /// Upper bounds inside the request are excluded, the ones on the edge of the request stay
    /// included.
    pub fn within(chunk: &BoxDomain, request: &BoxDomain) -> Self {
        let time = match (chunk.time(), request.time()) {
            (Some(chunk), Some(request)) => chunk.end < request.end,
            _ => false,
        };

        IndexBox {
            open_max: OpenMax {
                lon: chunk.lon().max < request.lon().max,
                lat: chunk.lat().max < request.lat().max,
                time,
            },
            ..IndexBox::from(chunk)
        }
    }

    /// Does the record fall in this box? Lower bounds are always inclusive, upper bounds unless
    /// listed in `open_max`.
    pub fn contains(&self, record: &IndexRecord) -> bool {
        let in_time = match self.time {
            Some(ref time) if self.open_max.time => {
                time.start <= record.date && record.date < time.end
            }
            Some(ref time) => time.contains(&record.date),
            None => true,
        };

        in_time
            && in_interval(&self.lat, record.latitude, self.open_max.lat)
            && self.contains_lon(record.longitude)
    }

    fn contains_lon(&self, lon: f64) -> bool {
        let lon = if self.lon.max > 180.0 {
            if lon < 0.0 {
                lon + 360.0
            } else {
                lon
            }
        } else if lon > 180.0 {
            lon - 360.0
        } else {
            lon
        };

        in_interval(&self.lon, lon, self.open_max.lon)
    }
}

fn in_interval(interval: &Interval, val: f64, open_max: bool) -> bool {
    if open_max {
        interval.min <= val && val < interval.max
    } else {
        interval.contains(val)
    }
}

/// Canonical form, used as the key of cached filter results. Bounds are written in full, an
/// excluded upper bound is followed by `)`.
impl fmt::Display for IndexBox {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let open = |excluded: bool| if excluded { ")" } else { "" };

        write!(
            f,
            "[x={}/{}{}; y={}/{}{}",
            self.lon.min,
            self.lon.max,
            open(self.open_max.lon),
            self.lat.min,
            self.lat.max,
            open(self.open_max.lat)
        )?;

        if let Some(time) = self.time {
            write!(
                f,
                "; t={}/{}{}",
                time.start.format("%Y-%m-%dT%H:%M:%S"),
                time.end.format("%Y-%m-%dT%H:%M:%S"),
                open(self.open_max.time)
            )?;
        }

        write!(f, "]")
    }
}

/// A readable position index.
pub trait IndexSource: Send + Sync {
    /// The rows falling in the box, in index order.
    ///
    /// Returns `Ok(None)` if the index itself cannot be found, the caller decides whether that is
    /// an error.
    fn filter(&self, bx: &IndexBox) -> Result<Option<Vec<IndexRecord>>, ArgoDataErr>;
}

impl<S: IndexSource + ?Sized> IndexSource for Box<S> {
    fn filter(&self, bx: &IndexBox) -> Result<Option<Vec<IndexRecord>>, ArgoDataErr> {
        (**self).filter(bx)
    }
}

/*--------------------------------------------------------------------------------------------------
                                          Unit Tests
--------------------------------------------------------------------------------------------------*/
#[cfg(test)]
pub(crate) mod unit {
    use super::*;

    use chrono::NaiveDate;

    pub(crate) const TEST_INDEX: &str = "\
# Title : Profile directory file of the Argo Global Data Assembly Center
# Description : The directory file describes all individual profile files of the argo GDAC ftp site.
# Project : ARGO
# Format version : 2.0
# Date of update : 20200101000000
# FTP root number 1 : ftp://ftp.ifremer.fr/ifremer/argo/dac
# FTP root number 2 : ftp://usgodae.org/pub/outgoing/argo/dac
# GDAC node : CORIOLIS
file,date,latitude,longitude,ocean,profiler_type,institution,date_update
coriolis/6902766/profiles/R6902766_001.nc,20170115120000,45.1,-30.5,A,844,IF,20180101000000
coriolis/6902766/profiles/R6902766_002.nc,20170125120000,45.6,-29.8,A,844,IF,20180101000000
aoml/13857/profiles/R13857_001.nc,19970729200300,0.267,-16.032,A,845,AO,20080918131927
coriolis/6902772/profiles/D6902772_010D.nc,20170301000000,50.2,-25.0,A,844,IF,20190101000000
coriolis/6902914/profiles/R6902914_003.nc,20180601000000,-10.0,150.0,P,844,IF,20190101000000
";

    pub(crate) fn record(file: &str, date: NaiveDateTime, lat: f64, lon: f64) -> IndexRecord {
        IndexRecord {
            file: file.to_owned(),
            date,
            latitude: lat,
            longitude: lon,
            ocean: None,
            profiler_type: None,
            institution: None,
            date_update: None,
        }
    }

    fn ymd(year: i32, month: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd(year, month, day).and_hms(0, 0, 0)
    }

    #[test]
    fn test_record_identifiers() {
        let rec = record("aoml/13857/profiles/R13857_001.nc", ymd(1997, 7, 29), 0.2, -16.0);
        assert_eq!(rec.wmo(), Some(13857));
        assert_eq!(rec.cycle(), Some(1));
        assert!(!rec.is_descending());

        let rec = record(
            "coriolis/6902772/profiles/BD6902772_010D.nc",
            ymd(2017, 3, 1),
            50.2,
            -25.0,
        );
        assert_eq!(rec.wmo(), Some(6902772));
        assert_eq!(rec.cycle(), Some(10));
        assert!(rec.is_descending());

        let rec = record("coriolis/6902772/6902772_prof.nc", ymd(2017, 3, 1), 50.2, -25.0);
        assert_eq!(rec.cycle(), None);
        assert!(!rec.is_descending());
    }

    #[test]
    fn test_box_contains() {
        let bx = IndexBox {
            lon: Interval::new(-40.0, -20.0),
            lat: Interval::new(40.0, 50.0),
            time: Some(TimeRange::new(ymd(2017, 1, 1), ymd(2017, 2, 1))),
            open_max: OpenMax::default(),
        };

        assert!(bx.contains(&record("a", ymd(2017, 1, 15), 45.0, -30.0)));
        assert!(bx.contains(&record("a", ymd(2017, 2, 1), 50.0, -20.0)));
        assert!(!bx.contains(&record("a", ymd(2017, 2, 2), 45.0, -30.0)));
        assert!(!bx.contains(&record("a", ymd(2017, 1, 15), 51.0, -30.0)));
        assert!(!bx.contains(&record("a", ymd(2017, 1, 15), 45.0, -41.0)));
        assert!(bx.contains(&record("a", ymd(2017, 1, 15), 45.0, 330.0)));
    }

    #[test]
    fn test_box_contains_wraparound() {
        let bx = IndexBox {
            lon: Interval::new(300.0, 340.0),
            lat: Interval::new(40.0, 50.0),
            time: None,
            open_max: OpenMax::default(),
        };

        assert!(bx.contains(&record("a", ymd(2017, 1, 15), 45.0, -30.0)));
        assert!(bx.contains(&record("a", ymd(2017, 1, 15), 45.0, 330.0)));
        assert!(!bx.contains(&record("a", ymd(2017, 1, 15), 45.0, 30.0)));
    }

    #[test]
    fn test_canonical_string() {
        let bx = BoxDomain::from_strs(&["0", "20", "40", "60", "0", "1000", "2001-01", "2001-6"])
            .unwrap();
        assert_eq!(
            IndexBox::from(&bx).to_string(),
            "[x=0/20; y=40/60; t=2001-01-01T00:00:00/2001-06-01T00:00:00]"
        );

        let bx = BoxDomain::from_strs(&["0", "20", "40", "60", "0", "1000"]).unwrap();
        assert_eq!(IndexBox::from(&bx).to_string(), "[x=0/20; y=40/60]");

        let bx = BoxDomain::from_strs(&["0", "6.6667", "40", "60"]).unwrap();
        assert_eq!(IndexBox::from(&bx).to_string(), "[x=0/6.6667; y=40/60]");
    }

    #[test]
    fn test_chunk_box_excludes_shared_bounds() {
        let request =
            BoxDomain::from_strs(&["0", "20", "40", "60", "0", "1000", "2017-01", "2017-03"])
                .unwrap();
        let first =
            BoxDomain::from_strs(&["0", "10", "40", "60", "0", "1000", "2017-01", "2017-02"])
                .unwrap();
        let last =
            BoxDomain::from_strs(&["10", "20", "40", "60", "0", "1000", "2017-02", "2017-03"])
                .unwrap();

        let first = IndexBox::within(&first, &request);
        let last = IndexBox::within(&last, &request);
        assert_eq!(
            first.open_max,
            OpenMax {
                lon: true,
                lat: false,
                time: true
            }
        );
        assert_eq!(last.open_max, OpenMax::default());

        // On the shared longitude, only in the upper chunk.
        let on_edge = record("a", ymd(2017, 1, 15), 50.0, 10.0);
        assert!(!first.contains(&on_edge));
        assert!(IndexBox::within(
            &BoxDomain::from_strs(&["10", "20", "40", "60", "0", "1000", "2017-01", "2017-02"])
                .unwrap(),
            &request
        )
        .contains(&on_edge));

        // On the shared date, only in the later chunk.
        let at_change = record("a", ymd(2017, 2, 1), 50.0, 15.0);
        assert!(!first.contains(&record("a", ymd(2017, 2, 1), 50.0, 5.0)));
        assert!(last.contains(&at_change));

        // The outer edges of the request stay included.
        assert!(last.contains(&record("a", ymd(2017, 3, 1), 60.0, 20.0)));
        assert!(first.contains(&record("a", ymd(2017, 1, 1), 40.0, 0.0)));

        assert_eq!(
            first.to_string(),
            "[x=0/10); y=40/60; t=2017-01-01T00:00:00/2017-02-01T00:00:00)]"
        );
        assert_eq!(
            last.to_string(),
            "[x=10/20; y=40/60; t=2017-02-01T00:00:00/2017-03-01T00:00:00]"
        );
    }
}
