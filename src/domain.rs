//! The shape of a data request: a set of floats or a space/time box.

use std::{fmt, str::FromStr};

use chrono::{NaiveDate, NaiveDateTime};

use crate::{config::DatasetKind, errors::ArgoDataErr};

/// A closed numeric interval.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Interval {
    pub min: f64,
    pub max: f64,
}

impl Interval {
    /// Create a new interval, no checks are done here.
    pub const fn new(min: f64, max: f64) -> Self {
        Interval { min, max }
    }

    /// Distance between the bounds.
    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    /// Inclusive containment test.
    pub fn contains(&self, val: f64) -> bool {
        val >= self.min && val <= self.max
    }
}

/// A closed calendar interval.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeRange {
    /// Create a new range, no checks are done here.
    pub const fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        TimeRange { start, end }
    }

    /// Inclusive containment test.
    pub fn contains(&self, val: &NaiveDateTime) -> bool {
        *val >= self.start && *val <= self.end
    }
}

/// A request for a list of floats, optionally restricted to some cycles.
#[derive(Clone, Debug, PartialEq)]
pub struct IdentifierDomain {
    wmos: Vec<u32>,
    cycles: Option<Vec<u32>>,
}

impl IdentifierDomain {
    /// Validate and build a request for floats.
    ///
    /// Duplicated identifiers or cycles are dropped, keeping the first occurrence. The cycle
    /// numbers, if any, apply to every float.
    pub fn new(wmos: &[u32], cycles: Option<&[u32]>) -> Result<Self, ArgoDataErr> {
        if wmos.is_empty() {
            return Err(ArgoDataErr::InvalidDomain(
                "at least one float identifier is required".to_owned(),
            ));
        }

        if let Some(bad) = wmos.iter().find(|&&wmo| wmo == 0) {
            return Err(ArgoDataErr::InvalidDomain(format!(
                "float identifiers must be positive, got {}",
                bad
            )));
        }

        let cycles = match cycles {
            Some(cycles) if cycles.is_empty() => {
                return Err(ArgoDataErr::InvalidDomain(
                    "an empty cycle list selects nothing".to_owned(),
                ))
            }
            Some(cycles) => Some(dedup_stable(cycles)),
            None => None,
        };

        Ok(IdentifierDomain {
            wmos: dedup_stable(wmos),
            cycles,
        })
    }

    /// The float identifiers in request order.
    pub fn wmos(&self) -> &[u32] {
        &self.wmos
    }

    /// The cycle numbers, if the request is restricted to some.
    pub fn cycles(&self) -> Option<&[u32]> {
        self.cycles.as_deref()
    }

    /// A request for a subset of the floats, with the same cycles. The subset must come from
    /// this domain so it is already valid.
    pub(crate) fn subset(&self, wmos: &[u32]) -> Self {
        IdentifierDomain {
            wmos: wmos.to_vec(),
            cycles: self.cycles.clone(),
        }
    }
}

fn dedup_stable(vals: &[u32]) -> Vec<u32> {
    let mut seen = std::collections::HashSet::with_capacity(vals.len());
    vals.iter().copied().filter(|val| seen.insert(*val)).collect()
}

/// A rectangular region, optionally bounded in depth and time.
///
/// Equivalent to the list convention `[lon_min, lon_max, lat_min, lat_max]`, extended with
/// `[depth_min, depth_max]` and then `[time_min, time_max]`. A time range requires depth bounds.
#[derive(Clone, Debug, PartialEq)]
pub struct BoxDomain {
    lon: Interval,
    lat: Interval,
    depth: Option<Interval>,
    time: Option<TimeRange>,
}

impl BoxDomain {
    /// Validate and build a box.
    pub fn new(
        lon: Interval,
        lat: Interval,
        depth: Option<Interval>,
        time: Option<TimeRange>,
    ) -> Result<Self, ArgoDataErr> {
        check_interval("longitude", &lon)?;
        check_interval("latitude", &lat)?;

        let in_180 = lon.min >= -180.0 && lon.max <= 180.0;
        let in_360 = lon.min >= 0.0 && lon.max <= 360.0;
        if !in_180 && !in_360 {
            return Err(ArgoDataErr::InvalidDomain(format!(
                "longitude bounds {}/{} are outside of [-180, 180] and [0, 360]",
                lon.min, lon.max
            )));
        }

        if lat.min < -90.0 || lat.max > 90.0 {
            return Err(ArgoDataErr::InvalidDomain(format!(
                "latitude bounds {}/{} are outside of [-90, 90]",
                lat.min, lat.max
            )));
        }

        if let Some(ref depth) = depth {
            check_interval("depth", depth)?;
            if depth.min < 0.0 {
                return Err(ArgoDataErr::InvalidDomain(format!(
                    "depth must be positive, got {}",
                    depth.min
                )));
            }
        }

        if let Some(ref time) = time {
            if depth.is_none() {
                return Err(ArgoDataErr::InvalidDomain(
                    "a time range requires depth bounds".to_owned(),
                ));
            }
            if time.start > time.end {
                return Err(ArgoDataErr::InvalidDomain(format!(
                    "time bounds are not chronological: {} > {}",
                    time.start, time.end
                )));
            }
        }

        Ok(BoxDomain {
            lon,
            lat,
            depth,
            time,
        })
    }

    /// Parse a box from its list form: 4, 6 or 8 values, numbers first then dates.
    pub fn from_strs(vals: &[&str]) -> Result<Self, ArgoDataErr> {
        if vals.len() != 4 && vals.len() != 6 && vals.len() != 8 {
            return Err(ArgoDataErr::InvalidDomain(format!(
                "a box has 4, 6 or 8 elements, got {}",
                vals.len()
            )));
        }

        let num = |idx: usize| -> Result<f64, ArgoDataErr> {
            vals[idx].trim().parse::<f64>().map_err(|_| {
                ArgoDataErr::InvalidDomain(format!("box element {} is not a number", vals[idx]))
            })
        };
        let date = |idx: usize| -> Result<NaiveDateTime, ArgoDataErr> {
            parse_datetime(vals[idx]).ok_or_else(|| {
                ArgoDataErr::InvalidDomain(format!("box element {} is not a date", vals[idx]))
            })
        };

        let lon = Interval::new(num(0)?, num(1)?);
        let lat = Interval::new(num(2)?, num(3)?);
        let depth = if vals.len() >= 6 {
            Some(Interval::new(num(4)?, num(5)?))
        } else {
            None
        };
        let time = if vals.len() == 8 {
            Some(TimeRange::new(date(6)?, date(7)?))
        } else {
            None
        };

        Self::new(lon, lat, depth, time)
    }

    /// Number of elements in the list form of this box.
    pub fn arity(&self) -> usize {
        match (self.depth, self.time) {
            (_, Some(_)) => 8,
            (Some(_), None) => 6,
            (None, None) => 4,
        }
    }

    /// Longitude bounds.
    pub fn lon(&self) -> Interval {
        self.lon
    }

    /// Latitude bounds.
    pub fn lat(&self) -> Interval {
        self.lat
    }

    /// Depth bounds, if any.
    pub fn depth(&self) -> Option<Interval> {
        self.depth
    }

    /// Time bounds, if any.
    pub fn time(&self) -> Option<TimeRange> {
        self.time
    }

    /// Assemble a box from pieces of an already validated box.
    pub(crate) fn from_parts(
        lon: Interval,
        lat: Interval,
        depth: Option<Interval>,
        time: Option<TimeRange>,
    ) -> Self {
        BoxDomain {
            lon,
            lat,
            depth,
            time,
        }
    }
}

fn check_interval(name: &str, interval: &Interval) -> Result<(), ArgoDataErr> {
    if !interval.min.is_finite() || !interval.max.is_finite() {
        return Err(ArgoDataErr::InvalidDomain(format!(
            "{} bounds must be finite",
            name
        )));
    }

    if interval.min > interval.max {
        return Err(ArgoDataErr::InvalidDomain(format!(
            "{} bounds are reversed: {} > {}",
            name, interval.min, interval.max
        )));
    }

    Ok(())
}

impl FromStr for BoxDomain {
    type Err = ArgoDataErr;

    /// Comma separated list form, e.g. `-75,-45,20,30,0,10,2011-01,2011-06`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let vals: Vec<&str> = s
            .trim()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .split(',')
            .map(str::trim)
            .collect();
        Self::from_strs(&vals)
    }
}

/// A data request.
#[derive(Clone, Debug, PartialEq)]
pub enum Domain {
    /// Floats, optionally restricted to some cycles.
    Identifiers(IdentifierDomain),
    /// A space/time box.
    Box(BoxDomain),
}

impl Domain {
    /// A one line description of the request, prefixed by the dataset for float requests.
    pub fn cname(&self, dataset_kind: DatasetKind) -> String {
        match self {
            Domain::Identifiers(_) => {
                let prefix: &'static str = dataset_kind.into();
                format!("{};{}", prefix, self)
            }
            Domain::Box(_) => self.to_string(),
        }
    }
}

impl From<IdentifierDomain> for Domain {
    fn from(domain: IdentifierDomain) -> Self {
        Domain::Identifiers(domain)
    }
}

impl From<BoxDomain> for Domain {
    fn from(domain: BoxDomain) -> Self {
        Domain::Box(domain)
    }
}

impl fmt::Display for IdentifierDomain {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names: Vec<String> = self
            .wmos
            .iter()
            .map(|wmo| match self.cycles {
                Some(ref cycles) => {
                    let mut cycles = cycles.clone();
                    cycles.sort_unstable();
                    let cycles: Vec<String> =
                        cycles.iter().map(|cyc| format!("CYC{}", cyc)).collect();
                    format!("WMO{}_{}", wmo, cycles.join("_"))
                }
                None => format!("WMO{}", wmo),
            })
            .collect();

        write!(f, "{}", names.join(";"))
    }
}

impl fmt::Display for BoxDomain {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "[x={:.2}/{:.2}; y={:.2}/{:.2}",
            self.lon.min, self.lon.max, self.lat.min, self.lat.max
        )?;

        if let Some(depth) = self.depth {
            write!(f, "; z={:.1}/{:.1}", depth.min, depth.max)?;
        }

        if let Some(time) = self.time {
            write!(
                f,
                "; t={}/{}",
                time.start.format("%Y-%m-%d"),
                time.end.format("%Y-%m-%d")
            )?;
        }

        write!(f, "]")
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Domain::Identifiers(domain) => write!(f, "{}", domain),
            Domain::Box(domain) => write!(f, "{}", domain),
        }
    }
}

/// Parse the date formats found in requests and in the position index.
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM` (first of the month), `YYYY-MM-DDTHH:MM:SS`,
/// `YYYY-MM-DD HH:MM:SS`, `YYYYMMDD` and `YYYYMMDDHHMMSS`.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();

    if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
        return parse_compact(s);
    }

    for fmt in &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }

    let mut parts = s.split('-');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(year), Some(month), None) => {
            let year: i32 = year.parse().ok()?;
            let month: u32 = month.parse().ok()?;
            NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)
        }
        _ => None,
    }
}

fn parse_compact(s: &str) -> Option<NaiveDateTime> {
    let field = |range: std::ops::Range<usize>| -> Option<u32> { s.get(range)?.parse().ok() };

    let (hour, minute, second) = match s.len() {
        8 => (0, 0, 0),
        14 => (field(8..10)?, field(10..12)?, field(12..14)?),
        _ => return None,
    };

    let year = s.get(0..4)?.parse().ok()?;
    NaiveDate::from_ymd_opt(year, field(4..6)?, field(6..8)?)?.and_hms_opt(hour, minute, second)
}

/*--------------------------------------------------------------------------------------------------
                                          Unit Tests
--------------------------------------------------------------------------------------------------*/
#[cfg(test)]
mod unit {
    use super::*;

    fn ymd(year: i32, month: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd(year, month, day).and_hms(0, 0, 0)
    }

    fn assert_invalid(res: Result<BoxDomain, ArgoDataErr>) {
        match res {
            Err(ArgoDataErr::InvalidDomain(_)) => {}
            Err(err) => panic!("Wrong error type returned: {}", err),
            Ok(bx) => panic!("Accepted an invalid box: {}", bx),
        }
    }

    #[test]
    fn test_identifiers_dedup() {
        let domain = IdentifierDomain::new(&[6902766, 6902772, 6902766], Some(&[3, 1, 3]))
            .expect("valid domain");

        assert_eq!(domain.wmos(), &[6902766, 6902772]);
        assert_eq!(domain.cycles(), Some(&[3, 1][..]));
    }

    #[test]
    fn test_identifiers_invalid() {
        assert!(IdentifierDomain::new(&[], None).is_err());
        assert!(IdentifierDomain::new(&[0, 6902766], None).is_err());
        assert!(IdentifierDomain::new(&[6902766], Some(&[])).is_err());
    }

    #[test]
    fn test_box_from_strs() {
        let bx = BoxDomain::from_strs(&["0", "20", "40", "60"]).unwrap();
        assert_eq!(bx.arity(), 4);
        assert_eq!(bx.depth(), None);

        let bx = BoxDomain::from_strs(&["0", "20", "40", "60", "0", "1000"]).unwrap();
        assert_eq!(bx.arity(), 6);
        assert_eq!(bx.depth(), Some(Interval::new(0.0, 1000.0)));

        let bx =
            BoxDomain::from_strs(&["0", "20", "40", "60", "0", "1000", "2001-01", "2001-6"])
                .unwrap();
        assert_eq!(bx.arity(), 8);
        assert_eq!(
            bx.time(),
            Some(TimeRange::new(ymd(2001, 1, 1), ymd(2001, 6, 1)))
        );
    }

    #[test]
    fn test_box_invalid_arity() {
        assert_invalid(BoxDomain::from_strs(&[]));
        assert_invalid(BoxDomain::from_strs(&["0", "20", "40", "60", "0"]));
        let twelve: Vec<String> = (0..12).map(|i| i.to_string()).collect();
        let twelve: Vec<&str> = twelve.iter().map(String::as_str).collect();
        assert_invalid(BoxDomain::from_strs(&twelve));
    }

    #[test]
    fn test_box_invalid_num() {
        for i in 0..6 {
            let mut vals = vec!["0", "20", "40", "60", "0", "1000"];
            vals[i] = "str";
            assert_invalid(BoxDomain::from_strs(&vals));
        }
    }

    #[test]
    fn test_box_invalid_range() {
        for i in 0..6 {
            let mut vals = vec!["0", "20", "40", "60", "0", "1000"];
            vals[i] = "-1000";
            assert_invalid(BoxDomain::from_strs(&vals));
        }

        assert_invalid(BoxDomain::from_strs(&["20", "0", "40", "60"]));
        assert_invalid(BoxDomain::from_strs(&["-170", "350", "40", "60"]));
    }

    #[test]
    fn test_box_invalid_time() {
        for i in 6..8 {
            let mut vals = vec!["0", "20", "40", "60", "0", "1000", "2001-01", "2001-6"];
            vals[i] = "str";
            assert_invalid(BoxDomain::from_strs(&vals));
        }

        assert_invalid(BoxDomain::from_strs(&[
            "0", "20", "40", "60", "0", "1000", "2002-01-01", "2001-01-01",
        ]));

        assert_invalid(BoxDomain::new(
            Interval::new(0.0, 20.0),
            Interval::new(40.0, 60.0),
            None,
            Some(TimeRange::new(ymd(2001, 1, 1), ymd(2001, 6, 1))),
        ));
    }

    #[test]
    fn test_box_longitude_conventions() {
        assert!(BoxDomain::from_strs(&["-75", "-45", "20", "30"]).is_ok());
        assert!(BoxDomain::from_strs(&["300", "340", "20", "30"]).is_ok());
        assert!(BoxDomain::from_strs(&["-180", "180", "-90", "90"]).is_ok());
        assert!(BoxDomain::from_strs(&["0", "360", "-90", "90"]).is_ok());
    }

    #[test]
    fn test_box_from_str() {
        let bx: BoxDomain = "[-75, -45, 20, 30, 0, 10, 2011-01, 2011-06]".parse().unwrap();
        assert_eq!(bx.lon(), Interval::new(-75.0, -45.0));
        assert_eq!(bx.arity(), 8);
    }

    #[test]
    fn test_parse_datetime() {
        assert_eq!(parse_datetime("2001-06-15"), Some(ymd(2001, 6, 15)));
        assert_eq!(parse_datetime("2001-6"), Some(ymd(2001, 6, 1)));
        assert_eq!(parse_datetime("20010615"), Some(ymd(2001, 6, 15)));
        assert_eq!(
            parse_datetime("20010615123000"),
            Some(NaiveDate::from_ymd(2001, 6, 15).and_hms(12, 30, 0))
        );
        assert_eq!(
            parse_datetime("2001-06-15T12:30:00"),
            Some(NaiveDate::from_ymd(2001, 6, 15).and_hms(12, 30, 0))
        );
        assert_eq!(parse_datetime(""), None);
        assert_eq!(parse_datetime("str"), None);
        assert_eq!(parse_datetime("2001-13"), None);
        assert_eq!(parse_datetime("200106151230"), None);
    }

    #[test]
    fn test_cname() {
        let floats = Domain::from(IdentifierDomain::new(&[6902766, 6902772], None).unwrap());
        assert_eq!(
            floats.cname(DatasetKind::Standard),
            "phy;WMO6902766;WMO6902772"
        );

        let profiles = Domain::from(IdentifierDomain::new(&[6902766], Some(&[12, 1])).unwrap());
        assert_eq!(
            profiles.cname(DatasetKind::Enriched),
            "bgc;WMO6902766_CYC1_CYC12"
        );

        let region = Domain::from(
            BoxDomain::from_strs(&["0", "20", "40", "60", "0", "1000", "2001-01", "2001-6"])
                .unwrap(),
        );
        assert_eq!(
            region.cname(DatasetKind::Standard),
            "[x=0.00/20.00; y=40.00/60.00; z=0.0/1000.0; t=2001-01-01/2001-06-01]"
        );
    }
}
