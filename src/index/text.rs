use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};

use log::{debug, info};

use super::{IndexBox, IndexRecord, IndexSource};

use crate::{config::ArchiveConfig, domain::parse_datetime, errors::ArgoDataErr};

/// The comma separated position index of the GDAC, `ar_index_global_prof.txt`.
///
/// The file is streamed record by record on every request, it is never loaded whole. Files ending
/// in `.gz` are decompressed on the fly.
#[derive(Clone, Debug)]
pub struct TextIndex {
    path: PathBuf,
}

/// Positions of the columns, found from the header line.
struct Columns {
    file: usize,
    date: usize,
    latitude: usize,
    longitude: usize,
    ocean: Option<usize>,
    profiler_type: Option<usize>,
    institution: Option<usize>,
    date_update: Option<usize>,
}

impl TextIndex {
    /// An index at a known location.
    pub fn new(path: &dyn AsRef<Path>) -> Self {
        TextIndex {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The index of the archive described by `config`.
    ///
    /// If there is no index file yet, the plain text name is used and filtering finds nothing.
    pub fn for_archive(config: &ArchiveConfig) -> Self {
        let path = config
            .index_path()
            .unwrap_or_else(|| config.archive_root.join("ar_index_global_prof.txt"));
        TextIndex { path }
    }

    /// Location of the index file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unavailable(&self, msg: &dyn std::fmt::Display) -> ArgoDataErr {
        ArgoDataErr::IndexUnavailable(format!("{}: {}", self.path.display(), msg))
    }

    fn open(&self) -> Result<Option<csv::Reader<Box<dyn Read>>>, ArgoDataErr> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(self.unavailable(&err)),
        };

        let is_gz = self
            .path
            .extension()
            .map(|ext| ext == "gz")
            .unwrap_or(false);

        let reader: Box<dyn Read> = if is_gz {
            Box::new(flate2::read::GzDecoder::new(file))
        } else {
            Box::new(file)
        };

        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .comment(Some(b'#'))
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        Ok(Some(reader))
    }

    fn columns(&self, header: &csv::StringRecord) -> Result<Columns, ArgoDataErr> {
        let find = |name: &str| header.iter().position(|col| col == name);
        let required = |name: &str| -> Result<usize, ArgoDataErr> {
            find(name).ok_or_else(|| self.unavailable(&format!("no {} column", name)))
        };

        Ok(Columns {
            file: required("file")?,
            date: required("date")?,
            latitude: required("latitude")?,
            longitude: required("longitude")?,
            ocean: find("ocean"),
            profiler_type: find("profiler_type"),
            institution: find("institution"),
            date_update: find("date_update"),
        })
    }
}

impl Columns {
    /// Parse one row, `None` if the position, the date or the file is missing or invalid.
    fn parse(&self, row: &csv::StringRecord) -> Option<IndexRecord> {
        let text = |idx: Option<usize>| -> Option<String> {
            idx.and_then(|idx| row.get(idx))
                .filter(|val| !val.is_empty())
                .map(str::to_owned)
        };
        let number = |idx: usize| -> Option<f64> {
            row.get(idx)?
                .parse::<f64>()
                .ok()
                .filter(|val| val.is_finite())
        };

        let file = text(Some(self.file))?;
        let date = parse_datetime(row.get(self.date)?)?;
        let latitude = number(self.latitude)?;
        let longitude = number(self.longitude)?;

        Some(IndexRecord {
            file,
            date,
            latitude,
            longitude,
            ocean: text(self.ocean),
            profiler_type: text(self.profiler_type).and_then(|val| val.parse().ok()),
            institution: text(self.institution),
            date_update: text(self.date_update).and_then(|val| parse_datetime(&val)),
        })
    }
}

impl IndexSource for TextIndex {
    fn filter(&self, bx: &IndexBox) -> Result<Option<Vec<IndexRecord>>, ArgoDataErr> {
        let mut reader = match self.open()? {
            Some(reader) => reader,
            None => {
                debug!("no index at {}", self.path.display());
                return Ok(None);
            }
        };

        let header = reader.headers().map_err(|err| self.unavailable(&err))?;
        let columns = self.columns(header)?;

        let mut found = vec![];
        let mut skipped = 0;

        for row in reader.records() {
            let row = match row {
                Ok(row) => row,
                Err(err) if err.is_io_error() => return Err(self.unavailable(&err)),
                Err(err) => {
                    debug!("unreadable row of the index: {}", err);
                    skipped += 1;
                    continue;
                }
            };

            match columns.parse(&row) {
                Some(record) => {
                    if bx.contains(&record) {
                        found.push(record);
                    }
                }
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            debug!("skipped {} incomplete rows of the index", skipped);
        }
        info!("{} profiles of the index are in {}", found.len(), bx);

        Ok(Some(found))
    }
}

#[cfg(test)]
mod unit {
    use super::*;
    use crate::{
        domain::BoxDomain,
        index::unit::{record, TEST_INDEX},
    };

    use std::io::Write;

    use chrono::NaiveDate;
    use tempdir::TempDir;

    fn write_index(tmp: &TempDir, name: &str, text: &str) -> PathBuf {
        let path = tmp.path().join(name);
        if name.ends_with(".gz") {
            let file = File::create(&path).unwrap();
            let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            encoder.write_all(text.as_bytes()).unwrap();
            encoder.finish().unwrap();
        } else {
            std::fs::write(&path, text).unwrap();
        }
        path
    }

    fn region(vals: &[&str]) -> IndexBox {
        IndexBox::from(&BoxDomain::from_strs(vals).unwrap())
    }

    fn files(records: &[IndexRecord]) -> Vec<&str> {
        records.iter().map(|rec| rec.file.as_str()).collect()
    }

    #[test]
    fn test_filter_selects_in_order() {
        let tmp = TempDir::new("argo-data-test-index").unwrap();
        let index = TextIndex::new(&write_index(&tmp, "ar_index_global_prof.txt", TEST_INDEX));

        let bx = region(&[
            "-35", "-25", "44", "46", "0", "100", "2017-01-01", "2017-02-01",
        ]);
        let found = index.filter(&bx).unwrap().expect("index exists");
        assert_eq!(
            files(&found),
            vec![
                "coriolis/6902766/profiles/R6902766_001.nc",
                "coriolis/6902766/profiles/R6902766_002.nc",
            ]
        );

        let first = &found[0];
        let expected = IndexRecord {
            ocean: Some("A".to_owned()),
            profiler_type: Some(844),
            institution: Some("IF".to_owned()),
            date_update: Some(NaiveDate::from_ymd(2018, 1, 1).and_hms(0, 0, 0)),
            ..record(
                "coriolis/6902766/profiles/R6902766_001.nc",
                NaiveDate::from_ymd(2017, 1, 15).and_hms(12, 0, 0),
                45.1,
                -30.5,
            )
        };
        assert_eq!(first, &expected);

        let disjoint = region(&["100", "120", "-60", "-40"]);
        assert!(index.filter(&disjoint).unwrap().unwrap().is_empty());
    }

    #[test]
    fn test_filter_without_time() {
        let tmp = TempDir::new("argo-data-test-index").unwrap();
        let index = TextIndex::new(&write_index(&tmp, "ar_index_global_prof.txt", TEST_INDEX));

        let found = index
            .filter(&region(&["-40", "-10", "-5", "60"]))
            .unwrap()
            .unwrap();
        assert_eq!(found.len(), 4);

        let found = index
            .filter(&region(&["140", "160", "-20", "0"]))
            .unwrap()
            .unwrap();
        assert_eq!(files(&found), vec!["coriolis/6902914/profiles/R6902914_003.nc"]);

        // Same area, 0-360 convention.
        let found = index
            .filter(&region(&["320", "350", "-5", "60"]))
            .unwrap()
            .unwrap();
        assert_eq!(found.len(), 4);
    }

    #[test]
    fn test_filter_gzip() {
        let tmp = TempDir::new("argo-data-test-index").unwrap();
        let index = TextIndex::new(&write_index(&tmp, "ar_index_global_prof.txt.gz", TEST_INDEX));

        let found = index
            .filter(&region(&["-40", "-10", "-5", "60"]))
            .unwrap()
            .unwrap();
        assert_eq!(found.len(), 4);
    }

    #[test]
    fn test_filter_skips_bad_rows() {
        let text = "\
# comment
longitude,latitude,date,file
-30.0,45.0,20170115000000,coriolis/1/profiles/R1_001.nc
,45.0,20170115000000,coriolis/1/profiles/R1_002.nc
-30.0,45.0,,coriolis/1/profiles/R1_003.nc
-30.0,north,20170115000000,coriolis/1/profiles/R1_004.nc
-30.0,45.0,20170115000000,coriolis/1/profiles/R1_005.nc
";
        let tmp = TempDir::new("argo-data-test-index").unwrap();
        let index = TextIndex::new(&write_index(&tmp, "index.txt", text));

        let found = index
            .filter(&region(&["-40", "-10", "-5", "60"]))
            .unwrap()
            .unwrap();
        assert_eq!(
            files(&found),
            vec!["coriolis/1/profiles/R1_001.nc", "coriolis/1/profiles/R1_005.nc"]
        );
    }

    #[test]
    fn test_filter_quoted_fields() {
        let text = "\
# Title : Profile directory file of the Argo Global Data Assembly Center
file,date,latitude,longitude,ocean,profiler_type,institution,date_update
coriolis/1/profiles/R1_001.nc,20170115000000,45.0,-30.0,A,844,\"IF, FR\",20180101000000
\"coriolis/1/profiles/R1_002.nc\",20170116000000,45.5,-30.5,A,844,IF,20180101000000
";
        let tmp = TempDir::new("argo-data-test-index").unwrap();
        let index = TextIndex::new(&write_index(&tmp, "index.txt", text));

        let found = index
            .filter(&region(&["-40", "-10", "-5", "60"]))
            .unwrap()
            .unwrap();
        assert_eq!(
            files(&found),
            vec!["coriolis/1/profiles/R1_001.nc", "coriolis/1/profiles/R1_002.nc"]
        );

        // The comma inside quotes does not shift the following columns.
        assert_eq!(found[0].institution.as_deref(), Some("IF, FR"));
        assert_eq!(
            found[0].date_update,
            Some(NaiveDate::from_ymd(2018, 1, 1).and_hms(0, 0, 0))
        );
    }

    #[test]
    fn test_missing_index() {
        let tmp = TempDir::new("argo-data-test-index").unwrap();
        let index = TextIndex::new(&tmp.path().join("ar_index_global_prof.txt"));
        assert!(index
            .filter(&region(&["-40", "-10", "-5", "60"]))
            .unwrap()
            .is_none());

        let index = TextIndex::new(&write_index(&tmp, "bad.txt", "# only comments\n"));
        match index.filter(&region(&["-40", "-10", "-5", "60"])) {
            Err(ArgoDataErr::IndexUnavailable(_)) => {}
            _ => panic!("An index without a header is unreadable."),
        }

        let index = TextIndex::new(&write_index(&tmp, "worse.txt", "a,b,c\n1,2,3\n"));
        match index.filter(&region(&["-40", "-10", "-5", "60"])) {
            Err(ArgoDataErr::IndexUnavailable(msg)) => assert!(msg.contains("file")),
            _ => panic!("An index without a file column is unreadable."),
        }
    }
}
