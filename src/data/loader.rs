use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};

use super::model::{MetadataValue, RawMeasurement, SampleDataset};
use crate::config::ColumnSchema;
use crate::error::{ReduceError, Result};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a USANS log and group its rows by sample.
///
/// CSV layout: one header row, then one row per counting interval. Column
/// names come from `schema`; `sample`, `angle`, `counts` and `monitor` are
/// required, `transmission` and `run` are optional. All other columns are
/// kept as metadata. Lines starting with `#` are ignored.
///
/// ```text
/// sample,run,angle,counts,monitor,transmission
/// EmptyPCell,1001,0.0010,52341,100000,8120
/// EmptyPCell,1001,0.0020,31877,100000,8095
/// S115_dry,1002,0.0010,40122,100000,6210
/// ```
pub fn load_csv(path: &Path, schema: &ColumnSchema) -> Result<BTreeMap<String, SampleDataset>> {
    if !path.exists() {
        return Err(ReduceError::NotFound {
            path: path.display().to_string(),
        });
    }

    let file = File::open(path).map_err(|source| ReduceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .comment(Some(b'#'))
        .from_reader(file);

    let headers = reader.headers()?.clone();
    let columns = ColumnIndex::resolve(&headers, schema)?;

    let mut grouped: BTreeMap<String, Vec<RawMeasurement>> = BTreeMap::new();

    for result in reader.records() {
        let record = result.map_err(|e| ReduceError::Parse {
            line: e.position().map_or(0, |p| p.line() as usize),
            message: e.to_string(),
        })?;
        let line = record.position().map_or(0, |p| p.line() as usize);
        let row = parse_row(&record, &headers, &columns, line)?;
        grouped.entry(row.sample.clone()).or_default().push(row);
    }

    let mut datasets = BTreeMap::new();
    for (name, rows) in grouped {
        log::debug!("Sample '{name}': {} measurements", rows.len());
        let dataset = SampleDataset::from_measurements(name.clone(), rows)?;
        datasets.insert(name, dataset);
    }
    Ok(datasets)
}

// ---------------------------------------------------------------------------
// Header resolution
// ---------------------------------------------------------------------------

struct ColumnIndex {
    sample: usize,
    angle: usize,
    counts: usize,
    monitor: usize,
    transmission: Option<usize>,
    run: Option<usize>,
}

impl ColumnIndex {
    fn resolve(headers: &StringRecord, schema: &ColumnSchema) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name.trim()))
        };
        let require = |name: &str| {
            find(name).ok_or_else(|| ReduceError::Parse {
                line: 1,
                message: format!("missing '{name}' column"),
            })
        };

        Ok(Self {
            sample: require(&schema.sample)?,
            angle: require(&schema.angle)?,
            counts: require(&schema.counts)?,
            monitor: require(&schema.monitor)?,
            transmission: find(&schema.transmission),
            run: find(&schema.run),
        })
    }

    fn is_known(&self, idx: usize) -> bool {
        idx == self.sample
            || idx == self.angle
            || idx == self.counts
            || idx == self.monitor
            || Some(idx) == self.transmission
            || Some(idx) == self.run
    }
}

// ---------------------------------------------------------------------------
// Row parsing
// ---------------------------------------------------------------------------

fn parse_row(
    record: &StringRecord,
    headers: &StringRecord,
    columns: &ColumnIndex,
    line: usize,
) -> Result<RawMeasurement> {
    if record.len() != headers.len() {
        return Err(ReduceError::Parse {
            line,
            message: format!("expected {} fields, found {}", headers.len(), record.len()),
        });
    }

    let sample = record.get(columns.sample).unwrap_or("");
    if sample.is_empty() {
        return Err(ReduceError::Parse {
            line,
            message: "empty sample name".to_string(),
        });
    }

    let angle = parse_number(record, headers, columns.angle, line)?;
    let counts = parse_non_negative(record, headers, columns.counts, line)?;
    let monitor = parse_non_negative(record, headers, columns.monitor, line)?;

    let transmission = match columns.transmission {
        Some(idx) if !record.get(idx).unwrap_or("").is_empty() => {
            Some(parse_non_negative(record, headers, idx, line)?)
        }
        _ => None,
    };

    let run = columns
        .run
        .and_then(|idx| record.get(idx))
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let metadata = record
        .iter()
        .enumerate()
        .filter(|(idx, _)| !columns.is_known(*idx))
        .map(|(idx, value)| (headers[idx].trim().to_string(), MetadataValue::guess(value)))
        .collect();

    Ok(RawMeasurement {
        sample: sample.to_string(),
        angle,
        counts,
        monitor,
        transmission,
        run,
        line,
        metadata,
    })
}

fn parse_number(
    record: &StringRecord,
    headers: &StringRecord,
    idx: usize,
    line: usize,
) -> Result<f64> {
    let raw = record.get(idx).unwrap_or("");
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ReduceError::Parse {
            line,
            message: format!("'{}': '{raw}' is not a number", headers[idx].trim()),
        }),
    }
}

fn parse_non_negative(
    record: &StringRecord,
    headers: &StringRecord,
    idx: usize,
    line: usize,
) -> Result<f64> {
    let value = parse_number(record, headers, idx, line)?;
    if value < 0.0 {
        return Err(ReduceError::Parse {
            line,
            message: format!("'{}' must not be negative, got {value}", headers[idx].trim()),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write to temp file");
        file
    }

    #[test]
    fn test_missing_file_message() {
        let err = load_csv(Path::new("invalid_path.csv"), &ColumnSchema::default()).unwrap_err();
        assert_eq!(err.to_string(), "The csv file invalid_path.csv doesn't exist");
    }

    #[test]
    fn test_groups_by_sample() {
        let file = create_test_file(
            "sample,run,angle,counts,monitor,temperature\n\
             EmptyPCell,1,0.001,500,1000,295\n\
             S115_dry,2,0.001,400,1000,295.5\n\
             EmptyPCell,1,0.002,300,1000,295\n\
             # comment line\n\
             S115_dry,2,0.002,350,1000,\n",
        );
        let datasets = load_csv(file.path(), &ColumnSchema::default()).unwrap();

        assert_eq!(datasets.keys().collect::<Vec<_>>(), vec!["EmptyPCell", "S115_dry"]);
        let empty = &datasets["EmptyPCell"];
        assert_eq!(empty.len(), 2);
        assert_eq!(empty.measurements()[1].angle, 0.002);
        assert_eq!(empty.measurements()[1].line, 4);
        assert_eq!(empty.measurements()[0].run.as_deref(), Some("1"));
        assert_eq!(empty.measurements()[0].transmission, None);
        assert_eq!(
            empty.measurements()[0].metadata.get("temperature"),
            Some(&MetadataValue::Integer(295))
        );
        let dry = &datasets["S115_dry"];
        assert_eq!(dry.measurements()[1].metadata.get("temperature"), Some(&MetadataValue::Null));
    }

    #[test]
    fn test_custom_column_names() {
        let file = create_test_file(
            "Name , Theta, Det1 ,Mon,Trans\n\
             A,0.1,10,100,7\n",
        );
        let schema = ColumnSchema {
            sample: "name".into(),
            angle: "theta".into(),
            counts: "det1".into(),
            monitor: "mon".into(),
            transmission: "trans".into(),
            run: "run".into(),
        };
        let datasets = load_csv(file.path(), &schema).unwrap();
        let row = &datasets["A"].measurements()[0];
        assert_eq!(row.counts, 10.0);
        assert_eq!(row.transmission, Some(7.0));
        assert!(row.metadata.is_empty());
    }

    #[test]
    fn test_missing_required_column() {
        let file = create_test_file("sample,angle,counts\nA,0.1,10\n");
        let err = load_csv(file.path(), &ColumnSchema::default()).unwrap_err();
        assert!(matches!(err, ReduceError::Parse { line: 1, .. }));
        assert!(err.to_string().contains("monitor"));
    }

    #[test]
    fn test_non_numeric_field_reports_line() {
        let file = create_test_file(
            "sample,angle,counts,monitor\n\
             A,0.1,10,100\n\
             A,0.2,ten,100\n",
        );
        let err = load_csv(file.path(), &ColumnSchema::default()).unwrap_err();
        assert!(matches!(err, ReduceError::Parse { line: 3, .. }), "{err}");
    }

    #[test]
    fn test_wrong_column_count_reports_line() {
        let file = create_test_file(
            "sample,angle,counts,monitor\n\
             A,0.1,10,100\n\
             A,0.2,10\n",
        );
        let err = load_csv(file.path(), &ColumnSchema::default()).unwrap_err();
        assert!(matches!(err, ReduceError::Parse { line: 3, .. }), "{err}");
    }

    #[test]
    fn test_invalid_utf8_reports_line() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"sample,angle,counts,monitor\nA,0.1,10,100\nA\xff,0.2,10,100\n")
            .unwrap();
        let err = load_csv(file.path(), &ColumnSchema::default()).unwrap_err();
        assert!(matches!(err, ReduceError::Parse { line: 3, .. }), "{err}");
    }

    #[test]
    fn test_negative_counts_rejected() {
        let file = create_test_file("sample,angle,counts,monitor\nA,0.1,-1,100\n");
        let err = load_csv(file.path(), &ColumnSchema::default()).unwrap_err();
        assert!(matches!(err, ReduceError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_unordered_angles_fail() {
        let file = create_test_file(
            "sample,angle,counts,monitor\n\
             A,0.2,10,100\n\
             A,0.1,10,100\n",
        );
        let err = load_csv(file.path(), &ColumnSchema::default()).unwrap_err();
        assert!(matches!(err, ReduceError::UnorderedAngles { line: 3, .. }), "{err}");
    }
}
