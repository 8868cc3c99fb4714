use std::collections::BTreeSet;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use arrow::array::{Array, ArrayRef, AsArray, TimestampNanosecondArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, TimeUnit};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::file::reader::ChunkReader;
use serde_json::Value as JsonValue;

use super::model::GroundwaterTable;

// ---------------------------------------------------------------------------
// Data source
// ---------------------------------------------------------------------------

/// Where the level table comes from. A local path wins over a URL in config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Path(PathBuf),
    Url(String),
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Path(p) => write!(f, "{}", p.display()),
            DataSource::Url(u) => write!(f, "{u}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Csv,
    Json,
    Parquet,
}

/// Pick a reader from a file extension. No extension means CSV.
fn format_for(ext: Option<&str>) -> Result<Format> {
    let ext = ext.unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "" | "csv" | "txt" => Ok(Format::Csv),
        "json" => Ok(Format::Json),
        "parquet" | "pq" => Ok(Format::Parquet),
        other => bail!("Unsupported file extension: .{other}"),
    }
}

fn url_format(url: &str) -> Result<Format> {
    let parsed = url::Url::parse(url).with_context(|| format!("invalid URL '{url}'"))?;
    format_for(Path::new(parsed.path()).extension().and_then(|e| e.to_str()))
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load the level table from a local file or a remote URL.
///
/// Fails fast on unreachable or malformed data; there is no retry.
pub fn load_source(source: &DataSource, time_column: &str) -> Result<GroundwaterTable> {
    let table = match source {
        DataSource::Path(path) => load_file(path, time_column),
        DataSource::Url(url) => fetch_url(url, time_column),
    }
    .with_context(|| format!("loading {source}"))?;

    log::info!(
        "Loaded {} rows with {} locations from {source}",
        table.len(),
        table.locations().count()
    );
    Ok(table)
}

/// Load a table from a file. Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row, a time column, one numeric column per location
/// * `.json`    – `[{ "Time": "...", "Test01": -12.3, ... }, ...]`
/// * `.parquet` – same wide layout; time as string, date or timestamp
pub fn load_file(path: &Path, time_column: &str) -> Result<GroundwaterTable> {
    let format = format_for(path.extension().and_then(|e| e.to_str()))?;
    match format {
        Format::Csv => {
            let file = std::fs::File::open(path).context("opening CSV")?;
            read_csv(file, time_column)
        }
        Format::Json => {
            let bytes = std::fs::read(path).context("reading JSON file")?;
            read_json(&bytes, time_column)
        }
        Format::Parquet => {
            let file = std::fs::File::open(path).context("opening parquet file")?;
            read_parquet(file, time_column)
        }
    }
}

/// Blocking HTTP GET of a hosted table.
fn fetch_url(url: &str, time_column: &str) -> Result<GroundwaterTable> {
    let format = url_format(url)?;
    log::info!("Fetching {url}");

    let body = reqwest::blocking::get(url)
        .with_context(|| format!("requesting {url}"))?
        .error_for_status()
        .context("server returned an error status")?
        .bytes()
        .context("reading response body")?;

    match format {
        Format::Csv => read_csv(body.as_ref(), time_column),
        Format::Json => read_json(&body, time_column),
        Format::Parquet => read_parquet(body, time_column),
    }
}

// ---------------------------------------------------------------------------
// Cell parsing
// ---------------------------------------------------------------------------

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Parse a timestamp cell. Offsets are dropped after conversion to the
/// offset's wall-clock time; bare dates mean midnight.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Parse a level cell; empty and `NaN` cells are missing values.
fn parse_level(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("nan") {
        return Some(f64::NAN);
    }
    s.parse::<f64>().ok()
}

fn finish(
    times: Vec<NaiveDateTime>,
    columns: Vec<(String, Vec<f64>)>,
) -> Result<GroundwaterTable> {
    if columns.is_empty() {
        bail!("no location columns besides the time column");
    }
    if times.is_empty() {
        bail!("no data rows");
    }
    GroundwaterTable::new(times, columns)
}

// ---------------------------------------------------------------------------
// CSV reader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one column holding timestamps,
/// every other column a location with one level per row.
fn read_csv<R: Read>(source: R, time_column: &str) -> Result<GroundwaterTable> {
    let mut reader = csv::Reader::from_reader(source);
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let time_idx = headers
        .iter()
        .position(|h| h == time_column)
        .with_context(|| format!("CSV missing '{time_column}' column"))?;

    let mut columns: Vec<(String, Vec<f64>)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != time_idx)
        .map(|(_, h)| (h.clone(), Vec::new()))
        .collect();
    let mut times = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        // Line numbers are 1-based and the header takes line 1.
        let fallback_line = row_no as u64 + 2;
        let record = result.with_context(|| format!("CSV line {fallback_line}"))?;
        let line = record.position().map_or(fallback_line, |p| p.line());

        let raw_time = record.get(time_idx).unwrap_or("");
        let time = parse_timestamp(raw_time)
            .with_context(|| format!("CSV line {line}: '{raw_time}' is not a timestamp"))?;
        times.push(time);

        let cells = record
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != time_idx)
            .map(|(_, cell)| cell);
        for ((name, values), cell) in columns.iter_mut().zip(cells) {
            let level = parse_level(cell).with_context(|| {
                format!("CSV line {line}, column '{name}': '{cell}' is not a number")
            })?;
            values.push(level);
        }
    }

    finish(times, columns)
}

// ---------------------------------------------------------------------------
// JSON reader
// ---------------------------------------------------------------------------

/// Records-oriented JSON (`df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "Time": "2023-09-26 08:00:00", "Test01": -12.4, "Test02": null },
///   { "Time": 1695740400000, "Test01": -12.5 },
///   ...
/// ]
/// ```
///
/// The time is either a timestamp string or epoch milliseconds (UTC), the
/// latter being what pandas writes for datetime columns by default.
/// Locations are the union of keys over all records; a missing key or
/// `null` is a missing value.
fn read_json(bytes: &[u8], time_column: &str) -> Result<GroundwaterTable> {
    let root: JsonValue = serde_json::from_slice(bytes).context("parsing JSON")?;
    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut names: BTreeSet<&str> = BTreeSet::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        names.extend(obj.keys().map(String::as_str).filter(|k| *k != time_column));
    }

    let mut times = Vec::with_capacity(records.len());
    let mut columns: Vec<(String, Vec<f64>)> = names
        .iter()
        .map(|n| (n.to_string(), Vec::with_capacity(records.len())))
        .collect();

    for (i, rec) in records.iter().enumerate() {
        let time = match rec.get(time_column) {
            Some(JsonValue::String(raw)) => parse_timestamp(raw)
                .with_context(|| format!("Row {i}: '{raw}' is not a timestamp"))?,
            Some(JsonValue::Number(n)) => n
                .as_i64()
                .and_then(DateTime::from_timestamp_millis)
                .map(|dt| dt.naive_utc())
                .with_context(|| format!("Row {i}: {n} is not epoch milliseconds"))?,
            Some(other) => bail!("Row {i}: unexpected '{time_column}' value {other}"),
            None => bail!("Row {i}: missing '{time_column}'"),
        };
        times.push(time);

        for (name, values) in columns.iter_mut() {
            let level = match rec.get(name.as_str()) {
                None | Some(JsonValue::Null) => f64::NAN,
                Some(JsonValue::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
                Some(JsonValue::String(s)) => parse_level(s)
                    .with_context(|| format!("Row {i}, '{name}': '{s}' is not a number"))?,
                Some(other) => bail!("Row {i}, '{name}': unexpected value {other}"),
            };
            values.push(level);
        }
    }

    finish(times, columns)
}

// ---------------------------------------------------------------------------
// Parquet reader
// ---------------------------------------------------------------------------

/// Read a wide table from Parquet. Works with files written by **Pandas**
/// (`df.to_parquet()`) and **Polars** (`df.write_parquet()`); location
/// columns of any numeric type are cast to `f64`.
fn read_parquet<R: ChunkReader + 'static>(source: R, time_column: &str) -> Result<GroundwaterTable> {
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(source).context("reading parquet metadata")?;
    let schema = builder.schema().clone();
    let reader = builder.build().context("building parquet reader")?;

    let time_idx = schema
        .index_of(time_column)
        .map_err(|_| anyhow::anyhow!("Parquet file missing '{time_column}' column"))?;
    let location_idx: Vec<usize> = (0..schema.fields().len()).filter(|i| *i != time_idx).collect();

    let mut times = Vec::new();
    let mut columns: Vec<(String, Vec<f64>)> = location_idx
        .iter()
        .map(|&i| (schema.field(i).name().clone(), Vec::new()))
        .collect();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        times.extend(extract_times(batch.column(time_idx)).context("reading time column")?);

        for (&col_idx, (name, values)) in location_idx.iter().zip(columns.iter_mut()) {
            let levels = extract_levels(batch.column(col_idx))
                .with_context(|| format!("reading column '{name}'"))?;
            values.extend(levels);
        }
    }

    finish(times, columns)
}

// -- Arrow helpers --

fn extract_times(col: &ArrayRef) -> Result<Vec<NaiveDateTime>> {
    match col.data_type() {
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => {
            let strings = cast(col, &DataType::Utf8)?;
            let strings = strings.as_string::<i32>();
            (0..strings.len())
                .map(|row| {
                    if strings.is_null(row) {
                        bail!("Row {row}: null timestamp");
                    }
                    let raw = strings.value(row);
                    parse_timestamp(raw)
                        .with_context(|| format!("Row {row}: '{raw}' is not a timestamp"))
                })
                .collect()
        }
        other => {
            let ts = cast(col, &DataType::Timestamp(TimeUnit::Nanosecond, None))
                .with_context(|| format!("cannot read {other:?} as a timestamp"))?;
            let ts = ts
                .as_any()
                .downcast_ref::<TimestampNanosecondArray>()
                .context("expected TimestampNanosecondArray")?;
            (0..ts.len())
                .map(|row| {
                    if ts.is_null(row) {
                        bail!("Row {row}: null timestamp");
                    }
                    ts.value_as_datetime(row)
                        .with_context(|| format!("Row {row}: timestamp out of range"))
                })
                .collect()
        }
    }
}

/// Cast a numeric column to `f64`; nulls become NaN.
fn extract_levels(col: &ArrayRef) -> Result<Vec<f64>> {
    let floats = cast(col, &DataType::Float64)
        .with_context(|| format!("cannot read {:?} as a level", col.data_type()))?;
    Ok(floats
        .as_primitive::<Float64Type>()
        .iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;

    use arrow::array::{
        Date32Array, Float32Array, Float64Array, StringArray, TimestampMillisecondArray,
    };
    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;
    use chrono::Timelike;
    use parquet::arrow::ArrowWriter;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    const SAMPLE: &str = "\
Time,Test01,Test02
2023-09-26 08:00:00,-12.1,-10.5
2023-09-26 14:00:00,,-10.7
2023-09-27 08:00:00,-12.3,NaN
";

    #[test]
    fn csv_reads_locations_in_column_order() {
        let table = read_csv(SAMPLE.as_bytes(), "Time").unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.locations().collect::<Vec<_>>(), ["Test01", "Test02"]);

        let s = table.series("Test01").unwrap();
        assert_eq!(s.readings[0].value, -12.1);
        assert!(s.readings[1].value.is_nan());
        assert_eq!(s.readings[1].timestamp.hour(), 14);
        assert!(table.series("Test02").unwrap().readings[2].value.is_nan());
    }

    #[test]
    fn csv_time_column_may_sit_anywhere() {
        let text = "Well,Time\n-1.5,2023-09-26T08:00:00\n";
        let table = read_csv(text.as_bytes(), "Time").unwrap();
        assert_eq!(table.locations().collect::<Vec<_>>(), ["Well"]);
    }

    #[test]
    fn csv_without_time_column_fails() {
        let err = read_csv("A,B\n1,2\n".as_bytes(), "Time").unwrap_err();
        assert!(format!("{err:#}").contains("missing 'Time'"));
    }

    #[test]
    fn csv_bad_number_names_line_and_column() {
        let text = "Time,Test01\n2023-09-26 08:00:00,abc\n";
        let err = read_csv(text.as_bytes(), "Time").unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("line 2"), "{msg}");
        assert!(msg.contains("Test01"));
    }

    #[test]
    fn csv_bad_timestamp_fails() {
        let err = read_csv("Time,A\nyesterday,1.0\n".as_bytes(), "Time").unwrap_err();
        assert!(format!("{err:#}").contains("not a timestamp"));
    }

    #[test]
    fn csv_with_no_rows_fails() {
        assert!(read_csv("Time,A\n".as_bytes(), "Time").is_err());
        assert!(read_csv("Time\n2023-09-26\n".as_bytes(), "Time").is_err());
    }

    #[test]
    fn timestamp_variants() {
        let expected = NaiveDate::from_ymd_opt(2023, 9, 26)
            .unwrap()
            .and_hms_opt(8, 45, 0)
            .unwrap();
        for s in [
            "2023-09-26 08:45:00",
            "2023-09-26T08:45:00",
            "2023-09-26 08:45",
            "2023/09/26 08:45:00",
            "2023-09-26T08:45:00Z",
            "2023-09-26 08:45:00.000",
            " 2023-09-26 08:45:00 ",
        ] {
            assert_eq!(parse_timestamp(s), Some(expected), "{s}");
        }
        assert_eq!(
            parse_timestamp("2023-09-26T08:45:00+09:00"),
            Some(expected),
            "offset keeps wall-clock time"
        );
        assert_eq!(
            parse_timestamp("2023-09-26").unwrap().hour(),
            0
        );
        assert_eq!(parse_timestamp("26.09.2023"), None);
    }

    #[test]
    fn json_records_with_nulls() {
        let text = r#"[
            {"Time": "2023-09-26 08:00:00", "Test01": -12.0, "Test02": null},
            {"Time": "2023-09-26 09:00:00", "Test01": "-12.5"}
        ]"#;
        let table = read_json(text.as_bytes(), "Time").unwrap();
        assert_eq!(table.locations().collect::<Vec<_>>(), ["Test01", "Test02"]);
        let s1 = table.series("Test01").unwrap();
        assert_eq!(s1.readings[1].value, -12.5);
        let s2 = table.series("Test02").unwrap();
        assert!(s2.readings.iter().all(|r| r.value.is_nan()));
    }

    #[test]
    fn json_time_as_epoch_millis() {
        // pandas' default for datetime columns.
        let text = r#"[
            {"Time": 1695740400000, "Test01": -12.0},
            {"Time": "2023-09-26 16:00:00", "Test01": -12.1}
        ]"#;
        let table = read_json(text.as_bytes(), "Time").unwrap();
        let s = table.series("Test01").unwrap();
        assert_eq!(s.readings[0].timestamp, at(2023, 9, 26, 15));
        assert_eq!(s.readings[1].timestamp, at(2023, 9, 26, 16));

        assert!(read_json(br#"[{"Time": 1.5, "A": 1}]"#, "Time").is_err());
        assert!(read_json(br#"[{"Time": true, "A": 1}]"#, "Time").is_err());
        assert!(read_json(br#"[{"A": 1}]"#, "Time").is_err());
    }

    #[test]
    fn json_requires_array_of_objects() {
        assert!(read_json(b"{}", "Time").is_err());
        assert!(read_json(b"[1, 2]", "Time").is_err());
    }

    #[test]
    fn parquet_with_string_time_and_f32_levels() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("Time", DataType::Utf8, false),
            Field::new("Test01", DataType::Float32, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(vec!["2023-09-26 08:00:00", "2023-09-26 09:00:00"])),
                Arc::new(Float32Array::from(vec![Some(-12.5), None])),
            ],
        )
        .unwrap();

        let file = tempfile::Builder::new().suffix(".parquet").tempfile().unwrap();
        let mut writer = ArrowWriter::try_new(file.reopen().unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let table = load_file(file.path(), "Time").unwrap();
        let s = table.series("Test01").unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s.readings[0].value, -12.5);
        assert!(s.readings[1].value.is_nan());
    }

    /// Write a one-column `Time` table plus a `Test01` level column.
    fn write_parquet(time_field: Field, times: ArrayRef) -> tempfile::NamedTempFile {
        let schema = Arc::new(Schema::new(vec![
            time_field,
            Field::new("Test01", DataType::Float64, true),
        ]));
        let levels: ArrayRef = Arc::new(Float64Array::from(vec![-12.0; times.len()]));
        let batch = RecordBatch::try_new(schema.clone(), vec![times, levels]).unwrap();

        let file = tempfile::Builder::new().suffix(".parquet").tempfile().unwrap();
        let mut writer = ArrowWriter::try_new(file.reopen().unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
        file
    }

    #[test]
    fn parquet_with_millisecond_timestamp_time() {
        let expected = [at(2023, 9, 26, 15), at(2023, 9, 27, 8)];
        let millis: Vec<i64> = expected
            .iter()
            .map(|t| t.and_utc().timestamp_millis())
            .collect();
        let file = write_parquet(
            Field::new("Time", DataType::Timestamp(TimeUnit::Millisecond, None), false),
            Arc::new(TimestampMillisecondArray::from(millis)),
        );

        let table = load_file(file.path(), "Time").unwrap();
        let s = table.series("Test01").unwrap();
        let times: Vec<NaiveDateTime> = s.readings.iter().map(|r| r.timestamp).collect();
        assert_eq!(times, expected);
        assert_eq!(s.readings[0].value, -12.0);
    }

    #[test]
    fn parquet_with_date_time_column_means_midnight() {
        let day = NaiveDate::from_ymd_opt(2023, 9, 26).unwrap();
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        let days = (day - epoch).num_days() as i32;
        assert_eq!(days, 19626);
        let file = write_parquet(
            Field::new("Time", DataType::Date32, false),
            Arc::new(Date32Array::from(vec![days, days + 1])),
        );

        let table = load_file(file.path(), "Time").unwrap();
        let s = table.series("Test01").unwrap();
        assert_eq!(s.readings[0].timestamp, at(2023, 9, 26, 0));
        assert_eq!(s.readings[1].timestamp, at(2023, 9, 27, 0));
    }

    #[test]
    fn load_file_dispatches_on_extension() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let table = load_source(&DataSource::Path(file.path().to_path_buf()), "Time").unwrap();
        assert_eq!(table.len(), 3);

        let err = load_file(Path::new("levels.xlsx"), "Time").unwrap_err();
        assert!(err.to_string().contains("Unsupported file extension"));
    }

    #[test]
    fn url_format_ignores_query_string() {
        assert_eq!(
            url_format("https://example.org/data/cgwt.csv?raw=true").unwrap(),
            Format::Csv
        );
        assert_eq!(
            url_format("https://example.org/levels.parquet").unwrap(),
            Format::Parquet
        );
        assert_eq!(url_format("https://example.org/export").unwrap(), Format::Csv);
        assert!(url_format("not a url").is_err());
    }
}
