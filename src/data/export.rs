use anyhow::{Context, Result};

use super::model::Series;

/// Default file name offered when saving an export.
pub const DEFAULT_EXPORT_NAME: &str = "filtered_data.csv";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Encode a series as CSV with columns `Time` and the location name.
///
/// Missing values become empty cells. An empty series still gets the header.
pub fn export_csv(series: &Series) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(["Time", series.location.as_str()])
        .context("writing CSV header")?;

    for r in &series.readings {
        let value = if r.value.is_nan() {
            String::new()
        } else {
            r.value.to_string()
        };
        writer
            .write_record([r.timestamp.format(TIME_FORMAT).to_string(), value])
            .with_context(|| format!("writing CSV row for {}", r.timestamp))?;
    }

    writer.into_inner().context("flushing CSV buffer")
}
