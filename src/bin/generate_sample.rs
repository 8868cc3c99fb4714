use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, TimestampMillisecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use parquet::arrow::ArrowWriter;

/// (name, base level in m, diurnal amplitude in m, phase in hours, drift in m/day)
const WELLS: &[(&str, f64, f64, f64, f64)] = &[
    ("Test01", -10.5, 0.12, 3.0, -0.010),
    ("Test02", -12.0, 0.20, 15.0, 0.004),
    ("Test03", -9.8, 0.08, 9.0, -0.002),
    ("Test04", -14.2, 0.25, 20.0, 0.015),
];

const STEP_MINUTES: i64 = 10;
const DAYS: i64 = 25;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// Level of one well at `elapsed_days` with a daily cycle peaking at `phase`.
fn level(base: f64, amplitude: f64, phase: f64, drift: f64, elapsed_days: f64) -> f64 {
    let hour_angle = (elapsed_days.fract() * 24.0 - phase) / 24.0 * std::f64::consts::TAU;
    base + drift * elapsed_days + amplitude * hour_angle.cos()
}

fn main() -> Result<()> {
    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&out_dir).context("creating output directory")?;

    let mut rng = SimpleRng::new(42);
    let start: NaiveDateTime = NaiveDate::from_ymd_opt(2023, 9, 20)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .context("invalid start date")?;

    let n_rows = (DAYS * 24 * 60 / STEP_MINUTES) as usize;
    let times: Vec<NaiveDateTime> = (0..n_rows as i64)
        .map(|i| start + Duration::minutes(i * STEP_MINUTES))
        .collect();

    let columns: Vec<Vec<Option<f64>>> = WELLS
        .iter()
        .enumerate()
        .map(|(w, &(_, base, amplitude, phase, drift))| {
            (0..n_rows)
                .map(|i| {
                    // Occasional logger dropouts.
                    if (i + 7 * w) % 997 == 0 {
                        return None;
                    }
                    let elapsed = (i as i64 * STEP_MINUTES) as f64 / (24.0 * 60.0);
                    let v = level(base, amplitude, phase, drift, elapsed) + rng.gauss(0.0, 0.01);
                    Some((v * 1000.0).round() / 1000.0)
                })
                .collect()
        })
        .collect();

    // ---- CSV ----
    let csv_path = out_dir.join("sample_levels.csv");
    let mut writer = csv::Writer::from_path(&csv_path).context("creating CSV file")?;
    let mut header = vec!["Time".to_string()];
    header.extend(WELLS.iter().map(|w| w.0.to_string()));
    writer.write_record(&header)?;
    for (i, t) in times.iter().enumerate() {
        let mut record = vec![t.format("%Y-%m-%d %H:%M:%S").to_string()];
        record.extend(
            columns
                .iter()
                .map(|col| col[i].map(|v| v.to_string()).unwrap_or_default()),
        );
        writer.write_record(&record)?;
    }
    writer.flush()?;

    // ---- Parquet ----
    let mut fields = vec![Field::new(
        "Time",
        DataType::Timestamp(TimeUnit::Millisecond, None),
        false,
    )];
    fields.extend(WELLS.iter().map(|w| Field::new(w.0, DataType::Float64, true)));
    let schema = Arc::new(Schema::new(fields));

    let mut arrays: Vec<ArrayRef> = vec![Arc::new(TimestampMillisecondArray::from(
        times
            .iter()
            .map(|t| t.and_utc().timestamp_millis())
            .collect::<Vec<_>>(),
    ))];
    arrays.extend(
        columns
            .iter()
            .map(|col| Arc::new(Float64Array::from(col.clone())) as ArrayRef),
    );

    let batch = RecordBatch::try_new(schema.clone(), arrays).context("building record batch")?;
    let parquet_path = out_dir.join("sample_levels.parquet");
    let file = std::fs::File::create(&parquet_path).context("creating parquet file")?;
    let mut parquet = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    parquet.write(&batch)?;
    parquet.close()?;

    println!(
        "Wrote {n_rows} rows for {} wells to {} and {}",
        WELLS.len(),
        csv_path.display(),
        parquet_path.display()
    );
    Ok(())
}
