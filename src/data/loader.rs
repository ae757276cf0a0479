use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, Float64Array};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{Column, Table};

/// Frequency axis name given to headerless spectra.
pub const DEFAULT_FREQUENCY_AXIS: &str = "Frequency (MHz)";

/// Header lines preceding the line list of a `.fit` file.
const FIT_HEADER_LINES: usize = 25;

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a spectrum from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`      – header row, numeric columns
/// * `.ft`       – two space-separated columns, frequency and intensity
/// * `.dat`      – two tab-separated columns, frequency and intensity
/// * `.cat`      – catalog; columns 0 (frequency) and 2 (log10 intensity)
/// * `.fit`      – fit output; frequency in field 7 after a 25 line header
/// * `.json`     – `{ "column": [numbers or null], ... }`
/// * `.parquet`  – flat numeric columns
///
/// Files with a header use `frequency_axis` when such a column exists and
/// their first column otherwise. The returned table is sorted by frequency.
pub fn load_file(path: &Path, frequency_axis: &str) -> Result<Table> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let mut table = match ext.as_str() {
        "csv" => load_csv(path, frequency_axis),
        "ft" => load_whitespace_pairs(path),
        "dat" => load_tab_pairs(path),
        "cat" => load_cat(path),
        "fit" => load_fit(path),
        "json" => load_json(path, frequency_axis),
        "parquet" | "pq" => load_parquet(path, frequency_axis),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("loading {}", path.display()))?;

    table.sort_by_frequency();
    log::info!(
        "Loaded '{}' from {}: {} rows, columns {:?}",
        table.name,
        path.display(),
        table.len(),
        table.column_names().collect::<Vec<_>>()
    );
    Ok(table)
}

/// Write `table` as CSV with a header row. Missing values become empty cells.
pub fn export_csv(table: &Table, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV file")?;
    writer
        .write_record(table.column_names())
        .context("writing CSV header")?;
    for row in 0..table.len() {
        let record: Vec<String> = table
            .columns()
            .iter()
            .map(|c| {
                let v = c.values[row];
                if v.is_nan() {
                    String::new()
                } else {
                    v.to_string()
                }
            })
            .collect();
        writer
            .write_record(&record)
            .with_context(|| format!("writing CSV row {row}"))?;
    }
    writer.flush().context("flushing CSV file")?;
    log::info!("Exported '{}' to {}", table.name, path.display());
    Ok(())
}

fn table_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("spectrum")
        .to_string()
}

fn pick_axis<'a>(headers: &'a [String], preferred: &'a str) -> Result<&'a str> {
    if headers.iter().any(|h| h == preferred) {
        return Ok(preferred);
    }
    headers
        .first()
        .map(String::as_str)
        .context("file has no columns")
}

/// A two-column frequency/intensity table named after the file.
fn pair_table(path: &Path, freq: Vec<f64>, intensity: Vec<f64>) -> Result<Table> {
    let name = table_name(path);
    let table = Table::from_columns(
        name.clone(),
        vec![
            Column::new(DEFAULT_FREQUENCY_AXIS, freq),
            Column::new(name, intensity),
        ],
        DEFAULT_FREQUENCY_AXIS,
    )?;
    Ok(table)
}

fn parse_field(tok: &str, line: usize, field: usize) -> Result<f64> {
    tok.trim()
        .parse::<f64>()
        .with_context(|| format!("line {line}, field {field}: '{tok}' is not a number"))
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn load_csv(path: &Path, frequency_axis: &str) -> Result<Table> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut records = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        records.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }

    let axis = pick_axis(&headers, frequency_axis)?;
    Ok(Table::from_records(table_name(path), &headers, &records, axis)?)
}

// ---------------------------------------------------------------------------
// Headerless frequency/intensity files
// ---------------------------------------------------------------------------

/// `.ft`: "freq intensity" per line, any amount of whitespace between.
fn load_whitespace_pairs(path: &Path) -> Result<Table> {
    let text = std::fs::read_to_string(path).context("reading spectrum file")?;
    let mut freq = Vec::new();
    let mut intensity = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [] => continue,
            [f, i] => {
                freq.push(parse_field(f, line_no, 0)?);
                intensity.push(parse_field(i, line_no, 1)?);
            }
            other => bail!("line {line_no}: expected 2 fields, found {}", other.len()),
        }
    }
    pair_table(path, freq, intensity)
}

/// `.dat`: tab separated, no header.
fn load_tab_pairs(path: &Path) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .from_path(path)
        .context("opening tab separated file")?;
    let mut freq = Vec::new();
    let mut intensity = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("row {row_no}"))?;
        if record.len() != 2 {
            bail!("row {row_no}: expected 2 fields, found {}", record.len());
        }
        freq.push(parse_field(&record[0], row_no, 0)?);
        intensity.push(parse_field(&record[1], row_no, 1)?);
    }
    pair_table(path, freq, intensity)
}

/// `.cat`: intensities are stored as base-10 logarithms.
fn load_cat(path: &Path) -> Result<Table> {
    let text = std::fs::read_to_string(path).context("reading catalog")?;
    let mut freq = Vec::new();
    let mut intensity = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() < 3 {
            bail!("line {line_no}: catalog lines need at least 3 fields");
        }
        freq.push(parse_field(fields[0], line_no, 0)?);
        intensity.push(10f64.powf(parse_field(fields[2], line_no, 2)?));
    }
    pair_table(path, freq, intensity)
}

/// `.fit`: line positions only, so the intensity column is all zero.
fn load_fit(path: &Path) -> Result<Table> {
    let text = std::fs::read_to_string(path).context("reading fit file")?;
    let mut freq = Vec::new();
    for (line_no, line) in text.lines().enumerate().skip(FIT_HEADER_LINES) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        let tok = fields
            .get(7)
            .with_context(|| format!("line {line_no}: no frequency in field 7"))?;
        freq.push(parse_field(tok, line_no, 7)?);
    }
    let zeros = vec![0.0; freq.len()];
    pair_table(path, freq, zeros)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (column-oriented, `df.to_json(orient='list')`):
///
/// ```json
/// {
///   "Frequency (MHz)": [8000.0, 8000.1, ...],
///   "Intensity (V)":   [0.12,   null,   ...]
/// }
/// ```
fn load_json(path: &Path, frequency_axis: &str) -> Result<Table> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;
    let object = root
        .as_object()
        .context("Expected a top-level JSON object of columns")?;

    let mut columns = Vec::with_capacity(object.len());
    for (name, value) in object {
        let arr = value
            .as_array()
            .with_context(|| format!("column '{name}' is not an array"))?;
        let values = arr
            .iter()
            .enumerate()
            .map(|(j, v)| match v {
                JsonValue::Null => Ok(f64::NAN),
                other => other
                    .as_f64()
                    .with_context(|| format!("{name}[{j}]: not a number")),
            })
            .collect::<Result<Vec<f64>>>()?;
        columns.push(Column::new(name.clone(), values));
    }

    let headers: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
    let axis = pick_axis(&headers, frequency_axis)?;
    Ok(Table::from_columns(table_name(path), columns, axis)?)
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with one numeric column per series.
///
/// Integer and float columns are read as `f64` (nulls become missing);
/// other columns are skipped with a warning. Works with files written by
/// Pandas (`df.to_parquet()`) and Polars (`df.write_parquet()`).
fn load_parquet(path: &Path, frequency_axis: &str) -> Result<Table> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut order: Vec<String> = Vec::new();
    let mut values: BTreeMap<String, Vec<f64>> = BTreeMap::new();

    for (batch_no, batch_result) in reader.enumerate() {
        let batch = batch_result.context("reading parquet record batch")?;
        if batch_no == 0 {
            if let Ok(preview) =
                arrow::util::pretty::pretty_format_batches(&[batch.slice(0, batch.num_rows().min(5))])
            {
                log::debug!("parquet preview of {}:\n{preview}", path.display());
            }
        }

        let schema = batch.schema();
        for (idx, field) in schema.fields().iter().enumerate() {
            if !field.data_type().is_numeric() {
                if batch_no == 0 {
                    log::warn!(
                        "skipping non-numeric parquet column '{}' ({:?})",
                        field.name(),
                        field.data_type()
                    );
                }
                continue;
            }
            let as_f64 = arrow::compute::cast(batch.column(idx), &DataType::Float64)
                .with_context(|| format!("converting column '{}' to f64", field.name()))?;
            let arr = as_f64
                .as_any()
                .downcast_ref::<Float64Array>()
                .context("expected Float64Array after cast")?;

            let slot = values.entry(field.name().clone()).or_insert_with(|| {
                order.push(field.name().clone());
                Vec::new()
            });
            slot.extend(arr.iter().map(|v| v.unwrap_or(f64::NAN)));
        }
    }

    let columns: Vec<Column> = order
        .iter()
        .filter_map(|name| values.remove(name).map(|v| Column::new(name.clone(), v)))
        .collect();
    let axis = pick_axis(&order, frequency_axis)?;
    Ok(Table::from_columns(table_name(path), columns, axis)?)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use arrow::array::{Float64Array, Int64Array, StringArray};
    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;

    use super::*;

    fn write(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn csv_uses_preferred_axis_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "scan.csv", "I,nu\n0.3,3.0\n0.1,1.0\n,2.0\n");
        let t = load_file(&path, "nu").unwrap();
        assert_eq!(t.name, "scan");
        assert_eq!(t.frequency_axis(), "nu");
        assert_eq!(t.frequencies(), &[1.0, 2.0, 3.0]);
        assert!(t.column("I").unwrap()[1].is_nan());
    }

    #[test]
    fn csv_with_text_cell_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "bad.csv", "f,I\n1.0,abc\n");
        let err = load_file(&path, DEFAULT_FREQUENCY_AXIS).unwrap_err();
        assert!(format!("{err:#}").contains("not a number"));
    }

    #[test]
    fn ft_and_cat_files_become_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let ft = write(&dir, "sample.ft", "8000.0  0.5\n8000.1 0.7\n\n");
        let t = load_file(&ft, "unused").unwrap();
        assert_eq!(t.frequency_axis(), DEFAULT_FREQUENCY_AXIS);
        assert_eq!(t.column("sample").unwrap(), &[0.5, 0.7]);

        let cat = write(&dir, "lines.cat", "8001.5 0.02 -2.0 3\n8000.5 0.02 -1.0 3\n");
        let t = load_file(&cat, "unused").unwrap();
        assert_eq!(t.frequencies(), &[8000.5, 8001.5]);
        let i = t.column("lines").unwrap();
        assert!((i[0] - 0.1).abs() < 1e-12);
        assert!((i[1] - 0.01).abs() < 1e-12);
    }

    #[test]
    fn exported_csv_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let src = write(&dir, "orig.csv", "Frequency (MHz),I\n1.0,2.0\n2.0,\n");
        let t = load_file(&src, DEFAULT_FREQUENCY_AXIS).unwrap();
        let out = dir.path().join("copy.csv");
        export_csv(&t, &out).unwrap();

        let back = load_file(&out, DEFAULT_FREQUENCY_AXIS).unwrap();
        assert_eq!(back.frequencies(), t.frequencies());
        assert_eq!(back.column("I").unwrap()[0], 2.0);
        assert!(back.column("I").unwrap()[1].is_nan());
    }

    #[test]
    fn json_columns_with_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "j.json",
            r#"{"Frequency (MHz)": [1.0, 2.0], "I": [0.5, null]}"#,
        );
        let t = load_file(&path, DEFAULT_FREQUENCY_AXIS).unwrap();
        assert_eq!(t.frequency_axis(), DEFAULT_FREQUENCY_AXIS);
        assert!(t.column("I").unwrap()[1].is_nan());
    }

    #[test]
    fn json_keeps_file_column_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "s.json", r#"{"nu": [2.0, 1.0], "A": [5.0, 6.0]}"#);
        let t = load_file(&path, DEFAULT_FREQUENCY_AXIS).unwrap();
        assert_eq!(t.column_names().collect::<Vec<_>>(), ["nu", "A"]);
        assert_eq!(t.frequency_axis(), "nu");
        assert_eq!(t.frequencies(), &[1.0, 2.0]);
        assert_eq!(t.column("A").unwrap(), &[6.0, 5.0]);
    }

    #[test]
    fn parquet_reads_numeric_columns_and_skips_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.parquet");

        let schema = Arc::new(Schema::new(vec![
            Field::new("Frequency (MHz)", DataType::Float64, false),
            Field::new("counts", DataType::Int64, true),
            Field::new("label", DataType::Utf8, false),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Float64Array::from(vec![2.0, 1.0])),
                Arc::new(Int64Array::from(vec![Some(20), None])),
                Arc::new(StringArray::from(vec!["a", "b"])),
            ],
        )
        .unwrap();
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let t = load_file(&path, DEFAULT_FREQUENCY_AXIS).unwrap();
        assert!(!t.has_column("label"));
        assert_eq!(t.frequencies(), &[1.0, 2.0]);
        let counts = t.column("counts").unwrap();
        assert!(counts[0].is_nan());
        assert_eq!(counts[1], 20.0);
    }
}
