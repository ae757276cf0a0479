use std::collections::BTreeMap;

use super::error::{EngineError, EngineResult};
use super::model::{RenderType, Table};

/// Add `"<col>/<reference>"` for every value column except `reference`.
///
/// Ratio columns are tagged [`RenderType::Hidden`] and the table is flagged
/// [`Table::is_ratio`]. Division follows IEEE semantics: a zero or missing
/// reference yields `inf`/`NaN` in the ratio, nothing is trapped.
///
/// Returns source column -> ratio column.
pub fn derive_ratios(table: &mut Table, reference: &str) -> EngineResult<BTreeMap<String, String>> {
    if reference == table.frequency_axis() {
        return Err(EngineError::Validation(format!(
            "the frequency axis '{reference}' cannot be a ratio reference"
        )));
    }
    let denominator = table.require_column(reference)?.to_vec();

    let sources: Vec<String> = table
        .value_columns()
        .filter(|c| c.name != reference)
        .map(|c| c.name.clone())
        .collect();
    let targets: Vec<String> = sources.iter().map(|c| format!("{c}/{reference}")).collect();
    if let Some(clash) = targets.iter().find(|t| table.has_column(t)) {
        return Err(EngineError::Validation(format!(
            "ratio column '{clash}' already exists in '{}'",
            table.name
        )));
    }

    let mut mapping = BTreeMap::new();
    for (source, target) in sources.into_iter().zip(targets) {
        let ratios: Vec<f64> = table
            .require_column(&source)?
            .iter()
            .zip(&denominator)
            .map(|(v, r)| v / r)
            .collect();
        table.add_column(target.clone(), ratios, RenderType::Hidden)?;
        mapping.insert(source, target);
    }
    table.is_ratio = true;

    log::info!(
        "derived {} ratio columns against '{reference}' in '{}'",
        mapping.len(),
        table.name
    );
    Ok(mapping)
}

/// Whether rows inside or outside the ratio band are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BandMode {
    #[default]
    Include,
    Exclude,
}

/// Keep only rows whose ratios all sit inside (`Include`) or all sit outside
/// (`Exclude`) the open band `(target - margin, target + margin)`.
///
/// `ratio_columns` are the derived column names, typically the values of the
/// map returned by [`derive_ratios`]. A missing ratio satisfies neither mode.
/// Returns the number of rows dropped.
pub fn filter_by_ratio(
    table: &mut Table,
    ratio_columns: &[String],
    target: f64,
    margin: f64,
    mode: BandMode,
) -> EngineResult<usize> {
    if !target.is_finite() {
        return Err(EngineError::Validation(format!(
            "target ratio must be a finite number, got {target}"
        )));
    }
    if !margin.is_finite() || margin < 0.0 {
        return Err(EngineError::Validation(format!(
            "margin must be a finite, non-negative number, got {margin}"
        )));
    }
    let columns = ratio_columns
        .iter()
        .map(|c| table.require_column(c))
        .collect::<EngineResult<Vec<_>>>()?;

    let (low, high) = (target - margin, target + margin);
    let keep: Vec<bool> = (0..table.len())
        .map(|row| {
            columns.iter().all(|col| {
                let r = col[row];
                match mode {
                    BandMode::Include => low < r && r < high,
                    BandMode::Exclude => r > high || r < low,
                }
            })
        })
        .collect();

    let before = table.len();
    table.retain_rows(&keep);
    let dropped = before - table.len();
    log::info!(
        "ratio band {low}..{high} ({mode:?}) dropped {dropped} of {before} rows from '{}'",
        table.name
    );
    Ok(dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::tests::{table, FREQ};

    fn sample() -> Table {
        table(
            "lines",
            &[
                (FREQ, &[1.0, 2.0, 3.0, 4.0]),
                ("A", &[2.0, 3.0, 5.0, 1.0]),
                ("B", &[4.0, 9.0, 5.0, 8.0]),
                ("ref", &[2.0, 3.0, 0.0, f64::NAN]),
            ],
        )
    }

    #[test]
    fn ratios_divide_each_column_by_the_reference() {
        let mut t = sample();
        let map = derive_ratios(&mut t, "ref").unwrap();

        assert_eq!(map.len(), 2);
        assert_eq!(map["A"], "A/ref");
        assert_eq!(map["B"], "B/ref");
        assert!(t.is_ratio);
        assert_eq!(t.render_type("A/ref"), Some(RenderType::Hidden));

        let a = t.column("A").unwrap().to_vec();
        let r = t.column("ref").unwrap().to_vec();
        let ratio = t.column("A/ref").unwrap();
        for i in 0..2 {
            assert!((a[i] / r[i] - ratio[i]).abs() < 1e-12);
        }
        assert!(ratio[2].is_infinite());
        assert!(ratio[3].is_nan());
    }

    #[test]
    fn existing_ratio_names_fail_before_mutation() {
        let mut t = sample();
        derive_ratios(&mut t, "ref").unwrap();
        let width = t.columns().len();
        // B/ref exists now, and so does A/ref.
        assert!(matches!(
            derive_ratios(&mut t, "ref"),
            Err(EngineError::Validation(_))
        ));
        assert_eq!(t.columns().len(), width);
    }

    #[test]
    fn unknown_reference_is_reported() {
        let mut t = sample();
        assert!(matches!(
            derive_ratios(&mut t, "nope"),
            Err(EngineError::UnknownColumn { .. })
        ));
        assert!(!t.is_ratio);
    }

    #[test]
    fn band_filter_includes_or_excludes_rows() {
        let mut inc = sample();
        let map = derive_ratios(&mut inc, "B").unwrap();
        // A/B = [0.5, 0.333, 1.0, 0.125]; ref/B = [0.5, 0.333, 0.0, NaN]
        let a_only = vec![map["A"].clone()];

        let mut exc = inc.clone();
        assert_eq!(filter_by_ratio(&mut inc, &a_only, 0.4, 0.15, BandMode::Include).unwrap(), 2);
        assert_eq!(inc.frequencies(), &[1.0, 2.0]);

        assert_eq!(filter_by_ratio(&mut exc, &a_only, 0.4, 0.15, BandMode::Exclude).unwrap(), 2);
        assert_eq!(exc.frequencies(), &[3.0, 4.0]);
    }

    #[test]
    fn band_filter_requires_every_ratio_and_drops_missing() {
        let mut t = sample();
        let map = derive_ratios(&mut t, "B").unwrap();
        let all: Vec<String> = map.values().cloned().collect();
        filter_by_ratio(&mut t, &all, 0.4, 0.15, BandMode::Include).unwrap();
        assert_eq!(t.frequencies(), &[1.0, 2.0]);

        let mut t = sample();
        derive_ratios(&mut t, "B").unwrap();
        assert!(filter_by_ratio(&mut t, &all, 0.4, -1.0, BandMode::Include).is_err());
    }
}
