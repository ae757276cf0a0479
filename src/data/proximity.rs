use std::collections::BTreeSet;

use super::error::{khz_to_mhz, validate_threshold, EngineError, EngineResult};
use super::model::{disambiguate, outer_join, RenderType, Table};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityParams {
    pub threshold_khz: f64,
    /// Also return the removed rows as their own table.
    pub return_removed: bool,
    /// Join the removed rows back into the target as annotated columns.
    pub add_back: bool,
}

/// Tables produced by [`remove_near`]; the caller registers them.
#[derive(Debug, Clone)]
pub struct ProximityOutcome {
    /// `"<target> - <reference>"`: rows with no reference line nearby.
    pub kept: Table,
    /// `"<target> (removed)"`, present when requested.
    pub removed: Option<Table>,
}

/// Split `target`'s rows by whether a `reference` frequency lies within
/// `threshold_khz` of them.
///
/// A row is removed iff some reference frequency `r`, restricted to the
/// open range between the target's smallest and largest frequency, satisfies
/// `f - t < r < f + t`. `reference` must be a plain frequency/intensity pair.
///
/// With `add_back`, the removed rows are renamed `"<col> (<reference>)"`
/// and outer-joined into `target` as `Line` columns; otherwise `target` is
/// not modified.
pub fn remove_near(
    target: &mut Table,
    reference: &Table,
    params: ProximityParams,
) -> EngineResult<ProximityOutcome> {
    let value_columns = reference.value_columns().count();
    if value_columns != 1 {
        return Err(EngineError::Shape(format!(
            "reference '{}' must have exactly one intensity column, found {value_columns}",
            reference.name
        )));
    }
    validate_threshold(params.threshold_khz)?;
    if params.add_back {
        target.assert_sorted_by_frequency()?;
    }
    let t = khz_to_mhz(params.threshold_khz);

    let freq = target.frequencies();
    let (lo, hi) = freq
        .iter()
        .filter(|f| !f.is_nan())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &f| (lo.min(f), hi.max(f)));
    let mut lines: Vec<f64> = reference
        .frequencies()
        .iter()
        .copied()
        .filter(|&r| r > lo && r < hi)
        .collect();
    lines.sort_by(f64::total_cmp);

    let (mut kept_rows, mut removed_rows) = (Vec::new(), Vec::new());
    for (row, &f) in freq.iter().enumerate() {
        // First reference line above the lower bound; the row is near a line
        // iff that line is also below the upper bound.
        let idx = lines.partition_point(|&r| r <= f - t);
        if lines.get(idx).is_some_and(|&r| r < f + t) {
            removed_rows.push(row);
        } else {
            kept_rows.push(row);
        }
    }
    log::info!(
        "'{}' vs '{}' at {} kHz: {} rows kept, {} removed",
        target.name,
        reference.name,
        params.threshold_khz,
        kept_rows.len(),
        removed_rows.len()
    );

    let mut kept = target.select_rows(&kept_rows);
    kept.name = format!("{} - {}", target.name, reference.name);
    let mut removed = target.select_rows(&removed_rows);
    removed.name = format!("{} (removed)", target.name);

    if params.add_back {
        add_back(target, &removed, &reference.name)?;
    }

    Ok(ProximityOutcome {
        kept,
        removed: params.return_removed.then_some(removed),
    })
}

fn add_back(target: &mut Table, removed: &Table, reference_name: &str) -> EngineResult<()> {
    let mut annotated = removed.clone();
    let mut taken: BTreeSet<String> = target
        .column_names()
        .chain(removed.column_names())
        .map(str::to_string)
        .collect();
    let sources: Vec<String> = removed.value_columns().map(|c| c.name.clone()).collect();
    let mut added = Vec::with_capacity(sources.len());
    for name in sources {
        let renamed = disambiguate(&format!("{name} ({reference_name})"), |n| taken.contains(n));
        annotated.rename_column(&name, &renamed)?;
        annotated.set_render_type(&renamed, RenderType::Line)?;
        taken.insert(renamed.clone());
        added.push(renamed);
    }

    *target = outer_join(target, &annotated)?;
    log::debug!("added back {added:?} into '{}'", target.name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::tests::{table, FREQ};

    fn params(threshold_khz: f64) -> ProximityParams {
        ProximityParams {
            threshold_khz,
            return_removed: true,
            add_back: false,
        }
    }

    fn scan() -> Table {
        table(
            "scan",
            &[(FREQ, &[1.0, 1.005, 1.02, 2.0]), ("I", &[1.0, 2.0, 3.0, 4.0])],
        )
    }

    #[test]
    fn removes_rows_within_the_open_interval() {
        let mut target = scan();
        let reference = table("cat", &[(FREQ, &[1.004]), ("S", &[1.0])]);
        let out = remove_near(&mut target, &reference, params(8.0)).unwrap();

        assert_eq!(out.kept.name, "scan - cat");
        assert_eq!(out.kept.frequencies(), &[1.02, 2.0]);
        let removed = out.removed.unwrap();
        assert_eq!(removed.name, "scan (removed)");
        assert_eq!(removed.frequencies(), &[1.0, 1.005]);
        assert_eq!(removed.column("I").unwrap(), &[1.0, 2.0]);
    }

    #[test]
    fn kept_and_removed_partition_the_target() {
        let mut target = table(
            "t",
            &[
                (FREQ, &[1.0, 1.1, 1.2, 1.3, 1.4, 1.5, 1.6]),
                ("I", &[0.0; 7]),
            ],
        );
        let reference = table("r", &[(FREQ, &[0.5, 1.12, 1.41, 1.6, 9.0]), ("S", &[0.0; 5])]);
        let out = remove_near(&mut target, &reference, params(30.0)).unwrap();
        let removed = out.removed.unwrap();
        assert_eq!(out.kept.len() + removed.len(), target.len());

        let mut all: Vec<f64> = out
            .kept
            .frequencies()
            .iter()
            .chain(removed.frequencies())
            .copied()
            .collect();
        all.sort_by(f64::total_cmp);
        assert_eq!(all, target.frequencies());
        // 1.6 equals the target maximum and is clipped away.
        assert_eq!(removed.frequencies(), &[1.1, 1.4]);
    }

    #[test]
    fn boundary_distance_is_not_near() {
        let mut target = table("t", &[(FREQ, &[1.0, 1.5, 2.0]), ("I", &[0.0; 3])]);
        let reference = table("r", &[(FREQ, &[1.25]), ("S", &[0.0])]);
        let out = remove_near(&mut target, &reference, params(250.0)).unwrap();
        assert_eq!(out.kept.len(), 3);
    }

    #[test]
    fn multi_column_reference_is_a_shape_error() {
        let mut target = scan();
        let reference = table("r", &[(FREQ, &[1.0]), ("S", &[0.0]), ("T", &[0.0])]);
        assert!(matches!(
            remove_near(&mut target, &reference, params(8.0)),
            Err(EngineError::Shape(_))
        ));
    }

    #[test]
    fn add_back_annotates_the_target() {
        let mut target = scan();
        let reference = table("cat", &[(FREQ, &[1.004]), ("S", &[1.0])]);
        let p = ProximityParams {
            threshold_khz: 8.0,
            return_removed: false,
            add_back: true,
        };
        let out = remove_near(&mut target, &reference, p).unwrap();
        assert!(out.removed.is_none());

        let added = target.column("I (cat)").unwrap();
        assert_eq!(target.len(), 4);
        assert_eq!(&added[..2], &[1.0, 2.0]);
        assert!(added[2].is_nan() && added[3].is_nan());
        assert_eq!(target.render_type("I (cat)"), Some(RenderType::Line));
    }
}
