use std::collections::BTreeSet;

use super::error::{khz_to_mhz, validate_threshold, EngineResult};
use super::model::{disambiguate, outer_join, Table};

// ---------------------------------------------------------------------------
// Merge: frequency-aligned outer union of two tables
// ---------------------------------------------------------------------------

/// Merge `right` into `left` on the frequency axis.
///
/// Value columns of `right` whose name already exists in `left` are renamed
/// to `"<name> (<right.name>)"`, with a `" #n"` counter appended if that is
/// taken too; `left` keeps its names. With `combine`, rows closer than
/// `threshold_khz` are folded by [`collapse_duplicates`].
///
/// Both tables must be sorted by frequency. A failure during the collapse
/// leaves `left` merged but not collapsed.
pub fn merge(left: &mut Table, mut right: Table, combine: bool, threshold_khz: f64) -> EngineResult<()> {
    validate_threshold(threshold_khz)?;
    left.assert_sorted_by_frequency()?;
    right.assert_sorted_by_frequency()?;

    let mut taken: BTreeSet<String> = left
        .column_names()
        .chain(right.column_names())
        .map(str::to_string)
        .collect();
    let colliding: Vec<String> = right
        .value_columns()
        .filter(|c| left.has_column(&c.name))
        .map(|c| c.name.clone())
        .collect();
    for name in colliding {
        let renamed = disambiguate(&format!("{name} ({})", right.name), |n| taken.contains(n));
        log::debug!("merge: renaming '{name}' of '{}' to '{renamed}'", right.name);
        right.rename_column(&name, &renamed)?;
        taken.insert(renamed);
    }
    let axis = left.frequency_axis().to_string();
    let right_axis = right.frequency_axis().to_string();
    right.rename_column(&right_axis, &axis)?;

    let rows_before = left.len();
    *left = outer_join(left, &right)?;
    log::info!(
        "merged '{}' ({} rows) into '{}' ({rows_before} rows): {} rows",
        right.name,
        right.len(),
        left.name,
        left.len()
    );

    if combine {
        collapse_duplicates(left, khz_to_mhz(threshold_khz))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Duplicate collapse
// ---------------------------------------------------------------------------

/// Fold runs of near-duplicate frequencies into their first row.
///
/// Scanning `i` from the first to the third-to-last row: when the next row is
/// closer than `threshold` (table units, MHz), row `i` becomes the
/// representative and absorbs every following row whose gap to *its own
/// predecessor* stays below the threshold. Present values overwrite the
/// representative's cells; missing values never do. The scan then resumes
/// after the absorbed rows. Returns the number of rows removed.
pub fn collapse_duplicates(table: &mut Table, threshold: f64) -> EngineResult<usize> {
    table.assert_sorted_by_frequency()?;

    let axis = table.frequency_axis().to_string();
    let freq = table.frequencies().to_vec();
    let n = freq.len();
    let mut folded = vec![false; n];

    let mut i = 0;
    while i + 2 < n {
        if freq[i + 1] - freq[i] >= threshold {
            i += 1;
            continue;
        }
        let mut j = i + 1;
        while j < n && (freq[j] - freq[j - 1]).abs() < threshold {
            for col in table.columns_mut().iter_mut().filter(|c| c.name != axis) {
                let value = col.values[j];
                if !value.is_nan() {
                    col.values[i] = value;
                }
            }
            folded[j] = true;
            j += 1;
        }
        i = j;
    }

    let keep: Vec<bool> = folded.iter().map(|f| !f).collect();
    table.retain_rows(&keep);
    let removed = n - table.len();
    log::info!(
        "collapsed {removed} near-duplicate rows of '{}' (threshold {threshold} MHz)",
        table.name
    );
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::error::EngineError;
    use crate::data::model::tests::{table, FREQ};
    use crate::data::model::RenderType;

    #[test]
    fn merge_with_empty_table_keeps_rows() {
        let mut left = table("l", &[(FREQ, &[1.0, 2.0, 3.0]), ("A", &[1.0, 2.0, 3.0])]);
        let right = table("r", &[("Freq", &[]), ("B", &[])]);
        merge(&mut left, right, false, 0.0).unwrap();

        assert_eq!(left.frequencies(), &[1.0, 2.0, 3.0]);
        assert_eq!(left.column("A").unwrap(), &[1.0, 2.0, 3.0]);
        assert!(left.column("B").unwrap().iter().all(|v| v.is_nan()));
        assert!(!left.has_column("Freq"));
    }

    #[test]
    fn merge_renames_right_side_collisions() {
        let mut left = table(
            "l",
            &[(FREQ, &[1.0]), ("I", &[1.0]), ("I (r)", &[2.0])],
        );
        let mut right = table("r", &[(FREQ, &[2.0]), ("I", &[3.0]), ("J", &[4.0])]);
        right.set_render_type("I", RenderType::Stem).unwrap();

        merge(&mut left, right, false, 0.0).unwrap();

        let names: Vec<_> = left.column_names().collect();
        assert_eq!(names, vec![FREQ, "I", "I (r)", "I (r) #2", "J"]);
        assert_eq!(left.column("I").unwrap()[0], 1.0);
        assert_eq!(left.column("I (r) #2").unwrap()[1], 3.0);
        assert_eq!(left.render_type("I (r) #2"), Some(RenderType::Stem));
    }

    #[test]
    fn merge_renames_value_column_named_like_left_axis() {
        let mut left = table("l", &[(FREQ, &[1.0]), ("A", &[1.0])]);
        let right = table("r", &[("nu", &[1.0]), (FREQ, &[9.0])]);
        merge(&mut left, right, false, 0.0).unwrap();
        assert_eq!(left.column(&format!("{FREQ} (r)")).unwrap(), &[9.0]);
        assert_eq!(left.frequencies(), &[1.0]);
    }

    #[test]
    fn merge_rejects_unsorted_input_and_bad_threshold() {
        let mut left = table("l", &[(FREQ, &[1.0, 2.0])]);
        let unsorted = table("r", &[(FREQ, &[2.0, 1.0])]);
        assert!(matches!(
            merge(&mut left, unsorted, false, 0.0),
            Err(EngineError::Validation(_))
        ));
        let ok = table("r", &[(FREQ, &[1.0])]);
        assert!(matches!(
            merge(&mut left, ok, true, -1.0),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn merge_with_combine_collapses_across_inputs() {
        let mut left = table("l", &[(FREQ, &[1.000, 2.000, 3.000]), ("A", &[1.0, 2.0, 3.0])]);
        let right = table("r", &[(FREQ, &[1.004, 5.0]), ("B", &[7.0, 8.0])]);
        merge(&mut left, right, true, 8.0).unwrap();

        assert_eq!(left.frequencies(), &[1.000, 2.000, 3.000, 5.0]);
        assert_eq!(left.column("A").unwrap()[0], 1.0);
        assert_eq!(left.column("B").unwrap()[0], 7.0);
    }

    #[test]
    fn collapse_stops_at_a_gap_equal_to_threshold() {
        let mut t = table(
            "c",
            &[(FREQ, &[1.000, 1.005, 1.015, 2.000]), ("I", &[1.0, 2.0, 3.0, 4.0])],
        );
        let removed = collapse_duplicates(&mut t, 0.01).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(t.frequencies(), &[1.000, 1.015, 2.000]);
        assert_eq!(t.column("I").unwrap(), &[2.0, 3.0, 4.0]);
    }

    #[test]
    fn collapse_follows_chained_gaps() {
        // First and last rows are 0.018 apart, each step only 0.006.
        let mut t = table(
            "c",
            &[(FREQ, &[1.000, 1.006, 1.012, 1.018, 5.0]), ("I", &[1.0, 2.0, 3.0, 4.0, 5.0])],
        );
        collapse_duplicates(&mut t, 0.01).unwrap();
        assert_eq!(t.frequencies(), &[1.000, 5.0]);
        assert_eq!(t.column("I").unwrap(), &[4.0, 5.0]);
    }

    #[test]
    fn collapse_never_overwrites_with_missing() {
        let mut t = table(
            "c",
            &[
                (FREQ, &[1.000, 1.001, 3.0]),
                ("A", &[5.0, f64::NAN, 1.0]),
                ("B", &[f64::NAN, 6.0, 1.0]),
            ],
        );
        collapse_duplicates(&mut t, 0.01).unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.column("A").unwrap()[0], 5.0);
        assert_eq!(t.column("B").unwrap()[0], 6.0);
    }

    #[test]
    fn collapse_leaves_isolated_rows_alone() {
        let freqs = [1.0, 2.0, 3.0, 4.0];
        let mut t = table("c", &[(FREQ, &freqs), ("I", &[1.0, 2.0, 3.0, 4.0])]);
        assert_eq!(collapse_duplicates(&mut t, 0.5).unwrap(), 0);
        assert_eq!(t.frequencies(), &freqs);
    }

    #[test]
    fn collapse_does_not_start_a_run_at_the_last_pair() {
        let mut t = table("c", &[(FREQ, &[1.0, 2.0, 2.001]), ("I", &[1.0, 2.0, 3.0])]);
        assert_eq!(collapse_duplicates(&mut t, 0.01).unwrap(), 0);
        assert_eq!(t.len(), 3);
    }
}
