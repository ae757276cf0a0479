//! Built-in external transforms for [`TableRegistry::apply_external`].
//!
//! Each transform takes the source table, its x column and one value column,
//! and returns a fresh two-column table.
//!
//! [`TableRegistry::apply_external`]: crate::data::registry::TableRegistry::apply_external

use anyhow::{bail, Result};

use crate::data::model::{Column, Table};

pub type TransformFn = fn(&Table, &str, &str) -> Result<Table>;

pub struct Transform {
    pub label: &'static str,
    pub apply: TransformFn,
}

pub const TRANSFORMS: &[Transform] = &[
    Transform {
        label: "Normalize to unit maximum",
        apply: normalize,
    },
    Transform {
        label: "First derivative",
        apply: derivative,
    },
];

fn xy(table: &Table, x: &str, column: &str) -> Result<(Vec<f64>, Vec<f64>)> {
    if x == column {
        bail!("'{column}' is the x axis; pick a value column");
    }
    Ok((
        table.require_column(x)?.to_vec(),
        table.require_column(column)?.to_vec(),
    ))
}

fn pair(name: &str, x: &str, xs: Vec<f64>, column: &str, ys: Vec<f64>) -> Result<Table> {
    Ok(Table::from_columns(
        name,
        vec![Column::new(x, xs), Column::new(column, ys)],
        x,
    )?)
}

/// Divide `column` by its largest absolute value.
pub fn normalize(table: &Table, x: &str, column: &str) -> Result<Table> {
    let (xs, ys) = xy(table, x, column)?;
    let peak = ys
        .iter()
        .filter(|v| v.is_finite())
        .fold(0.0_f64, |m, v| m.max(v.abs()));
    if peak == 0.0 {
        bail!("'{column}' has no non-zero values to normalize by");
    }
    let scaled = ys.iter().map(|v| v / peak).collect();
    pair(&table.name, x, xs, column, scaled)
}

/// Central differences inside, one-sided at the ends.
pub fn derivative(table: &Table, x: &str, column: &str) -> Result<Table> {
    let (xs, ys) = xy(table, x, column)?;
    let n = xs.len();
    if n < 2 {
        bail!("need at least 2 points to differentiate, '{column}' has {n}");
    }
    let slope = |a: usize, b: usize| (ys[b] - ys[a]) / (xs[b] - xs[a]);
    let dy: Vec<f64> = (0..n)
        .map(|i| match i {
            0 => slope(0, 1),
            i if i == n - 1 => slope(n - 2, n - 1),
            i => slope(i - 1, i + 1),
        })
        .collect();
    pair(&table.name, x, xs, &format!("d{column}/d{x}"), dy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::tests::{table, FREQ};
    use crate::data::registry::TableRegistry;

    #[test]
    fn normalize_scales_to_unit_peak() {
        let t = table("t", &[(FREQ, &[1.0, 2.0, 3.0]), ("I", &[1.0, -4.0, 2.0])]);
        let out = normalize(&t, FREQ, "I").unwrap();
        assert_eq!(out.column("I").unwrap(), &[0.25, -1.0, 0.5]);

        let flat = table("f", &[(FREQ, &[1.0]), ("I", &[0.0])]);
        assert!(normalize(&flat, FREQ, "I").is_err());
    }

    #[test]
    fn derivative_of_a_parabola() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y: Vec<f64> = x.iter().map(|v| v * v).collect();
        let t = table("p", &[(FREQ, x.as_slice()), ("y", y.as_slice())]);
        let out = derivative(&t, FREQ, "y").unwrap();
        let name = format!("dy/d{FREQ}");
        assert_eq!(out.column(&name).unwrap(), &[1.0, 2.0, 4.0, 5.0]);
    }

    #[test]
    fn transforms_plug_into_the_registry() {
        let mut reg = TableRegistry::new();
        let id = reg.add(table("t", &[(FREQ, &[1.0, 2.0]), ("I", &[2.0, 4.0])]));
        let new_id = reg.apply_external(id, "I", TRANSFORMS[0].apply).unwrap();
        assert_eq!(reg.get(new_id).unwrap().name, "t (mod)");

        assert!(reg.apply_external(id, FREQ, TRANSFORMS[1].apply).is_err());
        assert_eq!(reg.len(), 2);
    }
}
