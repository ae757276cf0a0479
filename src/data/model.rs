use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::error::{EngineError, EngineResult};

// ---------------------------------------------------------------------------
// RenderType – how a column is drawn
// ---------------------------------------------------------------------------

/// Per-column plotting tag. `Hidden` columns stay in the table but are
/// skipped by the plot and by peak extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderType {
    #[default]
    Line,
    Scatter,
    Stem,
    Hidden,
}

impl RenderType {
    pub const ALL: [RenderType; 4] = [
        RenderType::Line,
        RenderType::Scatter,
        RenderType::Stem,
        RenderType::Hidden,
    ];

    pub fn is_visible(self) -> bool {
        self != RenderType::Hidden
    }
}

impl fmt::Display for RenderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RenderType::Line => "Line",
            RenderType::Scatter => "Scatter",
            RenderType::Stem => "Stem",
            RenderType::Hidden => "Hidden",
        };
        write!(f, "{label}")
    }
}

// ---------------------------------------------------------------------------
// Column – one named numeric series
// ---------------------------------------------------------------------------

/// A named column. Missing cells are `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<f64>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Column {
            name: name.into(),
            values,
        }
    }
}

// ---------------------------------------------------------------------------
// Table – named columns aligned on a frequency axis
// ---------------------------------------------------------------------------

/// A named, column-oriented spectrum with a designated frequency axis.
///
/// Invariants kept by every method:
/// * column names are unique and all columns have the same length;
/// * the frequency axis is a column and never carries a render type;
/// * every other column carries exactly one render type.
#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    columns: Vec<Column>,
    frequency_axis: String,
    display_axis: String,
    render_types: BTreeMap<String, RenderType>,
    /// Set once ratio columns have been derived.
    pub is_ratio: bool,
}

impl Table {
    /// Build a table from already-numeric columns. Every non-axis column is
    /// tagged [`RenderType::Line`].
    pub fn from_columns(
        name: impl Into<String>,
        columns: Vec<Column>,
        frequency_axis: &str,
    ) -> EngineResult<Self> {
        let name = name.into();

        let mut seen = BTreeSet::new();
        for col in &columns {
            if !seen.insert(col.name.as_str()) {
                return Err(EngineError::Shape(format!(
                    "column '{}' appears more than once",
                    col.name
                )));
            }
        }
        if let Some(first) = columns.first() {
            if let Some(bad) = columns.iter().find(|c| c.values.len() != first.values.len()) {
                return Err(EngineError::Shape(format!(
                    "column '{}' has {} rows but '{}' has {}",
                    bad.name,
                    bad.values.len(),
                    first.name,
                    first.values.len()
                )));
            }
        }
        if !seen.contains(frequency_axis) {
            return Err(EngineError::unknown_column(&name, frequency_axis));
        }

        let render_types = columns
            .iter()
            .filter(|c| c.name != frequency_axis)
            .map(|c| (c.name.clone(), RenderType::Line))
            .collect();

        Ok(Table {
            name,
            columns,
            frequency_axis: frequency_axis.to_string(),
            display_axis: frequency_axis.to_string(),
            render_types,
            is_ratio: false,
        })
    }

    /// Build a table from a raw grid of text cells (one `Vec` per row).
    ///
    /// Empty cells become missing values; any other cell that does not parse
    /// as a number is a [`EngineError::Type`].
    pub fn from_records(
        name: impl Into<String>,
        headers: &[String],
        records: &[Vec<String>],
        frequency_axis: &str,
    ) -> EngineResult<Self> {
        let mut values: Vec<Vec<f64>> = vec![Vec::with_capacity(records.len()); headers.len()];

        for (row, record) in records.iter().enumerate() {
            if record.len() != headers.len() {
                return Err(EngineError::Shape(format!(
                    "row {row} has {} cells but there are {} columns",
                    record.len(),
                    headers.len()
                )));
            }
            for (col, cell) in record.iter().enumerate() {
                let cell = cell.trim();
                let value = if cell.is_empty() {
                    f64::NAN
                } else {
                    cell.parse::<f64>().map_err(|_| {
                        EngineError::Type(format!(
                            "row {row}, column '{}': '{cell}' is not a number",
                            headers[col]
                        ))
                    })?
                };
                values[col].push(value);
            }
        }

        let columns = headers
            .iter()
            .zip(values)
            .map(|(h, v)| Column::new(h.clone(), v))
            .collect();
        Self::from_columns(name, columns, frequency_axis)
    }

    // -- Accessors --

    pub fn frequency_axis(&self) -> &str {
        &self.frequency_axis
    }

    pub fn display_axis(&self) -> &str {
        &self.display_axis
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Like [`Table::column`] but reports a missing column as an error.
    pub fn require_column(&self, name: &str) -> EngineResult<&[f64]> {
        self.column(name)
            .ok_or_else(|| EngineError::unknown_column(&self.name, name))
    }

    /// Values of the frequency axis.
    pub fn frequencies(&self) -> &[f64] {
        self.column(&self.frequency_axis).unwrap_or(&[])
    }

    /// Every column except the frequency axis, in table order.
    pub fn value_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns
            .iter()
            .filter(move |c| c.name != self.frequency_axis)
    }

    pub(crate) fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }

    pub fn render_type(&self, column: &str) -> Option<RenderType> {
        self.render_types.get(column).copied()
    }

    pub fn render_types(&self) -> &BTreeMap<String, RenderType> {
        &self.render_types
    }

    pub fn set_render_type(&mut self, column: &str, render_type: RenderType) -> EngineResult<()> {
        if column == self.frequency_axis {
            return Err(EngineError::Validation(format!(
                "the frequency axis '{column}' cannot carry a render type"
            )));
        }
        match self.render_types.get_mut(column) {
            Some(slot) => {
                *slot = render_type;
                Ok(())
            }
            None => Err(EngineError::unknown_column(&self.name, column)),
        }
    }

    // -- Column housekeeping --

    pub fn add_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<f64>,
        render_type: RenderType,
    ) -> EngineResult<()> {
        let name = name.into();
        if self.has_column(&name) {
            return Err(EngineError::Validation(format!(
                "table '{}' already has a column named '{name}'",
                self.name
            )));
        }
        if values.len() != self.len() {
            return Err(EngineError::Shape(format!(
                "column '{name}' has {} rows but table '{}' has {}",
                values.len(),
                self.name,
                self.len()
            )));
        }
        self.render_types.insert(name.clone(), render_type);
        self.columns.push(Column::new(name, values));
        Ok(())
    }

    pub fn drop_column(&mut self, name: &str) -> EngineResult<Column> {
        if name == self.frequency_axis {
            return Err(EngineError::Validation(format!(
                "cannot drop the frequency axis '{name}'"
            )));
        }
        let idx = self
            .columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| EngineError::unknown_column(&self.name, name))?;
        self.render_types.remove(name);
        if self.display_axis == name {
            self.display_axis = self.frequency_axis.clone();
        }
        Ok(self.columns.remove(idx))
    }

    /// Rename a column, carrying its render type and axis roles along.
    pub fn rename_column(&mut self, old: &str, new: &str) -> EngineResult<()> {
        if old == new {
            return Ok(());
        }
        if self.has_column(new) {
            return Err(EngineError::Validation(format!(
                "table '{}' already has a column named '{new}'",
                self.name
            )));
        }
        let col = self
            .columns
            .iter_mut()
            .find(|c| c.name == old)
            .ok_or_else(|| EngineError::unknown_column(&self.name, old))?;
        col.name = new.to_string();

        if let Some(rt) = self.render_types.remove(old) {
            self.render_types.insert(new.to_string(), rt);
        }
        if self.frequency_axis == old {
            self.frequency_axis = new.to_string();
        }
        if self.display_axis == old {
            self.display_axis = new.to_string();
        }
        Ok(())
    }

    /// Make another column the frequency axis. The old axis becomes an
    /// ordinary `Line` column.
    pub fn set_frequency_axis(&mut self, name: &str) -> EngineResult<()> {
        if name == self.frequency_axis {
            return Ok(());
        }
        self.require_column(name)?;
        let old = std::mem::replace(&mut self.frequency_axis, name.to_string());
        self.render_types.remove(name);
        self.render_types.insert(old, RenderType::Line);
        Ok(())
    }

    pub fn set_display_axis(&mut self, name: &str) -> EngineResult<()> {
        self.require_column(name)?;
        self.display_axis = name.to_string();
        Ok(())
    }

    /// Deep copy named `"<name>*"`.
    pub fn duplicate(&self) -> Table {
        let mut copy = self.clone();
        copy.name = format!("{}*", self.name);
        copy
    }

    /// Move `columns` into a new table `"<name> (split)"` that shares this
    /// table's frequency axis. The display axis of `self` falls back to the
    /// frequency axis.
    pub fn split_off(&mut self, columns: &[String]) -> EngineResult<Table> {
        if columns.is_empty() {
            return Err(EngineError::Validation("no columns selected to split off".into()));
        }
        for name in columns {
            if *name == self.frequency_axis {
                return Err(EngineError::Validation(format!(
                    "the frequency axis '{name}' cannot be split off"
                )));
            }
            self.require_column(name)?;
        }

        let mut moved = vec![Column::new(
            self.frequency_axis.clone(),
            self.frequencies().to_vec(),
        )];
        let mut render_types = BTreeMap::new();
        for name in columns {
            if let Some(rt) = self.render_types.get(name) {
                render_types.insert(name.clone(), *rt);
            }
            moved.push(self.drop_column(name)?);
        }
        self.display_axis = self.frequency_axis.clone();

        let mut split = Table::from_columns(
            format!("{} (split)", self.name),
            moved,
            &self.frequency_axis,
        )?;
        split.render_types = render_types;
        Ok(split)
    }

    // -- Row operations --

    /// A copy holding only the rows at `indices` (in that order).
    pub fn select_rows(&self, indices: &[usize]) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|c| Column::new(c.name.clone(), indices.iter().map(|&i| c.values[i]).collect()))
            .collect();
        Table {
            name: self.name.clone(),
            columns,
            frequency_axis: self.frequency_axis.clone(),
            display_axis: self.display_axis.clone(),
            render_types: self.render_types.clone(),
            is_ratio: self.is_ratio,
        }
    }

    /// Keep the rows whose `keep` flag is set.
    pub(crate) fn retain_rows(&mut self, keep: &[bool]) {
        for col in &mut self.columns {
            let mut flags = keep.iter();
            col.values.retain(|_| flags.next().copied().unwrap_or(true));
        }
    }

    // -- Ordering --

    pub fn is_sorted_by_frequency(&self) -> bool {
        let freq = self.frequencies();
        freq.iter().all(|f| !f.is_nan()) && freq.windows(2).all(|w| w[0] <= w[1])
    }

    /// Fails unless the frequency axis is ascending and free of missing values.
    pub fn assert_sorted_by_frequency(&self) -> EngineResult<()> {
        if self.is_sorted_by_frequency() {
            Ok(())
        } else {
            Err(EngineError::Validation(format!(
                "table '{}' is not sorted ascending by '{}'",
                self.name, self.frequency_axis
            )))
        }
    }

    /// Stable ascending sort of all rows by frequency; missing frequencies
    /// go last. Calling it on a sorted table changes nothing.
    pub fn sort_by_frequency(&mut self) {
        if self.is_sorted_by_frequency() {
            return;
        }
        let freq = self.frequencies();
        let mut order: Vec<usize> = (0..freq.len()).collect();
        order.sort_by(|&a, &b| match (freq[a].is_nan(), freq[b].is_nan()) {
            (false, false) => freq[a].total_cmp(&freq[b]),
            (a_nan, b_nan) => a_nan.cmp(&b_nan),
        });
        for col in &mut self.columns {
            col.values = order.iter().map(|&i| col.values[i]).collect();
        }
        log::debug!("sorted '{}' by '{}'", self.name, self.frequency_axis);
    }
}

// ---------------------------------------------------------------------------
// Helpers shared by the operations
// ---------------------------------------------------------------------------

/// Return `candidate` if it is free, otherwise the first free
/// `"<candidate> #2"`, `"<candidate> #3"`, ...
pub(crate) fn disambiguate(candidate: &str, is_taken: impl Fn(&str) -> bool) -> String {
    if !is_taken(candidate) {
        return candidate.to_string();
    }
    (2..)
        .map(|n| format!("{candidate} #{n}"))
        .find(|name| !is_taken(name))
        .unwrap_or_else(|| candidate.to_string())
}

/// Outer join of two frequency-sorted tables on exact frequency equality.
///
/// `right` must already use `left`'s frequency axis name and share no other
/// column name with `left`. Rows present in only one input get `NaN` in the
/// other input's columns; runs of equal keys pair up as a cartesian product.
/// The result keeps `left`'s name, axes and flags.
pub(crate) fn outer_join(left: &Table, right: &Table) -> EngineResult<Table> {
    left.assert_sorted_by_frequency()?;
    right.assert_sorted_by_frequency()?;
    if right.frequency_axis != left.frequency_axis {
        return Err(EngineError::Validation(format!(
            "cannot join on '{}' and '{}'",
            left.frequency_axis, right.frequency_axis
        )));
    }
    if let Some(clash) = right.value_columns().find(|c| left.has_column(&c.name)) {
        return Err(EngineError::Validation(format!(
            "column '{}' exists in both '{}' and '{}'",
            clash.name, left.name, right.name
        )));
    }

    let lf = left.frequencies();
    let rf = right.frequencies();
    let mut pairs: Vec<(Option<usize>, Option<usize>)> = Vec::with_capacity(lf.len() + rf.len());
    let (mut i, mut j) = (0, 0);
    while i < lf.len() || j < rf.len() {
        if j >= rf.len() || (i < lf.len() && lf[i] < rf[j]) {
            pairs.push((Some(i), None));
            i += 1;
        } else if i >= lf.len() || rf[j] < lf[i] {
            pairs.push((None, Some(j)));
            j += 1;
        } else {
            let key = lf[i];
            let i_end = i + lf[i..].iter().take_while(|&&f| f == key).count();
            let j_end = j + rf[j..].iter().take_while(|&&f| f == key).count();
            for a in i..i_end {
                for b in j..j_end {
                    pairs.push((Some(a), Some(b)));
                }
            }
            i = i_end;
            j = j_end;
        }
    }

    let pick = |values: &[f64], idx: Option<usize>| idx.map_or(f64::NAN, |k| values[k]);
    let mut columns = Vec::with_capacity(left.columns.len() + right.columns.len() - 1);
    for col in &left.columns {
        let values = if col.name == left.frequency_axis {
            pairs
                .iter()
                .map(|&(a, b)| a.map_or_else(|| pick(rf, b), |k| lf[k]))
                .collect()
        } else {
            pairs.iter().map(|&(a, _)| pick(&col.values, a)).collect()
        };
        columns.push(Column::new(col.name.clone(), values));
    }
    for col in right.value_columns() {
        let values = pairs.iter().map(|&(_, b)| pick(&col.values, b)).collect();
        columns.push(Column::new(col.name.clone(), values));
    }

    let mut render_types = left.render_types.clone();
    for col in right.value_columns() {
        let rt = right.render_type(&col.name).unwrap_or_default();
        render_types.insert(col.name.clone(), rt);
    }

    Ok(Table {
        name: left.name.clone(),
        columns,
        frequency_axis: left.frequency_axis.clone(),
        display_axis: left.display_axis.clone(),
        render_types,
        is_ratio: left.is_ratio,
    })
}
