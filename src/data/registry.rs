use std::collections::BTreeMap;
use std::fmt;

use super::error::{EngineError, EngineResult};
use super::merge;
use super::model::Table;
use super::peaks::{self, PeakParams};
use super::proximity::{self, ProximityParams};
use super::ratio;

// ---------------------------------------------------------------------------
// Identity and change events
// ---------------------------------------------------------------------------

/// Stable handle of a table inside one [`TableRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(u64);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryEvent {
    Added(TableId),
    Removed(TableId),
    Modified(TableId),
}

pub type ChangeCallback = Box<dyn FnMut(RegistryEvent)>;

/// Tables registered by [`TableRegistry::remove_near`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProximityIds {
    pub kept: TableId,
    pub removed: Option<TableId>,
}

// ---------------------------------------------------------------------------
// TableRegistry – the open tables of one session
// ---------------------------------------------------------------------------

/// The set of open tables. Insertion order only matters for listing.
///
/// The registry is the only component that talks to the UI: after every
/// mutation it invokes the change callback installed with
/// [`TableRegistry::set_on_change`].
#[derive(Default)]
pub struct TableRegistry {
    entries: Vec<(TableId, Table)>,
    next_id: u64,
    on_change: Option<ChangeCallback>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_on_change(&mut self, callback: impl FnMut(RegistryEvent) + 'static) {
        self.on_change = Some(Box::new(callback));
    }

    fn notify(&mut self, event: RegistryEvent) {
        if let Some(cb) = self.on_change.as_mut() {
            cb(event);
        }
    }

    pub fn add(&mut self, table: Table) -> TableId {
        let id = TableId(self.next_id);
        self.next_id += 1;
        log::info!("registered table '{}' ({} rows) as {id}", table.name, table.len());
        self.entries.push((id, table));
        self.notify(RegistryEvent::Added(id));
        id
    }

    pub fn remove(&mut self, id: TableId) -> EngineResult<Table> {
        let idx = self.position(id)?;
        let (_, table) = self.entries.remove(idx);
        log::info!("removed table '{}' ({id})", table.name);
        self.notify(RegistryEvent::Removed(id));
        Ok(table)
    }

    pub fn get(&self, id: TableId) -> EngineResult<&Table> {
        self.entries
            .iter()
            .find(|(i, _)| *i == id)
            .map(|(_, t)| t)
            .ok_or(EngineError::UnknownTable(id))
    }

    /// Run `f` against one table, then announce the modification.
    pub fn update<R>(
        &mut self,
        id: TableId,
        f: impl FnOnce(&mut Table) -> EngineResult<R>,
    ) -> EngineResult<R> {
        let idx = self.position(id)?;
        let out = f(&mut self.entries[idx].1)?;
        self.notify(RegistryEvent::Modified(id));
        Ok(out)
    }

    /// Tables in insertion order.
    pub fn list(&self) -> impl Iterator<Item = (TableId, &Table)> {
        self.entries.iter().map(|(id, t)| (*id, t))
    }

    pub fn find_by_name(&self, name: &str) -> Option<TableId> {
        self.entries
            .iter()
            .find(|(_, t)| t.name == name)
            .map(|(id, _)| *id)
    }

    pub fn contains(&self, id: TableId) -> bool {
        self.position(id).is_ok()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, id: TableId) -> EngineResult<usize> {
        self.entries
            .iter()
            .position(|(i, _)| *i == id)
            .ok_or(EngineError::UnknownTable(id))
    }

    // -- Operations over registered tables --

    /// Merge `right` into `left`. `right` leaves the registry only when the
    /// merge succeeds.
    pub fn merge_tables(
        &mut self,
        left: TableId,
        right: TableId,
        combine: bool,
        threshold_khz: f64,
    ) -> EngineResult<()> {
        if left == right {
            return Err(EngineError::Validation("cannot merge a table into itself".into()));
        }
        let right_table = self.get(right)?.clone();
        self.update(left, |t| merge::merge(t, right_table, combine, threshold_khz))?;
        self.remove(right)?;
        Ok(())
    }

    /// Extract peaks from `id` into a new registered table.
    pub fn pick_peaks(&mut self, id: TableId, name: &str, params: PeakParams) -> EngineResult<TableId> {
        let peaks = peaks::pick_peaks(self.get(id)?, name, params)?;
        Ok(self.add(peaks))
    }

    pub fn derive_ratios(
        &mut self,
        id: TableId,
        reference: &str,
    ) -> EngineResult<BTreeMap<String, String>> {
        self.update(id, |t| ratio::derive_ratios(t, reference))
    }

    /// Partition `target` against `reference` and register the results.
    pub fn remove_near(
        &mut self,
        target: TableId,
        reference: TableId,
        params: ProximityParams,
    ) -> EngineResult<ProximityIds> {
        let reference_table = self.get(reference)?.clone();
        let outcome = if params.add_back {
            self.update(target, |t| proximity::remove_near(t, &reference_table, params))?
        } else {
            let mut scratch = self.get(target)?.clone();
            proximity::remove_near(&mut scratch, &reference_table, params)?
        };

        let kept = self.add(outcome.kept);
        let removed = outcome.removed.map(|t| self.add(t));
        Ok(ProximityIds { kept, removed })
    }

    pub fn duplicate(&mut self, id: TableId) -> EngineResult<TableId> {
        let copy = self.get(id)?.duplicate();
        Ok(self.add(copy))
    }

    /// Move `columns` of `id` into a new registered table.
    pub fn split(&mut self, id: TableId, columns: &[String]) -> EngineResult<TableId> {
        let split = self.update(id, |t| t.split_off(columns))?;
        Ok(self.add(split))
    }

    /// Hand a table to a caller-supplied transform and register its result
    /// as `"<name> (mod)"`.
    ///
    /// The transform receives the table, its display axis and `column`. Any
    /// error it returns is reported as [`EngineError::External`] and leaves
    /// the registry untouched.
    pub fn apply_external<F>(&mut self, id: TableId, column: &str, transform: F) -> EngineResult<TableId>
    where
        F: FnOnce(&Table, &str, &str) -> anyhow::Result<Table>,
    {
        let source = self.get(id)?;
        let mut result =
            transform(source, source.display_axis(), column).map_err(EngineError::External)?;
        result.name = format!("{} (mod)", source.name);
        Ok(self.add(result))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::data::model::tests::{table, FREQ};
    use crate::data::model::Column;

    fn recording_registry() -> (TableRegistry, Rc<RefCell<Vec<RegistryEvent>>>) {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        let mut reg = TableRegistry::new();
        reg.set_on_change(move |e| sink.borrow_mut().push(e));
        (reg, events)
    }

    #[test]
    fn add_and_remove_notify_the_observer() {
        let (mut reg, events) = recording_registry();
        let id = reg.add(table("a", &[(FREQ, &[1.0]), ("I", &[1.0])]));
        assert_eq!(reg.len(), 1);
        let removed = reg.remove(id).unwrap();
        assert_eq!(removed.name, "a");
        assert!(reg.is_empty());
        assert_eq!(
            *events.borrow(),
            vec![RegistryEvent::Added(id), RegistryEvent::Removed(id)]
        );
        assert!(matches!(reg.remove(id), Err(EngineError::UnknownTable(_))));
    }

    #[test]
    fn list_keeps_insertion_order() {
        let mut reg = TableRegistry::new();
        reg.add(table("b", &[(FREQ, &[1.0])]));
        reg.add(table("a", &[(FREQ, &[1.0])]));
        let names: Vec<_> = reg.list().map(|(_, t)| t.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert!(reg.find_by_name("a").is_some());
    }

    #[test]
    fn merge_consumes_the_right_table_only_on_success() {
        let mut reg = TableRegistry::new();
        let left = reg.add(table("l", &[(FREQ, &[1.0, 2.0]), ("A", &[1.0, 2.0])]));
        let right = reg.add(table("r", &[(FREQ, &[1.5]), ("B", &[3.0])]));
        let unsorted = reg.add(table("u", &[(FREQ, &[2.0, 1.0]), ("C", &[0.0, 0.0])]));

        assert!(reg.merge_tables(left, unsorted, false, 0.0).is_err());
        assert!(reg.contains(unsorted));

        reg.merge_tables(left, right, false, 0.0).unwrap();
        assert!(!reg.contains(right));
        assert_eq!(reg.get(left).unwrap().frequencies(), &[1.0, 1.5, 2.0]);
    }

    #[test]
    fn remove_near_registers_kept_and_removed_tables() {
        let mut reg = TableRegistry::new();
        let target = reg.add(table(
            "scan",
            &[(FREQ, &[1.0, 1.005, 1.02, 2.0]), ("I", &[1.0, 2.0, 3.0, 4.0])],
        ));
        let reference = reg.add(table("lines", &[(FREQ, &[1.004]), ("S", &[1.0])]));
        let ids = reg
            .remove_near(
                target,
                reference,
                ProximityParams {
                    threshold_khz: 8.0,
                    return_removed: true,
                    add_back: false,
                },
            )
            .unwrap();
        assert_eq!(reg.get(ids.kept).unwrap().name, "scan - lines");
        let removed = ids.removed.unwrap();
        assert_eq!(reg.get(removed).unwrap().name, "scan (removed)");
        // Without add-back the target is untouched.
        assert_eq!(reg.get(target).unwrap().columns().len(), 2);
    }

    #[test]
    fn external_transform_results_are_registered_with_a_suffix() {
        let mut reg = TableRegistry::new();
        let id = reg.add(table("t", &[(FREQ, &[1.0, 2.0]), ("I", &[2.0, 4.0])]));
        let new_id = reg
            .apply_external(id, "I", |t, x, col| {
                let halved = t.require_column(col)?.iter().map(|v| v / 2.0).collect();
                Ok(Table::from_columns(
                    "ignored",
                    vec![
                        Column::new(x, t.require_column(x)?.to_vec()),
                        Column::new(col, halved),
                    ],
                    x,
                )?)
            })
            .unwrap();
        let result = reg.get(new_id).unwrap();
        assert_eq!(result.name, "t (mod)");
        assert_eq!(result.column("I").unwrap(), &[1.0, 2.0]);
    }

    #[test]
    fn failing_external_transform_leaves_the_registry_alone() {
        let mut reg = TableRegistry::new();
        let id = reg.add(table("t", &[(FREQ, &[1.0])]));
        let err = reg
            .apply_external(id, "I", |_, _, _| Err(anyhow::anyhow!("plugin exploded")))
            .unwrap_err();
        assert!(matches!(err, EngineError::External(_)));
        assert_eq!(reg.len(), 1);
    }
}
