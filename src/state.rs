use std::cell::Cell;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::color::SeriesColors;
use crate::data::loader;
use crate::data::model::Table;
use crate::data::ratio::BandMode;
use crate::data::registry::{TableId, TableRegistry};
use crate::settings::AppSettings;

// ---------------------------------------------------------------------------
// Operation window forms
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MergeForm {
    pub right: Option<TableId>,
    pub combine: bool,
    pub threshold_khz: f64,
}

#[derive(Debug, Clone)]
pub struct PeakForm {
    pub name: String,
    pub resolution_mhz: f64,
    pub intensity_min: f64,
    pub intensity_max: f64,
}

#[derive(Debug, Clone, Default)]
pub struct RatioForm {
    pub reference: String,
    pub target: f64,
    pub margin: f64,
    pub mode: BandMode,
}

#[derive(Debug, Clone)]
pub struct ProximityForm {
    pub reference: Option<TableId>,
    pub threshold_khz: f64,
    pub return_removed: bool,
    pub add_back: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RowFilterForm {
    pub column: String,
    pub expression: String,
    pub whole_row: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ModifyForm {
    pub column: String,
    pub expression: String,
}

#[derive(Debug, Clone, Default)]
pub struct ColumnsForm {
    pub split: BTreeSet<String>,
    pub rename_from: String,
    pub rename_to: String,
}

#[derive(Debug, Clone, Default)]
pub struct TransformForm {
    pub column: String,
    pub transform: usize,
}

/// The operation window currently open, with its inputs.
#[derive(Debug, Clone, Default)]
pub enum ActiveDialog {
    #[default]
    None,
    Merge(MergeForm),
    Peaks(PeakForm),
    Ratio(RatioForm),
    Proximity(ProximityForm),
    RowFilter(RowFilterForm),
    Modify(ModifyForm),
    Columns(ColumnsForm),
    Transform(TransformForm),
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    /// Every open table.
    pub registry: TableRegistry,

    /// Table the operation windows act on.
    pub selected: Option<TableId>,

    /// Colour of each plotted series (rebuilt on registry changes).
    pub colors: SeriesColors,

    pub settings: AppSettings,

    pub dialog: ActiveDialog,

    /// Show the data grid of the selected table under the plot.
    pub show_table: bool,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,

    /// Where the next viewport screenshot goes.
    pub pending_screenshot: Option<PathBuf>,

    /// Set by the registry callback, cleared by [`AppState::refresh`].
    changed: Rc<Cell<bool>>,
}

impl AppState {
    pub fn new(settings: AppSettings) -> Self {
        let changed = Rc::new(Cell::new(false));
        let flag = Rc::clone(&changed);
        let mut registry = TableRegistry::new();
        registry.set_on_change(move |event| {
            log::debug!("registry event {event:?}");
            flag.set(true);
        });

        Self {
            registry,
            selected: None,
            colors: SeriesColors::default(),
            settings,
            dialog: ActiveDialog::None,
            show_table: false,
            status_message: None,
            pending_screenshot: None,
            changed,
        }
    }

    /// Rebuild derived view state after the registry changed.
    pub fn refresh(&mut self) {
        if !self.changed.replace(false) {
            return;
        }
        self.colors = SeriesColors::for_tables(self.registry.list().map(|(_, t)| t));
        if let Some(id) = self.selected {
            if !self.registry.contains(id) {
                self.selected = None;
            }
        }
        if self.selected.is_none() {
            self.selected = self.registry.list().last().map(|(id, _)| id);
        }
    }

    pub fn selected_table(&self) -> Option<&Table> {
        self.selected.and_then(|id| self.registry.get(id).ok())
    }

    /// Load a file and register it as a new table.
    pub fn open_file(&mut self, path: &Path) {
        match loader::load_file(path, &self.settings.frequency_axis) {
            Ok(table) => {
                if self.registry.find_by_name(&table.name).is_some() {
                    log::warn!("a table named '{}' is already open", table.name);
                }
                let id = self.registry.add(table);
                self.selected = Some(id);
                self.status_message = None;
            }
            Err(e) => self.fail(e),
        }
    }

    /// Show a successful outcome, or report the error. Returns the value on
    /// success.
    pub fn report<T, E>(&mut self, result: Result<T, E>, done: impl FnOnce(&T) -> String) -> Option<T>
    where
        E: Into<anyhow::Error>,
    {
        match result {
            Ok(value) => {
                self.status_message = Some(done(&value));
                Some(value)
            }
            Err(e) => {
                self.fail(e.into());
                None
            }
        }
    }

    pub fn fail(&mut self, error: anyhow::Error) {
        log::error!("{error:#}");
        self.status_message = Some(format!("Error: {error:#}"));
    }

    // -- Opening operation windows pre-filled from the settings --

    pub fn open_merge(&mut self) {
        self.dialog = ActiveDialog::Merge(MergeForm {
            right: None,
            combine: false,
            threshold_khz: self.settings.merge_threshold_khz,
        });
    }

    pub fn open_peaks(&mut self) {
        let name = self
            .selected_table()
            .map_or_else(|| "peaks".to_string(), |t| format!("{} (peaks)", t.name));
        self.dialog = ActiveDialog::Peaks(PeakForm {
            name,
            resolution_mhz: self.settings.peak_resolution_mhz,
            intensity_min: self.settings.peak_intensity_min,
            intensity_max: self.settings.peak_intensity_max,
        });
    }

    pub fn open_proximity(&mut self) {
        self.dialog = ActiveDialog::Proximity(ProximityForm {
            reference: None,
            threshold_khz: self.settings.proximity_threshold_khz,
            return_removed: true,
            add_back: false,
        });
    }
}
