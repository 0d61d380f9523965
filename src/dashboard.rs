// Client data store: dataset, filter and filtered view for one dashboard session

use tracing::warn;

use crate::error::NetworkFailure;
use crate::filter::{filter_records, FilterSelection};
use crate::record::SalesRecord;
use crate::view::{render, DashboardView};

/// Dashboard session state
///
/// The raw dataset and the filtered view are updated independently: an
/// upload replaces the dataset, a filter change recomputes the view.
#[derive(Debug, Default)]
pub struct DashboardStore {
    dataset: Vec<SalesRecord>,
    view: Vec<SalesRecord>,
    selection: FilterSelection,
    loading: bool,
}

impl DashboardStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// An upload request has been sent
    pub fn begin_upload(&mut self) {
        self.loading = true;
    }

    /// The upload request finished
    ///
    /// A failure is logged and otherwise ignored; the previous dataset stays.
    pub fn complete_upload(&mut self, outcome: Result<Vec<SalesRecord>, NetworkFailure>) {
        match outcome {
            Ok(dataset) => self.dataset = dataset,
            Err(e) => warn!(error = %e, "upload failed"),
        }
        self.loading = false;
    }

    pub fn set_filter(&mut self, selection: FilterSelection) {
        self.view = filter_records(&self.dataset, &selection);
        self.selection = selection;
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn dataset(&self) -> &[SalesRecord] {
        &self.dataset
    }

    pub fn view(&self) -> &[SalesRecord] {
        &self.view
    }

    pub fn selection(&self) -> &FilterSelection {
        &self.selection
    }

    pub fn render(&self) -> DashboardView {
        render(&self.view)
    }
}
