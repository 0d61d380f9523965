// Presentation layer: chart and card view models for the dashboard

use serde::Serialize;

use crate::record::SalesRecord;

/// Numeric field a chart reads from each record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    UnitsSold,
    Revenue,
}

impl Metric {
    pub fn title(&self) -> &str {
        match self {
            Metric::UnitsSold => "Units Sold",
            Metric::Revenue => "Revenue",
        }
    }

    pub fn read(&self, record: &SalesRecord) -> f64 {
        match self {
            Metric::UnitsSold => record.units_sold as f64,
            Metric::Revenue => record.revenue,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chart {
    pub title: String,
    pub metric: Metric,
    pub bars: Vec<Bar>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryCard {
    pub item_name: String,
    pub category: String,
    pub units_sold: i64,
    pub revenue: f64,
}

impl From<&SalesRecord> for SummaryCard {
    fn from(record: &SalesRecord) -> Self {
        Self {
            item_name: record.item_name.clone(),
            category: record.category.clone(),
            units_sold: record.units_sold,
            revenue: record.revenue,
        }
    }
}

/// Everything the dashboard page draws
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub units_chart: Chart,
    pub revenue_chart: Chart,
    pub cards: Vec<SummaryCard>,
}

fn chart(metric: Metric, view: &[SalesRecord]) -> Chart {
    Chart {
        title: metric.title().to_string(),
        metric,
        bars: view
            .iter()
            .map(|record| Bar {
                label: record.item_name.clone(),
                value: metric.read(record),
            })
            .collect(),
    }
}

/// Build the dashboard from an already filtered view
pub fn render(view: &[SalesRecord]) -> DashboardView {
    DashboardView {
        units_chart: chart(Metric::UnitsSold, view),
        revenue_chart: chart(Metric::Revenue, view),
        cards: view.iter().map(SummaryCard::from).collect(),
    }
}
