use std::collections::BTreeMap;

use crate::model::{OperationStatus, WorkCenterForecast, WorkItem};

/// Ratio of actual to planned hours over completed items.
///
/// `None` when nothing is completed. Completed work with zero planned hours
/// gives a factor of 0 rather than a division by zero.
pub fn efficiency_factor<T: WorkItem>(items: &[T]) -> Option<f64> {
    let mut planned = 0.0;
    let mut actual = 0.0;
    let mut completed = 0usize;

    for item in items.iter().filter(|i| is_completed(*i)) {
        planned += item.planned_hours();
        actual += item.actual_hours();
        completed += 1;
    }

    if completed == 0 {
        return None;
    }
    if planned == 0.0 {
        log::warn!(
            "{completed} completed operation(s) carry no planned hours; using efficiency factor 0"
        );
        return Some(0.0);
    }
    Some(actual / planned)
}

/// Projected hours still to spend on the incomplete items.
///
/// With no completed history the plan is taken at face value and the full
/// planned total is returned.
pub fn forecast<T: WorkItem>(items: &[T]) -> f64 {
    if items.is_empty() {
        return 0.0;
    }

    let Some(factor) = efficiency_factor(items) else {
        return items.iter().map(|i| i.planned_hours()).sum();
    };

    let projected: f64 = items
        .iter()
        .filter(|i| !is_completed(*i))
        .map(|i| i.planned_hours() * factor)
        .sum();
    round2(projected)
}

/// Per-work-center planned/actual/remaining totals with a forecast.
pub fn forecast_report<T: WorkItem>(items: &[T]) -> Vec<WorkCenterForecast> {
    let mut groups: BTreeMap<&str, Vec<&T>> = BTreeMap::new();
    for item in items {
        groups.entry(item.work_center()).or_default().push(item);
    }

    groups
        .into_iter()
        .map(|(work_center, group)| WorkCenterForecast {
            work_center: work_center.to_string(),
            planned: group.iter().map(|i| i.planned_hours()).sum(),
            actual: group.iter().map(|i| i.actual_hours()).sum(),
            remaining: group.iter().map(|i| i.remaining_work()).sum(),
            forecasted: forecast(&group),
        })
        .collect()
}

fn is_completed<T: WorkItem>(item: &T) -> bool {
    item.status() == Some(OperationStatus::Completed)
}

/// Two decimals, ties to even.
fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}
