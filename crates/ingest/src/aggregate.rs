use std::collections::BTreeMap;

use crate::model::{OperationStatus, Urgency, WorkCenterSummary, WorkItem};

impl Urgency {
    /// Backlog severity relative to plan. Boundaries fall to the lower tier:
    /// a ratio of exactly 0.5 is High, exactly 0.2 is Normal.
    pub fn classify(remaining: f64, planned: f64) -> Urgency {
        if planned == 0.0 {
            return Urgency::Normal;
        }
        let ratio = remaining / planned;
        if ratio > 0.5 {
            Urgency::Critical
        } else if ratio > 0.2 {
            Urgency::High
        } else {
            Urgency::Normal
        }
    }
}

/// Actual over planned as a whole percentage. A zero plan is treated as 1 hour.
pub fn efficiency_percent(actual: f64, planned: f64) -> i64 {
    let denominator = if planned == 0.0 { 1.0 } else { planned };
    (actual / denominator * 100.0).round_ties_even() as i64
}

#[derive(Default)]
struct Totals {
    count: usize,
    planned: f64,
    actual: f64,
    remaining: f64,
    ready: usize,
    not_started: usize,
}

/// Group by work center, sum hours, classify urgency. Sorted by work center.
pub fn aggregate<T: WorkItem>(items: &[T]) -> Vec<WorkCenterSummary> {
    let mut groups: BTreeMap<&str, Totals> = BTreeMap::new();

    for item in items {
        let entry = groups.entry(item.work_center()).or_default();
        entry.count += 1;
        entry.planned += item.planned_hours();
        entry.actual += item.actual_hours();
        entry.remaining += item.remaining_work();
        match item.status() {
            Some(OperationStatus::Ready) => entry.ready += 1,
            Some(OperationStatus::NotStarted) => entry.not_started += 1,
            _ => {}
        }
    }

    groups
        .into_iter()
        .map(|(work_center, t)| WorkCenterSummary {
            work_center: work_center.to_string(),
            job_count: t.count,
            planned_hours: t.planned,
            actual_hours: t.actual,
            backlog_hours: t.remaining,
            urgency: Urgency::classify(t.remaining, t.planned),
            available_work: t.ready,
            backlog_count: t.not_started,
            efficiency: efficiency_percent(t.actual, t.planned),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NormalizedRow;

    struct Item {
        wc: &'static str,
        planned: f64,
        actual: f64,
        status: Option<OperationStatus>,
    }

    impl WorkItem for Item {
        fn work_center(&self) -> &str {
            self.wc
        }
        fn planned_hours(&self) -> f64 {
            self.planned
        }
        fn actual_hours(&self) -> f64 {
            self.actual
        }
        fn status(&self) -> Option<OperationStatus> {
            self.status
        }
    }

    fn item(wc: &'static str, planned: f64, actual: f64, status: OperationStatus) -> Item {
        Item { wc, planned, actual, status: Some(status) }
    }

    #[test]
    fn urgency_boundaries() {
        assert_eq!(Urgency::classify(50.0, 100.0), Urgency::High);
        assert_eq!(Urgency::classify(50.0001, 100.0), Urgency::Critical);
        assert_eq!(Urgency::classify(20.0, 100.0), Urgency::Normal);
        assert_eq!(Urgency::classify(20.5, 100.0), Urgency::High);
        assert_eq!(Urgency::classify(0.0, 0.0), Urgency::Normal);
        assert_eq!(Urgency::classify(30.0, 0.0), Urgency::Normal);
    }

    #[test]
    fn efficiency_guards_zero_plan() {
        assert_eq!(efficiency_percent(0.0, 0.0), 0);
        assert_eq!(efficiency_percent(3.0, 0.0), 300);
        assert_eq!(efficiency_percent(12.0, 10.0), 120);
        assert_eq!(efficiency_percent(1.0, 3.0), 33);
    }

    #[test]
    fn efficiency_rounds_half_to_even() {
        // 0.125 and 0.375 are exact in binary: 12.5% and 37.5%
        assert_eq!(efficiency_percent(1.0, 8.0), 12);
        assert_eq!(efficiency_percent(3.0, 8.0), 38);
    }

    #[test]
    fn groups_by_work_center() {
        let items = vec![
            item("MILL", 10.0, 2.0, OperationStatus::NotStarted),
            item("LATHE", 4.0, 4.0, OperationStatus::Completed),
            item("MILL", 6.0, 8.0, OperationStatus::Ready),
            item("MILL", 4.0, 0.0, OperationStatus::InProgress),
        ];
        let summaries = aggregate(&items);
        assert_eq!(summaries.len(), 2);

        let lathe = &summaries[0];
        assert_eq!(lathe.work_center, "LATHE");
        assert_eq!(lathe.job_count, 1);
        assert_eq!(lathe.backlog_hours, 0.0);
        assert_eq!(lathe.urgency, Urgency::Normal);
        assert_eq!(lathe.efficiency, 100);

        let mill = &summaries[1];
        assert_eq!(mill.job_count, 3);
        assert_eq!(mill.planned_hours, 20.0);
        assert_eq!(mill.actual_hours, 10.0);
        // 8 + 0 (clamped) + 4
        assert_eq!(mill.backlog_hours, 12.0);
        assert_eq!(mill.urgency, Urgency::Critical);
        assert_eq!(mill.available_work, 1);
        assert_eq!(mill.backlog_count, 1);
        assert_eq!(mill.efficiency, 50);
    }

    #[test]
    fn zero_planned_group_is_normal_with_zero_efficiency() {
        let items = vec![item("QA", 0.0, 0.0, OperationStatus::NotStarted)];
        let s = &aggregate(&items)[0];
        assert_eq!(s.urgency, Urgency::Normal);
        assert_eq!(s.efficiency, 0);
    }

    #[test]
    fn normalized_rows_have_no_workflow_counts() {
        let rows = vec![NormalizedRow {
            source_row: 1,
            job_number: "J1".into(),
            work_order_number: "J1".into(),
            operation_number: 10,
            work_center: "WELD".into(),
            description: None,
            planned_hours: 10.0,
            actual_hours: 7.0,
        }];
        let s = &aggregate(&rows)[0];
        assert_eq!(s.job_count, 1);
        assert_eq!(s.backlog_hours, 3.0);
        assert_eq!(s.urgency, Urgency::High);
        assert_eq!(s.available_work, 0);
        assert_eq!(s.backlog_count, 0);
        assert_eq!(s.efficiency, 70);
    }

    #[test]
    fn empty_input_yields_no_summaries() {
        let items: Vec<Item> = Vec::new();
        assert!(aggregate(&items).is_empty());
    }
}
