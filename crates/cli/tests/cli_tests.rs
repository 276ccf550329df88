// CLI contract tests: exit codes and JSON output.
// Run with: cargo test -p shopflow-cli --test cli_tests

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

struct Shop {
    dir: TempDir,
}

impl Shop {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "").unwrap();
        Self { dir }
    }

    fn db(&self) -> PathBuf {
        self.dir.path().join("shop.db")
    }

    /// Runs with an isolated database and an empty config file.
    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_shopflow"))
            .current_dir(env!("CARGO_MANIFEST_DIR"))
            .env_remove("RUST_LOG")
            .env("SHOPFLOW_DB", self.db())
            .env("SHOPFLOW_CONFIG", self.dir.path().join("config.toml"))
            .args(args)
            .output()
            .expect("run shopflow")
    }

    fn json(&self, args: &[&str]) -> serde_json::Value {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "{args:?} exited {:?}: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).expect("valid JSON on stdout")
    }
}

fn fixture(name: &str) -> String {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
        .to_string_lossy()
        .into_owned()
}

fn operation_id(shop: &Shop, work_center: &str) -> i64 {
    let jobs = shop.json(&["jobs", "--json"]);
    for job in jobs.as_array().unwrap() {
        for wo in job["work_orders"].as_array().unwrap() {
            for op in wo["operations"].as_array().unwrap() {
                if op["work_center"] == work_center {
                    return op["id"].as_i64().unwrap();
                }
            }
        }
    }
    panic!("no operation at {work_center}");
}

// ---------------------------------------------------------------------------
// ingest
// ---------------------------------------------------------------------------

#[test]
fn ingest_reports_created_and_skipped_rows() {
    let shop = Shop::new();
    let report = shop.json(&["ingest", &fixture("sapdata.csv"), "--json"]);

    assert_eq!(report["rows_read"], 9);
    assert_eq!(report["created"], 6);
    assert_eq!(report["updated"], 0);
    assert_eq!(report["skipped"].as_array().unwrap().len(), 3);
    assert!(report["errors"].as_array().unwrap().is_empty());
    assert!(shop.db().exists());
}

#[test]
fn reingest_updates_instead_of_duplicating() {
    let shop = Shop::new();
    shop.json(&["ingest", &fixture("sapdata.csv"), "--json"]);
    let again = shop.json(&["ingest", &fixture("sapdata.csv"), "--json"]);
    assert_eq!(again["created"], 0);
    assert_eq!(again["updated"], 6);

    let jobs = shop.json(&["jobs", "--json"]);
    assert_eq!(jobs.as_array().unwrap().len(), 3);
}

#[test]
fn missing_columns_exit_with_schema_code() {
    let shop = Shop::new();
    let output = shop.run(&["ingest", &fixture("renamed.csv")]);
    assert_eq!(output.status.code(), Some(4));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("missing required column"), "stderr: {stderr}");
    assert!(stderr.contains("renamed.csv"), "stderr: {stderr}");
    assert!(stderr.contains("under [columns]"), "stderr: {stderr}");
    assert!(!shop.db().exists() || shop.json(&["jobs", "--json"]).as_array().unwrap().is_empty());
}

#[test]
fn config_aliases_map_renamed_headers() {
    let shop = Shop::new();
    let output = shop.run(&[
        "ingest",
        &fixture("renamed.csv"),
        "--config",
        &fixture("renamed.shop.toml"),
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let summaries = shop.json(&["report", "--json"]);
    let names: Vec<&str> = summaries
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["work_center"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["GRIND", "WELD"]);
}

#[test]
fn failed_rows_exit_with_row_error_code() {
    let shop = Shop::new();
    let output = shop.run(&["ingest", &fixture("conflict.csv"), "--json"]);
    assert_eq!(output.status.code(), Some(3));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["created"], 2);
    let errors = report["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["source_row"], 2);
    assert_eq!(errors[0]["raw"]["Order"], "J2");
}

#[test]
fn unreadable_input_exits_with_input_code() {
    let shop = Shop::new();
    let output = shop.run(&["ingest", "does/not/exist.csv"]);
    assert_eq!(output.status.code(), Some(6));
}

#[test]
fn explicit_missing_config_is_an_input_error() {
    let shop = Shop::new();
    let output = shop.run(&["report", "--config", "does/not/exist.toml"]);
    assert_eq!(output.status.code(), Some(6));
}

// ---------------------------------------------------------------------------
// analyze
// ---------------------------------------------------------------------------

#[test]
fn analyze_writes_csv_and_leaves_database_alone() {
    let shop = Shop::new();
    let out = shop.dir.path().join("summary.csv");
    let analysis = shop.json(&[
        "analyze",
        &fixture("sapdata.csv"),
        "--json",
        "--csv",
        out.to_str().unwrap(),
    ]);

    assert_eq!(analysis["rows_read"], 9);
    assert_eq!(analysis["rows_valid"], 6);
    assert_eq!(analysis["skipped"]["missing_work_center"], 1);

    let mill = analysis["work_centers"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["work_center"] == "MILL")
        .unwrap();
    assert_eq!(mill["urgency"], "critical");
    assert_eq!(mill["efficiency"], 25);

    let csv = std::fs::read_to_string(&out).unwrap();
    assert!(csv.contains("MILL,2,12.00,3.00,9.00,Critical,0,0,25"), "csv: {csv}");
    assert!(!shop.db().exists());
}

// ---------------------------------------------------------------------------
// workflow
// ---------------------------------------------------------------------------

#[test]
fn completing_work_drives_forecast() {
    let shop = Shop::new();
    shop.json(&["ingest", &fixture("sapdata.csv"), "--json"]);

    let lathe = operation_id(&shop, "LATHE");
    let output = shop.run(&["status", &lathe.to_string(), "Completed"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let forecast = shop.json(&["forecast", "--json"]);
    let lathe_forecast = forecast["work_centers"]
        .as_array()
        .unwrap()
        .iter()
        .find(|f| f["work_center"] == "LATHE")
        .unwrap();
    // Only operation is completed: nothing left to forecast
    assert_eq!(lathe_forecast["forecasted"], 0.0);

    let report = shop.json(&["report", "--json"]);
    let saw = report
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["work_center"] == "SAW")
        .unwrap();
    assert_eq!(saw["backlog_count"], 2);
}

#[test]
fn forecast_total_sums_per_center_forecasts() {
    let shop = Shop::new();
    shop.json(&["ingest", &fixture("sapdata.csv"), "--json"]);

    // MILL gets completed history; LATHE has none and keeps its plan
    let mill = operation_id(&shop, "MILL");
    let output = shop.run(&["status", &mill.to_string(), "completed"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let forecast = shop.json(&["forecast", "--json"]);
    let centers = forecast["work_centers"].as_array().unwrap();
    let lathe = centers.iter().find(|f| f["work_center"] == "LATHE").unwrap();
    assert_eq!(lathe["forecasted"], 6.0);

    let sum: f64 = centers.iter().map(|f| f["forecasted"].as_f64().unwrap()).sum();
    let total = forecast["total_forecasted"].as_f64().unwrap();
    assert!((total - sum).abs() < 1e-9, "total {total} vs sum {sum}");
}

#[test]
fn schedule_and_list() {
    let shop = Shop::new();
    shop.json(&["ingest", &fixture("sapdata.csv"), "--json"]);
    let paint = operation_id(&shop, "PAINT");

    let op = shop.json(&["schedule", &paint.to_string(), "2026-11-02", "--json"]);
    assert_eq!(op["scheduled_date"], "2026-11-02");

    let events = shop.json(&["schedule", "--list", "--json"]);
    let events = events.as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["title"], "4001004 - Op 10");
    assert_eq!(events[0]["start"], "2026-11-02");
}

#[test]
fn bad_date_is_a_usage_error() {
    let shop = Shop::new();
    let output = shop.run(&["schedule", "1", "02/11/2026"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn bad_status_and_unknown_ids() {
    let shop = Shop::new();
    shop.json(&["ingest", &fixture("sapdata.csv"), "--json"]);

    assert_eq!(shop.run(&["status", "1", "finished"]).status.code(), Some(2));
    assert_eq!(shop.run(&["status", "9999", "ready"]).status.code(), Some(7));
    assert_eq!(shop.run(&["delete-job", "nope"]).status.code(), Some(7));
}

#[test]
fn delete_job_cascades() {
    let shop = Shop::new();
    shop.json(&["ingest", &fixture("sapdata.csv"), "--json"]);

    let output = shop.run(&["delete-job", "4001001"]);
    assert!(output.status.success());

    let jobs = shop.json(&["jobs", "--json"]);
    let numbers: Vec<&str> = jobs
        .as_array()
        .unwrap()
        .iter()
        .map(|j| j["job_number"].as_str().unwrap())
        .collect();
    assert_eq!(numbers, vec!["4001002", "4001004"]);

    let report = shop.json(&["report", "--json"]);
    assert!(report.as_array().unwrap().iter().all(|s| s["work_center"] != "MILL"));
}
