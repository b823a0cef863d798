mod common;

use agri_normalize::quality::QualityReport;
use common::{TestWorkspace, bin, fixture_path, fixture_str};
use predicates::prelude::*;
use predicates::str::contains;

#[test]
fn normalize_production_writes_canonical_csv_to_stdout() {
    let output = bin()
        .args([
            "normalize",
            "-i",
            &fixture_str("production_records.json"),
            "--dataset",
            "production",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf-8 output");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines[0],
        "state_name,district_name,year,season,crop,area_ha,production_tonne"
    );
    assert_eq!(lines.len(), 1 + 9);
    assert!(text.contains("Odisha,Puri,2003,Kharif,Rice,"));
    assert!(text.contains("Gujarat,Surat,2005,Kharif,Cotton,"));
    assert!(text.contains("Maharashtra,Pune,2008,Kharif,Jowar,,"));
    assert!(!text.contains("Mysore"));
}

#[test]
fn normalize_writes_quality_report_and_output_file() {
    let workspace = TestWorkspace::new();
    let out = workspace.join("production.csv");
    let report = workspace.join("report.json");
    bin()
        .args([
            "normalize",
            "-i",
            &fixture_str("production_records.json"),
            "-d",
            "production",
            "-o",
            out.to_str().unwrap(),
            "--report",
            report.to_str().unwrap(),
        ])
        .assert()
        .success();

    let parsed: QualityReport =
        serde_json::from_str(&workspace.read("report.json")).expect("report json");
    assert_eq!(parsed.record_count, 9);
    assert!(parsed.is_acceptable(0.7));
    assert!(parsed.issues.is_empty());
    assert_eq!(workspace.read("production.csv").lines().count(), 10);
}

#[test]
fn no_canonicalize_keeps_source_spellings() {
    bin()
        .args([
            "normalize",
            "-i",
            &fixture_str("production_records.json"),
            "-d",
            "production",
            "--no-canonicalize",
        ])
        .assert()
        .success()
        .stdout(contains("Orissa,Puri,2003,Kharif,Paddy,"));
}

#[test]
fn normalize_rainfall_sums_months() {
    bin()
        .args([
            "normalize",
            "-i",
            &fixture_str("rainfall_monthly.json"),
            "-d",
            "rainfall",
        ])
        .assert()
        .success()
        .stdout(contains("subdivision_name,year,rainfall_mm"))
        .stdout(contains("Kerala,1990,2950"))
        .stdout(contains("Vidarbha,2000,940"))
        .stdout(contains("Kerala,1991").not());
}

#[test]
fn normalize_state_rainfall_aggregates_subdivisions() {
    bin()
        .args([
            "normalize",
            "-i",
            &fixture_str("rainfall_monthly.json"),
            "-d",
            "state-rainfall",
        ])
        .assert()
        .success()
        .stdout(contains("state_name,year,rainfall_mm"))
        .stdout(contains("Maharashtra,2000,1593.33"))
        .stdout(contains("Atlantis").not());
}

#[test]
fn drifted_csv_is_normalized_through_aliases() {
    bin()
        .args([
            "normalize",
            "-i",
            &fixture_str("production_drifted.csv"),
            "-d",
            "production",
            "--preview",
            "2",
        ])
        .assert()
        .success()
        .stdout(contains("Odisha,Puri,2003,Kharif,Rice,"))
        .stderr(contains("state_name"));
}

#[test]
fn map_reports_resolved_columns_as_json() {
    bin()
        .args([
            "map",
            "-i",
            &fixture_str("production_drifted.csv"),
            "--domain",
            "production",
            "--json",
        ])
        .assert()
        .success()
        .stdout(contains(r#""state": "State Name""#))
        .stdout(contains(r#""year": "Crop_Year""#));
}

#[test]
fn map_table_marks_unresolved_fields() {
    bin()
        .args([
            "map",
            "-i",
            &fixture_str("rainfall_monthly.json"),
            "--domain",
            "rainfall",
        ])
        .assert()
        .success()
        .stdout(contains("subdivision"))
        .stdout(contains("(unresolved)"));
}

#[test]
fn strict_map_failure_names_field_and_columns() {
    let workspace = TestWorkspace::new();
    let input = workspace.write(
        "partial.json",
        r#"[{"state_name": "Punjab", "zone": "north"}]"#,
    );
    bin()
        .args([
            "map",
            "-i",
            input.to_str().unwrap(),
            "--fields",
            "state,rainfall",
            "--strict",
        ])
        .assert()
        .failure()
        .stderr(contains("Required field 'rainfall' not found"))
        .stderr(contains("zone"));
}

#[test]
fn drift_reports_renamed_columns() {
    let workspace = TestWorkspace::new();
    let input = workspace.write(
        "drift.json",
        r#"[{"crop_year": 2001, "state": "Punjab"}]"#,
    );
    bin()
        .args([
            "drift",
            "-i",
            input.to_str().unwrap(),
            "--expected",
            "year,state",
            "--json",
        ])
        .assert()
        .success()
        .stdout(contains(r#""missing": []"#))
        .stdout(contains(r#""extra": []"#))
        .stdout(contains("\"year\",\n      \"crop_year\""));
}

#[test]
fn csv_from_stdin_is_accepted() {
    bin()
        .args(["normalize", "-i", "-", "-d", "production", "--format", "csv"])
        .write_stdin(
            "state_name,district_name,crop_year,season,crop,area_,production_\n\
             Punjab,Ludhiana,2001,Kharif,Rice,,10\n",
        )
        .assert()
        .success()
        .stdout(contains("Punjab,Ludhiana,2001,Kharif,Rice,,10"));
}

#[test]
fn fetch_caches_and_cache_commands_manage_entries() {
    let workspace = TestWorkspace::new();
    let cache_dir = workspace.join("cache");
    let source = fixture_path("source");
    for _ in 0..2 {
        bin()
            .args([
                "fetch",
                "--source",
                source.to_str().unwrap(),
                "-d",
                "production",
                "--state",
                "Punjab",
                "--cache-dir",
                cache_dir.to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(contains("Punjab,Amritsar,2001,Rabi,Wheat,"))
            .stdout(contains("Kerala").not());
    }
    assert_eq!(workspace.json_files("cache"), 1);

    bin()
        .args(["cache", "stats", "--cache-dir", cache_dir.to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains(r#""file_count": 1"#));
    bin()
        .args(["cache", "clear", "--cache-dir", cache_dir.to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains("removed 1"));
    assert_eq!(workspace.json_files("cache"), 0);
}

#[test]
fn fetch_state_rainfall_filters_window_and_state() {
    let workspace = TestWorkspace::new();
    bin()
        .args([
            "fetch",
            "--source",
            fixture_path("source").to_str().unwrap(),
            "-d",
            "state-rainfall",
            "--state",
            "Maharashtra",
            "--year-start",
            "2001",
            "--no-cache",
            "--cache-dir",
            workspace.join("unused").to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(contains("Maharashtra,2001,900"))
        .stdout(contains("Maharashtra,2000").not());
    assert_eq!(workspace.json_files("unused"), 0);
}

#[test]
fn fetch_state_rainfall_requires_state() {
    bin()
        .args([
            "fetch",
            "--source",
            fixture_path("source").to_str().unwrap(),
            "-d",
            "state-rainfall",
            "--no-cache",
        ])
        .assert()
        .failure()
        .stderr(contains("--state is required"));
}

#[test]
fn missing_input_file_fails_with_context() {
    bin()
        .args(["normalize", "-i", "does-not-exist.json", "-d", "rainfall"])
        .assert()
        .failure()
        .stderr(contains("error:"));
}
