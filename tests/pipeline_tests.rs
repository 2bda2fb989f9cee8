use std::fs;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use tempfile::{tempdir, TempDir};

use fa2cf::config::ExportConfig;
use fa2cf::errors::Fa2CfError;
use fa2cf::locate::snapshot_file_name;
use fa2cf::merge::SeriesWriter;
use fa2cf::netcdf_io::{read_values, NcValues};
use fa2cf::pipeline::export_run;
use fa2cf::plan::{build_plan, DuplicatePolicy, SegmentFrequency};
use fa2cf::reader::NetcdfSnapshotReader;
use fa2cf::run::RunDescriptor;
use fa2cf::table::{GlobalAttributes, VariableTable};

fn dt(year: i32, month: u32, day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .expect("valid date")
        .and_hms_opt(hour, 0, 0)
        .expect("valid time")
}

/// Write one synthetic single-timestep snapshot: a 2x3 grid with dimension
/// coordinates, an auxiliary `lat` coordinate and one field whose values
/// encode the forecast hour and the cell index.
fn write_snapshot(path: &Path, hour: i64, field_name: &str, base: f32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create snapshot directory");
    }
    let mut file = netcdf::create(path).expect("Failed to create snapshot file");
    file.add_dimension("time", 1)
        .expect("Failed to add dimension time");
    file.add_dimension("y", 2).expect("Failed to add dimension y");
    file.add_dimension("x", 3).expect("Failed to add dimension x");

    {
        let mut var = file
            .add_variable::<f64>("time", &["time"])
            .expect("Failed to add time");
        var.put_values(&[hour as f64], ..)
            .expect("Failed to write time");
    }
    {
        let mut var = file
            .add_variable::<f64>("y", &["y"])
            .expect("Failed to add y");
        var.put_values(&[10.0, 20.0], ..).expect("Failed to write y");
    }
    {
        let mut var = file
            .add_variable::<f64>("x", &["x"])
            .expect("Failed to add x");
        var.put_values(&[1.0, 2.0, 3.0], ..)
            .expect("Failed to write x");
    }
    {
        let mut var = file
            .add_variable::<f64>("lat", &["y", "x"])
            .expect("Failed to add lat");
        var.put_attribute("units", "degrees_north")
            .expect("Failed to add lat units");
        var.put_values(&[50.0, 50.1, 50.2, 51.0, 51.1, 51.2], ..)
            .expect("Failed to write lat");
    }
    {
        let mut var = file
            .add_variable::<f32>(field_name, &["time", "y", "x"])
            .expect("Failed to add field");
        let values: Vec<f32> = (0..6).map(|i| base + hour as f32 * 10.0 + i as f32).collect();
        var.put_values(&values, ..).expect("Failed to write field");
    }
}

struct Fixture {
    _dir: TempDir,
    run: RunDescriptor,
    cfg: ExportConfig,
}

/// A three-hour run starting 2020-06-01T00 with model snapshots for the
/// given forecast hours, a one-variable table and a global template.
fn setup_run(hours: &[i64]) -> Fixture {
    let dir = tempdir().expect("Failed to create temp dir");
    let run = RunDescriptor::new("test", dt(2020, 6, 1, 0), 3);
    let run_dir = dir.path().join(run.dir_name());

    let snapshot_dir = run_dir.join("output").join("2020").join("06");
    for &hour in hours {
        write_snapshot(
            &snapshot_dir.join(snapshot_file_name("ICMSHABOF+", hour)),
            hour,
            "CLSTEMPERATURE",
            280.0,
        );
    }

    let table_path = dir.path().join("variables.yml");
    fs::write(
        &table_path,
        "tas:\n  fa_name: CLSTEMPERATURE\n  attributes:\n    standard_name: air_temperature\n    units: K\n",
    )
    .expect("Failed to write variable table");
    let globals_path = dir.path().join("globals.yml");
    fs::write(&globals_path, "institution: Test Institute\n").expect("Failed to write attributes");

    let cfg = ExportConfig::for_run_dir(&run_dir, &table_path)
        .with_global_attrs(&globals_path)
        .with_variables(["tas"]);
    Fixture {
        _dir: dir,
        run,
        cfg,
    }
}

fn attr_str(var: &netcdf::Variable, name: &str) -> String {
    match var
        .attribute(name)
        .expect("attribute missing")
        .value()
        .expect("attribute value")
    {
        netcdf::AttributeValue::Str(s) => s,
        other => panic!("expected string attribute, got {:?}", other),
    }
}

fn global_str(file: &netcdf::File, name: &str) -> String {
    match file
        .attribute(name)
        .expect("global attribute missing")
        .value()
        .expect("attribute value")
    {
        netcdf::AttributeValue::Str(s) => s,
        other => panic!("expected string attribute, got {:?}", other),
    }
}

fn scalar_string(file: &netcdf::File, name: &str) -> String {
    let var = file.variable(name).expect("scalar variable missing");
    match read_values(&var).expect("Failed to read scalar") {
        NcValues::Str(s) => s,
        other => panic!("expected string scalar, got {:?}", other),
    }
}

#[test]
fn test_export_run_end_to_end() {
    let fx = setup_run(&[1, 2, 3]);
    let report = export_run(&fx.run, &fx.cfg, &NetcdfSnapshotReader).expect("Failed to export run");

    assert_eq!(report.steps, 3);
    assert_eq!(report.cache_hits, 0);
    assert_eq!(report.raw_files.len(), 1);
    assert_eq!(report.export_files.len(), 1);
    assert!(report.raw_files[0].is_file());

    let export_path = &report.export_files[0];
    assert_eq!(
        export_path.file_name().and_then(|n| n.to_str()),
        Some("test_2020060100_3_tas_2020-06-01T01_2020-06-01T03_3600.nc")
    );

    // One store-cache file per timestep
    for stamp in ["2020-06-01T01", "2020-06-01T02", "2020-06-01T03"] {
        let cache = fx
            .cfg
            .store_dir
            .join("2020")
            .join("06")
            .join(format!("test_2020060100_3_{}.nc", stamp));
        assert!(cache.is_file(), "missing cache file {}", cache.display());
    }

    let file = netcdf::open(export_path).expect("Failed to open export file");

    // The time dimension length equals the plan length exactly
    assert_eq!(file.dimension("time").expect("time dimension").len(), 3);
    assert_eq!(file.dimension("y").expect("y dimension").len(), 2);
    assert_eq!(file.dimension("x").expect("x dimension").len(), 3);
    assert_eq!(file.dimension("bnds").expect("bnds dimension").len(), 2);

    let time = file.variable("time").expect("time variable");
    assert_eq!(
        time.get_values::<f64, _>(..).expect("time values"),
        vec![1.0, 2.0, 3.0]
    );
    assert_eq!(attr_str(&time, "units"), "hours since 2020-06-01 00:00:00");
    assert_eq!(attr_str(&time, "calendar"), "standard");
    assert_eq!(attr_str(&time, "bounds"), "time_bnds");

    let bnds = file.variable("time_bnds").expect("time_bnds variable");
    assert_eq!(
        bnds.get_values::<f64, _>(..).expect("time_bnds values"),
        vec![0.0, 1.0, 1.0, 2.0, 2.0, 3.0]
    );

    let tas = file.variable("tas").expect("tas variable");
    let shape: Vec<usize> = tas.dimensions().iter().map(|d| d.len()).collect();
    assert_eq!(shape, vec![3, 2, 3]);
    let values = tas.get_values::<f32, _>(..).expect("tas values");
    assert_eq!(values.len(), 18);
    assert_eq!(values[0], 290.0); // hour 1, first cell
    assert_eq!(values[17], 315.0); // hour 3, last cell
    assert_eq!(attr_str(&tas, "standard_name"), "air_temperature");
    assert_eq!(attr_str(&tas, "units"), "K");
    assert_eq!(attr_str(&tas, "coordinates"), "lat");

    // Grid coordinates and their attributes survive the merge
    let lat = file.variable("lat").expect("lat variable");
    assert_eq!(attr_str(&lat, "units"), "degrees_north");
    let y = file.variable("y").expect("y variable");
    assert_eq!(
        y.get_values::<f64, _>(..).expect("y values"),
        vec![10.0, 20.0]
    );

    // Global template, conventions and provenance
    assert_eq!(global_str(&file, "institution"), "Test Institute");
    assert_eq!(global_str(&file, "Conventions"), "CF-1.8");
    assert!(global_str(&file, "history").starts_with("Created by fa2cf on "));

    // Run-identity stamps
    assert_eq!(scalar_string(&file, "rstart"), "2020060100");
    assert_eq!(scalar_string(&file, "run_name"), "test");
}

#[test]
fn test_store_cache_short_circuits_reruns() {
    let fx = setup_run(&[1, 2, 3]);
    let first = export_run(&fx.run, &fx.cfg, &NetcdfSnapshotReader).expect("Failed to export run");
    assert_eq!(first.cache_hits, 0);

    // Remove the snapshots; the second pass must run entirely off the store
    fs::remove_dir_all(&fx.cfg.output_dir).expect("Failed to remove snapshots");
    let second =
        export_run(&fx.run, &fx.cfg, &NetcdfSnapshotReader).expect("Failed to re-export run");
    assert_eq!(second.cache_hits, 3);

    let file = netcdf::open(&second.export_files[0]).expect("Failed to open export file");
    assert_eq!(file.dimension("time").expect("time dimension").len(), 3);
    let tas = file.variable("tas").expect("tas variable");
    assert_eq!(tas.get_values::<f32, _>(..).expect("tas values")[0], 290.0);
}

#[test]
fn test_flat_layout_skips_store_cache() {
    let dir = tempdir().expect("Failed to create temp dir");
    let run = RunDescriptor::new("test", dt(2020, 6, 1, 0), 3);
    let run_dir = dir.path().join(run.dir_name());
    for hour in 1..=3 {
        write_snapshot(
            &run_dir.join("output").join(snapshot_file_name("ICMSHABOF+", hour)),
            hour,
            "CLSTEMPERATURE",
            280.0,
        );
    }
    let table_path = dir.path().join("variables.yml");
    fs::write(&table_path, "tas:\n  fa_name: CLSTEMPERATURE\n").expect("Failed to write table");

    let cfg = ExportConfig::for_run_dir(&run_dir, &table_path)
        .with_variables(["tas"])
        .with_tree_layout(false);
    let report = export_run(&run, &cfg, &NetcdfSnapshotReader).expect("Failed to export run");
    assert_eq!(report.cache_hits, 0);
    assert!(!cfg.store_dir.exists());

    // Without a template the conventions marker is still present
    let file = netcdf::open(&report.export_files[0]).expect("Failed to open export file");
    assert_eq!(global_str(&file, "Conventions"), "CF-1.8");
    assert!(file.attribute("institution").is_none());

    // A rerun decodes the snapshots again
    let second = export_run(&run, &cfg, &NetcdfSnapshotReader).expect("Failed to re-export run");
    assert_eq!(second.cache_hits, 0);
}

#[test]
fn test_missing_snapshot_aborts_run() {
    let fx = setup_run(&[1, 3]); // hour 2 missing
    let err = export_run(&fx.run, &fx.cfg, &NetcdfSnapshotReader).expect_err("expected abort");
    match err {
        Fa2CfError::SnapshotNotFound { path } => {
            assert!(path.to_string_lossy().contains("ICMSHABOF+0002"));
        }
        other => panic!("unexpected error variant: {:?}", other),
    }
    // Nothing merged for the incomplete run
    assert!(!fx.cfg.export_dir.exists());
}

#[test]
fn test_zero_length_run_rejected_before_tables_are_read() {
    let dir = tempdir().expect("Failed to create temp dir");
    let run = RunDescriptor::new("test", dt(2020, 6, 1, 0), 0);
    // The table path does not exist; the window check must fire first
    let cfg = ExportConfig::for_run_dir(&dir.path().join("run"), dir.path().join("missing.yml"))
        .with_variables(["tas"]);
    let err = export_run(&run, &cfg, &NetcdfSnapshotReader).expect_err("expected rejection");
    match err {
        Fa2CfError::Configuration(msg) => {
            assert!(msg.contains("run length"), "unexpected message: {}", msg);
        }
        other => panic!("unexpected error variant: {:?}", other),
    }
}

#[test]
fn test_fullpos_variables_join_the_model_stream() {
    let dir = tempdir().expect("Failed to create temp dir");
    let run = RunDescriptor::new("test", dt(2020, 6, 1, 0), 3);
    let run_dir = dir.path().join(run.dir_name());

    let model_dir = run_dir.join("output").join("2020").join("06");
    let fullpos_dir = run_dir
        .join("fullpos")
        .join("output")
        .join("2020")
        .join("06");
    for hour in 1..=3 {
        write_snapshot(
            &model_dir.join(snapshot_file_name("ICMSHABOF+", hour)),
            hour,
            "CLSTEMPERATURE",
            280.0,
        );
        write_snapshot(
            &fullpos_dir.join(snapshot_file_name("PFABOFABOF+", hour)),
            hour,
            "SURFCAPE",
            100.0,
        );
    }

    let table_path = dir.path().join("variables.yml");
    fs::write(
        &table_path,
        "tas:\n  fa_name: CLSTEMPERATURE\ncape:\n  source: fullpos\n  fa_name: SURFCAPE\n",
    )
    .expect("Failed to write variable table");

    let cfg = ExportConfig::for_run_dir(&run_dir, &table_path).with_variables(["tas", "cape"]);
    let report = export_run(&run, &cfg, &NetcdfSnapshotReader).expect("Failed to export run");
    assert_eq!(report.export_files.len(), 2);

    let cape_path = report
        .export_files
        .iter()
        .find(|p| p.to_string_lossy().contains("_cape_"))
        .expect("cape export missing");
    let file = netcdf::open(cape_path).expect("Failed to open cape export");
    let cape = file.variable("cape").expect("cape variable");
    assert_eq!(cape.get_values::<f32, _>(..).expect("cape values")[0], 110.0);

    // Both streams land in one combined cache record per timestep
    let cache = cfg
        .store_dir
        .join("2020")
        .join("06")
        .join("test_2020060100_3_2020-06-01T01.nc");
    let cache_file = netcdf::open(&cache).expect("Failed to open cache file");
    assert!(cache_file.variable("tas").is_some());
    assert!(cache_file.variable("cape").is_some());
}

#[test]
fn test_grown_request_stops_at_stale_store_cache() {
    let dir = tempdir().expect("Failed to create temp dir");
    let run = RunDescriptor::new("test", dt(2020, 6, 1, 0), 3);
    let run_dir = dir.path().join(run.dir_name());

    let model_dir = run_dir.join("output").join("2020").join("06");
    let fullpos_dir = run_dir
        .join("fullpos")
        .join("output")
        .join("2020")
        .join("06");
    for hour in 1..=3 {
        write_snapshot(
            &model_dir.join(snapshot_file_name("ICMSHABOF+", hour)),
            hour,
            "CLSTEMPERATURE",
            280.0,
        );
        write_snapshot(
            &fullpos_dir.join(snapshot_file_name("PFABOFABOF+", hour)),
            hour,
            "SURFCAPE",
            100.0,
        );
    }
    let table_path = dir.path().join("variables.yml");
    fs::write(
        &table_path,
        "tas:\n  fa_name: CLSTEMPERATURE\ncape:\n  source: fullpos\n  fa_name: SURFCAPE\n",
    )
    .expect("Failed to write variable table");

    // First export caches one single-variable record per timestep
    let narrow = ExportConfig::for_run_dir(&run_dir, &table_path).with_variables(["tas"]);
    export_run(&run, &narrow, &NetcdfSnapshotReader).expect("Failed to export run");

    // Cache names carry no variable set, so a wider rerun reads the stale
    // records and stops at the first variable they are missing
    let wider = ExportConfig::for_run_dir(&run_dir, &table_path).with_variables(["tas", "cape"]);
    let err = export_run(&run, &wider, &NetcdfSnapshotReader).expect_err("expected stale cache");
    match err {
        Fa2CfError::VariableNotFound { var, file } => {
            assert_eq!(var, "cape");
            assert!(
                file.contains("test_2020060100_3_2020-06-01T01.nc"),
                "error should name the cache file, got {}",
                file
            );
        }
        other => panic!("unexpected error variant: {:?}", other),
    }

    // Clearing the store is the documented recovery; the rerun re-extracts
    fs::remove_dir_all(&wider.store_dir).expect("Failed to clear store");
    let report = export_run(&run, &wider, &NetcdfSnapshotReader).expect("Failed to re-export run");
    assert_eq!(report.export_files.len(), 2);
    assert_eq!(report.cache_hits, 0);
}

#[test]
fn test_merger_rejects_incomplete_series() {
    let run = RunDescriptor::new("test", dt(2020, 6, 1, 0), 3);
    let plan = build_plan(
        &run,
        3600,
        3600,
        DuplicatePolicy::PreferPrevious,
        SegmentFrequency::Monthly,
    )
    .expect("Failed to build plan");

    let dir = tempdir().expect("Failed to create temp dir");
    let table = VariableTable::from_yaml_str("tas:\n  fa_name: CLSTEMPERATURE\n")
        .expect("Failed to parse table");
    let def = table.resolve("tas").expect("tas should be defined");
    let globals = GlobalAttributes::default();
    let cfg = ExportConfig::for_run_dir(&dir.path().join("run"), dir.path().join("t.yml"));
    let writer = SeriesWriter::new(&run, &cfg, &globals);

    let err = writer
        .write_variable("tas", def, &[], &plan)
        .expect_err("expected rejection");
    match err {
        Fa2CfError::LengthMismatch {
            expected, actual, ..
        } => {
            assert_eq!(expected, 3);
            assert_eq!(actual, 0);
        }
        other => panic!("unexpected error variant: {:?}", other),
    }
}
