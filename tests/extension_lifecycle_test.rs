//! Extension discovery and lifecycle through the public API.

mod common;

use assert_matches::assert_matches;
use common::ExtensionHarness;
use videoinsight::extensions::Error;
use videoinsight::settings::read_enabled;
use videoinsight_sdk::{CommandArgs, Host};

#[test]
fn scan_uses_declared_name_or_file_stem() {
    let mut h = ExtensionHarness::new();
    let a = h.write("a.ext", "PLUGIN_NAME = \"Alpha\"\nbuiltin = \"counting\"\n");
    let b = h.write("Beta.ext", "builtin = \"counting\"\n");

    h.manager.refresh();
    let registry = h.manager.registry();

    assert_eq!(registry.len(), 2);
    assert_eq!(registry.get("Alpha").unwrap().source_path, a);
    assert_eq!(registry.get("Beta").unwrap().source_path, b);
}

#[test]
fn colliding_names_yield_one_descriptor() {
    let mut h = ExtensionHarness::new();
    h.write("a.ext", "PLUGIN_NAME = \"Same\"\nbuiltin = \"counting\"\n");
    h.manager.refresh();

    let later = h.write("z.ext", "PLUGIN_NAME = \"Same\"\nbuiltin = \"stubborn\"\n");
    h.manager.refresh();

    let registry = h.manager.registry();
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.get("Same").unwrap().source_path, later);
}

#[test]
fn unreadable_entries_do_not_abort_scan() {
    let mut h = ExtensionHarness::new();
    h.write("good.ext", "PLUGIN_NAME = \"Good\"\n");
    std::fs::create_dir(h.path().join("folder.ext")).unwrap();

    h.manager.refresh();
    let names: Vec<&str> = h.manager.registry().names().collect();
    assert_eq!(names, ["Good"]);
}

#[test]
fn double_load_registers_once() {
    let mut h = ExtensionHarness::new();
    h.write("c.ext", "PLUGIN_NAME = \"Counting\"\nbuiltin = \"counting\"\n");
    h.manager.refresh();

    h.manager.load("Counting").unwrap();
    h.manager.load("Counting").unwrap();

    assert_eq!(h.calls.registered(), 1);
    assert!(h.manager.is_loaded("Counting"));
    assert!(h.host.command("counting.run").is_some());
}

#[test]
fn failing_unregister_still_unloads() {
    let mut h = ExtensionHarness::new();
    h.write("s.ext", "PLUGIN_NAME = \"Stubborn\"\nbuiltin = \"stubborn\"\n");
    h.manager.refresh();
    h.manager.load("Stubborn").unwrap();

    assert!(h.manager.unload("Stubborn"));

    assert_eq!(h.calls.unregistered(), 1);
    assert!(!h.manager.is_loaded("Stubborn"));
    assert!(h.host.command("stubborn.run").is_none());
}

#[test]
fn load_of_unscanned_name_is_not_found() {
    let mut h = ExtensionHarness::new();
    h.manager.refresh();
    assert_matches!(h.manager.load("Missing"), Err(Error::NotFound(_)));
}

#[test]
fn broken_manifest_is_a_load_error() {
    let mut h = ExtensionHarness::new();
    h.write("broken.ext", "PLUGIN_NAME = \"Broken\"\nlibrary = \n");
    h.manager.refresh();

    let err = h.manager.load("Broken").unwrap_err();
    assert_matches!(err, Error::Load { ref name, .. } if name == "Broken");
    assert!(!h.manager.is_loaded("Broken"));
}

#[test]
fn enabled_set_round_trip() {
    let mut h = ExtensionHarness::new();
    h.write("x.ext", "PLUGIN_NAME = \"X\"\nbuiltin = \"counting\"\n");
    h.write("y.ext", "PLUGIN_NAME = \"Y\"\nbuiltin = \"stubborn\"\n");
    h.manager.refresh();
    h.manager.set_enabled(&["Prior".to_string()], true);

    h.manager.set_enabled(&["X".to_string(), "Y".to_string()], true);
    let enabled: Vec<String> = read_enabled(&*h.settings).into_iter().collect();
    assert_eq!(enabled, ["Prior", "X", "Y"]);

    h.manager.set_enabled(&["X".to_string()], false);
    let enabled: Vec<String> = read_enabled(&*h.settings).into_iter().collect();
    assert_eq!(enabled, ["Prior", "Y"]);
    assert!(!h.manager.is_loaded("X"));
    assert!(h.manager.is_loaded("Y"));
    assert_eq!(h.settings.writes(), 3);
}

#[test]
fn reload_all_loads_only_enabled_and_present() {
    let mut h = ExtensionHarness::new();
    h.write("x.ext", "PLUGIN_NAME = \"X\"\nbuiltin = \"counting\"\n");
    let y = h.write("y.ext", "PLUGIN_NAME = \"Y\"\nbuiltin = \"stubborn\"\n");
    h.manager.refresh();
    h.manager.set_enabled(&["X".to_string(), "Y".to_string()], true);

    std::fs::remove_file(y).unwrap();
    let report = h.manager.reload_all();

    assert_eq!(report.to_string(), "1/1");
    assert_eq!(h.manager.loaded_names(), ["X"]);
    assert!(h.manager.enabled().contains("Y"));
}

#[test]
fn hidden_status_channel_suppresses_load_notice() {
    let mut h = ExtensionHarness::new();
    h.write("c.ext", "PLUGIN_NAME = \"Counting\"\nbuiltin = \"counting\"\n");
    h.manager.refresh();
    h.host.status().set_visible(false);

    h.manager.load("Counting").unwrap();
    assert!(h.host.status().messages().is_empty());
}

/// Build the sample cdylib into its own target dir and return the library path.
fn build_sample_extension() -> std::path::PathBuf {
    let root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"));
    let target = root.join("target").join("sample-extension");
    let status = std::process::Command::new(env!("CARGO"))
        .current_dir(root)
        .args(["build", "--quiet", "-p", "videoinsight-sample-extension"])
        .arg("--target-dir")
        .arg(&target)
        .status()
        .unwrap();
    assert!(status.success(), "building the sample extension failed");
    target
        .join("debug")
        .join(libloading::library_filename("videoinsight_sample_extension"))
}

#[test]
fn native_library_loads_runs_and_unloads() {
    let library = build_sample_extension();
    let mut h = ExtensionHarness::new();
    h.write(
        "sample.ext",
        &format!("PLUGIN_NAME = \"Sample\"\nlibrary = '{}'\n", library.display()),
    );
    h.manager.refresh();

    h.manager.load("Sample").unwrap();
    assert!(h.manager.is_loaded("Sample"));
    assert!(h
        .host
        .status()
        .messages()
        .iter()
        .any(|m| m.text == "Sample ready"));

    h.host.set_selection(vec!["/v/a.mp4".into(), "/v/b.mkv".into()]);
    let command = h.host.command("sample.count").unwrap();
    let summary = command
        .invoke(&*h.host, &CommandArgs::new())
        .unwrap();
    assert_eq!(summary, "2 files selected");
    drop(command);

    assert!(h.manager.unload("Sample"));
    assert!(!h.manager.is_loaded("Sample"));
    assert!(h.host.command("sample.count").is_none());

    // A second load reopens the library cleanly.
    h.manager.load("Sample").unwrap();
    assert!(h.host.command("sample.count").is_some());
    assert!(h.manager.unload("Sample"));
    assert!(h.host.command("sample.count").is_none());
}
