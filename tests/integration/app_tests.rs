use super::common::{module, write};
use asmdupe::cli::Cli;
use asmdupe::error::ExitCode;
use asmdupe::run_app;
use clap::Parser;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

/// Parse and run with a config file that does not exist, so no user
/// configuration leaks into the test.
fn run(dir: &Path, args: &[&str]) -> anyhow::Result<ExitCode> {
    let config = dir.join("absent.toml");
    let mut argv = vec!["asmdupe", "-q", "--no-color", "--config", config.to_str().unwrap()];
    argv.extend_from_slice(args);
    run_app(Cli::try_parse_from(argv).unwrap())
}

#[test]
fn test_analyze_without_duplicates() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("image");
    write(&root, "a/Lib.dll", &module("Lib", (1, 0, 0, 0)).build());

    let code = run(dir.path(), &["analyze", root.to_str().unwrap(), "--output", "json"]).unwrap();
    assert_eq!(code, ExitCode::NoDuplicates);
}

#[test]
fn test_analyze_writes_csv_file() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("image");
    let image = module("Lib", (1, 0, 0, 0)).build();
    write(&root, "a/Lib.dll", &image);
    write(&root, "b/Lib.dll", &image);
    let csv_path = dir.path().join("listing.csv");

    let code = run(
        dir.path(),
        &[
            "analyze",
            root.to_str().unwrap(),
            "--output",
            "csv",
            "--csv-file",
            csv_path.to_str().unwrap(),
        ],
    )
    .unwrap();
    assert_eq!(code, ExitCode::Success);

    let csv = fs::read_to_string(&csv_path).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("filename,culture,framework,relative_path"));
    assert!(lines[1].contains("a/Lib.dll"));
    assert!(lines[1].contains(",true,"));
    assert!(lines[2].ends_with(",false,same-hash"));
}

#[test]
fn test_analyze_removes_duplicates() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("image");
    let image = module("Lib", (1, 0, 0, 0)).build();
    let keep = write(&root, "a/Lib.dll", &image);
    let drop = write(&root, "b/Lib.dll", &image);

    let code = run(
        dir.path(),
        &[
            "analyze",
            root.to_str().unwrap(),
            "--output",
            "json",
            "--remove-duplicates",
            "--permanent",
            "-y",
        ],
    )
    .unwrap();
    assert_eq!(code, ExitCode::Success);
    assert!(keep.exists());
    assert!(!drop.exists());
}

#[test]
fn test_analyze_missing_root() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing");
    let err = run(dir.path(), &["analyze", missing.to_str().unwrap()]).unwrap_err();
    assert_eq!(ExitCode::for_error(&err), ExitCode::GeneralError);
    assert!(format!("{err:#}").contains("Root not found") || format!("{err:#}").contains("Cannot analyze"));
}

#[test]
fn test_analyze_missing_subdir() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("image");
    fs::create_dir_all(&root).unwrap();
    let result = run(dir.path(), &["analyze", root.to_str().unwrap(), "--subdir", "sdk"]);
    assert!(result.is_err());
}

#[test]
fn test_inspect_json() {
    let dir = tempdir().unwrap();
    let path = write(dir.path(), "Lib.dll", &module("Lib", (1, 2, 3, 4)).build());
    let code = run(dir.path(), &["inspect", "--json", path.to_str().unwrap()]).unwrap();
    assert_eq!(code, ExitCode::Success);

    let missing = dir.path().join("nope.dll");
    assert!(run(dir.path(), &["inspect", missing.to_str().unwrap()]).is_err());
}

#[test]
fn test_config_init_writes_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cfg").join("config.toml");
    let cli = Cli::try_parse_from(["asmdupe", "-q", "--config", path.to_str().unwrap(), "config", "--init"]).unwrap();
    assert_eq!(run_app(cli).unwrap(), ExitCode::Success);

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("top_n = 10"));
    assert!(text.contains("io_threads = 4"));
}
