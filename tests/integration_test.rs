use assert_cmd::Command;
use assert_cmd::cargo;
use flate2::Compression;
use flate2::write::GzEncoder;
use mockito::{Server, ServerGuard};
use predicates::prelude::*;
use std::io::prelude::*;
use std::path::Path;
use tar::Builder;
use tempfile::tempdir;

fn create_zip(files: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options: zip::write::FileOptions<()> = zip::write::FileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    for (name, content) in files {
        zip.start_file(*name, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn create_tar_gz(files: &[(&str, &str)]) -> Vec<u8> {
    let mut tar_builder = Builder::new(Vec::new());
    for (name, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_path(name).unwrap();
        header.set_mode(0o644);
        header.set_cksum();
        tar_builder.append(&header, content.as_bytes()).unwrap();
    }
    let tar = tar_builder.into_inner().unwrap();

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar).unwrap();
    encoder.finish().unwrap()
}

/// Serves a one-package registry at `/packages.json`.
fn mock_registry(server: &mut ServerGuard, name: &str, dist_type: &str, package_type: &str) {
    let body = serde_json::json!({
        "packages": {
            name: {
                "1.0.0": {
                    "name": name,
                    "version": "1.0.0",
                    "dist": {"type": dist_type, "url": format!("{}/dist/package.zip", server.url())},
                    "target-dir": "widget",
                    "type": package_type
                }
            }
        }
    });
    server
        .mock("GET", "/packages.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create();
}

fn mwpkg(root: &Path, registry: &str) -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("mwpkg"));
    cmd.env_remove("MWPKG_LICENSES")
        .env_remove("MWPKG_CONFIRM_TTL_SECS")
        .arg("--userfiles")
        .arg(root.join("userfiles"))
        .arg("--cache-dir")
        .arg(root.join("cache"))
        .arg("--registry")
        .arg(registry);
    cmd
}

fn confirm_key(stdout: &[u8]) -> String {
    let response: serde_json::Value = serde_json::from_slice(stdout).unwrap();
    assert!(response.get("error").is_none(), "{}", response);
    response["form_data_module_params"]["confirm_key"]
        .as_str()
        .unwrap()
        .to_string()
}

#[test]
fn test_end_to_end_request_and_confirm() {
    let mut server = Server::new();
    mock_registry(&mut server, "acme/widget", "zip", "microweber-module");
    server
        .mock("GET", "/dist/package.zip")
        .with_status(200)
        .with_body(create_zip(&[("index.php", "<?php echo 'hi';"), ("src/Widget.php", "<?php")]))
        .create();

    let root = tempdir().unwrap();
    let registry = format!("{}/packages.json", server.url());

    let output = mwpkg(root.path(), &registry)
        .arg("request-install")
        .arg("acme/widget")
        .arg("1.0.0")
        .output()
        .unwrap();
    assert!(output.status.success());
    let key = confirm_key(&output.stdout);

    let staging = root.path().join("cache/composer-download/widget");
    assert!(staging.join("index.php").exists());
    assert!(!staging.join("last-package.zip").exists());

    mwpkg(root.path(), &registry)
        .arg("confirm")
        .arg(&key)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Success. You have installed: acme/widget",
        ))
        .stdout(predicate::str::contains("\"log\": \"Done!\""));

    let installed = root.path().join("userfiles/modules/widget");
    assert!(installed.join("index.php").exists());
    assert!(installed.join("src/Widget.php").exists());
    assert!(!staging.exists());

    let log = std::fs::read_to_string(root.path().join("userfiles/install_item_log.txt")).unwrap();
    assert!(log.contains("Done!"));

    // The key is single-use
    mwpkg(root.path(), &registry)
        .arg("confirm")
        .arg(&key)
        .assert()
        .failure()
        .stdout(predicate::str::contains("confirmation_expired"));
}

#[test]
fn test_request_install_with_confirm_key_replaces_previous_version() {
    let mut server = Server::new();
    mock_registry(&mut server, "acme/widget", "tar", "microweber-template");
    server
        .mock("GET", "/dist/package.zip")
        .with_status(200)
        .with_body(create_tar_gz(&[("layout.php", "<html>v2</html>")]))
        .create();

    let root = tempdir().unwrap();
    let previous = root.path().join("userfiles/templates/widget");
    std::fs::create_dir_all(&previous).unwrap();
    std::fs::write(previous.join("obsolete.php"), "v1").unwrap();

    let registry = format!("{}/packages.json", server.url());
    let output = mwpkg(root.path(), &registry)
        .args(["request-install", "acme/widget", "1.0.0"])
        .output()
        .unwrap();
    let key = confirm_key(&output.stdout);

    mwpkg(root.path(), &registry)
        .args(["request-install", "acme/widget", "1.0.0", "--confirm-key", &key])
        .assert()
        .success();

    assert!(previous.join("layout.php").exists());
    assert!(!previous.join("obsolete.php").exists());
}

#[test]
fn test_license_key_package_points_to_license_form() {
    let mut server = Server::new();
    mock_registry(&mut server, "acme/pro", "license_key", "microweber-module");
    let download = server.mock("GET", "/dist/package.zip").expect(0).create();

    let root = tempdir().unwrap();
    mwpkg(root.path(), &format!("{}/packages.json", server.url()))
        .args(["request-install", "acme/pro", "1.0.0"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("settings/group/license_edit"))
        .stdout(predicate::str::contains(
            "You need license key to install this package",
        ));

    download.assert();
    assert!(!root.path().join("cache/composer-download/widget").exists());
}

#[test]
fn test_unknown_package() {
    let mut server = Server::new();
    mock_registry(&mut server, "acme/widget", "zip", "microweber-module");

    let root = tempdir().unwrap();
    mwpkg(root.path(), &format!("{}/packages.json", server.url()))
        .args(["request-install", "acme/missing", "1.0.0"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Error. Cannot find any packages."));
}

#[test]
fn test_search_prints_matches() {
    let mut server = Server::new();
    mock_registry(&mut server, "acme/widget", "zip", "microweber-module");

    let root = tempdir().unwrap();
    let registry = format!("{}/packages.json", server.url());

    mwpkg(root.path(), &registry)
        .args(["search", "--name", "acme/widget", "--version", "1.0.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"target-dir\": \"widget\""));

    mwpkg(root.path(), &registry)
        .arg("search")
        .assert()
        .success()
        .stdout(predicate::str::contains("acme/widget"));
}

#[test]
fn test_license_records_are_sent_to_registry() {
    let mut server = Server::new();
    let registry = server
        .mock("GET", "/packages.json")
        // base64 of [{"local_key":"abc"}]
        .match_header(
            "Authorization",
            "Basic W3sibG9jYWxfa2V5IjoiYWJjIn1d",
        )
        .with_status(200)
        .with_body(r#"{"packages": {}}"#)
        .create();

    let root = tempdir().unwrap();
    let licenses = root.path().join("licenses.json");
    std::fs::write(&licenses, r#"[{"local_key":"abc"}]"#).unwrap();

    mwpkg(root.path(), &format!("{}/packages.json", server.url()))
        .arg("--licenses")
        .arg(&licenses)
        .arg("search")
        .assert()
        .success();

    registry.assert();
}

#[test]
fn test_version_flag() {
    Command::new(cargo::cargo_bin!("mwpkg"))
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("mwpkg "));
}
