#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::{json, Value};
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: TempDir::new().expect("tempdir"),
        }
    }

    fn config_path(&self) -> PathBuf {
        self.dir.path().join("cli.toml")
    }

    fn write(&self, name: &str, value: &Value) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, serde_json::to_vec_pretty(value).unwrap()).expect("write fixture");
        path
    }

    fn cmd(&self) -> assert_cmd::Command {
        let mut cmd = cargo_bin_cmd!("quarry");
        cmd.env("QUARRY_CONFIG", self.config_path())
            .env_remove("QUARRY_LOG")
            .env_remove("QUARRY_PROFILE");
        cmd
    }

    fn json(&self, args: &[&str], input: &Path) -> Value {
        let output = self
            .cmd()
            .args(["--format", "json"])
            .args(args)
            .arg(input)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&output).expect("valid json")
    }
}

fn customer_graph() -> Value {
    json!({
        "nodes": [
            {"id": "b", "schemaId": "Order", "position": {"x": 300.0, "y": 0.0}},
            {"id": "a", "schemaId": "Customer", "position": {"x": 0.0, "y": 0.0}},
        ],
        "edges": [
            {"source": "a", "target": "b", "relation": "placed", "optional": false},
        ],
    })
}

#[test]
fn compile_emits_canonical_patterns() {
    let ws = Workspace::new();
    let graph = ws.write("graph.json", &customer_graph());
    let report = ws.json(&["compile"], &graph);
    assert_eq!(
        report["patterns"],
        json!([
            {"from": {"schemaId": "Customer"}},
            {"from": {"schemaId": "Customer"}, "to": {"schemaId": "Order"}, "edge": "placed", "optional": false},
        ])
    );
    assert_eq!(report["bindings"]["b"], "Order");
}

#[test]
fn compile_rejects_cycles() {
    let ws = Workspace::new();
    let graph = ws.write(
        "cycle.json",
        &json!({
            "nodes": [
                {"id": "a", "schemaId": "Customer", "position": {"x": 0.0, "y": 0.0}},
                {"id": "b", "schemaId": "Order", "position": {"x": 0.0, "y": 0.0}},
            ],
            "edges": [
                {"source": "a", "target": "b", "relation": "placed"},
                {"source": "b", "target": "a", "relation": "placedBy"},
            ],
        }),
    );
    let output = ws
        .cmd()
        .arg("compile")
        .arg(&graph)
        .assert()
        .code(1)
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(output).expect("utf8");
    assert!(stderr.starts_with("error: [Cycle] "), "{stderr}");
}

#[test]
fn profiles_feed_emitted_configs() {
    let ws = Workspace::new();
    ws.cmd()
        .args([
            "profile",
            "set",
            "reporting",
            "--apply-rbac",
            "true",
            "--page-limit",
            "10",
            "--pagination-strategy",
            "cursor",
        ])
        .assert()
        .success();
    ws.cmd()
        .args(["profile", "use", "reporting"])
        .assert()
        .success();

    let stored = fs::read_to_string(ws.config_path()).expect("config written");
    assert!(stored.contains("default_profile = \"reporting\""));

    let graph = ws.write("graph.json", &customer_graph());
    let config = ws.json(&["compile", "--emit-config"], &graph);
    assert_eq!(config["applyRBAC"], true);
    assert_eq!(config["pagination"]["limit"], 10);
    assert_eq!(config["pagination"]["strategy"], "cursor");

    let output = ws
        .cmd()
        .args(["--format", "json", "profile", "list"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let listing: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(listing["default"], "reporting");
    assert_eq!(listing["profiles"][0]["page_limit"], 10);
}

#[test]
fn unknown_profile_is_an_error() {
    let ws = Workspace::new();
    let graph = ws.write("graph.json", &customer_graph());
    ws.cmd()
        .args(["--profile", "missing", "compile"])
        .arg(&graph)
        .assert()
        .failure();
}

#[test]
fn validate_reports_codes_and_exit_status() {
    let ws = Workspace::new();
    let good = ws.write(
        "good.json",
        &json!({
            "patterns": [{"from": {"schemaId": "Customer"}}],
            "columns": [{"fieldId": "name", "schemaId": "Customer", "selectOrder": 1}],
        }),
    );
    let report = ws.json(&["validate"], &good);
    assert_eq!(report["valid"], true);
    assert_eq!(report["columns"], 1);

    let bad = ws.write(
        "bad.json",
        &json!({
            "patterns": [{"from": {"schemaId": "Customer"}}],
            "columns": [{"fieldId": "total", "schemaId": "Order", "selectOrder": 1}],
        }),
    );
    let output = ws
        .cmd()
        .args(["--format", "json", "validate"])
        .arg(&bad)
        .assert()
        .code(2)
        .get_output()
        .stdout
        .clone();
    let report: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(report["valid"], false);
    assert_eq!(report["code"], "UnknownColumnSchema");

    let output = ws
        .cmd()
        .args(["--quiet", "validate"])
        .arg(&bad)
        .assert()
        .code(2)
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(output).expect("utf8");
    assert!(stderr.starts_with("[UnknownColumnSchema] "), "{stderr}");
}

#[test]
fn normalize_reports_renamed_occurrences() {
    let ws = Workspace::new();
    let hops = ws.write(
        "hops.json",
        &json!([
            {"from": {"schemaId": "Customer"}},
            {"from": {"schemaId": "Customer"}, "to": {"schemaId": "Order", "alias": "recent"}, "edge": "placed"},
        ]),
    );
    let report = ws.json(&["normalize"], &hops);
    assert_eq!(report["keyMap"]["recent"], "Order");
    assert_eq!(report["patterns"][1]["to"], json!({"schemaId": "Order"}));
}

#[test]
fn expand_labels_nodes_from_the_catalog() {
    let ws = Workspace::new();
    let hops = ws.write(
        "hops.json",
        &json!([
            {"from": {"schemaId": "Customer"}},
            {"from": {"schemaId": "Customer"}, "to": {"schemaId": "Order"}, "edge": "placed", "optional": true},
        ]),
    );
    let catalog = ws.write(
        "catalog.json",
        &json!([{"id": "Customer", "label": "Customers"}]),
    );
    let output = ws
        .cmd()
        .args(["--format", "json", "expand", "--column-spacing", "100"])
        .arg(&hops)
        .arg("--catalog")
        .arg(&catalog)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let graph: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(graph["nodes"][0]["label"], "Customers");
    assert_eq!(graph["nodes"][1]["placeholder"], true);
    assert_eq!(graph["nodes"][1]["position"]["x"], 100.0);
    assert_eq!(graph["edges"][0]["optional"], true);
}

#[test]
fn shape_renders_flattened_payloads() {
    let ws = Workspace::new();
    let payload = ws.write(
        "payload.json",
        &json!({
            "data.schema": "Order",
            "schemas": [
                {"id": "Order", "label": "Orders", "fields": [{"id": "name"}]},
                {"id": "LineItem", "label": "Line items", "fields": [{"id": "total"}]},
            ],
            "data.data.0.name": "Acme",
            "data.data.0.children.0.data.0.total": 500,
        }),
    );
    let view = ws.json(&["shape", "--flatten"], &payload);
    assert_eq!(view["kind"], "flattened");
    assert_eq!(view["table"]["groups"][1]["label"], "Line items");
    assert_eq!(view["table"]["rows"][0]["cells"], json!(["Acme", 500]));

    let output = ws
        .cmd()
        .args(["--quiet", "shape", "--flatten"])
        .arg(&payload)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf8");
    assert!(text.contains("Orders"));
    assert!(text.contains("Acme"));
}

#[test]
fn shape_reads_nested_payloads_from_stdin() {
    let ws = Workspace::new();
    let payload = json!({
        "schema": "Order",
        "schemas": [{"id": "Order", "label": "Orders", "fields": [{"id": "name"}]}],
        "data": [{"name": "Acme"}],
    });
    let output = ws
        .cmd()
        .args(["--format", "json", "shape", "-"])
        .write_stdin(payload.to_string())
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let view: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(view["kind"], "nested");
    assert_eq!(view["table"]["rows"][0]["cells"], json!(["Acme"]));
}
