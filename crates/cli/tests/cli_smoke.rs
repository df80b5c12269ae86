use assert_cmd::Command;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

const HOTEL: &str = "00000000-0000-0000-0000-000000001001";
const INN: &str = "00000000-0000-0000-0000-000000001002";
const ROOM: &str = "00000000-0000-0000-0000-000000002001";
const SECTION: &str = "00000000-0000-0000-0000-000000003001";

fn seed() -> Value {
    serde_json::json!({
        "properties": [
            {
                "id": HOTEL,
                "name": "Aden Bay Hotel",
                "city": "Aden",
                "base_price": "120",
                "currency": "YER",
                "property_type": "hotel",
                "is_featured": true
            },
            {
                "id": INN,
                "name": "Old Sanaa Inn",
                "city": "Sanaa",
                "base_price": "80",
                "currency": "YER",
                "property_type": "guesthouse"
            }
        ],
        "units": [
            {
                "id": ROOM,
                "property_id": HOTEL,
                "unit_type_id": "00000000-0000-0000-0000-000000004001",
                "name": "Sea View Room",
                "max_capacity": 2,
                "base_price": "100",
                "currency": "YER"
            }
        ],
        "availability": [
            {
                "unit_id": ROOM,
                "window": { "start": "2026-07-01", "end": "2026-07-10" }
            }
        ],
        "sections": [
            {
                "id": SECTION,
                "target": "properties",
                "items": [
                    { "item_id": INN, "sort_order": 1 },
                    { "item_id": HOTEL, "sort_order": 2 }
                ]
            }
        ]
    })
}

fn cli(store: &Path) -> Command {
    let mut cmd = Command::cargo_bin("inventory-index").unwrap();
    cmd.arg("--store").arg(store);
    cmd.env_remove("INVENTORY_INDEX_STORE_PATH");
    cmd
}

fn json(output: &[u8]) -> Value {
    serde_json::from_slice(output).unwrap()
}

fn rebuilt() -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let seed_path = dir.path().join("seed.json");
    std::fs::write(&seed_path, seed().to_string()).unwrap();
    let store = dir.path().join("index");

    let output = cli(&store)
        .args(["rebuild", "--seed"])
        .arg(&seed_path)
        .output()
        .unwrap();
    assert!(output.status.success());
    let response = json(&output.stdout);
    assert_eq!(response["status"], "ok");
    assert_eq!(response["data"]["properties"], 2);
    assert_eq!(response["data"]["units"], 1);
    (dir, store)
}

#[test]
fn rebuild_then_get_reads_the_persisted_index() {
    let (_dir, store) = rebuilt();

    let output = cli(&store).args(["get", HOTEL]).output().unwrap();
    assert!(output.status.success());
    let response = json(&output.stdout);
    assert_eq!(response["data"]["kind"], "property");
    assert_eq!(response["data"]["name"], "Aden Bay Hotel");
    assert_eq!(response["data"]["unit_count"], 1);
}

#[test]
fn list_keeps_section_order_and_applies_filters() {
    let (_dir, store) = rebuilt();

    let output = cli(&store)
        .args(["list", "--section", SECTION])
        .output()
        .unwrap();
    let response = json(&output.stdout);
    let ids: Vec<&str> = response["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![INN, HOTEL]);

    let output = cli(&store)
        .args(["list", "--section", SECTION, "--city", "aden"])
        .output()
        .unwrap();
    let response = json(&output.stdout);
    assert_eq!(response["data"]["total"], 1);
}

#[test]
fn search_units_by_stay() {
    let (_dir, store) = rebuilt();

    let output = cli(&store)
        .args([
            "search",
            "--target",
            "units",
            "--check-in",
            "2026-07-02",
            "--check-out",
            "2026-07-05",
        ])
        .output()
        .unwrap();
    let response = json(&output.stdout);
    assert_eq!(response["data"]["total"], 1);
    assert_eq!(response["data"]["items"][0]["id"], ROOM);
}

#[test]
fn unknown_document_is_an_error_response() {
    let (_dir, store) = rebuilt();

    let output = cli(&store)
        .args(["get", "00000000-0000-0000-0000-00000000ffff"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let response = json(&output.stdout);
    assert_eq!(response["status"], "error");
    assert!(response["message"].as_str().unwrap().contains("not found"));
}

#[test]
fn stats_reports_store_counts() {
    let (_dir, store) = rebuilt();

    let output = cli(&store).arg("stats").output().unwrap();
    assert!(output.status.success());
    let response = json(&output.stdout);
    assert_eq!(response["data"]["store"]["properties"], 2);
    assert_eq!(response["data"]["queue"]["state"], "running");
}

#[test]
fn missing_seed_file_fails() {
    let dir = TempDir::new().unwrap();
    let output = cli(&dir.path().join("index"))
        .args(["rebuild", "--seed"])
        .arg(dir.path().join("nope.json"))
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert_eq!(json(&output.stdout)["status"], "error");
}
