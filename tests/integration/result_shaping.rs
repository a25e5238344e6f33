#![allow(missing_docs)]

use std::sync::Mutex;

use quarry::{
    query::{run_query, ExecutionRequest, ExecutorError, QueryConfigBuilder, QueryExecutor},
    result::{
        flatten::{parse_flattened, shape_flattened},
        nested::BlockSchema,
        path::FieldPath,
    },
    shape_payload, FieldDef, ResultSchema, ResultView, ShapeOptions,
};
use serde_json::{json, Map, Value};

fn record(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn order_schemas() -> Vec<ResultSchema> {
    vec![
        ResultSchema::new("Order", "Orders")
            .with_field(FieldDef::new("name").with_label("Customer name"))
            .with_field(FieldDef::new("internalRef").hidden()),
        ResultSchema::new("LineItem", "Line items").with_fields(["sku", "total"]),
    ]
}

#[test]
fn flattened_rows_order_numerically() {
    let parsed = parse_flattened(&record(json!({
        "data.data.10.id": 3,
        "data.data.0.id": 1,
        "data.data.2.id": 2,
    })));
    let order: Vec<u64> = parsed.rows.iter().map(|row| row.root_index).collect();
    assert_eq!(order, [0, 2, 10]);
}

#[test]
fn depth_beyond_the_schema_list_clamps_to_the_last_schema() {
    let parsed = parse_flattened(&record(json!({
        "data.data.0.name": "Acme",
        "data.data.0.children.0.data.0.children.1.data.3.total": 7,
    })));
    let table = shape_flattened(&parsed, &order_schemas(), &ShapeOptions::default());
    let deep = table
        .columns
        .iter()
        .find(|column| column.path.depth() == 2)
        .expect("deep column");
    assert_eq!(deep.schema_id.as_deref(), Some("LineItem"));
    assert_eq!(deep.label, "total");
}

#[test]
fn flattened_columns_follow_schema_order() {
    let parsed = parse_flattened(&record(json!({
        "data.data.0.name": "Acme",
        "data.data.0.children.0.data.0.total": 500,
    })));
    assert_eq!(parsed.rows.len(), 1);
    assert_eq!(parsed.rows[0].root_index, 0);

    let table = shape_flattened(&parsed, &order_schemas(), &ShapeOptions::default());
    let groups: Vec<(Option<&str>, Vec<String>)> = table
        .groups
        .iter()
        .map(|group| {
            (
                group.schema_id.as_deref(),
                group.columns.iter().map(|c| c.path.to_string()).collect(),
            )
        })
        .collect();
    assert_eq!(
        groups,
        [
            (Some("Order"), vec!["name".to_owned()]),
            (Some("LineItem"), vec!["children.0.data.0.total".to_owned()]),
        ]
    );
    assert_eq!(table.columns[0].label, "Customer name");
    assert_eq!(
        table.rows[0].cells,
        [Some(json!("Acme")), Some(json!(500))]
    );
}

#[test]
fn payload_schemas_drive_flattened_shaping() {
    let payload = json!({
        "data.schema": "Order",
        "schemas": serde_json::to_value(order_schemas()).unwrap(),
        "data.data.0.internalRef": "x-1",
        "data.data.0.name": "Acme",
        "data.data.1.name": "Globex",
        "data.data.one.name": "broken",
    });

    let options = ShapeOptions::default();
    let ResultView::Flattened(table) = shape_payload(&payload, true, &options) else {
        panic!("expected flattened view");
    };
    let paths: Vec<FieldPath> = table.columns.iter().map(|c| c.path.clone()).collect();
    assert_eq!(paths, [FieldPath::field("name")]);
    assert_eq!(table.rows.len(), 2);
    assert_eq!(table.skipped, ["data.data.one.name"]);

    let options = ShapeOptions::default().with_hidden(true);
    let ResultView::Flattened(table) = shape_payload(&payload, true, &options) else {
        panic!("expected flattened view");
    };
    let fields: Vec<&str> = table.columns.iter().map(|c| c.path.field.as_str()).collect();
    assert_eq!(fields, ["name", "internalRef"]);
}

#[test]
fn nested_blocks_resolve_and_degrade() {
    let payload = json!({
        "schema": "Order",
        "schemas": [
            {"id": "Order", "label": "Orders", "fields": [{"id": "name"}, {"id": "status"}]},
            {"id": "line-item", "label": "Line items", "fields": [{"id": "sku"}]},
        ],
        "data": [
            {
                "name": "Acme",
                "status": "open",
                "children": [
                    {"schema": "lineitem", "data": [{"sku": "A-1"}, {"sku": "B-2"}]},
                    {"schema": "Shipment", "data": [{"carrier": "UPS", "eta": "2d"}]},
                ],
            },
            "not a row",
            {"name": "Globex"},
        ],
    });

    let options = ShapeOptions::default();
    let ResultView::Nested(root) = shape_payload(&payload, false, &options) else {
        panic!("expected nested view");
    };
    assert_eq!(root.label, "Orders");
    assert!(matches!(
        root.schema,
        BlockSchema::Resolved { strategy: "exact", .. }
    ));
    assert_eq!(root.rows.len(), 2);
    assert_eq!(root.rows[1].cells, [Some(&json!("Globex")), None]);

    let children = &root.rows[0].children;
    assert_eq!(children.len(), 2);

    let items = children[0].assemble();
    assert_eq!(items.label, "Line items");
    assert!(matches!(
        items.schema,
        BlockSchema::Resolved { strategy: "hyphen-insensitive", .. }
    ));
    assert_eq!(items.rows.len(), 2);

    let shipment = children[1].assemble();
    assert!(shipment.schema.is_placeholder());
    assert_eq!(shipment.label, quarry::result::SCHEMA_NOT_FOUND);
    let observed: Vec<&str> = shipment.columns.iter().map(|c| c.field.as_str()).collect();
    assert_eq!(observed, ["carrier", "eta"]);

    let rendered = serde_json::to_value(&ResultView::Nested(root)).unwrap();
    assert_eq!(rendered["kind"], "nested");
    assert_eq!(
        rendered["table"]["rows"][0]["children"][1]["schema"],
        json!({"requested": "Shipment", "placeholder": true})
    );
    assert!(rendered["table"]["rows"][1].get("children").is_none());
}

#[test]
fn case_differences_fall_through_to_containment() {
    let payload = json!({
        "schema": "Order",
        "schemas": [
            {"id": "PurchaseOrder", "label": "Purchase orders", "fields": [{"id": "name"}]},
            {"id": "order", "label": "Lowercase orders", "fields": [{"id": "name"}]},
        ],
        "data": [{"name": "Acme"}],
    });
    let options = ShapeOptions::default();
    let ResultView::Nested(root) = shape_payload(&payload, false, &options) else {
        panic!("expected nested view");
    };
    assert_eq!(root.label, "Purchase orders");
    assert_eq!(
        root.schema,
        BlockSchema::Resolved {
            index: 0,
            schema_id: "PurchaseOrder".into(),
            strategy: "containment"
        }
    );
}

#[test]
fn substring_matches_take_the_first_catalog_entry() {
    let payload = json!({
        "schema": "order",
        "schemas": [
            {"id": "purchase-order", "label": "Purchase orders"},
            {"id": "order-line", "label": "Order lines"},
        ],
        "data": [],
    });
    let options = ShapeOptions::default();
    let ResultView::Nested(root) = shape_payload(&payload, false, &options) else {
        panic!("expected nested view");
    };
    assert_eq!(root.label, "Purchase orders");
    assert!(matches!(
        root.schema,
        BlockSchema::Resolved { strategy: "containment", index: 0, .. }
    ));
}

#[test]
fn missing_top_level_data_is_renderable() {
    let options = ShapeOptions::default();
    for (payload, flatten) in [
        (json!({}), true),
        (json!([1, 2]), true),
        (json!({"schema": "Order"}), false),
        (json!({"data": []}), false),
    ] {
        let view = shape_payload(&payload, flatten, &options);
        assert!(view.is_empty(), "{payload} should shape to no data");
    }
}

struct RecordingExecutor {
    requests: Mutex<Vec<Value>>,
}

impl QueryExecutor for RecordingExecutor {
    fn execute(&self, request: &ExecutionRequest<'_>) -> Result<Value, ExecutorError> {
        let body = serde_json::to_value(request).map_err(|err| ExecutorError::Other(err.to_string()))?;
        self.requests.lock().unwrap().push(body);
        Ok(json!({
            "data.schema": "Customer",
            "schemas": [{"id": "Customer", "label": "Customers", "fields": [{"id": "name"}]}],
            "data.data.0.name": "Acme",
        }))
    }
}

#[test]
fn executor_round_trip_shapes_the_response() {
    let config = QueryConfigBuilder::new()
        .root("Customer")
        .optional_hop("Customer", "placed", "Order")
        .column("name", "Customer")
        .column("total", "Order")
        .group_by(["name"])
        .apply_rbac(true)
        .limit(25)
        .build()
        .unwrap();
    let executor = RecordingExecutor {
        requests: Mutex::new(Vec::new()),
    };

    let outcome = run_query(&executor, &config, true).unwrap();
    let options = ShapeOptions::default();
    let ResultView::Flattened(table) = outcome.view(&options) else {
        panic!("expected flattened view");
    };
    assert_eq!(table.groups[0].label, "Customers");
    assert_eq!(table.rows[0].cells, [Some(json!("Acme"))]);

    let requests = executor.requests.lock().unwrap();
    let sent = &requests[0];
    assert_eq!(sent["flatten"], true);
    assert_eq!(sent["applyRBAC"], true);
    assert_eq!(sent["patterns"][1]["optional"], true);
    assert_eq!(sent["columns"][0]["groupOrder"], 0);
}

#[test]
fn executor_failures_keep_their_code() {
    let config = QueryConfigBuilder::new()
        .root("Customer")
        .column("name", "Customer")
        .build()
        .unwrap();
    let refuse = |_: &ExecutionRequest<'_>| -> Result<Value, ExecutorError> {
        Err(ExecutorError::rejected("missing permission"))
    };
    let err = run_query(&refuse, &config, false).unwrap_err();
    assert_eq!(err.code(), "ExecutorRejected");
}
