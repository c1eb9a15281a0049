//! JSON-patch body for one work item

use crate::types::Record;
use serde_json::{Value, json};

const PARENT_LINK: &str = "System.LinkTypes.Hierarchy-Reverse";

fn add_field(name: &str, value: Value) -> Value {
    json!({
        "op": "add",
        "path": format!("/fields/{name}"),
        "value": value,
    })
}

/// Build the create request body for `record`
///
/// The title is always set; every other field only when non-empty.
pub fn build_create_payload(record: &Record, api_base: &str) -> Value {
    let mut ops = vec![add_field("System.Title", json!(record.title))];

    let text_fields = [
        ("System.Description", record.description.as_str()),
        ("System.AssignedTo", record.assignee.as_str()),
        ("System.IterationPath", record.iteration_path.as_str()),
        ("System.AreaPath", record.effective_area_path()),
    ];
    for (name, value) in text_fields {
        if !value.is_empty() {
            ops.push(add_field(name, json!(value)));
        }
    }

    let hour_fields = [
        (
            "Microsoft.VSTS.Scheduling.OriginalEstimate",
            record.original_estimate.as_str(),
        ),
        (
            "Microsoft.VSTS.Scheduling.RemainingWork",
            record.remaining_work.as_str(),
        ),
    ];
    for (name, value) in hour_fields {
        if !value.is_empty() {
            ops.push(add_field(name, hours_value(value)));
        }
    }

    if !record.parent.is_empty() {
        ops.push(json!({
            "op": "add",
            "path": "/relations/-",
            "value": {
                "rel": PARENT_LINK,
                "url": format!(
                    "{}/{}/{}/_apis/wit/workItems/{}",
                    api_base.trim_end_matches('/'),
                    urlencoding::encode(&record.organization),
                    urlencoding::encode(&record.project),
                    record.parent
                ),
            },
        }));
    }

    Value::Array(ops)
}

fn hours_value(raw: &str) -> Value {
    raw.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map_or_else(|| json!(raw), Value::Number)
}
