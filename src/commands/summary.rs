use serde::Deserialize;

use crate::commands::parse_day;
use crate::db::RecordStore;
use crate::summary;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryPayload {
    #[serde(default, alias = "group_items", alias = "groupByItem")]
    group_items: bool,
    #[serde(default, alias = "day")]
    date: Option<String>,
}

fn parse_summary_payload(payload: Option<serde_json::Value>) -> Result<SummaryPayload, String> {
    match payload {
        None | Some(serde_json::Value::Null) => Ok(SummaryPayload::default()),
        Some(serde_json::Value::Bool(group_items)) => Ok(SummaryPayload {
            group_items,
            date: None,
        }),
        Some(v) => serde_json::from_value(v).map_err(|e| format!("Invalid summary payload: {e}")),
    }
}

/// Summarize one day's payments (or all payments when no date is given).
pub fn summary_generate(
    store: &RecordStore,
    arg0: Option<serde_json::Value>,
) -> Result<serde_json::Value, String> {
    let payload = parse_summary_payload(arg0)?;
    let day = parse_day(payload.date.as_deref()).map_err(|e| e.to_string())?;

    let summary =
        summary::generate(store, day, payload.group_items).map_err(|e| e.to_string())?;
    let heading = match day {
        Some(day) => format!("Daily Summary ({})", day.format("%Y-%m-%d")),
        None => "Summary (all payments)".to_string(),
    };

    Ok(serde_json::json!({
        "success": true,
        "date": day.map(|d| d.format("%Y-%m-%d").to_string()),
        "text": summary.render_text(&heading),
        "summary": summary,
    }))
}
