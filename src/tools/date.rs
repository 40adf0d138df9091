//! Current-date tool

use chrono::{FixedOffset, Utc};

use super::ToolDeclaration;
use crate::{Error, Result};

/// Reporting timezone, UTC+7 (fixed; not overridable by arguments)
const TZ_OFFSET_HOURS: i32 = 7;

/// Declaration for `get_today_date`
pub(super) fn declaration() -> ToolDeclaration {
    ToolDeclaration {
        name: "get_today_date",
        description: "Get today's date in the assistant's home timezone.",
        parameters: serde_json::json!({
            "type": "object",
            "properties": {},
            "required": [],
        }),
    }
}

/// Return today's date as a spoken-friendly sentence.
pub(super) fn invoke(_arguments: &serde_json::Value) -> Result<String> {
    let offset = FixedOffset::east_opt(TZ_OFFSET_HOURS * 3600)
        .ok_or_else(|| Error::Config("invalid timezone offset".to_string()))?;
    let now = Utc::now().with_timezone(&offset);
    Ok(format!("Today is {}", now.format("%A, %-d %B %Y")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_reads_as_a_sentence() {
        let text = invoke(&serde_json::json!({})).unwrap();
        assert!(text.starts_with("Today is "));
        // Weekday, day month year
        let rest = text.strip_prefix("Today is ").unwrap();
        assert!(rest.contains(", "));
    }

    #[test]
    fn arguments_are_ignored() {
        let a = invoke(&serde_json::json!({})).unwrap();
        let b = invoke(&serde_json::json!({"timezone": "Mars/Olympus"})).unwrap();
        assert_eq!(a, b);
    }
}
