//! Small shared helpers.

use chrono::Utc;

/// RFC 3339 timestamp used for task bookkeeping and trace events.
pub fn now_string() -> String {
    Utc::now().to_rfc3339()
}
