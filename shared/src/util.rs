/// RFC 3339 timestamp for log and display contexts.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
