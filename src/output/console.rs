use crate::model::ResultRecord;
use std::collections::HashMap;
use std::fmt::Write as _;

pub const LOADING_TITLE: &str = "Searching the web...";
pub const LOADING_SUBTITLE: &str = "Hang tight while we scan thousands of sites.";
pub const LOADING_MESSAGES: [&str; 4] = [
    "Scanning thousands of websites for hidden opportunities...",
    "Analyzing domain authority and spam scores...",
    "Finding low-competition gems in your niche...",
    "Discovering untapped lead sources...",
];

const HEADERS: [&str; 8] = ["#", "Match", "URL", "Country", "Traffic", "DA", "DR", "Spam Score"];
const MAX_URL_WIDTH: usize = 60;

pub fn loading_message(step: usize) -> &'static str {
    LOADING_MESSAGES[step % LOADING_MESSAGES.len()]
}

/// URLs whose "Copied!" marker is still showing, with their expiry time.
#[derive(Debug, Clone)]
pub struct CopyTracker {
    ttl_ms: i64,
    copied: HashMap<String, i64>,
}

impl CopyTracker {
    pub fn new(ttl_ms: u64) -> Self {
        Self {
            ttl_ms: i64::try_from(ttl_ms).unwrap_or(i64::MAX),
            copied: HashMap::new(),
        }
    }

    pub fn mark_copied(&mut self, url: &str, now_ms: i64) {
        self.copied
            .insert(url.to_string(), now_ms.saturating_add(self.ttl_ms));
    }

    pub fn is_copied(&self, url: &str, now_ms: i64) -> bool {
        self.copied
            .get(url)
            .is_some_and(|expires| now_ms < *expires)
    }

    pub fn prune(&mut self, now_ms: i64) {
        self.copied.retain(|_, expires| now_ms < *expires);
    }

    pub fn len(&self) -> usize {
        self.copied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.copied.is_empty()
    }
}

/// Renders every record as a text table, no paging or sorting.
pub fn render_results(records: &[ResultRecord], copied: &CopyTracker, now_ms: i64) -> String {
    let rows: Vec<[String; 8]> = records
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let raw_url = r.url();
            let url = if copied.is_copied(&raw_url, now_ms) {
                format!("{} (Copied!)", truncate(&raw_url, MAX_URL_WIDTH))
            } else {
                truncate(&raw_url, MAX_URL_WIDTH)
            };
            [
                (i + 1).to_string(),
                if r.is_match() { "✓".to_string() } else { String::new() },
                url,
                r.country(),
                numeric_cell(r, "traffic"),
                numeric_cell(r, "da"),
                numeric_cell(r, "dr"),
                numeric_cell(r, "spam_score"),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let _ = writeln!(out, "Search Results");
    let _ = writeln!(out, "Showing {} results", records.len());
    let _ = writeln!(out);
    push_row(&mut out, &HEADERS.map(String::from), &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(out, "{}", rule.join("-+-"));
    for row in &rows {
        push_row(&mut out, row, &widths);
    }
    out
}

/// Numbers get separators; anything else is shown as sent.
fn numeric_cell(record: &ResultRecord, name: &str) -> String {
    match record.number(name) {
        Some(n) => format_number(n),
        None => record.text(name),
    }
}

fn push_row(out: &mut String, cells: &[String; 8], widths: &[usize; 8]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths.iter())
        .enumerate()
        .map(|(col, (cell, width))| {
            // numeric columns are right aligned
            if col == 0 || col >= 4 {
                format!("{:>width$}", cell, width = *width)
            } else {
                format!("{:<width$}", cell, width = *width)
            }
        })
        .collect();
    let _ = writeln!(out, "{}", line.join(" | ").trim_end());
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", cut)
}

/// Formats with thousands separators, dropping a zero fraction.
pub fn format_number(n: f64) -> String {
    if !n.is_finite() {
        return n.to_string();
    }
    let negative = n < 0.0;
    let abs = n.abs();
    let fixed = format!("{:.3}", abs);
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let frac_part = frac_part.trim_end_matches('0');

    let mut grouped = String::new();
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let mut out = String::new();
    if negative && (grouped != "0" || !frac_part.is_empty()) {
        out.push('-');
    }
    out.push_str(&grouped);
    if !frac_part.is_empty() {
        out.push('.');
        out.push_str(frac_part);
    }
    out
}

/// `Hh Mm Ss` countdown text.
pub fn format_countdown(secs: u64) -> String {
    format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(url: &str, is_match: bool) -> ResultRecord {
        ResultRecord::new(serde_json::json!({
            "url": url,
            "country": "US",
            "traffic": 1_234_567,
            "da": 12,
            "dr": 8,
            "spam_score": 1,
            "match": is_match
        }))
    }

    #[test]
    fn numbers_get_thousands_separators() {
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(999.0), "999");
        assert_eq!(format_number(1000.0), "1,000");
        assert_eq!(format_number(1_234_567.0), "1,234,567");
        assert_eq!(format_number(1234.5), "1,234.5");
        assert_eq!(format_number(-4200.0), "-4,200");
    }

    #[test]
    fn countdown_splits_hours_minutes_seconds() {
        assert_eq!(format_countdown(86_400), "24h 0m 0s");
        assert_eq!(format_countdown(86_300), "23h 58m 20s");
        assert_eq!(format_countdown(59), "0h 0m 59s");
    }

    #[test]
    fn copied_marker_expires() {
        let mut tracker = CopyTracker::new(2_000);
        tracker.mark_copied("https://a.example", 10_000);
        assert!(tracker.is_copied("https://a.example", 11_999));
        assert!(!tracker.is_copied("https://b.example", 11_999));
        assert!(!tracker.is_copied("https://a.example", 12_000));

        tracker.prune(12_000);
        assert!(tracker.is_empty());
    }

    #[test]
    fn recopying_extends_the_marker() {
        let mut tracker = CopyTracker::new(2_000);
        tracker.mark_copied("https://a.example", 0);
        tracker.mark_copied("https://a.example", 1_500);
        assert!(tracker.is_copied("https://a.example", 3_000));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn renders_every_record_with_markers() {
        let records = vec![
            record("https://a.example", true),
            record("https://b.example", false),
        ];
        let mut tracker = CopyTracker::new(2_000);
        tracker.mark_copied("https://b.example", 0);

        let out = render_results(&records, &tracker, 1_000);
        assert!(out.contains("Showing 2 results"));
        assert!(out.contains("https://a.example"));
        assert!(out.contains("https://b.example (Copied!)"));
        assert!(out.contains("1,234,567"));
        assert_eq!(out.matches('✓').count(), 1);
    }

    #[test]
    fn loose_values_render_as_sent() {
        let records = vec![
            ResultRecord::new(serde_json::json!({
                "url": "https://c.example",
                "traffic": "12k",
                "da": null,
                "match": "yes"
            })),
            ResultRecord::new(serde_json::json!(42)),
        ];
        let out = render_results(&records, &CopyTracker::new(2_000), 0);
        assert!(out.contains("Showing 2 results"));
        assert!(out.contains("12k"));
        assert!(!out.contains("null"));
        assert_eq!(out.matches('✓').count(), 0);
    }

    #[test]
    fn huge_copied_duration_does_not_overflow() {
        let mut tracker = CopyTracker::new(u64::MAX);
        tracker.mark_copied("https://a.example", 1_700_000_000_000);
        assert!(tracker.is_copied("https://a.example", i64::MAX - 1));

        let mut tracker = CopyTracker::new(2_000);
        tracker.mark_copied("https://a.example", i64::MAX - 10);
        assert!(tracker.is_copied("https://a.example", i64::MAX - 1));
    }

    #[test]
    fn long_urls_are_truncated() {
        let long = format!("https://{}.example", "x".repeat(100));
        let out = truncate(&long, 20);
        assert_eq!(out.chars().count(), 20);
        assert!(out.ends_with('…'));
    }

    #[test]
    fn loading_messages_rotate() {
        assert_eq!(loading_message(0), LOADING_MESSAGES[0]);
        assert_eq!(loading_message(5), LOADING_MESSAGES[1]);
    }
}
