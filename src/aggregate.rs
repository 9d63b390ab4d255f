//! Day-level statistics derived from a day's cards and journal.
//!
//! Everything here is a pure function of its input. Callers are expected to
//! drop failed-processing cards (see [`ActivityRecord::is_failed_processing`])
//! before handing records over; no filtering happens in this module.

use crate::model::{ActivityRecord, CardMetadata, Distraction, JournalRecord};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryShare {
    pub category: String,
    pub minutes: i64,
    /// Share of the summed category minutes, rounded to the nearest percent.
    pub percent: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppUsage {
    pub name: String,
    pub sessions: u32,
    pub minutes: i64,
}

/// A distraction together with the card it was recorded in.
#[derive(Debug, Clone, PartialEq)]
pub struct DistractionEntry {
    pub card_start: String,
    pub card_end: String,
    pub card_title: String,
    pub distraction: Distraction,
}

/// A card whose metadata payload could not be parsed. The card still counts
/// toward durations and categories, it just contributes no apps or distractions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataWarning {
    pub record_id: i64,
    pub message: String,
}

/// A card paired with its decoded metadata.
#[derive(Debug, Clone)]
pub struct ParsedRecord<'a> {
    pub record: &'a ActivityRecord,
    pub metadata: CardMetadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DaySummary {
    pub card_count: usize,
    pub total_minutes: i64,
    pub categories: Vec<CategoryShare>,
    pub distinct_categories: Vec<String>,
    pub apps: Vec<AppUsage>,
    pub distractions: Vec<DistractionEntry>,
    pub has_journal: bool,
    pub journal_status: Option<String>,
    pub warnings: Vec<MetadataWarning>,
    /// Decoded metadata per card, in input order. Unreadable payloads are empty.
    pub card_metadata: Vec<CardMetadata>,
}

impl DaySummary {
    pub fn build(records: &[ActivityRecord], journal: Option<&JournalRecord>) -> Self {
        let (parsed, warnings) = parse_metadata(records);
        let apps = application_usage(&parsed);
        let flat = distractions(&parsed);
        Self {
            card_count: records.len(),
            total_minutes: total_duration(records),
            categories: category_breakdown(records),
            distinct_categories: distinct_categories(records),
            apps,
            distractions: flat,
            has_journal: journal.is_some(),
            journal_status: journal.map(|j| j.status.clone()),
            warnings,
            card_metadata: parsed.into_iter().map(|p| p.metadata).collect(),
        }
    }

    pub fn has_any_data(&self) -> bool {
        self.card_count > 0 || self.has_journal
    }
}

/// Decode every card's metadata, degrading unparsable payloads to empty metadata.
pub fn parse_metadata(records: &[ActivityRecord]) -> (Vec<ParsedRecord<'_>>, Vec<MetadataWarning>) {
    let mut warnings = Vec::new();
    let parsed: Vec<ParsedRecord<'_>> = records
        .iter()
        .map(|record| {
            let metadata = record.parse_metadata().unwrap_or_else(|e| {
                warnings.push(MetadataWarning {
                    record_id: record.id,
                    message: format!("{:#}", e),
                });
                CardMetadata::default()
            });
            ParsedRecord { record, metadata }
        })
        .collect();
    (parsed, warnings)
}

/// Sum of per-card rounded minutes.
pub fn total_duration(records: &[ActivityRecord]) -> i64 {
    records.iter().map(ActivityRecord::duration_minutes).sum()
}

/// Minutes and percentage per category, in first-seen order.
pub fn category_breakdown(records: &[ActivityRecord]) -> Vec<CategoryShare> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut shares: Vec<CategoryShare> = Vec::new();

    for record in records {
        let label = record.category_label();
        let slot = *index.entry(label).or_insert_with(|| {
            shares.push(CategoryShare {
                category: label.to_string(),
                minutes: 0,
                percent: 0,
            });
            shares.len() - 1
        });
        shares[slot].minutes += record.duration_minutes();
    }

    let total: i64 = shares.iter().map(|s| s.minutes).sum();
    for share in &mut shares {
        share.percent = rounded_percent(share.minutes, total);
    }
    shares
}

fn rounded_percent(part: i64, total: i64) -> i64 {
    if total <= 0 {
        return 0;
    }
    (part * 200 + total) / (2 * total)
}

/// Non-empty category labels present in the records, first-seen order, no duplicates.
pub fn distinct_categories(records: &[ActivityRecord]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for category in records
        .iter()
        .filter_map(|r| r.category.as_deref().map(str::trim))
        .filter(|c| !c.is_empty())
    {
        if !out.iter().any(|c| c == category) {
            out.push(category.to_string());
        }
    }
    out
}

/// Sessions and minutes per application, most used first.
///
/// Ties keep the order in which the applications first appeared.
pub fn application_usage(parsed: &[ParsedRecord<'_>]) -> Vec<AppUsage> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut usage: Vec<AppUsage> = Vec::new();

    for entry in parsed {
        let Some(apps) = entry.metadata.app_sites.as_ref() else {
            continue;
        };
        let minutes = entry.record.duration_minutes();
        for name in apps.names() {
            let slot = match index.get(name) {
                Some(&slot) => slot,
                None => {
                    usage.push(AppUsage {
                        name: name.to_string(),
                        sessions: 0,
                        minutes: 0,
                    });
                    index.insert(name.to_string(), usage.len() - 1);
                    usage.len() - 1
                }
            };
            usage[slot].sessions += 1;
            usage[slot].minutes += minutes;
        }
    }

    // Stable sort keeps first-appearance order among equal totals.
    usage.sort_by(|a, b| b.minutes.cmp(&a.minutes));
    usage
}

/// All distractions of the day, in card order then recorded order.
pub fn distractions(parsed: &[ParsedRecord<'_>]) -> Vec<DistractionEntry> {
    parsed
        .iter()
        .flat_map(|entry| {
            entry
                .metadata
                .distractions
                .iter()
                .map(move |d| DistractionEntry {
                    card_start: entry.record.start.clone(),
                    card_end: entry.record.end.clone(),
                    card_title: entry.record.title.clone(),
                    distraction: d.clone(),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(id: i64, minutes: i64, category: Option<&str>, metadata: Option<&str>) -> ActivityRecord {
        let start_ts = 1_700_000_000 + id * 10_000;
        ActivityRecord {
            id,
            start: format!("start-{}", id),
            end: format!("end-{}", id),
            start_ts,
            end_ts: start_ts + minutes * 60,
            title: format!("Card {}", id),
            category: category.map(str::to_string),
            metadata: metadata.map(str::to_string),
            ..Default::default()
        }
    }

    fn apps(primary: &str, secondary: Option<&str>) -> String {
        match secondary {
            Some(s) => format!(r#"{{"appSites":{{"primary":"{}","secondary":"{}"}}}}"#, primary, s),
            None => format!(r#"{{"appSites":{{"primary":"{}"}}}}"#, primary),
        }
    }

    #[test]
    fn total_duration_rounds_each_card_before_summing() {
        let mut a = card(1, 0, None, None);
        a.end_ts = a.start_ts + 90;
        let mut b = card(2, 0, None, None);
        b.end_ts = b.start_ts + 90;
        // 2 + 2, not round(3.0)
        assert_eq!(total_duration(&[a, b]), 4);
    }

    #[test]
    fn total_duration_ignores_order() {
        let records = vec![
            card(1, 30, Some("Work"), None),
            card(2, 17, None, None),
            card(3, 61, Some("Personal"), None),
        ];
        let mut reversed = records.clone();
        reversed.reverse();
        assert_eq!(total_duration(&records), 108);
        assert_eq!(total_duration(&reversed), 108);
    }

    #[test]
    fn category_breakdown_in_first_seen_order() {
        let records = vec![
            card(1, 30, Some("Work"), None),
            card(2, 10, None, None),
            card(3, 20, Some("Work"), None),
            card(4, 40, Some("Personal"), None),
        ];
        let shares = category_breakdown(&records);
        assert_eq!(
            shares,
            vec![
                CategoryShare { category: "Work".into(), minutes: 50, percent: 50 },
                CategoryShare { category: "Uncategorized".into(), minutes: 10, percent: 10 },
                CategoryShare { category: "Personal".into(), minutes: 40, percent: 40 },
            ]
        );
    }

    #[test]
    fn category_percent_rounds_to_nearest() {
        let records = vec![
            card(1, 1, Some("A"), None),
            card(2, 1, Some("B"), None),
            card(3, 1, Some("C"), None),
        ];
        let percents: Vec<_> = category_breakdown(&records).iter().map(|s| s.percent).collect();
        assert_eq!(percents, vec![33, 33, 33]);

        let records = vec![card(1, 1, Some("A"), None), card(2, 7, Some("B"), None)];
        let percents: Vec<_> = category_breakdown(&records).iter().map(|s| s.percent).collect();
        // 12.5 -> 13, 87.5 -> 88
        assert_eq!(percents, vec![13, 88]);
    }

    #[test]
    fn zero_minutes_yields_zero_percent() {
        let shares = category_breakdown(&[card(1, 0, Some("Work"), None)]);
        assert_eq!(shares[0].percent, 0);
    }

    #[test]
    fn distinct_categories_skip_blank_and_duplicates() {
        let records = vec![
            card(1, 5, Some("Work"), None),
            card(2, 5, Some(""), None),
            card(3, 5, None, None),
            card(4, 5, Some("Personal"), None),
            card(5, 5, Some("Work"), None),
        ];
        assert_eq!(distinct_categories(&records), vec!["Work", "Personal"]);
    }

    #[test]
    fn application_usage_counts_sessions_and_minutes() {
        let a1 = apps("A", None);
        let a2 = apps("A", Some("B"));
        let records = vec![card(1, 30, None, Some(&a1)), card(2, 45, None, Some(&a2))];
        let (parsed, warnings) = parse_metadata(&records);
        assert!(warnings.is_empty());
        assert_eq!(
            application_usage(&parsed),
            vec![
                AppUsage { name: "A".into(), sessions: 2, minutes: 75 },
                AppUsage { name: "B".into(), sessions: 1, minutes: 45 },
            ]
        );
    }

    #[test]
    fn application_usage_ties_keep_first_appearance() {
        let x = apps("X", None);
        let y = apps("Y", None);
        let z = apps("Z", None);
        let records = vec![
            card(1, 10, None, Some(&y)),
            card(2, 10, None, Some(&x)),
            card(3, 20, None, Some(&z)),
        ];
        let (parsed, _) = parse_metadata(&records);
        let names: Vec<_> = application_usage(&parsed).into_iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["Z", "Y", "X"]);
    }

    #[test]
    fn blank_app_names_are_ignored() {
        let meta = r#"{"appSites":{"primary":"  ","secondary":null}}"#;
        let records = vec![card(1, 10, None, Some(meta))];
        let (parsed, _) = parse_metadata(&records);
        assert!(application_usage(&parsed).is_empty());
    }

    #[test]
    fn distractions_flatten_with_parent_times() {
        let first = r#"{"distractions":[
            {"startTime":"9:10 AM","endTime":"9:12 AM","title":"News"},
            {"startTime":"9:20 AM","endTime":"9:25 AM","title":"Chat","summary":"Slack"}
        ]}"#;
        let second = r#"{"distractions":[{"startTime":"11:00 AM","endTime":"11:02 AM","title":"Email"}]}"#;
        let records = vec![card(1, 60, None, Some(first)), card(2, 60, None, Some(second))];
        let (parsed, _) = parse_metadata(&records);
        let flat = distractions(&parsed);
        let titles: Vec<_> = flat.iter().map(|d| d.distraction.title.as_str()).collect();
        assert_eq!(titles, vec!["News", "Chat", "Email"]);
        assert_eq!(flat[0].card_start, "start-1");
        assert_eq!(flat[2].card_end, "end-2");
        assert_eq!(flat[1].distraction.summary.as_deref(), Some("Slack"));
    }

    #[test]
    fn broken_metadata_degrades_to_warning() {
        let good = apps("A", None);
        let records = vec![
            card(1, 30, Some("Work"), Some("{oops")),
            card(2, 15, Some("Work"), Some(&good)),
        ];
        let summary = DaySummary::build(&records, None);
        assert_eq!(summary.card_count, 2);
        assert_eq!(summary.total_minutes, 45);
        assert_eq!(summary.warnings.len(), 1);
        assert_eq!(summary.warnings[0].record_id, 1);
        assert_eq!(summary.apps, vec![AppUsage { name: "A".into(), sessions: 1, minutes: 15 }]);
        assert_eq!(summary.card_metadata.len(), 2);
        assert_eq!(summary.card_metadata[0], CardMetadata::default());
    }

    #[test]
    fn summary_reports_journal_and_data_presence() {
        let empty = DaySummary::build(&[], None);
        assert!(!empty.has_any_data());
        assert!(!empty.has_journal);

        let journal = JournalRecord {
            status: "complete".into(),
            ..Default::default()
        };
        let only_journal = DaySummary::build(&[], Some(&journal));
        assert!(only_journal.has_any_data());
        assert_eq!(only_journal.journal_status.as_deref(), Some("complete"));
    }
}
