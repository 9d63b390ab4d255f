use crate::aggregate::DaySummary;
use crate::day::LogicalDay;
use crate::decision::Timestamp;
use crate::model::{ActivityRecord, CardMetadata, JournalRecord};
use crate::utils::ArtifactMeta;
use std::io::{self, Write};

/// Everything needed to render one day file.
///
/// `records` must be in chronological order; the timeline section follows it as-is.
/// `summary` must have been built from exactly these records.
pub struct DayDocument<'a> {
    pub day: &'a LogicalDay,
    pub day_start_label: &'a str,
    pub summary: &'a DaySummary,
    pub records: &'a [ActivityRecord],
    pub journal: Option<&'a JournalRecord>,
    pub created: Timestamp,
    pub updated: Timestamp,
    pub tags: &'a [String],
}

impl DayDocument<'_> {
    pub fn meta(&self) -> ArtifactMeta {
        ArtifactMeta {
            date: self.day.id.format("%Y-%m-%d").to_string(),
            day_start: self.day_start_label.to_string(),
            cards: self.summary.card_count,
            total_minutes: self.summary.total_minutes,
            categories: self.summary.distinct_categories.clone(),
            has_journal: self.summary.has_journal,
            journal_status: self.summary.journal_status.clone(),
            created: self.created,
            updated: self.updated,
            tags: self.tags.to_vec(),
        }
    }
}

/// `95` -> `1h 35m`, `40` -> `40m`.
pub fn format_minutes(minutes: i64) -> String {
    let (h, m) = (minutes / 60, minutes % 60);
    if h > 0 {
        format!("{}h {:02}m", h, m)
    } else {
        format!("{}m", m)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

pub fn write_day_markdown<W: Write>(writer: &mut W, doc: &DayDocument<'_>) -> io::Result<()> {
    if doc.records.len() != doc.summary.card_metadata.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "day summary was built from a different set of cards",
        ));
    }

    // 1. Frontmatter, always first so it can be read back without the body
    let yaml = serde_yaml::to_string(&doc.meta()).map_err(io::Error::other)?;
    writeln!(writer, "---")?;
    write!(writer, "{}", yaml)?;
    writeln!(writer, "---")?;
    writeln!(writer)?;

    writeln!(writer, "# {}", doc.day.id.format("%A, %B %-d, %Y"))?;
    writeln!(writer)?;

    write_overview(writer, doc)?;
    if let Some(journal) = doc.journal {
        write_journal(writer, journal)?;
    }
    write_timeline(writer, doc.records, &doc.summary.card_metadata)?;
    write_distractions(writer, doc.summary)?;
    Ok(())
}

fn write_overview<W: Write>(writer: &mut W, doc: &DayDocument<'_>) -> io::Result<()> {
    let summary = doc.summary;
    writeln!(writer, "## Overview")?;
    writeln!(writer)?;
    writeln!(
        writer,
        "- **Tracked time:** {} across {} {}",
        format_minutes(summary.total_minutes),
        summary.card_count,
        if summary.card_count == 1 { "card" } else { "cards" }
    )?;
    writeln!(
        writer,
        "- **Day window:** {} to {}",
        doc.day.start.format("%Y-%m-%d %H:%M"),
        doc.day.end.format("%Y-%m-%d %H:%M")
    )?;
    writeln!(writer)?;

    if !summary.categories.is_empty() {
        writeln!(writer, "### Categories")?;
        writeln!(writer)?;
        writeln!(writer, "| Category | Time | Share |")?;
        writeln!(writer, "| --- | --- | --- |")?;
        for share in &summary.categories {
            writeln!(
                writer,
                "| {} | {} | {}% |",
                share.category,
                format_minutes(share.minutes),
                share.percent
            )?;
        }
        writeln!(writer)?;
    }

    if !summary.apps.is_empty() {
        writeln!(writer, "### Applications")?;
        writeln!(writer)?;
        writeln!(writer, "| Application | Sessions | Time |")?;
        writeln!(writer, "| --- | --- | --- |")?;
        for app in &summary.apps {
            writeln!(
                writer,
                "| {} | {} | {} |",
                app.name,
                app.sessions,
                format_minutes(app.minutes)
            )?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

fn write_journal<W: Write>(writer: &mut W, journal: &JournalRecord) -> io::Result<()> {
    writeln!(writer, "## Journal")?;
    writeln!(writer)?;
    if let Some(status) = non_blank(Some(journal.status.as_str())) {
        writeln!(writer, "**Status:** {}", status)?;
        writeln!(writer)?;
    }

    let sections = [
        ("Intentions", journal.intentions.as_deref()),
        ("Goals", journal.goals.as_deref()),
        ("Notes", journal.notes.as_deref()),
        ("Reflections", journal.reflections.as_deref()),
        ("Summary", journal.summary.as_deref()),
    ];
    for (heading, body) in sections {
        if let Some(body) = non_blank(body) {
            writeln!(writer, "### {}", heading)?;
            writeln!(writer)?;
            writeln!(writer, "{}", body)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}

fn write_timeline<W: Write>(
    writer: &mut W,
    records: &[ActivityRecord],
    metadata: &[CardMetadata],
) -> io::Result<()> {
    if records.is_empty() {
        return Ok(());
    }
    writeln!(writer, "## Timeline")?;
    writeln!(writer)?;

    for (record, meta) in records.iter().zip(metadata) {
        writeln!(writer, "### {} - {} · {}", record.start, record.end, record.title)?;
        writeln!(writer)?;

        let mut labels = vec![record.category_label().to_string()];
        if let Some(sub) = non_blank(record.subcategory.as_deref()) {
            labels.push(sub.to_string());
        }
        writeln!(
            writer,
            "*{}* · {}",
            labels.join(" / "),
            format_minutes(record.duration_minutes())
        )?;
        writeln!(writer)?;

        if let Some(summary) = non_blank(record.summary.as_deref()) {
            writeln!(writer, "{}", summary)?;
            writeln!(writer)?;
        }
        if let Some(details) = non_blank(record.detailed_summary.as_deref()) {
            for line in details.lines() {
                writeln!(writer, "> {}", line)?;
            }
            writeln!(writer)?;
        }

        if !meta.distractions.is_empty() {
            writeln!(writer, "**Distractions:**")?;
            for d in &meta.distractions {
                match non_blank(d.summary.as_deref()) {
                    Some(s) => writeln!(writer, "- {} - {}: {} ({})", d.start_time, d.end_time, d.title, s)?,
                    None => writeln!(writer, "- {} - {}: {}", d.start_time, d.end_time, d.title)?,
                }
            }
            writeln!(writer)?;
        }

        if let Some(url) = non_blank(record.video_summary_url.as_deref()) {
            writeln!(writer, "[Recording]({})", url)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}

fn write_distractions<W: Write>(writer: &mut W, summary: &DaySummary) -> io::Result<()> {
    if summary.distractions.is_empty() {
        return Ok(());
    }
    writeln!(writer, "## Distractions")?;
    writeln!(writer)?;
    for entry in &summary.distractions {
        writeln!(
            writer,
            "- **{}** ({} - {}) during *{}* ({} - {})",
            entry.distraction.title,
            entry.distraction.start_time,
            entry.distraction.end_time,
            entry.card_title,
            entry.card_start,
            entry.card_end
        )?;
    }
    writeln!(writer)?;
    Ok(())
}
