use std::fmt::Display;

use anstyle::{AnsiColor, Effects, Style};
use chrono::{DateTime, TimeZone, Utc};
use upgrader_core::UpgradeStatus;
use upgrader_runner::{NoticeLevel, NoticeSink};

pub(crate) const STATUS_HEADERS: [&str; 5] =
    ["Ran?", "Package", "Upgrade", "Priority", "Modified At"];

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

pub(crate) fn resolve_output_style(stdout_is_tty: bool, no_color: bool) -> OutputStyle {
    if stdout_is_tty && !no_color {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

pub(crate) fn current_output_style() -> OutputStyle {
    use std::io::IsTerminal;

    let no_color = std::env::var_os("NO_COLOR").is_some_and(|value| !value.is_empty());
    resolve_output_style(std::io::stdout().is_terminal(), no_color)
}

/// Prints runner notices to stdout; errors are highlighted in rich mode.
#[derive(Copy, Clone, Debug)]
pub(crate) struct ConsoleSink {
    style: OutputStyle,
}

impl ConsoleSink {
    pub(crate) fn new(style: OutputStyle) -> Self {
        Self { style }
    }
}

impl NoticeSink for ConsoleSink {
    fn notice(&mut self, level: NoticeLevel, message: &str) {
        println!("{}", render_notice(self.style, level, message));
    }
}

pub(crate) fn render_notice(style: OutputStyle, level: NoticeLevel, message: &str) -> String {
    match (style, level) {
        (OutputStyle::Plain, _) => message.to_string(),
        (OutputStyle::Rich, NoticeLevel::Info) => colorize(info_style(), message),
        (OutputStyle::Rich, NoticeLevel::Error) => colorize(error_style(), message),
    }
}

pub(crate) fn render_status_table<Tz>(
    statuses: &[UpgradeStatus],
    style: OutputStyle,
    tz: &Tz,
    date_time_format: &str,
    now: DateTime<Utc>,
) -> Vec<String>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let rows = statuses
        .iter()
        .map(|status| status_row(status, tz, date_time_format, now))
        .collect::<Vec<_>>();

    let mut widths = STATUS_HEADERS.map(|header| header.chars().count());
    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(cell.chars().count());
        }
    }

    let border = format!(
        "+{}+",
        widths
            .iter()
            .map(|width| "-".repeat(width + 2))
            .collect::<Vec<_>>()
            .join("+")
    );
    let headers = STATUS_HEADERS.map(|header| header.to_string());
    let header = render_table_line(&headers, &widths, |_, cell| match style {
        OutputStyle::Plain => cell.to_string(),
        OutputStyle::Rich => colorize(header_style(), cell),
    });

    let mut lines = vec![border.clone(), header, border.clone()];
    for (status, row) in statuses.iter().zip(&rows) {
        lines.push(render_table_line(row, &widths, |idx, cell| {
            if idx != 0 || style == OutputStyle::Plain {
                return cell.to_string();
            }
            let ran_style = if status.is_migrated {
                info_style()
            } else {
                error_style()
            };
            colorize(ran_style, cell)
        }));
    }
    lines.push(border);
    lines
}

fn status_row<Tz>(
    status: &UpgradeStatus,
    tz: &Tz,
    date_time_format: &str,
    now: DateTime<Utc>,
) -> [String; 5]
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let ran = if status.is_migrated { "Yes" } else { "No" };
    [
        ran.to_string(),
        status.package().to_string(),
        status.class().to_string(),
        status.priority.to_string(),
        render_modified_at(status.changed_at, tz, date_time_format, now),
    ]
}

/// Pads every cell to its column width before `decorate` adds any escape
/// sequences, so colour never skews alignment.
fn render_table_line<F>(cells: &[String; 5], widths: &[usize; 5], mut decorate: F) -> String
where
    F: FnMut(usize, &str) -> String,
{
    let rendered = cells
        .iter()
        .enumerate()
        .map(|(idx, cell)| {
            let padded = format!("{cell:<width$}", width = widths[idx]);
            format!(" {} ", decorate(idx, &padded))
        })
        .collect::<Vec<_>>();
    format!("|{}|", rendered.join("|"))
}

pub(crate) fn render_modified_at<Tz>(
    changed_at: DateTime<Utc>,
    tz: &Tz,
    date_time_format: &str,
    now: DateTime<Utc>,
) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!(
        "{} ({})",
        changed_at.with_timezone(tz).format(date_time_format),
        diff_for_humans(changed_at, now)
    )
}

pub(crate) fn diff_for_humans(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    const UNITS: [(i64, &str); 7] = [
        (365 * 24 * 60 * 60, "year"),
        (30 * 24 * 60 * 60, "month"),
        (7 * 24 * 60 * 60, "week"),
        (24 * 60 * 60, "day"),
        (60 * 60, "hour"),
        (60, "minute"),
        (1, "second"),
    ];

    let delta = now.signed_duration_since(then).num_seconds();
    if delta == 0 {
        return "just now".to_string();
    }

    let suffix = if delta > 0 { "ago" } else { "from now" };
    let seconds = delta.abs();
    let (count, unit) = UNITS
        .iter()
        .find(|(size, _)| seconds >= *size)
        .map(|(size, unit)| (seconds / size, *unit))
        .unwrap_or((seconds, "second"));
    let plural = if count == 1 { "" } else { "s" };
    format!("{count} {unit}{plural} {suffix}")
}

pub(crate) fn render_run_summary(applied: usize, skipped: usize) -> String {
    let noun = if applied == 1 { "upgrade" } else { "upgrades" };
    format!("{applied} {noun} applied, {skipped} already done")
}

fn info_style() -> Style {
    Style::new().fg_color(Some(AnsiColor::Green.into()))
}

fn error_style() -> Style {
    Style::new().fg_color(Some(AnsiColor::Red.into()))
}

fn header_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::Green.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}
