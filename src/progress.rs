//! Parsing and normalization of yt-dlp progress output.
//!
//! The download is launched with a progress template that prints one
//! `progress:<status>|<percent>|<speed>` line per update. `parse_line`
//! recognizes those lines; `translate` maps them into the normalized
//! [`Progress`] value applied to the UI, carrying the last known percent
//! through malformed input.

use crate::model::{Phase, Progress};

/// Sentinel prefix emitted by the progress template so progress lines can
/// be told apart from the rest of yt-dlp's stdout.
pub const LINE_PREFIX: &str = "progress:";

/// One raw progress update as reported by the fetch tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawProgress {
    /// Status tag, e.g. `downloading` or `finished`.
    pub status: String,
    /// Percent-complete representation, usually with a trailing `%`.
    pub percent: String,
    /// Human-readable rate string, when present.
    pub rate: Option<String>,
}

/// Extracts a raw progress update from one stdout line.
/// Lines without the sentinel prefix are not progress updates.
pub fn parse_line(line: &str) -> Option<RawProgress> {
    let rest = line.trim().strip_prefix(LINE_PREFIX)?;
    let mut fields = rest.splitn(3, '|');
    let status = fields.next()?.trim().to_string();
    let percent = fields.next()?.trim().to_string();
    let rate = fields
        .next()
        .map(str::trim)
        .filter(|r| !r.is_empty() && *r != "N/A" && *r != "Unknown")
        .map(str::to_string);
    Some(RawProgress { status, percent, rate })
}

/// Normalizes a raw event, threading through the previously applied
/// percent so malformed input never resets the bar.
pub fn translate(raw: &RawProgress, last_percent: f32) -> Progress {
    if raw.status == "finished" {
        // Byte transfer is done; post-processing progress is not
        // observable from the tool, so the percent stays put.
        return Progress {
            phase: Phase::PostProcessing,
            percent: last_percent,
            rate: None,
        };
    }

    let percent = match parse_percent(&raw.percent) {
        Some(p) => p.clamp(0.0, 100.0),
        None => {
            log::debug!("unparsable percent {:?}, keeping {last_percent}", raw.percent);
            last_percent
        }
    };

    Progress {
        phase: Phase::Downloading,
        percent,
        rate: raw.rate.clone(),
    }
}

fn parse_percent(text: &str) -> Option<f32> {
    let trimmed = text.trim();
    let number = trimmed.strip_suffix('%').unwrap_or(trimmed);
    // `parse` accepts "inf" and "nan"; neither is a usable percent.
    number.trim().parse::<f32>().ok().filter(|p| p.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(status: &str, percent: &str) -> RawProgress {
        RawProgress {
            status: status.to_string(),
            percent: percent.to_string(),
            rate: None,
        }
    }

    #[test]
    fn parses_progress_line() {
        let parsed = parse_line("progress:downloading|  45.2%|  1.20MiB/s").unwrap();
        assert_eq!(parsed.status, "downloading");
        assert_eq!(parsed.percent, "45.2%");
        assert_eq!(parsed.rate.as_deref(), Some("1.20MiB/s"));
    }

    #[test]
    fn ignores_unrelated_lines() {
        assert_eq!(parse_line("[download] Destination: video.mp4"), None);
        assert_eq!(parse_line(""), None);
    }

    #[test]
    fn missing_rate_is_none() {
        let parsed = parse_line("progress:downloading|45.2%|N/A").unwrap();
        assert_eq!(parsed.rate, None);
        let parsed = parse_line("progress:downloading|45.2%|").unwrap();
        assert_eq!(parsed.rate, None);
    }

    #[test]
    fn translates_percent_string() {
        let progress = translate(&raw("downloading", "45.2%"), 0.0);
        assert_eq!(progress.phase, Phase::Downloading);
        assert_eq!(progress.percent, 45.2);
    }

    #[test]
    fn malformed_percent_retains_previous() {
        let progress = translate(&raw("downloading", "N/A"), 45.2);
        assert_eq!(progress.phase, Phase::Downloading);
        assert_eq!(progress.percent, 45.2);
    }

    #[test]
    fn finished_switches_phase_and_keeps_percent() {
        let progress = translate(&raw("finished", "ignored"), 87.5);
        assert_eq!(progress.phase, Phase::PostProcessing);
        assert_eq!(progress.percent, 87.5);
        assert_eq!(progress.rate, None);
    }

    #[test]
    fn percent_is_clamped() {
        assert_eq!(translate(&raw("downloading", "130.0%"), 0.0).percent, 100.0);
        assert_eq!(translate(&raw("downloading", "-5%"), 50.0).percent, 0.0);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn malformed_input_is_idempotent(junk in "[a-zA-Z ]*", last in 0.0f32..100.0) {
                prop_assume!(parse_percent(&junk).is_none());
                let progress = translate(&raw("downloading", &junk), last);
                prop_assert_eq!(progress.percent, last);
            }

            #[test]
            fn formatted_percent_round_trips(p in 0.0f32..100.0) {
                let progress = translate(&raw("downloading", &format!("{p:.1}%")), 0.0);
                prop_assert!((progress.percent - p).abs() < 0.1);
            }

            #[test]
            fn translated_percent_stays_in_range(text in "\\PC*", last in 0.0f32..100.0) {
                let progress = translate(&raw("downloading", &text), last);
                prop_assert!((0.0..=100.0).contains(&progress.percent));
            }
        }
    }
}
