// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

use clap::ValueEnum;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Prints `value` as pretty JSON under `--format json`, otherwise runs
/// `text`. Mirrors every command's text/JSON split so each command picks
/// its own human-readable rendering without repeating the branch.
pub fn format_or_json<T: Serialize>(format: OutputFormat, value: &T, text: impl FnOnce()) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => {
            text();
            Ok(())
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value)?);
            Ok(())
        }
    }
}

pub fn format_time_ago(when: chrono::DateTime<chrono::Utc>) -> String {
    let elapsed = chrono::Utc::now().signed_duration_since(when);
    let secs = elapsed.num_seconds().max(0);
    match secs {
        0..=59 => format!("{secs}s"),
        60..=3599 => format!("{}m", secs / 60),
        3600..=86399 => format!("{}h", secs / 3600),
        _ => format!("{}d", secs / 86400),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn format_time_ago_buckets_by_unit() {
        let now = chrono::Utc::now();
        assert_eq!(format_time_ago(now - Duration::seconds(5)), "5s");
        assert_eq!(format_time_ago(now - Duration::minutes(3)), "3m");
        assert_eq!(format_time_ago(now - Duration::hours(2)), "2h");
        assert_eq!(format_time_ago(now - Duration::days(4)), "4d");
    }

    #[test]
    fn format_time_ago_clamps_future_timestamps_to_zero() {
        let now = chrono::Utc::now();
        assert_eq!(format_time_ago(now + Duration::minutes(5)), "0s");
    }

    #[test]
    fn output_format_defaults_to_text() {
        assert_eq!(OutputFormat::default(), OutputFormat::Text);
    }
}
