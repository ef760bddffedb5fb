//! Text shown on cards: airing countdowns, score and popularity pills.

use chrono::{DateTime, Utc};
use std::fmt;

use crate::core::{MediaStatus, NextAiringEpisode};

/// Where a countdown is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownStyle {
    /// Compact badge on a grid card
    Badge,
    /// Banner on a detail page
    Banner,
}

/// Countdown to the next episode, e.g. `Ep 12 in 2d 5h`
pub fn format_countdown(next: &NextAiringEpisode, now: DateTime<Utc>, style: CountdownStyle) -> String {
    let episode = next.episode;
    let remaining_ms = next.airing_at.saturating_mul(1000) - now.timestamp_millis();

    let prefix = match style {
        CountdownStyle::Badge => format!("Ep {}", episode),
        CountdownStyle::Banner => format!("Episode {}", episode),
    };

    if remaining_ms <= 0 {
        return format!("{} is out now!", prefix);
    }

    let days = remaining_ms / 86_400_000;
    let hours = (remaining_ms % 86_400_000) / 3_600_000;
    let minutes = (remaining_ms % 3_600_000) / 60_000;

    let verb = match style {
        CountdownStyle::Badge => "in",
        CountdownStyle::Banner => "airs in",
    };

    if days > 0 {
        format!("{} {} {}d {}h", prefix, verb, days, hours)
    } else if hours > 0 {
        format!("{} {} {}h {}m", prefix, verb, hours, minutes)
    } else {
        format!("{} {} {}m", prefix, verb, minutes)
    }
}

/// Countdown for releasing media only; anything else gets no badge
pub fn airing_label(
    status: Option<MediaStatus>,
    next: Option<&NextAiringEpisode>,
    now: DateTime<Utc>,
    style: CountdownStyle,
) -> Option<String> {
    match (status, next) {
        (Some(MediaStatus::Releasing), Some(next)) if next.airing_at > 0 => {
            Some(format_countdown(next, now, style))
        }
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreTier {
    High,
    Mid,
    Low,
}

impl ScoreTier {
    pub fn from_score(score: u8) -> Self {
        if score >= 80 {
            ScoreTier::High
        } else if score >= 60 {
            ScoreTier::Mid
        } else {
            ScoreTier::Low
        }
    }

    /// CSS class suffix
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreTier::High => "high",
            ScoreTier::Mid => "mid",
            ScoreTier::Low => "low",
        }
    }
}

impl fmt::Display for ScoreTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScorePill {
    pub text: String,
    pub tier: ScoreTier,
}

/// `★ 8.5` for an average score of 85
pub fn score_pill(score: u8) -> ScorePill {
    ScorePill {
        text: format!("★ {:.1}", score as f64 / 10.0),
        tier: ScoreTier::from_score(score),
    }
}

pub fn format_popularity(popularity: u64) -> String {
    if popularity >= 1_000_000 {
        format!("{:.1}M", popularity as f64 / 1_000_000.0)
    } else if popularity >= 1_000 {
        format!("{}K", (popularity as f64 / 1_000.0).round() as u64)
    } else {
        popularity.to_string()
    }
}

/// `♥ 35K`
pub fn popularity_pill(popularity: u64) -> String {
    format!("♥ {}", format_popularity(popularity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap()
    }

    fn next_in(seconds: i64) -> NextAiringEpisode {
        NextAiringEpisode {
            episode: 12,
            airing_at: now().timestamp() + seconds,
        }
    }

    #[test]
    fn test_badge_countdown() {
        let style = CountdownStyle::Badge;
        assert_eq!(format_countdown(&next_in(2 * 86_400 + 5 * 3_600), now(), style), "Ep 12 in 2d 5h");
        assert_eq!(format_countdown(&next_in(3 * 3_600 + 15 * 60), now(), style), "Ep 12 in 3h 15m");
        assert_eq!(format_countdown(&next_in(42 * 60 + 30), now(), style), "Ep 12 in 42m");
        assert_eq!(format_countdown(&next_in(0), now(), style), "Ep 12 is out now!");
        assert_eq!(format_countdown(&next_in(-60), now(), style), "Ep 12 is out now!");
    }

    #[test]
    fn test_banner_countdown() {
        let style = CountdownStyle::Banner;
        assert_eq!(
            format_countdown(&next_in(86_400 + 60), now(), style),
            "Episode 12 airs in 1d 0h"
        );
        assert_eq!(format_countdown(&next_in(-1), now(), style), "Episode 12 is out now!");
    }

    #[test]
    fn test_airing_label_only_for_releasing() {
        let next = next_in(3_600);
        assert_eq!(
            airing_label(Some(MediaStatus::Releasing), Some(&next), now(), CountdownStyle::Badge).as_deref(),
            Some("Ep 12 in 1h 0m")
        );
        assert!(airing_label(Some(MediaStatus::Finished), Some(&next), now(), CountdownStyle::Badge).is_none());
        assert!(airing_label(Some(MediaStatus::Releasing), None, now(), CountdownStyle::Badge).is_none());
        assert!(airing_label(None, Some(&next), now(), CountdownStyle::Badge).is_none());
    }

    #[test]
    fn test_score_pill() {
        let pill = score_pill(85);
        assert_eq!(pill.text, "★ 8.5");
        assert_eq!(pill.tier, ScoreTier::High);

        assert_eq!(score_pill(80).tier, ScoreTier::High);
        assert_eq!(score_pill(79).tier, ScoreTier::Mid);
        assert_eq!(score_pill(60).tier, ScoreTier::Mid);
        assert_eq!(score_pill(59).tier, ScoreTier::Low);
        assert_eq!(score_pill(70).text, "★ 7.0");
        assert_eq!(ScoreTier::Mid.to_string(), "mid");
    }

    #[test]
    fn test_popularity() {
        assert_eq!(format_popularity(1_234_567), "1.2M");
        assert_eq!(format_popularity(35_210), "35K");
        assert_eq!(format_popularity(950), "950");
        assert_eq!(popularity_pill(560_000), "♥ 560K");
    }
}
