//! Moderator action payloads.
//!
//! Button payloads arrive as strings (`mod:accept:17`, `rep:2:17`, ...).
//! They are parsed once at the boundary into a tagged union; the state
//! machine switches on the tag, never on raw strings.

use serde::{Deserialize, Serialize};

use crate::notices::PERMANENT_BAN;

/// Fixed set of ban durations offered to moderators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BanPeriod {
    Hours12,
    Hours24,
    Days3,
    Days7,
    Forever,
}

impl BanPeriod {
    /// Absolute expiry for a ban applied at `now`. Permanent bans use a
    /// far-future sentinel timestamp.
    pub fn until(&self, now: i64) -> i64 {
        match self {
            BanPeriod::Hours12 => now + 12 * 3_600,
            BanPeriod::Hours24 => now + 24 * 3_600,
            BanPeriod::Days3 => now + 3 * 86_400,
            BanPeriod::Days7 => now + 7 * 86_400,
            BanPeriod::Forever => PERMANENT_BAN,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BanPeriod::Hours12 => "12h",
            BanPeriod::Hours24 => "24h",
            BanPeriod::Days3 => "3d",
            BanPeriod::Days7 => "7d",
            BanPeriod::Forever => "forever",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "12h" => Some(BanPeriod::Hours12),
            "24h" => Some(BanPeriod::Hours24),
            "3d" => Some(BanPeriod::Days3),
            "7d" => Some(BanPeriod::Days7),
            "forever" => Some(BanPeriod::Forever),
            _ => None,
        }
    }
}

/// One moderator button press, parsed from its string payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeratorAction {
    Accept,
    Decline,
    Ban,
    /// Reward amount chosen after Accept (1..=3).
    Reward(i32),
    /// Penalty chosen after Decline (0 or 1 point lost).
    Penalty(i32),
    /// Duration chosen after Ban.
    BanDuration(BanPeriod),
    /// Return from a choice keyboard to the initial one.
    Back,
    /// Read-only decision summary.
    Info,
}

/// Parse a callback payload into (proposal id, action). Returns `None` for
/// malformed or unknown payloads, which callers ignore.
pub fn parse_callback(data: &str) -> Option<(i64, ModeratorAction)> {
    let mut parts = data.splitn(3, ':');
    let prefix = parts.next()?;
    let arg = parts.next()?;

    // `info:<id>` has no argument segment.
    if prefix == "info" {
        return arg.parse().ok().map(|id| (id, ModeratorAction::Info));
    }

    let id: i64 = parts.next()?.parse().ok()?;
    let action = match prefix {
        "mod" => match arg {
            "accept" => ModeratorAction::Accept,
            "decline" => ModeratorAction::Decline,
            "ban" => ModeratorAction::Ban,
            _ => return None,
        },
        "rep" => {
            let amount: i32 = arg.parse().ok()?;
            if !(1..=3).contains(&amount) {
                return None;
            }
            ModeratorAction::Reward(amount)
        }
        "declpen" => match arg {
            "back" => ModeratorAction::Back,
            "0" => ModeratorAction::Penalty(0),
            "1" => ModeratorAction::Penalty(1),
            _ => return None,
        },
        "ban" => match arg {
            "back" => ModeratorAction::Back,
            other => ModeratorAction::BanDuration(BanPeriod::parse(other)?),
        },
        _ => return None,
    };
    Some((id, action))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_initial_actions() {
        assert_eq!(parse_callback("mod:accept:17"), Some((17, ModeratorAction::Accept)));
        assert_eq!(parse_callback("mod:decline:3"), Some((3, ModeratorAction::Decline)));
        assert_eq!(parse_callback("mod:ban:9"), Some((9, ModeratorAction::Ban)));
    }

    #[test]
    fn test_parse_choices() {
        assert_eq!(parse_callback("rep:2:17"), Some((17, ModeratorAction::Reward(2))));
        assert_eq!(parse_callback("declpen:1:5"), Some((5, ModeratorAction::Penalty(1))));
        assert_eq!(parse_callback("declpen:back:5"), Some((5, ModeratorAction::Back)));
        assert_eq!(
            parse_callback("ban:24h:8"),
            Some((8, ModeratorAction::BanDuration(BanPeriod::Hours24)))
        );
        assert_eq!(
            parse_callback("ban:forever:8"),
            Some((8, ModeratorAction::BanDuration(BanPeriod::Forever)))
        );
        assert_eq!(parse_callback("info:12"), Some((12, ModeratorAction::Info)));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(parse_callback("rep:9:17"), None); // out-of-range reward
        assert_eq!(parse_callback("declpen:2:5"), None);
        assert_eq!(parse_callback("ban:1y:8"), None);
        assert_eq!(parse_callback("mod:accept"), None);
        assert_eq!(parse_callback("mod:accept:x"), None);
        assert_eq!(parse_callback("unknown:accept:1"), None);
        assert_eq!(parse_callback(""), None);
    }

    #[test]
    fn test_ban_period_until() {
        assert_eq!(BanPeriod::Hours12.until(0), 43_200);
        assert_eq!(BanPeriod::Hours24.until(100), 86_500);
        assert_eq!(BanPeriod::Days7.until(0), 604_800);
        assert_eq!(BanPeriod::Forever.until(0), PERMANENT_BAN);
    }
}
