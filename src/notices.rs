//! Submitter-facing notice templates.
//!
//! Localization is handled by the transport adapter; these are the neutral
//! default strings the core emits. The remaining-time format is part of the
//! contract: `{days}d, {hours}h, {minutes}m`.

/// Sentinel `banned_until` value for a permanent ban.
pub const PERMANENT_BAN: i64 = (i32::MAX) as i64;

pub const CONFIRM_SENT: &str =
    "Your post was submitted for review. Please wait while it is checked.";

pub const DECLINE_NOTICE: &str = "Your post was declined.";

pub const PERMANENT_BANNED_NOTICE: &str =
    "You were permanently banned from suggesting posts.";

pub const UNBANNED_NOTICE: &str =
    "Your submission ban has expired! You can suggest posts again.";

pub const ADMIN_UNBANNED_NOTICE: &str =
    "You have been unbanned from the post suggestion system. You can suggest posts again.";

pub fn accept_notice(reward: i32) -> String {
    format!("Your post was accepted! You earned +{reward} reputation.")
}

pub fn decline_penalty_notice(penalty: i32) -> String {
    format!("Your post was declined. You lost -{penalty} reputation.")
}

pub fn banned_notice(remaining: &str) -> String {
    format!("You were banned from suggesting posts for {remaining}.")
}

/// Format the time left until `until` as `{days}d, {hours}h, {minutes}m`.
/// Already-expired or unset bans render as zero.
pub fn format_remaining(now: i64, until: i64) -> String {
    if until <= 0 {
        return "0d, 0h, 0m".to_string();
    }
    let rem = until - now;
    if rem <= 0 {
        return "0d, 0h, 0m".to_string();
    }
    let days = rem / 86_400;
    let hours = (rem % 86_400) / 3_600;
    let minutes = (rem % 3_600) / 60;
    format!("{days}d, {hours}h, {minutes}m")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_remaining_rounds_down() {
        // 24h minus the second that elapsed since the ban was set.
        assert_eq!(format_remaining(1, 86_400), "0d, 23h, 59m");
        assert_eq!(format_remaining(0, 86_400), "1d, 0h, 0m");
        assert_eq!(format_remaining(0, 3 * 86_400 + 3_600 + 120), "3d, 1h, 2m");
    }

    #[test]
    fn test_format_remaining_expired() {
        assert_eq!(format_remaining(100, 100), "0d, 0h, 0m");
        assert_eq!(format_remaining(100, 0), "0d, 0h, 0m");
    }
}
