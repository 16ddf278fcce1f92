//! Embed-snippet text for the code-blocks screen.

use lift_core::AccountId;

/// CDN locations of the published tracker scripts. The snippet text around
/// them is an external contract: landing pages already embedding these blocks
/// must keep working.
pub const TRACKER_SCRIPT_URL: &str = "https://cdn.lift-analytics.example/tracker_script.js";
pub const THANK_YOU_SCRIPT_URL: &str = "https://cdn.lift-analytics.example/thank_you_script.js";

/// Block for the landing-page header: identifies the account and offer so the
/// tracker can attribute clicks.
pub fn tracker_snippet(account: &AccountId, offer: &str) -> String {
    format!(
        "<meta name=\"username\" content=\"{account}\">\n\
         <meta name=\"offer\" content=\"{offer}\">\n\
         <script src=\"{TRACKER_SCRIPT_URL}\" defer></script>"
    )
}

/// Block for the thank-you page: reports completed purchases for the offer.
pub fn thank_you_snippet(offer: &str) -> String {
    format!(
        "<meta name=\"offer\" content=\"{offer}\">\n\
         <script src=\"{THANK_YOU_SCRIPT_URL}\" defer></script>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_snippet_carries_account_and_offer() {
        let snippet = tracker_snippet(&AccountId::new("acct-1"), "course");
        assert!(snippet.contains("content=\"acct-1\""));
        assert!(snippet.contains("content=\"course\""));
        assert!(snippet.contains(TRACKER_SCRIPT_URL));
    }

    #[test]
    fn thank_you_snippet_omits_the_account() {
        let snippet = thank_you_snippet("course");
        assert!(snippet.contains("content=\"course\""));
        assert!(!snippet.contains("username"));
    }
}
