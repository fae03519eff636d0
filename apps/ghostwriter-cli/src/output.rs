//! Terminal formatting for workflow results.

use chrono::{DateTime, Utc};
use colored::Colorize;
use ghostwriter_core::{
    Decision, GeneratedContent, Originality, RateLimiter, SearchOutcome, Session,
};

/// Format generated content followed by its originality verdict.
pub fn format_generated(content: &GeneratedContent) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", "Generated Content:".bold()));
    out.push_str(&content.text);
    out.push_str("\n\n");

    if content.placeholder {
        return out;
    }

    out.push_str(&format!(
        "{}\n",
        "Searching for Similar Content Online:".bold()
    ));
    out.push_str(&format_originality(&content.search, content.originality()));
    out
}

/// Format the result of a regeneration.
pub fn format_regenerated(text: &str) -> String {
    format!(
        "{}\n{text}\n\n{}\n",
        "Regenerated Content:".bold(),
        "Content has been regenerated for originality.".green()
    )
}

/// Format an originality verdict and the hits behind it.
pub fn format_originality(search: &SearchOutcome, verdict: Originality<'_>) -> String {
    let mut out = String::new();
    match verdict {
        Originality::Original => {
            out.push_str(&format!(
                "{}\n",
                "No similar content found online. Your content seems original!".green()
            ));
        }
        Originality::SimilarFound { total, shown } => {
            out.push_str(&format!(
                "{}\n",
                format!("Similar content found on the web ({total} results):").yellow()
            ));
            for (i, hit) in shown.iter().enumerate() {
                out.push_str(&format!("\n  {}. {}\n", i + 1, hit.title.bold()));
                if let Some(link) = &hit.link {
                    out.push_str(&format!("     Source: {link}\n"));
                }
                if let Some(snippet) = &hit.snippet {
                    out.push_str(&format!("     Snippet: {}\n", snippet.trim()));
                }
            }
            out.push_str(&format!(
                "\n{}\n",
                "To ensure originality, run `ghostwriter regenerate`.".yellow()
            ));
        }
        Originality::Unchecked => {
            let reason = match search {
                SearchOutcome::Error(e) => e.to_string(),
                _ => "search was skipped".to_owned(),
            };
            out.push_str(&format!(
                "{}\n",
                format!("Originality could not be checked: {reason}").red()
            ));
        }
    }
    out
}

/// Format the session counters and cooldown state.
pub fn format_status(session: &Session, limiter: &RateLimiter, now: DateTime<Utc>) -> String {
    let mut out = format!(
        "Requests used: {}/{}\n",
        limiter.used(session, now),
        limiter.max_requests()
    );
    match limiter.peek(session, now) {
        Decision::Blocked { remaining_secs } => out.push_str(&format!(
            "{}\n",
            format!("Session limit reached. Try again in {remaining_secs} seconds.").red()
        )),
        Decision::Admit => out.push_str("Ready to generate.\n"),
    }
    if session.last_generated_text.is_some() {
        out.push_str("Last generation available for `ghostwriter regenerate`.\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use ghostwriter_core::{SearchError, SearchResult};

    use super::*;

    fn hit(i: usize) -> SearchResult {
        SearchResult {
            title: format!("Result {i}"),
            link: Some(format!("https://example.com/{i}")),
            snippet: Some(format!(" snippet {i} ")),
        }
    }

    #[test]
    fn test_should_format_similar_hits_with_sources() {
        let outcome = SearchOutcome::Results(vec![hit(1), hit(2)]);
        let text = format_originality(&outcome, outcome.originality(5));

        assert!(text.contains("Similar content found on the web (2 results)"));
        assert!(text.contains("Result 1"));
        assert!(text.contains("Source: https://example.com/2"));
        assert!(text.contains("Snippet: snippet 2\n"));
        assert!(text.contains("ghostwriter regenerate"));
    }

    #[test]
    fn test_should_only_list_shown_hits() {
        let outcome = SearchOutcome::Results((0..8).map(hit).collect());
        let text = format_originality(&outcome, outcome.originality(5));

        assert!(text.contains("(8 results)"));
        assert!(text.contains("Result 4"));
        assert!(!text.contains("Result 5"));
    }

    #[test]
    fn test_should_format_original_verdict() {
        let outcome = SearchOutcome::Results(Vec::new());
        let text = format_originality(&outcome, outcome.originality(5));
        assert!(text.contains("seems original"));
    }

    #[test]
    fn test_should_explain_unchecked_verdict() {
        let outcome = SearchOutcome::Error(SearchError::Status {
            status: 403,
            body: "forbidden".to_owned(),
        });
        let text = format_originality(&outcome, outcome.originality(5));
        assert!(text.contains("search API error: 403 - forbidden"));
    }

    #[test]
    fn test_should_format_regenerated_text() {
        let text = format_regenerated("Fresh words");
        assert!(text.contains("Regenerated Content:"));
        assert!(text.contains("Fresh words\n"));
        assert!(text.contains("regenerated for originality"));
    }

    #[test]
    fn test_should_format_blocked_status() {
        let now = Utc::now();
        let session = Session::builder()
            .request_count(5)
            .blocked_until(now + chrono::Duration::seconds(120))
            .build();

        let text = format_status(&session, &RateLimiter::default(), now);
        assert!(text.contains("Requests used: 5/5"));
        assert!(text.contains("Try again in 120 seconds"));
    }

    #[test]
    fn test_should_round_remaining_time_up() {
        let now = Utc::now();
        let session = Session::builder()
            .request_count(5)
            .blocked_until(now + chrono::Duration::milliseconds(899_500))
            .build();

        let text = format_status(&session, &RateLimiter::default(), now);
        assert!(text.contains("Try again in 900 seconds"));
    }

    #[test]
    fn test_should_report_limit_before_block_is_recorded() {
        let session = Session::builder().request_count(5).build();
        let text = format_status(&session, &RateLimiter::default(), Utc::now());

        assert!(text.contains("Session limit reached. Try again in 900 seconds."));
        assert!(!text.contains("Ready to generate."));
    }

    #[test]
    fn test_should_show_fresh_window_after_cooldown() {
        let now = Utc::now();
        let session = Session::builder()
            .request_count(5)
            .blocked_until(now - chrono::Duration::seconds(1))
            .build();

        let text = format_status(&session, &RateLimiter::default(), now);
        assert!(text.contains("Requests used: 0/5"));
        assert!(text.contains("Ready to generate."));
    }

    #[test]
    fn test_should_format_ready_status() {
        let session = Session::builder().last_generated_text("draft").build();
        let text = format_status(&session, &RateLimiter::default(), Utc::now());
        assert!(text.contains("Requests used: 0/5"));
        assert!(text.contains("Ready to generate."));
        assert!(text.contains("ghostwriter regenerate"));
    }
}
