use std::sync::OnceLock;

use regex::Regex;

fn timestamp_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // VTT uses dots, SRT commas; cue settings may trail the arrow
    RE.get_or_init(|| {
        Regex::new(r"^\d{2}:\d{2}:\d{2}[.,]\d{3}\s*-->").expect("static pattern")
    })
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("static pattern"))
}

/// Reduce a VTT or SRT caption file to plain spoken text: headers, cue
/// numbers, timestamps and inline tags go away, and consecutive duplicate
/// lines (YouTube auto-subs repeat almost every line) collapse to one.
pub fn clean_caption_text(raw: &str) -> String {
    let mut kept: Vec<String> = Vec::new();

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty()
            || line.starts_with("WEBVTT")
            || line.starts_with("Kind:")
            || line.starts_with("Language:")
            || line.starts_with("NOTE")
            || line.starts_with("STYLE")
        {
            continue;
        }
        if timestamp_re().is_match(line) {
            continue;
        }
        // bare cue numbers (SRT numbering)
        if line.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }

        let cleaned = tag_re().replace_all(line, "").trim().to_string();
        if cleaned.is_empty() {
            continue;
        }
        if kept.last().map(|last| last == &cleaned).unwrap_or(false) {
            continue;
        }
        kept.push(cleaned);
    }

    kept.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vtt_cleanup() {
        let raw = "\
WEBVTT
Kind: captions
Language: en

00:00:00.240 --> 00:00:02.820 align:start position:0%
today<00:00:00.560><c> we're</c><c> making</c><c> pasta</c>

00:00:02.820 --> 00:00:05.100
today we're making pasta

00:00:05.100 --> 00:00:08.010
first bring water to a boil
";
        let cleaned = clean_caption_text(raw);
        assert_eq!(
            cleaned,
            "today we're making pasta first bring water to a boil"
        );
    }

    #[test]
    fn test_srt_cleanup() {
        let raw = "\
1
00:00:01,000 --> 00:00:03,000
Add the garlic.

2
00:00:03,000 --> 00:00:05,000
Add the garlic.

3
00:00:05,000 --> 00:00:08,000
Stir until fragrant.
";
        let cleaned = clean_caption_text(raw);
        assert_eq!(cleaned, "Add the garlic. Stir until fragrant.");
    }

    #[test]
    fn test_empty_and_header_only_input() {
        assert_eq!(clean_caption_text(""), "");
        assert_eq!(clean_caption_text("WEBVTT\n\n"), "");
    }

    #[test]
    fn test_non_consecutive_duplicates_are_kept() {
        let raw = "stir\nrest\nstir\n";
        assert_eq!(clean_caption_text(raw), "stir rest stir");
    }
}
