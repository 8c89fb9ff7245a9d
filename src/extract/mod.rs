use html_escape::decode_html_entities;
use log::debug;
use scraper::Html;

use crate::error::IngestError;
use crate::model::ExtractedRecipe;

mod json_ld;
mod microdata;

pub use json_ld::JsonLdExtractor;
pub use microdata::MicroDataExtractor;

/// Parsed page handed to each extractor.
pub struct ParsingContext {
    pub url: String,
    pub document: Html,
}

/// A deterministic structured-data extractor. Implementations return
/// `NotSupported` whenever the page lacks data they understand; they never
/// fail hard on malformed markup.
pub trait StructuredExtractor {
    fn name(&self) -> &'static str;
    fn parse(&self, context: &ParsingContext) -> Result<ExtractedRecipe, IngestError>;
}

/// Try every structured extractor in order and return the first usable
/// recipe. All misses collapse into a single `NotSupported`, which callers
/// treat as the signal to offer the generative path.
pub fn run(url: &str, html: &str) -> Result<ExtractedRecipe, IngestError> {
    let context = ParsingContext {
        url: url.to_string(),
        document: Html::parse_document(html),
    };

    let extractors: [&dyn StructuredExtractor; 2] = [&JsonLdExtractor, &MicroDataExtractor];
    for extractor in extractors {
        match extractor.parse(&context) {
            Ok(recipe) => {
                debug!("Extractor {} produced a recipe", extractor.name());
                return Ok(recipe);
            }
            Err(e) => {
                debug!("Extractor {} declined: {}", extractor.name(), e);
            }
        }
    }

    Err(IngestError::NotSupported)
}

/// Some sites double-encode entities; decoding twice fixes both cases.
pub(crate) fn decode_html_symbols(text: &str) -> String {
    decode_html_entities(&decode_html_entities(text)).into_owned()
}

pub(crate) fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Convert an ISO 8601 duration to a human-readable string: PT30M becomes
/// "30 minutes", PT90M "1 hour 30 minutes". Range forms like PT15-20M keep
/// the range; anything unrecognized passes through untouched.
pub(crate) fn humanize_duration(duration: &str) -> String {
    let Some(body) = duration.strip_prefix("PT") else {
        return duration.to_string();
    };

    // Seconds-only durations (PT5400S, PT5400.0S) convert wholesale
    if let Some(sec_str) = body.strip_suffix('S') {
        if !body.contains('H') && !body.contains('M') {
            if let Ok(seconds) = sec_str.parse::<f64>() {
                if let Some(text) = format_minutes((seconds / 60.0).round() as u32) {
                    return text;
                }
            }
            return duration.to_string();
        }
    }

    let mut hours: u32 = 0;
    let mut rest = body;
    if let Some(h_pos) = rest.find('H') {
        hours = rest[..h_pos].parse().unwrap_or(0);
        rest = &rest[h_pos + 1..];
    }

    if let Some(m_pos) = rest.find('M') {
        let minutes_str = &rest[..m_pos];
        if minutes_str.contains('-') {
            // ranges stay textual
            let prefix = if hours > 0 {
                format!("{} hour{} ", hours, plural(hours))
            } else {
                String::new()
            };
            return format!("{}{} minutes", prefix, minutes_str);
        }
        if let Ok(minutes) = minutes_str.parse::<u32>() {
            if let Some(text) = format_minutes(hours * 60 + minutes) {
                return text;
            }
        }
    } else if hours > 0 {
        return format!("{} hour{}", hours, plural(hours));
    }

    duration.to_string()
}

fn format_minutes(total: u32) -> Option<String> {
    if total == 0 {
        return None;
    }
    let hours = total / 60;
    let minutes = total % 60;
    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{} hour{}", hours, plural(hours)));
    }
    if minutes > 0 {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&format!("{} minute{}", minutes, plural(minutes)));
    }
    Some(out)
}

fn plural(n: u32) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// Split a yield string into a count and a unit: "24 cookies" gives
/// (Some(24), "cookies"), a bare "4" keeps the default "servings" unit.
pub(crate) fn split_yield(text: &str) -> (Option<u32>, String) {
    let mut count = None;
    let mut unit = None;

    for token in text.split_whitespace() {
        let cleaned = token.trim_matches(|c: char| !c.is_alphanumeric());
        if count.is_none() {
            if let Ok(n) = cleaned.parse::<u32>() {
                count = Some(n);
                continue;
            }
        } else if unit.is_none() && cleaned.chars().all(|c| c.is_alphabetic()) && !cleaned.is_empty()
        {
            unit = Some(cleaned.to_lowercase());
            break;
        }
    }

    (count, unit.unwrap_or_else(|| "servings".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_conversion() {
        assert_eq!(humanize_duration("PT30M"), "30 minutes");
        assert_eq!(humanize_duration("PT1H"), "1 hour");
        assert_eq!(humanize_duration("PT1H30M"), "1 hour 30 minutes");
        assert_eq!(humanize_duration("PT90M"), "1 hour 30 minutes");
        assert_eq!(humanize_duration("PT2H15M"), "2 hours 15 minutes");
        assert_eq!(humanize_duration("invalid"), "invalid");
        // ranges
        assert_eq!(humanize_duration("PT15-20M"), "15-20 minutes");
        assert_eq!(humanize_duration("PT1H15-20M"), "1 hour 15-20 minutes");
        // seconds
        assert_eq!(humanize_duration("PT5400S"), "1 hour 30 minutes");
        assert_eq!(humanize_duration("PT5400.0S"), "1 hour 30 minutes");
        assert_eq!(humanize_duration("PT300S"), "5 minutes");
        // large minute values roll over into hours
        assert_eq!(humanize_duration("PT150M"), "2 hours 30 minutes");
        assert_eq!(humanize_duration("PT180M"), "3 hours");
        assert_eq!(humanize_duration("PT65M"), "1 hour 5 minutes");
    }

    #[test]
    fn test_yield_splitting() {
        assert_eq!(split_yield("24 cookies"), (Some(24), "cookies".to_string()));
        assert_eq!(split_yield("4"), (Some(4), "servings".to_string()));
        assert_eq!(split_yield("Makes 12 muffins"), (Some(12), "muffins".to_string()));
        assert_eq!(split_yield("Serves 6"), (Some(6), "servings".to_string()));
        assert_eq!(split_yield("one loaf"), (None, "servings".to_string()));
        assert_eq!(split_yield(""), (None, "servings".to_string()));
    }

    #[test]
    fn test_double_encoded_entities() {
        assert_eq!(decode_html_symbols("Fish &amp;amp; Chips"), "Fish & Chips");
        assert_eq!(decode_html_symbols("Mac &amp; Cheese"), "Mac & Cheese");
    }

    #[test]
    fn test_run_declines_on_plain_page() {
        let html = "<html><body><p>Just a blog post, no recipe.</p></body></html>";
        let result = run("https://example.com/post", html);
        assert!(matches!(result, Err(IngestError::NotSupported)));
    }
}
