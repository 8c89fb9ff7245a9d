use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Ingredient-quantity markers: numbers in instruction text become
/// `[[qty:VALUE]]`, ranges `[[qty:MIN-MAX]]`, with fractions normalized to
/// decimals. Numbers in temperature, duration, or equipment-dimension
/// contexts are left alone, and the pass is idempotent over already-tagged
/// text. When in doubt a number stays untagged; a missed tag is cheaper
/// than corrupted text.

const NUM_PART: &str =
    r"(?:\d+\s\d+/\d+|\d+\s?[¼½¾⅓⅔⅛⅜⅝⅞]|\d+/\d+|\d+(?:\.\d+)?|[¼½¾⅓⅔⅛⅜⅝⅞])";

const EXCLUDED_UNITS: &[&str] = &[
    "degree", "degrees", "f", "c", "fahrenheit", "celsius", "minute", "minutes", "min", "mins",
    "hour", "hours", "hr", "hrs", "second", "seconds", "sec", "secs", "day", "days", "week",
    "weeks", "inch", "inches", "cm", "mm", "x",
];

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // branch order: existing tags pass through, then pan dimensions,
        // then numbers with an optional range tail
        let pattern = format!(
            r"\[\[qty:[^\]]*\]\]|\d+\s*[x×]\s*\d+|(?P<a>{num})(?:\s*[-–]\s*(?P<b>{num}))?",
            num = NUM_PART
        );
        Regex::new(&pattern).expect("static pattern")
    })
}

/// Tag ingredient quantities in one instruction line.
pub fn tag_quantities(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut last = 0;

    for caps in token_re().captures_iter(text) {
        let m = caps.get(0).expect("group 0 always present");
        out.push_str(&text[last..m.start()]);
        last = m.end();
        let token = m.as_str();

        if caps.name("a").is_none() || is_excluded(text, m.start(), m.end()) {
            // existing tag, dimension, or excluded context
            out.push_str(token);
            continue;
        }

        match render_tag(&caps) {
            Some(tag) => out.push_str(&tag),
            None => out.push_str(token),
        }
    }

    out.push_str(&text[last..]);
    out
}

/// Tag a whole instruction list; the usual entry point for deriving the
/// cached instruction template.
pub fn tag_instructions(instructions: &[String]) -> Vec<String> {
    instructions.iter().map(|i| tag_quantities(i)).collect()
}

fn render_tag(caps: &Captures) -> Option<String> {
    let a = parse_number(caps.name("a")?.as_str())?;
    match caps.name("b") {
        Some(b) => {
            let b = parse_number(b.as_str())?;
            Some(format!("[[qty:{}-{}]]", format_qty(a), format_qty(b)))
        }
        None => Some(format!("[[qty:{}]]", format_qty(a))),
    }
}

fn is_excluded(text: &str, start: usize, end: usize) -> bool {
    // attached characters mean word fragments, clock times, percentages,
    // temperatures ("V8", "2:30", "2%", "350°F", "350F")
    if let Some(prev) = text[..start].chars().next_back() {
        if prev.is_alphanumeric() || matches!(prev, ':' | '.' | '/' | '-' | '–' | '#' | '$') {
            return true;
        }
    }
    let after = &text[end..];
    if let Some(next) = after.chars().next() {
        if next.is_alphanumeric() || matches!(next, ':' | '%' | '°' | '/') {
            return true;
        }
    }

    // "at 350", "step 2", "no. 5"
    if let Some(word) = text[..start].split_whitespace().next_back() {
        let word = word
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if matches!(word.as_str(), "at" | "step" | "no" | "number") {
            return true;
        }
    }

    // unit word after the number: temperatures, durations, dimensions
    let mut rest = after.trim_start();
    if rest.starts_with('°') {
        return true;
    }
    if let Some(stripped) = rest.strip_prefix(['-', '–']) {
        rest = stripped;
    }
    let unit: String = rest
        .chars()
        .take_while(|c| c.is_alphabetic())
        .collect::<String>()
        .to_lowercase();
    !unit.is_empty() && EXCLUDED_UNITS.contains(&unit.as_str())
}

fn parse_number(token: &str) -> Option<f64> {
    let token = token.trim();

    // unicode fraction suffix: "½", "1½", "1 ½"
    if let Some(last) = token.chars().next_back() {
        if let Some(frac) = unicode_fraction_value(last) {
            let head = token[..token.len() - last.len_utf8()].trim();
            let whole: f64 = if head.is_empty() { 0.0 } else { head.parse().ok()? };
            return Some(whole + frac);
        }
    }

    // mixed number: "1 1/2"
    if let Some((whole, frac)) = token.split_once(char::is_whitespace) {
        let whole: f64 = whole.trim().parse().ok()?;
        return Some(whole + parse_fraction(frac.trim())?);
    }

    if token.contains('/') {
        return parse_fraction(token);
    }
    token.parse().ok()
}

fn parse_fraction(token: &str) -> Option<f64> {
    let (num, den) = token.split_once('/')?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    if den == 0.0 {
        None
    } else {
        Some(num / den)
    }
}

fn unicode_fraction_value(c: char) -> Option<f64> {
    Some(match c {
        '¼' => 0.25,
        '½' => 0.5,
        '¾' => 0.75,
        '⅓' => 1.0 / 3.0,
        '⅔' => 2.0 / 3.0,
        '⅛' => 0.125,
        '⅜' => 0.375,
        '⅝' => 0.625,
        '⅞' => 0.875,
        _ => return None,
    })
}

fn format_qty(value: f64) -> String {
    if value.fract().abs() < 1e-9 {
        format!("{}", value as i64)
    } else {
        let s = format!("{:.3}", value);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}
