use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

pub const NAMESPACE_SEPARATOR: char = '_';

/// Collapses every whitespace run to `_` after trimming, so
/// `"  Acme  Holdings Ltd "` becomes `"Acme_Holdings_Ltd"`.
pub fn normalize_namespace_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut pending_separator = false;
    for ch in name.trim().chars() {
        if ch.is_whitespace() {
            pending_separator = true;
            continue;
        }
        if pending_separator {
            result.push(NAMESPACE_SEPARATOR);
            pending_separator = false;
        }
        result.push(ch);
    }
    result
}

pub fn normalize_line(line: &str) -> String {
    let trimmed = line.trim_matches(|c: char| c.is_control() || c.is_whitespace());
    let nfkc = trimmed.nfkc().collect::<String>();
    let mut result = String::with_capacity(nfkc.len());
    let mut prev_space = false;
    for ch in nfkc.chars() {
        if ch.is_whitespace() {
            if !prev_space {
                result.push(' ');
                prev_space = true;
            }
        } else if ch.is_control() {
            continue;
        } else {
            result.push(ch);
            prev_space = false;
        }
    }
    result.trim().to_string()
}

/// Line-wise cleanup of extracted page text. Line structure is kept (the
/// chunker relies on whitespace after punctuation); runs of blank lines are
/// squeezed to one.
pub fn clean_extracted_text(text: &str) -> String {
    let mut out = Vec::new();
    let mut previous_blank = true;
    for line in text.lines() {
        let normalized = normalize_line(line);
        if normalized.is_empty() {
            if !previous_blank {
                out.push(String::new());
            }
            previous_blank = true;
            continue;
        }
        out.push(normalized);
        previous_blank = false;
    }
    while out.last().is_some_and(|line| line.is_empty()) {
        out.pop();
    }
    out.join("\n")
}

/// Layout heuristic for a table row in raw extracted text: explicit pipe or
/// tab separators, a totals line with a currency/percent unit, or at least
/// three tokens with a wide column gap. Must run on raw lines, before
/// whitespace is collapsed.
pub fn looks_like_table_line(line: &str) -> bool {
    static TOTALS_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"\b(total|subtotal|amount)\b.*\b(usd|eur|%)").expect("totals regex")
    });
    if line.contains('|') || line.contains('\t') {
        return true;
    }
    if TOTALS_RE.is_match(&line.to_lowercase()) {
        return true;
    }
    let tokens = line.split_whitespace().count();
    tokens >= 3 && longest_space_run(line.trim()) >= 3
}

fn longest_space_run(line: &str) -> usize {
    let mut current = 0;
    let mut best = 0;
    for ch in line.chars() {
        if ch == ' ' {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    best
}
