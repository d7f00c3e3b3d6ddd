use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

/// A numbered continuation at the start of a line: `2. Rester au village.`
static OPTION_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\d+\.\s+(.*)$").expect("option pattern"));

/// Introductions to the option list. They are cut before options are read, so
/// a list starting on the same line (`Choisissez : 1. Partir.`) still counts.
static INTRODUCTIONS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?:Voici|Voilà)(?: quelques)? options[^:\n]*:",
        r"(?:Choisissez|Sélectionnez)[^:\n]*:",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("introduction pattern"))
    .collect()
});

/// Phrases the narrator is told never to write. Each match is dropped from the
/// prose, in this order.
static FORBIDDEN: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // Direct questions to the user.
        r"Que (?:voulez|souhaitez|préférez)[^?\n]*\?",
        r"Que (?:choisissez|décidez)[^?\n]*\?",
        // Any sentence addressing the reader.
        r"Mais peut-être est-ce vous, lecteur[^.\n]*\.",
        r"(?i)[^.!?\n]*\blecteur[^.!?\n]*[.!?]",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("forbidden phrase pattern"))
    .collect()
});

static BLANK_RUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n\s*\n").expect("blank line pattern"));

/// One narrator response split into prose and proposed continuations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub text: String,
    pub options: Vec<String>,
    /// Set when cleaning left nothing and `text` is the raw response.
    pub fell_back: bool,
}

/// Pull the numbered options out of a completed narrator response and scrub
/// the remaining prose.
///
/// An option runs from its number to the next numbered line, a blank line, or
/// the end of the text. If nothing readable survives the cleanup, the raw
/// response is returned as the text so a turn is never displayed empty.
pub fn extract_options(raw: &str) -> Extraction {
    let mut prepared = raw.to_string();
    for pattern in INTRODUCTIONS.iter() {
        prepared = pattern.replace_all(&prepared, "\n").into_owned();
    }

    let mut kept: Vec<&str> = Vec::new();
    let mut options: Vec<String> = Vec::new();
    let mut pending: Option<String> = None;

    for line in prepared.lines() {
        if let Some(caps) = OPTION_LINE.captures(line) {
            flush(&mut pending, &mut options);
            pending = Some(caps[1].to_string());
        } else if line.trim().is_empty() {
            flush(&mut pending, &mut options);
            kept.push(line);
        } else if let Some(option) = pending.as_mut() {
            option.push('\n');
            option.push_str(line);
        } else {
            kept.push(line.trim_end());
        }
    }
    flush(&mut pending, &mut options);

    let text = clean(&kept.join("\n"));
    debug!(
        "Extracted {} options, {} chars of prose",
        options.len(),
        text.len()
    );

    if text.trim().is_empty() {
        return Extraction {
            text: raw.to_string(),
            options,
            fell_back: true,
        };
    }

    Extraction {
        text,
        options,
        fell_back: false,
    }
}

fn flush(pending: &mut Option<String>, options: &mut Vec<String>) {
    if let Some(option) = pending.take() {
        let option = option.trim();
        if !option.is_empty() {
            options.push(option.to_string());
        }
    }
}

fn clean(text: &str) -> String {
    let mut cleaned = text.to_string();
    for pattern in FORBIDDEN.iter() {
        cleaned = pattern.replace_all(&cleaned, "").into_owned();
    }
    cleaned = BLANK_RUNS.replace_all(&cleaned, "\n\n").into_owned();
    cleaned.trim().to_string()
}
