//! Preparing paper text for a model prompt within a character budget.

use crate::models::Section;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Sections sent first, in this order, when the budget is tight.
pub const PRIORITY_SECTIONS: [&str; 15] = [
    "Abstract",
    "Introduction",
    "Methods",
    "Methodology",
    "Method",
    "Approach",
    "Model",
    "Results",
    "Experiments",
    "Evaluation",
    "Discussion",
    "Conclusion",
    "Conclusions",
    "Related Work",
    "Background",
];

const TRUNCATED_CONTENT: &str = "\n\n[Content truncated due to length]";
const TRUNCATED_SECTION: &str = "\n\n[Truncated]\n\n";

static SECTION_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\d.:\s]+").expect("valid section number regex"));

/// Whether a section heading matches a priority keyword.
///
/// Handles numbered headings like `3. Methodology` or `2 Methods and Data`.
pub fn matches_priority(section_name: &str, priority: &str) -> bool {
    let cleaned = SECTION_NUMBER.replace(section_name, "");
    cleaned
        .trim()
        .to_lowercase()
        .contains(&priority.to_lowercase())
}

/// Build prompt content from sections, important ones first.
///
/// Falls back to the full text when fewer than three real sections exist.
pub fn prepare_content(sections: &[Section], full_text: &str, max_chars: usize) -> String {
    let real: Vec<&Section> = sections.iter().filter(|s| s.name != "Title").collect();

    if real.len() < 3 {
        let mut content = truncate_chars(full_text, max_chars).to_string();
        if full_text.chars().count() > max_chars {
            content.push_str(TRUNCATED_CONTENT);
        }
        return content;
    }

    let mut budget = Budget {
        parts: Vec::new(),
        used: HashSet::new(),
        char_count: 0,
        max_chars,
    };

    for priority in PRIORITY_SECTIONS {
        for section in &real {
            if budget.used.contains(section.name.as_str()) {
                continue;
            }
            if matches_priority(&section.name, priority) && !budget.push(section) {
                break;
            }
        }
    }

    for section in &real {
        if budget.used.contains(section.name.as_str()) {
            continue;
        }
        if !budget.push(section) {
            break;
        }
    }

    budget.parts.concat()
}

struct Budget<'a> {
    parts: Vec<String>,
    used: HashSet<&'a str>,
    char_count: usize,
    max_chars: usize,
}

impl<'a> Budget<'a> {
    /// Add a section, truncating it if it does not fit. Returns false once full.
    fn push(&mut self, section: &'a Section) -> bool {
        let header = format!("## {}\n\n", section.name);
        let entry = format!("{}{}\n\n", header, section.text.trim());
        let entry_len = entry.chars().count();

        if self.char_count + entry_len <= self.max_chars {
            self.char_count += entry_len;
            self.parts.push(entry);
            self.used.insert(section.name.as_str());
            return true;
        }

        let remaining =
            self.max_chars as i64 - self.char_count as i64 - header.chars().count() as i64 - 50;
        if remaining > 200 {
            let partial = truncate_chars(&section.text, remaining as usize).trim();
            let entry = format!("{}{}{}", header, partial, TRUNCATED_SECTION);
            self.char_count += entry.chars().count();
            self.parts.push(entry);
            self.used.insert(section.name.as_str());
        }
        false
    }
}

/// Prefix of `s` holding at most `max` characters.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
