use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s").expect("whitespace"));
static WHITESPACE_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace run"));
static ILLEGAL_FILENAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).expect("illegal filename chars"));

pub const FALLBACK_STEM: &str = "report";

/// Output file stem for a project title: each whitespace or illegal character becomes `_`.
pub fn output_file_stem(project_title: &str) -> String {
    let stem = WHITESPACE_RE.replace_all(project_title.trim(), "_");
    let stem = ILLEGAL_FILENAME_RE.replace_all(&stem, "_");
    let stem = stem.trim_end_matches('.');
    if stem.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        stem.to_string()
    }
}

/// One-line preview for log output.
pub fn preview(text: &str, max_chars: usize) -> String {
    let flat = WHITESPACE_RUN_RE.replace_all(text.trim(), " ");
    match flat.char_indices().nth(max_chars) {
        Some((i, _)) => format!("{}…", &flat[..i]),
        None => flat.into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stem_replaces_whitespace_and_illegal_chars() {
        assert_eq!(output_file_stem("MINI PROJECT (BCS586)"), "MINI_PROJECT_(BCS586)");
        assert_eq!(output_file_stem("a\tb  c"), "a_b__c");
        assert_eq!(output_file_stem("AI/ML: Review?"), "AI_ML__Review_");
        assert_eq!(output_file_stem("   "), "report");
        assert_eq!(output_file_stem("..."), "report");
    }

    #[test]
    fn preview_flattens_and_truncates() {
        assert_eq!(preview("one\ntwo  three", 100), "one two three");
        assert_eq!(preview("abcdef", 3), "abc…");
        assert_eq!(preview(" a \r\n\t b ", 10), "a b");
    }
}
