use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{AppError, Result};

/// Field labels recognized at the start of a line. Longer variants
/// ("Current behavior", "Files to modify") match on these prefixes.
const FIELD_LABELS: [&str; 5] = ["current", "requested", "files", "tests", "confidence"];

/// Coarse risk signal the agent attaches to its scoping summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    High,
    Medium,
    Low,
    Unknown,
}

impl Confidence {
    fn from_token(token: &str) -> Option<Self> {
        match token.to_lowercase().as_str() {
            "high" | "green" => Some(Confidence::High),
            "medium" | "yellow" => Some(Confidence::Medium),
            "low" | "red" => Some(Confidence::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Confidence::High => "High",
            Confidence::Medium => "Medium",
            Confidence::Low => "Low",
            Confidence::Unknown => "Unknown",
        })
    }
}

/// Structured scoping summary parsed from the agent's final message.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopingResult {
    pub current_behavior: Option<String>,
    pub requested_change: Option<String>,
    /// Parsed file paths; empty when the files field wasn't list-shaped.
    pub files: Vec<String>,
    pub files_raw: Option<String>,
    pub tests_needed: Option<String>,
    pub confidence: Confidence,
    pub rationale: Option<String>,
    /// The message text exactly as the agent wrote it.
    pub raw: String,
}

impl ScopingResult {
    /// Parse a scoping message. Errors only when no field label and no
    /// confidence line are present at all; callers degrade to the raw text.
    pub fn parse(text: &str) -> Result<Self> {
        let mut fields: Vec<(&'static str, String)> = Vec::new();
        let mut open: Option<(&'static str, Vec<String>)> = None;

        for line in text.lines() {
            if let Some((label, value)) = label_of(line) {
                if let Some((l, lines)) = open.take() {
                    fields.push((l, lines.join("\n").trim().to_string()));
                }
                open = Some((label, vec![value.to_string()]));
            } else if let Some((_, lines)) = open.as_mut() {
                lines.push(line.trim().to_string());
            }
        }
        if let Some((l, lines)) = open.take() {
            fields.push((l, lines.join("\n").trim().to_string()));
        }

        let (confidence, rationale) = confidence_of(text);

        if fields.is_empty() && confidence == Confidence::Unknown {
            return Err(AppError::Parse(
                "no field labels or confidence marker found".to_string(),
            ));
        }

        // Last occurrence of a duplicated label wins.
        let field = |name: &str| -> Option<String> {
            fields
                .iter()
                .rev()
                .find(|(l, _)| *l == name)
                .map(|(_, v)| v.clone())
                .filter(|v| !v.is_empty())
        };

        let files_raw = field("files");
        let files = files_raw.as_deref().map(parse_file_list).unwrap_or_default();

        Ok(Self {
            current_behavior: field("current"),
            requested_change: field("requested"),
            files,
            files_raw,
            tests_needed: field("tests"),
            confidence,
            rationale,
            raw: text.to_string(),
        })
    }

    /// Fallback when nothing structured could be recovered: the verbatim
    /// text with an Unknown confidence.
    pub fn raw_only(text: &str) -> Self {
        Self {
            current_behavior: None,
            requested_change: None,
            files: Vec::new(),
            files_raw: None,
            tests_needed: None,
            confidence: Confidence::Unknown,
            rationale: None,
            raw: text.to_string(),
        }
    }
}

/// Decide whether a message is the final scoping block rather than interim
/// "thinking" output: an explicit confidence line, or at least `min_markers`
/// of the field labels at line starts.
pub fn is_final(text: &str, min_markers: usize) -> bool {
    if has_confidence_marker(text) {
        return true;
    }

    let mut seen = [false; FIELD_LABELS.len()];
    for line in text.lines() {
        if let Some((label, _)) = label_of(line) {
            if let Some(idx) = FIELD_LABELS.iter().position(|l| l == &label) {
                seen[idx] = true;
            }
        }
    }
    seen.iter().filter(|s| **s).count() >= min_markers.max(1)
}

/// Recognize a field label at the start of a line: case-insensitive, tolerant
/// of markdown decoration and longer label variants. Returns the canonical
/// label and the remainder of the line.
fn label_of(line: &str) -> Option<(&'static str, &str)> {
    let trimmed = line.trim_start_matches(['#', '-', '*', '>', ' ', '\t']);
    let (head, rest) = trimmed.split_once(':')?;
    let head = head.trim().trim_matches(['*', '_', '`']).to_lowercase();
    if head.is_empty() || head.len() > 40 {
        return None;
    }

    let label = FIELD_LABELS.iter().find(|label| {
        head.strip_prefix(**label)
            .map_or(false, |tail| tail.chars().next().map_or(true, |c| !c.is_alphanumeric()))
    })?;

    let value = rest.trim().trim_start_matches(['*', '_']).trim();
    Some((*label, value))
}

/// Pull path-like entries out of a files field: bullet lines or a single
/// comma-separated line. Anything else stays raw with no parsed entries.
fn parse_file_list(value: &str) -> Vec<String> {
    let mut files = Vec::new();

    let bullets: Vec<&str> = value
        .lines()
        .filter_map(|line| line.trim().strip_prefix(['-', '*', '\u{2022}']))
        .collect();

    if !bullets.is_empty() {
        for item in bullets {
            push_file(&mut files, item);
        }
    } else if let Some(first) = value.lines().next() {
        if first.contains(',') {
            for item in first.split(',') {
                push_file(&mut files, item);
            }
        } else if looks_like_path(first.trim()) {
            push_file(&mut files, first);
        }
    }

    files
}

fn push_file(files: &mut Vec<String>, item: &str) {
    let cleaned = item
        .trim()
        .trim_end_matches(['.', ',', ';'])
        .trim_matches('`')
        .trim();
    if !cleaned.is_empty() {
        files.push(cleaned.to_string());
    }
}

fn looks_like_path(s: &str) -> bool {
    !s.is_empty() && !s.contains(' ') && (s.contains('/') || s.contains('.'))
}

/// Line-anchored confidence marker: `Confidence: <level> <glyph> - <why>`,
/// every part after the colon optional. The color glyph is a human cue only;
/// the textual token decides the level.
fn confidence_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?im)^\s*\W{0,3}confidence[^:\n]*:\s*\**\s*(?P<level>high|medium|low|green|yellow|red)?\s*(?P<glyph>[\u{1F7E2}\u{1F7E1}\u{1F534}])?\s*(?:[-\u{2013}\u{2014}:]\s*)?(?P<why>.*)$",
        )
        .unwrap()
    })
}

fn has_confidence_marker(text: &str) -> bool {
    confidence_pattern()
        .captures_iter(text)
        .any(|caps| caps.name("level").is_some())
}

/// Extract (level, rationale) from the last confidence line carrying a level
/// token. Lines matching the shape but missing the token are skipped, so a
/// stray "confidence:" mention cannot mask a real marker.
fn confidence_of(text: &str) -> (Confidence, Option<String>) {
    let Some(caps) = confidence_pattern()
        .captures_iter(text)
        .filter(|caps| caps.name("level").is_some())
        .last()
    else {
        return (Confidence::Unknown, None);
    };

    let level = caps
        .name("level")
        .and_then(|m| Confidence::from_token(m.as_str()))
        .unwrap_or(Confidence::Unknown);

    let rationale = caps
        .name("why")
        .map(|m| m.as_str().trim().trim_end_matches('*').trim().to_string())
        .filter(|s| !s.is_empty());

    (level, rationale)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_SCOPING: &str = "\
Current behavior: /health returns 500 on every request.
Requested change: return 200 with a JSON status body.
Files:
- src/routes/health.rs
- src/server.rs
Tests: add a regression test for the happy path.
Confidence: High \u{1F7E2} \u{2014} straightforward fix";

    #[test]
    fn test_confidence_level_and_rationale() {
        let result = ScopingResult::parse(FULL_SCOPING).unwrap();
        assert_eq!(result.confidence, Confidence::High);
        assert_eq!(result.rationale.as_deref(), Some("straightforward fix"));
    }

    #[test]
    fn test_all_fields_parse() {
        let result = ScopingResult::parse(FULL_SCOPING).unwrap();
        assert_eq!(
            result.current_behavior.as_deref(),
            Some("/health returns 500 on every request.")
        );
        assert_eq!(
            result.requested_change.as_deref(),
            Some("return 200 with a JSON status body.")
        );
        assert_eq!(result.files, vec!["src/routes/health.rs", "src/server.rs"]);
        assert_eq!(
            result.tests_needed.as_deref(),
            Some("add a regression test for the happy path.")
        );
    }

    #[test]
    fn test_no_confidence_token_is_unknown_and_raw_preserved() {
        let text = "Current: broken.\nSomething else entirely.";
        let result = ScopingResult::parse(text).unwrap();
        assert_eq!(result.confidence, Confidence::Unknown);
        assert_eq!(result.raw, text);
    }

    #[test]
    fn test_prose_without_markers_is_a_parse_error() {
        let err = ScopingResult::parse("Let me take a look at the repository first.");
        assert!(matches!(err, Err(AppError::Parse(_))));
    }

    #[test]
    fn test_reparse_is_idempotent() {
        let once = ScopingResult::parse(FULL_SCOPING).unwrap();
        let twice = ScopingResult::parse(FULL_SCOPING).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_markdown_decorated_labels() {
        let text = "\
**Current behavior:** the CLI panics on empty input.
**Requested change:** print a usage hint instead.
**Files:** `src/main.rs`, `src/cli.rs`
**Tests:** cover the empty-input path.
**Confidence:** Medium \u{1F7E1} - parser is shared with other commands";
        let result = ScopingResult::parse(text).unwrap();
        assert_eq!(result.confidence, Confidence::Medium);
        assert_eq!(result.files, vec!["src/main.rs", "src/cli.rs"]);
        assert_eq!(
            result.rationale.as_deref(),
            Some("parser is shared with other commands")
        );
    }

    #[test]
    fn test_color_word_tokens_map_to_levels() {
        let (level, why) = confidence_of("Confidence: Green - trivial");
        assert_eq!(level, Confidence::High);
        assert_eq!(why.as_deref(), Some("trivial"));

        let (level, _) = confidence_of("confidence: red");
        assert_eq!(level, Confidence::Low);
    }

    #[test]
    fn test_glyph_alone_does_not_decide_the_level() {
        let (level, _) = confidence_of("Confidence: \u{1F7E2}");
        assert_eq!(level, Confidence::Unknown);
        assert!(!is_final("Confidence: \u{1F7E2}", 5));
    }

    #[test]
    fn test_files_prose_keeps_raw_and_empty_list() {
        let text = "Files: mostly the auth layer\nConfidence: Low \u{1F534} - unclear";
        let result = ScopingResult::parse(text).unwrap();
        assert!(result.files.is_empty());
        assert_eq!(result.files_raw.as_deref(), Some("mostly the auth layer"));
    }

    #[test]
    fn test_single_path_files_field() {
        let text = "Files: src/health.rs\nConfidence: High \u{1F7E2}";
        let result = ScopingResult::parse(text).unwrap();
        assert_eq!(result.files, vec!["src/health.rs"]);
    }

    #[test]
    fn test_multiline_field_value() {
        let text = "\
Requested change: split the handler.
Keep the response shape stable.
Tests: none needed.
Confidence: High \u{1F7E2}";
        let result = ScopingResult::parse(text).unwrap();
        assert_eq!(
            result.requested_change.as_deref(),
            Some("split the handler.\nKeep the response shape stable.")
        );
    }

    #[test]
    fn test_final_detection_marker_rules() {
        // Confidence line alone is enough.
        assert!(is_final("Confidence: High \u{1F7E2}", 5));
        // All five labels without a recognized level token also qualify.
        let labels_only = "\
Current: a\nRequested: b\nFiles: c\nTests: d\nConfidence: not sure yet";
        assert!(is_final(labels_only, 5));
        // Two labels are not enough at the strict threshold...
        let partial = "Current: a\nRequested: b";
        assert!(!is_final(partial, 5));
        // ...but pass once the threshold is relaxed.
        assert!(is_final(partial, 2));
        // Plain thinking output never qualifies.
        assert!(!is_final("Cloning the repository and reading the code...", 2));
    }

    #[test]
    fn test_label_prefix_needs_a_word_boundary() {
        assert!(label_of("Filesystem: everything").is_none());
        assert!(label_of("Files to modify: src/a.rs").is_some());
        assert!(label_of("Tests needed: none").is_some());
    }

    #[test]
    fn test_last_confidence_line_wins() {
        let text = "Confidence: Low \u{1F534} - first guess\nConfidence: High \u{1F7E2} - after reading the code";
        let (level, why) = confidence_of(text);
        assert_eq!(level, Confidence::High);
        assert_eq!(why.as_deref(), Some("after reading the code"));
    }

    #[test]
    fn test_levelless_confidence_mention_does_not_mask_the_marker() {
        let text = "Confidence: High \u{1F7E2} - fix\n\nconfidence caveats: data migration is untested";
        let (level, why) = confidence_of(text);
        assert_eq!(level, Confidence::High);
        assert_eq!(why.as_deref(), Some("fix"));
    }

    #[test]
    fn test_raw_only_fallback() {
        let result = ScopingResult::raw_only("free text");
        assert_eq!(result.confidence, Confidence::Unknown);
        assert_eq!(result.raw, "free text");
        assert!(result.files.is_empty());
    }
}
