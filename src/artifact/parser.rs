//! Action-element parsing from collaborator output.
//!
//! Extracts `<action type="..." path="...">body</action>` elements from raw
//! model text, in source order. Code-fence lines are stripped first so a
//! fenced artifact parses the same as a bare one.
//!
//! Body capture is an explicit scan (locate opening tag, parse attributes,
//! take everything up to the next closing tag) rather than a regex over the
//! body, so adjacent elements and adversarial input cost linear time.

use super::types::{Step, StepKind};
use regex::Regex;
use std::sync::LazyLock;

const OPEN_TAG: &str = "<action";
const CLOSE_TAG: &str = "</action>";

/// The one action type the pipeline acts on.
const FILE_WRITE_TYPE: &str = "file";

// Matches a whole fence line regardless of the language tag after the marks.
static FENCE_LINE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*```[^\n]*\n?").expect("fence regex is valid"));

/// Remove code-fence marker lines from the text.
///
/// Both opening fences (with or without a language tag) and closing fences
/// are dropped; the lines between them are kept as-is.
pub fn strip_code_fences(text: &str) -> String {
    FENCE_LINE_REGEX.replace_all(text, "").into_owned()
}

/// Parse an artifact into its ordered step trail.
///
/// Zero matches yields an empty vector, not an error: an artifact without
/// action elements is a valid (if useless) artifact, and callers decide what
/// that means for the pipeline. Pure function of the input text.
pub fn parse_artifact(text: &str) -> Vec<Step> {
    let text = strip_code_fences(text);
    let mut steps = Vec::new();
    let mut cursor = 0;

    while let Some(found) = text[cursor..].find(OPEN_TAG) {
        let open_start = cursor + found;
        let attrs_start = open_start + OPEN_TAG.len();

        // Reject prefixes of longer tag names ("<actionable").
        match text[attrs_start..].chars().next() {
            Some(c) if c.is_whitespace() || c == '>' => {}
            _ => {
                cursor = attrs_start;
                continue;
            }
        }

        // The opening tag runs to the next '>'. Without one the element can
        // never be complete, and neither can anything after it.
        let Some(gt) = text[attrs_start..].find('>') else {
            break;
        };
        let attrs = parse_attributes(&text[attrs_start..attrs_start + gt]);
        let body_start = attrs_start + gt + 1;

        // Non-greedy body: everything up to the first closing tag. A missing
        // closing tag skips this element but keeps scanning, so one
        // truncated element does not swallow the rest of the artifact.
        let Some(close) = text[body_start..].find(CLOSE_TAG) else {
            cursor = body_start;
            continue;
        };
        let body = text[body_start..body_start + close].trim();
        cursor = body_start + close + CLOSE_TAG.len();

        let action_type = attrs
            .iter()
            .find(|(k, _)| k == "type")
            .map(|(_, v)| v.as_str());
        let path = attrs
            .iter()
            .find(|(k, _)| k == "path")
            .map(|(_, v)| v.clone());

        match action_type {
            Some(FILE_WRITE_TYPE) => {
                // A file write without a target is malformed; skip it.
                let Some(path) = path else {
                    tracing::debug!("skipping file action without a path attribute");
                    continue;
                };
                steps.push(Step::file_write(path, body));
            }
            Some(other) => steps.push(Step::other(other, path, body)),
            // No type attribute at all: malformed, skip.
            None => tracing::debug!("skipping action element without a type attribute"),
        }
    }

    steps
}

/// Extract all file-write steps as (path, content) pairs, in order.
pub fn file_writes(steps: &[Step]) -> Vec<(String, String)> {
    steps
        .iter()
        .filter(|s| s.kind == StepKind::FileWrite)
        .filter_map(|s| Some((s.path.clone()?, s.content.clone().unwrap_or_default())))
        .collect()
}

/// Parse `key="value"` pairs from the inside of an opening tag.
///
/// Attribute order is irrelevant to callers. Values run to the next double
/// quote; the grammar has no escaping.
fn parse_attributes(raw: &str) -> Vec<(String, String)> {
    let mut attrs = Vec::new();
    let bytes = raw.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        // Skip whitespace between attributes.
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let key_start = i;
        while i < bytes.len() && bytes[i] != b'=' && !bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b'=' {
            // Bare word with no value; ignore and move on.
            continue;
        }
        let key = raw[key_start..i].to_string();
        i += 1;
        if i >= bytes.len() || bytes[i] != b'"' {
            continue;
        }
        i += 1;
        let value_start = i;
        while i < bytes.len() && bytes[i] != b'"' {
            i += 1;
        }
        if i >= bytes.len() {
            // Unterminated value; drop the pair.
            break;
        }
        attrs.push((key, raw[value_start..i].to_string()));
        i += 1;
    }

    attrs
}
