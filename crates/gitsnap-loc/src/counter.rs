//! The line counter and its block-comment state machine.

use crate::{CountError, Language};

/// Leading sample handed to the encoding detector.
const ENCODING_SAMPLE_BYTES: usize = 8 * 1024;

const PYTHON_MULTILINE_STRING: &str = "\"\"\"";

/// Count the lines of code in a blob's raw bytes.
///
/// Bytes are decoded via charset sniffing, line endings normalized, then
/// blank lines, `//`/`#` lines, and block comments are stripped. `#` is
/// treated as a comment leader for every language; block constructs are
/// gated per language (`"""` for python, `=begin`/`<<-DOC` for ruby).
pub fn count_lines_of_code(bytes: &[u8], language: Language) -> Result<u64, CountError> {
    let decoded = decode(bytes)?;
    let content = decoded.replace("\r\n", "\n");
    Ok(count_decoded(&content, language))
}

fn decode(bytes: &[u8]) -> Result<String, CountError> {
    let mut detector = chardetng::EncodingDetector::new();
    let sample_len = bytes.len().min(ENCODING_SAMPLE_BYTES);
    detector.feed(&bytes[..sample_len], bytes.len() <= ENCODING_SAMPLE_BYTES);
    let encoding = detector.guess(None, true);
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(CountError::Decode {
            encoding: encoding.name(),
        });
    }
    Ok(text.into_owned())
}

fn count_decoded(content: &str, language: Language) -> u64 {
    let mut lines_of_code = 0u64;
    let mut expected_end: Option<&'static str> = None;

    for raw_line in content.split('\n') {
        let mut line = raw_line;

        // Still inside a block comment from an earlier line.
        if let Some(end) = expected_end {
            match line.find(end) {
                None => continue,
                Some(idx) => {
                    line = line[idx + end.len()..].trim();
                    expected_end = None;
                }
            }
        }

        let mut clean_line = line.trim();
        if clean_line.is_empty() {
            continue;
        }
        if clean_line.starts_with("//") || clean_line.starts_with('#') {
            continue;
        }

        let mut post_comment_line = "";
        if is_block_comment_start(clean_line) {
            expected_end = Some("*/");
            let idx = clean_line.find("/*").unwrap_or(0);
            post_comment_line = clean_line[idx + 2..].trim();
            clean_line = clean_line[..idx].trim();
        } else if language == Language::Python && clean_line.contains(PYTHON_MULTILINE_STRING) {
            expected_end = Some(PYTHON_MULTILINE_STRING);
            let idx = clean_line.find(PYTHON_MULTILINE_STRING).unwrap_or(0);
            post_comment_line = clean_line[idx + PYTHON_MULTILINE_STRING.len()..].trim();
            clean_line = clean_line[..idx].trim();
        } else if language == Language::Ruby && clean_line.starts_with("=begin") {
            expected_end = Some("=end");
            continue;
        } else if language == Language::Ruby && clean_line.starts_with("<<-DOC") {
            expected_end = Some("DOC");
            continue;
        }

        // Did the block close on the same line it opened?
        if !post_comment_line.is_empty() {
            let end = expected_end.unwrap_or("*/");
            match post_comment_line.find(end) {
                None => {
                    if clean_line.is_empty() {
                        continue;
                    }
                }
                Some(_) => expected_end = None,
            }
        }

        if clean_line.is_empty() {
            continue;
        }

        lines_of_code += 1;
    }

    lines_of_code
}

/// A `/*` qualifies as a block-comment start unless the character right
/// after it is `'`, `"`, or `.` (keeps regex literals like `/*.` and quoted
/// `/*` sequences from opening a phantom comment). The check is skipped when
/// fewer than two characters follow.
fn is_block_comment_start(clean_line: &str) -> bool {
    let Some(idx) = clean_line.find("/*") else {
        return false;
    };
    let after = &clean_line[idx + 2..];
    if after.len() > 1 && matches!(after.as_bytes()[0], b'\'' | b'"' | b'.') {
        return false;
    }
    true
}
