use once_cell::sync::Lazy;
use regex::Regex;

use super::literal;
use crate::error::ReferenceError;
use crate::models::DocumentRecord;

// Lazy content match: the split happens at the first ` metadata={` that is
// followed by a closing brace somewhere after it.
static RECORD_LAYOUT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^page_content=(.*?) metadata=(\{.*\})").expect("static regex")
});

/// Splits a stringified record (`page_content=<content> metadata={...}`) into
/// its content and parsed metadata.
///
/// The content is returned still escaped; only the quotes the producer wrapped
/// it in are removed.
pub fn parse_record(text: &str) -> Result<DocumentRecord, ReferenceError> {
    let captures = RECORD_LAYOUT
        .captures(text)
        .ok_or(ReferenceError::RecordFormat)?;
    let (Some(content), Some(metadata)) = (captures.get(1), captures.get(2)) else {
        return Err(ReferenceError::RecordFormat);
    };

    let metadata = literal::parse_mapping(metadata.as_str())?;
    Ok(DocumentRecord::new(unquote(content.as_str()), metadata))
}

fn unquote(content: &str) -> &str {
    for quote in ['\'', '"'] {
        if content.len() >= 2 && content.starts_with(quote) && content.ends_with(quote) {
            return &content[1..content.len() - 1];
        }
    }
    content
}
