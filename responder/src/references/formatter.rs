use std::fmt;

use tracing::debug;

use super::clean::{clean_content, escape_backslashes, RepairTable};
use super::record::parse_record;
use crate::error::ReferenceError;
use crate::models::{Metadata, RetrievedDocument};

/// A single citation block, numbered from 1 in retrieval order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedReference {
    pub index: usize,
    pub cleaned_content: String,
    pub filename: String,
    pub page_number: String,
    pub view_url: String,
}

impl fmt::Display for FormattedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Reference {}:\n{}\n\nFilename: {} | Page number: {} | [View PDF]({})\n\n",
            self.index, self.cleaned_content, self.filename, self.page_number, self.view_url
        )
    }
}

/// Turns retriever hits into the reference text used both as model context
/// and as the citations shown next to an answer.
#[derive(Debug, Clone)]
pub struct ReferenceFormatter {
    server_url: String,
    repairs: RepairTable,
}

impl ReferenceFormatter {
    /// `server_url` is the root of the static file server hosting the PDFs.
    pub fn new(server_url: impl Into<String>) -> Self {
        let server_url = server_url.into().trim_end_matches('/').to_string();
        Self {
            server_url,
            repairs: RepairTable::default(),
        }
    }

    pub fn with_repairs(mut self, repairs: RepairTable) -> Self {
        self.repairs = repairs;
        self
    }

    /// Builds one block per document. Fails as a whole on the first bad
    /// document; no partial result is returned.
    ///
    /// Structured content is escaped first so it yields the same block as
    /// its stringified form.
    pub fn references(
        &self,
        documents: &[RetrievedDocument],
    ) -> Result<Vec<FormattedReference>, ReferenceError> {
        documents
            .iter()
            .enumerate()
            .map(|(i, document)| match document {
                RetrievedDocument::Structured(record) => {
                    self.build(i + 1, &escape_backslashes(&record.content), &record.metadata)
                }
                RetrievedDocument::Serialized(text) => {
                    let record = parse_record(text)?;
                    self.build(i + 1, &record.content, &record.metadata)
                }
            })
            .collect()
    }

    pub fn format(&self, documents: &[RetrievedDocument]) -> Result<String, ReferenceError> {
        let references = self.references(documents)?;
        debug!(count = references.len(), "formatted references");
        Ok(references.iter().map(ToString::to_string).collect())
    }

    /// Same as [`format`](Self::format) for records that are only available
    /// in their `page_content=... metadata={...}` text form.
    pub fn format_serialized<S: AsRef<str>>(&self, records: &[S]) -> Result<String, ReferenceError> {
        let mut out = String::new();
        for (i, text) in records.iter().enumerate() {
            let record = parse_record(text.as_ref())?;
            out.push_str(&self.build(i + 1, &record.content, &record.metadata)?.to_string());
        }
        Ok(out)
    }

    fn build(
        &self,
        index: usize,
        raw_content: &str,
        metadata: &Metadata,
    ) -> Result<FormattedReference, ReferenceError> {
        let source = metadata
            .get("source")
            .ok_or(ReferenceError::MissingField("source"))?;
        let page = metadata
            .get("page")
            .ok_or(ReferenceError::MissingField("page"))?;

        let filename = basename(&source.to_string()).to_string();
        let view_url = format!("{}/{}", self.server_url, filename);

        Ok(FormattedReference {
            index,
            cleaned_content: clean_content(raw_content, &self.repairs),
            filename,
            page_number: page.to_string(),
            view_url,
        })
    }
}

/// Final `/`-separated segment of a path.
pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentRecord, MetadataValue};
    use pretty_assertions::assert_eq;

    const SERVER: &str = "http://localhost:8000";

    fn record(content: &str, source: &str, page: MetadataValue) -> RetrievedDocument {
        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), MetadataValue::from(source));
        metadata.insert("page".to_string(), page);
        DocumentRecord::new(content, metadata).into()
    }

    #[test]
    fn empty_input_gives_empty_output() {
        let formatter = ReferenceFormatter::new(SERVER);
        assert_eq!(formatter.format(&[]).unwrap(), "");
        assert_eq!(formatter.format_serialized::<&str>(&[]).unwrap(), "");
    }

    #[test]
    fn formats_a_serialized_record() {
        let formatter = ReferenceFormatter::new(SERVER);
        let out = formatter
            .format_serialized(&[
                r"page_content='Attention is\nall you need <EOS> <pad> indeed' metadata={'source': '/data/docs/paper1.pdf', 'page': 3}",
            ])
            .unwrap();

        assert_eq!(
            out,
            "Reference 1:\nAttention is all you need indeed\n\n\
             Filename: paper1.pdf | Page number: 3 | [View PDF](http://localhost:8000/paper1.pdf)\n\n"
        );
    }

    #[test]
    fn blocks_are_numbered_in_input_order() {
        let formatter = ReferenceFormatter::new(SERVER);
        let docs = vec![
            record("first", "a.pdf", MetadataValue::Int(1)),
            RetrievedDocument::Serialized(
                "page_content='second' metadata={'source': 'b.pdf', 'page': 2}".to_string(),
            ),
            record("third", "c.pdf", MetadataValue::from("iv")),
        ];

        let refs = formatter.references(&docs).unwrap();
        let labels: Vec<_> = refs.iter().map(|r| (r.index, r.cleaned_content.as_str())).collect();
        assert_eq!(labels, vec![(1, "first"), (2, "second"), (3, "third")]);
        assert_eq!(refs[2].page_number, "iv");

        let out = formatter.format(&docs).unwrap();
        assert_eq!(out.matches("Reference ").count(), 3);
        let first = out.find("Reference 1:").unwrap();
        let second = out.find("Reference 2:").unwrap();
        let third = out.find("Reference 3:").unwrap();
        assert!(first < second && second < third);
    }

    #[test]
    fn view_url_uses_basename_at_any_depth() {
        let formatter = ReferenceFormatter::new(format!("{}/", SERVER));
        for source in ["paper.pdf", "docs/paper.pdf", "/very/deep/tree/of/dirs/paper.pdf"] {
            let refs = formatter
                .references(&[record("x", source, MetadataValue::Int(0))])
                .unwrap();
            assert_eq!(refs[0].filename, "paper.pdf");
            assert_eq!(refs[0].view_url, "http://localhost:8000/paper.pdf");
        }
    }

    #[test]
    fn missing_fields_abort_the_call() {
        let formatter = ReferenceFormatter::new(SERVER);
        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), MetadataValue::from("a.pdf"));
        let docs = vec![
            record("fine", "a.pdf", MetadataValue::Int(1)),
            DocumentRecord::new("no page", metadata).into(),
        ];

        assert_eq!(formatter.format(&docs), Err(ReferenceError::MissingField("page")));
        assert_eq!(
            formatter.format_serialized(&["page_content='x' metadata={'page': 1}"]),
            Err(ReferenceError::MissingField("source"))
        );
    }

    #[test]
    fn malformed_record_fails_without_partial_output() {
        let formatter = ReferenceFormatter::new(SERVER);
        let result = formatter.format_serialized(&[
            "page_content='ok' metadata={'source': 'a.pdf', 'page': 1}",
            "page_content='broken'",
        ]);
        assert_eq!(result, Err(ReferenceError::RecordFormat));
    }

    #[test]
    fn structured_and_serialized_records_agree_on_backslashes() {
        let formatter = ReferenceFormatter::new(SERVER);
        let structured = record(r"angle \theta and \alpha, see C:\docs", "p.pdf", MetadataValue::Int(1));
        let serialized = RetrievedDocument::Serialized(
            r"page_content='angle \\theta and \\alpha, see C:\\docs' metadata={'source': 'p.pdf', 'page': 1}"
                .to_string(),
        );

        let from_structured = formatter.references(&[structured]).unwrap();
        let from_serialized = formatter.references(&[serialized]).unwrap();
        assert_eq!(from_structured, from_serialized);
        assert_eq!(from_structured[0].cleaned_content, r"angle \theta and \alpha, see C:\docs");
    }

    #[test]
    fn mixed_quotes_survive_formatting() {
        let formatter = ReferenceFormatter::new(SERVER);
        let out = formatter
            .format_serialized(&[
                r#"page_content='it\'s a "quoted" word' metadata={'source': 'q.pdf', 'page': 2}"#,
            ])
            .unwrap();
        assert!(out.starts_with("Reference 1:\nit's a \"quoted\" word\n\n"));
    }

    #[test]
    fn custom_repairs_replace_the_default_table() {
        let formatter =
            ReferenceFormatter::new(SERVER).with_repairs(RepairTable::empty().with_entry("colour", "color"));
        let refs = formatter
            .references(&[record("colour \u{c2}\u{b7}", "a.pdf", MetadataValue::Int(1))])
            .unwrap();
        assert_eq!(refs[0].cleaned_content, "color \u{c2}\u{b7}");
    }
}
