//! Extraction adapter: page images → validated [`ExtractionResult`].
//!
//! ## Contract
//!
//! The service is asked for a JSON object
//!
//! ```json
//! { "total_num_pages_all_parts": 3,
//!   "pages": [ { "page_number": 1, "sheet_number": "CS", "sheet_title": "Cover Sheet" }, … ] }
//! ```
//!
//! and the reply is accepted only if the declared total, the number of
//! records and the set of page numbers all agree with the number of page
//! images sent. Mismatches are [`SheetmarkError::ContractViolation`].
//!
//! ## Decorated replies
//!
//! Models wrap JSON in fences or commentary despite being told not to. Only
//! the span from the first `{` to the last `}` is parsed.

use crate::error::SheetmarkError;
use crate::model::{ExtractionResult, PageRecord, MISSING_SHEET_NUMBER, MISSING_SHEET_TITLE};
use crate::pipeline::encode::encode_page_file;
use crate::pipeline::llm::{VisionRequest, VisionService};
use crate::pipeline::tool::excerpt;
use crate::prompts::render_system_prompt;
use crate::sanitize::sanitize_title;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

/// Settings for one extraction call.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Instruction template containing `{actual_total_pages}`.
    pub prompt_template: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout: Duration,
    /// Re-apply title sanitisation to every record.
    pub resanitize_titles: bool,
}

/// Successful extraction plus what the orchestrator needs to report on it.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub result: ExtractionResult,
    /// The located JSON span, as parsed.
    pub raw_json: String,
    /// Images dropped as unreadable before the request.
    pub dropped_images: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Wire shape of the reply. Every field is optional so that missing data is
/// reported precisely instead of failing the whole parse.
#[derive(Debug, Deserialize)]
struct RawExtraction {
    total_num_pages_all_parts: Option<i64>,
    pages: Option<Vec<RawPage>>,
}

#[derive(Debug, Deserialize)]
struct RawPage {
    page_number: Option<i64>,
    sheet_number: Option<String>,
    sheet_title: Option<String>,
}

/// Extract one record per page from `images`.
///
/// `expected_page_count` is the number of pages the response must describe;
/// the orchestrator passes the rasteriser's image count.
pub async fn extract(
    service: &dyn VisionService,
    images: &[PathBuf],
    expected_page_count: usize,
    options: &ExtractOptions,
) -> Result<Extraction, SheetmarkError> {
    if images.is_empty() {
        error!("No page images provided for extraction");
        return Err(SheetmarkError::NoUsableImages { total: 0 });
    }

    // ── Prepare image parts ──────────────────────────────────────────────
    let mut parts = Vec::with_capacity(images.len());
    for path in images {
        match encode_page_file(path).await {
            Ok(data) => parts.push(data),
            Err(e) => warn!("Skipping page image: {}", e),
        }
    }
    if parts.is_empty() {
        error!("None of the {} page images could be prepared", images.len());
        return Err(SheetmarkError::NoUsableImages {
            total: images.len(),
        });
    }
    let dropped_images = images.len() - parts.len();
    if dropped_images > 0 {
        warn!(
            "{} of {} page images dropped; the reply is still checked against {} pages",
            dropped_images,
            images.len(),
            expected_page_count
        );
    }

    let request = VisionRequest {
        system_prompt: render_system_prompt(&options.prompt_template, expected_page_count)?,
        images: parts,
        temperature: options.temperature,
        max_tokens: options.max_tokens,
    };

    // ── Call the service ─────────────────────────────────────────────────
    info!(
        "Requesting sheet data for {} page image(s)",
        request.images.len()
    );
    let response = match tokio::time::timeout(options.timeout, service.complete(&request)).await {
        Ok(result) => result?,
        Err(_) => {
            error!(
                "Extraction service timed out after {}s",
                options.timeout.as_secs()
            );
            return Err(SheetmarkError::ServiceError {
                message: format!(
                    "no reply within {}s (extraction timeout)",
                    options.timeout.as_secs()
                ),
            });
        }
    };

    if response.text.trim().is_empty() {
        error!("Extraction service returned no text (empty or blocked reply)");
        return Err(SheetmarkError::ServiceError {
            message: "service returned no text content; the reply may have been blocked".into(),
        });
    }

    // ── Parse and validate ───────────────────────────────────────────────
    let raw_json = locate_json_object(&response.text)?.to_string();
    let result = parse_response(&raw_json, expected_page_count, options.resanitize_titles)?;
    info!("Extracted {} validated page record(s)", result.pages.len());

    Ok(Extraction {
        result,
        raw_json,
        dropped_images,
        input_tokens: response.input_tokens,
        output_tokens: response.output_tokens,
    })
}

/// The span from the first `{` to the last `}` of `text`.
pub fn locate_json_object(text: &str) -> Result<&str, SheetmarkError> {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => Ok(&text[start..=end]),
        _ => {
            error!(
                "No JSON object boundaries in extraction reply: {}",
                excerpt(text, 200)
            );
            Err(SheetmarkError::ParseError {
                detail: "no '{' … '}' object in the reply".into(),
                excerpt: excerpt(text, 200),
            })
        }
    }
}

/// Strictly parse and validate a located JSON object.
pub fn parse_response(
    json: &str,
    expected_page_count: usize,
    resanitize_titles: bool,
) -> Result<ExtractionResult, SheetmarkError> {
    let raw: RawExtraction = serde_json::from_str(json).map_err(|e| {
        error!("Extraction reply is not valid JSON: {}", e);
        SheetmarkError::ParseError {
            detail: e.to_string(),
            excerpt: excerpt(json, 200),
        }
    })?;

    let declared = raw.total_num_pages_all_parts.ok_or_else(|| {
        violation("reply has no 'total_num_pages_all_parts'".to_string())
    })?;
    let raw_pages = raw
        .pages
        .ok_or_else(|| violation("reply has no 'pages' list".to_string()))?;

    let mut pages: Vec<PageRecord> = raw_pages
        .into_iter()
        .enumerate()
        .filter_map(|(i, page)| to_record(i, page, resanitize_titles))
        .collect();

    validate(declared, &mut pages, expected_page_count)?;

    Ok(ExtractionResult {
        declared_total_pages: expected_page_count,
        pages,
    })
}

fn to_record(index: usize, page: RawPage, resanitize_titles: bool) -> Option<PageRecord> {
    let page_number = match page.page_number {
        Some(n) if n >= 1 => n as usize,
        Some(n) => {
            warn!("Dropping page entry #{}: invalid page_number {}", index + 1, n);
            return None;
        }
        None => {
            warn!("Dropping page entry #{}: missing page_number", index + 1);
            return None;
        }
    };

    let sheet_number = page
        .sheet_number
        .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| {
            warn!("Page {}: missing sheet_number", page_number);
            MISSING_SHEET_NUMBER.to_string()
        });

    let sheet_title = page
        .sheet_title
        .map(|t| {
            if resanitize_titles {
                sanitize_title(&t)
            } else {
                t.trim().to_string()
            }
        })
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| {
            warn!("Page {}: missing sheet_title", page_number);
            MISSING_SHEET_TITLE.to_string()
        });

    Some(PageRecord {
        page_number,
        sheet_number,
        sheet_title,
    })
}

/// Enforce the page contract, sorting `pages` by number on the way.
fn validate(
    declared: i64,
    pages: &mut [PageRecord],
    expected: usize,
) -> Result<(), SheetmarkError> {
    if declared != expected as i64 {
        return Err(violation(format!(
            "reply declares {declared} pages, expected {expected}"
        )));
    }
    if pages.len() != expected {
        return Err(violation(format!(
            "reply has {} valid page records, expected {expected}",
            pages.len()
        )));
    }

    if !pages.windows(2).all(|w| w[0].page_number <= w[1].page_number) {
        warn!("Page records arrived out of order; sorting by page_number");
        pages.sort_by_key(|p| p.page_number);
    }

    let numbers: BTreeSet<usize> = pages.iter().map(|p| p.page_number).collect();
    if numbers.len() != pages.len() || numbers.iter().copied().ne(1..=expected) {
        let missing: Vec<usize> = (1..=expected).filter(|n| !numbers.contains(n)).collect();
        let mut seen = BTreeSet::new();
        let duplicated: BTreeSet<usize> = pages
            .iter()
            .map(|p| p.page_number)
            .filter(|n| !seen.insert(*n))
            .collect();
        return Err(violation(format!(
            "page numbers must be exactly 1..={expected}; missing {missing:?}, duplicated {duplicated:?}, out of range {:?}",
            numbers.iter().filter(|n| **n > expected).collect::<Vec<_>>()
        )));
    }

    Ok(())
}

fn violation(detail: String) -> SheetmarkError {
    error!("Extraction contract violated: {}", detail);
    SheetmarkError::ContractViolation { detail }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(n: i64, number: &str, title: &str) -> serde_json::Value {
        json!({ "page_number": n, "sheet_number": number, "sheet_title": title })
    }

    fn reply(declared: i64, pages: Vec<serde_json::Value>) -> String {
        json!({ "total_num_pages_all_parts": declared, "pages": pages }).to_string()
    }

    struct Slow;

    #[async_trait::async_trait]
    impl VisionService for Slow {
        async fn complete(
            &self,
            _: &VisionRequest,
        ) -> Result<crate::pipeline::llm::VisionResponse, SheetmarkError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Default::default())
        }
    }

    #[tokio::test]
    async fn slow_service_times_out_as_service_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page_0001.png");
        image::GrayImage::from_pixel(8, 8, image::Luma([255u8]))
            .save(&path)
            .unwrap();
        let options = ExtractOptions {
            prompt_template: crate::prompts::DEFAULT_SYSTEM_PROMPT.to_string(),
            temperature: 0.0,
            max_tokens: 1024,
            timeout: Duration::from_millis(200),
            resanitize_titles: true,
        };

        let err = extract(&Slow, &[path], 1, &options).await.unwrap_err();
        assert!(
            matches!(&err, SheetmarkError::ServiceError { message } if message.contains("timeout")),
            "got: {err:?}"
        );
    }

    #[test]
    fn locates_fenced_json() {
        let text = "Here you go:\n```json\n{\"a\": {\"b\": 1}}\n```\nAnything else?";
        assert_eq!(locate_json_object(text).unwrap(), "{\"a\": {\"b\": 1}}");
    }

    #[test]
    fn no_braces_is_parse_error() {
        let err = locate_json_object("I cannot read these drawings.").unwrap_err();
        assert!(matches!(err, SheetmarkError::ParseError { .. }));
        let err = locate_json_object("} backwards {").unwrap_err();
        assert!(matches!(err, SheetmarkError::ParseError { .. }));
    }

    #[test]
    fn invalid_json_span_is_parse_error() {
        let err = parse_response("{ not json }", 1, true).unwrap_err();
        assert!(matches!(err, SheetmarkError::ParseError { .. }));
    }

    #[test]
    fn valid_reply_parses() {
        let json = reply(
            3,
            vec![
                page(1, "CS", "Cover Sheet"),
                page(2, "A-101", "1st Floor Plan"),
                page(3, "A-102", "2nd Floor Plan"),
            ],
        );
        let result = parse_response(&json, 3, true).unwrap();
        assert_eq!(result.declared_total_pages, 3);
        assert_eq!(result.pages.len(), 3);
        assert_eq!(result.pages[1].sheet_number, "A-101");
        assert_eq!(result.pages[2].page_number, 3);
    }

    #[test]
    fn declared_total_mismatch_is_rejected_even_with_right_length() {
        let json = reply(
            4,
            vec![page(1, "A1", "One"), page(2, "A2", "Two"), page(3, "A3", "Three")],
        );
        let err = parse_response(&json, 3, true).unwrap_err();
        assert!(matches!(err, SheetmarkError::ContractViolation { .. }));
        assert!(err.to_string().contains("declares 4"), "got: {err}");
    }

    #[test]
    fn duplicate_and_missing_numbers_are_rejected() {
        let json = reply(
            4,
            vec![
                page(1, "A1", "One"),
                page(2, "A2", "Two"),
                page(2, "A2", "Two Again"),
                page(4, "A4", "Four"),
            ],
        );
        let err = parse_response(&json, 4, true).unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, SheetmarkError::ContractViolation { .. }));
        assert!(msg.contains("missing [3]"), "got: {msg}");
        assert!(msg.contains("duplicated {2}"), "got: {msg}");
    }

    #[test]
    fn wrong_record_count_is_rejected() {
        let json = reply(3, vec![page(1, "A1", "One"), page(2, "A2", "Two")]);
        assert!(matches!(
            parse_response(&json, 3, true).unwrap_err(),
            SheetmarkError::ContractViolation { .. }
        ));
    }

    #[test]
    fn out_of_range_number_is_rejected() {
        let json = reply(2, vec![page(1, "A1", "One"), page(3, "A3", "Three")]);
        let err = parse_response(&json, 2, true).unwrap_err();
        assert!(err.to_string().contains("out of range [3]"), "got: {err}");
    }

    #[test]
    fn unordered_pages_are_sorted() {
        let json = reply(
            3,
            vec![page(3, "A3", "Three"), page(1, "A1", "One"), page(2, "A2", "Two")],
        );
        let result = parse_response(&json, 3, true).unwrap();
        let numbers: Vec<usize> = result.pages.iter().map(|p| p.page_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn entry_without_page_number_fails_completeness() {
        let json = json!({
            "total_num_pages_all_parts": 2,
            "pages": [
                { "page_number": 1, "sheet_number": "A1", "sheet_title": "One" },
                { "sheet_number": "A2", "sheet_title": "Two" }
            ]
        })
        .to_string();
        let err = parse_response(&json, 2, true).unwrap_err();
        assert!(matches!(err, SheetmarkError::ContractViolation { .. }));
    }

    #[test]
    fn missing_text_fields_get_sentinels() {
        let json = json!({
            "total_num_pages_all_parts": 1,
            "pages": [ { "page_number": 1 } ]
        })
        .to_string();
        let result = parse_response(&json, 1, true).unwrap();
        assert_eq!(result.pages[0].sheet_number, MISSING_SHEET_NUMBER);
        assert_eq!(result.pages[0].sheet_title, MISSING_SHEET_TITLE);
    }

    #[test]
    fn titles_are_resanitised_when_enabled() {
        let json = reply(1, vec![page(1, "S-201", "FOUNDATION PLAN (PART A)")]);
        let on = parse_response(&json, 1, true).unwrap();
        assert_eq!(on.pages[0].sheet_title, "Foundation Plan Part A");
        let off = parse_response(&json, 1, false).unwrap();
        assert_eq!(off.pages[0].sheet_title, "FOUNDATION PLAN (PART A)");
    }

    #[test]
    fn missing_envelope_fields_are_violations() {
        let err = parse_response("{\"pages\": []}", 1, true).unwrap_err();
        assert!(err.to_string().contains("total_num_pages_all_parts"));
        let err = parse_response("{\"total_num_pages_all_parts\": 1}", 1, true).unwrap_err();
        assert!(err.to_string().contains("'pages'"));
    }
}
