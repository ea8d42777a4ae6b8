//! Local accessibility audit of rendered page previews.
//!
//! Covers the checks editors can act on directly in the CMS: image alt text,
//! heading hierarchy and ARIA landmarks. Anything deeper is the remote
//! scanner's job.

use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

use crate::services::content_cache::{ContentCache, FetchError};

const SNIPPET_LEN: usize = 120;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single problem found in the page.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Finding {
    pub rule: &'static str,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AuditReport {
    pub url: String,
    pub images: usize,
    pub headings: Vec<u8>,
    pub findings: Vec<Finding>,
}

impl AuditReport {
    pub fn error_count(&self) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Error)
            .count()
    }

    pub fn passed(&self) -> bool {
        self.error_count() == 0
    }
}

/// Fetch `url` through `cache` and audit it.
pub async fn audit_url(cache: &ContentCache, url: &str) -> Result<AuditReport, FetchError> {
    let html = cache.fetch(url).await?;
    let report = audit_html(url, &html);

    tracing::info!(
        url,
        findings = report.findings.len(),
        errors = report.error_count(),
        "Local audit complete"
    );

    Ok(report)
}

/// Run every check against an HTML document.
pub fn audit_html(url: &str, html: &str) -> AuditReport {
    let document = Html::parse_document(html);
    let mut findings = Vec::new();

    let images = check_images(&document, &mut findings);
    let headings = check_headings(&document, &mut findings);
    check_landmarks(&document, &mut findings);

    AuditReport {
        url: url.to_string(),
        images,
        headings,
        findings,
    }
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

fn check_images(document: &Html, findings: &mut Vec<Finding>) -> usize {
    let img_sel = selector("img");
    let mut count = 0;

    for img in document.select(&img_sel) {
        count += 1;
        if is_hidden(&img) {
            continue;
        }

        match img.value().attr("alt") {
            None => findings.push(Finding {
                rule: "missing-alt",
                severity: Severity::Error,
                message: "Image has no alt attribute".to_string(),
                snippet: Some(snippet(&img)),
            }),
            Some(alt) if !alt.is_empty() && alt.trim().is_empty() => findings.push(Finding {
                rule: "blank-alt",
                severity: Severity::Warning,
                message: "Alt text is only whitespace; use alt=\"\" for decorative images"
                    .to_string(),
                snippet: Some(snippet(&img)),
            }),
            Some(_) => {}
        }
    }

    count
}

fn check_headings(document: &Html, findings: &mut Vec<Finding>) -> Vec<u8> {
    let heading_sel = selector("h1, h2, h3, h4, h5, h6");
    let mut levels = Vec::new();
    let mut previous: Option<u8> = None;

    for heading in document.select(&heading_sel) {
        let level = heading.value().name()[1..].parse::<u8>().unwrap_or(1);
        levels.push(level);

        if let Some(prev) = previous {
            if level > prev + 1 {
                findings.push(Finding {
                    rule: "heading-order",
                    severity: Severity::Error,
                    message: format!("Heading level skips from h{prev} to h{level}"),
                    snippet: Some(snippet(&heading)),
                });
            }
        }
        previous = Some(level);
    }

    let h1_count = levels.iter().filter(|l| **l == 1).count();
    if h1_count == 0 {
        findings.push(Finding {
            rule: "missing-h1",
            severity: Severity::Error,
            message: "Page has no h1 heading".to_string(),
            snippet: None,
        });
    } else if h1_count > 1 {
        findings.push(Finding {
            rule: "multiple-h1",
            severity: Severity::Warning,
            message: format!("Page has {h1_count} h1 headings"),
            snippet: None,
        });
    }

    levels
}

fn check_landmarks(document: &Html, findings: &mut Vec<Finding>) {
    let landmarks = [
        ("main", "main, [role=main]", Severity::Error),
        ("navigation", "nav, [role=navigation]", Severity::Warning),
        ("banner", "header, [role=banner]", Severity::Warning),
        ("contentinfo", "footer, [role=contentinfo]", Severity::Warning),
    ];

    for (role, css, severity) in landmarks {
        let sel = selector(css);
        let count = document.select(&sel).count();
        if count == 0 {
            findings.push(Finding {
                rule: "missing-landmark",
                severity,
                message: format!("Page has no {role} landmark"),
                snippet: None,
            });
        } else if role == "main" && count > 1 {
            findings.push(Finding {
                rule: "multiple-main",
                severity: Severity::Warning,
                message: format!("Page has {count} main landmarks"),
                snippet: None,
            });
        }
    }
}

fn is_hidden(element: &ElementRef) -> bool {
    let value = element.value();
    value.attr("aria-hidden") == Some("true")
        || matches!(value.attr("role"), Some("presentation") | Some("none"))
}

fn snippet(element: &ElementRef) -> String {
    let html = element.html();
    if html.chars().count() <= SNIPPET_LEN {
        html
    } else {
        let cut: String = html.chars().take(SNIPPET_LEN).collect();
        format!("{cut}…")
    }
}
