use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;

use super::DocumentLink;

static DOCUMENTS_TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<table[^>]*class\s*=\s*["'][^"']*\bdocuments\b[^"']*["'][^>]*>(.*?)</table>"#)
        .expect("valid documents table regex")
});

static ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*?href\s*=\s*["']([^"']+)["'][^>]*>(.*?)</a>"#)
        .expect("valid anchor regex")
});

static TAGS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<[^>]+>").expect("valid tags regex"));

/// Links inside every `table.documents` on the page, resolved against
/// `page_url`. Anchors whose href cannot be resolved are skipped.
#[must_use]
pub fn extract_document_links(html: &str, page_url: &str) -> Vec<DocumentLink> {
    let Ok(base) = Url::parse(page_url) else {
        return Vec::new();
    };

    DOCUMENTS_TABLE_RE
        .captures_iter(html)
        .filter_map(|table| table.get(1))
        .flat_map(|table| ANCHOR_RE.captures_iter(table.as_str()))
        .filter_map(|anchor| {
            let href = anchor.get(1)?.as_str().trim();
            let url = base.join(href).ok()?;
            let title = anchor.get(2).map_or("", |m| m.as_str());
            Some(DocumentLink {
                title: clean_text(title),
                url: url.to_string(),
            })
        })
        .collect()
}

fn clean_text(fragment: &str) -> String {
    let stripped = TAGS_RE.replace_all(fragment, " ");
    stripped
        .replace("&amp;", "&")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_only_anchors_inside_documents_tables() {
        let html = r#"
            <a href="/nav">Navigation</a>
            <table class="ranges-table">
              <tr><td><a href="/other.pdf">Other</a></td></tr>
            </table>
            <table class="documents flex-column">
              <tr><td><a class="plausible" href="https://cdn.example.com/q2.pdf">
                 Q2 <span>FY25</span> &amp; notes</a></td></tr>
              <tr><td><a href="../files/q1.pdf">Q1</a></td></tr>
            </table>"#;

        let links = extract_document_links(html, "https://www.example.com/company/ACME/");
        assert_eq!(
            links,
            vec![
                DocumentLink {
                    title: "Q2 FY25 & notes".to_string(),
                    url: "https://cdn.example.com/q2.pdf".to_string(),
                },
                DocumentLink {
                    title: "Q1".to_string(),
                    url: "https://www.example.com/company/files/q1.pdf".to_string(),
                },
            ]
        );
    }

    #[test]
    fn invalid_page_url_yields_nothing() {
        let html = r#"<table class="documents"><a href="/a.pdf">A</a></table>"#;
        assert!(extract_document_links(html, "not a url").is_empty());
    }
}
