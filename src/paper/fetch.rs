//! PDF acquisition from URLs or the local filesystem.

use crate::error::DistillError;
use crate::paper::cache::write_atomic;
use crate::paper::metadata::arxiv_id;
use anyhow::{Context, Result};
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use xxhash_rust::xxh3::xxh3_64;

/// Options for fetching a PDF.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Directory downloaded PDFs are stored in.
    pub download_dir: PathBuf,
    /// Download timeout in seconds.
    pub timeout_seconds: u64,
    /// Reuse a previously downloaded copy instead of fetching again.
    pub reuse_downloads: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            download_dir: std::env::temp_dir().join("distill"),
            timeout_seconds: 30,
            reuse_downloads: true,
        }
    }
}

/// Fetch a PDF from a URL or verify a local file path.
///
/// Returns the path of the PDF on disk.
pub async fn fetch_pdf(source: &str, options: &FetchOptions) -> Result<PathBuf> {
    if source.starts_with("http://") || source.starts_with("https://") {
        return download_pdf(source, options).await;
    }

    let path = Path::new(source);
    if !path.is_file() {
        anyhow::bail!("Local PDF not found: {}", source);
    }
    info!("Using local file: {}", source);
    Ok(path.to_path_buf())
}

/// Rewrite an arXiv abstract URL into its PDF URL.
pub fn pdf_url(source: &str) -> String {
    let mut url = source.replace("/abs/", "/pdf/");
    if !url.ends_with(".pdf") {
        url.push_str(".pdf");
    }
    url
}

/// Stable local file name for a downloaded PDF.
///
/// arXiv paths already identify the paper (and its version), so they keep
/// their last segment. Any other URL gets a hash of the full URL appended,
/// since names like `paper.pdf` or `pdf?id=...` repeat across sites.
pub fn download_file_name(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let last = without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("");
    let stem = last.strip_suffix(".pdf").unwrap_or(last);

    let slug: String = stem
        .chars()
        .take(60)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let slug = if slug.trim_matches(['_', '.']).is_empty() {
        "download"
    } else {
        slug.as_str()
    };

    if arxiv_id(url).is_some() {
        format!("{}.pdf", slug)
    } else {
        let hash = format!("{:016x}", xxh3_64(url.as_bytes()));
        format!("{}-{}.pdf", slug, &hash[..8])
    }
}

async fn download_pdf(source: &str, options: &FetchOptions) -> Result<PathBuf> {
    let url = pdf_url(source);
    let target = options.download_dir.join(download_file_name(&url));

    if options.reuse_downloads && target.is_file() {
        info!("Reusing downloaded PDF at {}", target.display());
        return Ok(target);
    }

    info!("Downloading from {}", url);
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(options.timeout_seconds))
        .build()
        .context("Failed to create HTTP client")?;

    let response = client
        .get(&url)
        .header(
            USER_AGENT,
            concat!("distill/", env!("CARGO_PKG_VERSION"), " (academic research tool)"),
        )
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                anyhow::anyhow!("Download timed out after {}s: {}", options.timeout_seconds, url)
            } else {
                anyhow::anyhow!("Failed to download {}: {}", url, e)
            }
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(DistillError::Api {
            service: "Download",
            status: status.as_u16(),
            body,
        }
        .into());
    }

    // arXiv sometimes returns HTML error pages with 200
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    if !content_type.contains("pdf") && !content_type.contains("octet-stream") {
        return Err(DistillError::NotAPdf(content_type).into());
    }

    let bytes = response
        .bytes()
        .await
        .context("Failed to read PDF body")?;
    write_atomic(&target, &bytes)?;
    debug!("Saved {} bytes to {}", bytes.len(), target.display());

    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn options(dir: &TempDir) -> FetchOptions {
        FetchOptions {
            download_dir: dir.path().to_path_buf(),
            timeout_seconds: 5,
            reuse_downloads: true,
        }
    }

    #[test]
    fn test_pdf_url_rewrites_abs() {
        assert_eq!(
            pdf_url("https://arxiv.org/abs/2301.02111"),
            "https://arxiv.org/pdf/2301.02111.pdf"
        );
        assert_eq!(
            pdf_url("https://arxiv.org/pdf/2301.02111.pdf"),
            "https://arxiv.org/pdf/2301.02111.pdf"
        );
    }

    #[test]
    fn test_download_file_name_arxiv() {
        assert_eq!(
            download_file_name("https://arxiv.org/pdf/2301.02111.pdf"),
            "2301.02111.pdf"
        );
        assert_eq!(
            download_file_name("https://arxiv.org/pdf/1706.03762v7.pdf"),
            "1706.03762v7.pdf"
        );
    }

    #[test]
    fn test_download_file_name_other_hosts() {
        let name = download_file_name("https://example.com/papers/my paper.pdf?dl=1");
        assert!(name.starts_with("my_paper-"), "{}", name);
        assert!(name.ends_with(".pdf"));
        assert_eq!(name.len(), "my_paper-".len() + 8 + ".pdf".len());

        // Stable across calls
        assert_eq!(
            name,
            download_file_name("https://example.com/papers/my paper.pdf?dl=1")
        );

        // Same last segment on different sites
        assert_ne!(
            download_file_name("https://lab-a.org/paper.pdf"),
            download_file_name("https://lab-b.org/paper.pdf")
        );

        // Only the query differs
        assert_ne!(
            download_file_name("https://openreview.net/pdf?id=abc123"),
            download_file_name("https://openreview.net/pdf?id=xyz789")
        );

        assert!(download_file_name("https://example.com/__/").starts_with("download-"));
    }

    #[tokio::test]
    async fn test_fetch_local_missing() {
        let dir = TempDir::new().unwrap();
        let err = fetch_pdf("/no/such/paper.pdf", &options(&dir))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Local PDF not found"));
    }

    #[tokio::test]
    async fn test_fetch_local_existing() {
        let dir = TempDir::new().unwrap();
        let pdf = dir.path().join("paper.pdf");
        std::fs::write(&pdf, b"%PDF-1.4").unwrap();

        let got = fetch_pdf(pdf.to_str().unwrap(), &options(&dir)).await.unwrap();
        assert_eq!(got, pdf);
    }

    #[tokio::test]
    async fn test_download_saves_pdf() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pdf/2301.02111.pdf"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/pdf")
                    .set_body_bytes(b"%PDF-1.7 body".to_vec()),
            )
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let source = format!("{}/abs/2301.02111", server.uri());

        let first = fetch_pdf(&source, &options(&dir)).await.unwrap();
        assert_eq!(std::fs::read(&first).unwrap(), b"%PDF-1.7 body");

        // Second fetch reuses the file; the mock expects exactly one request
        let second = fetch_pdf(&source, &options(&dir)).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_download_rejects_html() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=utf-8")
                    .set_body_string("<html>rate limited</html>"),
            )
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let source = format!("{}/abs/2301.99999", server.uri());
        let err = fetch_pdf(&source, &options(&dir)).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<DistillError>(),
            Some(DistillError::NotAPdf(_))
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_download_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let source = format!("{}/abs/0000.00000", server.uri());
        let err = fetch_pdf(&source, &options(&dir)).await.unwrap_err();

        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_download_same_file_name_on_two_hosts() {
        let lab_a = MockServer::start().await;
        let lab_b = MockServer::start().await;
        for (server, body) in [(&lab_a, "%PDF paper A"), (&lab_b, "%PDF paper B")] {
            Mock::given(method("GET"))
                .and(path("/paper.pdf"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .insert_header("content-type", "application/pdf")
                        .set_body_string(body),
                )
                .expect(1)
                .mount(server)
                .await;
        }

        let dir = TempDir::new().unwrap();
        let first = fetch_pdf(&format!("{}/paper.pdf", lab_a.uri()), &options(&dir))
            .await
            .unwrap();
        let second = fetch_pdf(&format!("{}/paper.pdf", lab_b.uri()), &options(&dir))
            .await
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "%PDF paper A");
        assert_eq!(std::fs::read_to_string(&second).unwrap(), "%PDF paper B");
    }
}
