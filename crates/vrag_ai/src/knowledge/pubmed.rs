use std::time::Duration;

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use vrag_core::config::IngestConfig;
use vrag_core::error::{codes, AppError};

use crate::retry::RetryPolicy;

/// One record returned by the literature source. Title and abstract are
/// optional because many citations ship without them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PubmedArticle {
    pub pmid: String,
    pub title: Option<String>,
    pub abstract_text: Option<String>,
}

/// Bibliographic search + batch fetch.
pub trait LiteratureSource {
    /// Ranked record ids for a search term, at most `max_results`.
    fn search(&self, term: &str, max_results: u32) -> Result<Vec<String>, AppError>;
    fn fetch(&self, ids: &[String]) -> Result<Vec<PubmedArticle>, AppError>;
}

/// NCBI E-utilities client (`esearch` + `efetch`) over blocking HTTP.
#[derive(Debug, Clone)]
pub struct PubMedClient {
    base_url: String,
    tool: String,
    email: String,
    api_key: Option<String>,
    recent_days: Option<u32>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl PubMedClient {
    pub fn new(cfg: &IngestConfig, retry: RetryPolicy) -> Self {
        Self {
            base_url: cfg.eutils_base_url.trim_end_matches('/').to_string(),
            tool: cfg.tool.clone(),
            email: cfg.email.clone(),
            api_key: cfg.api_key.clone(),
            recent_days: cfg.recent_days,
            timeout: Duration::from_secs(cfg.timeout_secs),
            retry,
        }
    }

    fn request(&self, endpoint: &str) -> ureq::Request {
        let url = format!("{}/{endpoint}", self.base_url);
        let mut req = ureq::get(&url)
            .timeout(self.timeout)
            .query("db", "pubmed")
            .query("tool", &self.tool)
            .query("email", &self.email);
        if let Some(key) = self.api_key.as_deref() {
            req = req.query("api_key", key);
        }
        req
    }

    fn search_once(&self, term: &str, max_results: u32) -> Result<Vec<String>, AppError> {
        let mut req = self
            .request("esearch.fcgi")
            .query("term", term)
            .query("retmax", &max_results.to_string())
            .query("sort", "relevance")
            .query("retmode", "json");
        if let Some(days) = self.recent_days {
            req = req
                .query("datetype", "pdat")
                .query("reldate", &days.to_string());
        }

        let resp = req.call().map_err(|e| source_error("esearch", e))?;
        let envelope: ESearchEnvelope = resp.into_json().map_err(|e| {
            AppError::new(codes::SOURCE_UNAVAILABLE, "Failed to decode esearch response")
                .with_details(e.to_string())
        })?;
        if let Some(err) = envelope.esearchresult.error {
            return Err(AppError::new(codes::SOURCE_UNAVAILABLE, "esearch reported an error")
                .with_details(err));
        }
        Ok(envelope.esearchresult.idlist)
    }

    fn fetch_once(&self, ids: &[String]) -> Result<Vec<PubmedArticle>, AppError> {
        let resp = self
            .request("efetch.fcgi")
            .query("id", &ids.join(","))
            .query("retmode", "xml")
            .call()
            .map_err(|e| source_error("efetch", e))?;
        let xml = resp.into_string().map_err(|e| {
            AppError::new(codes::SOURCE_UNAVAILABLE, "Failed to read efetch response")
                .with_details(e.to_string())
                .with_retryable(true)
        })?;
        parse_pubmed_xml(&xml)
    }
}

impl LiteratureSource for PubMedClient {
    fn search(&self, term: &str, max_results: u32) -> Result<Vec<String>, AppError> {
        self.retry.run("pubmed.esearch", || self.search_once(term, max_results))
    }

    fn fetch(&self, ids: &[String]) -> Result<Vec<PubmedArticle>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.retry.run("pubmed.efetch", || self.fetch_once(ids))
    }
}

#[derive(Debug, Deserialize)]
struct ESearchEnvelope {
    esearchresult: ESearchResult,
}

#[derive(Debug, Deserialize)]
struct ESearchResult {
    #[serde(default)]
    idlist: Vec<String>,
    #[serde(rename = "ERROR", default)]
    error: Option<String>,
}

fn source_error(endpoint: &str, e: ureq::Error) -> AppError {
    match e {
        ureq::Error::Status(status, _) => AppError::new(
            codes::SOURCE_UNAVAILABLE,
            format!("{endpoint} request failed"),
        )
        .with_details(format!("status={status}"))
        .with_retryable(status == 429 || status >= 500),
        other => AppError::new(
            codes::SOURCE_UNAVAILABLE,
            format!("Failed to reach {endpoint}"),
        )
        .with_details(other.to_string())
        .with_retryable(true),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Pmid,
    Title,
    Abstract,
}

/// Extract `PubmedArticle` records from an efetch XML payload.
///
/// Only the citation's own PMID (the first one in the article) is kept, and
/// only `AbstractText` sections under `Abstract` are joined into the abstract.
pub fn parse_pubmed_xml(xml: &str) -> Result<Vec<PubmedArticle>, AppError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut out = Vec::new();
    let mut buf = Vec::new();
    let mut current: Option<PubmedArticle> = None;
    let mut sections: Vec<String> = Vec::new();
    let mut in_abstract = false;
    let mut capture: Option<(Field, String)> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"PubmedArticle" => {
                    current = Some(PubmedArticle::default());
                    sections.clear();
                }
                b"Abstract" => in_abstract = true,
                b"PMID" => {
                    if current.as_ref().is_some_and(|a| a.pmid.is_empty()) {
                        capture = Some((Field::Pmid, String::new()));
                    }
                }
                b"ArticleTitle" if current.is_some() => {
                    capture = Some((Field::Title, String::new()));
                }
                b"AbstractText" if in_abstract => {
                    capture = Some((Field::Abstract, String::new()));
                }
                _ => {}
            },
            Ok(Event::Text(t)) => {
                if let Some((_, text)) = capture.as_mut() {
                    let s = t.unescape().map_err(|e| xml_error(&reader, e))?;
                    text.push_str(&s);
                }
            }
            Ok(Event::CData(c)) => {
                if let Some((_, text)) = capture.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"PMID" | b"ArticleTitle" | b"AbstractText" => {
                    if let (Some((field, text)), Some(article)) = (capture.take(), current.as_mut()) {
                        let text = collapse_whitespace(&text);
                        match field {
                            Field::Pmid => article.pmid = text,
                            Field::Title if !text.is_empty() => article.title = Some(text),
                            Field::Abstract if !text.is_empty() => sections.push(text),
                            _ => {}
                        }
                    }
                }
                b"Abstract" => in_abstract = false,
                b"PubmedArticle" => {
                    if let Some(mut article) = current.take() {
                        if !sections.is_empty() {
                            article.abstract_text = Some(sections.join(" "));
                        }
                        sections.clear();
                        out.push(article);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(&reader, e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}

fn xml_error(reader: &Reader<&[u8]>, e: quick_xml::Error) -> AppError {
    AppError::new(codes::SOURCE_UNAVAILABLE, "Failed to parse efetch XML")
        .with_details(format!("pos={}; err={}", reader.buffer_position(), e))
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" ?>
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation Status="MEDLINE">
      <PMID Version="1">11111</PMID>
      <Article>
        <ArticleTitle>Germline <i>BRCA1</i> variants &amp; breast cancer risk.</ArticleTitle>
        <Abstract>
          <AbstractText Label="BACKGROUND">BRCA1 mutations increase risk.</AbstractText>
          <AbstractText Label="RESULTS">Carriers showed   earlier onset.</AbstractText>
        </Abstract>
      </Article>
      <CommentsCorrectionsList>
        <CommentsCorrections><PMID Version="1">99999</PMID></CommentsCorrections>
      </CommentsCorrectionsList>
    </MedlineCitation>
  </PubmedArticle>
  <PubmedArticle>
    <MedlineCitation>
      <PMID Version="1">22222</PMID>
      <Article>
        <ArticleTitle>A letter without an abstract.</ArticleTitle>
      </Article>
    </MedlineCitation>
  </PubmedArticle>
</PubmedArticleSet>"#;

    #[test]
    fn extracts_pmid_title_and_joined_abstract() {
        let articles = parse_pubmed_xml(SAMPLE).expect("parse");
        assert_eq!(articles.len(), 2);

        let a = &articles[0];
        assert_eq!(a.pmid, "11111");
        assert_eq!(
            a.title.as_deref(),
            Some("Germline BRCA1 variants & breast cancer risk.")
        );
        assert_eq!(
            a.abstract_text.as_deref(),
            Some("BRCA1 mutations increase risk. Carriers showed earlier onset.")
        );

        let b = &articles[1];
        assert_eq!(b.pmid, "22222");
        assert_eq!(b.abstract_text, None);
    }

    #[test]
    fn empty_set_yields_no_articles() {
        let articles = parse_pubmed_xml("<PubmedArticleSet></PubmedArticleSet>").expect("parse");
        assert!(articles.is_empty());
    }
}
