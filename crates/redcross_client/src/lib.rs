//! Cruz Roja beach flag client.
//!
//! The surveillance service has no API; the beach page is requested with
//! the same form POST the public site uses and the flag is scraped out of
//! the returned HTML (served as latin1). The flag color comes from the
//! flag image's alt text, with a body-text fallback for pages that embed
//! the flag differently.

use async_trait::async_trait;
use chrono::Utc;
use common::ports::FlagProvider;
use common::{FlagColor, FlagStatus, ProviderError, ProviderErrorKind};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

const PROVIDER: &str = "redcross";
const FICHA_URL: &str = "https://www.cruzroja.es/appjv/consPlayas/fichaPlaya.do";

/// Cruz Roja beach-page client.
#[derive(Debug, Clone)]
pub struct RedCrossClient {
    client: reqwest::Client,
}

impl RedCrossClient {
    pub fn new(timeout: std::time::Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("beachcast/0.1 (beach conditions service)")
            .pool_max_idle_per_host(4)
            .timeout(timeout)
            .build()
            .expect("failed to build Cruz Roja HTTP client");

        Self { client }
    }
}

#[async_trait]
impl FlagProvider for RedCrossClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn flag_by_red_cross_id(&self, id: u32) -> Result<Option<FlagStatus>, ProviderError> {
        debug!("Fetching Cruz Roja beach page for id {}", id);

        let resp = self
            .client
            .post(FICHA_URL)
            .form(&[
                ("id", id.to_string()),
                ("action", String::new()),
                ("aplicacion", "consultaPlayas".to_string()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::status(
                PROVIDER,
                status,
                body.chars().take(300).collect::<String>(),
            ));
        }

        let html = resp
            .text_with_charset("ISO-8859-1")
            .await
            .map_err(transport_error)?;

        Ok(parse_flag_page(&html))
    }
}

// ── HTML parsing ──────────────────────────────────────────────────────

/// Scrape the beach page. `None` means the page carries no flag section
/// at all (unknown id or beach without surveillance this season).
fn parse_flag_page(html: &str) -> Option<FlagStatus> {
    let doc = Html::parse_document(html);

    let flag_img = Selector::parse("#listaFicha img[alt]").expect("valid selector");
    let li = Selector::parse("li").expect("valid selector");

    let alt = doc
        .select(&flag_img)
        .next()
        .and_then(|img| img.value().attr("alt"))
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let coverage_from = labeled_sibling(&doc, &li, "Cobertura desde");
    let coverage_to = labeled_sibling(&doc, &li, "Hasta");
    let schedule = labeled_sibling(&doc, &li, "Horario");

    if alt.is_none() && coverage_from.is_none() && coverage_to.is_none() && schedule.is_none() {
        return None;
    }

    let color = alt
        .and_then(detect_color)
        .unwrap_or_else(|| detect_color_in_body(&doc));

    Some(FlagStatus {
        color,
        message: alt.map(str::to_string),
        timestamp: Utc::now(),
        coverage_from,
        coverage_to,
        schedule,
    })
}

/// Find the first `li` whose text contains `label` and return the text of
/// its next element sibling (the page lays labels and values out as
/// adjacent list items).
fn labeled_sibling(doc: &Html, li: &Selector, label: &str) -> Option<String> {
    doc.select(li)
        .find(|el| el.text().collect::<String>().contains(label))
        .and_then(|el| el.next_siblings().find_map(ElementRef::wrap))
        .map(|sibling| collapse_ws(&sibling.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

fn detect_color(text: &str) -> Option<FlagColor> {
    let lowered = text.to_lowercase();
    if lowered.contains("roja") {
        Some(FlagColor::Red)
    } else if lowered.contains("amarilla") {
        Some(FlagColor::Yellow)
    } else if lowered.contains("verde") {
        Some(FlagColor::Green)
    } else if lowered.contains("negra") {
        Some(FlagColor::Black)
    } else {
        None
    }
}

/// Body fallback matches full flag phrases only: bare color words false-
/// positive on the site's own name ("Cruz Roja") and navigation text.
fn detect_color_in_body(doc: &Html) -> FlagColor {
    let body = Selector::parse("body").expect("valid selector");
    let text = doc
        .select(&body)
        .next()
        .map(|el| el.text().collect::<String>().to_lowercase())
        .unwrap_or_default();

    if text.contains("bandera roja") {
        FlagColor::Red
    } else if text.contains("bandera amarilla") {
        FlagColor::Yellow
    } else if text.contains("bandera verde") {
        FlagColor::Green
    } else if text.contains("bandera negra") {
        FlagColor::Black
    } else {
        FlagColor::Unknown
    }
}

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn transport_error(e: reqwest::Error) -> ProviderError {
    let kind = if e.is_timeout() {
        ProviderErrorKind::Timeout
    } else {
        ProviderErrorKind::Network
    };
    ProviderError::new(PROVIDER, kind, e.to_string())
}
