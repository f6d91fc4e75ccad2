use anyhow::{Context as _, Result};
use chrono::Utc;
use diligence_core::{AgentResponse, is_web_url};
use serde::Serialize;
use tera::{Context, Tera};

const INDEX_TEMPLATE: &str = "index.html";
const REPORT_TEMPLATE: &str = "report.html";

/// Compiled page templates, built once at start-up and shared through `AppState`.
pub struct ReportTemplates {
    tera: Tera,
}

#[derive(Serialize)]
struct ReportView<'a> {
    company_name: &'a str,
    url: &'a str,
    /// Set only for http(s) URLs; anything else is shown as text.
    link_url: Option<&'a str>,
    data: &'a AgentResponse,
    generated_at: String,
}

impl ReportTemplates {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            (INDEX_TEMPLATE, include_str!("../templates/index.html")),
            (REPORT_TEMPLATE, include_str!("../templates/report.html")),
        ])
        .context("failed to compile page templates")?;
        Ok(Self { tera })
    }

    pub fn render_index(&self) -> Result<String> {
        self.tera
            .render(INDEX_TEMPLATE, &Context::new())
            .context("failed to render index page")
    }

    pub fn render_report(&self, company_name: &str, url: &str, data: &AgentResponse) -> Result<String> {
        let view = ReportView {
            company_name,
            url,
            link_url: is_web_url(url).then_some(url),
            data,
            generated_at: Utc::now().format("%Y-%m-%d %H:%M UTC").to_string(),
        };
        let context = Context::from_serialize(&view).context("failed to build report context")?;
        self.tera
            .render(REPORT_TEMPLATE, &context)
            .context("failed to render report")
    }
}
