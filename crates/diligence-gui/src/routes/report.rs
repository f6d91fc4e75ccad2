use std::convert::Infallible;

use axum::{
    Form,
    extract::{State, rejection::FormRejection},
    response::{
        Html,
        sse::{Event, KeepAlive, Sse},
    },
};
use diligence_core::CompanyInput;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tracing::info;

use crate::error::AppError;
use crate::state::AppState;
use crate::stream::report_stream;

#[derive(Debug, Deserialize)]
pub struct CompanyForm {
    pub company_name: String,
    pub url: String,
}

pub async fn index(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    Ok(Html(state.templates().render_index()?))
}

pub async fn analyze(
    State(state): State<AppState>,
    form: Result<Form<CompanyForm>, FormRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let Form(form) = form.map_err(|rejection| AppError::new(rejection.status(), rejection.body_text()))?;
    let input = CompanyInput::new(form.company_name, form.url)?;
    info!(company = %input.company_name, url = %input.url, "starting due diligence run");

    let events = report_stream(&state, input).map(|frame| Ok(frame.into_sse_event()));
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
