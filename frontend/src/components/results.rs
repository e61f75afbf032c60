use super::super::Model;
use pulldown_cmark::{Event, Parser, html};
use yew::prelude::*;

/// Markdown to HTML with raw HTML blocks rendered as plain text.
fn report_to_html(report: &str) -> String {
    let events = Parser::new(report).map(|event| match event {
        Event::Html(raw) => Event::Text(raw),
        other => other,
    });
    let mut out = String::new();
    html::push_html(&mut out, events);
    out
}

pub fn render_results(model: &Model) -> Html {
    let report = model
        .result
        .as_ref()
        .map(|result| result.report.trim())
        .filter(|report| !report.is_empty());

    html! {
        <div class="results-container">
            <h2>{"Diagnostic Report"}</h2>
            <div class="report-body">
                {
                    match report {
                        Some(report) => Html::from_html_unchecked(AttrValue::from(report_to_html(report))),
                        None => html! { <p class="no-results-message">{"No report yet."}</p> },
                    }
                }
            </div>
        </div>
    }
}
