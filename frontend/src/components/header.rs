use yew::prelude::*;

/// Renders the application header
pub fn render_header() -> Html {
    html! {
        <header class="app-header">
            <h1>{"Dental X-ray Diagnosis"}</h1>
        </header>
    }
}
