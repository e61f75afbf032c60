mod components;

use components::header::render_header;
use components::results::render_results;
use components::upload_section::render_upload_section;
use components::utils::{first_file, render_error_message};
use gloo_file::File as GlooFile;
use gloo_net::http::Request;
use shared::{ErrorResponse, ProcessResponse};
use wasm_bindgen_futures::spawn_local;
use web_sys::DragEvent;
use yew::prelude::*;

/// Backend origin baked in at build time; empty means same origin.
const API_URL: &str = match option_env!("API_URL") {
    Some(url) => url,
    None => "",
};

// Yew msg components
enum Msg {
    FileSelected(GlooFile),
    Predict,
    PredictionReady(ProcessResponse),
    SetError(Option<String>),
    SetDragging(bool),
    HandleDrop(DragEvent),
}

// Main component
struct Model {
    file: Option<GlooFile>,
    result: Option<ProcessResponse>,
    loading: bool,
    error: Option<String>,
    is_dragging: bool,
}

impl Component for Model {
    type Message = Msg;
    type Properties = ();

    fn create(_ctx: &Context<Self>) -> Self {
        Self {
            file: None,
            result: None,
            loading: false,
            error: None,
            is_dragging: false,
        }
    }

    fn update(&mut self, ctx: &Context<Self>, msg: Self::Message) -> bool {
        match msg {
            Msg::FileSelected(file) => {
                self.file = Some(file);
                self.error = None;
                true
            }
            Msg::Predict => self.handle_predict(ctx),
            Msg::PredictionReady(response) => {
                self.result = Some(response);
                self.loading = false;
                true
            }
            Msg::SetError(error) => {
                self.error = error;
                self.loading = false;
                true
            }
            Msg::SetDragging(is_dragging) => {
                self.is_dragging = is_dragging;
                true
            }
            Msg::HandleDrop(event) => self.handle_drop(ctx, event),
        }
    }

    fn view(&self, ctx: &Context<Self>) -> Html {
        html! {
            <div class="container">
                { render_header() }

                <main class="main-content">
                    <section class="panel">
                        { render_upload_section(self, ctx) }
                        { render_error_message(self) }
                        if self.loading {
                            <div class="spinner"></div>
                        }
                        if let Some(result) = &self.result {
                            <img class="annotated-image" src={result.annotated_image_url.clone()} alt="Annotated X-ray" />
                        }
                    </section>
                    <section class="panel">
                        { render_results(self) }
                    </section>
                </main>
            </div>
        }
    }
}

impl Model {
    fn handle_predict(&mut self, ctx: &Context<Self>) -> bool {
        let Some(file) = self.file.clone() else {
            ctx.link()
                .send_message(Msg::SetError(Some("Choose a DICOM file first.".into())));
            return false;
        };

        self.loading = true;
        self.error = None;
        self.send_process_request(ctx, file);
        true
    }

    fn handle_drop(&mut self, ctx: &Context<Self>, event: DragEvent) -> bool {
        event.prevent_default();
        self.is_dragging = false;

        if let Some(file) = event
            .data_transfer()
            .and_then(|data_transfer| data_transfer.files())
            .and_then(|files| first_file(&files))
        {
            ctx.link().send_message(Msg::FileSelected(file));
        }
        true
    }

    fn send_process_request(&self, ctx: &Context<Self>, file: GlooFile) {
        let link = ctx.link().clone();
        spawn_local(async move {
            let form_data = match web_sys::FormData::new() {
                Ok(form_data) => form_data,
                Err(_) => {
                    link.send_message(Msg::SetError(Some("Could not build upload form.".into())));
                    return;
                }
            };
            if form_data.append_with_blob("file", file.as_ref()).is_err() {
                link.send_message(Msg::SetError(Some("Could not attach file.".into())));
                return;
            }

            let request = match Request::post(&format!("{}/process", API_URL)).body(form_data) {
                Ok(request) => request,
                Err(e) => {
                    link.send_message(Msg::SetError(Some(format!("Failed to build request: {}", e))));
                    return;
                }
            };

            match request.send().await {
                Ok(response) if response.ok() => match response.json::<ProcessResponse>().await {
                    Ok(result) => link.send_message(Msg::PredictionReady(result)),
                    Err(e) => link.send_message(Msg::SetError(Some(format!(
                        "Failed to parse response: {}",
                        e
                    )))),
                },
                Ok(response) => {
                    let status = response.status();
                    let message = match response.json::<ErrorResponse>().await {
                        Ok(body) => body.error,
                        Err(_) => "unexpected response".to_string(),
                    };
                    gloo_console::error!(format!("Processing failed: {} {}", status, message));
                    link.send_message(Msg::SetError(Some(format!(
                        "Server error {}: {}",
                        status, message
                    ))));
                }
                Err(e) => {
                    gloo_console::error!(format!("Upload failed: {:?}", e));
                    link.send_message(Msg::SetError(Some(format!("Upload failed: {}", e))));
                }
            }
        });
    }
}

fn main() {
    wasm_logger::init(wasm_logger::Config::default());
    yew::Renderer::<Model>::new().render();
}
