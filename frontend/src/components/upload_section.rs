use super::super::Model;
use super::super::Msg;
use super::utils::{debounce, first_file};
use wasm_bindgen::JsCast;
use web_sys::{DragEvent, HtmlInputElement};
use yew::prelude::*;

pub fn render_upload_section(model: &Model, ctx: &Context<Model>) -> Html {
    let link = ctx.link();
    let handle_change = link.batch_callback(|e: Event| {
        let input: HtmlInputElement = e.target_unchecked_into();
        let file = input.files().as_ref().and_then(first_file);
        input.set_value("");
        file.map(Msg::FileSelected)
    });

    let handle_drag_over = link.callback(|e: DragEvent| {
        e.prevent_default();
        Msg::SetDragging(true)
    });

    let handle_drag_leave = link.callback(|e: DragEvent| {
        e.prevent_default();
        Msg::SetDragging(false)
    });

    let handle_drop = link.callback(Msg::HandleDrop);
    let trigger_file_input = Callback::from(|_| {
        if let Some(input) = web_sys::window()
            .and_then(|window| window.document())
            .and_then(|document| document.get_element_by_id("file-input"))
        {
            if let Ok(html_input) = input.dyn_into::<web_sys::HtmlElement>() {
                html_input.click();
            }
        }
    });

    let predict = {
        let link = link.clone();
        debounce(300, move || link.send_message(Msg::Predict))
    };

    let file_name = model
        .file
        .as_ref()
        .map_or_else(|| "No file chosen".to_string(), |file| file.name());

    html! {
        <div class="upload-section">
            <input
                type="file"
                id="file-input"
                accept=".dcm,application/dicom"
                style="display: none;"
                onchange={handle_change}
            />

            <div
                id="drop-zone"
                class={classes!("upload-area", model.is_dragging.then_some("drag-over"))}
                ondragover={handle_drag_over}
                ondragleave={handle_drag_leave}
                ondrop={handle_drop}
                onclick={debounce(300, {
                    let trigger_file_input = trigger_file_input.clone();
                    move || trigger_file_input.emit(())
                })}
            >
                <p>{"Choose File"}</p>
                <p class="file-types">{"Drop a DICOM (.dcm) radiograph here, or click"}</p>
            </div>

            <p class="file-name">{ file_name }</p>

            <button class="analyze-btn" disabled={model.loading} onclick={predict}>
                {"Predict"}
            </button>
        </div>
    }
}
