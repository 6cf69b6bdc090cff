use gloo_events::EventListener;
use gloo_timers::callback::Timeout;
use js_sys::Reflect;
use serde_json::json;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use wasm_bindgen_futures::spawn_local;
use web_sys::{
    window, DomRect, Document, Element, EventTarget, HtmlAnchorElement, HtmlElement, HtmlImageElement,
};

use crate::article::RestSummarySource;
use crate::config::PreviewConfig;
use crate::controller::{
    resolve_summary, Effect, PreviewController, PreviewEvent, TimerKind, TriggerId,
};
use crate::device::{narrow_viewport_query, DeviceHints};
use crate::layout::{place_preview, Rect, SurfaceMetrics};
use crate::logging::{log_event, LogLevel};
use crate::render::{ArticleCard, ExtractText, PreviewView, FAILURE_MESSAGE, LOADING_MESSAGE};

const SURFACE_CLASS: &str = "wiki-preview";
const VISIBLE_CLASS: &str = "show";
const THUMBNAIL_SELECTOR: &str = ".wiki-preview-thumbnail";
const FOOTER_ICON_ALT: &str = "Wikipedia logo";

#[derive(Default)]
struct Timers {
    show: Option<Timeout>,
    hide: Option<Timeout>,
}

impl Timers {
    fn slot(&mut self, kind: TimerKind) -> &mut Option<Timeout> {
        match kind {
            TimerKind::Show => &mut self.show,
            TimerKind::Hide => &mut self.hide,
        }
    }
}

struct Page {
    config: PreviewConfig,
    document: Document,
    container: Element,
    surface: HtmlElement,
    triggers: Vec<HtmlAnchorElement>,
    controller: RefCell<PreviewController>,
    source: RestSummarySource,
    timers: RefCell<Timers>,
    layout_listeners: RefCell<Vec<EventListener>>,
}

impl Page {
    fn mount(config: PreviewConfig, document: Document, container: Element) -> Result<Rc<Self>, JsValue> {
        let surface = create_surface(&document)?;
        let triggers = collect_triggers(&document, &config.trigger_selector)?;

        let mut controller = PreviewController::new(config.clone());
        let ids: Vec<TriggerId> = triggers
            .iter()
            .map(|anchor| controller.register_trigger(anchor.href()))
            .collect();

        let page = Rc::new(Self {
            source: RestSummarySource::new(config.summary_endpoint.clone()),
            config,
            document,
            container,
            surface,
            triggers,
            controller: RefCell::new(controller),
            timers: RefCell::new(Timers::default()),
            layout_listeners: RefCell::new(Vec::new()),
        });

        for (anchor, id) in page.triggers.iter().zip(ids) {
            listen(&page, anchor, "mouseenter", PreviewEvent::HoverEnter(id));
            listen(&page, anchor, "mouseleave", PreviewEvent::HoverExit(id));
        }
        listen(&page, &page.surface, "mouseenter", PreviewEvent::SurfaceEnter);
        listen(&page, &page.surface, "mouseleave", PreviewEvent::SurfaceLeave);
        listen(&page, &page.surface, "click", PreviewEvent::SurfaceClick);

        Ok(page)
    }

    fn place(&self, trigger: TriggerId) -> Result<(), JsValue> {
        let Some(anchor) = self.triggers.get(trigger.index()) else {
            return Ok(());
        };

        let placement = place_preview(
            rect_of(&anchor.get_bounding_client_rect()),
            rect_of(&self.container.get_bounding_client_rect()),
            SurfaceMetrics {
                width: self.config.preview_width,
                height: f64::from(self.surface.offset_height()),
                padding: self.config.padding,
            },
            scroll_offset(),
        );

        let style = self.surface.style();
        style.set_property("left", &format!("{:.2}px", placement.left))?;
        style.set_property("top", &format!("{:.2}px", placement.top))?;
        Ok(())
    }

    fn set_visible(&self, visible: bool) -> Result<(), JsValue> {
        let classes = self.surface.class_list();
        if visible {
            classes.add_1(VISIBLE_CLASS)
        } else {
            classes.remove_1(VISIBLE_CLASS)
        }
    }
}

pub fn run() {
    let Some(document) = window().and_then(|w| w.document()) else {
        return;
    };

    let loading = Reflect::get(&document, &JsValue::from_str("readyState"))
        .ok()
        .and_then(|state| state.as_string())
        .is_some_and(|state| state == "loading");

    if loading {
        EventListener::once(&document, "DOMContentLoaded", |_| init()).forget();
    } else {
        init();
    }
}

fn init() {
    let config = PreviewConfig::from_lookup(read_setting);

    if device_hints(&config).is_touch_context() {
        log_event(&config, LogLevel::Info, "preview_disabled", json!({ "reason": "touch_context" }));
        return;
    }

    let Some(document) = window().and_then(|w| w.document()) else {
        return;
    };
    let Some(container) = document
        .query_selector(&config.container_selector)
        .ok()
        .flatten()
    else {
        log_event(
            &config,
            LogLevel::Info,
            "preview_disabled",
            json!({ "reason": "missing_container", "selector": config.container_selector }),
        );
        return;
    };

    match Page::mount(config.clone(), document, container) {
        Ok(page) => log_event(
            &config,
            LogLevel::Info,
            "preview_activated",
            json!({ "triggers": page.triggers.len() }),
        ),
        Err(error) => log_dom_failure(&config, "mount", &error),
    }
}

/// `data-<key>` on the root element wins over the `--<key>` custom property.
fn read_setting(key: &str) -> Option<String> {
    let win = window()?;
    let root = win.document()?.document_element()?;

    if let Some(value) = root
        .get_attribute(&format!("data-{key}"))
        .filter(|value| !value.trim().is_empty())
    {
        return Some(value);
    }

    win.get_computed_style(&root)
        .ok()
        .flatten()?
        .get_property_value(&format!("--{key}"))
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn device_hints(config: &PreviewConfig) -> DeviceHints {
    let Some(win) = window() else {
        return DeviceHints::default();
    };

    DeviceHints {
        user_agent: win.navigator().user_agent().unwrap_or_default(),
        has_touch: Reflect::has(&win, &JsValue::from_str("ontouchstart")).unwrap_or(false),
        narrow_viewport: win
            .match_media(&narrow_viewport_query(config.mobile_max_width))
            .ok()
            .flatten()
            .map(|mq| mq.matches())
            .unwrap_or(false),
    }
}

fn create_surface(document: &Document) -> Result<HtmlElement, JsValue> {
    let surface = document
        .create_element("div")?
        .dyn_into::<HtmlElement>()
        .map_err(JsValue::from)?;
    surface.set_class_name(SURFACE_CLASS);

    let body = document
        .body()
        .ok_or_else(|| JsValue::from_str("document has no body"))?;
    body.append_child(&surface)?;
    Ok(surface)
}

fn collect_triggers(document: &Document, selector: &str) -> Result<Vec<HtmlAnchorElement>, JsValue> {
    let nodes = document.query_selector_all(selector)?;

    Ok((0..nodes.length())
        .filter_map(|index| nodes.get(index))
        .filter_map(|node| node.dyn_into::<HtmlAnchorElement>().ok())
        .collect())
}

fn listen(page: &Rc<Page>, target: &EventTarget, event_type: &'static str, event: PreviewEvent) {
    let page = Rc::clone(page);
    EventListener::new(target, event_type, move |_| dispatch(&page, event)).forget();
}

fn dispatch(page: &Rc<Page>, event: PreviewEvent) {
    let effects = page.controller.borrow_mut().handle(event);
    apply(page, effects);
}

fn apply(page: &Rc<Page>, effects: Vec<Effect>) {
    for effect in effects {
        if let Err(error) = perform(page, effect) {
            log_dom_failure(&page.config, "effect", &error);
        }
    }
}

fn perform(page: &Rc<Page>, effect: Effect) -> Result<(), JsValue> {
    match effect {
        Effect::StartTimer {
            kind,
            ticket,
            delay,
        } => {
            let weak = Rc::downgrade(page);
            let millis = u32::try_from(delay.as_millis()).unwrap_or(u32::MAX);
            let timeout = Timeout::new(millis, move || {
                if let Some(page) = weak.upgrade() {
                    dispatch(&page, PreviewEvent::TimerElapsed(kind, ticket));
                }
            });
            *page.timers.borrow_mut().slot(kind) = Some(timeout);
        }
        Effect::CancelTimer(kind) => {
            drop(page.timers.borrow_mut().slot(kind).take());
        }
        Effect::Paint(view) => paint(&page.document, &page.surface, &view, &page.config.footer_icon)?,
        Effect::Place(trigger) => page.place(trigger)?,
        Effect::SetVisible(visible) => page.set_visible(visible)?,
        Effect::AwaitLayout(trigger) => await_layout(page, trigger)?,
        Effect::Fetch(request) => {
            let page = Rc::clone(page);
            spawn_local(async move {
                let effects = resolve_summary(&page.controller, &page.source, request).await;
                apply(&page, effects);
            });
        }
        Effect::Open(url) => {
            if let Some(win) = window() {
                win.open_with_url_and_target(&url, "_blank")?;
            }
        }
    }

    Ok(())
}

/// The surface height is only final once the thumbnail (if any) has loaded,
/// so wait for that, or for two frames when there is nothing to wait on.
fn await_layout(page: &Rc<Page>, trigger: TriggerId) -> Result<(), JsValue> {
    let pending_image = page
        .surface
        .query_selector(THUMBNAIL_SELECTOR)?
        .and_then(|element| element.dyn_into::<HtmlImageElement>().ok())
        .filter(|image| !image.complete());

    let mut listeners = page.layout_listeners.borrow_mut();
    listeners.clear();

    let Some(image) = pending_image else {
        drop(listeners);
        return after_two_frames(Rc::downgrade(page), trigger);
    };

    for event_type in ["load", "error"] {
        let weak = Rc::downgrade(page);
        listeners.push(EventListener::once(&image, event_type, move |_| {
            settle(&weak, trigger);
        }));
    }
    Ok(())
}

fn after_two_frames(page: Weak<Page>, trigger: TriggerId) -> Result<(), JsValue> {
    let Some(win) = window() else {
        return Ok(());
    };

    let settled = page.clone();
    let second = Closure::once_into_js(move || settle(&settled, trigger));
    let first = Closure::once_into_js(move || {
        let Some(win) = window() else {
            return;
        };
        if let Err(error) = win.request_animation_frame(second.unchecked_ref()) {
            if let Some(page) = page.upgrade() {
                log_dom_failure(&page.config, "layout_frame", &error);
            }
        }
    });

    win.request_animation_frame(first.unchecked_ref())?;
    Ok(())
}

fn settle(page: &Weak<Page>, trigger: TriggerId) {
    if let Some(page) = page.upgrade() {
        dispatch(&page, PreviewEvent::LayoutSettled(trigger));
    }
}

fn paint(document: &Document, surface: &HtmlElement, view: &PreviewView, footer_icon: &str) -> Result<(), JsValue> {
    let content = match view {
        PreviewView::Loading => text_block(document, "wiki-preview-loading", LOADING_MESSAGE)?,
        PreviewView::Failed => text_block(document, "wiki-preview-error", FAILURE_MESSAGE)?,
        PreviewView::Article(card) => article_block(document, card, footer_icon)?,
    };

    surface.set_text_content(None);
    surface.append_child(&content)?;
    Ok(())
}

fn text_block(document: &Document, class_name: &str, text: &str) -> Result<Element, JsValue> {
    let block = document.create_element("div")?;
    block.set_class_name(class_name);
    block.set_text_content(Some(text));
    Ok(block)
}

fn article_block(document: &Document, card: &ArticleCard, footer_icon: &str) -> Result<Element, JsValue> {
    let content = document.create_element("div")?;
    content.set_class_name("wiki-preview-content");

    if let Some(thumbnail) = card.thumbnail.as_deref() {
        let image = document.create_element("img")?;
        image.set_class_name("wiki-preview-thumbnail");
        image.set_attribute("src", thumbnail)?;
        image.set_attribute("alt", &card.title)?;
        content.append_child(&image)?;
    }

    let label = document.create_element("span")?;
    label.set_class_name("wiki-preview-title");
    label.set_text_content(Some(&card.text.styled_label()));

    let paragraph = document.create_element("p")?;
    paragraph.set_class_name("wiki-preview-extract");
    match &card.text {
        ExtractText::Inline { before, after, .. } => {
            paragraph.append_with_str_1(before)?;
            paragraph.append_with_node_1(&label)?;
            paragraph.append_with_str_1(after)?;
        }
        ExtractText::Leading { extract, .. } => {
            paragraph.append_with_node_1(&label)?;
            paragraph.append_with_str_1(&format!(" {extract}"))?;
        }
    }
    content.append_child(&paragraph)?;

    let footer = document.create_element("div")?;
    footer.set_class_name("wiki-preview-footer");
    let icon = document.create_element("img")?;
    icon.set_class_name("wiki-icon");
    icon.set_attribute("src", footer_icon)?;
    icon.set_attribute("alt", FOOTER_ICON_ALT)?;
    footer.append_child(&icon)?;
    content.append_child(&footer)?;

    Ok(content)
}

fn rect_of(rect: &DomRect) -> Rect {
    Rect {
        left: rect.left(),
        top: rect.top(),
        right: rect.right(),
        bottom: rect.bottom(),
    }
}

fn scroll_offset() -> (f64, f64) {
    let Some(win) = window() else {
        return (0.0, 0.0);
    };

    (win.scroll_x().unwrap_or(0.0), win.scroll_y().unwrap_or(0.0))
}

fn log_dom_failure(config: &PreviewConfig, stage: &str, error: &JsValue) {
    log_event(
        config,
        LogLevel::Warn,
        "dom_operation_failed",
        json!({ "stage": stage, "error": format!("{error:?}") }),
    );
}
