use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;

use serde_json::json;

use crate::article::{ArticleKey, ArticleSummary, FetchError, SummarySource};
use crate::config::PreviewConfig;
use crate::logging::{log_event, LogLevel};
use crate::render::{ArticleCard, PreviewView};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct TriggerId(usize);

impl TriggerId {
    pub(crate) fn index(self) -> usize {
        self.0
    }

    #[cfg(test)]
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index)
    }
}

/// Identifies one scheduling of a timer; a fired timer whose ticket is no
/// longer pending is ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct TimerTicket(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TimerKind {
    Show,
    Hide,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PreviewEvent {
    HoverEnter(TriggerId),
    HoverExit(TriggerId),
    SurfaceEnter,
    SurfaceLeave,
    SurfaceClick,
    TimerElapsed(TimerKind, TimerTicket),
    LayoutSettled(TriggerId),
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Effect {
    StartTimer {
        kind: TimerKind,
        ticket: TimerTicket,
        delay: Duration,
    },
    CancelTimer(TimerKind),
    Paint(PreviewView),
    Place(TriggerId),
    SetVisible(bool),
    AwaitLayout(TriggerId),
    Fetch(SummaryRequest),
    Open(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SummaryRequest {
    trigger: TriggerId,
    key: ArticleKey,
}

impl SummaryRequest {
    pub(crate) fn key(&self) -> &ArticleKey {
        &self.key
    }
}

#[derive(Debug, Default, PartialEq)]
struct PreviewSession {
    current: Option<TriggerId>,
    pending_show: Option<(TimerTicket, TriggerId)>,
    pending_hide: Option<TimerTicket>,
    visible: bool,
    page_url: Option<String>,
}

pub(crate) struct PreviewController {
    config: PreviewConfig,
    triggers: Vec<String>,
    cache: HashMap<ArticleKey, ArticleSummary>,
    session: PreviewSession,
    next_ticket: u64,
}

impl PreviewController {
    pub(crate) fn new(config: PreviewConfig) -> Self {
        Self {
            config,
            triggers: Vec::new(),
            cache: HashMap::new(),
            session: PreviewSession::default(),
            next_ticket: 0,
        }
    }

    pub(crate) fn register_trigger(&mut self, href: impl Into<String>) -> TriggerId {
        self.triggers.push(href.into());
        TriggerId(self.triggers.len() - 1)
    }

    #[cfg(test)]
    pub(crate) fn current_trigger(&self) -> Option<TriggerId> {
        self.session.current
    }

    #[cfg(test)]
    pub(crate) fn is_visible(&self) -> bool {
        self.session.visible
    }

    #[cfg(test)]
    pub(crate) fn cached(&self, key: &ArticleKey) -> Option<&ArticleSummary> {
        self.cache.get(key)
    }

    pub(crate) fn handle(&mut self, event: PreviewEvent) -> Vec<Effect> {
        match event {
            PreviewEvent::HoverEnter(trigger) => self.hover_enter(trigger),
            PreviewEvent::HoverExit(_) => self.hover_exit(),
            PreviewEvent::SurfaceEnter => self.cancel_hide().into_iter().collect(),
            PreviewEvent::SurfaceLeave => self.hide(),
            PreviewEvent::SurfaceClick => self
                .session
                .page_url
                .clone()
                .map(Effect::Open)
                .into_iter()
                .collect(),
            PreviewEvent::TimerElapsed(TimerKind::Show, ticket) => self.show_elapsed(ticket),
            PreviewEvent::TimerElapsed(TimerKind::Hide, ticket) => self.hide_elapsed(ticket),
            PreviewEvent::LayoutSettled(trigger) => {
                if self.session.current == Some(trigger) {
                    vec![Effect::Place(trigger)]
                } else {
                    Vec::new()
                }
            }
        }
    }

    /// Caches a successful summary, but only paints if `request` still
    /// belongs to the current trigger.
    pub(crate) fn complete_fetch(
        &mut self,
        request: SummaryRequest,
        outcome: Result<ArticleSummary, FetchError>,
    ) -> Vec<Effect> {
        match &outcome {
            Ok(summary) => {
                self.cache.insert(request.key.clone(), summary.clone());
            }
            Err(error) => log_event(
                &self.config,
                LogLevel::Warn,
                "summary_fetch_failed",
                json!({
                    "key": request.key.as_str(),
                    "errorClass": error.error_class(),
                    "error": error.to_string(),
                }),
            ),
        }

        if self.session.current != Some(request.trigger) {
            log_event(
                &self.config,
                LogLevel::Debug,
                "stale_summary_discarded",
                json!({ "key": request.key.as_str() }),
            );
            return Vec::new();
        }

        match outcome {
            Ok(summary) => self.present(request.trigger, &summary),
            Err(_) => vec![Effect::Paint(PreviewView::Failed)],
        }
    }

    fn hover_enter(&mut self, trigger: TriggerId) -> Vec<Effect> {
        self.session.current = Some(trigger);

        let mut effects: Vec<Effect> = self.cancel_hide().into_iter().collect();
        if self.session.pending_show.take().is_some() {
            effects.push(Effect::CancelTimer(TimerKind::Show));
        }

        let ticket = self.issue_ticket();
        self.session.pending_show = Some((ticket, trigger));
        effects.push(Effect::StartTimer {
            kind: TimerKind::Show,
            ticket,
            delay: self.config.show_delay,
        });
        effects
    }

    fn hover_exit(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.session.pending_show.take().is_some() {
            effects.push(Effect::CancelTimer(TimerKind::Show));
        }

        let ticket = self.issue_ticket();
        self.session.pending_hide = Some(ticket);
        effects.push(Effect::StartTimer {
            kind: TimerKind::Hide,
            ticket,
            delay: self.config.hide_delay,
        });
        effects
    }

    fn show_elapsed(&mut self, ticket: TimerTicket) -> Vec<Effect> {
        let Some((pending, trigger)) = self.session.pending_show else {
            return Vec::new();
        };
        if pending != ticket {
            return Vec::new();
        }
        self.session.pending_show = None;

        if self.session.current != Some(trigger) {
            return Vec::new();
        }

        self.begin_show(trigger)
    }

    fn hide_elapsed(&mut self, ticket: TimerTicket) -> Vec<Effect> {
        if self.session.pending_hide != Some(ticket) {
            return Vec::new();
        }
        self.session.pending_hide = None;
        self.hide()
    }

    fn begin_show(&mut self, trigger: TriggerId) -> Vec<Effect> {
        let Some(href) = self.triggers.get(trigger.index()) else {
            return Vec::new();
        };
        let Some(key) = ArticleKey::from_href(href) else {
            log_event(
                &self.config,
                LogLevel::Debug,
                "article_key_rejected",
                json!({ "href": href }),
            );
            return Vec::new();
        };

        self.session.visible = true;
        self.session.page_url = None;

        let mut effects = vec![
            Effect::Paint(PreviewView::Loading),
            Effect::Place(trigger),
            Effect::SetVisible(true),
        ];

        match self.cache.get(&key).cloned() {
            Some(summary) => {
                log_event(
                    &self.config,
                    LogLevel::Debug,
                    "summary_cache_hit",
                    json!({ "key": key.as_str() }),
                );
                effects.extend(self.present(trigger, &summary));
            }
            None => effects.push(Effect::Fetch(SummaryRequest { trigger, key })),
        }

        effects
    }

    fn present(&mut self, trigger: TriggerId, summary: &ArticleSummary) -> Vec<Effect> {
        let card = ArticleCard::from_summary(summary, self.config.title_inline_threshold);
        self.session.page_url = card.page_url.clone();

        vec![
            Effect::Paint(PreviewView::Article(card)),
            Effect::AwaitLayout(trigger),
        ]
    }

    fn hide(&mut self) -> Vec<Effect> {
        self.session.visible = false;
        self.session.current = None;
        vec![Effect::SetVisible(false)]
    }

    fn cancel_hide(&mut self) -> Option<Effect> {
        self.session
            .pending_hide
            .take()
            .map(|_| Effect::CancelTimer(TimerKind::Hide))
    }

    fn issue_ticket(&mut self) -> TimerTicket {
        self.next_ticket += 1;
        TimerTicket(self.next_ticket)
    }
}

/// Runs the network half of a show. No borrow of `controller` is held while
/// the fetch is pending.
pub(crate) async fn resolve_summary<S: SummarySource>(
    controller: &RefCell<PreviewController>,
    source: &S,
    request: SummaryRequest,
) -> Vec<Effect> {
    let outcome = source.fetch_summary(request.key()).await;
    controller.borrow_mut().complete_fetch(request, outcome)
}
