//! Typed publish/subscribe channels connecting the renderer lifecycle to its consumer.

use std::fmt;
use std::sync::Arc;

use crate::error::RenderError;
use crate::renderer::bounds::BoundsLookup;
use crate::renderer::RenderFinishedEventArgs;

/// Handle returned by `EventEmitter::on`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler<T> = Box<dyn FnMut(&T) + Send>;

/// A single typed event channel. Handlers run synchronously, in
/// subscription order, on the context that triggers the event.
pub struct EventEmitter<T> {
    handlers: Vec<(SubscriptionId, Handler<T>)>,
    next_id: u64,
}

impl<T> Default for EventEmitter<T> {
    fn default() -> Self {
        Self {
            handlers: Vec::new(),
            next_id: 0,
        }
    }
}

impl<T> fmt::Debug for EventEmitter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl<T> EventEmitter<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&T) + Send + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, Box::new(handler)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn off(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(h, _)| *h != id);
        self.handlers.len() != before
    }

    pub fn trigger(&mut self, value: &T) {
        for (_, handler) in self.handlers.iter_mut() {
            handler(value);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// One renderer lifecycle notification, used when all channels are
/// observed through a single sink.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    PreRender(bool),
    PartialLayoutFinished(RenderFinishedEventArgs),
    PartialRenderFinished(RenderFinishedEventArgs),
    RenderFinished(RenderFinishedEventArgs),
    PostRenderFinished(BoundsLookup),
    Error(RenderError),
}

impl RenderEvent {
    /// Short name matching the message tag used by the worker protocol.
    pub fn name(&self) -> &'static str {
        match self {
            RenderEvent::PreRender(_) => "preRender",
            RenderEvent::PartialLayoutFinished(_) => "partialLayoutFinished",
            RenderEvent::PartialRenderFinished(_) => "partialRenderFinished",
            RenderEvent::RenderFinished(_) => "renderFinished",
            RenderEvent::PostRenderFinished(_) => "postRenderFinished",
            RenderEvent::Error(_) => "error",
        }
    }
}

/// The channels every score renderer exposes, whether it renders locally
/// or through a worker.
#[derive(Debug, Default)]
pub struct RendererEvents {
    /// Fired before layout starts; `true` when caused by a resize
    pub pre_render: EventEmitter<bool>,
    /// Geometry of a partial is known (before pixels are produced)
    pub partial_layout_finished: EventEmitter<RenderFinishedEventArgs>,
    /// A partial has been painted
    pub partial_render_finished: EventEmitter<RenderFinishedEventArgs>,
    /// Whole pass finished, carrying the total bounds
    pub render_finished: EventEmitter<RenderFinishedEventArgs>,
    /// Fired last, with the bounds lookup of the pass
    pub post_render_finished: EventEmitter<BoundsLookup>,
    pub error: EventEmitter<RenderError>,
}

impl RendererEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe one sink to every channel.
    pub fn subscribe_all<F>(&mut self, sink: F)
    where
        F: Fn(RenderEvent) + Send + Sync + 'static,
    {
        let sink = Arc::new(sink);
        let s = Arc::clone(&sink);
        self.pre_render.on(move |resize| s(RenderEvent::PreRender(*resize)));
        let s = Arc::clone(&sink);
        self.partial_layout_finished
            .on(move |e| s(RenderEvent::PartialLayoutFinished(e.clone())));
        let s = Arc::clone(&sink);
        self.partial_render_finished
            .on(move |e| s(RenderEvent::PartialRenderFinished(e.clone())));
        let s = Arc::clone(&sink);
        self.render_finished
            .on(move |e| s(RenderEvent::RenderFinished(e.clone())));
        let s = Arc::clone(&sink);
        self.post_render_finished
            .on(move |lookup| s(RenderEvent::PostRenderFinished(lookup.clone())));
        self.error.on(move |e| sink(RenderEvent::Error(e.clone())));
    }

    /// Re-emit `event` on its typed channel.
    pub fn dispatch(&mut self, event: &RenderEvent) {
        match event {
            RenderEvent::PreRender(resize) => self.pre_render.trigger(resize),
            RenderEvent::PartialLayoutFinished(e) => self.partial_layout_finished.trigger(e),
            RenderEvent::PartialRenderFinished(e) => self.partial_render_finished.trigger(e),
            RenderEvent::RenderFinished(e) => self.render_finished.trigger(e),
            RenderEvent::PostRenderFinished(lookup) => self.post_render_finished.trigger(lookup),
            RenderEvent::Error(e) => self.error.trigger(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn handlers_run_in_subscription_order_until_removed() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut emitter = EventEmitter::<u32>::new();

        let a = Arc::clone(&seen);
        let first = emitter.on(move |v| a.lock().unwrap().push(("first", *v)));
        let b = Arc::clone(&seen);
        emitter.on(move |v| b.lock().unwrap().push(("second", *v)));

        emitter.trigger(&1);
        assert!(emitter.off(first));
        assert!(!emitter.off(first));
        emitter.trigger(&2);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![("first", 1), ("second", 1), ("second", 2)]
        );
    }

    #[test]
    fn dispatch_reaches_the_matching_channel() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut events = RendererEvents::new();
        let s = Arc::clone(&seen);
        events.subscribe_all(move |e| s.lock().unwrap().push(e.name()));

        events.dispatch(&RenderEvent::PreRender(true));
        events.dispatch(&RenderEvent::Error(RenderError::Transport("gone".into())));

        assert_eq!(*seen.lock().unwrap(), vec!["preRender", "error"]);
    }
}
