use std::collections::HashMap;
use std::sync::Arc;

use eframe::egui::Vec2;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use super::config::{EvictionPolicy, GraphConfig};
use super::error::{FetchError, GraphResult};
use super::gateway::{ChildGateway, FetchReply};
use super::layout::{self, layout_children, node_label};
use super::model::{ChildDescriptor, NodeDescriptor};
use super::registry::{ChildCache, FetchTicket, Node, NodeKey, NodeRegistry, NodeSeed, VisualState};
use super::render::RenderSink;
use super::viewport::{ViewState, ViewportController};

/// Notifications for the host, drained once per frame.
#[derive(Debug)]
pub enum GraphEvent {
    SelectionChanged(NodeKey),
    ChildrenLaidOut { parent: NodeKey, added: usize },
    FetchFailed { node_id: String, error: FetchError },
    Centered(NodeKey),
}

#[derive(Clone, Copy, Debug)]
enum FetchTarget {
    Root,
    Node(NodeKey),
}

/// Deferred children expansion for the latest selection.
#[derive(Clone, Copy, Debug)]
struct PendingExpand {
    node: NodeKey,
    due_ms: f64,
}

/// Owns the tree and drives selection, trail upkeep and child expansion.
///
/// Time is supplied by the caller (`now_ms`), replies are pulled from the
/// gateway in [`Navigator::poll`], and every visual effect goes through the
/// [`RenderSink`] passed into each call.
pub struct Navigator<G> {
    config: GraphConfig,
    registry: NodeRegistry,
    gateway: G,
    rng: StdRng,
    viewport: ViewportController,
    selected: Option<NodeKey>,
    trail: Vec<NodeKey>,
    pending: Option<PendingExpand>,
    centering: Option<NodeKey>,
    in_flight: HashMap<FetchTicket, FetchTarget>,
    next_ticket: u64,
    events: Vec<GraphEvent>,
}

impl<G: ChildGateway> Navigator<G> {
    pub fn new(config: GraphConfig, gateway: G) -> GraphResult<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            config,
            registry: NodeRegistry::new(),
            gateway,
            rng,
            viewport: ViewportController::default(),
            selected: None,
            trail: Vec::new(),
            pending: None,
            centering: None,
            in_flight: HashMap::new(),
            next_ticket: 0,
            events: Vec::new(),
        })
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut GraphConfig {
        &mut self.config
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    #[cfg(test)]
    pub fn gateway_mut(&mut self) -> &mut G {
        &mut self.gateway
    }

    pub fn selected(&self) -> Option<NodeKey> {
        self.selected
    }

    /// Root to selected node, inclusive.
    pub fn trail(&self) -> &[NodeKey] {
        &self.trail
    }

    pub fn current_node(&self) -> Option<&Node> {
        self.selected.and_then(|key| self.registry.get(key))
    }

    pub fn start_node(&self) -> Option<&Node> {
        self.registry.root().and_then(|key| self.registry.get(key))
    }

    pub fn set_start_angle(&mut self, angle: Option<f64>) {
        self.config.start_angle = angle;
    }

    /// Switch the eviction policy. Moving to `Discard` also drops every child
    /// list kept so far, so nodes built from now on fetch again.
    pub fn set_eviction(&mut self, eviction: EvictionPolicy) {
        if eviction == EvictionPolicy::Discard && self.config.eviction != eviction {
            debug!("forgetting kept children");
            self.registry.forget_retained();
        }
        self.config.eviction = eviction;
    }

    /// True while a fetch or a deferred expansion is outstanding.
    pub fn has_pending_work(&self) -> bool {
        self.pending.is_some() || !self.in_flight.is_empty()
    }

    pub fn drain_events(&mut self) -> Vec<GraphEvent> {
        std::mem::take(&mut self.events)
    }

    /// Drop any current tree and fetch the configured start node.
    pub fn start<S>(&mut self, sink: &mut S)
    where
        S: RenderSink + ?Sized,
    {
        self.teardown(sink);
        let id = self.config.initial_node_id.clone();
        info!(id = %id, "loading start node");
        self.dispatch(FetchTarget::Root, &id);
    }

    /// Release every node, connector and outstanding request.
    pub fn teardown<S>(&mut self, sink: &mut S)
    where
        S: RenderSink + ?Sized,
    {
        for (ticket, _) in self.in_flight.drain() {
            self.gateway.cancel(ticket);
        }
        let removed = self.registry.clear();
        self.release(removed, sink);
        self.selected = None;
        self.trail.clear();
        self.pending = None;
        self.centering = None;
    }

    /// Apply fetch replies and fire the deferred expansion once it is due.
    pub fn poll<S>(&mut self, now_ms: f64, view: ViewState, sink: &mut S) -> GraphResult<()>
    where
        S: RenderSink + ?Sized,
    {
        for reply in self.gateway.poll() {
            self.apply_reply(reply, view, sink)?;
        }

        if let Some(pending) = self.pending
            && now_ms >= pending.due_ms
        {
            self.pending = None;
            if self.registry.contains(pending.node) {
                self.expand(pending.node, sink)?;
            }
        }
        Ok(())
    }

    /// Make `key` the selected node and reconcile the trail.
    ///
    /// Returns the node that actually ended up selected, which is the parent
    /// when an already selected node is picked again and return-to-parent is
    /// enabled.
    #[tracing::instrument(level = "debug", skip(self, sink))]
    pub fn select<S>(&mut self, key: NodeKey, now_ms: f64, sink: &mut S) -> GraphResult<NodeKey>
    where
        S: RenderSink + ?Sized,
    {
        let node = self.registry.node(key)?;
        let target = match node.parent() {
            Some(parent)
                if node.visual_state == VisualState::Selected && self.config.return_to_parent =>
            {
                debug!(%parent, "reselected, returning to parent");
                parent
            }
            _ => key,
        };

        if let Some(previous) = self.selected
            && previous != target
            && let Some(node) = self.registry.get_mut(previous)
        {
            node.visual_state = VisualState::Idle;
        }

        let trail = self.registry.path_from_root(target);
        for &member in &trail {
            let was_on_trail = self.trail.contains(&member);
            let node = self.registry.node_mut(member)?;
            node.visual_state = if member == target {
                VisualState::Selected
            } else {
                VisualState::Trailing
            };
            if !was_on_trail && let Some(handle) = node.connector {
                sink.set_connector_width(handle, self.config.line_width_selected);
            }
        }

        let popped = self.config.selected_distance();
        layout::move_to_distance(&mut self.registry, &self.config, sink, target, popped)?;

        let previous_trail = std::mem::replace(&mut self.trail, trail);
        for old in previous_trail {
            if self.trail.contains(&old) {
                continue;
            }
            let Some(node) = self.registry.get_mut(old) else {
                continue;
            };
            node.visual_state = VisualState::Idle;
            let resting = node.resting_distance;
            if let Some(handle) = node.connector {
                sink.set_connector_width(handle, self.config.line_width);
            }
            debug!(node = %old, "left the trail");
            self.collapse(old, sink)?;
            layout::move_to_distance(&mut self.registry, &self.config, sink, old, resting)?;
        }

        if self.config.prune_off_trail {
            self.prune_off_trail(sink)?;
        }

        if let Some(stale) = self.pending.take() {
            debug!(node = %stale.node, "cancelled pending expansion");
        }
        if self.config.show_children {
            self.pending = Some(PendingExpand {
                node: target,
                due_ms: now_ms + self.config.move_time,
            });
        }

        self.selected = Some(target);
        let id = self.registry.node(target)?.id.as_str();
        info!(
            node = %target,
            id,
            depth = self.trail.len().saturating_sub(1),
            "selected"
        );
        self.events.push(GraphEvent::SelectionChanged(target));
        Ok(target)
    }

    /// Select `key` and pan the viewport onto whatever got selected.
    pub fn navigate<S>(
        &mut self,
        key: NodeKey,
        now_ms: f64,
        view: ViewState,
        sink: &mut S,
    ) -> GraphResult<NodeKey>
    where
        S: RenderSink + ?Sized,
    {
        let target = self.select(key, now_ms, sink)?;
        self.center_on(target, view, sink)?;
        Ok(target)
    }

    /// Pan the viewport so `key` ends up in the middle.
    pub fn center_on<S>(&mut self, key: NodeKey, view: ViewState, sink: &mut S) -> GraphResult<()>
    where
        S: RenderSink + ?Sized,
    {
        self.viewport.center_on(&self.registry, key, view, sink)?;
        self.centering = Some(key);
        Ok(())
    }

    /// Called by the host once its pan animation has finished.
    pub fn viewport_settled(&mut self) {
        if let Some(key) = self.centering.take()
            && self.registry.contains(key)
        {
            self.events.push(GraphEvent::Centered(key));
        }
    }

    /// Show the children of `key` now, fetching them first if needed.
    pub fn children_of<S>(&mut self, key: NodeKey, sink: &mut S) -> GraphResult<()>
    where
        S: RenderSink + ?Sized,
    {
        self.expand(key, sink)
    }

    /// Tear down everything below `key`.
    ///
    /// If the selected node was part of the removed subtree, `key` takes
    /// over the selection.
    pub fn remove_children<S>(&mut self, key: NodeKey, sink: &mut S) -> GraphResult<()>
    where
        S: RenderSink + ?Sized,
    {
        if self.pending.is_some_and(|pending| pending.node == key) {
            self.pending = None;
        }
        self.collapse(key, sink)?;

        if self
            .selected
            .is_some_and(|selected| !self.registry.contains(selected))
        {
            self.trail = self.registry.path_from_root(key);
            self.registry.node_mut(key)?.visual_state = VisualState::Selected;
            self.selected = Some(key);
            self.events.push(GraphEvent::SelectionChanged(key));
        }
        Ok(())
    }

    fn dispatch(&mut self, target: FetchTarget, node_id: &str) -> FetchTicket {
        self.next_ticket += 1;
        let ticket = FetchTicket(self.next_ticket);
        self.in_flight.insert(ticket, target);
        debug!(?ticket, node_id, "requesting children");
        self.gateway.request(ticket, node_id);
        ticket
    }

    fn cancel_fetch(&mut self, ticket: FetchTicket) {
        if self.in_flight.remove(&ticket).is_some() {
            debug!(?ticket, "cancelling fetch");
            self.gateway.cancel(ticket);
        }
    }

    fn apply_reply<S>(&mut self, reply: FetchReply, view: ViewState, sink: &mut S) -> GraphResult<()>
    where
        S: RenderSink + ?Sized,
    {
        let FetchReply {
            ticket,
            node_id,
            result,
        } = reply;
        let Some(target) = self.in_flight.remove(&ticket) else {
            debug!(?ticket, node_id = %node_id, "dropping reply for a cancelled fetch");
            return Ok(());
        };

        let key = match target {
            FetchTarget::Root => {
                return match result {
                    Ok(descriptor) => self.init_root(&node_id, descriptor, view, sink),
                    Err(error) => {
                        self.report_failure(node_id, error);
                        Ok(())
                    }
                };
            }
            FetchTarget::Node(key) => key,
        };

        let awaited = self.registry.get(key).is_some_and(
            |node| matches!(node.cache, ChildCache::Pending(current) if current == ticket),
        );
        if !awaited {
            debug!(?ticket, node_id = %node_id, "dropping reply for a node that moved on");
            return Ok(());
        }

        match result {
            Ok(descriptor) => {
                let children =
                    self.registry
                        .resolve(key, descriptor.children, self.config.eviction)?;
                debug!(node = %key, node_id = %node_id, count = children.len(), "children fetched");
                self.lay_out(key, &children, sink)
            }
            Err(error) => {
                self.registry.node_mut(key)?.cache = ChildCache::Unfetched;
                self.report_failure(node_id, error);
                Ok(())
            }
        }
    }

    fn init_root<S>(
        &mut self,
        node_id: &str,
        descriptor: NodeDescriptor,
        view: ViewState,
        sink: &mut S,
    ) -> GraphResult<()>
    where
        S: RenderSink + ?Sized,
    {
        let label = node_label(&self.config, descriptor.kind.as_deref(), &descriptor.display);
        let half_extent = sink.measure(&label);
        let line_colour = descriptor
            .line_colour
            .clone()
            .unwrap_or_else(|| self.config.line_colour.clone());
        let (root, previous) = self.registry.create_root(
            NodeSeed {
                id: node_id,
                kind: descriptor.kind.as_deref(),
                display: &descriptor.display,
                label,
                line_colour,
                half_extent,
            },
            &descriptor,
            self.config.eviction,
        );
        self.release(previous, sink);

        self.registry.node_mut(root)?.visual_state = VisualState::Selected;
        self.selected = Some(root);
        self.trail = vec![root];
        self.pending = None;

        sink.animate_position(root, Vec2::ZERO, 0.0, Some(1.0));
        let center = self.registry.absolute_position(root).unwrap_or_default();
        let request = self.viewport.pan_to(center, view);
        sink.pan_viewport_to(request.target, 0.0);

        info!(node = %root, id = node_id, "start node ready");
        self.events.push(GraphEvent::SelectionChanged(root));
        self.expand(root, sink)
    }

    fn expand<S>(&mut self, key: NodeKey, sink: &mut S) -> GraphResult<()>
    where
        S: RenderSink + ?Sized,
    {
        let node = self.registry.node(key)?;
        match node.cache.clone() {
            ChildCache::Resolved(children) => self.lay_out(key, &children, sink),
            ChildCache::Pending(ticket) => {
                debug!(node = %key, ?ticket, "children already on the way");
                Ok(())
            }
            ChildCache::Unfetched => {
                let id = node.id.clone();
                let ticket = self.dispatch(FetchTarget::Node(key), &id);
                self.registry.node_mut(key)?.cache = ChildCache::Pending(ticket);
                Ok(())
            }
        }
    }

    fn lay_out<S>(
        &mut self,
        key: NodeKey,
        children: &Arc<[ChildDescriptor]>,
        sink: &mut S,
    ) -> GraphResult<()>
    where
        S: RenderSink + ?Sized,
    {
        let added = layout_children(
            &mut self.registry,
            &self.config,
            &mut self.rng,
            sink,
            key,
            children,
        )?;
        if !added.is_empty() {
            self.events.push(GraphEvent::ChildrenLaidOut {
                parent: key,
                added: added.len(),
            });
        }
        Ok(())
    }

    fn collapse<S>(&mut self, key: NodeKey, sink: &mut S) -> GraphResult<()>
    where
        S: RenderSink + ?Sized,
    {
        let node = self.registry.node_mut(key)?;
        if let ChildCache::Pending(ticket) = node.cache {
            node.cache = ChildCache::Unfetched;
            self.cancel_fetch(ticket);
        }

        let removed = self.registry.destroy_subtree(key, self.config.eviction);
        if !removed.is_empty() {
            debug!(node = %key, removed = removed.len(), "collapsed subtree");
        }
        self.release(removed, sink);
        Ok(())
    }

    /// Remove the children of trail ancestors that are not on the trail.
    fn prune_off_trail<S>(&mut self, sink: &mut S) -> GraphResult<()>
    where
        S: RenderSink + ?Sized,
    {
        let ancestors = self.trail[..self.trail.len().saturating_sub(1)].to_vec();
        for ancestor in ancestors {
            let off_trail = self
                .registry
                .node(ancestor)?
                .children()
                .iter()
                .copied()
                .filter(|child| !self.trail.contains(child))
                .collect::<Vec<_>>();
            for child in off_trail {
                let removed = self.registry.remove(child);
                self.release(removed, sink);
            }
        }
        Ok(())
    }

    fn release<S>(&mut self, removed: Vec<(NodeKey, Node)>, sink: &mut S)
    where
        S: RenderSink + ?Sized,
    {
        for (key, node) in removed {
            if let Some(handle) = node.connector {
                sink.remove_connector(handle);
            }
            sink.remove_element(key);
            if let ChildCache::Pending(ticket) = node.cache {
                self.cancel_fetch(ticket);
            }
            if self.pending.is_some_and(|pending| pending.node == key) {
                self.pending = None;
            }
            if self.centering == Some(key) {
                self.centering = None;
            }
        }
    }

    fn report_failure(&mut self, node_id: String, error: FetchError) {
        warn!(node_id = %node_id, error = %error, "children fetch failed");
        self.events.push(GraphEvent::FetchFailed { node_id, error });
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::graph::testing::{RecordingSink, RenderCall, ScriptedGateway};

    fn config() -> GraphConfig {
        GraphConfig {
            start_angle: Some(0.0),
            seed: Some(7),
            ..GraphConfig::default()
        }
    }

    fn fixture() -> ScriptedGateway {
        ScriptedGateway::default()
            .with_node("root", &["a", "b", "c"])
            .with_node("a", &["x", "y"])
            .with_node("b", &["p"])
            .with_node("c", &[])
            .with_node("p", &[])
            .with_node("x", &["deep"])
            .with_node("y", &[])
            .with_node("deep", &[])
    }

    struct Harness {
        nav: Navigator<ScriptedGateway>,
        sink: RecordingSink,
        now: f64,
    }

    impl Harness {
        fn new(config: GraphConfig, gateway: ScriptedGateway) -> Self {
            let mut harness = Self {
                nav: Navigator::new(config, gateway).unwrap(),
                sink: RecordingSink::default(),
                now: 0.0,
            };
            harness.nav.start(&mut harness.sink);
            harness.settle();
            harness
        }

        /// Let every outstanding fetch complete.
        fn settle(&mut self) {
            for _ in 0..4 {
                self.nav.gateway_mut().release_all();
                self.poll();
            }
        }

        fn poll(&mut self) {
            self.nav
                .poll(self.now, ViewState::default(), &mut self.sink)
                .unwrap();
        }

        fn advance(&mut self, ms: f64) {
            self.now += ms;
            self.poll();
        }

        /// Wait out the expansion delay and deliver the fetch it starts.
        fn expand_selected(&mut self) {
            let delay = self.nav.config().move_time;
            self.advance(delay);
            self.settle();
        }

        fn select(&mut self, key: NodeKey) -> NodeKey {
            self.nav.select(key, self.now, &mut self.sink).unwrap()
        }

        fn find(&self, id: &str) -> Option<NodeKey> {
            self.nav
                .registry()
                .iter()
                .find(|(_, node)| node.id == id)
                .map(|(key, _)| key)
        }

        fn key(&self, id: &str) -> NodeKey {
            self.find(id)
                .unwrap_or_else(|| panic!("node {id} is not live"))
        }

        fn node(&self, key: NodeKey) -> &Node {
            self.nav.registry().node(key).unwrap()
        }

        fn state(&self, key: NodeKey) -> VisualState {
            self.node(key).visual_state
        }

        fn assert_trail(&self) {
            let selected = self.nav.selected().unwrap();
            let path = self.nav.registry().path_from_root(selected);
            assert_eq!(self.nav.trail(), path.as_slice());

            let mut selected_count = 0;
            for (key, node) in self.nav.registry().iter() {
                assert_eq!(
                    node.visual_state.is_on_trail(),
                    path.contains(&key),
                    "trail membership of {}",
                    node.id
                );
                if node.visual_state == VisualState::Selected {
                    selected_count += 1;
                    assert_eq!(key, selected);
                }
            }
            assert_eq!(selected_count, 1);
        }
    }

    #[test]
    fn start_selects_and_centers_the_root() {
        let mut h = Harness::new(config(), fixture());
        let root = h.nav.registry().root().unwrap();

        assert_eq!(h.nav.selected(), Some(root));
        assert_eq!(h.nav.start_node().unwrap().id, "root");
        assert_eq!(h.nav.registry().len(), 4);
        assert_eq!(h.sink.pans(), vec![(Vec2::ZERO, 0.0)]);
        assert!(h.sink.calls.contains(&RenderCall::Animate {
            node: root,
            target: Vec2::ZERO,
            duration_ms: 0.0,
            opacity: Some(1.0),
        }));
        assert_eq!(h.nav.gateway().requests_for("root"), 1);
        assert!(!h.nav.has_pending_work());

        let events = h.nav.drain_events();
        assert!(matches!(events[0], GraphEvent::SelectionChanged(key) if key == root));
        assert!(matches!(
            events[1],
            GraphEvent::ChildrenLaidOut { parent, added: 3 } if parent == root
        ));
        h.assert_trail();
    }

    #[test]
    fn selecting_a_child_prunes_its_siblings_and_reselecting_the_root_collapses_it() {
        let mut h = Harness::new(
            GraphConfig {
                return_to_parent: false,
                ..config()
            },
            fixture(),
        );
        let (root, a, b, c) = (h.key("root"), h.key("a"), h.key("b"), h.key("c"));

        h.select(a);
        assert_eq!(h.state(a), VisualState::Selected);
        assert_eq!(h.state(root), VisualState::Trailing);
        assert!(!h.nav.registry().contains(b));
        assert!(!h.nav.registry().contains(c));
        assert!(h.sink.removed_elements().is_superset(&HashSet::from([b, c])));
        assert_eq!(h.node(a).distance_from_parent, 440.0);

        h.expand_selected();
        let x = h.key("x");
        assert_eq!(h.node(x).parent(), Some(a));

        h.select(root);
        assert_eq!(h.state(root), VisualState::Selected);
        assert_eq!(h.state(a), VisualState::Idle);
        assert!(!h.nav.registry().contains(x));
        assert!(h.node(a).children().is_empty());
        assert_eq!(h.node(a).distance_from_parent, 220.0);
        h.assert_trail();
    }

    #[test]
    fn exactly_one_selected_node_and_trail_matches_path() {
        let mut h = Harness::new(config(), fixture());

        let a = h.key("a");
        h.select(a);
        h.assert_trail();
        h.expand_selected();

        let x = h.key("x");
        h.select(x);
        h.assert_trail();
        h.expand_selected();

        let deep = h.key("deep");
        h.select(deep);
        h.assert_trail();

        h.select(a);
        h.assert_trail();
        assert!(h.find("deep").is_none());

        let root = h.key("root");
        h.select(root);
        h.assert_trail();
        h.expand_selected();
        assert!(h.find("b").is_some());

        let b = h.key("b");
        h.select(b);
        h.assert_trail();
        assert!(h.find("a").is_none());
    }

    #[test]
    fn reselecting_the_selected_node_returns_to_its_parent() {
        let mut h = Harness::new(config(), fixture());
        let (root, a) = (h.key("root"), h.key("a"));

        h.select(a);
        let selected = h.select(a);

        assert_eq!(selected, root);
        assert_eq!(h.nav.selected(), Some(root));
        assert_eq!(h.state(a), VisualState::Idle);
        assert_eq!(h.node(a).distance_from_parent, 220.0);

        // the root has nowhere to return to
        assert_eq!(h.select(root), root);
        h.assert_trail();
    }

    #[test]
    fn return_to_parent_can_be_disabled() {
        let mut h = Harness::new(
            GraphConfig {
                return_to_parent: false,
                ..config()
            },
            fixture(),
        );
        let a = h.key("a");

        h.select(a);
        assert_eq!(h.select(a), a);
        assert_eq!(h.state(a), VisualState::Selected);
    }

    #[test]
    fn a_new_selection_cancels_the_pending_expansion() {
        let mut h = Harness::new(
            GraphConfig {
                prune_off_trail: false,
                ..config()
            },
            fixture(),
        );
        let (a, b) = (h.key("a"), h.key("b"));

        h.select(a);
        h.advance(500.0);
        h.select(b);
        h.advance(600.0);
        assert_eq!(h.nav.gateway().requests_for("a"), 0);
        assert_eq!(h.nav.gateway().requests_for("b"), 0);

        h.advance(400.0);
        assert_eq!(h.nav.gateway().requests_for("b"), 1);
        h.settle();
        assert_eq!(h.nav.gateway().requests_for("a"), 0);
        assert!(h.node(a).children().is_empty());
        assert_eq!(h.node(b).children().len(), 1);
    }

    #[test]
    fn late_reply_for_a_node_that_left_the_trail_is_dropped() {
        let mut h = Harness::new(
            GraphConfig {
                prune_off_trail: false,
                ..config()
            },
            fixture(),
        );
        let (a, b) = (h.key("a"), h.key("b"));

        h.select(a);
        h.advance(1000.0);
        let ChildCache::Pending(ticket) = h.node(a).cache else {
            panic!("expected a fetch in flight for a");
        };

        h.select(b);
        assert!(h.nav.gateway().cancelled.contains(&ticket));
        assert!(matches!(h.node(a).cache, ChildCache::Unfetched));

        h.settle();
        assert!(h.node(a).children().is_empty());
        assert!(h.find("x").is_none());
        assert!(!h.nav.drain_events().iter().any(|event| matches!(
            event,
            GraphEvent::ChildrenLaidOut { parent, .. } if *parent == a
        )));
    }

    #[test]
    fn reply_for_a_removed_node_is_dropped() {
        let mut h = Harness::new(config(), fixture());
        let (root, a) = (h.key("root"), h.key("a"));

        h.select(a);
        h.advance(1000.0);
        assert!(h.nav.has_pending_work());

        h.nav.remove_children(root, &mut h.sink).unwrap();
        assert!(!h.nav.registry().contains(a));
        assert_eq!(h.nav.selected(), Some(root));
        assert_eq!(h.state(root), VisualState::Selected);

        h.settle();
        assert_eq!(h.nav.registry().len(), 1);
        assert!(!h.nav.has_pending_work());
        h.assert_trail();
    }

    #[test]
    fn failed_fetch_leaves_children_unfetched_until_the_next_select() {
        let mut h = Harness::new(
            GraphConfig {
                return_to_parent: false,
                ..config()
            },
            fixture().with_failure("b", "boom"),
        );
        let b = h.key("b");

        h.select(b);
        h.expand_selected();

        let events = h.nav.drain_events();
        assert!(events.iter().any(|event| matches!(
            event,
            GraphEvent::FetchFailed { node_id, error: FetchError::Rejected(message) }
                if node_id == "b" && message == "boom"
        )));
        assert!(matches!(h.node(b).cache, ChildCache::Unfetched));
        assert!(h.node(b).children().is_empty());

        h.select(b);
        h.expand_selected();
        assert_eq!(h.nav.gateway().requests_for("b"), 2);
    }

    #[test]
    fn root_failure_is_reported_and_start_retries() {
        let mut h = Harness::new(config(), ScriptedGateway::default());

        assert!(h.nav.registry().is_empty());
        assert!(!h.nav.has_pending_work());
        assert!(h.nav.drain_events().iter().any(|event| matches!(
            event,
            GraphEvent::FetchFailed { node_id, .. } if node_id == "root"
        )));

        h.nav.start(&mut h.sink);
        assert!(h.nav.has_pending_work());
        assert_eq!(h.nav.gateway().requests_for("root"), 2);
    }

    fn fetches_of_a_after_reexpanding(eviction: EvictionPolicy) -> usize {
        let mut h = Harness::new(
            GraphConfig {
                eviction,
                ..config()
            },
            fixture(),
        );
        let a = h.key("a");
        h.select(a);
        h.expand_selected();
        assert!(h.find("x").is_some());

        let root = h.key("root");
        h.select(root);
        h.expand_selected();
        assert!(h.find("x").is_none());

        h.select(a);
        h.expand_selected();
        assert!(h.find("x").is_some());
        h.nav.gateway().requests_for("a")
    }

    #[test]
    fn retained_children_skip_the_gateway() {
        assert_eq!(fetches_of_a_after_reexpanding(EvictionPolicy::Retain), 1);
    }

    #[test]
    fn discarded_children_are_fetched_again() {
        assert_eq!(fetches_of_a_after_reexpanding(EvictionPolicy::Discard), 2);
    }

    #[test]
    fn switching_to_discard_forgets_kept_children() {
        let mut h = Harness::new(config(), fixture());
        let a = h.key("a");
        h.select(a);
        h.expand_selected();
        assert!(h.nav.registry().retained("a").is_some());

        h.nav.set_eviction(EvictionPolicy::Discard);
        assert!(h.nav.registry().retained("a").is_none());

        let root = h.key("root");
        h.select(root);
        h.expand_selected();
        let b = h.key("b");
        h.select(b);
        assert!(h.find("a").is_none());
        h.select(root);
        h.expand_selected();

        let a = h.key("a");
        assert!(matches!(h.node(a).cache, ChildCache::Unfetched));
        h.select(a);
        h.expand_selected();
        assert!(h.find("x").is_some());
        assert_eq!(h.nav.gateway().requests_for("a"), 2);
    }

    #[test]
    fn empty_child_lists_are_not_announced() {
        let mut h = Harness::new(config(), fixture());
        let c = h.key("c");
        h.nav.drain_events();

        h.select(c);
        h.expand_selected();

        let events = h.nav.drain_events();
        assert!(matches!(h.node(c).cache, ChildCache::Resolved(_)));
        assert!(
            !events
                .iter()
                .any(|event| matches!(event, GraphEvent::ChildrenLaidOut { .. }))
        );
    }

    #[test]
    fn siblings_stay_when_pruning_is_off() {
        let mut h = Harness::new(
            GraphConfig {
                prune_off_trail: false,
                ..config()
            },
            fixture(),
        );
        let (a, b, c) = (h.key("a"), h.key("b"), h.key("c"));

        h.select(a);
        assert_eq!(h.state(b), VisualState::Idle);
        assert_eq!(h.state(c), VisualState::Idle);
        h.assert_trail();
    }

    #[test]
    fn trail_connectors_use_the_selected_width() {
        let mut h = Harness::new(config(), fixture());
        let (root, a) = (h.key("root"), h.key("a"));
        let handle = h.node(a).connector.unwrap();

        h.select(a);
        assert_eq!(h.sink.connectors[&handle].width, 3.0);

        h.select(root);
        assert_eq!(h.sink.connectors[&handle].width, 6.0);
    }

    #[test]
    fn expansion_can_be_turned_off() {
        let mut h = Harness::new(
            GraphConfig {
                show_children: false,
                ..config()
            },
            fixture(),
        );
        let a = h.key("a");

        h.select(a);
        assert!(!h.nav.has_pending_work());
        h.advance(5000.0);
        h.settle();
        assert_eq!(h.nav.gateway().requests_for("a"), 0);

        h.nav.children_of(a, &mut h.sink).unwrap();
        h.settle();
        assert_eq!(h.node(a).children().len(), 2);
    }

    #[test]
    fn laying_out_the_same_children_twice_adds_nothing() {
        let mut h = Harness::new(config(), fixture());
        let root = h.key("root");

        h.nav.children_of(root, &mut h.sink).unwrap();
        h.nav.children_of(root, &mut h.sink).unwrap();

        assert_eq!(h.nav.registry().len(), 4);
        assert_eq!(h.sink.connectors.len(), 3);
    }

    #[test]
    fn navigate_pans_to_the_selected_node() {
        let mut h = Harness::new(config(), fixture());
        let a = h.key("a");
        let view = ViewState {
            pan: Vec2::ZERO,
            zoom: 2.0,
        };

        let target = h.nav.navigate(a, h.now, view, &mut h.sink).unwrap();
        assert_eq!(target, a);

        let position = h.nav.registry().absolute_position(a).unwrap();
        let (pan, duration) = *h.sink.pans().last().unwrap();
        assert_eq!(pan, -(position * 2.0));
        assert!(duration > 0.0);

        h.nav.viewport_settled();
        assert!(h
            .nav
            .drain_events()
            .iter()
            .any(|event| matches!(event, GraphEvent::Centered(key) if *key == a)));
    }

    #[test]
    fn teardown_releases_every_render_handle() {
        let mut h = Harness::new(config(), fixture());
        let a = h.key("a");
        h.select(a);
        h.expand_selected();

        h.nav.teardown(&mut h.sink);

        assert!(h.nav.registry().is_empty());
        assert!(h.nav.current_node().is_none());
        assert!(h.sink.connectors.is_empty());
        assert!(h.sink.positions.is_empty());
    }

    #[test]
    fn stale_keys_are_rejected() {
        let mut h = Harness::new(config(), fixture());
        let (a, b) = (h.key("a"), h.key("b"));
        h.select(a);

        let result = h.nav.select(b, h.now, &mut h.sink);
        assert!(result.is_err());
        assert_eq!(h.nav.selected(), Some(a));
    }

    #[test]
    fn start_angle_can_be_changed_at_runtime() {
        let mut h = Harness::new(config(), fixture());
        h.nav.set_start_angle(Some(90.0));
        assert_eq!(h.nav.config().start_angle, Some(90.0));
    }
}
