//! Client-local canvas state and the rendering seam.

use std::collections::HashMap;

use sketchwire_core::{OpenStroke, PathKey, Point, Stroke};
use tracing::debug;

/// Drawing surface driven by the canvas. Calls are incremental: a path is
/// opened at one point and then extended one segment at a time.
pub trait Renderer: Send {
    /// Start a new path at `at`.
    fn begin_path(&mut self, at: Point);

    /// Draw one segment. `from` is the previous point of the same path.
    fn line_to(&mut self, from: Point, to: Point);

    /// Wipe the surface.
    fn clear(&mut self);
}

/// One recorded renderer call.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOp {
    BeginPath(Point),
    LineTo(Point, Point),
    Clear,
}

/// Renderer that remembers every call. Useful for headless clients and tests.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    pub ops: Vec<RenderOp>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Segments drawn since the last clear.
    pub fn segments_since_clear(&self) -> usize {
        self.ops
            .iter()
            .rev()
            .take_while(|op| **op != RenderOp::Clear)
            .filter(|op| matches!(op, RenderOp::LineTo(..)))
            .count()
    }
}

impl Renderer for RecordingRenderer {
    fn begin_path(&mut self, at: Point) {
        self.ops.push(RenderOp::BeginPath(at));
    }

    fn line_to(&mut self, from: Point, to: Point) {
        self.ops.push(RenderOp::LineTo(from, to));
    }

    fn clear(&mut self) {
        self.ops.push(RenderOp::Clear);
    }
}

/// Renderer that only logs, for clients without a surface.
#[derive(Debug, Default)]
pub struct TracingRenderer;

impl Renderer for TracingRenderer {
    fn begin_path(&mut self, at: Point) {
        debug!(x = at.x, y = at.y, "begin path");
    }

    fn line_to(&mut self, from: Point, to: Point) {
        tracing::trace!(
            from_x = from.x,
            from_y = from.y,
            to_x = to.x,
            to_y = to.y,
            "line to"
        );
    }

    fn clear(&mut self) {
        debug!("canvas cleared");
    }
}

/// A remote path still being drawn, tagged with when it was opened.
#[derive(Debug)]
struct RemotePath {
    opened: u64,
    stroke: OpenStroke,
}

/// Completed strokes, the local stroke being drawn, and the in-progress
/// paths of remote authors.
#[derive(Debug, Default)]
pub struct CanvasState {
    completed: Vec<Stroke>,
    local: Option<OpenStroke>,
    remote: HashMap<PathKey, RemotePath>,
    next_opened: u64,
}

impl CanvasState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completed(&self) -> &[Stroke] {
        &self.completed
    }

    pub fn local(&self) -> Option<&OpenStroke> {
        self.local.as_ref()
    }

    pub fn is_drawing(&self) -> bool {
        self.local.is_some()
    }

    /// Number of remote paths still open.
    pub fn remote_open(&self) -> usize {
        self.remote.len()
    }

    pub fn remote_path(&self, key: &PathKey) -> Option<&OpenStroke> {
        self.remote.get(key).map(|path| &path.stroke)
    }

    /// Everything visible that a peer has finished or is still drawing:
    /// completed strokes, then open remote paths in the order they were
    /// opened. Legacy peers never send `stroke-end`, so their last stroke is
    /// only ever open. The local stroke in progress is not included.
    pub fn snapshot(&self) -> Vec<Stroke> {
        let mut open: Vec<&RemotePath> = self.remote.values().collect();
        open.sort_by_key(|path| path.opened);
        self.completed
            .iter()
            .cloned()
            .chain(open.into_iter().map(|path| path.stroke.clone().finish()))
            .collect()
    }

    /// Points in completed strokes plus the local open stroke.
    pub fn point_count(&self) -> usize {
        sketchwire_core::stroke::point_count(&self.completed)
            + self.local.as_ref().map_or(0, OpenStroke::len)
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_empty() && self.local.is_none() && self.remote.is_empty()
    }

    // --- local authoring ---

    /// Open the local stroke. An already open local stroke is replaced.
    pub fn begin_local<R: Renderer + ?Sized>(&mut self, at: Point, renderer: &mut R) {
        self.local = Some(OpenStroke::begin(at));
        renderer.begin_path(at);
    }

    /// Extend the local stroke. Returns `false` when nothing is being drawn.
    pub fn extend_local<R: Renderer + ?Sized>(
        &mut self,
        to: Point,
        renderer: &mut R,
    ) -> bool {
        let Some(open) = self.local.as_mut() else {
            return false;
        };
        let from = open.last();
        open.push(to);
        renderer.line_to(from, to);
        true
    }

    /// Move the local stroke into the completed sequence.
    pub fn finish_local(&mut self) -> bool {
        match self.local.take() {
            Some(open) => {
                self.completed.push(open.finish());
                true
            }
            None => false,
        }
    }

    /// Drop the local stroke without committing it.
    pub fn abandon_local(&mut self) -> bool {
        self.local.take().is_some()
    }

    // --- remote application ---

    /// A remote `stroke-start`: always a new path. A path still open under the
    /// same key is committed first, and so is any other open path of the same
    /// author, since an author draws one stroke at a time.
    pub fn remote_start<R: Renderer + ?Sized>(
        &mut self,
        key: PathKey,
        at: Point,
        renderer: &mut R,
    ) {
        if let Some(author) = key.author() {
            let stale: Vec<PathKey> = self
                .remote
                .keys()
                .filter(|other| **other != key && other.author() == Some(author))
                .cloned()
                .collect();
            for other in stale {
                debug!(?other, "committing unfinished path of returning author");
                self.remote_end(&other);
            }
        }
        self.remote_end(&key);
        self.open_remote(key, at);
        renderer.begin_path(at);
    }

    fn open_remote(&mut self, key: PathKey, at: Point) {
        let opened = self.next_opened;
        self.next_opened += 1;
        self.remote.insert(
            key,
            RemotePath {
                opened,
                stroke: OpenStroke::begin(at),
            },
        );
    }

    /// A remote `stroke-point`. A point for a path never seen opens one there,
    /// as happens when joining mid-stroke.
    pub fn remote_point<R: Renderer + ?Sized>(
        &mut self,
        key: PathKey,
        to: Point,
        renderer: &mut R,
    ) {
        match self.remote.get_mut(&key) {
            Some(path) => {
                let from = path.stroke.last();
                path.stroke.push(to);
                renderer.line_to(from, to);
            }
            None => {
                debug!(?key, "point for unknown path; opening one");
                self.open_remote(key, to);
                renderer.begin_path(to);
            }
        }
    }

    /// A remote `stroke-end`: commit the path if it is open.
    pub fn remote_end(&mut self, key: &PathKey) -> bool {
        match self.remote.remove(key) {
            Some(path) => {
                self.completed.push(path.stroke.finish());
                true
            }
            None => false,
        }
    }

    // --- whole-canvas operations ---

    /// Erase everything, including strokes still being drawn.
    pub fn clear<R: Renderer + ?Sized>(&mut self, renderer: &mut R) {
        self.completed.clear();
        self.local = None;
        self.remote.clear();
        renderer.clear();
    }

    /// Replace the whole state with `strokes` and redraw them in order.
    pub fn load<R: Renderer + ?Sized>(&mut self, strokes: Vec<Stroke>, renderer: &mut R) {
        self.local = None;
        self.remote.clear();
        renderer.clear();
        for stroke in &strokes {
            draw_stroke(stroke, renderer);
        }
        self.completed = strokes;
    }
}

fn draw_stroke<R: Renderer + ?Sized>(stroke: &Stroke, renderer: &mut R) {
    let points = stroke.points();
    let Some(first) = points.first() else {
        return;
    };
    renderer.begin_path(*first);
    for pair in points.windows(2) {
        renderer.line_to(pair[0], pair[1]);
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    fn stroke_key(author: &str) -> PathKey {
        PathKey::Stroke {
            author: Some(author.into()),
            stroke_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_local_stroke_lifecycle() {
        let mut canvas = CanvasState::new();
        let mut r = RecordingRenderer::new();

        canvas.begin_local(p(10.0, 10.0), &mut r);
        assert!(canvas.extend_local(p(20.0, 20.0), &mut r));
        assert!(canvas.extend_local(p(30.0, 30.0), &mut r));
        assert_eq!(canvas.point_count(), 3);
        assert!(canvas.finish_local());

        assert_eq!(canvas.completed().len(), 1);
        assert_eq!(
            canvas.completed()[0].points(),
            &[p(10.0, 10.0), p(20.0, 20.0), p(30.0, 30.0)]
        );
        assert_eq!(
            r.ops,
            vec![
                RenderOp::BeginPath(p(10.0, 10.0)),
                RenderOp::LineTo(p(10.0, 10.0), p(20.0, 20.0)),
                RenderOp::LineTo(p(20.0, 20.0), p(30.0, 30.0)),
            ]
        );
    }

    #[test]
    fn test_extend_without_open_stroke_is_noop() {
        let mut canvas = CanvasState::new();
        let mut r = RecordingRenderer::new();
        assert!(!canvas.extend_local(p(1.0, 1.0), &mut r));
        assert!(!canvas.finish_local());
        assert!(canvas.is_empty());
        assert!(r.ops.is_empty());
    }

    #[test]
    fn test_clear_aborts_everything() {
        let mut canvas = CanvasState::new();
        let mut r = RecordingRenderer::new();
        canvas.begin_local(p(0.0, 0.0), &mut r);
        canvas.finish_local();
        canvas.begin_local(p(5.0, 5.0), &mut r);
        canvas.remote_start(PathKey::Legacy, p(9.0, 9.0), &mut r);

        canvas.clear(&mut r);
        assert!(canvas.is_empty());
        assert_eq!(canvas.point_count(), 0);
        assert!(!canvas.extend_local(p(6.0, 6.0), &mut r));
        assert_eq!(r.ops.last(), Some(&RenderOp::Clear));
    }

    #[test]
    fn test_interleaved_remote_strokes_do_not_splice() {
        let mut canvas = CanvasState::new();
        let mut r = RecordingRenderer::new();
        let a = stroke_key("alice");
        let b = stroke_key("bob");

        canvas.remote_start(a.clone(), p(0.0, 0.0), &mut r);
        canvas.remote_start(b.clone(), p(100.0, 100.0), &mut r);
        canvas.remote_point(a.clone(), p(1.0, 1.0), &mut r);
        canvas.remote_point(b.clone(), p(101.0, 101.0), &mut r);
        canvas.remote_point(a.clone(), p(2.0, 2.0), &mut r);

        assert_eq!(
            canvas.remote_path(&a).unwrap().points(),
            &[p(0.0, 0.0), p(1.0, 1.0), p(2.0, 2.0)]
        );
        assert_eq!(
            canvas.remote_path(&b).unwrap().points(),
            &[p(100.0, 100.0), p(101.0, 101.0)]
        );
        assert!(r.ops.contains(&RenderOp::LineTo(p(1.0, 1.0), p(2.0, 2.0))));

        assert!(canvas.remote_end(&a));
        assert_eq!(canvas.completed().len(), 1);
        assert_eq!(canvas.remote_open(), 1);
    }

    #[test]
    fn test_legacy_points_follow_latest_start() {
        let mut canvas = CanvasState::new();
        let mut r = RecordingRenderer::new();

        canvas.remote_start(PathKey::Legacy, p(0.0, 0.0), &mut r);
        canvas.remote_point(PathKey::Legacy, p(1.0, 1.0), &mut r);
        canvas.remote_start(PathKey::Legacy, p(50.0, 50.0), &mut r);
        canvas.remote_point(PathKey::Legacy, p(51.0, 51.0), &mut r);

        // The first legacy path was committed when the second one started.
        assert_eq!(canvas.completed().len(), 1);
        assert_eq!(canvas.completed()[0].len(), 2);
        assert_eq!(
            canvas.remote_path(&PathKey::Legacy).unwrap().points(),
            &[p(50.0, 50.0), p(51.0, 51.0)]
        );
    }

    #[test]
    fn test_snapshot_includes_open_remote_paths() {
        let mut canvas = CanvasState::new();
        let mut r = RecordingRenderer::new();

        canvas.remote_start(PathKey::Legacy, p(10.0, 10.0), &mut r);
        canvas.remote_point(PathKey::Legacy, p(20.0, 20.0), &mut r);
        canvas.remote_point(PathKey::Legacy, p(30.0, 30.0), &mut r);
        canvas.remote_start(PathKey::Author("dave".into()), p(5.0, 5.0), &mut r);
        canvas.begin_local(p(0.0, 0.0), &mut r);
        canvas.extend_local(p(1.0, 1.0), &mut r);
        canvas.finish_local();
        canvas.begin_local(p(9.0, 9.0), &mut r);

        let snapshot = canvas.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[0].points(), &[p(0.0, 0.0), p(1.0, 1.0)]);
        assert_eq!(
            snapshot[1].points(),
            &[p(10.0, 10.0), p(20.0, 20.0), p(30.0, 30.0)]
        );
        assert_eq!(snapshot[2].points(), &[p(5.0, 5.0)]);
        // Taking a snapshot leaves the paths open.
        assert_eq!(canvas.remote_open(), 2);
        assert_eq!(canvas.completed().len(), 1);
    }

    #[test]
    fn test_new_stroke_commits_authors_unfinished_path() {
        let mut canvas = CanvasState::new();
        let mut r = RecordingRenderer::new();
        let first = stroke_key("erin");
        let second = stroke_key("erin");
        let other = stroke_key("frank");

        canvas.remote_start(first.clone(), p(0.0, 0.0), &mut r);
        canvas.remote_point(first.clone(), p(1.0, 1.0), &mut r);
        canvas.remote_start(other.clone(), p(50.0, 50.0), &mut r);
        // erin dropped mid-stroke and came back with a new stroke.
        canvas.remote_start(second.clone(), p(8.0, 8.0), &mut r);

        assert_eq!(canvas.remote_open(), 2);
        assert!(canvas.remote_path(&first).is_none());
        assert!(canvas.remote_path(&other).is_some());
        assert_eq!(canvas.completed().len(), 1);
        assert_eq!(canvas.completed()[0].points(), &[p(0.0, 0.0), p(1.0, 1.0)]);
    }

    #[test]
    fn test_point_for_unknown_path_opens_it() {
        let mut canvas = CanvasState::new();
        let mut r = RecordingRenderer::new();
        let key = stroke_key("carol");

        canvas.remote_point(key.clone(), p(3.0, 4.0), &mut r);
        assert_eq!(canvas.remote_path(&key).unwrap().len(), 1);
        assert_eq!(r.ops, vec![RenderOp::BeginPath(p(3.0, 4.0))]);
    }

    #[test]
    fn test_load_replaces_and_redraws() {
        let mut canvas = CanvasState::new();
        let mut r = RecordingRenderer::new();
        canvas.begin_local(p(0.0, 0.0), &mut r);
        canvas.finish_local();

        let loaded = vec![
            Stroke::from_points(vec![p(1.0, 1.0), p(2.0, 2.0), p(3.0, 3.0)]),
            Stroke::from_points(vec![p(7.0, 7.0)]),
        ];
        canvas.load(loaded.clone(), &mut r);

        assert_eq!(canvas.completed(), loaded.as_slice());
        assert_eq!(r.segments_since_clear(), 2);
        let tail: Vec<_> = r.ops.iter().skip_while(|op| **op != RenderOp::Clear).collect();
        assert_eq!(tail.len(), 5);
    }
}
