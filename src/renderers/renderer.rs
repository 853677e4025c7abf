// Copyright @yucwang 2026

use crate::core::error::RenderResult;
use crate::core::scene::Scene;
use crate::io::sink::OutputSink;
use crate::renderers::scheduler::RenderStatus;

pub trait Renderer {
    /// Renders `scene` and hands completed tiles and the final film to
    /// `sink`. An aborted render never reaches [`OutputSink::finish`].
    fn render(&mut self, scene: &Scene, sink: &mut dyn OutputSink) -> RenderResult<RenderStatus>;
}
