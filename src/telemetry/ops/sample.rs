use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Sample;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Write }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self { Phase::Write => "write" } }
    fn span(&self) -> Span { match self { Phase::Write => info_span!("write") } }
}

impl OpMarker for Sample {
    const NAME: &'static str = "sample";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("sample") }
}
