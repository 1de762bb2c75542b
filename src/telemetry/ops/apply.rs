use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Apply;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Load, Plan, Connect, Dispatch, Patch }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Load => "load",
        Phase::Plan => "plan",
        Phase::Connect => "connect",
        Phase::Dispatch => "dispatch",
        Phase::Patch => "patch",
    }}
    fn span(&self) -> Span { match self {
        Phase::Load => info_span!("load"),
        Phase::Plan => info_span!("plan"),
        Phase::Connect => info_span!("connect"),
        Phase::Dispatch => info_span!("dispatch"),
        Phase::Patch => info_span!("patch"),
    }}
}

impl OpMarker for Apply {
    const NAME: &'static str = "apply";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("apply") }
}
