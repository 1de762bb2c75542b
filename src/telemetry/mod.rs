pub mod config;
pub mod ctx;
pub mod ops;

use ctx::LogCtx;

fn ctx<O: ctx::OpMarker>() -> LogCtx<O> { LogCtx { json: config::logs_are_json(), _marker: std::marker::PhantomData } }

pub fn extract() -> LogCtx<ops::extract::Extract> { ctx() }
pub fn validate() -> LogCtx<ops::validate::Validate> { ctx() }
pub fn apply() -> LogCtx<ops::apply::Apply> { ctx() }
pub fn sample() -> LogCtx<ops::sample::Sample> { ctx() }
