use crate::common::object::LoxValue;
use std::sync::OnceLock;
use std::time::Instant;

static CLOCK_EPOCH: OnceLock<Instant> = OnceLock::new();

/// clock() -> seconds elapsed since the first call, as a number.
pub fn native_clock(_argc: usize, _args: &[LoxValue]) -> LoxValue {
    let epoch = CLOCK_EPOCH.get_or_init(Instant::now);
    LoxValue::Number(epoch.elapsed().as_secs_f64())
}
