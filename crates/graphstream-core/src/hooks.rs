//! Hook pipeline applied to an event's mapping form before encoding.
//!
//! Stages run left-to-right. Each receives the full mapping
//! `{"<op>": {"<id>": <value>}}` and returns the mapping to hand to the
//! next stage.

use std::fmt;

use chrono::Utc;
use serde_json::{Map, Value};

/// Attribute key written by [`TimestampStage`].
pub const TIMESTAMP_KEY: &str = "t";

/// A single transformation of an event mapping.
pub trait HookStage: Send {
    fn apply(&self, event: Map<String, Value>) -> Map<String, Value>;

    /// Name used in logs and `Debug` output.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<F> HookStage for F
where
    F: Fn(Map<String, Value>) -> Map<String, Value> + Send,
{
    fn apply(&self, event: Map<String, Value>) -> Map<String, Value> {
        self(event)
    }

    fn name(&self) -> &str {
        "fn"
    }
}

/// Ordered list of hook stages.
#[derive(Default)]
pub struct HookPipeline {
    stages: Vec<Box<dyn HookStage>>,
}

impl HookPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage; it runs after every stage already present.
    pub fn push<S: HookStage + 'static>(&mut self, stage: S) {
        self.stages.push(Box::new(stage));
    }

    pub fn push_boxed(&mut self, stage: Box<dyn HookStage>) {
        self.stages.push(stage);
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn apply(&self, event: Map<String, Value>) -> Map<String, Value> {
        self.stages
            .iter()
            .fold(event, |mapping, stage| stage.apply(mapping))
    }
}

impl fmt::Debug for HookPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.stage_names()).finish()
    }
}

// ── Built-in stages ───────────────────────────────────────────────

/// Writes the current Unix time (seconds) as `t` into every attribute
/// object of the event.
///
/// Values that are not objects, such as the `"ALL"` literal of a
/// delete-all event, are left as they are.
#[derive(Debug, Clone, Copy)]
pub struct TimestampStage {
    clock: fn() -> i64,
}

impl TimestampStage {
    pub fn new() -> Self {
        Self { clock: unix_now }
    }

    /// Use a custom clock instead of the system time.
    pub fn with_clock(clock: fn() -> i64) -> Self {
        Self { clock }
    }
}

impl Default for TimestampStage {
    fn default() -> Self {
        Self::new()
    }
}

impl HookStage for TimestampStage {
    fn apply(&self, mut event: Map<String, Value>) -> Map<String, Value> {
        let now = (self.clock)();
        for elements in event.values_mut() {
            let Value::Object(elements) = elements else {
                continue;
            };
            for attrs in elements.values_mut() {
                if let Value::Object(attrs) = attrs {
                    attrs.insert(TIMESTAMP_KEY.to_string(), Value::from(now));
                }
            }
        }
        event
    }

    fn name(&self) -> &str {
        "timestamp"
    }
}

fn unix_now() -> i64 {
    Utc::now().timestamp()
}
