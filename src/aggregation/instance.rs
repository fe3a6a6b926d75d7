//! Stateful aggregation instances. Each wraps a running result plus the
//! change-tracking bit emit-on-change policies and UIs rely on.

use serde_json::Value;

pub trait AggregationInstance: std::fmt::Debug + Send {
    /// Feed one more value into the aggregation. Non-numeric input is the
    /// aggregation's own business (e.g. `sum` skips it silently).
    fn push(&mut self, value: &Value);
    fn result(&self) -> Value;
    fn changed(&self) -> bool;
    fn mark_change_checked(&mut self);
    fn fresh(&self) -> Box<dyn AggregationInstance>;
}

#[derive(Debug, Default)]
pub struct CountInstance {
    count: i64,
    dirty: bool,
}

impl AggregationInstance for CountInstance {
    fn push(&mut self, _value: &Value) {
        self.count += 1;
        self.dirty = true;
    }

    fn result(&self) -> Value {
        Value::from(self.count)
    }

    fn changed(&self) -> bool {
        self.dirty
    }

    fn mark_change_checked(&mut self) {
        self.dirty = false;
    }

    fn fresh(&self) -> Box<dyn AggregationInstance> {
        Box::new(CountInstance::default())
    }
}

/// Non-strict by default: non-numeric pushes are skipped rather than
/// erroring. Strict mode is an internal knob not surfaced through the
/// grammar.
#[derive(Debug, Default)]
pub struct SumInstance {
    total: f64,
    dirty: bool,
    strict: bool,
}

impl SumInstance {
    pub fn strict() -> Self {
        Self {
            total: 0.0,
            dirty: false,
            strict: true,
        }
    }
}

impl AggregationInstance for SumInstance {
    fn push(&mut self, value: &Value) {
        match value.as_f64() {
            Some(n) => {
                self.total += n;
                self.dirty = true;
            }
            None if self.strict => {
                tracing::warn!(?value, "sum() received a non-numeric value in strict mode");
            }
            None => {}
        }
    }

    fn result(&self) -> Value {
        serde_json::Number::from_f64(self.total)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }

    fn changed(&self) -> bool {
        self.dirty
    }

    fn mark_change_checked(&mut self) {
        self.dirty = false;
    }

    fn fresh(&self) -> Box<dyn AggregationInstance> {
        Box::new(SumInstance {
            total: 0.0,
            dirty: false,
            strict: self.strict,
        })
    }
}

pub fn new_instance(kind: &str) -> Option<Box<dyn AggregationInstance>> {
    match kind {
        "count" => Some(Box::new(CountInstance::default())),
        "sum" => Some(Box::new(SumInstance::default())),
        _ => None,
    }
}
