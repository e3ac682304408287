use crate::merge::extend_map;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Hook run after a model has been populated.
pub trait Decorate: Send + Sync {
    fn decorate(&self, data: &mut Map<String, Value>);
}

impl<F> Decorate for F
where
    F: Fn(&mut Map<String, Value>) + Send + Sync,
{
    fn decorate(&self, data: &mut Map<String, Value>) {
        self(data);
    }
}

/// Plain data holder behind every model instance.
#[derive(Clone, Default)]
pub struct Model {
    data: Map<String, Value>,
    decorator: Option<Arc<dyn Decorate>>,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("data", &self.data)
            .field("decorated", &self.decorator.is_some())
            .finish()
    }
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Model {
    /// A model populated from `data`. Non-object data is ignored.
    #[must_use]
    pub fn new(data: Option<&Value>) -> Self {
        let mut model = Self::default();
        if let Some(data) = data {
            model.merge(data);
        }
        model
    }

    /// Attaches `decorator` and runs it over the current data.
    #[must_use]
    pub fn with_decorator(mut self, decorator: Arc<dyn Decorate>) -> Self {
        self.decorator = Some(decorator);
        self.decorate();
        self
    }

    fn decorate(&mut self) {
        if let Some(decorator) = &self.decorator {
            decorator.decorate(&mut self.data);
        }
    }

    /// Deep-merges `data` into the model, then decorates.
    pub fn merge(&mut self, data: &Value) {
        if let Value::Object(source) = data {
            extend_map(&mut self.data, source);
        }
        self.decorate();
    }

    /// Drops every field, then merges `data`.
    pub fn replace(&mut self, data: &Value) {
        self.data.clear();
        self.merge(data);
    }

    pub fn empty(&mut self) {
        self.data.clear();
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    #[must_use]
    pub const fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// A deep copy of the data as a JSON object.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.data.clone())
    }
}
