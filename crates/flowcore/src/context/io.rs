use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

/// Workflow-level inputs and outputs
#[derive(Debug, Default)]
pub struct IoCenter {
    inputs: RwLock<HashMap<String, Value>>,
    outputs: RwLock<HashMap<String, Value>>,
}

impl IoCenter {
    pub fn new(inputs: HashMap<String, Value>) -> Self {
        Self {
            inputs: RwLock::new(inputs),
            outputs: RwLock::new(HashMap::new()),
        }
    }

    pub fn inputs(&self) -> HashMap<String, Value> {
        self.inputs.read().clone()
    }

    pub fn outputs(&self) -> HashMap<String, Value> {
        self.outputs.read().clone()
    }

    /// Merge `outputs` into the workflow outputs
    pub fn set_outputs(&self, outputs: HashMap<String, Value>) {
        self.outputs.write().extend(outputs);
    }
}
