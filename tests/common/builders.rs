//! Test data builders for creating pipelines

use preproc_rs::config::EngineConfig;
use preproc_rs::pipeline::{ExecutionContext, ItemPipeline, OnFailure, PipelineOutput, StepKind, StepSpec};
use preproc_rs::types::{ItemValueType, Timestamp, Value};

/// Builder for creating test pipelines
pub struct PipelineBuilder {
    item_id: u64,
    value_type: ItemValueType,
    steps: Vec<StepSpec>,
}

impl PipelineBuilder {
    pub fn new(value_type: ItemValueType) -> Self {
        Self {
            item_id: 1,
            value_type,
            steps: Vec::new(),
        }
    }

    pub fn item_id(mut self, item_id: u64) -> Self {
        self.item_id = item_id;
        self
    }

    pub fn step(mut self, kind: StepKind, params: &str) -> Self {
        self.steps.push(StepSpec::new(kind, params));
        self
    }

    /// Add a step with an on-failure policy
    pub fn step_or(mut self, kind: StepKind, params: &str, on_failure: OnFailure) -> Self {
        self.steps.push(StepSpec::new(kind, params).with_on_failure(on_failure));
        self
    }

    pub fn build(self) -> ItemPipeline {
        ItemPipeline::new(self.item_id, self.value_type, self.steps)
    }
}

/// A pipeline plus the context it runs in
pub struct Harness {
    pub ctx: ExecutionContext,
    pub pipeline: ItemPipeline,
}

impl Harness {
    pub fn new(pipeline: ItemPipeline) -> Self {
        Self {
            ctx: ExecutionContext::new(EngineConfig::default()),
            pipeline,
        }
    }

    pub fn with_config(pipeline: ItemPipeline, config: EngineConfig) -> Self {
        Self {
            ctx: ExecutionContext::new(config),
            pipeline,
        }
    }

    /// Run a string input collected at `sec` seconds
    pub fn feed(&mut self, input: &str, sec: i64) -> PipelineOutput {
        self.feed_value(Value::string(input), Timestamp::from_secs(sec))
    }

    pub fn feed_value(&mut self, input: Value, timestamp: Timestamp) -> PipelineOutput {
        self.ctx.run(&mut self.pipeline, None, &input, timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_builder() {
        let pipeline = PipelineBuilder::new(ItemValueType::Unsigned)
            .item_id(7)
            .step(StepKind::Trim, " ")
            .step_or(StepKind::Scale, "2", OnFailure::Discard)
            .build();

        assert_eq!(pipeline.item_id(), 7);
        assert_eq!(pipeline.steps().len(), 2);
        assert_eq!(pipeline.steps()[1].on_failure, OnFailure::Discard);
    }
}
