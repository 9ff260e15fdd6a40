//! Pipeline assembly: stage instantiation, lane-graph validation, and
//! lifecycle (init/destroy) over the assembled graph.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use edgetide_el::Evaluator;
use edgetide_sdk::{
    Destination, ErrorSink, Origin, Processor, StageContext, StageInstance, StageRegistry,
    StageRole,
};
use serde_json::Value;

use crate::config::bean::PipelineConfigBean;
use crate::config::types::{PipelineConfiguration, StageConfiguration};
use crate::errors::PipelineError;

/// Library of the built-in stages shipped with the engine.
pub const BUILTIN_LIBRARY: &str = "edgetide-basic-lib";
/// Stage name of the discard destination used when no error stage is
/// configured.
pub const TRASH_STAGE: &str = "trash";

pub(crate) struct OriginRuntime {
    pub conf: StageConfiguration,
    pub stage: Box<dyn Origin>,
    pub context: StageContext,
    pub inited: bool,
}

pub(crate) enum DownstreamKind {
    Processor(Box<dyn Processor>),
    Destination(Box<dyn Destination>),
}

pub(crate) struct DownstreamRuntime {
    pub conf: StageConfiguration,
    pub kind: DownstreamKind,
    pub context: StageContext,
    pub inited: bool,
}

pub(crate) struct ErrorStageRuntime {
    pub conf: StageConfiguration,
    pub stage: Box<dyn Destination>,
    pub context: StageContext,
    pub inited: bool,
}

/// A validated, instantiated pipeline graph.
///
/// Built from configuration by [`Pipeline::build`], then driven one
/// cycle at a time by the runner. `destroy` is idempotent and runs on
/// every stage whose `init` was invoked.
pub struct Pipeline {
    pipeline_id: String,
    bean: PipelineConfigBean,
    pub(crate) origin: OriginRuntime,
    /// Processors and destinations in topological lane order.
    pub(crate) downstream: Vec<DownstreamRuntime>,
    pub(crate) error_stage: ErrorStageRuntime,
    pub(crate) error_sink: ErrorSink,
    /// Number of consuming stages per lane (drives clone-on-fan-out).
    pub(crate) lane_consumers: HashMap<String, usize>,
    destroyed: bool,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("pipeline_id", &self.pipeline_id)
            .field("downstream_len", &self.downstream.len())
            .field("lane_consumers", &self.lane_consumers)
            .field("destroyed", &self.destroyed)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Assemble and validate a pipeline from configuration.
    ///
    /// Validates lane wiring (single producer per lane, no dangling or
    /// unconsumed lanes, no cycles), role placement, and stage
    /// resolution. All wiring problems are reported together.
    ///
    /// # Errors
    ///
    /// [`PipelineError::UnknownStage`] for unregistered stages and
    /// [`PipelineError::Configuration`] for everything else.
    pub fn build(
        config: &PipelineConfiguration,
        registry: &StageRegistry,
        parameters: &HashMap<String, Value>,
    ) -> Result<Self, PipelineError> {
        let bean = PipelineConfigBean::from_configuration(config)?;

        let mut instances = Vec::with_capacity(config.stages.len());
        for stage in &config.stages {
            let instance = registry.create(&stage.library, &stage.stage_name).ok_or_else(|| {
                PipelineError::UnknownStage {
                    library: stage.library.clone(),
                    stage_name: stage.stage_name.clone(),
                }
            })?;
            instances.push(instance);
        }

        validate_graph(config, &instances)?;

        let lane_consumers = count_lane_consumers(config);
        let order = topological_order(config, &instances)?;

        let error_sink: ErrorSink = ErrorSink::default();
        let evaluator = Arc::new(Evaluator::with_defaults());
        let make_context = |conf: &StageConfiguration| {
            StageContext::builder()
                .instance_name(conf.instance_name.as_str())
                .output_lanes(conf.output_lanes.clone())
                .configs(
                    conf.configuration
                        .iter()
                        .map(|c| (c.name.clone(), c.value.clone()))
                        .collect(),
                )
                .constants(bean.constants.clone())
                .parameters(parameters.clone())
                .pipeline(config.pipeline_id.as_str(), config.title.as_str())
                .evaluator(evaluator.clone())
                .error_sink(error_sink.clone())
                .build()
        };

        // Split the instantiated stages into the origin and the ordered
        // downstream list. Role placement was validated above.
        let mut origin = None;
        let mut by_index: HashMap<usize, DownstreamRuntime> = HashMap::new();
        for (index, (conf, instance)) in config.stages.iter().zip(instances).enumerate() {
            let context = make_context(conf);
            match instance {
                StageInstance::Origin(stage) => {
                    origin = Some(OriginRuntime {
                        conf: conf.clone(),
                        stage,
                        context,
                        inited: false,
                    });
                }
                StageInstance::Processor(stage) => {
                    by_index.insert(
                        index,
                        DownstreamRuntime {
                            conf: conf.clone(),
                            kind: DownstreamKind::Processor(stage),
                            context,
                            inited: false,
                        },
                    );
                }
                StageInstance::Destination(stage) => {
                    by_index.insert(
                        index,
                        DownstreamRuntime {
                            conf: conf.clone(),
                            kind: DownstreamKind::Destination(stage),
                            context,
                            inited: false,
                        },
                    );
                }
            }
        }
        let origin = origin.ok_or_else(|| {
            PipelineError::Configuration("pipeline must have exactly one origin".to_string())
        })?;
        let mut downstream = Vec::with_capacity(by_index.len());
        for index in order {
            if let Some(runtime) = by_index.remove(&index) {
                downstream.push(runtime);
            }
        }

        let error_conf = config
            .error_stage
            .clone()
            .unwrap_or_else(default_error_stage);
        let error_instance = registry
            .create(&error_conf.library, &error_conf.stage_name)
            .ok_or_else(|| PipelineError::UnknownStage {
                library: error_conf.library.clone(),
                stage_name: error_conf.stage_name.clone(),
            })?;
        let StageInstance::Destination(error_destination) = error_instance else {
            return Err(PipelineError::Configuration(format!(
                "error stage '{}' must be a destination",
                error_conf.instance_name
            )));
        };
        let error_context = make_context(&error_conf);

        Ok(Self {
            pipeline_id: config.pipeline_id.clone(),
            bean,
            origin,
            downstream,
            error_stage: ErrorStageRuntime {
                conf: error_conf,
                stage: error_destination,
                context: error_context,
                inited: false,
            },
            error_sink,
            lane_consumers,
            destroyed: false,
        })
    }

    #[must_use]
    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    #[must_use]
    pub fn bean(&self) -> &PipelineConfigBean {
        &self.bean
    }

    /// Initialize every stage, fail-fast.
    ///
    /// A stage whose `init` was invoked is destroyed on every later exit
    /// path, even when that `init` failed partway.
    ///
    /// # Errors
    ///
    /// Returns the first failing stage's error; the caller is expected
    /// to `destroy` the pipeline.
    pub fn init(&mut self) -> Result<(), PipelineError> {
        self.origin.inited = true;
        self.origin
            .stage
            .init(&mut self.origin.context)
            .map_err(|e| PipelineError::stage(self.origin.conf.instance_name.as_str(), e))?;
        for stage in &mut self.downstream {
            stage.inited = true;
            let result = match &mut stage.kind {
                DownstreamKind::Processor(p) => p.init(&mut stage.context),
                DownstreamKind::Destination(d) => d.init(&mut stage.context),
            };
            result.map_err(|e| PipelineError::stage(stage.conf.instance_name.as_str(), e))?;
        }
        self.error_stage.inited = true;
        self.error_stage
            .stage
            .init(&mut self.error_stage.context)
            .map_err(|e| PipelineError::stage(self.error_stage.conf.instance_name.as_str(), e))?;
        Ok(())
    }

    /// Destroy every inited stage, exactly once, logging (not
    /// propagating) destroy failures.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        if self.origin.inited {
            if let Err(e) = self.origin.stage.destroy(&mut self.origin.context) {
                tracing::warn!(stage = self.origin.conf.instance_name, "Destroy failed: {e}");
            }
        }
        for stage in &mut self.downstream {
            if !stage.inited {
                continue;
            }
            let result = match &mut stage.kind {
                DownstreamKind::Processor(p) => p.destroy(&mut stage.context),
                DownstreamKind::Destination(d) => d.destroy(&mut stage.context),
            };
            if let Err(e) = result {
                tracing::warn!(stage = stage.conf.instance_name, "Destroy failed: {e}");
            }
        }
        if self.error_stage.inited {
            if let Err(e) = self
                .error_stage
                .stage
                .destroy(&mut self.error_stage.context)
            {
                tracing::warn!(
                    stage = self.error_stage.conf.instance_name,
                    "Destroy failed: {e}"
                );
            }
        }
    }
}

/// Default error-handling destination: discard.
fn default_error_stage() -> StageConfiguration {
    StageConfiguration {
        instance_name: "discard-error-records".to_string(),
        library: BUILTIN_LIBRARY.to_string(),
        stage_name: TRASH_STAGE.to_string(),
        configuration: Vec::new(),
        input_lanes: Vec::new(),
        output_lanes: Vec::new(),
    }
}

/// Validate role placement and lane wiring, reporting every problem.
fn validate_graph(
    config: &PipelineConfiguration,
    instances: &[StageInstance],
) -> Result<(), PipelineError> {
    let mut errors = Vec::new();

    if config.stages.is_empty() {
        errors.push("pipeline defines no stages".to_string());
    }

    let mut seen_names = HashSet::new();
    for stage in &config.stages {
        if !seen_names.insert(stage.instance_name.as_str()) {
            errors.push(format!(
                "duplicate stage instance name '{}'",
                stage.instance_name
            ));
        }
    }

    let origin_count = instances
        .iter()
        .filter(|i| i.role() == StageRole::Origin)
        .count();
    if !config.stages.is_empty() && origin_count != 1 {
        errors.push(format!(
            "pipeline must have exactly one origin, found {origin_count}"
        ));
    }

    for (conf, instance) in config.stages.iter().zip(instances) {
        let name = &conf.instance_name;
        match instance.role() {
            StageRole::Origin => {
                if !conf.input_lanes.is_empty() {
                    errors.push(format!("origin '{name}' must not declare input lanes"));
                }
                if conf.output_lanes.is_empty() {
                    errors.push(format!("origin '{name}' must declare at least one output lane"));
                }
            }
            StageRole::Processor => {
                if conf.input_lanes.is_empty() {
                    errors.push(format!("processor '{name}' must declare at least one input lane"));
                }
                if conf.output_lanes.is_empty() {
                    errors.push(format!(
                        "processor '{name}' must declare at least one output lane"
                    ));
                }
            }
            StageRole::Destination => {
                if conf.input_lanes.is_empty() {
                    errors.push(format!(
                        "destination '{name}' must declare at least one input lane"
                    ));
                }
                if !conf.output_lanes.is_empty() {
                    errors.push(format!("destination '{name}' must not declare output lanes"));
                }
            }
        }
    }

    // Single producer per lane, no dangling inputs, no unconsumed outputs.
    let mut producers: HashMap<&str, &str> = HashMap::new();
    for stage in &config.stages {
        for lane in &stage.output_lanes {
            if let Some(previous) = producers.insert(lane, &stage.instance_name) {
                errors.push(format!(
                    "output lane '{lane}' is produced by both '{previous}' and '{}'",
                    stage.instance_name
                ));
            }
        }
    }
    let mut consumed: HashSet<&str> = HashSet::new();
    for stage in &config.stages {
        for lane in &stage.input_lanes {
            consumed.insert(lane);
            if !producers.contains_key(lane.as_str()) {
                errors.push(format!(
                    "input lane '{lane}' of stage '{}' has no producing stage",
                    stage.instance_name
                ));
            }
        }
    }
    for stage in &config.stages {
        for lane in &stage.output_lanes {
            if !consumed.contains(lane.as_str()) {
                errors.push(format!(
                    "output lane '{lane}' of stage '{}' is not consumed by any stage",
                    stage.instance_name
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::Configuration(errors.join("; ")))
    }
}

fn count_lane_consumers(config: &PipelineConfiguration) -> HashMap<String, usize> {
    let mut consumers: HashMap<String, usize> = HashMap::new();
    for stage in &config.stages {
        for lane in &stage.input_lanes {
            *consumers.entry(lane.clone()).or_insert(0) += 1;
        }
    }
    consumers
}

/// Kahn's algorithm over non-origin stages; lanes produced by the origin
/// contribute no edges. Ties break on configuration order so execution
/// is deterministic across runs.
fn topological_order(
    config: &PipelineConfiguration,
    instances: &[StageInstance],
) -> Result<Vec<usize>, PipelineError> {
    let mut producer_of: HashMap<&str, usize> = HashMap::new();
    for (index, stage) in config.stages.iter().enumerate() {
        for lane in &stage.output_lanes {
            producer_of.insert(lane, index);
        }
    }

    let downstream: Vec<usize> = instances
        .iter()
        .enumerate()
        .filter(|(_, i)| i.role() != StageRole::Origin)
        .map(|(index, _)| index)
        .collect();

    let mut indegree: HashMap<usize, usize> = downstream.iter().map(|&i| (i, 0)).collect();
    let mut edges: HashMap<usize, Vec<usize>> = HashMap::new();
    for &index in &downstream {
        for lane in &config.stages[index].input_lanes {
            let Some(&producer) = producer_of.get(lane.as_str()) else {
                continue;
            };
            if instances[producer].role() == StageRole::Origin {
                continue;
            }
            edges.entry(producer).or_default().push(index);
            if let Some(degree) = indegree.get_mut(&index) {
                *degree += 1;
            }
        }
    }

    let mut queue: VecDeque<usize> = downstream
        .iter()
        .copied()
        .filter(|i| indegree[i] == 0)
        .collect();
    let mut order = Vec::with_capacity(downstream.len());
    while let Some(index) = queue.pop_front() {
        order.push(index);
        for &next in edges.get(&index).map(Vec::as_slice).unwrap_or_default() {
            if let Some(degree) = indegree.get_mut(&next) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(next);
                }
            }
        }
    }

    if order.len() != downstream.len() {
        return Err(PipelineError::Configuration(
            "pipeline lane graph contains a cycle".to_string(),
        ));
    }
    Ok(order)
}
