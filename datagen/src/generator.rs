//! The generator, its operator pipeline and the batch flow.

use crate::{
    batch::{self, Batch},
    common::*,
    config::FlowConfig,
    context::{GeneratorContext, GeneratorContextInit},
    dataset::Dataset,
    operator::Operator,
    profiling::{Profile, Timing},
    schedule::Schedule,
    value::DataRecord,
};
use rayon::prelude::*;

/// An ordered chain of operators producing batches from a dataset.
#[derive(Debug, Clone, Default)]
pub struct Generator {
    operators: Vec<Arc<dyn Operator>>,
    profile: Option<Arc<Profile>>,
}

impl Generator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time every operator on every sample.
    pub fn with_profiling(mut self) -> Self {
        self.profile = Some(Arc::new(Profile::new()));
        self
    }

    /// Append an operator. Operators run in insertion order.
    pub fn add<O>(&mut self, operator: O) -> &mut Self
    where
        O: 'static + Operator,
    {
        self.operators.push(Arc::new(operator));
        self
    }

    pub fn add_arc(&mut self, operator: Arc<dyn Operator>) -> &mut Self {
        self.operators.push(operator);
        self
    }

    pub fn operators(&self) -> &[Arc<dyn Operator>] {
        &self.operators
    }

    pub fn profile(&self) -> Option<&Arc<Profile>> {
        self.profile.as_ref()
    }

    fn pipeline(&self) -> Pipeline {
        Pipeline {
            operators: self.operators.iter().cloned().collect(),
            profile: self.profile.clone(),
        }
    }

    /// Start an endless batch flow over `dataset`.
    ///
    /// Returns the flow together with the number of batches per epoch.
    /// Operators added after this call do not affect the flow.
    pub fn flow(&self, dataset: Arc<Dataset>, config: &FlowConfig) -> Result<(Flow, usize)> {
        let FlowConfig {
            batch_size,
            shuffle,
            data_augmentation,
            seed,
            balanced,
        } = *config;

        let ctx = GeneratorContextInit {
            dataset,
            batch_size,
            shuffle,
            data_augmentation,
            seed,
            balanced,
        }
        .build()?;

        let steps = ctx.steps_per_epoch();
        let num_workers = batch_size.min(num_cpus::get() * 3).max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_workers)
            .thread_name(|index| format!("datagen-worker-{}", index))
            .build()
            .with_context(|| "failed to build the worker pool")?;

        let schedule = Schedule::new(&ctx);
        info!(
            "start a {} flow of {} samples, {} steps per epoch with {} workers",
            schedule.name(),
            ctx.sample_count(),
            steps,
            num_workers
        );

        let flow = Flow {
            rng: ctx.new_rng(),
            multiple_input: ctx.dataset().x().is_multiple(),
            multiple_output: ctx
                .dataset()
                .y()
                .as_ref()
                .map(|y| y.is_multiple())
                .unwrap_or(false),
            ctx,
            pipeline: self.pipeline(),
            schedule,
            pool,
        };

        Ok((flow, steps))
    }

    /// Run the operators on one sample outside of any flow.
    pub fn transform(
        &self,
        record: DataRecord,
        rng: &mut StdRng,
        data_augmentation: bool,
    ) -> Result<DataRecord> {
        let ctx = GeneratorContext::standalone(data_augmentation);
        self.pipeline().run(record, rng, &ctx)
    }

    /// Print the share of time spent per operator, largest first.
    pub fn summary_profile<F>(&self, mut print_fn: F) -> Result<()>
    where
        F: FnMut(&str),
    {
        let profile = self
            .profile
            .as_ref()
            .ok_or_else(|| format_err!("profiling is not enabled on this generator"))?;
        profile
            .summary_lines()
            .iter()
            .for_each(|line| print_fn(line));
        Ok(())
    }

    /// Log the profiling summary at the info level.
    pub fn log_summary_profile(&self) -> Result<()> {
        self.summary_profile(|line| info!("{}", line))
    }
}

/// The operator snapshot taken by a flow.
#[derive(Debug, Clone)]
struct Pipeline {
    operators: Arc<[Arc<dyn Operator>]>,
    profile: Option<Arc<Profile>>,
}

impl Pipeline {
    fn run(&self, record: DataRecord, rng: &mut StdRng, ctx: &GeneratorContext) -> Result<DataRecord> {
        match &self.profile {
            Some(profile) => {
                let mut timing = Timing::new();
                let record = self.operators.iter().try_fold(record, |record, operator| {
                    let output = operator.execute(record, rng, ctx);
                    timing.set_record(operator.name());
                    output.with_context(|| format!("operator '{}' failed", operator.name()))
                })?;
                profile.merge(&timing);
                Ok(record)
            }
            None => self.operators.iter().try_fold(record, |record, operator| {
                operator
                    .execute(record, rng, ctx)
                    .with_context(|| format!("operator '{}' failed", operator.name()))
            }),
        }
    }

    /// Process the sample at `index` with a generator seeded by `seed`.
    fn work(&self, index: usize, seed: u64, ctx: &GeneratorContext) -> Result<DataRecord> {
        let input = ctx.dataset().pick(index);
        let (has_y, has_w) = (input.y.is_some(), input.w.is_some());
        let mut rng = StdRng::seed_from_u64(seed);

        let output = self
            .run(input, &mut rng, ctx)
            .with_context(|| format!("failed to process sample {}", index))?;

        assert_eq!(
            output.y.is_some(),
            has_y,
            "an operator changed the presence of the label of sample {}",
            index
        );
        assert_eq!(
            output.w.is_some(),
            has_w,
            "an operator changed the presence of the weight of sample {}",
            index
        );
        Ok(output)
    }
}

/// An endless stream of batches. It never returns `None`.
///
/// Each call to `next` blocks until all samples of the batch are processed.
/// A failing sample fails the whole batch.
#[derive(Debug, Getters)]
pub struct Flow {
    #[getset(get = "pub")]
    ctx: GeneratorContext,
    pipeline: Pipeline,
    schedule: Schedule,
    rng: StdRng,
    pool: rayon::ThreadPool,
    multiple_input: bool,
    multiple_output: bool,
}

impl Flow {
    fn next_batch(&mut self) -> Result<Batch> {
        let plan = self.schedule.next_batch(&mut self.rng, &self.ctx)?;
        let Self {
            ctx,
            pipeline,
            pool,
            ..
        } = &*self;

        let records: Vec<DataRecord> = pool.install(|| {
            plan.indices
                .par_iter()
                .zip(plan.seeds.par_iter())
                .map(|(&index, &seed)| pipeline.work(index, seed, ctx))
                .collect::<Result<_>>()
        })?;

        batch::assemble(records, self.multiple_input, self.multiple_output)
    }
}

impl Iterator for Flow {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_batch())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        operator::CustomOperator,
        value::{Column, Value},
    };

    fn dataset(len: usize) -> Arc<Dataset> {
        let x = Column::single((0..len).map(|index| index as f32));
        let y = Column::single((0..len).map(|index| (index % 2) as f32));
        Arc::new(Dataset::new(x).with_labels(y))
    }

    #[test]
    fn unshuffled_flow_yields_samples_in_order() {
        let mut generator = Generator::new();
        generator.add(CustomOperator::new("double", |record: DataRecord, _, _| {
            let x = record.x.into_array()?;
            Ok(DataRecord { x: (x * 2.0).into(), ..record })
        }));

        let config = FlowConfig {
            batch_size: 4,
            ..Default::default()
        };
        let (flow, steps) = generator.flow(dataset(10), &config).unwrap();
        assert_eq!(steps, 3);

        let values: Vec<f32> = flow
            .take(steps)
            .flat_map(|batch| {
                let batch = batch.unwrap();
                assert_eq!(batch.arity(), 2);
                batch.x.parts()[0].as_array().unwrap().iter().copied().collect::<Vec<_>>()
            })
            .collect();
        let expect: Vec<f32> = (0..10).map(|index| index as f32 * 2.0).collect();
        assert_eq!(values, expect);
    }

    #[test]
    fn failing_sample_fails_the_batch() {
        let mut generator = Generator::new();
        generator.add(CustomOperator::new("fail_on_three", |record: DataRecord, _, _| {
            ensure!(record.x != Value::scalar(3.0), "cannot process three");
            Ok(record)
        }));

        let config = FlowConfig {
            batch_size: 5,
            ..Default::default()
        };
        let (mut flow, _) = generator.flow(dataset(10), &config).unwrap();
        assert!(flow.next().unwrap().is_err());
        assert!(flow.next().unwrap().is_ok());
    }

    #[test]
    fn summary_requires_profiling() {
        let generator = Generator::new();
        assert!(generator.summary_profile(|_| {}).is_err());
        assert!(Generator::new().with_profiling().summary_profile(|_| {}).is_ok());
    }

    #[test]
    fn flow_rejects_invalid_configs() {
        let generator = Generator::new();
        let config = FlowConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(generator.flow(dataset(4), &config).is_err());

        let config = FlowConfig {
            balanced: true,
            ..Default::default()
        };
        assert!(generator.flow(dataset(4), &config).is_err());
    }
}
