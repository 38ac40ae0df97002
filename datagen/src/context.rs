//! The generator context shared by the scheduler and the operators of one flow.

use crate::{common::*, dataset::Dataset, value::Column};

/// Per-sample class ids and sample indices grouped by class.
#[derive(Debug, Clone)]
pub struct ClassTable {
    classes: Vec<usize>,
    members: IndexMap<usize, Vec<usize>>,
}

impl ClassTable {
    pub fn new(classes: Vec<usize>) -> Self {
        let mut members: IndexMap<usize, Vec<usize>> = IndexMap::new();
        classes.iter().enumerate().for_each(|(index, &class)| {
            members.entry(class).or_default().push(index);
        });
        members.sort_keys();

        Self { classes, members }
    }

    pub fn class_of(&self, index: usize) -> usize {
        self.classes[index]
    }

    /// Distinct class ids in ascending order.
    pub fn distinct_classes(&self) -> impl Iterator<Item = usize> + '_ {
        self.members.keys().copied()
    }

    pub fn num_distinct_classes(&self) -> usize {
        self.members.len()
    }

    pub fn members(&self, class: usize) -> &[usize] {
        self.members
            .get(&class)
            .map(|indices| indices.as_slice())
            .unwrap_or(&[])
    }

    pub fn min_class_count(&self) -> usize {
        self.members.values().map(Vec::len).min().unwrap_or(0)
    }
}

/// The generator context initializer.
#[derive(Debug, Clone)]
pub struct GeneratorContextInit {
    pub dataset: Arc<Dataset>,
    pub batch_size: usize,
    pub shuffle: bool,
    pub data_augmentation: bool,
    /// The scheduler seed. An entropy seed is used if it is `None`.
    pub seed: Option<u64>,
    pub balanced: bool,
}

impl GeneratorContextInit {
    pub fn build(self) -> Result<GeneratorContext> {
        let Self {
            dataset,
            batch_size,
            shuffle,
            data_augmentation,
            seed,
            balanced,
        } = self;

        ensure!(batch_size > 0, "batch_size must be positive");
        ensure!(!dataset.is_empty(), "the dataset must not be empty");
        ensure!(!balanced || shuffle, "balanced sampling requires shuffle");

        dataset.x().check("x")?;
        let sample_count = dataset.len();

        if let Some(y) = dataset.y() {
            y.check("y")?;
            ensure!(
                y.len() == sample_count,
                "the label count {} does not match the sample count {}",
                y.len(),
                sample_count
            );
        }

        if let Some(weights) = dataset.weights() {
            ensure!(
                dataset.y().is_some(),
                "sample weights cannot be used without labels"
            );
            ensure!(
                weights.len() == sample_count,
                "the weight count {} does not match the sample count {}",
                weights.len(),
                sample_count
            );
        }

        let class_table = if balanced {
            let classes = dataset
                .classes()
                .with_context(|| "balanced sampling requires class labels")?;
            Some(ClassTable::new(classes))
        } else {
            None
        };

        Ok(GeneratorContext {
            dataset,
            batch_size,
            shuffle,
            data_augmentation,
            seed,
            balanced,
            sample_count,
            class_table,
        })
    }
}

/// The information shared by every stage of one flow.
#[derive(Debug, Clone, Getters, CopyGetters)]
pub struct GeneratorContext {
    #[getset(get = "pub")]
    dataset: Arc<Dataset>,
    #[getset(get_copy = "pub")]
    batch_size: usize,
    #[getset(get_copy = "pub")]
    shuffle: bool,
    #[getset(get_copy = "pub")]
    data_augmentation: bool,
    #[getset(get_copy = "pub")]
    seed: Option<u64>,
    #[getset(get_copy = "pub")]
    balanced: bool,
    #[getset(get_copy = "pub")]
    sample_count: usize,
    #[getset(get = "pub")]
    class_table: Option<ClassTable>,
}

impl GeneratorContext {
    /// A context over an empty dataset for transforming samples one by one.
    pub(crate) fn standalone(data_augmentation: bool) -> Self {
        Self {
            dataset: Arc::new(Dataset::new(Column::Single(vec![]))),
            batch_size: 1,
            shuffle: false,
            data_augmentation,
            seed: None,
            balanced: false,
            sample_count: 0,
            class_table: None,
        }
    }

    /// The number of batches making up one epoch.
    ///
    /// In balanced mode an epoch is the smallest class count times the number of classes.
    pub fn steps_per_epoch(&self) -> usize {
        match &self.class_table {
            Some(table) => table.min_class_count() * table.num_distinct_classes(),
            None => (self.sample_count + self.batch_size - 1) / self.batch_size,
        }
    }

    pub fn class_of(&self, index: usize) -> Option<usize> {
        Some(self.class_table.as_ref()?.class_of(index))
    }

    /// Decide whether a stochastic operator applies.
    ///
    /// It is always `false` when data augmentation is off. Otherwise a
    /// probability of 1 or more always passes without drawing from `rng`.
    pub fn should_augment<R>(&self, rng: &mut R, probability: f64) -> bool
    where
        R: Rng + ?Sized,
    {
        self.data_augmentation && (probability >= 1.0 || rng.gen::<f64>() <= probability)
    }

    /// The scheduler random generator.
    pub fn new_rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init(dataset: Dataset) -> GeneratorContextInit {
        GeneratorContextInit {
            dataset: Arc::new(dataset),
            batch_size: 4,
            shuffle: false,
            data_augmentation: true,
            seed: Some(0),
            balanced: false,
        }
    }

    #[test]
    fn context_validation() {
        let labels = Dataset::new(Column::single(vec![0.0f32; 5]))
            .with_labels(Column::single(vec![0.0f32; 4]));
        assert!(init(labels).build().is_err());

        let weights_only = Dataset::new(Column::single(vec![0.0f32; 5])).with_weights(vec![1.0; 5]);
        assert!(init(weights_only).build().is_err());

        let balanced = GeneratorContextInit {
            balanced: true,
            ..init(
                Dataset::new(Column::single(vec![0.0f32; 5]))
                    .with_labels(Column::single(vec![0.0f32; 5])),
            )
        };
        assert!(balanced.build().is_err());

        let zero_batch = GeneratorContextInit {
            batch_size: 0,
            ..init(Dataset::new(Column::single(vec![0.0f32; 5])))
        };
        assert!(zero_batch.build().is_err());
    }

    #[test]
    fn context_steps_per_epoch() {
        let ctx = init(Dataset::new(Column::single(vec![0.0f32; 10])))
            .build()
            .unwrap();
        assert_eq!(ctx.steps_per_epoch(), 3);

        let labels = vec![0.0f32, 0.0, 0.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0];
        let ctx = GeneratorContextInit {
            shuffle: true,
            balanced: true,
            ..init(
                Dataset::new(Column::single(vec![0.0f32; 9])).with_labels(Column::single(labels)),
            )
        }
        .build()
        .unwrap();
        assert_eq!(ctx.steps_per_epoch(), 6);
        assert_eq!(ctx.class_of(4), Some(1));
    }

    #[test]
    fn context_should_augment() {
        let mut rng = StdRng::seed_from_u64(1);
        let enabled = GeneratorContext::standalone(true);
        let disabled = GeneratorContext::standalone(false);

        assert!((0..100).all(|_| enabled.should_augment(&mut rng, 1.0)));
        assert!((0..100).all(|_| !disabled.should_augment(&mut rng, 1.0)));
        assert!((0..100).all(|_| !disabled.should_augment(&mut rng, 0.5)));
    }
}
