//! Sample scheduling: which indices and seeds make up each batch.

use crate::{common::*, context::GeneratorContext};
use std::ops::Range;

/// Per-sample seeds are drawn from `[0, 2^31)`.
const SEED_BOUND: u64 = 1 << 31;

/// The dataset indices of one batch with a seed for each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BatchPlan {
    pub indices: Vec<usize>,
    pub seeds: Vec<u64>,
}

impl BatchPlan {
    pub fn len(&self) -> usize {
        self.indices.len()
    }
}

fn draw_seeds<R>(rng: &mut R, count: usize) -> Vec<u64>
where
    R: Rng + ?Sized,
{
    (0..count).map(|_| rng.gen_range(0..SEED_BOUND)).collect()
}

/// Split `0..len` into `chunks` ranges whose sizes differ by at most one,
/// the longer ones first.
pub(crate) fn array_split(len: usize, chunks: usize) -> Vec<Range<usize>> {
    let base = len / chunks;
    let extra = len % chunks;
    let mut start = 0;
    (0..chunks)
        .map(|index| {
            let size = base + usize::from(index < extra);
            let range = start..(start + size);
            start += size;
            range
        })
        .collect()
}

/// The scheduling policy of a flow, decided once from the context flags.
#[derive(Debug, Clone)]
pub(crate) enum Schedule {
    /// Uniform classes, then uniform samples within each class.
    Balanced { batch_size: usize },
    /// An endless stream reshuffled every lap, cut into full batches.
    Shuffled {
        batch_size: usize,
        order: Vec<usize>,
        seeds: Vec<u64>,
        cursor: usize,
        lap: usize,
    },
    /// Each lap visits every sample once in order.
    Sequential {
        chunks: Vec<Range<usize>>,
        seeds: Vec<u64>,
        position: usize,
    },
}

impl Schedule {
    pub fn new(ctx: &GeneratorContext) -> Self {
        let batch_size = ctx.batch_size();
        let sample_count = ctx.sample_count();

        if ctx.balanced() {
            Self::Balanced { batch_size }
        } else if ctx.shuffle() {
            Self::Shuffled {
                batch_size,
                order: (0..sample_count).collect(),
                seeds: vec![],
                cursor: sample_count,
                lap: 0,
            }
        } else {
            Self::Sequential {
                chunks: array_split(sample_count, ctx.steps_per_epoch()),
                seeds: vec![],
                position: 0,
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Balanced { .. } => "balanced",
            Self::Shuffled { .. } => "shuffled",
            Self::Sequential { .. } => "sequential",
        }
    }

    pub fn next_batch(&mut self, rng: &mut StdRng, ctx: &GeneratorContext) -> Result<BatchPlan> {
        let plan = match self {
            Self::Balanced { batch_size } => {
                let table = ctx
                    .class_table()
                    .as_ref()
                    .ok_or_else(|| format_err!("balanced sampling requires class ids"))?;
                let classes: Vec<usize> = table.distinct_classes().collect();

                let batch_classes: Vec<usize> = (0..*batch_size)
                    .map(|_| classes[rng.gen_range(0..classes.len())])
                    .collect();
                let indices: Vec<usize> = batch_classes
                    .into_iter()
                    .map(|class| {
                        let members = table.members(class);
                        members[rng.gen_range(0..members.len())]
                    })
                    .collect();
                let seeds = draw_seeds(rng, indices.len());

                BatchPlan { indices, seeds }
            }
            Self::Shuffled {
                batch_size,
                order,
                seeds,
                cursor,
                lap,
            } => {
                let mut plan = BatchPlan {
                    indices: Vec::with_capacity(*batch_size),
                    seeds: Vec::with_capacity(*batch_size),
                };

                while plan.len() < *batch_size {
                    if *cursor == order.len() {
                        order.shuffle(rng);
                        *seeds = draw_seeds(rng, order.len());
                        *cursor = 0;
                        *lap += 1;
                        debug!("start lap {} of {} samples", lap, order.len());
                    }

                    let take = (*batch_size - plan.len()).min(order.len() - *cursor);
                    let range = *cursor..(*cursor + take);
                    plan.indices.extend_from_slice(&order[range.clone()]);
                    plan.seeds.extend_from_slice(&seeds[range]);
                    *cursor += take;
                }

                plan
            }
            Self::Sequential {
                chunks,
                seeds,
                position,
            } => {
                if *position == 0 {
                    *seeds = draw_seeds(rng, ctx.sample_count());
                }

                let range = chunks[*position].clone();
                *position = (*position + 1) % chunks.len();

                BatchPlan {
                    indices: range.clone().collect(),
                    seeds: seeds[range].to_vec(),
                }
            }
        };

        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::GeneratorContextInit,
        dataset::Dataset,
        value::Column,
    };

    fn context(labels: &[f32], batch_size: usize, shuffle: bool, balanced: bool) -> GeneratorContext {
        let x = Column::single(labels.iter().map(|_| 0.0f32));
        let y = Column::single(labels.iter().copied());
        GeneratorContextInit {
            dataset: Arc::new(Dataset::new(x).with_labels(y)),
            batch_size,
            shuffle,
            data_augmentation: false,
            seed: Some(42),
            balanced,
        }
        .build()
        .unwrap()
    }

    #[test]
    fn array_split_sizes() {
        let sizes: Vec<_> = array_split(10, 4).into_iter().map(|range| range.len()).collect();
        assert_eq!(sizes, vec![3, 3, 2, 2]);
        let sizes: Vec<_> = array_split(4, 4).into_iter().map(|range| range.len()).collect();
        assert_eq!(sizes, vec![1, 1, 1, 1]);
    }

    #[test]
    fn sequential_laps_cover_all_samples() {
        let ctx = context(&[0.0; 10], 3, false, false);
        let mut rng = ctx.new_rng();
        let mut schedule = Schedule::new(&ctx);
        assert_eq!(ctx.steps_per_epoch(), 4);

        let first_lap: Vec<BatchPlan> = (0..4)
            .map(|_| schedule.next_batch(&mut rng, &ctx).unwrap())
            .collect();
        let indices: Vec<usize> = first_lap
            .iter()
            .flat_map(|plan| plan.indices.iter().copied())
            .collect();
        assert_eq!(indices, (0..10).collect::<Vec<_>>());
        assert!(first_lap.iter().all(|plan| plan.len() <= 3));

        let second = schedule.next_batch(&mut rng, &ctx).unwrap();
        assert_eq!(second.indices, first_lap[0].indices);
        assert!(second.seeds.iter().all(|&seed| seed < SEED_BOUND));
    }

    #[test]
    fn shuffled_laps_are_permutations() {
        let ctx = context(&[0.0; 7], 3, true, false);
        let mut rng = ctx.new_rng();
        let mut schedule = Schedule::new(&ctx);

        let indices: Vec<usize> = (0..7)
            .flat_map(|_| schedule.next_batch(&mut rng, &ctx).unwrap().indices)
            .collect();
        assert_eq!(indices.len(), 21);

        indices.chunks(7).for_each(|lap| {
            let mut lap = lap.to_vec();
            lap.sort_unstable();
            assert_eq!(lap, (0..7).collect::<Vec<_>>());
        });
    }

    #[test]
    fn balanced_batches_are_full_and_uniform() {
        let labels: Vec<f32> = iter::repeat(0.0)
            .take(90)
            .chain(iter::repeat(1.0).take(10))
            .collect();
        let ctx = context(&labels, 16, true, true);
        let mut rng = ctx.new_rng();
        let mut schedule = Schedule::new(&ctx);

        let mut counts = [0usize; 2];
        (0..200).for_each(|_| {
            let plan = schedule.next_batch(&mut rng, &ctx).unwrap();
            assert_eq!(plan.len(), 16);
            assert_eq!(plan.seeds.len(), 16);
            plan.indices
                .iter()
                .for_each(|&index| counts[usize::from(index >= 90)] += 1);
        });

        let ratio = counts[1] as f64 / (counts[0] + counts[1]) as f64;
        assert!((ratio - 0.5).abs() < 0.05, "class ratio {}", ratio);
    }

    #[test]
    fn same_seed_same_schedule() {
        let ctx = context(&[0.0; 9], 4, true, false);
        let run = || {
            let mut rng = ctx.new_rng();
            let mut schedule = Schedule::new(&ctx);
            (0..5)
                .map(|_| schedule.next_batch(&mut rng, &ctx).unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }
}
