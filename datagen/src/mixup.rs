//! Mixing two batch streams.

use crate::{
    batch::{Batch, BatchData, Stacked},
    common::*,
};

/// Blend the batches of two streams pairwise.
///
/// For each pair a ratio `m` is drawn from `Beta(alpha, beta)` and every
/// array of the batch becomes `m * first + (1 - m) * second`. Both batches
/// must carry labels and agree on the arity.
pub fn mixup<I, J>(
    first: I,
    second: J,
    alpha: f64,
    beta: f64,
    seed: Option<u64>,
) -> Result<MixupStream<I::IntoIter, J::IntoIter>>
where
    I: IntoIterator<Item = Result<Batch>>,
    J: IntoIterator<Item = Result<Batch>>,
{
    let distribution = Beta::new(alpha, beta)
        .with_context(|| format!("invalid beta parameters ({}, {})", alpha, beta))?;
    let rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    Ok(MixupStream {
        first: first.into_iter(),
        second: second.into_iter(),
        distribution,
        rng,
    })
}

/// The stream returned by [mixup]. It ends when either input ends.
#[derive(Debug)]
pub struct MixupStream<I, J> {
    first: I,
    second: J,
    distribution: Beta<f64>,
    rng: StdRng,
}

impl<I, J> MixupStream<I, J> {
    fn mix(&mut self, lhs: Batch, rhs: Batch) -> Result<Batch> {
        let arity = lhs.arity();
        ensure!(
            arity == rhs.arity(),
            "cannot mix batches of arity {} and {}",
            arity,
            rhs.arity()
        );
        ensure!(
            arity == 2 || arity == 3,
            "mixed batches must have labels, but get arity {}",
            arity
        );

        let ratio = self.distribution.sample(&mut self.rng);
        assert!(
            (0.0..=1.0).contains(&ratio),
            "mixup ratio {} is out of range",
            ratio
        );
        let ratio = ratio as f32;

        let Batch {
            x: lx,
            y: ly,
            w: lw,
        } = lhs;
        let Batch {
            x: rx,
            y: ry,
            w: rw,
        } = rhs;

        let x = mix_stacked(lx, rx, ratio).with_context(|| "failed to mix inputs")?;
        let y = match (ly, ry) {
            (Some(ly), Some(ry)) => {
                Some(mix_stacked(ly, ry, ratio).with_context(|| "failed to mix labels")?)
            }
            _ => bail!("mixed batches must have labels"),
        };
        let w = match (lw, rw) {
            (Some(lw), Some(rw)) => {
                ensure!(lw.len() == rw.len(), "weight lengths differ");
                Some(lw * ratio + rw * (1.0 - ratio))
            }
            (None, None) => None,
            _ => bail!("only one of the batches has weights"),
        };

        Ok(Batch { x, y, w })
    }
}

fn mix_data(lhs: BatchData, rhs: BatchData, ratio: f32) -> Result<BatchData> {
    match (lhs, rhs) {
        (BatchData::Array(lhs), BatchData::Array(rhs)) => {
            ensure!(
                lhs.shape() == rhs.shape(),
                "cannot mix arrays of shape {:?} and {:?}",
                lhs.shape(),
                rhs.shape()
            );
            Ok(BatchData::Array(lhs * ratio + rhs * (1.0 - ratio)))
        }
        _ => bail!("only stacked arrays can be mixed"),
    }
}

fn mix_stacked(lhs: Stacked, rhs: Stacked, ratio: f32) -> Result<Stacked> {
    match (lhs, rhs) {
        (Stacked::Single(lhs), Stacked::Single(rhs)) => {
            Ok(Stacked::Single(mix_data(lhs, rhs, ratio)?))
        }
        (Stacked::Multiple(lhs), Stacked::Multiple(rhs)) => {
            ensure!(
                lhs.len() == rhs.len(),
                "cannot mix {} and {} positions",
                lhs.len(),
                rhs.len()
            );
            let data = izip!(lhs, rhs)
                .map(|(lhs, rhs)| mix_data(lhs, rhs, ratio))
                .collect::<Result<_>>()?;
            Ok(Stacked::Multiple(data))
        }
        _ => bail!("cannot mix single and multiple batch data"),
    }
}

impl<I, J> Iterator for MixupStream<I, J>
where
    I: Iterator<Item = Result<Batch>>,
    J: Iterator<Item = Result<Batch>>,
{
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        let lhs = self.first.next()?;
        let rhs = self.second.next()?;

        Some(lhs.and_then(|lhs| rhs.and_then(|rhs| self.mix(lhs, rhs))))
    }
}
