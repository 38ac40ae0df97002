//! A fixed-length, indexable view over a batch stream factory.

use crate::common::*;
use itertools::Either;

/// Exposes `steps` batches per epoch from streams made by `factory`.
///
/// `get` ignores the index beyond the range check and returns the next item
/// of one live stream, created lazily on the first call.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct GeneratorSequence<F, I> {
    #[derivative(Debug = "ignore")]
    factory: F,
    #[derivative(Debug = "ignore")]
    live: Option<I>,
    steps: usize,
}

impl<F, I, T> GeneratorSequence<F, I>
where
    F: FnMut() -> Result<I>,
    I: Iterator<Item = Result<T>>,
{
    pub fn new(factory: F, steps: usize) -> Self {
        Self {
            factory,
            live: None,
            steps,
        }
    }

    pub fn len(&self) -> usize {
        self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps == 0
    }

    pub fn get(&mut self, index: usize) -> Result<T> {
        ensure!(
            index < self.steps,
            "index {} is out of range for {} steps",
            index,
            self.steps
        );

        if self.live.is_none() {
            self.live = Some((self.factory)()?);
        }
        let live = self
            .live
            .as_mut()
            .ok_or_else(|| format_err!("no live batch stream"))?;
        live.next()
            .ok_or_else(|| format_err!("the batch stream ended before step {}", index))?
    }

    /// An endless stream chaining fresh streams from the factory.
    ///
    /// A factory failure is yielded once as an error item and ends the stream.
    pub fn iter<'a>(&'a mut self) -> impl Iterator<Item = Result<T>> + 'a
    where
        T: 'a,
    {
        let factory = &mut self.factory;
        let mut failed = false;

        iter::from_fn(move || {
            if failed {
                return None;
            }
            match factory() {
                Ok(stream) => Some(Either::Left(stream)),
                Err(err) => {
                    failed = true;
                    Some(Either::Right(iter::once(Err(err))))
                }
            }
        })
        .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting(len: usize) -> impl FnMut() -> Result<std::vec::IntoIter<Result<usize>>> {
        move || Ok((0..len).map(Ok).collect::<Vec<_>>().into_iter())
    }

    #[test]
    fn get_continues_one_stream() {
        let mut seq = GeneratorSequence::new(counting(3), 3);
        assert_eq!(seq.len(), 3);
        assert_eq!(seq.get(2).unwrap(), 0);
        assert_eq!(seq.get(0).unwrap(), 1);
        assert_eq!(seq.get(1).unwrap(), 2);
        assert!(seq.get(1).is_err());
        assert!(seq.get(3).is_err());
    }

    #[test]
    fn iter_restarts_streams() {
        let mut seq = GeneratorSequence::new(counting(2), 2);
        let values: Vec<usize> = seq.iter().take(5).map(|value| value.unwrap()).collect();
        assert_eq!(values, vec![0, 1, 0, 1, 0]);
    }
}
