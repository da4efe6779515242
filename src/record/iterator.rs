use super::error::{RecordError, RecordResult};
use super::tuple::Tuple;

/// Restartable tuple stream consumed by relational operators.
///
/// `next` fails with `NoMoreTuples` once the stream is exhausted and with
/// `IteratorClosed` before `open` or after `close`.
pub trait DbFileIterator {
    fn open(&mut self) -> RecordResult<()>;

    fn has_next(&mut self) -> RecordResult<bool>;

    fn next(&mut self) -> RecordResult<Tuple>;

    /// Restart from the first tuple
    fn rewind(&mut self) -> RecordResult<()> {
        self.close();
        self.open()
    }

    fn close(&mut self);

    /// Drain the remaining tuples
    fn collect_tuples(&mut self) -> RecordResult<Vec<Tuple>> {
        let mut tuples = Vec::new();
        while self.has_next()? {
            tuples.push(self.next()?);
        }
        Ok(tuples)
    }
}

/// Iterator over an already materialized list of tuples
pub struct TupleListIter {
    tuples: Vec<Tuple>,
    position: Option<usize>,
}

impl TupleListIter {
    pub fn new(tuples: Vec<Tuple>) -> Self {
        Self {
            tuples,
            position: None,
        }
    }

    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }
}

impl DbFileIterator for TupleListIter {
    fn open(&mut self) -> RecordResult<()> {
        self.position = Some(0);
        Ok(())
    }

    fn has_next(&mut self) -> RecordResult<bool> {
        let position = self.position.ok_or(RecordError::IteratorClosed)?;
        Ok(position < self.tuples.len())
    }

    fn next(&mut self) -> RecordResult<Tuple> {
        let position = self.position.ok_or(RecordError::IteratorClosed)?;
        let tuple = self
            .tuples
            .get(position)
            .cloned()
            .ok_or(RecordError::NoMoreTuples)?;
        self.position = Some(position + 1);
        Ok(tuple)
    }

    fn close(&mut self) {
        self.position = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Field, TupleDesc, Type};
    use std::sync::Arc;

    fn tuples(n: i32) -> Vec<Tuple> {
        let desc = Arc::new(TupleDesc::new(vec![Type::Int]).unwrap());
        (0..n)
            .map(|i| Tuple::new(desc.clone(), vec![Field::Int(i)]).unwrap())
            .collect()
    }

    #[test]
    fn test_requires_open() {
        let mut iter = TupleListIter::new(tuples(2));
        assert!(matches!(iter.has_next(), Err(RecordError::IteratorClosed)));
        assert!(matches!(iter.next(), Err(RecordError::IteratorClosed)));
    }

    #[test]
    fn test_iterate_and_rewind() {
        let mut iter = TupleListIter::new(tuples(3));
        iter.open().unwrap();
        assert_eq!(iter.collect_tuples().unwrap(), tuples(3));
        assert!(!iter.has_next().unwrap());
        assert!(matches!(iter.next(), Err(RecordError::NoMoreTuples)));

        iter.rewind().unwrap();
        assert_eq!(iter.next().unwrap(), tuples(1)[0]);

        iter.close();
        assert!(iter.has_next().is_err());
    }
}
