use std::fmt;

use crate::record::{Field, Op, RecordResult, Tuple};

/// Comparison of an indexed key against a constant, e.g. `key >= 10`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPredicate {
    op: Op,
    operand: Field,
}

impl AccessPredicate {
    pub fn new(op: Op, operand: Field) -> Self {
        Self { op, operand }
    }

    pub fn equals(operand: Field) -> Self {
        Self::new(Op::Equals, operand)
    }

    pub fn op(&self) -> Op {
        self.op
    }

    pub fn operand(&self) -> &Field {
        &self.operand
    }

    /// Equality can be answered from a single bucket chain
    pub fn is_point_lookup(&self) -> bool {
        self.op == Op::Equals
    }

    /// Evaluate `key <op> operand`
    pub fn matches(&self, key: &Field) -> RecordResult<bool> {
        key.compare(self.op, &self.operand)
    }

    /// Evaluate against field `field` of `tuple`
    pub fn filter(&self, tuple: &Tuple, field: usize) -> RecordResult<bool> {
        self.matches(tuple.field(field)?)
    }
}

impl fmt::Display for AccessPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "key {} {}", self.op, self.operand)
    }
}
