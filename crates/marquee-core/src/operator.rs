//! The authenticated operator driving a conduction session.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Identity as supplied by the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
  pub operator_id:  Uuid,
  pub display_name: String,
  /// Whether this operator may create or revert placements.
  pub may_conduct:  bool,
}

impl Operator {
  pub fn ensure_may_conduct(&self) -> Result<()> {
    if self.may_conduct { Ok(()) } else { Err(Error::Unauthorized(self.operator_id)) }
  }
}
