//! `AdvanceIndex` (spec §4.6): increments `current_step_index`, nothing
//! else. Exists as its own node purely so `Verifier`'s `ok`-with-more-work
//! routing has one clean destination, keeping the Verifier itself free
//! of state mutation beyond its own result.

use crate::error::Result;
use crate::state::FinanceState;

use super::NodeContext;

pub async fn run(_ctx: &NodeContext, state: &mut FinanceState) -> Result<()> {
    state.current_step_index += 1;
    state.log("AdvanceIndex", format!("advanced to step {}", state.current_step_index));
    Ok(())
}
