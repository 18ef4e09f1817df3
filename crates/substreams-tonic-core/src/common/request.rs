//! Assembly of the outbound `Blocks` request.
//!
//! The request always carries the package's complete module set: output
//! module selection only narrows which modules' results are emitted, not which
//! ones the service evaluates. The fork-step filter is fixed to
//! [`ForkStep::StepIrreversible`] so only finalized blocks are delivered and
//! the output never contains data that may later be undone.

use crate::{
    Error, Result,
    proto::{ForkStep, Package, Request},
    types::RequestedRange,
};

/// Fork steps requested by every session.
pub const FORK_STEPS: [ForkStep; 1] = [ForkStep::StepIrreversible];

/// Builds the `Blocks` request for `package` over `range`, emitting the
/// results of `output_modules`.
///
/// `output_modules` is copied as-is: order is preserved and duplicates are
/// left for the service to judge.
pub fn build_request(
    package: &Package,
    range: &RequestedRange,
    output_modules: &[String],
) -> Result<Request> {
    if output_modules.is_empty() {
        return Err(Error::invalid_config(
            "at least one output module is required",
        ));
    }

    Ok(Request {
        start_block_num: range.wire_start(),
        stop_block_num: range.wire_stop(),
        fork_steps: FORK_STEPS.iter().map(|step| *step as i32).collect(),
        modules: package.modules.clone(),
        output_modules: output_modules.to_vec(),
        ..Default::default()
    })
}
