//! Classification of hosted-API responses.

use serde_json::Value;

use crate::domain::error::{ConvoyError, Result};

/// Outcome of classifying one HTTP response from the hosted API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Classified {
    /// A successful response with its JSON payload.
    Success(Value),
    /// The one benign rejection: a pull request with nothing to merge.
    NoOpMerge { message: String },
}

/// Classify `status` + `body`.
///
/// A `422 Validation Failed` whose body carries a single
/// `PullRequest`/`custom` error is the hosted API's way of saying there are
/// no commits between the branches; that is a no-op, not a failure. Any other
/// non-success response is a hard [`ConvoyError::RemoteRejected`].
pub(crate) fn classify(status: u16, body: Value) -> Result<Classified> {
    if (200..300).contains(&status) {
        return Ok(Classified::Success(body));
    }

    if status == 422 {
        if let Some(message) = no_op_merge_message(&body) {
            return Ok(Classified::NoOpMerge { message });
        }
    }

    Err(ConvoyError::RemoteRejected {
        status,
        body: body.to_string(),
    })
}

/// Extract the error message iff `body` has the exact "no commits between
/// branches" validation shape.
fn no_op_merge_message(body: &Value) -> Option<String> {
    if body.get("message")?.as_str()? != "Validation Failed" {
        return None;
    }
    let errors = body.get("errors")?.as_array()?;
    if errors.len() != 1 {
        return None;
    }
    let error = &errors[0];
    if error.get("resource")?.as_str()? != "PullRequest" {
        return None;
    }
    if error.get("code")?.as_str()? != "custom" {
        return None;
    }
    Some(error.get("message")?.as_str()?.to_string())
}
