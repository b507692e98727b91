//! Synthetic text the loop writes back into the conversation.

use crate::config::SegmentMarkers;
use crate::error::ToolcodeError;
use crate::types::Turn;

/// Alert appended to feedback produced on the last permitted cycle.
pub const LAST_CYCLE_WARNING: &str =
    "YOU HAVE REACHED THE MAXIMUM ITERATION COST. OUTPUT YOUR FINAL RESPONSE NOW.";

/// Info event text for a generation that ended without the terminal marker.
pub const NO_RESPONSE_INFO: &str = "<Detected no response tag>";

/// Feedback for one sandbox run. It closes the assistant turn that made the
/// call and is recorded in the trajectory.
pub fn tool_feedback(
    markers: &SegmentMarkers,
    result: &Result<String, ToolcodeError>,
    final_cycle: bool,
) -> String {
    let mut text = markers.feedback_header.clone();
    match result {
        Ok(body) => {
            text.push_str("\nTool Result:\n");
            text.push_str(body);
        }
        Err(err) => {
            text.push_str("\nTool Error:\n");
            text.push_str(&err.to_string());
        }
    }
    if final_cycle {
        text.push('\n');
        text.push_str(&markers.alert_header);
        text.push('\n');
        text.push_str(LAST_CYCLE_WARNING);
    }
    text
}

/// User turn sent after every tool call.
pub fn continue_instruction(markers: &SegmentMarkers) -> String {
    format!(
        "{}\ncontinue ReAct processing by using `{}`",
        markers.feedback_header, markers.think_header
    )
}

/// User turn sent after a generation that neither called a tool nor answered.
pub fn corrective_alert(markers: &SegmentMarkers) -> String {
    format!(
        "{alert}\nNo `{resp}` tag detected in the response. This response is invalid. \
         Please ensure your final response includes the `{resp}` tag and try again.",
        alert = markers.alert_header,
        resp = markers.response_header,
    )
}

/// Validate a user turn and prefix the user header when it is missing.
pub fn prepare_user_turn(markers: &SegmentMarkers, mut turn: Turn) -> Result<Turn, ToolcodeError> {
    if !turn.is_user() {
        return Err(ToolcodeError::InvalidArgument(format!(
            "input turn must have role user, got {}",
            turn.role
        )));
    }
    if let Some(header) = &markers.user_header {
        if !turn.text.starts_with(header.as_str()) {
            turn.text = format!("{header}\n{}", turn.text);
        }
    }
    Ok(turn)
}
