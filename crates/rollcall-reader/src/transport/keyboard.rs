//! Keyboard-wedge adapter.

use super::{AdapterContext, AdapterEvent, read_error};
use crate::framing::RawInput;
use rollcall_hardware::{AnyKeySource, KeyEvent, KeySource};
use tracing::{debug, warn};

/// Translate a key-down event into framing input.
///
/// Events with ctrl, alt or meta held are shortcuts, not reader output.
/// Enter terminates; single printable characters are forwarded; named keys
/// such as `Shift` or `ArrowLeft` are ignored.
pub fn translate(event: &KeyEvent) -> Option<RawInput> {
    if event.has_modifier() {
        return None;
    }

    if event.is_enter() {
        return Some(RawInput::Terminator);
    }

    let mut chars = event.key.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if !c.is_control() => Some(RawInput::Char(c)),
        _ => None,
    }
}

/// Pump key events until the session is cancelled or the source closes.
///
/// Forwarded events are consumed so they do not also land in whatever input
/// field has focus.
pub(crate) async fn run(mut source: AnyKeySource, ctx: AdapterContext) -> AnyKeySource {
    debug!(session = ctx.session, "Keyboard adapter started");

    loop {
        let event = tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => break,
            event = source.next_event() => event,
        };

        match event {
            Ok(event) => {
                let Some(input) = translate(&event) else {
                    continue;
                };
                source.consume(&event);
                if !ctx.forward(AdapterEvent::Input(input)).await {
                    break;
                }
            }
            Err(e) => {
                warn!(session = ctx.session, error = %e, "Keyboard source closed");
                ctx.fail(read_error(e), true).await;
                break;
            }
        }
    }

    debug!(session = ctx.session, "Keyboard adapter stopped");
    source
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(KeyEvent::char('a'), Some(RawInput::Char('a')))]
    #[case(KeyEvent::char('7'), Some(RawInput::Char('7')))]
    #[case(KeyEvent::enter(), Some(RawInput::Terminator))]
    #[case(KeyEvent::char('c').with_ctrl(), None)]
    #[case(KeyEvent::char('v').with_meta(), None)]
    #[case(KeyEvent::enter().with_alt(), None)]
    #[case(KeyEvent::new("Shift"), None)]
    #[case(KeyEvent::new("Tab"), None)]
    #[case(KeyEvent::new("ArrowLeft"), None)]
    #[case(KeyEvent::new(""), None)]
    fn test_translate(#[case] event: KeyEvent, #[case] expected: Option<RawInput>) {
        assert_eq!(translate(&event), expected);
    }
}
