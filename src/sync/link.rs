//! Connection to the live-editing collaborator.
//!
//! The editor drives transport (pause/resume/seek) and edits keys while the
//! demo runs. The wire protocol lives outside this crate; whatever speaks it
//! forwards decoded commands through a crossbeam channel, and the frame loop
//! drains that channel once per frame.

use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use serde::{Deserialize, Serialize};
use crate::playback::transport::TransportControl;
use crate::sync::timeline::{TimelineEvaluator, TrackEdit};

/// Command sent by the editor.
///
/// Bridges decode it from JSON, e.g. `{"set_row": 32}` or
/// `{"edit": {"delete_key": {"track": "part", "row": 8}}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditorCommand {
    Pause(bool),
    SetRow(i32),
    Edit(TrackEdit),
}

/// Per-frame hook giving the editor a chance to drive transport and tracks
pub trait EditorLink {
    /// Called once per frame with the integer row about to be rendered
    fn poll(&mut self, row: i32, transport: &mut dyn TransportControl, timeline: &mut TimelineEvaluator);

    /// Whether this link is operating in live-editing mode
    fn is_live(&self) -> bool;
}

/// Standalone playback: no editor, polling is a no-op
#[derive(Debug, Default, Clone, Copy)]
pub struct Standalone;

impl EditorLink for Standalone {
    fn poll(&mut self, _row: i32, _transport: &mut dyn TransportControl, _timeline: &mut TimelineEvaluator) {}

    fn is_live(&self) -> bool {
        false
    }
}

/// Editor side of a channel link
pub struct EditorEndpoint {
    pub commands: Sender<EditorCommand>,
    /// Rows reported back while playing, so the editor can follow the playhead
    pub rows: Receiver<i32>,
}

/// Live link fed by a command channel
pub struct ChannelLink {
    commands: Receiver<EditorCommand>,
    rows: Sender<i32>,
    last_row: Option<i32>,
    connected: bool,
}

/// Create a connected link/endpoint pair
pub fn channel_link() -> (ChannelLink, EditorEndpoint) {
    let (command_tx, command_rx) = channel::unbounded();
    let (row_tx, row_rx) = channel::unbounded();

    (
        ChannelLink {
            commands: command_rx,
            rows: row_tx,
            last_row: None,
            connected: true,
        },
        EditorEndpoint {
            commands: command_tx,
            rows: row_rx,
        },
    )
}

impl ChannelLink {
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn disconnect(&mut self) {
        if self.connected {
            tracing::warn!("editor disconnected, continuing without live edits");
            self.connected = false;
        }
    }
}

impl EditorLink for ChannelLink {
    fn poll(&mut self, row: i32, transport: &mut dyn TransportControl, timeline: &mut TimelineEvaluator) {
        if !self.connected {
            return;
        }

        loop {
            match self.commands.try_recv() {
                Ok(EditorCommand::Pause(paused)) => transport.set_paused(paused),
                Ok(EditorCommand::SetRow(target)) => transport.set_position(target),
                Ok(EditorCommand::Edit(edit)) => timeline.apply(&edit),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.disconnect();
                    return;
                }
            }
        }

        if transport.is_playing() && self.last_row != Some(row) {
            if self.rows.send(row).is_err() {
                self.disconnect();
            }
            self.last_row = Some(row);
        }
    }

    fn is_live(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::track::{Interpolation, Keyframe, Track};

    #[derive(Default)]
    struct FakeTransport {
        paused: bool,
        position: Option<i32>,
    }

    impl TransportControl for FakeTransport {
        fn set_paused(&mut self, paused: bool) {
            self.paused = paused;
        }

        fn set_position(&mut self, row: i32) {
            self.position = Some(row);
        }

        fn is_playing(&self) -> bool {
            !self.paused
        }
    }

    #[test]
    fn test_standalone_is_noop() {
        let mut transport = FakeTransport::default();
        let mut timeline = TimelineEvaluator::new();
        let mut link = Standalone;
        link.poll(10, &mut transport, &mut timeline);
        assert!(!link.is_live());
        assert!(!transport.paused);
        assert_eq!(transport.position, None);
    }

    #[test]
    fn test_commands_drive_transport() {
        let (mut link, endpoint) = channel_link();
        let mut transport = FakeTransport::default();
        let mut timeline = TimelineEvaluator::new();

        endpoint.commands.send(EditorCommand::Pause(true)).unwrap();
        endpoint.commands.send(EditorCommand::SetRow(128)).unwrap();
        link.poll(0, &mut transport, &mut timeline);

        assert!(transport.paused);
        assert_eq!(transport.position, Some(128));
        // Paused transport does not report rows
        assert!(endpoint.rows.try_recv().is_err());
    }

    #[test]
    fn test_edits_apply_to_timeline() {
        let (mut link, endpoint) = channel_link();
        let mut transport = FakeTransport::default();
        let mut timeline = TimelineEvaluator::new();
        let handle = timeline.insert(Track::new("cm.fade"));

        endpoint
            .commands
            .send(EditorCommand::Edit(TrackEdit::SetKey {
                track: "cm.fade".into(),
                key: Keyframe::new(0, 1.0, Interpolation::Step),
            }))
            .unwrap();
        link.poll(3, &mut transport, &mut timeline);

        assert_eq!(timeline.evaluate(handle, 3.0), 1.0);
    }

    #[test]
    fn test_reports_each_row_once_while_playing() {
        let (mut link, endpoint) = channel_link();
        let mut transport = FakeTransport::default();
        let mut timeline = TimelineEvaluator::new();

        link.poll(4, &mut transport, &mut timeline);
        link.poll(4, &mut transport, &mut timeline);
        link.poll(5, &mut transport, &mut timeline);

        let rows: Vec<i32> = endpoint.rows.try_iter().collect();
        assert_eq!(rows, vec![4, 5]);
    }

    #[test]
    fn test_disconnect_degrades_to_standalone() {
        let (mut link, endpoint) = channel_link();
        drop(endpoint);
        let mut transport = FakeTransport::default();
        let mut timeline = TimelineEvaluator::new();

        link.poll(1, &mut transport, &mut timeline);
        assert!(!link.is_connected());
        link.poll(2, &mut transport, &mut timeline);
        assert_eq!(transport.position, None);
    }

    #[test]
    fn test_commands_decode_from_json() {
        let pause: EditorCommand = serde_json::from_str(r#"{"pause": true}"#).unwrap();
        assert_eq!(pause, EditorCommand::Pause(true));

        let edit: EditorCommand = serde_json::from_str(
            r#"{"edit": {"set_key": {"track": "cam.dist", "key": {"row": 4, "value": 2.5, "interp": "smooth"}}}}"#,
        )
        .unwrap();
        assert_eq!(
            edit,
            EditorCommand::Edit(TrackEdit::SetKey {
                track: "cam.dist".into(),
                key: Keyframe::new(4, 2.5, Interpolation::Smooth),
            })
        );
    }
}
