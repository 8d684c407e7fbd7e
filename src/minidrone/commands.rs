//! Minidrone Command Sender
//!
//! Encodes piloting commands into frames and writes them to the link.

use crate::transport::Link;
use anyhow::Result;
use minidrone_shared::piloting::clamp_magnitude;
use minidrone_shared::{ArCommand, FlipDirection, FrameEncoder, Pcmd};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Sends commands to the drone over its link
pub struct CommandSender<L: Link> {
    link: Arc<L>,
    encoder: Mutex<FrameEncoder>,
}

impl<L: Link> CommandSender<L> {
    /// Create a new command sender
    pub fn new(link: Arc<L>) -> Self {
        Self {
            link,
            encoder: Mutex::new(FrameEncoder::new()),
        }
    }

    /// Encode and write a single command
    pub async fn send(&self, command: ArCommand) -> Result<()> {
        let frame = self.encoder.lock().await.encode(&command);
        debug!("[PILOT] -> {:?} on {} ({} bytes)", command, command.channel(), frame.len());
        self.link.write(command.channel(), frame).await
    }

    /// Ask the drone to report every state it has
    pub async fn request_all_states(&self) -> Result<()> {
        self.send(ArCommand::AllStates).await
    }

    /// Calibrate the horizontal reference
    pub async fn flat_trim(&self) -> Result<()> {
        self.send(ArCommand::FlatTrim).await
    }

    pub async fn take_off(&self) -> Result<()> {
        self.send(ArCommand::TakeOff).await
    }

    pub async fn land(&self) -> Result<()> {
        self.send(ArCommand::Land).await
    }

    /// Stop all movement and hold position
    pub async fn halt(&self) -> Result<()> {
        self.send(ArCommand::Piloting(Pcmd::stop())).await
    }

    pub async fn forward(&self, magnitude: u8) -> Result<()> {
        self.pilot(Pcmd {
            flag: true,
            pitch: percent(magnitude),
            ..Pcmd::default()
        })
        .await
    }

    pub async fn backward(&self, magnitude: u8) -> Result<()> {
        self.pilot(Pcmd {
            flag: true,
            pitch: -percent(magnitude),
            ..Pcmd::default()
        })
        .await
    }

    pub async fn right(&self, magnitude: u8) -> Result<()> {
        self.pilot(Pcmd {
            flag: true,
            roll: percent(magnitude),
            ..Pcmd::default()
        })
        .await
    }

    pub async fn left(&self, magnitude: u8) -> Result<()> {
        self.pilot(Pcmd {
            flag: true,
            roll: -percent(magnitude),
            ..Pcmd::default()
        })
        .await
    }

    pub async fn up(&self, magnitude: u8) -> Result<()> {
        self.pilot(Pcmd {
            gaz: percent(magnitude),
            ..Pcmd::default()
        })
        .await
    }

    pub async fn down(&self, magnitude: u8) -> Result<()> {
        self.pilot(Pcmd {
            gaz: -percent(magnitude),
            ..Pcmd::default()
        })
        .await
    }

    /// Spin clockwise at `speed` percent (clamped)
    pub async fn clockwise(&self, speed: u8) -> Result<()> {
        self.pilot(Pcmd {
            yaw: percent(speed),
            ..Pcmd::default()
        })
        .await
    }

    /// Spin counter-clockwise at `speed` percent (clamped)
    pub async fn counter_clockwise(&self, speed: u8) -> Result<()> {
        self.pilot(Pcmd {
            yaw: -percent(speed),
            ..Pcmd::default()
        })
        .await
    }

    pub async fn front_flip(&self) -> Result<()> {
        self.send(ArCommand::Flip(FlipDirection::Front)).await
    }

    pub async fn back_flip(&self) -> Result<()> {
        self.send(ArCommand::Flip(FlipDirection::Back)).await
    }

    pub async fn left_flip(&self) -> Result<()> {
        self.send(ArCommand::Flip(FlipDirection::Left)).await
    }

    pub async fn right_flip(&self) -> Result<()> {
        self.send(ArCommand::Flip(FlipDirection::Right)).await
    }

    async fn pilot(&self, pcmd: Pcmd) -> Result<()> {
        self.send(ArCommand::Piloting(pcmd)).await
    }
}

fn percent(magnitude: u8) -> i8 {
    // clamp_magnitude caps at 100, which always fits in an i8
    clamp_magnitude(magnitude) as i8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{LinkLog, RecordingLink};
    use minidrone_shared::piloting::{clamp_rotation, ROTATION_REQUEST, ROTATION_SCALE};
    use minidrone_shared::Channel;

    fn sender() -> (CommandSender<RecordingLink>, Arc<LinkLog>) {
        let log = Arc::new(LinkLog::default());
        let link = RecordingLink::new("AA:BB:CC:DD:EE:FF", log.clone());
        (CommandSender::new(Arc::new(link)), log)
    }

    fn only_pcmd(log: &LinkLog) -> Pcmd {
        match log.commands().as_slice() {
            [ArCommand::Piloting(pcmd)] => *pcmd,
            other => panic!("expected one PCMD, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_forward_sets_pitch() {
        let (sender, log) = sender();
        sender.forward(1).await.expect("send");

        let pcmd = only_pcmd(&log);
        assert!(pcmd.flag);
        assert_eq!(pcmd.pitch, 1);
        assert_eq!((pcmd.roll, pcmd.yaw, pcmd.gaz), (0, 0, 0));
        assert_eq!(log.writes()[0].0, Channel::Piloting);
    }

    #[tokio::test]
    async fn test_magnitude_is_clamped() {
        let (sender, log) = sender();
        sender.down(u8::MAX).await.expect("send");
        assert_eq!(only_pcmd(&log).gaz, -100);
    }

    #[tokio::test]
    async fn test_spin_keys_send_clamped_rotation() {
        let (sender, log) = sender();
        let speed = clamp_rotation(ROTATION_REQUEST, ROTATION_SCALE);
        sender.counter_clockwise(speed).await.expect("send");
        assert_eq!(only_pcmd(&log).yaw, -100);
    }

    #[tokio::test]
    async fn test_halt_sends_stop() {
        let (sender, log) = sender();
        sender.halt().await.expect("send");
        assert!(only_pcmd(&log).is_stop());
    }

    #[tokio::test]
    async fn test_flip_and_land_use_command_channel() {
        let (sender, log) = sender();
        sender.right_flip().await.expect("send");
        sender.land().await.expect("send");

        assert_eq!(
            log.commands(),
            vec![ArCommand::Flip(FlipDirection::Right), ArCommand::Land]
        );
        assert!(log.writes().iter().all(|(channel, _)| *channel == Channel::Command));
        // Sequence numbers advance per channel
        assert_eq!(log.writes()[0].1[1], 1);
        assert_eq!(log.writes()[1].1[1], 2);
    }
}
