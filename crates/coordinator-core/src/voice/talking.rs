//! Talking edge synthesis from volume reports
//!
//! The provider reports volumes, never start/stop events, and reports nothing
//! at all for a silent participant. Edges are derived from a threshold and
//! emitted only on change; anybody not reported for the silence timeout gets
//! one synthetic "stopped talking" edge.

use std::collections::BTreeMap;
use std::time::Duration;

use super::provider::{VoiceEvent, VolumeSample};
use crate::types::VoiceUid;

#[derive(Debug, Clone)]
pub struct TalkingDetector {
    threshold: u8,
    silence_timeout: Duration,
    talking: BTreeMap<VoiceUid, bool>,
    since_last_report: BTreeMap<VoiceUid, Duration>,
}

impl TalkingDetector {
    pub fn new(threshold: u8, silence_timeout: Duration) -> Self {
        Self {
            threshold,
            silence_timeout,
            talking: BTreeMap::new(),
            since_last_report: BTreeMap::new(),
        }
    }

    pub fn is_talking(&self, uid: VoiceUid) -> bool {
        self.talking.get(&uid).copied().unwrap_or(false)
    }

    /// Apply one volume report; uid `0` is replaced by `local_uid`
    pub fn on_report(&mut self, samples: &[VolumeSample], local_uid: VoiceUid) -> Vec<VoiceEvent> {
        let mut events = Vec::new();

        for sample in samples {
            let uid = if sample.uid == 0 { local_uid } else { sample.uid };
            let talking = sample.volume >= self.threshold;

            if self.talking.get(&uid) != Some(&talking) {
                self.talking.insert(uid, talking);
                events.push(if talking {
                    VoiceEvent::StartedTalking { uid }
                } else {
                    VoiceEvent::StoppedTalking { uid }
                });
            }
            self.since_last_report.insert(uid, Duration::ZERO);
        }

        events
    }

    /// Age every participant by `dt`; silent ones stop being tracked
    pub fn tick(&mut self, dt: Duration) -> Vec<VoiceEvent> {
        let mut events = Vec::new();
        let silence_timeout = self.silence_timeout;
        let talking = &mut self.talking;

        self.since_last_report.retain(|uid, silent_for| {
            *silent_for += dt;
            if *silent_for < silence_timeout {
                return true;
            }
            if let Some(is_talking) = talking.get_mut(uid) {
                if *is_talking {
                    *is_talking = false;
                    events.push(VoiceEvent::StoppedTalking { uid: *uid });
                }
            }
            false
        });

        events
    }

    /// Forget everybody (channel left)
    pub fn reset(&mut self) {
        self.talking.clear();
        self.since_last_report.clear();
    }
}
