//! Snowfall driven by a cyclic storm schedule
//!
//! Every tick the current storm phase adds `base_rate * intensity * dt` of snow
//! to each segment except the exempt ones. Plows are the only thing that ever
//! removes snow.

use anyhow::Result;
use log::info;

use super::road_network::SimRoadNetwork;
use super::types::SegmentId;

/// One named interval of the weather cycle
#[derive(Debug, Clone, PartialEq)]
pub struct StormPhase {
    pub name: String,
    /// Seconds the phase lasts
    pub duration: f32,
    /// Multiplier on the base snowfall rate
    pub intensity: f32,
}

impl StormPhase {
    pub fn new(name: &str, duration: f32, intensity: f32) -> Self {
        Self {
            name: name.to_string(),
            duration,
            intensity,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SnowLayer {
    phases: Vec<StormPhase>,
    phase_index: usize,
    phase_timer: f32,
    /// Accumulation per second at intensity 1.0
    base_rate: f32,
    /// Segments that never receive snow
    exempt: Vec<SegmentId>,
}

impl SnowLayer {
    pub fn new(phases: Vec<StormPhase>, base_rate: f32) -> Self {
        Self {
            phases,
            phase_index: 0,
            phase_timer: 0.0,
            base_rate,
            exempt: Vec::new(),
        }
    }

    /// Never accumulate snow on `segment`
    pub fn with_exempt(mut self, segment: SegmentId) -> Self {
        self.exempt.push(segment);
        self
    }

    pub fn exempt_segments(&self) -> &[SegmentId] {
        &self.exempt
    }

    pub fn current_phase(&self) -> Option<&StormPhase> {
        self.phases.get(self.phase_index)
    }

    pub fn phase_name(&self) -> &str {
        self.current_phase().map_or("None", |phase| phase.name.as_str())
    }

    /// Intensity of the current phase; an empty schedule means no snow
    pub fn intensity(&self) -> f32 {
        self.current_phase().map_or(0.0, |phase| phase.intensity)
    }

    /// Seconds spent in the current phase so far
    pub fn phase_elapsed(&self) -> f32 {
        self.phase_timer
    }

    pub fn tick(&mut self, delta_secs: f32, network: &mut SimRoadNetwork) -> Result<()> {
        // The phase in force when the tick starts covers the whole tick
        let amount = self.base_rate * self.intensity() * delta_secs;
        self.advance_phase(delta_secs);

        if amount <= 0.0 {
            return Ok(());
        }

        for index in 0..network.segment_count() {
            let segment = SegmentId(index);
            if self.exempt.contains(&segment) {
                continue;
            }
            network.accumulate(segment, amount)?;
        }
        Ok(())
    }

    fn advance_phase(&mut self, delta_secs: f32) {
        let Some(phase) = self.phases.get(self.phase_index) else {
            return;
        };

        self.phase_timer += delta_secs;
        if self.phase_timer > phase.duration {
            self.phase_timer = 0.0;
            self.phase_index = (self.phase_index + 1) % self.phases.len();
            info!(
                "Storm phase changed to {} (intensity {:.1})",
                self.phase_name(),
                self.intensity()
            );
        }
    }
}
