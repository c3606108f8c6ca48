use crate::messages::{PlayRequest, SampleBuffer};

/// One mixer voice: a sample with a start frame and a play position.
pub struct VoiceSlot {
    pub active: bool,
    pub sample_id: usize,
    pub sample: Option<SampleBuffer>,
    /// Output frame on which the voice becomes audible.
    pub start_frame: u64,
    /// Next frame of the sample to play.
    pub frame_pos: usize,
    /// Frames left before the voice stops, if cut short.
    pub frames_remaining: Option<usize>,
    pub volume: f32,
}

impl VoiceSlot {
    pub fn new() -> Self {
        Self {
            active: false,
            sample_id: 0,
            sample: None,
            start_frame: 0,
            frame_pos: 0,
            frames_remaining: None,
            volume: 0.0,
        }
    }

    /// Arms the voice. A request without a start frame starts on `now_frame`.
    pub fn start(&mut self, sample: SampleBuffer, request: &PlayRequest, now_frame: u64) {
        self.active = true;
        self.sample_id = request.id;
        self.sample = Some(sample);
        self.start_frame = request.start_frame.unwrap_or(now_frame);
        self.frame_pos = request.offset_frames;
        self.frames_remaining = request.duration_frames;
        self.volume = request.volume;
    }

    pub fn stop(&mut self) {
        self.active = false;
        self.sample = None;
        self.start_frame = 0;
        self.frame_pos = 0;
        self.frames_remaining = None;
        self.volume = 0.0;
    }

    pub fn is_playing_sample(&self, sample_id: usize) -> bool {
        self.active && self.sample_id == sample_id
    }

    /// Whether the voice is still waiting for its start frame at `frame`.
    pub fn is_pending_at(&self, frame: u64) -> bool {
        self.active && self.start_frame > frame
    }

    /// Whether there is nothing left to play from a sample of `sample_frames` frames.
    pub fn is_exhausted(&self, sample_frames: usize) -> bool {
        self.frame_pos >= sample_frames || self.frames_remaining == Some(0)
    }
}

impl Default for VoiceSlot {
    fn default() -> Self {
        Self::new()
    }
}
