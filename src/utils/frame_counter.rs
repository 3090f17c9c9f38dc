use std::collections::VecDeque;

const DEFAULT_RUNNING_SIZE: usize = 60;

/// Running average over the timestamps handed to [`Renderer::draw_views`](crate::Renderer::draw_views).
#[derive(Debug, Clone, Default)]
pub struct FrameCounter {
    last_time: Option<f64>,
    frame_times: VecDeque<f32>,
}

impl FrameCounter {
    pub fn new_frame(&mut self, delta_time: f32) {
        if self.frame_times.len() >= DEFAULT_RUNNING_SIZE {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(delta_time);
    }

    /// Feeds an absolute frame timestamp in seconds. The first timestamp only primes the counter.
    pub fn new_frame_at(&mut self, time: f64) {
        if let Some(last) = self.last_time.replace(time) {
            let delta = (time - last).max(0.0) as f32;
            self.new_frame(delta);
        }
    }

    pub fn mean_delta_time(&self) -> f32 {
        if self.frame_times.is_empty() {
            return 0.0;
        }
        self.frame_times.iter().sum::<f32>() / self.frame_times.len() as f32
    }

    pub fn fps(&self) -> u32 {
        let mean = self.mean_delta_time();
        if mean <= f32::EPSILON {
            return 0;
        }
        (1.0 / mean) as u32
    }
}
