use pyo3::pymodule;

mod audio_engine;
mod messages;
pub mod sequencer;

/// The Python module implemented in Rust.
#[pymodule]
mod pad_sequencer_audio {
    #[pymodule_export]
    use super::audio_engine::AudioEngine;

    #[pymodule_export]
    use super::messages::AudioMessage;
}
