//! Audio Stream Module
//!
//! This module handles CPAL audio stream management including:
//! - Stream initialization and configuration
//! - Audio callback setup
//! - Real-time message processing
//! - Publishing the rendered frame count as the engine's audio clock

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Stream, StreamConfig};
use env_logger::{Builder, Env};
use rtrb::{Consumer, Producer, RingBuffer};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::audio_engine::constants::{BUFFER_FRAMES, MESSAGE_QUEUE_CAPACITY};
use crate::audio_engine::mixer::RtMixer;
use crate::messages::{AudioMessage, ControlMessage};

/// Handle to the audio stream with associated message channels
pub struct AudioStreamHandle {
    pub stream: Stream,
    pub producer: Arc<Mutex<Producer<ControlMessage>>>,
    pub consumer: Arc<Mutex<Consumer<AudioMessage>>>,
    /// Frames rendered by the output callback so far.
    pub frames_rendered: Arc<AtomicU64>,
    pub output_channels: usize,
    pub output_sample_rate: u32,
}

/// Setup and configure the logger for audio operations
pub fn setup_logger() {
    // Users can override via `RUST_LOG`, e.g. `RUST_LOG=debug` to trace the scheduler.
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .try_init()
        .unwrap_or(()); // Ignore initialization errors
}

/// Applies one control message on the audio thread.
pub(crate) fn handle_control_message(
    mixer: &mut RtMixer,
    producer_out: &mut Producer<AudioMessage>,
    message: ControlMessage,
) {
    match message {
        ControlMessage::Ping() => {
            let _ = producer_out.push(AudioMessage::Pong());
        }
        ControlMessage::LoadSample { id, sample } => {
            mixer.load_sample(id, sample);
        }
        ControlMessage::PlaySample(request) => {
            if !mixer.play_sample(request) {
                let _ = producer_out.push(AudioMessage::VoiceDropped { id: request.id });
            }
        }
        ControlMessage::StopSample { id } => {
            mixer.stop_sample(id);
        }
        ControlMessage::StopAll() => {
            mixer.stop_all();
        }
        ControlMessage::UnloadSample { id } => {
            mixer.unload_sample(id);
        }
        ControlMessage::SetVolume(volume) => {
            mixer.set_volume(volume);
        }
    }
}

/// Create and configure the audio stream
///
/// This function:
/// 1. Sets up the default audio device
/// 2. Configures the stream with appropriate parameters
/// 3. Creates ring buffers for message passing
/// 4. Initializes the mixer and the shared frame counter
/// 5. Builds and returns the audio stream
pub fn create_audio_stream() -> Result<AudioStreamHandle, Box<dyn std::error::Error>> {
    setup_logger();

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or("No audio device found")?;

    let config = device.default_output_config()?;
    let sample_rate = config.sample_rate();
    let channels = config.channels();

    log::info!(
        "Starting AudioEngine... ({} ch@{} Hz)",
        channels,
        sample_rate
    );

    // Create ring buffer for incoming messages (control -> audio thread)
    let (producer_in, mut consumer_in) = RingBuffer::new(MESSAGE_QUEUE_CAPACITY);

    // Create ring buffer for outgoing messages (audio thread -> Python)
    let (mut producer_out, consumer_out) = RingBuffer::new(MESSAGE_QUEUE_CAPACITY);

    let mut mixer = RtMixer::new(channels as usize);
    let frames_rendered = Arc::new(AtomicU64::new(0));
    let callback_frames = Arc::clone(&frames_rendered);

    let stream_config = StreamConfig {
        channels,
        sample_rate,
        buffer_size: BufferSize::Fixed(BUFFER_FRAMES),
    };

    let stream = device.build_output_stream(
        &stream_config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            while let Ok(message) = consumer_in.pop() {
                handle_control_message(&mut mixer, &mut producer_out, message);
            }

            mixer.render(data);
            callback_frames.store(mixer.frames_rendered(), Ordering::Release);
        },
        |err| {
            log::error!("Audio stream error: {}", err);
        },
        None,
    )?;

    Ok(AudioStreamHandle {
        stream,
        producer: Arc::new(Mutex::new(producer_in)),
        consumer: Arc::new(Mutex::new(consumer_out)),
        frames_rendered,
        output_channels: channels as usize,
        output_sample_rate: sample_rate,
    })
}

/// Start playing the audio stream
pub fn start_stream(stream: &Stream) -> Result<(), Box<dyn std::error::Error>> {
    stream.play()?;
    Ok(())
}
