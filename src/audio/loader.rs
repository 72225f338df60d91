use std::path::Path;

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::audio::types::{AudioData, AudioFormat, Waveform};
use crate::error::{AudioError, BeatsyncError, Result};

/// Extensions decoded by symphonia rather than hound
const COMPRESSED_FORMATS: [&str; 5] = ["mp3", "flac", "ogg", "m4a", "aac"];

/// Audio file loader supporting multiple formats
pub struct AudioLoader;

impl AudioLoader {
    /// Load an audio file and return raw audio data.
    ///
    /// Decoding happens on a blocking task so async callers are not stalled.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<AudioData> {
        let path = path.as_ref().to_path_buf();
        tokio::task::spawn_blocking(move || Self::decode(&path))
            .await
            .map_err(|e| BeatsyncError::generic(format!("Decoder task failed: {}", e)))?
    }

    /// Load a file as a mono waveform at `target_rate`
    pub async fn load_waveform<P: AsRef<Path>>(path: P, target_rate: u32) -> Result<Waveform> {
        let audio = Self::load(path).await?;
        let mono = audio.mono_samples();

        tracing::info!(
            "Loaded {:.2}s of {} audio ({}, {} Hz, {} channels)",
            audio.duration,
            audio.format.extension,
            audio.format.codec,
            audio.sample_rate,
            audio.channels
        );

        let samples = if audio.sample_rate == target_rate {
            mono
        } else {
            tokio::task::spawn_blocking(move || resample(&mono, audio.sample_rate, target_rate))
                .await
                .map_err(|e| BeatsyncError::generic(format!("Resampler task failed: {}", e)))??
        };

        Waveform::new(samples, target_rate)
    }

    /// Decode a file synchronously
    pub fn decode<P: AsRef<Path>>(path: P) -> Result<AudioData> {
        let path = path.as_ref();
        let extension = Self::detect_format(path).unwrap_or_default();

        if !Self::is_format_supported(&extension) {
            return Err(AudioError::UnsupportedFormat { format: extension }.into());
        }

        let audio = if extension == "wav" {
            Self::load_wav(path)?
        } else {
            Self::load_compressed(path)?
        };

        if audio.samples.is_empty() {
            return Err(AudioError::Empty { path: path.display().to_string() }.into());
        }
        if audio.sample_rate == 0 {
            return Err(AudioError::InvalidSampleRate { sample_rate: 0 }.into());
        }
        Ok(audio)
    }

    /// Fail early when the file's format needs a decoder this build lacks
    pub fn ensure_decoder<P: AsRef<Path>>(path: P) -> Result<()> {
        match Self::detect_format(path) {
            Some(ext) => Self::require_decoder(&ext, cfg!(feature = "symphonia")),
            None => Ok(()),
        }
    }

    fn require_decoder(extension: &str, symphonia_enabled: bool) -> Result<()> {
        if COMPRESSED_FORMATS.contains(&extension) && !symphonia_enabled {
            return Err(AudioError::DecoderUnavailable {
                format: extension.to_string(),
                feature: "symphonia".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Check that every supported format can be decoded by this build
    pub fn check_decoders() -> Result<()> {
        COMPRESSED_FORMATS
            .iter()
            .try_for_each(|ext| Self::ensure_decoder(format!("probe.{}", ext)))
    }

    /// Load WAV files using the hound crate
    fn load_wav(path: &Path) -> Result<AudioData> {
        let load_failed = || AudioError::LoadFailed { path: path.display().to_string() };

        let reader = hound::WavReader::open(path).map_err(|_| load_failed())?;
        let spec = reader.spec();

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|_| load_failed())?,
            hound::SampleFormat::Int => reader
                .into_samples::<i32>()
                .map(|sample| sample.map(|s| Self::int_to_float(s, spec.bits_per_sample)))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|_| load_failed())?,
        };

        Ok(AudioData {
            duration: Self::duration_of(samples.len(), spec.sample_rate, spec.channels),
            samples,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            format: AudioFormat {
                extension: "wav".to_string(),
                codec: match spec.sample_format {
                    hound::SampleFormat::Float => format!("pcm_f{}", spec.bits_per_sample),
                    hound::SampleFormat::Int => format!("pcm_s{}", spec.bits_per_sample),
                },
            },
        })
    }

    #[cfg(feature = "symphonia")]
    fn load_compressed(path: &Path) -> Result<AudioData> {
        use symphonia::core::audio::SampleBuffer;
        use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
        use symphonia::core::errors::Error as SymphoniaError;
        use symphonia::core::formats::FormatOptions;
        use symphonia::core::io::MediaSourceStream;
        use symphonia::core::meta::MetadataOptions;
        use symphonia::core::probe::Hint;

        let load_failed = || AudioError::LoadFailed { path: path.display().to_string() };

        let file = std::fs::File::open(path).map_err(|_| load_failed())?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|_| load_failed())?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(load_failed)?;
        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|_| load_failed())?;

        let mut sample_rate = codec_params.sample_rate.unwrap_or(0);
        let mut channels = codec_params.channels.map(|c| c.count() as u16).unwrap_or(0);
        let mut samples = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                // End of stream
                Err(SymphoniaError::IoError(_)) => break,
                Err(e) => {
                    tracing::warn!("Stopping decode of {}: {}", path.display(), e);
                    break;
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    sample_rate = spec.rate;
                    channels = spec.channels.count() as u16;

                    let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    buffer.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buffer.samples());
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    tracing::debug!("Skipping undecodable packet: {}", e);
                    continue;
                }
                Err(SymphoniaError::IoError(_)) => break,
                Err(_) => return Err(load_failed().into()),
            }
        }

        Ok(AudioData {
            duration: Self::duration_of(samples.len(), sample_rate, channels),
            samples,
            sample_rate,
            channels,
            format: AudioFormat {
                extension: Self::detect_format(path).unwrap_or_default(),
                codec: symphonia::default::get_codecs()
                    .get_codec(codec_params.codec)
                    .map(|descriptor| descriptor.short_name.to_string())
                    .unwrap_or_else(|| format!("{:?}", codec_params.codec)),
            },
        })
    }

    #[cfg(not(feature = "symphonia"))]
    fn load_compressed(path: &Path) -> Result<AudioData> {
        Self::ensure_decoder(path)?;
        Err(AudioError::LoadFailed { path: path.display().to_string() }.into())
    }

    fn duration_of(len: usize, sample_rate: u32, channels: u16) -> f64 {
        if sample_rate == 0 || channels == 0 {
            return 0.0;
        }
        len as f64 / (sample_rate as f64 * channels as f64)
    }

    /// Convert integer sample to float (-1.0 to 1.0)
    fn int_to_float(sample: i32, bit_depth: u16) -> f32 {
        match bit_depth {
            8 => (sample as f32 - 128.0) / 128.0,
            16 => sample as f32 / 32768.0,
            24 => sample as f32 / 8388608.0,
            32 => sample as f32 / 2147483648.0,
            _ => sample as f32 / 32768.0,
        }
    }

    /// Detect audio format from file extension
    pub fn detect_format<P: AsRef<Path>>(path: P) -> Option<String> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
    }

    /// Check if a file format is supported
    pub fn is_format_supported(extension: &str) -> bool {
        let extension = extension.to_lowercase();
        extension == "wav" || COMPRESSED_FORMATS.contains(&extension.as_str())
    }
}

/// Resample mono audio from `from_rate` to `to_rate` with a windowed-sinc
/// resampler, keeping the output aligned with the input in time.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == 0 || to_rate == 0 {
        return Err(AudioError::InvalidSampleRate { sample_rate: from_rate.min(to_rate) }.into());
    }
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let failed = |reason: String| AudioError::ResampleFailed { reason };

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let ratio = to_rate as f64 / from_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, samples.len(), 1)
        .map_err(|e| failed(e.to_string()))?;

    let expected = (samples.len() as f64 * ratio).ceil() as usize;

    let mut output = resampler
        .process(&[samples], None)
        .map_err(|e| failed(e.to_string()))?
        .into_iter()
        .next()
        .unwrap_or_default();

    // The first chunk comes out delay-trimmed; flush the tail with silence
    while output.len() < expected {
        let tail = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(|e| failed(e.to_string()))?
            .into_iter()
            .next()
            .unwrap_or_default();
        if tail.is_empty() {
            break;
        }
        output.extend(tail);
    }

    output.truncate(expected);
    tracing::debug!(
        "Resampled {} -> {} samples ({} Hz -> {} Hz)",
        samples.len(),
        output.len(),
        from_rate,
        to_rate
    );
    Ok(output)
}
