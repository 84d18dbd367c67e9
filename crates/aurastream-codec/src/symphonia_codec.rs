//! Symphonia-backed [`Codec`] adapter.
//!
//! Symphonia's own probe already does cheapest-available-first container
//! sniffing internally, so this single adapter is registered once and
//! stands in for per-format decoders across WAV/FLAC/MP3/AAC/ALAC/
//! Vorbis/AIFF, using a probe-then-decode loop.

use crate::codec::{Codec, DecodedChunk, EncodedSource, ProcessOutcome};
use crate::errors::CodecError;
use aurastream_core::jiffies::samples_to_jiffies;
use aurastream_core::msg::DecodedStreamInfo;
use aurastream_core::{DecodedAudio, StreamHandlerId};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecParameters, Decoder, DecoderOptions};
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream, ReadOnlySource};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::Time;

/// Wraps a boxed [`EncodedSource`] so Symphonia sees a `MediaSource`.
struct MediaSourceAdapter {
    inner: Box<dyn EncodedSource>,
}

impl std::io::Read for MediaSourceAdapter {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl std::io::Seek for MediaSourceAdapter {
    fn seek(&mut self, pos: std::io::SeekFrom) -> std::io::Result<u64> {
        self.inner.seek(pos)
    }
}

impl MediaSource for MediaSourceAdapter {
    fn is_seekable(&self) -> bool {
        self.inner.is_seekable()
    }

    fn byte_len(&self) -> Option<u64> {
        None
    }
}

fn codec_name_from_params(params: &CodecParameters) -> String {
    use symphonia::core::codecs::*;
    match params.codec {
        CODEC_TYPE_FLAC => "FLAC",
        CODEC_TYPE_MP3 => "MP3",
        CODEC_TYPE_AAC => "AAC",
        CODEC_TYPE_ALAC => "ALAC",
        CODEC_TYPE_VORBIS => "VORBIS",
        CODEC_TYPE_PCM_S16LE | CODEC_TYPE_PCM_S16BE => "PCM_S16",
        CODEC_TYPE_PCM_S24LE | CODEC_TYPE_PCM_S24BE => "PCM_S24",
        CODEC_TYPE_PCM_S32LE | CODEC_TYPE_PCM_S32BE => "PCM_S32",
        _ => "UNKNOWN",
    }
    .to_string()
}

pub struct SymphoniaCodec {
    format: Option<Box<dyn FormatReader>>,
    decoder: Option<Box<dyn Decoder>>,
    sample_rate: u32,
    channels: u16,
    stream_id: u32,
}

impl SymphoniaCodec {
    pub fn new() -> Self {
        Self {
            format: None,
            decoder: None,
            sample_rate: 0,
            channels: 0,
            stream_id: 0,
        }
    }
}

impl Default for SymphoniaCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for SymphoniaCodec {
    fn name(&self) -> &'static str {
        "symphonia"
    }

    fn recognise_cost(&self) -> u32 {
        // The sole registered codec; cost is irrelevant but kept nonzero
        // so additional (future) codecs can register ahead of it.
        100
    }

    fn recognise(&self, window: &[u8]) -> bool {
        let cursor = std::io::Cursor::new(window.to_vec());
        let mss = MediaSourceStream::new(Box::new(ReadOnlySource::new(cursor)), Default::default());
        symphonia::default::get_probe()
            .format(&Hint::new(), mss, &FormatOptions::default(), &MetadataOptions::default())
            .is_ok()
    }

    fn stream_initialise(
        &mut self,
        source: Box<dyn EncodedSource>,
        stream_id: u32,
        start_sample: u64,
        handler: StreamHandlerId,
    ) -> Result<DecodedStreamInfo, CodecError> {
        let adapter = MediaSourceAdapter { inner: source };
        let mss = MediaSourceStream::new(Box::new(adapter), Default::default());

        let probed = symphonia::default::get_probe()
            .format(&Hint::new(), mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|_| CodecError::StreamCorrupt("container probe failed".into()))?;

        let mut format = probed.format;
        let track = format
            .default_track()
            .ok_or_else(|| CodecError::FeatureUnsupported("no default audio track".into()))?
            .clone();

        let channels = track
            .codec_params
            .channels
            .ok_or_else(|| CodecError::FeatureUnsupported("unknown channel layout".into()))?
            .count() as u16;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| CodecError::FeatureUnsupported("unknown sample rate".into()))?;

        if start_sample > 0 {
            let secs = start_sample / sample_rate as u64;
            let frac = (start_sample % sample_rate as u64) as f64 / sample_rate as f64;
            let _ = format.seek(SeekMode::Accurate, SeekTo::Time { time: Time::new(secs, frac), track_id: None });
        }

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|_| CodecError::FeatureUnsupported("no decoder for codec".into()))?;

        let total_jiffies = track.codec_params.n_frames.map(|f| samples_to_jiffies(f, sample_rate));
        let bit_depth = track
            .codec_params
            .bits_per_sample
            .or(track.codec_params.bits_per_coded_sample)
            .and_then(|v| u16::try_from(v).ok());

        self.sample_rate = sample_rate;
        self.channels = channels;
        self.stream_id = stream_id;
        self.format = Some(format);
        self.decoder = Some(decoder);

        Ok(DecodedStreamInfo {
            stream_id,
            bit_rate: None,
            bit_depth,
            sample_rate,
            channels,
            codec_name: codec_name_from_params(&track.codec_params),
            total_jiffies,
            start_sample,
            lossless: codec_name_from_params(&track.codec_params) != "MP3" && codec_name_from_params(&track.codec_params) != "AAC",
            seekable: true,
            live: total_jiffies.is_none(),
            handler,
        })
    }

    fn process(&mut self) -> Result<ProcessOutcome, CodecError> {
        let format = self.format.as_mut().ok_or(CodecError::StreamEnded)?;
        let decoder = self.decoder.as_mut().ok_or(CodecError::StreamEnded)?;

        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                return Ok(ProcessOutcome::Ended);
            }
            Err(e) => return Err(CodecError::Symphonia(e)),
        };

        let decoded = decoder.decode(&packet).map_err(CodecError::Symphonia)?;
        let frames = decoded.frames();
        let mut buf = SampleBuffer::<f32>::new(frames as u64, *decoded.spec());
        buf.copy_interleaved_ref(decoded);

        let audio = DecodedAudio::new(buf.samples().to_vec(), self.channels, self.sample_rate);
        let size_jiffies = samples_to_jiffies(frames as u64, self.sample_rate);
        Ok(ProcessOutcome::Audio(DecodedChunk { audio, size_jiffies }))
    }

    fn try_seek(&mut self, sample: u64) -> Option<u64> {
        let format = self.format.as_mut()?;
        if self.sample_rate == 0 {
            return None;
        }
        let secs = sample / self.sample_rate as u64;
        let frac = (sample % self.sample_rate as u64) as f64 / self.sample_rate as f64;
        format
            .seek(SeekMode::Accurate, SeekTo::Time { time: Time::new(secs, frac), track_id: None })
            .ok()
            .map(|seeked| seeked.actual_ts)
    }
}
