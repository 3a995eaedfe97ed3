//! Track sources: probed media files and their frame/decoder collaborators.
//!
//! Uses Symphonia to:
//! - probe a container and select its first decodable audio track
//! - expose the track's format metadata
//! - yield encoded frames in file order until EOF
//!
//! A [`TrackSource`] is not restartable. Replaying a file (what loop mode
//! does) means opening a fresh source; the container is reopened rather than
//! rewound.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, CodecParameters, Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// A filesystem path that passed container validation at construction time.
///
/// Invariant: probing the path succeeded at least once, so it exposed a
/// decodable audio track with known sample rate and channel count.
#[derive(Clone, Debug)]
pub(crate) struct MediaFile {
    path: PathBuf,
}

impl MediaFile {
    /// Validate a candidate path by opening it as a media container.
    pub(crate) fn probe(path: &Path) -> Result<Self> {
        TrackSource::open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

/// Format metadata for the selected audio track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct TrackFormat {
    pub(crate) sample_rate: u32,
    pub(crate) channels: u16,
    /// Source bit depth when the container reports one.
    pub(crate) bits_per_sample: Option<u32>,
}

/// One open media container, positioned at the start of its audio track.
pub(crate) struct TrackSource {
    reader: Box<dyn FormatReader>,
    track_id: u32,
    codec_params: CodecParameters,
    format: TrackFormat,
}

impl TrackSource {
    /// Open `path`, probe the container, and select the first decodable track.
    ///
    /// Fails when the file cannot be opened, no track carries a known codec,
    /// or the track omits sample rate / channel count.
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .with_context(|| format!("probe {}", path.display()))?;

        let reader = probed.format;

        let (track_id, codec_params) = {
            let track = reader
                .tracks()
                .iter()
                .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
                .ok_or_else(|| anyhow!("no decodable audio track in {}", path.display()))?;
            (track.id, track.codec_params.clone())
        };

        let channels = codec_params
            .channels
            .ok_or_else(|| anyhow!("unknown channel count"))?
            .count();
        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| anyhow!("unknown sample rate"))?;
        let bits_per_sample = codec_params
            .bits_per_sample
            .or(codec_params.bits_per_coded_sample);

        let format = TrackFormat {
            sample_rate,
            channels: channels as u16,
            bits_per_sample,
        };

        Ok(Self {
            reader,
            track_id,
            codec_params,
            format,
        })
    }

    pub(crate) fn format(&self) -> &TrackFormat {
        &self.format
    }

    pub(crate) fn codec_params(&self) -> &CodecParameters {
        &self.codec_params
    }

    /// Read the next encoded frame of the selected track.
    ///
    /// Returns `Ok(None)` at end of file. Packets belonging to other tracks in
    /// the container are skipped. Read failures other than EOF propagate.
    pub(crate) fn next_frame(&mut self) -> Result<Option<Packet>> {
        loop {
            match self.reader.next_packet() {
                Ok(packet) => {
                    if packet.track_id() != self.track_id {
                        continue;
                    }
                    return Ok(Some(packet));
                }
                Err(SymphoniaError::IoError(ref err))
                    if err.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(err) => return Err(err).context("read frame"),
            }
        }
    }
}

/// Decoder bound to one track's codec configuration.
pub(crate) struct FrameDecoder {
    inner: Box<dyn Decoder>,
}

impl FrameDecoder {
    pub(crate) fn new(source: &TrackSource) -> Result<Self> {
        let inner = symphonia::default::get_codecs()
            .make(source.codec_params(), &DecoderOptions::default())
            .context("build decoder")?;
        Ok(Self { inner })
    }

    /// Decode one frame into interleaved `f32` samples.
    pub(crate) fn decode(&mut self, packet: &Packet) -> Result<Vec<f32>> {
        let decoded = self.inner.decode(packet).context("decode frame")?;
        let mut buf = SampleBuffer::<f32>::new(decoded.frames() as u64, *decoded.spec());
        buf.copy_interleaved_ref(decoded);
        Ok(buf.samples().to_vec())
    }
}
