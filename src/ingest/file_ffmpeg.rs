//! Local file frame source using FFmpeg.
//!
//! Decodes the best video stream of a local file and converts every frame to
//! RGB24. The decoder is drained at end of file so trailing frames are not
//! lost; after that `next_frame` reports end of stream.

use anyhow::{Context, Result};
use ffmpeg_next as ffmpeg;

use super::file::FileConfig;
use super::{FrameSource, SourceStats};
use crate::frame::Frame;

struct OpenedFile {
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    eof_sent: bool,
}

pub(crate) struct FfmpegFileSource {
    config: FileConfig,
    state: Option<OpenedFile>,
    frame_count: u64,
}

impl FfmpegFileSource {
    pub(crate) fn new(config: FileConfig) -> Self {
        Self {
            config,
            state: None,
            frame_count: 0,
        }
    }
}

impl FrameSource for FfmpegFileSource {
    fn describe(&self) -> String {
        self.config.path.clone()
    }

    fn open(&mut self) -> Result<()> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&self.config.path)
            .with_context(|| format!("failed to open file input '{}' with ffmpeg", self.config.path))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow::anyhow!("file has no video track"))?;
        let stream_index = input_stream.index();
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        log::info!(
            "FileSource: opened {} ({}x{})",
            self.config.path,
            decoder.width(),
            decoder.height()
        );
        self.state = Some(OpenedFile {
            input,
            stream_index,
            decoder,
            scaler,
            eof_sent: false,
        });
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let state = self.state.as_mut().context("file source not open")?;
        let OpenedFile {
            input,
            stream_index,
            decoder,
            scaler,
            eof_sent,
        } = state;

        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            if decoder.receive_frame(&mut decoded).is_ok() {
                let mut rgb_frame = ffmpeg::frame::Video::empty();
                scaler
                    .run(&decoded, &mut rgb_frame)
                    .context("scale frame to RGB")?;
                let (pixels, width, height) = frame_to_pixels(&rgb_frame)?;
                self.frame_count += 1;
                return Frame::from_rgb(pixels, width, height, self.frame_count).map(Some);
            }
            if *eof_sent {
                log::info!(
                    "FileSource: end of file {} after {} frames",
                    self.config.path,
                    self.frame_count
                );
                return Ok(None);
            }
            let next_packet = input
                .packets()
                .find(|(stream, _)| stream.index() == *stream_index)
                .map(|(_, packet)| packet);
            match next_packet {
                Some(packet) => decoder
                    .send_packet(&packet)
                    .context("send packet to ffmpeg decoder")?,
                None => {
                    decoder.send_eof().context("flush ffmpeg decoder")?;
                    *eof_sent = true;
                }
            }
        }
    }

    fn release(&mut self) {
        if self.state.take().is_some() {
            log::info!("FileSource: released {}", self.config.path);
        }
    }

    fn is_open(&self) -> bool {
        self.state.is_some()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            origin: self.config.path.clone(),
        }
    }
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        return Ok((data[..row_bytes * height as usize].to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }

    Ok((pixels, width, height))
}
