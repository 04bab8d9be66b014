//! Output-device backend built on rodio.
//!
//! Every instance owns its own `Sink`. A restart drops the previous sink,
//! which also drops its end-of-clip callback.

use std::io::Cursor;

use rodio::{source::EmptyCallback, Decoder, OutputStream, OutputStreamHandle, Sink};

use super::{AudioBackend, ClipAsset, ClipDefinition, Completion, Voice};
use crate::{EngineError, Result};

/// Plays clips on the default output device.
pub struct DeviceBackend {
    // Dropping the stream silences every sink.
    _stream: OutputStream,
    handle: OutputStreamHandle,
}

impl DeviceBackend {
    pub fn open_default() -> Result<Self> {
        let (stream, handle) = OutputStream::try_default()
            .map_err(|err| EngineError::msg(format!("failed to open audio output: {err}")))?;
        Ok(Self {
            _stream: stream,
            handle,
        })
    }
}

impl AudioBackend for DeviceBackend {
    fn decode(&mut self, clip: &ClipDefinition) -> Result<ClipAsset> {
        let asset = ClipAsset::read(&clip.source)
            .map_err(|err| EngineError::load(&clip.id, err))?;
        Decoder::new(Cursor::new(asset.shared()))
            .map_err(|err| EngineError::load(&clip.id, err))?;
        Ok(asset)
    }

    fn voice(
        &mut self,
        _clip: &ClipDefinition,
        asset: &ClipAsset,
        _index: usize,
    ) -> Result<Box<dyn Voice>> {
        Ok(Box::new(DeviceVoice {
            handle: self.handle.clone(),
            asset: asset.clone(),
            sink: None,
        }))
    }
}

struct DeviceVoice {
    handle: OutputStreamHandle,
    asset: ClipAsset,
    sink: Option<Sink>,
}

impl Voice for DeviceVoice {
    fn start(&mut self, volume: f32, done: Completion) -> Result<()> {
        self.stop();

        let source = Decoder::new(Cursor::new(self.asset.shared()))
            .map_err(|err| EngineError::msg(format!("decode failed: {err}")))?;
        let sink = Sink::try_new(&self.handle)
            .map_err(|err| EngineError::msg(format!("no output sink: {err}")))?;
        sink.set_volume(volume);
        sink.append(source);
        sink.append(EmptyCallback::<f32>::new(Box::new(move || done.notify())));
        self.sink = Some(sink);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }
}
