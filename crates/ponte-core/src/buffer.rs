//! Tagged sample buffers exchanged between hardware ports and the host.
//!
//! The driver contract allows three wire formats and two layouts. Buffers
//! carry their format in the type instead of behind a raw pointer that is
//! reinterpreted from a layout flag, so a mismatched view is unrepresentable.

use crate::config::{BufferLayout, SampleFormat};

/// Owned scratch storage in one of the wire sample formats.
#[derive(Debug, Clone)]
pub enum Samples {
    F32(Vec<f32>),
    I16(Vec<i16>),
    U16(Vec<u16>),
}

impl Samples {
    /// Allocate `len` samples of silence in `format`.
    pub fn silence(format: SampleFormat, len: usize) -> Samples {
        match format {
            SampleFormat::F32 => Samples::F32(vec![0.0; len]),
            SampleFormat::I16 => Samples::I16(vec![0; len]),
            SampleFormat::U16 => Samples::U16(vec![32768; len]),
        }
    }

    pub fn format(&self) -> SampleFormat {
        match self {
            Samples::F32(_) => SampleFormat::F32,
            Samples::I16(_) => SampleFormat::I16,
            Samples::U16(_) => SampleFormat::U16,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Samples::F32(v) => v.len(),
            Samples::I16(v) => v.len(),
            Samples::U16(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overwrite every sample with the format's silence value.
    ///
    /// Silence is 0 for F32/I16 and the 32768 bias midpoint for U16.
    pub fn fill_silence(&mut self) {
        match self {
            Samples::F32(v) => v.fill(0.0),
            Samples::I16(v) => v.fill(0),
            Samples::U16(v) => v.fill(32768),
        }
    }

    pub fn as_slice(&self) -> SampleSlice<'_> {
        match self {
            Samples::F32(v) => SampleSlice::F32(v),
            Samples::I16(v) => SampleSlice::I16(v),
            Samples::U16(v) => SampleSlice::U16(v),
        }
    }

    pub fn as_slice_mut(&mut self) -> SampleSliceMut<'_> {
        match self {
            Samples::F32(v) => SampleSliceMut::F32(v),
            Samples::I16(v) => SampleSliceMut::I16(v),
            Samples::U16(v) => SampleSliceMut::U16(v),
        }
    }
}

/// Borrowed sample data in one of the wire formats.
#[derive(Debug, Clone, Copy)]
pub enum SampleSlice<'a> {
    F32(&'a [f32]),
    I16(&'a [i16]),
    U16(&'a [u16]),
}

impl SampleSlice<'_> {
    pub fn format(&self) -> SampleFormat {
        match self {
            SampleSlice::F32(_) => SampleFormat::F32,
            SampleSlice::I16(_) => SampleFormat::I16,
            SampleSlice::U16(_) => SampleFormat::U16,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SampleSlice::F32(s) => s.len(),
            SampleSlice::I16(s) => s.len(),
            SampleSlice::U16(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Mutably borrowed sample data in one of the wire formats.
#[derive(Debug)]
pub enum SampleSliceMut<'a> {
    F32(&'a mut [f32]),
    I16(&'a mut [i16]),
    U16(&'a mut [u16]),
}

impl SampleSliceMut<'_> {
    pub fn format(&self) -> SampleFormat {
        match self {
            SampleSliceMut::F32(_) => SampleFormat::F32,
            SampleSliceMut::I16(_) => SampleFormat::I16,
            SampleSliceMut::U16(_) => SampleFormat::U16,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SampleSliceMut::F32(s) => s.len(),
            SampleSliceMut::I16(s) => s.len(),
            SampleSliceMut::U16(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reborrow without consuming the mutable view.
    pub fn reborrow(&mut self) -> SampleSliceMut<'_> {
        match self {
            SampleSliceMut::F32(s) => SampleSliceMut::F32(s),
            SampleSliceMut::I16(s) => SampleSliceMut::I16(s),
            SampleSliceMut::U16(s) => SampleSliceMut::U16(s),
        }
    }
}

/// Read-only view of one direction of a cycle's audio data.
#[derive(Debug, Clone, Copy)]
pub struct BufferRef<'a> {
    data: SampleSlice<'a>,
    layout: BufferLayout,
    channels: u16,
    frames: u32,
}

impl<'a> BufferRef<'a> {
    /// `data.len()` must equal `channels * frames`.
    pub fn new(data: SampleSlice<'a>, layout: BufferLayout, channels: u16, frames: u32) -> Self {
        debug_assert_eq!(data.len(), channels as usize * frames as usize);
        Self {
            data,
            layout,
            channels,
            frames,
        }
    }

    /// A zero-channel view for streams without this direction.
    pub fn empty(format: SampleFormat, layout: BufferLayout) -> Self {
        let data = match format {
            SampleFormat::F32 => SampleSlice::F32(&[]),
            SampleFormat::I16 => SampleSlice::I16(&[]),
            SampleFormat::U16 => SampleSlice::U16(&[]),
        };
        Self {
            data,
            layout,
            channels: 0,
            frames: 0,
        }
    }

    pub fn data(&self) -> SampleSlice<'a> {
        self.data
    }

    pub fn layout(&self) -> BufferLayout {
        self.layout
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.channels == 0
    }

    /// One channel's plane. `None` for interleaved data, where single
    /// channels are not contiguous.
    pub fn channel(&self, channel: u16) -> Option<SampleSlice<'a>> {
        if self.layout != BufferLayout::NonInterleaved || channel >= self.channels {
            return None;
        }
        let frames = self.frames as usize;
        let at = channel as usize * frames;
        Some(match self.data {
            SampleSlice::F32(s) => SampleSlice::F32(&s[at..at + frames]),
            SampleSlice::I16(s) => SampleSlice::I16(&s[at..at + frames]),
            SampleSlice::U16(s) => SampleSlice::U16(&s[at..at + frames]),
        })
    }
}

/// Mutable view of one direction of a cycle's audio data.
#[derive(Debug)]
pub struct BufferMut<'a> {
    data: SampleSliceMut<'a>,
    layout: BufferLayout,
    channels: u16,
    frames: u32,
}

impl<'a> BufferMut<'a> {
    /// `data.len()` must equal `channels * frames`.
    pub fn new(data: SampleSliceMut<'a>, layout: BufferLayout, channels: u16, frames: u32) -> Self {
        debug_assert_eq!(data.len(), channels as usize * frames as usize);
        Self {
            data,
            layout,
            channels,
            frames,
        }
    }

    pub fn data_mut(&mut self) -> SampleSliceMut<'_> {
        self.data.reborrow()
    }

    pub fn layout(&self) -> BufferLayout {
        self.layout
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.channels == 0
    }

    /// One channel's mutable plane; `None` for interleaved data.
    pub fn channel_mut(&mut self, channel: u16) -> Option<SampleSliceMut<'_>> {
        if self.layout != BufferLayout::NonInterleaved || channel >= self.channels {
            return None;
        }
        let frames = self.frames as usize;
        let at = channel as usize * frames;
        Some(match &mut self.data {
            SampleSliceMut::F32(s) => SampleSliceMut::F32(&mut s[at..at + frames]),
            SampleSliceMut::I16(s) => SampleSliceMut::I16(&mut s[at..at + frames]),
            SampleSliceMut::U16(s) => SampleSliceMut::U16(&mut s[at..at + frames]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_values_per_format() {
        let mut f = Samples::silence(SampleFormat::F32, 4);
        let mut i = Samples::silence(SampleFormat::I16, 4);
        let mut u = Samples::silence(SampleFormat::U16, 4);
        f.fill_silence();
        i.fill_silence();
        u.fill_silence();
        assert!(matches!(f, Samples::F32(ref v) if v.iter().all(|&x| x == 0.0)));
        assert!(matches!(i, Samples::I16(ref v) if v.iter().all(|&x| x == 0)));
        assert!(matches!(u, Samples::U16(ref v) if v.iter().all(|&x| x == 32768)));
    }

    #[test]
    fn test_noninterleaved_channel_planes() {
        // 2 channels, 3 frames, channel-major.
        let data = [1.0f32, 2.0, 3.0, 10.0, 20.0, 30.0];
        let view = BufferRef::new(SampleSlice::F32(&data), BufferLayout::NonInterleaved, 2, 3);
        let ch1 = view.channel(1).unwrap();
        assert!(matches!(ch1, SampleSlice::F32(s) if s == [10.0, 20.0, 30.0]));
        assert!(view.channel(2).is_none());
    }

    #[test]
    fn test_interleaved_has_no_channel_planes() {
        let data = [0i16; 6];
        let view = BufferRef::new(SampleSlice::I16(&data), BufferLayout::Interleaved, 2, 3);
        assert!(view.channel(0).is_none());
    }
}
