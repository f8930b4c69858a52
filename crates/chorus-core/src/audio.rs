//! Audio container sniffing.
//!
//! Pure functions — no I/O, no async runtime. Engines use these to reject
//! output that cannot possibly be playable before it reaches a client.

use crate::types::AudioFormat;

/// Guess the container format from the leading bytes.
///
/// Recognises RIFF/WAVE and MP3 (ID3v2 tag or a bare MPEG frame sync).
pub fn sniff_format(buf: &[u8]) -> Option<AudioFormat> {
    if buf.len() >= 12 && &buf[0..4] == b"RIFF" && &buf[8..12] == b"WAVE" {
        return Some(AudioFormat::Wav);
    }
    if buf.len() >= 3 && &buf[0..3] == b"ID3" {
        return Some(AudioFormat::Mp3);
    }
    // 11-bit frame sync, layer bits != reserved
    if buf.len() >= 2 && buf[0] == 0xFF && buf[1] & 0xE0 == 0xE0 && buf[1] & 0x06 != 0 {
        return Some(AudioFormat::Mp3);
    }
    None
}

/// Parsed WAV header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavHeader {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    /// Byte offset in the buffer where raw PCM data begins.
    pub data_offset: usize,
}

/// Parse a WAV header from a byte buffer.
///
/// Returns the audio format parameters and the byte offset where PCM data
/// starts. Streaming writers put `0xFFFFFFFF` in the size fields when the
/// total length is unknown; those sizes are ignored.
pub fn parse_wav_header(buf: &[u8]) -> Result<WavHeader, &'static str> {
    if buf.len() < 12 {
        return Err("too short for RIFF header");
    }
    if &buf[0..4] != b"RIFF" {
        return Err("missing RIFF tag");
    }
    if &buf[8..12] != b"WAVE" {
        return Err("missing WAVE tag");
    }

    let mut pos = 12;
    let mut fmt: Option<(u16, u32, u16)> = None;

    while pos + 8 <= buf.len() {
        let chunk_id = &buf[pos..pos + 4];
        let chunk_size = read_u32(buf, pos + 4);

        if chunk_id == b"fmt " {
            if pos + 24 > buf.len() {
                return Err("fmt chunk truncated");
            }
            let audio_format = read_u16(buf, pos + 8);
            // 1 = integer PCM, 3 = IEEE float
            if audio_format != 1 && audio_format != 3 {
                return Err("not PCM format");
            }
            fmt = Some((
                read_u16(buf, pos + 10),
                read_u32(buf, pos + 12),
                read_u16(buf, pos + 22),
            ));

            let skip = if chunk_size == u32::MAX {
                16
            } else {
                chunk_size as usize
            };
            pos += 8 + skip + (skip & 1);
            continue;
        }

        if chunk_id == b"data" {
            let (channels, sample_rate, bits_per_sample) =
                fmt.ok_or("data chunk before fmt chunk")?;
            return Ok(WavHeader {
                channels,
                sample_rate,
                bits_per_sample,
                data_offset: pos + 8,
            });
        }

        // Skip unknown chunks (LIST, fact, ...)
        let skip = if chunk_size == u32::MAX {
            0
        } else {
            chunk_size as usize
        };
        pos += 8 + skip + (skip & 1);
    }

    Err("data chunk not found")
}

fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal 16-bit mono PCM WAV.
    fn wav_bytes(samples: usize, sample_rate: u32) -> Vec<u8> {
        let data_len = (samples * 2) as u32;
        let mut buf = Vec::new();
        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&(36 + data_len).to_le_bytes());
        buf.extend_from_slice(b"WAVE");
        buf.extend_from_slice(b"fmt ");
        buf.extend_from_slice(&16u32.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes());
        buf.extend_from_slice(&sample_rate.to_le_bytes());
        buf.extend_from_slice(&(sample_rate * 2).to_le_bytes());
        buf.extend_from_slice(&2u16.to_le_bytes());
        buf.extend_from_slice(&16u16.to_le_bytes());
        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&data_len.to_le_bytes());
        buf.resize(44 + data_len as usize, 0);
        buf
    }

    #[test]
    fn sniffs_wav() {
        assert_eq!(sniff_format(&wav_bytes(10, 22050)), Some(AudioFormat::Wav));
    }

    #[test]
    fn sniffs_id3_mp3() {
        assert_eq!(sniff_format(b"ID3\x04\x00\x00"), Some(AudioFormat::Mp3));
    }

    #[test]
    fn sniffs_frame_sync_mp3() {
        assert_eq!(sniff_format(&[0xFF, 0xFB, 0x90, 0x64]), Some(AudioFormat::Mp3));
    }

    #[test]
    fn rejects_unknown() {
        assert_eq!(sniff_format(b""), None);
        assert_eq!(sniff_format(b"<html>oops</html>"), None);
        assert_eq!(sniff_format(b"RIFF\x00\x00\x00\x00AVI "), None);
    }

    #[test]
    fn parse_wav_header_basic() {
        let wav = wav_bytes(50, 22050);
        let hdr = parse_wav_header(&wav).unwrap();
        assert_eq!(hdr.channels, 1);
        assert_eq!(hdr.sample_rate, 22050);
        assert_eq!(hdr.bits_per_sample, 16);
        assert_eq!(hdr.data_offset, 44);
    }

    #[test]
    fn parse_wav_header_sentinel_sizes() {
        let mut wav = wav_bytes(50, 24000);
        wav[4..8].copy_from_slice(&u32::MAX.to_le_bytes());
        wav[40..44].copy_from_slice(&u32::MAX.to_le_bytes());
        let hdr = parse_wav_header(&wav).unwrap();
        assert_eq!(hdr.sample_rate, 24000);
        assert_eq!(hdr.data_offset, 44);
    }

    #[test]
    fn parse_wav_header_skips_list_chunk() {
        let plain = wav_bytes(4, 16000);
        let mut wav = plain[..36].to_vec();
        wav.extend_from_slice(b"LIST");
        wav.extend_from_slice(&4u32.to_le_bytes());
        wav.extend_from_slice(b"INFO");
        wav.extend_from_slice(&plain[36..]);
        let hdr = parse_wav_header(&wav).unwrap();
        assert_eq!(hdr.data_offset, 56);
    }

    #[test]
    fn parse_wav_header_too_short() {
        assert!(parse_wav_header(b"RIFF").is_err());
    }

    #[test]
    fn parse_wav_header_not_riff() {
        let mut wav = wav_bytes(10, 16000);
        wav[0..4].copy_from_slice(b"NOPE");
        assert!(parse_wav_header(&wav).is_err());
    }

    #[test]
    fn parse_wav_header_without_data() {
        let wav = wav_bytes(0, 16000);
        assert!(parse_wav_header(&wav[..36]).is_err());
    }
}
